//! Update Orchestrator Library
//!
//! Drives a fixed, multi-host update workflow that mixes automated remote
//! actions (service control, file sync) with operator-performed manual steps,
//! gated by pre-flight validation and reported through a single run log.

pub mod cli;
pub mod config;
pub mod error;
pub mod executor;
pub mod gate;
pub mod outcome;
pub mod paths;
pub mod remote;
pub mod run_log;
pub mod sequencer;
pub mod step;
pub mod sync;
pub mod types;
pub mod validator;
pub mod workflow;

// Re-export main types for convenience
pub use config::{FleetConfig, FleetMemberConfig, Settings};
pub use error::{OrchestratorError, Result};
pub use executor::{RemoteExecutor, StopConfirmation};
pub use gate::{ConsoleOperator, ManualInstruction, Operator, ScriptedOperator, run_manual_step};
pub use outcome::{HostOutcome, Outcome, StepOutcome, reduce};
pub use paths::{
    BackupManifest, BackupPhase, RunCalendar, admin_share_path, derive_backup_path,
};
pub use remote::{EnsureReply, PowerShellTransport, RemoteTransport, SimulatedTransport};
pub use run_log::{LogEntry, RunLog, RunSummary, summarize_file};
pub use sequencer::{
    DeploymentRun, Orchestrator, RunReport, Sequencer, SequencerState, TransitionError,
};
pub use step::{StepAction, StepDefinition};
pub use sync::{FileFilter, SyncReport, distribute, sync_directory};
pub use types::{
    Capability, Credentials, DesiredState, Host, HostRole, LogLevel, ServiceState, StepKind,
};
pub use validator::{ValidationReport, validate};
pub use workflow::Workflow;
