//! Step definitions
//!
//! A workflow is an ordered list of [`StepDefinition`]s. Each step carries a
//! strongly typed action instead of an open parameter bag; its kind and
//! capability are derived from the action so they can never disagree with
//! what the step actually does.

use std::fmt;
use std::path::PathBuf;

use crate::gate::ManualInstruction;
use crate::sync::FileFilter;
use crate::types::{Capability, DesiredState, Host, StepKind};

/// Drive a service to a desired state on every listed host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceStep {
    pub service: String,
    pub desired: DesiredState,
    pub hosts: Vec<Host>,
}

/// Verify the service is stopped with no lingering process
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfirmStoppedStep {
    pub service: String,
    pub process_descriptor: String,
    pub hosts: Vec<Host>,
}

/// One source → destination copy attributed to a host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncJob {
    pub host: Host,
    pub source: PathBuf,
    pub destination: PathBuf,
}

/// Independent copy jobs (backups)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncStep {
    pub filter: FileFilter,
    pub jobs: Vec<SyncJob>,
}

/// One destination of a distribution batch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionTarget {
    pub host: Host,
    pub destination: PathBuf,
}

/// The same source fanned out to several destinations
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionBatch {
    pub source: PathBuf,
    pub targets: Vec<DistributionTarget>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributeStep {
    pub filter: FileFilter,
    pub batches: Vec<DistributionBatch>,
}

/// Re-check reachability and paths mid-workflow (does not abort on failure)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifyStep {
    pub hosts: Vec<Host>,
    pub paths: Vec<PathBuf>,
}

/// What a step does
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepAction {
    Service(ServiceStep),
    ConfirmStopped(ConfirmStoppedStep),
    Sync(SyncStep),
    Distribute(DistributeStep),
    Verify(VerifyStep),
    Manual(ManualInstruction),
}

impl StepAction {
    pub fn kind(&self) -> StepKind {
        match self {
            Self::Manual(_) => StepKind::Manual,
            _ => StepKind::Automated,
        }
    }

    pub fn capability(&self) -> Capability {
        match self {
            Self::Service(_) | Self::ConfirmStopped(_) => Capability::ServiceControl,
            Self::Sync(_) | Self::Distribute(_) => Capability::FileSync,
            Self::Verify(_) => Capability::Validation,
            Self::Manual(_) => Capability::None,
        }
    }
}

/// One unit of work; defined once per workflow, never mutated at runtime
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepDefinition {
    ordinal: usize,
    label: String,
    action: StepAction,
}

impl StepDefinition {
    pub fn new(ordinal: usize, label: impl Into<String>, action: StepAction) -> Self {
        Self {
            ordinal,
            label: label.into(),
            action,
        }
    }

    #[inline]
    pub fn ordinal(&self) -> usize {
        self.ordinal
    }

    #[inline]
    pub fn label(&self) -> &str {
        &self.label
    }

    #[inline]
    pub fn action(&self) -> &StepAction {
        &self.action
    }

    #[inline]
    pub fn kind(&self) -> StepKind {
        self.action.kind()
    }

    #[inline]
    pub fn capability(&self) -> Capability {
        self.action.capability()
    }
}

impl fmt::Display for StepDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>2}. [{:<9}] [{:<15}] {}",
            self.ordinal,
            self.kind().to_string(),
            self.capability().to_string(),
            self.label
        )
    }
}
