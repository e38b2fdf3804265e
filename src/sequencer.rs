//! Step sequencer
//!
//! Owns the run state machine and drives every step of a [`Workflow`] through
//! the executor, sync engine or manual gate. The sequencer reports; it does not
//! enforce policy. A step that fails is logged and recorded, and the operator
//! decides at the next pause whether to carry on.
//!
//! # State flow
//!
//! ```text
//! NotStarted
//!     ↓
//! ValidationGate ──(gate failed)──→ Aborted
//!     ↓
//! Running ⇄ Paused(n)
//!     ↓
//! Completed
//!
//! (Any non-terminal state can transition to Aborted)
//! ```

use chrono::{DateTime, Local};
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::error::Result;
use crate::executor::{RemoteExecutor, StopConfirmation};
use crate::gate::{Operator, run_manual_step};
use crate::outcome::{HostOutcome, Outcome, StepOutcome};
use crate::remote::RemoteTransport;
use crate::run_log::{RunLog, RunSummary};
use crate::step::{StepAction, StepDefinition};
use crate::sync::{distribute, sync_directory};
use crate::types::{Credentials, Host};
use crate::validator;
use crate::workflow::Workflow;

/// Run states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SequencerState {
    NotStarted,
    ValidationGate,
    Running,
    /// Waiting for the continue signal after step `n`
    Paused(usize),
    Aborted,
    Completed,
}

impl SequencerState {
    /// Returns true if this is a terminal state (Completed or Aborted)
    #[inline]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Aborted)
    }
}

impl fmt::Display for SequencerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotStarted => write!(f, "not started"),
            Self::ValidationGate => write!(f, "validation gate"),
            Self::Running => write!(f, "running"),
            Self::Paused(n) => write!(f, "paused after step {}", n),
            Self::Aborted => write!(f, "aborted"),
            Self::Completed => write!(f, "completed"),
        }
    }
}

/// Errors that can occur during state transitions
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransitionError {
    #[error("Cannot move from {from} to {to}")]
    Invalid {
        from: SequencerState,
        to: SequencerState,
    },

    #[error("Cannot transition from terminal state {from}")]
    FromTerminalState { from: SequencerState },
}

/// The run state machine. Only the transitions listed in the module docs are
/// accepted; anything else is a [`TransitionError`].
#[derive(Debug, Clone)]
pub struct Sequencer {
    current: SequencerState,
    history: Vec<SequencerState>,
}

impl Default for Sequencer {
    fn default() -> Self {
        Self::new()
    }
}

impl Sequencer {
    pub fn new() -> Self {
        Self {
            current: SequencerState::NotStarted,
            history: vec![SequencerState::NotStarted],
        }
    }

    #[inline]
    pub fn state(&self) -> SequencerState {
        self.current
    }

    /// Every state visited, in order
    pub fn history(&self) -> &[SequencerState] {
        &self.history
    }

    /// `NotStarted → ValidationGate`
    pub fn begin(&mut self) -> std::result::Result<(), TransitionError> {
        self.transition(SequencerState::NotStarted, SequencerState::ValidationGate)
    }

    /// `ValidationGate → Running`
    pub fn pass_gate(&mut self) -> std::result::Result<(), TransitionError> {
        self.transition(SequencerState::ValidationGate, SequencerState::Running)
    }

    /// `ValidationGate → Aborted`
    pub fn fail_gate(&mut self) -> std::result::Result<(), TransitionError> {
        self.transition(SequencerState::ValidationGate, SequencerState::Aborted)
    }

    /// `Running → Paused(step)`
    pub fn pause(&mut self, step: usize) -> std::result::Result<(), TransitionError> {
        self.transition(SequencerState::Running, SequencerState::Paused(step))
    }

    /// `Paused(n) → Running`; returns the ordinal of the next step
    pub fn resume(&mut self) -> std::result::Result<usize, TransitionError> {
        match self.current {
            SequencerState::Paused(n) => {
                self.enter(SequencerState::Running);
                Ok(n + 1)
            }
            from => Err(self.reject(from, SequencerState::Running)),
        }
    }

    /// `Running → Completed`
    pub fn complete(&mut self) -> std::result::Result<(), TransitionError> {
        self.transition(SequencerState::Running, SequencerState::Completed)
    }

    /// Any non-terminal state `→ Aborted`
    pub fn abort(&mut self) -> std::result::Result<(), TransitionError> {
        if self.current.is_terminal() {
            return Err(TransitionError::FromTerminalState { from: self.current });
        }
        self.enter(SequencerState::Aborted);
        Ok(())
    }

    fn transition(
        &mut self,
        from: SequencerState,
        to: SequencerState,
    ) -> std::result::Result<(), TransitionError> {
        if self.current != from {
            return Err(self.reject(self.current, to));
        }
        self.enter(to);
        Ok(())
    }

    fn reject(&self, from: SequencerState, to: SequencerState) -> TransitionError {
        if from.is_terminal() {
            TransitionError::FromTerminalState { from }
        } else {
            TransitionError::Invalid { from, to }
        }
    }

    fn enter(&mut self, next: SequencerState) {
        debug!("sequencer: {} -> {}", self.current, next);
        self.current = next;
        self.history.push(next);
    }
}

/// Root aggregate of one run: start time, log file, gate verdict and the
/// outcomes produced so far
#[derive(Debug, Clone)]
pub struct DeploymentRun {
    pub started_at: DateTime<Local>,
    /// The run's log file; `None` for in-memory logs
    pub log_path: Option<PathBuf>,
    /// Set once the validation gate has passed
    pub gate_passed: bool,
    pub outcomes: Vec<StepOutcome>,
}

impl DeploymentRun {
    pub fn new(started_at: DateTime<Local>, log_path: Option<PathBuf>) -> Self {
        Self {
            started_at,
            log_path,
            gate_passed: false,
            outcomes: Vec::new(),
        }
    }

    pub fn record(&mut self, outcome: StepOutcome) {
        self.outcomes.push(outcome);
    }

    /// Steps whose outcome was anything but clean
    pub fn problem_steps(&self) -> impl Iterator<Item = &StepOutcome> {
        self.outcomes.iter().filter(|o| !o.is_clean())
    }
}

/// Everything the entry point needs once a run is over
#[derive(Debug)]
pub struct RunReport {
    pub final_state: SequencerState,
    pub history: Vec<SequencerState>,
    pub run: DeploymentRun,
    pub summary: Result<RunSummary>,
}

impl RunReport {
    /// 0 when the run completed, 2 when it was aborted, 1 otherwise
    pub fn exit_code(&self) -> u8 {
        match self.final_state {
            SequencerState::Completed => 0,
            SequencerState::Aborted => 2,
            _ => 1,
        }
    }

    /// True if the gate rejected the run. A run whose gate passed but which
    /// was abandoned at the begin prompt is aborted, not aborted at the gate.
    pub fn aborted_at_gate(&self) -> bool {
        self.final_state == SequencerState::Aborted && !self.run.gate_passed
    }
}

const CONTINUE_PROMPT: &str = "Press Enter to continue to the next step...";
const BEGIN_PROMPT: &str = "Validation passed. Press Enter to begin the update...";

/// Drives a workflow against injected collaborators
pub struct Orchestrator<'a> {
    transport: &'a mut dyn RemoteTransport,
    operator: &'a mut dyn Operator,
    credentials: &'a Credentials,
    settle_interval: Duration,
}

impl<'a> Orchestrator<'a> {
    pub fn new(
        transport: &'a mut dyn RemoteTransport,
        operator: &'a mut dyn Operator,
        credentials: &'a Credentials,
        settle_interval: Duration,
    ) -> Self {
        Self {
            transport,
            operator,
            credentials,
            settle_interval,
        }
    }

    /// Run the whole workflow. Always returns a report, including for runs
    /// aborted at the gate or by a lost operator channel.
    pub fn run(&mut self, workflow: &Workflow, log: &mut RunLog) -> RunReport {
        let mut sequencer = Sequencer::new();
        let mut run = DeploymentRun::new(log.started_at(), log.path().map(Path::to_path_buf));

        if let Err(e) = self.drive(&mut sequencer, workflow, &mut run, log) {
            log.error(format!("Run aborted: {}", e));
            if let Err(e) = sequencer.abort() {
                warn!("could not mark run aborted: {}", e);
            }
        }

        match sequencer.state() {
            SequencerState::Completed => log.success(format!(
                "Workflow completed: {} step(s) executed",
                run.outcomes.len()
            )),
            state => log.warning(format!(
                "Workflow ended {} after {} of {} step(s)",
                state,
                run.outcomes.len(),
                workflow.steps().len()
            )),
        }
        if let Err(e) = log.flush() {
            warn!("failed to flush run log: {}", e);
        }

        RunReport {
            final_state: sequencer.state(),
            history: sequencer.history().to_vec(),
            run,
            summary: log.summary(),
        }
    }

    fn drive(
        &mut self,
        sequencer: &mut Sequencer,
        workflow: &Workflow,
        run: &mut DeploymentRun,
        log: &mut RunLog,
    ) -> Result<()> {
        sequencer.begin()?;

        let gate = workflow.gate();
        log.info(format!(
            "Validation gate: checking {} host(s) and {} path(s)",
            gate.hosts.len(),
            gate.paths.len()
        ));
        let report = validator::validate(&mut *self.transport, &gate.hosts, &gate.paths, log);
        if !report.is_ok() {
            log.error(format!(
                "Validation gate failed: {} of {} check(s) failed",
                report.failures.len(),
                report.checks
            ));
            sequencer.fail_gate()?;
            return Ok(());
        }
        log.success(format!("Validation gate passed ({} checks)", report.checks));
        run.gate_passed = true;
        self.operator.acknowledge(BEGIN_PROMPT)?;
        sequencer.pass_gate()?;

        let total = workflow.steps().len();
        for (index, step) in workflow.steps().iter().enumerate() {
            info!("step {}/{}: {}", step.ordinal(), total, step.label());
            log.info(format!("Step {}: {}", step.ordinal(), step.label()));

            let outcome = self.execute(step, log)?;
            let overall = outcome.overall();
            if overall.is_clean() {
                log.info(format!("Step {} finished: {}", step.ordinal(), overall));
            } else {
                log.warning(format!(
                    "Step {} finished with {} ({} host attempt(s))",
                    step.ordinal(),
                    overall,
                    outcome.attempts()
                ));
            }
            run.record(outcome);

            if index + 1 < total {
                sequencer.pause(step.ordinal())?;
                self.operator.acknowledge(CONTINUE_PROMPT)?;
                sequencer.resume()?;
            }
        }

        sequencer.complete()?;
        Ok(())
    }

    /// Execute one step. Only a lost operator channel is returned as an error;
    /// everything else is folded into the step outcome.
    fn execute(&mut self, step: &StepDefinition, log: &mut RunLog) -> Result<StepOutcome> {
        let mut outcome = StepOutcome::new(step.ordinal(), step.label());

        match step.action() {
            StepAction::Service(action) => {
                let mut executor = self.executor();
                for host_outcome in executor.ensure_service_state_on_all(
                    &action.hosts,
                    &action.service,
                    action.desired,
                    log,
                ) {
                    outcome.push(host_outcome);
                }
            }
            StepAction::ConfirmStopped(action) => {
                let mut executor = self.executor();
                for host in &action.hosts {
                    let confirmation = executor.confirm_stopped(
                        host,
                        &action.service,
                        &action.process_descriptor,
                        log,
                    );
                    let host_outcome = HostOutcome::new(host, confirmation.outcome());
                    outcome.push(match confirmation {
                        StopConfirmation::FullyStopped => host_outcome,
                        StopConfirmation::ProcessStillRunning(processes) => host_outcome
                            .with_detail(format!("{} process(es) still running", processes.len())),
                        StopConfirmation::ServiceNotStopped(state) => {
                            host_outcome.with_detail(format!("service is {}", state))
                        }
                        StopConfirmation::ServiceNotFound => {
                            host_outcome.with_detail("service not found")
                        }
                        StopConfirmation::Unverified(reason) => host_outcome.with_detail(reason),
                    });
                }
            }
            StepAction::Sync(action) => {
                for job in &action.jobs {
                    let report = sync_directory(&job.source, &job.destination, &action.filter, log);
                    outcome.push(sync_outcome(&job.host, report.outcome(), report.failures.len()));
                }
            }
            StepAction::Distribute(action) => {
                for batch in &action.batches {
                    let destinations: Vec<_> =
                        batch.targets.iter().map(|t| t.destination.clone()).collect();
                    let reports = distribute(&batch.source, &destinations, &action.filter, log);
                    for (target, report) in batch.targets.iter().zip(reports) {
                        outcome.push(sync_outcome(
                            &target.host,
                            report.outcome(),
                            report.failures.len(),
                        ));
                    }
                }
            }
            StepAction::Verify(action) => {
                let report =
                    validator::validate(&mut *self.transport, &action.hosts, &action.paths, log);
                for host_outcome in report.outcomes(&action.hosts) {
                    outcome.push(host_outcome);
                }
            }
            StepAction::Manual(instruction) => {
                run_manual_step(&mut *self.operator, instruction, log)?;
            }
        }

        Ok(outcome)
    }

    fn executor(&mut self) -> RemoteExecutor<'_> {
        RemoteExecutor::new(&mut *self.transport, self.credentials, self.settle_interval)
    }
}

fn sync_outcome(host: &Host, outcome: Outcome, failures: usize) -> HostOutcome {
    let host_outcome = HostOutcome::new(host, outcome);
    if failures == 0 {
        host_outcome
    } else {
        host_outcome.with_detail(format!("{} file(s) failed", failures))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gate::{ManualInstruction, ScriptedOperator};
    use crate::remote::SimulatedTransport;
    use crate::step::{ServiceStep, VerifyStep};
    use crate::types::{DesiredState, LogLevel, ServiceState};

    #[test]
    fn test_state_machine_happy_path() {
        let mut seq = Sequencer::new();
        seq.begin().unwrap();
        seq.pass_gate().unwrap();
        seq.pause(1).unwrap();
        assert_eq!(seq.state(), SequencerState::Paused(1));
        assert_eq!(seq.resume().unwrap(), 2);
        seq.complete().unwrap();
        assert!(seq.state().is_terminal());
        assert_eq!(seq.history().len(), 6);
    }

    #[test]
    fn test_cannot_skip_gate() {
        let mut seq = Sequencer::new();
        assert_eq!(
            seq.pass_gate(),
            Err(TransitionError::Invalid {
                from: SequencerState::NotStarted,
                to: SequencerState::Running,
            })
        );
        assert!(seq.resume().is_err());
    }

    #[test]
    fn test_terminal_states_reject_everything() {
        let mut seq = Sequencer::new();
        seq.begin().unwrap();
        seq.fail_gate().unwrap();
        assert_eq!(
            seq.abort(),
            Err(TransitionError::FromTerminalState {
                from: SequencerState::Aborted
            })
        );
        assert!(matches!(
            seq.pass_gate(),
            Err(TransitionError::FromTerminalState { .. })
        ));
    }

    fn workflow(hosts: Vec<Host>) -> Workflow {
        Workflow::new(
            VerifyStep {
                hosts: hosts.clone(),
                paths: vec![],
            },
            vec![
                StepDefinition::new(
                    1,
                    "Stop service",
                    StepAction::Service(ServiceStep {
                        service: "TaxEngine".to_string(),
                        desired: DesiredState::Stopped,
                        hosts,
                    }),
                ),
                StepDefinition::new(
                    2,
                    "Check",
                    StepAction::Manual(ManualInstruction::new("Check", "A", vec![])),
                ),
            ],
        )
    }

    #[test]
    fn test_run_completes_and_pauses_between_steps() {
        let mut transport =
            SimulatedTransport::new().with_service("A", "TaxEngine", ServiceState::Running);
        let mut operator = ScriptedOperator::always();
        let credentials = Credentials::new("svc", "pw");
        let mut log = RunLog::in_memory().quiet();

        let report = Orchestrator::new(
            &mut transport,
            &mut operator,
            &credentials,
            Duration::ZERO,
        )
        .run(&workflow(vec![Host::primary("A")]), &mut log);

        assert_eq!(report.final_state, SequencerState::Completed);
        assert_eq!(report.exit_code(), 0);
        assert!(report.history.contains(&SequencerState::Paused(1)));
        assert_eq!(report.run.outcomes.len(), 2);
        // begin prompt, continue after step 1, manual step 2
        assert_eq!(operator.prompts().len(), 3);
        assert_eq!(transport.service_state("A", "TaxEngine"), Some(ServiceState::Stopped));
    }

    #[test]
    fn test_failed_gate_aborts_but_still_summarizes() {
        let mut transport = SimulatedTransport::new()
            .with_service("A", "TaxEngine", ServiceState::Running)
            .with_unreachable_host("B");
        let mut operator = ScriptedOperator::always();
        let credentials = Credentials::new("svc", "pw");
        let mut log = RunLog::in_memory().quiet();

        let report = Orchestrator::new(
            &mut transport,
            &mut operator,
            &credentials,
            Duration::ZERO,
        )
        .run(
            &workflow(vec![Host::primary("A"), Host::target("B")]),
            &mut log,
        );

        assert!(report.aborted_at_gate());
        assert_eq!(report.exit_code(), 2);
        assert!(report.run.outcomes.is_empty());
        assert_eq!(transport.mutating_calls(), 0);
        assert!(operator.prompts().is_empty());

        let summary = report.summary.unwrap();
        assert!(summary.errors >= 1);
        assert!(
            log.entries()
                .iter()
                .any(|e| e.level == LogLevel::Error && e.message.contains("B"))
        );
    }

    #[test]
    fn test_lost_operator_aborts_mid_run() {
        let mut transport =
            SimulatedTransport::new().with_service("A", "TaxEngine", ServiceState::Running);
        // acknowledges the begin prompt only
        let mut operator = ScriptedOperator::limited(1);
        let credentials = Credentials::new("svc", "pw");
        let mut log = RunLog::in_memory().quiet();

        let report = Orchestrator::new(
            &mut transport,
            &mut operator,
            &credentials,
            Duration::ZERO,
        )
        .run(&workflow(vec![Host::primary("A")]), &mut log);

        assert_eq!(report.final_state, SequencerState::Aborted);
        assert!(!report.aborted_at_gate());
        assert_eq!(report.run.outcomes.len(), 1);
        assert!(report.summary.is_ok());
    }

    #[test]
    fn test_operator_lost_at_begin_prompt_is_not_a_gate_abort() {
        let mut transport =
            SimulatedTransport::new().with_service("A", "TaxEngine", ServiceState::Running);
        // input closes before the begin prompt is acknowledged
        let mut operator = ScriptedOperator::limited(0);
        let credentials = Credentials::new("svc", "pw");
        let mut log = RunLog::in_memory().quiet();

        let report = Orchestrator::new(
            &mut transport,
            &mut operator,
            &credentials,
            Duration::ZERO,
        )
        .run(&workflow(vec![Host::primary("A")]), &mut log);

        assert_eq!(report.final_state, SequencerState::Aborted);
        assert!(report.run.gate_passed);
        assert!(!report.aborted_at_gate());
        assert_eq!(report.exit_code(), 2);
        assert!(report.run.outcomes.is_empty());
        assert_eq!(transport.mutating_calls(), 0);
        assert!(report.run.log_path.is_none());
    }
}
