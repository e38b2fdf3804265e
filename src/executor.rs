//! Remote action executor (service control).
//!
//! Drives one service on one host towards a desired state and reports a closed
//! [`Outcome`]. Nothing here ever propagates an error: transport failures are
//! folded into `Outcome::Failed` with a detail so that a failure on one host
//! never prevents attempting the next.

use std::time::Duration;
use tracing::debug;

use crate::error::OrchestratorError;
use crate::outcome::{HostOutcome, Outcome};
use crate::remote::{EnsureReply, ProcessInfo, RemoteTransport};
use crate::run_log::RunLog;
use crate::types::{Credentials, DesiredState, Host, ServiceState};

/// Result of the "confirm stopped" check
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StopConfirmation {
    /// Service stopped and no matching process alive
    FullyStopped,
    /// Service stopped but matching processes are still running
    ProcessStillRunning(Vec<ProcessInfo>),
    /// Service is not in the stopped state
    ServiceNotStopped(ServiceState),
    ServiceNotFound,
    /// The check itself could not be completed
    Unverified(String),
}

impl StopConfirmation {
    pub fn outcome(&self) -> Outcome {
        match self {
            Self::FullyStopped => Outcome::Succeeded,
            Self::ServiceNotFound => Outcome::NotFound,
            Self::ProcessStillRunning(_) | Self::ServiceNotStopped(_) | Self::Unverified(_) => {
                Outcome::Failed
            }
        }
    }
}

/// Executes service-control actions through an injected transport
pub struct RemoteExecutor<'a> {
    transport: &'a mut dyn RemoteTransport,
    credentials: &'a Credentials,
    settle_interval: Duration,
}

impl<'a> RemoteExecutor<'a> {
    pub fn new(
        transport: &'a mut dyn RemoteTransport,
        credentials: &'a Credentials,
        settle_interval: Duration,
    ) -> Self {
        Self {
            transport,
            credentials,
            settle_interval,
        }
    }

    /// Drive `service` on `host` to `desired`.
    ///
    /// The lookup, start/stop, settle wait and re-read happen in one transport
    /// round trip; this only maps the reply:
    ///
    /// - absent service: `NotFound`, no mutation
    /// - already in `desired`: `AlreadyInDesiredState`, no mutation
    /// - changed: `Succeeded` if the re-read state satisfies `desired`,
    ///   `Failed` otherwise
    pub fn ensure_service_state(
        &mut self,
        host: &Host,
        service: &str,
        desired: DesiredState,
        log: &mut RunLog,
    ) -> HostOutcome {
        let host_name = host.name();
        debug!(
            "ensuring '{}' on {} is {} (settle {:?})",
            service, host_name, desired, self.settle_interval
        );

        let reply = match self.transport.ensure_service_state(
            host,
            service,
            desired,
            self.settle_interval,
            self.credentials,
        ) {
            Ok(reply) => reply,
            Err(e) => return self.failed(host, log, e),
        };

        match reply {
            EnsureReply::NotFound => {
                let err = OrchestratorError::ServiceNotFound {
                    host: host_name.to_string(),
                    service: service.to_string(),
                };
                log.error(err.to_string());
                HostOutcome::new(host, Outcome::NotFound).with_detail(err.to_string())
            }
            EnsureReply::AlreadyInState => {
                log.info(format!(
                    "Service '{}' on {} is already {}",
                    service, host_name, desired
                ));
                HostOutcome::new(host, Outcome::AlreadyInDesiredState)
            }
            EnsureReply::Changed { before, after } if desired.is_satisfied_by(after) => {
                log.success(format!(
                    "Service '{}' on {} is now {} (was {})",
                    service, host_name, after, before
                ));
                HostOutcome::new(host, Outcome::Succeeded)
            }
            EnsureReply::Changed { after, .. } => {
                let err = OrchestratorError::ServiceStateMismatch {
                    host: host_name.to_string(),
                    service: service.to_string(),
                    expected: desired.to_string(),
                    actual: after.to_string(),
                };
                log.error(err.to_string());
                HostOutcome::new(host, Outcome::Failed).with_detail(err.to_string())
            }
        }
    }

    /// Run `ensure_service_state` on every host in order; one outcome per host
    pub fn ensure_service_state_on_all(
        &mut self,
        hosts: &[Host],
        service: &str,
        desired: DesiredState,
        log: &mut RunLog,
    ) -> Vec<HostOutcome> {
        hosts
            .iter()
            .map(|host| self.ensure_service_state(host, service, desired, log))
            .collect()
    }

    /// Check that `service` is stopped and no process matching
    /// `process_descriptor` is still alive.
    pub fn confirm_stopped(
        &mut self,
        host: &Host,
        service: &str,
        process_descriptor: &str,
        log: &mut RunLog,
    ) -> StopConfirmation {
        let host_name = host.name();

        let confirmation = match self.transport.query_service(host, service, self.credentials) {
            Ok(None) => StopConfirmation::ServiceNotFound,
            Ok(Some(ServiceState::Stopped)) => {
                match self.transport.list_processes(host, self.credentials) {
                    Ok(processes) => {
                        let lingering: Vec<ProcessInfo> = processes
                            .into_iter()
                            .filter(|p| p.matches(process_descriptor))
                            .collect();
                        if lingering.is_empty() {
                            StopConfirmation::FullyStopped
                        } else {
                            StopConfirmation::ProcessStillRunning(lingering)
                        }
                    }
                    Err(e) => StopConfirmation::Unverified(e.to_string()),
                }
            }
            Ok(Some(state)) => StopConfirmation::ServiceNotStopped(state),
            Err(e) => StopConfirmation::Unverified(e.to_string()),
        };

        match &confirmation {
            StopConfirmation::FullyStopped => log.success(format!(
                "Service '{}' on {} is stopped and no '{}' process is running",
                service, host_name, process_descriptor
            )),
            StopConfirmation::ProcessStillRunning(processes) => {
                let pids: Vec<String> = processes.iter().map(|p| p.pid.to_string()).collect();
                let err = OrchestratorError::ProcessStillRunning {
                    host: host_name.to_string(),
                    service: service.to_string(),
                    process: process_descriptor.to_string(),
                };
                log.warning(format!("{} (PID {})", err, pids.join(", ")));
            }
            StopConfirmation::ServiceNotStopped(state) => {
                let err = OrchestratorError::ServiceStateMismatch {
                    host: host_name.to_string(),
                    service: service.to_string(),
                    expected: ServiceState::Stopped.to_string(),
                    actual: state.to_string(),
                };
                log.error(err.to_string());
            }
            StopConfirmation::ServiceNotFound => log.error(
                OrchestratorError::ServiceNotFound {
                    host: host_name.to_string(),
                    service: service.to_string(),
                }
                .to_string(),
            ),
            StopConfirmation::Unverified(reason) => log.error(format!(
                "Could not confirm '{}' stopped on {}: {}",
                service, host_name, reason
            )),
        }

        confirmation
    }

    fn failed(&self, host: &Host, log: &mut RunLog, err: OrchestratorError) -> HostOutcome {
        log.error(err.to_string());
        HostOutcome::new(host, Outcome::Failed).with_detail(err.to_string())
    }
}
