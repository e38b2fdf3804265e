//! In-memory transport for dry runs and tests.
//!
//! Hosts, services and processes are declared up front; every call is
//! recorded so callers can assert exactly which remote actions happened.

use std::collections::HashMap;
use std::time::Duration;

use super::{EnsureReply, ProcessInfo, RemoteTransport};
use crate::error::{OrchestratorError, Result};
use crate::types::{Credentials, DesiredState, Host, ServiceState};

/// One recorded transport call
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Ping { host: String },
    Query { host: String, service: String },
    /// One ensure round trip, whatever it ended up doing
    Ensure {
        host: String,
        service: String,
        desired: DesiredState,
    },
    /// A start/stop command issued inside an ensure round trip
    SetState {
        host: String,
        service: String,
        desired: DesiredState,
    },
    ListProcesses { host: String },
}

#[derive(Debug, Clone)]
struct SimService {
    state: ServiceState,
    /// Ignores start/stop commands
    stuck: bool,
}

#[derive(Debug, Clone, Default)]
struct SimHost {
    reachable: bool,
    /// Every remote call fails with this reason
    failure: Option<String>,
    services: HashMap<String, SimService>,
    processes: Vec<ProcessInfo>,
}

/// Transport whose remote world lives in memory
#[derive(Debug, Clone, Default)]
pub struct SimulatedTransport {
    hosts: HashMap<String, SimHost>,
    calls: Vec<TransportCall>,
}

impl SimulatedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Declare a reachable host with no services
    pub fn with_host(mut self, host: &str) -> Self {
        self.hosts.entry(host.to_string()).or_default().reachable = true;
        self
    }

    /// Declare a service on a host (declares the host too)
    pub fn with_service(mut self, host: &str, service: &str, state: ServiceState) -> Self {
        let sim = self.hosts.entry(host.to_string()).or_default();
        sim.reachable = true;
        sim.services.insert(
            service.to_string(),
            SimService {
                state,
                stuck: false,
            },
        );
        self
    }

    /// Declare a service that never changes state when commanded
    pub fn with_stuck_service(mut self, host: &str, service: &str, state: ServiceState) -> Self {
        let sim = self.hosts.entry(host.to_string()).or_default();
        sim.reachable = true;
        sim.services.insert(service.to_string(), SimService { state, stuck: true });
        self
    }

    pub fn with_process(mut self, host: &str, process: ProcessInfo) -> Self {
        let sim = self.hosts.entry(host.to_string()).or_default();
        sim.reachable = true;
        sim.processes.push(process);
        self
    }

    /// Declare a host that does not answer
    pub fn with_unreachable_host(mut self, host: &str) -> Self {
        let sim = self.hosts.entry(host.to_string()).or_default();
        sim.reachable = false;
        sim.failure = Some("host unreachable".to_string());
        self
    }

    /// Declare a host that answers pings but fails every remote call
    pub fn with_failing_host(mut self, host: &str, reason: &str) -> Self {
        let sim = self.hosts.entry(host.to_string()).or_default();
        sim.reachable = true;
        sim.failure = Some(reason.to_string());
        self
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> &[TransportCall] {
        &self.calls
    }

    /// Number of start/stop commands issued
    pub fn mutating_calls(&self) -> usize {
        self.calls
            .iter()
            .filter(|c| matches!(c, TransportCall::SetState { .. }))
            .count()
    }

    /// Current simulated state of a service
    pub fn service_state(&self, host: &str, service: &str) -> Option<ServiceState> {
        self.hosts
            .get(host)
            .and_then(|h| h.services.get(service))
            .map(|s| s.state)
    }

    fn host_mut(&mut self, host: &Host) -> Result<&mut SimHost> {
        let sim = self.hosts.get_mut(host.name()).ok_or_else(|| {
            OrchestratorError::transport(host.name(), "unknown host")
        })?;
        if let Some(reason) = sim.failure.clone() {
            return Err(OrchestratorError::transport(host.name(), reason));
        }
        Ok(sim)
    }
}

impl RemoteTransport for SimulatedTransport {
    fn is_reachable(&mut self, host: &Host) -> bool {
        self.calls.push(TransportCall::Ping {
            host: host.name().to_string(),
        });
        self.hosts
            .get(host.name())
            .map(|h| h.reachable)
            .unwrap_or(false)
    }

    fn query_service(
        &mut self,
        host: &Host,
        service: &str,
        _credentials: &Credentials,
    ) -> Result<Option<ServiceState>> {
        self.calls.push(TransportCall::Query {
            host: host.name().to_string(),
            service: service.to_string(),
        });
        let sim = self.host_mut(host)?;
        Ok(sim.services.get(service).map(|s| s.state))
    }

    fn ensure_service_state(
        &mut self,
        host: &Host,
        service: &str,
        desired: DesiredState,
        _settle: Duration,
        _credentials: &Credentials,
    ) -> Result<EnsureReply> {
        self.calls.push(TransportCall::Ensure {
            host: host.name().to_string(),
            service: service.to_string(),
            desired,
        });
        let sim = self.host_mut(host)?;
        let Some(svc) = sim.services.get_mut(service) else {
            return Ok(EnsureReply::NotFound);
        };
        if desired.is_satisfied_by(svc.state) {
            return Ok(EnsureReply::AlreadyInState);
        }
        let before = svc.state;
        if !svc.stuck {
            svc.state = desired.as_service_state();
        }
        let after = svc.state;
        self.calls.push(TransportCall::SetState {
            host: host.name().to_string(),
            service: service.to_string(),
            desired,
        });
        Ok(EnsureReply::Changed { before, after })
    }

    fn list_processes(
        &mut self,
        host: &Host,
        _credentials: &Credentials,
    ) -> Result<Vec<ProcessInfo>> {
        self.calls.push(TransportCall::ListProcesses {
            host: host.name().to_string(),
        });
        let sim = self.host_mut(host)?;
        Ok(sim.processes.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn creds() -> Credentials {
        Credentials::new("svc", "secret")
    }

    #[test]
    fn test_ensure_changes_unless_stuck() {
        let mut t = SimulatedTransport::new()
            .with_service("A", "Svc", ServiceState::Running)
            .with_stuck_service("B", "Svc", ServiceState::Running);
        let (stop, settle) = (DesiredState::Stopped, Duration::ZERO);

        let a = t
            .ensure_service_state(&Host::primary("A"), "Svc", stop, settle, &creds())
            .unwrap();
        let b = t
            .ensure_service_state(&Host::target("B"), "Svc", stop, settle, &creds())
            .unwrap();

        assert_eq!(
            a,
            EnsureReply::Changed {
                before: ServiceState::Running,
                after: ServiceState::Stopped,
            }
        );
        assert_eq!(
            b,
            EnsureReply::Changed {
                before: ServiceState::Running,
                after: ServiceState::Running,
            }
        );
        assert_eq!(t.service_state("A", "Svc"), Some(ServiceState::Stopped));
        assert_eq!(t.service_state("B", "Svc"), Some(ServiceState::Running));
        assert_eq!(t.mutating_calls(), 2);
    }

    #[test]
    fn test_ensure_records_no_set_state_when_nothing_changes() {
        let mut t = SimulatedTransport::new().with_service("A", "Svc", ServiceState::Stopped);
        let host = Host::primary("A");

        let already = t
            .ensure_service_state(&host, "Svc", DesiredState::Stopped, Duration::ZERO, &creds())
            .unwrap();
        let missing = t
            .ensure_service_state(&host, "Other", DesiredState::Stopped, Duration::ZERO, &creds())
            .unwrap();

        assert_eq!(already, EnsureReply::AlreadyInState);
        assert_eq!(missing, EnsureReply::NotFound);
        assert_eq!(t.mutating_calls(), 0);
        assert_eq!(t.calls().len(), 2);
        assert!(t.calls().iter().all(|c| matches!(c, TransportCall::Ensure { .. })));
    }

    #[test]
    fn test_unknown_and_unreachable_hosts_fail() {
        let mut t = SimulatedTransport::new().with_unreachable_host("DOWN");
        assert!(!t.is_reachable(&Host::target("DOWN")));
        assert!(!t.is_reachable(&Host::target("NOWHERE")));
        assert!(t.query_service(&Host::target("DOWN"), "Svc", &creds()).is_err());
        assert!(t.query_service(&Host::target("NOWHERE"), "Svc", &creds()).is_err());
    }
}
