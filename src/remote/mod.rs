//! Remote transport capability.
//!
//! The orchestrator never talks to hosts directly. Every remote read or
//! mutation goes through a [`RemoteTransport`] injected at startup:
//! - `PowerShellTransport` for real runs (PowerShell remoting)
//! - `SimulatedTransport` for dry runs and tests
//!
//! Transport methods return `Err` for transport-level failures only (host
//! unreachable, remote error). Interpreting what a reply means is the
//! executor's job.

pub mod powershell;
pub mod script;
pub mod simulated;

pub use powershell::PowerShellTransport;
pub use script::RemoteScript;
pub use simulated::{SimulatedTransport, TransportCall};

use std::time::Duration;

use crate::error::Result;
use crate::types::{Credentials, DesiredState, Host, ServiceState};

/// A process observed on a remote host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInfo {
    pub pid: u32,
    pub name: String,
    pub description: String,
}

impl ProcessInfo {
    pub fn new(pid: u32, name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            pid,
            name: name.into(),
            description: description.into(),
        }
    }

    /// Case-insensitive match of the descriptor against description or name
    pub fn matches(&self, descriptor: &str) -> bool {
        let needle = descriptor.to_lowercase();
        self.description.to_lowercase().contains(&needle)
            || self.name.to_lowercase().contains(&needle)
    }
}

/// Reply of one [`RemoteTransport::ensure_service_state`] round trip
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureReply {
    /// The service is not installed; nothing was changed
    NotFound,
    /// The service already was in the desired state; nothing was changed
    AlreadyInState,
    /// The start/stop command was issued and the state re-read after settling
    Changed {
        before: ServiceState,
        after: ServiceState,
    },
}

/// Capability to inspect and control services on remote hosts.
///
/// Credentials are passed through unchanged on every call; implementations
/// must not log or store them.
pub trait RemoteTransport {
    /// Probe whether the host answers at all
    fn is_reachable(&mut self, host: &Host) -> bool;

    /// Current state of a service, or `None` if it is not installed
    fn query_service(
        &mut self,
        host: &Host,
        service: &str,
        credentials: &Credentials,
    ) -> Result<Option<ServiceState>>;

    /// Drive a service towards `desired` in a single remote round trip.
    ///
    /// Looks the service up, returns early if it is absent or already in
    /// `desired`, otherwise issues the start/stop, waits `settle` on the host
    /// and re-reads the state.
    fn ensure_service_state(
        &mut self,
        host: &Host,
        service: &str,
        desired: DesiredState,
        settle: Duration,
        credentials: &Credentials,
    ) -> Result<EnsureReply>;

    /// All processes currently running on the host
    fn list_processes(
        &mut self,
        host: &Host,
        credentials: &Credentials,
    ) -> Result<Vec<ProcessInfo>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_process_match_is_case_insensitive() {
        let p = ProcessInfo::new(4120, "TaxEngine", "Tax Engine Background Worker");
        assert!(p.matches("tax engine"));
        assert!(p.matches("TAXENGINE"));
        assert!(!p.matches("Payroll"));
    }
}
