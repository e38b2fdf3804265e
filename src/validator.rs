//! Pre-flight validation gate
//!
//! Verifies the environment before any automated step runs:
//! - every host answers the reachability check
//! - every required path exists
//!
//! Checks are exhaustive: a failure is recorded and checking continues, so the
//! operator sees every problem at once. One log entry is written per check.

use std::path::{Path, PathBuf};

use crate::error::OrchestratorError;
use crate::outcome::{HostOutcome, Outcome};
use crate::remote::RemoteTransport;
use crate::run_log::RunLog;
use crate::types::Host;

/// Result of a validation pass
#[derive(Debug, Default)]
pub struct ValidationReport {
    pub checks: usize,
    pub failures: Vec<OrchestratorError>,
}

impl ValidationReport {
    /// Returns true if every check passed
    pub fn is_ok(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn unreachable_hosts(&self) -> Vec<&str> {
        self.failures
            .iter()
            .filter_map(|f| match f {
                OrchestratorError::UnreachableHost { host } => Some(host.as_str()),
                _ => None,
            })
            .collect()
    }

    pub fn missing_paths(&self) -> Vec<&Path> {
        self.failures
            .iter()
            .filter_map(|f| match f {
                OrchestratorError::MissingPath { path } => Some(path.as_path()),
                _ => None,
            })
            .collect()
    }

    /// Outcomes for a validation step: one per host, plus one `NotFound` per
    /// missing path, recorded against the orchestrating machine with the path
    /// in [`HostOutcome::path`]
    pub fn outcomes(&self, hosts: &[Host]) -> Vec<HostOutcome> {
        let unreachable = self.unreachable_hosts();
        let mut outcomes: Vec<HostOutcome> = hosts
            .iter()
            .map(|host| {
                if unreachable.contains(&host.name()) {
                    HostOutcome::new(host, Outcome::Failed).with_detail("unreachable")
                } else {
                    HostOutcome::new(host, Outcome::Succeeded)
                }
            })
            .collect();

        outcomes.extend(self.missing_paths().into_iter().map(|path| {
            HostOutcome::for_path(path, Outcome::NotFound).with_detail("missing path")
        }));
        outcomes
    }
}

/// Check every host and every path; never short-circuits.
pub fn validate(
    transport: &mut dyn RemoteTransport,
    hosts: &[Host],
    paths: &[PathBuf],
    log: &mut RunLog,
) -> ValidationReport {
    let mut report = ValidationReport::default();

    for host in hosts {
        report.checks += 1;
        if transport.is_reachable(host) {
            log.success(format!("Host {} is reachable", host.name()));
        } else {
            let err = OrchestratorError::UnreachableHost {
                host: host.name().to_string(),
            };
            log.error(err.to_string());
            report.failures.push(err);
        }
    }

    for path in paths {
        report.checks += 1;
        if path.exists() {
            log.success(format!("Path exists: {}", path.display()));
        } else {
            let err = OrchestratorError::MissingPath { path: path.clone() };
            log.error(err.to_string());
            report.failures.push(err);
        }
    }

    report
}
