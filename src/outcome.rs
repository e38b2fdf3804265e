//! Step outcomes and their worst-case reduction
//!
//! Every executor reports one `Outcome` per host. A step's overall outcome is
//! the most severe per-host outcome, so a single `Failed` or `NotFound` anywhere
//! marks the whole step as non-clean.

use std::fmt;
use std::path::{Path, PathBuf};

use crate::types::Host;

/// Host name recorded for checks run on the orchestrating machine itself
pub const LOCAL_HOST: &str = "localhost";

/// Closed result of one executor call against one host.
///
/// Variants are declared from least to most severe; the derived `Ord` is the
/// severity order used by [`Outcome::worst`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Outcome {
    Succeeded,
    AlreadyInDesiredState,
    Skipped,
    NotFound,
    Failed,
}

impl Outcome {
    /// Returns true for outcomes that leave the step clean
    #[inline]
    pub const fn is_clean(self) -> bool {
        matches!(self, Self::Succeeded | Self::AlreadyInDesiredState | Self::Skipped)
    }

    /// Most severe of two outcomes
    #[inline]
    pub fn worst(self, other: Self) -> Self {
        self.max(other)
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::AlreadyInDesiredState => "already in desired state",
            Self::Skipped => "skipped",
            Self::NotFound => "not found",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Outcome of one executor call plus an optional free-text detail
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HostOutcome {
    /// Always a host name, never a path
    pub host: String,
    pub outcome: Outcome,
    /// The path the outcome is about, for path checks
    pub path: Option<PathBuf>,
    pub detail: Option<String>,
}

impl HostOutcome {
    pub fn new(host: &Host, outcome: Outcome) -> Self {
        Self {
            host: host.name().to_string(),
            outcome,
            path: None,
            detail: None,
        }
    }

    /// Outcome of a path check made from the orchestrating machine
    pub fn for_path(path: &Path, outcome: Outcome) -> Self {
        Self {
            host: LOCAL_HOST.to_string(),
            outcome,
            path: Some(path.to_path_buf()),
            detail: None,
        }
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }
}

/// Result of executing one step definition against zero or more hosts
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub ordinal: usize,
    pub label: String,
    pub per_host: Vec<HostOutcome>,
}

impl StepOutcome {
    pub fn new(ordinal: usize, label: impl Into<String>) -> Self {
        Self {
            ordinal,
            label: label.into(),
            per_host: Vec::new(),
        }
    }

    pub fn push(&mut self, outcome: HostOutcome) {
        self.per_host.push(outcome);
    }

    /// Worst-case reduction across hosts.
    ///
    /// A step that touched no hosts (manual steps) reduces to `Succeeded`.
    pub fn overall(&self) -> Outcome {
        reduce(self.per_host.iter().map(|h| h.outcome))
    }

    #[inline]
    pub fn is_clean(&self) -> bool {
        self.overall().is_clean()
    }

    /// Number of hosts the step attempted
    #[inline]
    pub fn attempts(&self) -> usize {
        self.per_host.len()
    }
}

/// Reduce any sequence of outcomes to the most severe one
pub fn reduce<I>(outcomes: I) -> Outcome
where
    I: IntoIterator<Item = Outcome>,
{
    outcomes
        .into_iter()
        .fold(Outcome::Succeeded, Outcome::worst)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order() {
        assert!(Outcome::Failed > Outcome::NotFound);
        assert!(Outcome::NotFound > Outcome::Skipped);
        assert!(Outcome::Skipped > Outcome::AlreadyInDesiredState);
        assert!(Outcome::AlreadyInDesiredState > Outcome::Succeeded);
    }

    #[test]
    fn test_step_overall_is_worst_case() {
        let mut step = StepOutcome::new(1, "Stop service");
        step.push(HostOutcome::new(&Host::primary("A"), Outcome::Succeeded));
        step.push(HostOutcome::new(&Host::target("B"), Outcome::NotFound));
        step.push(HostOutcome::new(&Host::target("C"), Outcome::AlreadyInDesiredState));

        assert_eq!(step.overall(), Outcome::NotFound);
        assert!(!step.is_clean());
        assert_eq!(step.attempts(), 3);
    }

    #[test]
    fn test_empty_step_is_clean() {
        let step = StepOutcome::new(4, "Run update tool");
        assert_eq!(step.overall(), Outcome::Succeeded);
        assert!(step.is_clean());
    }
}
