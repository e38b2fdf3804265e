//! Core value types shared across the orchestrator
//!
//! Closed enums replace the string tags ("STOPPED", "NOT_FOUND", ...) that a
//! shell-driven procedure would switch on, so every match is exhaustive.

use serde::{Deserialize, Serialize};
use std::fmt;
use strum::{Display, EnumIter, EnumString};

/// Role a host plays in the update workflow
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
#[serde(rename_all = "snake_case")]
pub enum HostRole {
    /// Receives the update first; source of truth for propagation
    #[strum(serialize = "primary")]
    Primary,
    /// Receives propagated files after the primary is updated
    #[strum(serialize = "target")]
    Target,
    /// Member of an additional, independently configured fleet
    #[strum(serialize = "fleet")]
    FleetMember,
}

/// A machine taking part in the run. Immutable once the run starts.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Host {
    name: String,
    role: HostRole,
}

impl Host {
    pub fn new(name: impl Into<String>, role: HostRole) -> Self {
        Self {
            name: name.into(),
            role,
        }
    }

    pub fn primary(name: impl Into<String>) -> Self {
        Self::new(name, HostRole::Primary)
    }

    pub fn target(name: impl Into<String>) -> Self {
        Self::new(name, HostRole::Target)
    }

    pub fn fleet_member(name: impl Into<String>) -> Self {
        Self::new(name, HostRole::FleetMember)
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[inline]
    pub fn role(&self) -> HostRole {
        self.role
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.role)
    }
}

/// Observable or desired state of a remote service
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[derive(Display, EnumString, EnumIter)]
pub enum ServiceState {
    #[strum(serialize = "Stopped")]
    Stopped,
    #[strum(serialize = "Running")]
    Running,
    /// Start/stop pending or paused; never a valid desired state
    #[strum(serialize = "Transitioning")]
    Transitioning,
}

/// End state a service-control step drives towards
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[derive(Display, EnumString, EnumIter)]
pub enum DesiredState {
    #[strum(serialize = "Stopped")]
    Stopped,
    #[strum(serialize = "Running")]
    Running,
}

impl DesiredState {
    /// The observable state that satisfies this desired state
    pub const fn as_service_state(self) -> ServiceState {
        match self {
            Self::Stopped => ServiceState::Stopped,
            Self::Running => ServiceState::Running,
        }
    }

    #[inline]
    pub fn is_satisfied_by(self, state: ServiceState) -> bool {
        self.as_service_state() == state
    }
}

/// Severity of a run log entry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[derive(Display, EnumString, EnumIter)]
#[strum(serialize_all = "UPPERCASE")]
pub enum LogLevel {
    Info,
    Success,
    Warning,
    Error,
}

/// Whether a step runs unattended or is performed by the operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum StepKind {
    Automated,
    Manual,
}

/// Executor capability a step depends on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Capability {
    #[strum(serialize = "service-control")]
    ServiceControl,
    #[strum(serialize = "file-sync")]
    FileSync,
    #[strum(serialize = "validation")]
    Validation,
    #[strum(serialize = "none")]
    None,
}

/// Opaque principal handed unchanged to every remote action.
///
/// The secret never appears in `Debug` output so it cannot leak through logs.
#[derive(Clone)]
pub struct Credentials {
    username: String,
    secret: String,
}

impl Credentials {
    pub fn new(username: impl Into<String>, secret: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            secret: secret.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn secret(&self) -> &str {
        &self.secret
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("username", &self.username)
            .field("secret", &"<redacted>")
            .finish()
    }
}
