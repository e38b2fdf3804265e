//! Type-safe remote script contracts.
//!
//! Each remote operation is a struct implementing [`RemoteScript`] instead of
//! an ad-hoc parameter map. The struct produces the script block executed on
//! the host; the transport wraps it with credential handling and remoting.
//!
//! # Invariants
//!
//! - Script text never contains credentials; they travel as environment
//!   variables read by the wrapper (see `PowerShellTransport`).
//! - Every interpolated value is quoted with [`ps_quote`].

use std::time::Duration;

use crate::types::DesiredState;

/// Marker printed by the service query when the service does not exist
pub const NOT_FOUND_MARKER: &str = "__NOT_FOUND__";

/// Marker printed when the service already is in the desired state
pub const ALREADY_MARKER: &str = "__ALREADY__";

/// Prefix of the `before|after` line printed after a start/stop
pub const CHANGED_MARKER: &str = "__CHANGED__";

/// Field separator in process listings
pub const PROCESS_FIELD_SEPARATOR: char = '|';

/// Trait for typed remote scripts.
pub trait RemoteScript {
    /// Host the script targets
    fn host(&self) -> &str;

    /// PowerShell statements executed inside the remote script block
    fn script_block(&self) -> String;

    /// Short name used in diagnostics (e.g., "query_service")
    fn action_name(&self) -> &'static str;

    /// Whether the script changes remote state
    fn is_mutating(&self) -> bool {
        false
    }

    /// Whether the script runs on the remote host (vs. locally about it)
    fn runs_remotely(&self) -> bool {
        true
    }
}

/// Quote a value as a PowerShell single-quoted literal
pub fn ps_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "''"))
}

/// Look up a service and print its status or [`NOT_FOUND_MARKER`]
#[derive(Debug, Clone)]
pub struct QueryServiceScript {
    pub host: String,
    pub service: String,
}

impl RemoteScript for QueryServiceScript {
    fn host(&self) -> &str {
        &self.host
    }

    fn script_block(&self) -> String {
        format!(
            "$s = Get-Service -Name {} -ErrorAction SilentlyContinue; \
             if ($null -eq $s) {{ '{}' }} else {{ $s.Status.ToString() }}",
            ps_quote(&self.service),
            NOT_FOUND_MARKER
        )
    }

    fn action_name(&self) -> &'static str {
        "query_service"
    }
}

/// Drive a service to a desired state in one remote invocation.
///
/// Prints exactly one marker line: [`NOT_FOUND_MARKER`], [`ALREADY_MARKER`],
/// or [`CHANGED_MARKER`] followed by the status before and after the settle
/// wait, separated by [`PROCESS_FIELD_SEPARATOR`].
#[derive(Debug, Clone)]
pub struct EnsureServiceStateScript {
    pub host: String,
    pub service: String,
    pub desired: DesiredState,
    pub settle: Duration,
}

impl EnsureServiceStateScript {
    fn command(&self) -> String {
        match self.desired {
            DesiredState::Stopped => {
                format!("Stop-Service -Name {} -Force", ps_quote(&self.service))
            }
            DesiredState::Running => format!("Start-Service -Name {}", ps_quote(&self.service)),
        }
    }
}

impl RemoteScript for EnsureServiceStateScript {
    fn host(&self) -> &str {
        &self.host
    }

    fn script_block(&self) -> String {
        format!(
            "$s = Get-Service -Name {service} -ErrorAction SilentlyContinue; \
             if ($null -eq $s) {{ '{not_found}' }} \
             elseif ($s.Status.ToString() -eq {desired}) {{ '{already}' }} \
             else {{ \
             $before = $s.Status.ToString(); \
             {command}; \
             Start-Sleep -Milliseconds {settle}; \
             $s.Refresh(); \
             '{changed}{sep}' + $before + '{sep}' + $s.Status.ToString() }}",
            service = ps_quote(&self.service),
            not_found = NOT_FOUND_MARKER,
            desired = ps_quote(&self.desired.to_string()),
            already = ALREADY_MARKER,
            command = self.command(),
            settle = self.settle.as_millis(),
            changed = CHANGED_MARKER,
            sep = PROCESS_FIELD_SEPARATOR,
        )
    }

    fn action_name(&self) -> &'static str {
        "ensure_service_state"
    }

    fn is_mutating(&self) -> bool {
        true
    }
}

/// List processes as `pid|name|description` lines
#[derive(Debug, Clone)]
pub struct ListProcessesScript {
    pub host: String,
}

impl RemoteScript for ListProcessesScript {
    fn host(&self) -> &str {
        &self.host
    }

    fn script_block(&self) -> String {
        format!(
            "Get-Process | ForEach-Object {{ \
             '{{0}}{sep}{{1}}{sep}{{2}}' -f $_.Id, $_.ProcessName, $_.Description }}",
            sep = PROCESS_FIELD_SEPARATOR
        )
    }

    fn action_name(&self) -> &'static str {
        "list_processes"
    }
}

/// Single ICMP echo from the orchestrating machine
#[derive(Debug, Clone)]
pub struct PingScript {
    pub host: String,
}

impl RemoteScript for PingScript {
    fn host(&self) -> &str {
        &self.host
    }

    fn script_block(&self) -> String {
        format!(
            "Test-Connection -ComputerName {} -Count 1 -Quiet",
            ps_quote(&self.host)
        )
    }

    fn action_name(&self) -> &'static str {
        "ping"
    }

    fn runs_remotely(&self) -> bool {
        false
    }
}
