//! PowerShell remoting transport
//!
//! Runs every [`RemoteScript`] through one `powershell -NoProfile
//! -NonInteractive -Command` invocation. Remote scripts are wrapped in
//! `Invoke-Command -ComputerName <host> -Credential $cred`.
//!
//! Credentials are handed to the child process through environment variables
//! and rebuilt into a `PSCredential` inside the wrapper, so they never appear
//! on a command line, in the script text or in the logs.

use std::process::{Command, Stdio};
use std::time::Duration;
use tracing::{debug, info};

use super::script::{
    ALREADY_MARKER, CHANGED_MARKER, EnsureServiceStateScript, ListProcessesScript,
    NOT_FOUND_MARKER, PROCESS_FIELD_SEPARATOR, PingScript, QueryServiceScript, RemoteScript,
    ps_quote,
};
use super::{EnsureReply, ProcessInfo, RemoteTransport};
use crate::error::{OrchestratorError, Result};
use crate::types::{Credentials, DesiredState, Host, ServiceState};

/// Environment variable carrying the username into the child process
pub const USER_ENV: &str = "UPDATE_ORCH_USER";
/// Environment variable carrying the secret into the child process
pub const SECRET_ENV: &str = "UPDATE_ORCH_SECRET";

/// Transport backed by PowerShell remoting
#[derive(Debug, Clone)]
pub struct PowerShellTransport {
    executable: String,
}

impl Default for PowerShellTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl PowerShellTransport {
    pub fn new() -> Self {
        Self {
            executable: "powershell".to_string(),
        }
    }

    /// Use a different PowerShell binary (e.g. `pwsh`)
    pub fn with_executable(mut self, executable: impl Into<String>) -> Self {
        self.executable = executable.into();
        self
    }

    /// Full command text for a script, without any secret material
    pub fn command_text<T: RemoteScript>(script: &T) -> String {
        if !script.runs_remotely() {
            return format!("$ErrorActionPreference = 'Stop'; {}", script.script_block());
        }
        format!(
            "$ErrorActionPreference = 'Stop'; \
             $sec = ConvertTo-SecureString $env:{SECRET_ENV} -AsPlainText -Force; \
             $cred = New-Object System.Management.Automation.PSCredential($env:{USER_ENV}, $sec); \
             Invoke-Command -ComputerName {} -Credential $cred -ScriptBlock {{ {} }}",
            ps_quote(script.host()),
            script.script_block()
        )
    }

    /// Execute a script and return its trimmed stdout.
    ///
    /// Non-zero exit codes and spawn failures become `Transport` errors.
    fn run<T: RemoteScript>(
        &self,
        script: &T,
        credentials: Option<&Credentials>,
    ) -> Result<String> {
        let command_text = Self::command_text(script);
        debug!(
            "powershell {} on {} (mutating={})",
            script.action_name(),
            script.host(),
            script.is_mutating()
        );

        let mut cmd = Command::new(&self.executable);
        cmd.args(["-NoProfile", "-NonInteractive", "-Command", &command_text])
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        if let Some(creds) = credentials {
            cmd.env(USER_ENV, creds.username())
                .env(SECRET_ENV, creds.secret());
        }

        let output = cmd.output().map_err(|e| {
            OrchestratorError::transport(
                script.host(),
                format!("failed to spawn {}: {}", self.executable, e),
            )
        })?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if output.status.success() {
            Ok(stdout)
        } else {
            let code = output.status.code().unwrap_or(-1);
            let stderr = String::from_utf8_lossy(&output.stderr);
            info!("{} on {} failed with exit code {}", script.action_name(), script.host(), code);
            Err(OrchestratorError::transport(
                script.host(),
                format!("{} exited with code {}: {}", script.action_name(), code, stderr.trim()),
            ))
        }
    }
}

/// Interpret the output of [`QueryServiceScript`]
pub fn parse_service_status(output: &str) -> Option<ServiceState> {
    match output.trim() {
        NOT_FOUND_MARKER => None,
        "Running" => Some(ServiceState::Running),
        "Stopped" => Some(ServiceState::Stopped),
        // StartPending, StopPending, Paused, ...
        _ => Some(ServiceState::Transitioning),
    }
}

/// Interpret the marker line printed by [`EnsureServiceStateScript`].
///
/// Only the last non-empty line counts, so warnings echoed by the cmdlets
/// before it are ignored. Returns `None` when no marker is recognised.
pub fn parse_ensure_reply(output: &str) -> Option<EnsureReply> {
    let last = output.lines().rev().map(str::trim).find(|l| !l.is_empty())?;
    match last {
        NOT_FOUND_MARKER => Some(EnsureReply::NotFound),
        ALREADY_MARKER => Some(EnsureReply::AlreadyInState),
        _ => {
            let mut fields = last.splitn(3, PROCESS_FIELD_SEPARATOR);
            if fields.next()? != CHANGED_MARKER {
                return None;
            }
            let before = parse_service_status(fields.next()?)?;
            let after = parse_service_status(fields.next()?)?;
            Some(EnsureReply::Changed { before, after })
        }
    }
}

/// Interpret the output of [`ListProcessesScript`]; malformed lines are skipped
pub fn parse_process_list(output: &str) -> Vec<ProcessInfo> {
    output
        .lines()
        .filter_map(|line| {
            let mut fields = line.trim().splitn(3, PROCESS_FIELD_SEPARATOR);
            let pid = fields.next()?.parse().ok()?;
            let name = fields.next()?;
            let description = fields.next().unwrap_or_default();
            Some(ProcessInfo::new(pid, name, description))
        })
        .collect()
}

impl RemoteTransport for PowerShellTransport {
    fn is_reachable(&mut self, host: &Host) -> bool {
        let ping = PingScript {
            host: host.name().to_string(),
        };
        self.run(&ping, None)
            .map(|out| out.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    fn query_service(
        &mut self,
        host: &Host,
        service: &str,
        credentials: &Credentials,
    ) -> Result<Option<ServiceState>> {
        let script = QueryServiceScript {
            host: host.name().to_string(),
            service: service.to_string(),
        };
        let output = self.run(&script, Some(credentials))?;
        Ok(parse_service_status(&output))
    }

    fn ensure_service_state(
        &mut self,
        host: &Host,
        service: &str,
        desired: DesiredState,
        settle: Duration,
        credentials: &Credentials,
    ) -> Result<EnsureReply> {
        let script = EnsureServiceStateScript {
            host: host.name().to_string(),
            service: service.to_string(),
            desired,
            settle,
        };
        let output = self.run(&script, Some(credentials))?;
        parse_ensure_reply(&output).ok_or_else(|| {
            OrchestratorError::transport(
                host.name(),
                format!("unrecognised ensure_service_state reply: {:?}", output),
            )
        })
    }

    fn list_processes(
        &mut self,
        host: &Host,
        credentials: &Credentials,
    ) -> Result<Vec<ProcessInfo>> {
        let script = ListProcessesScript {
            host: host.name().to_string(),
        };
        let output = self.run(&script, Some(credentials))?;
        Ok(parse_process_list(&output))
    }
}
