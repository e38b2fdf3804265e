//! Run settings: loading, saving and validating the JSON settings document.
//!
//! The orchestrator consumes `Settings` read-only; everything here is checked
//! once before the run starts.

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::paths::DEFAULT_BACKUP_PREFIX;
use crate::types::Host;

/// A host in an additional fleet with its own destination paths
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetMemberConfig {
    pub host: String,
    /// Local-style destination paths on the member (e.g. `E:\Tax\Data`)
    pub destinations: Vec<String>,
}

/// A named group of hosts processed after the primary/target sequence
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FleetConfig {
    pub name: String,
    pub members: Vec<FleetMemberConfig>,
}

/// Settings for one deployment run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    // Hosts
    pub primary: String,
    #[serde(default)]
    pub targets: Vec<String>,
    #[serde(default)]
    pub fleets: Vec<FleetConfig>,

    // Service control
    pub service_name: String,
    /// Matched against process description/name after the service stops
    pub process_descriptor: String,
    #[serde(default = "default_settle_interval_secs")]
    pub settle_interval_secs: u64,

    // Files
    /// Extension of the files the sync engine copies (without the dot)
    pub file_extension: String,
    /// Local-style data directory, identical on primary and targets
    pub data_path: String,
    /// Sub-areas under `data_path` that are backed up and distributed
    pub sub_areas: Vec<String>,
    /// Where the update package is staged for the operator
    pub source_root: String,
    pub backup_root: String,
    #[serde(default = "default_backup_prefix")]
    pub backup_prefix: String,
    pub log_root: String,

    /// Extra paths that must exist before the run starts
    #[serde(default)]
    pub required_paths: Vec<String>,

    /// Name of the GUI tool the operator runs (shown in manual steps)
    #[serde(default = "default_update_tool")]
    pub update_tool: String,
}

fn default_settle_interval_secs() -> u64 {
    5
}

fn default_backup_prefix() -> String {
    DEFAULT_BACKUP_PREFIX.to_string()
}

fn default_update_tool() -> String {
    "Update Manager".to_string()
}

impl Settings {
    /// Load settings from a JSON file
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read settings from {:?}", path.as_ref()))?;

        let settings: Self =
            serde_json::from_str(&content).context("Failed to parse settings JSON")?;

        Ok(settings)
    }

    /// Save settings to a JSON file
    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let json =
            serde_json::to_string_pretty(self).context("Failed to serialize settings to JSON")?;

        fs::write(&path, json)
            .with_context(|| format!("Failed to write settings to {:?}", path.as_ref()))?;

        Ok(())
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if self.primary.trim().is_empty() {
            bail!("Primary host must be specified");
        }

        // Host names must be unique across primary, targets and fleets
        let mut seen = HashSet::new();
        for name in self.all_host_names() {
            if name.trim().is_empty() {
                bail!("Host names cannot be empty");
            }
            if !seen.insert(name.to_ascii_lowercase()) {
                bail!("Host '{}' is listed more than once", name);
            }
        }

        if self.service_name.trim().is_empty() {
            bail!("Service name must be specified");
        }
        if self.process_descriptor.trim().is_empty() {
            bail!("Process descriptor must be specified");
        }

        let ext = self.file_extension.trim().trim_start_matches('.');
        if ext.is_empty() {
            bail!("File extension must be specified");
        }
        if ext.contains(['/', '\\', '*']) {
            bail!("File extension must be a bare extension like 'tax'");
        }

        if self.sub_areas.is_empty() {
            bail!("At least one sub-area must be specified");
        }
        if self.sub_areas.iter().any(|s| s.trim().is_empty()) {
            bail!("Sub-area names cannot be empty");
        }

        for (label, value) in [
            ("Data path", &self.data_path),
            ("Source root", &self.source_root),
            ("Backup root", &self.backup_root),
            ("Log root", &self.log_root),
            ("Backup prefix", &self.backup_prefix),
        ] {
            if value.trim().is_empty() {
                bail!("{} must be specified", label);
            }
        }

        for fleet in &self.fleets {
            if fleet.name.trim().is_empty() {
                bail!("Fleet names cannot be empty");
            }
            for member in &fleet.members {
                if member.destinations.is_empty() {
                    bail!(
                        "Fleet '{}' member '{}' has no destination paths",
                        fleet.name,
                        member.host
                    );
                }
            }
        }

        Ok(())
    }

    fn all_host_names(&self) -> impl Iterator<Item = &str> {
        std::iter::once(self.primary.as_str())
            .chain(self.targets.iter().map(String::as_str))
            .chain(
                self.fleets
                    .iter()
                    .flat_map(|f| f.members.iter().map(|m| m.host.as_str())),
            )
    }

    pub fn primary_host(&self) -> Host {
        Host::primary(&self.primary)
    }

    pub fn target_hosts(&self) -> Vec<Host> {
        self.targets.iter().map(Host::target).collect()
    }

    pub fn fleet_hosts(&self) -> Vec<Host> {
        self.fleets
            .iter()
            .flat_map(|f| f.members.iter().map(|m| Host::fleet_member(&m.host)))
            .collect()
    }

    /// Primary followed by targets, in configuration order
    pub fn service_hosts(&self) -> Vec<Host> {
        std::iter::once(self.primary_host())
            .chain(self.target_hosts())
            .collect()
    }

    /// Every host in the run
    pub fn all_hosts(&self) -> Vec<Host> {
        let mut hosts = self.service_hosts();
        hosts.extend(self.fleet_hosts());
        hosts
    }

    pub fn settle_interval(&self) -> Duration {
        Duration::from_secs(self.settle_interval_secs)
    }

    /// Paths the validation gate requires
    pub fn gate_paths(&self) -> Vec<PathBuf> {
        [&self.source_root, &self.backup_root]
            .into_iter()
            .chain(self.required_paths.iter())
            .map(PathBuf::from)
            .collect()
    }
}
