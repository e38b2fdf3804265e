//! Deterministic path derivation
//!
//! Backup destinations and remote administrative-share paths are pure
//! functions of run metadata; nothing here touches the filesystem.
//!
//! Paths are built as strings with the separator of the root they extend, so
//! Windows-style roots (`D:\Backup`) produce Windows-style paths on any
//! platform the orchestrator runs on.

use chrono::{Datelike, Local, NaiveDate};
use std::path::PathBuf;

/// Default deployment label prefix
pub const DEFAULT_BACKUP_PREFIX: &str = "TaxFileupdate";

/// Join `part` onto `base` using the separator style of `base`
pub fn join(base: &str, part: &str) -> String {
    let sep = if base.contains('\\') { '\\' } else { '/' };
    let base = base.trim_end_matches(['\\', '/']);
    let part = part.trim_start_matches(['\\', '/']);
    format!("{}{}{}", base, sep, part)
}

/// `"<prefix>_<month><year>"`, e.g. `TaxFileupdate_Jun2024`
pub fn deployment_label(prefix: &str, month: &str, year: &str) -> String {
    format!("{}_{}{}", prefix, month, year)
}

/// `<root>/<prefix>_<month><year>/<month>/<sub_area>`
pub fn derive_backup_path(
    root: &str,
    prefix: &str,
    month: &str,
    year: &str,
    sub_area: &str,
) -> PathBuf {
    BackupManifest::new(root, prefix, month, year).path(month, sub_area)
}

/// Backup layout of one run: a fixed label plus per-phase month folders.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupManifest {
    root: String,
    label: String,
}

impl BackupManifest {
    pub fn new(root: &str, prefix: &str, month: &str, year: &str) -> Self {
        Self {
            root: root.to_string(),
            label: deployment_label(prefix, month, year),
        }
    }

    /// Manifest labelled with the calendar's current month and year
    pub fn for_calendar(root: &str, prefix: &str, calendar: &RunCalendar) -> Self {
        Self::new(root, prefix, &calendar.current_month, &calendar.year)
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Destination of one sub-area under the given month folder
    pub fn path(&self, folder_month: &str, sub_area: &str) -> PathBuf {
        let labelled = join(&self.root, &self.label);
        PathBuf::from(join(&join(&labelled, folder_month), sub_area))
    }
}

/// Which side of the update a backup captures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupPhase {
    /// Filed under the previous month
    PreUpdate,
    /// Filed under the current month
    PostUpdate,
}

/// Month names and year for one run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunCalendar {
    pub current_month: String,
    pub previous_month: String,
    pub year: String,
}

impl RunCalendar {
    pub fn from_date(date: NaiveDate) -> Self {
        let previous = date
            .with_day(1)
            .and_then(|first| first.pred_opt())
            .unwrap_or(date);
        Self {
            current_month: date.format("%b").to_string(),
            previous_month: previous.format("%b").to_string(),
            year: date.year().to_string(),
        }
    }

    pub fn today() -> Self {
        Self::from_date(Local::now().date_naive())
    }

    /// Month folder used for a backup phase
    pub fn folder_month(&self, phase: BackupPhase) -> &str {
        match phase {
            BackupPhase::PreUpdate => &self.previous_month,
            BackupPhase::PostUpdate => &self.current_month,
        }
    }
}

/// Map a local-style path onto the host's administrative share.
///
/// `D:\TaxApp\Data` on `TAX-APP02` becomes `\\TAX-APP02\D$\TaxApp\Data`.
/// Paths without a drive letter are returned unchanged.
pub fn admin_share_path(host: &str, local_path: &str) -> String {
    let mut chars = local_path.chars();
    match (chars.next(), chars.next()) {
        (Some(drive), Some(':')) if drive.is_ascii_alphabetic() => {
            let rest = local_path[2..].trim_start_matches(['\\', '/']).replace('/', "\\");
            if rest.is_empty() {
                format!("\\\\{}\\{}$", host, drive.to_ascii_uppercase())
            } else {
                format!("\\\\{}\\{}$\\{}", host, drive.to_ascii_uppercase(), rest)
            }
        }
        _ => local_path.to_string(),
    }
}
