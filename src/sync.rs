//! File sync engine
//!
//! Copies every file matching a [`FileFilter`] from a source directory into a
//! destination directory, then reconciles by comparing matching-file counts.
//!
//! Batches are best-effort: a failing file is logged and the remaining files
//! are still attempted. Reconciliation is count-only; it cannot detect a
//! destination with the right number of files but different content.

use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::error::OrchestratorError;
use crate::outcome::Outcome;
use crate::run_log::RunLog;

/// Selects files by extension (case-insensitive, without the dot)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFilter {
    extension: String,
}

impl FileFilter {
    pub fn extension(extension: &str) -> Self {
        Self {
            extension: extension.trim_start_matches('.').to_lowercase(),
        }
    }

    pub fn matches(&self, path: &Path) -> bool {
        path.extension()
            .map(|ext| ext.to_string_lossy().to_lowercase() == self.extension)
            .unwrap_or(false)
    }

    /// Regular files in `dir` matching the filter, sorted by name
    pub fn matching_files(&self, dir: &Path) -> std::io::Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        for entry in fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && self.matches(&path) {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }
}

/// Result of one source → destination batch
#[derive(Debug)]
pub struct SyncReport {
    pub source: PathBuf,
    pub destination: PathBuf,
    pub copied: Vec<PathBuf>,
    pub failures: Vec<OrchestratorError>,
    pub source_count: usize,
    pub destination_count: usize,
}

impl SyncReport {
    fn new(source: &Path, destination: &Path) -> Self {
        Self {
            source: source.to_path_buf(),
            destination: destination.to_path_buf(),
            copied: Vec::new(),
            failures: Vec::new(),
            source_count: 0,
            destination_count: 0,
        }
    }

    /// Source and destination hold the same number of matching files
    pub fn is_reconciled(&self) -> bool {
        self.source_count == self.destination_count
    }

    /// `Failed` if anything could not be read or copied, otherwise `Succeeded`.
    /// A bare count mismatch is reported as a warning but stays `Succeeded`.
    pub fn outcome(&self) -> Outcome {
        if self.failures.is_empty() {
            Outcome::Succeeded
        } else {
            Outcome::Failed
        }
    }
}

/// Copy matching files from `source` to `destination` and reconcile counts.
pub fn sync_directory(
    source: &Path,
    destination: &Path,
    filter: &FileFilter,
    log: &mut RunLog,
) -> SyncReport {
    let mut report = SyncReport::new(source, destination);
    log.info(format!(
        "Copying *.{} from {} to {}",
        filter.extension,
        source.display(),
        destination.display()
    ));

    let files = match filter.matching_files(source) {
        Ok(files) => files,
        Err(e) => {
            let err = OrchestratorError::MissingPath {
                path: source.to_path_buf(),
            };
            log.error(format!("{} ({})", err, e));
            report.failures.push(err);
            return report;
        }
    };
    report.source_count = files.len();

    if let Err(e) = fs::create_dir_all(destination) {
        // Every copy below will fail and be logged individually
        log.error(format!(
            "Cannot create destination {}: {}",
            destination.display(),
            e
        ));
    }

    for file in &files {
        let Some(name) = file.file_name() else {
            continue;
        };
        let target = destination.join(name);
        match fs::copy(file, &target) {
            Ok(bytes) => {
                debug!("copied {} ({} bytes)", file.display(), bytes);
                log.success(format!(
                    "Copied {} to {}",
                    name.to_string_lossy(),
                    destination.display()
                ));
                report.copied.push(target);
            }
            Err(e) => {
                let err = OrchestratorError::FileCopyFailure {
                    source_file: file.clone(),
                    destination: target,
                    reason: e.to_string(),
                };
                log.error(err.to_string());
                report.failures.push(err);
            }
        }
    }

    report.destination_count = filter
        .matching_files(destination)
        .map(|f| f.len())
        .unwrap_or(0);

    if report.is_reconciled() {
        log.info(format!(
            "File count verified for {}: {} = {}",
            destination.display(),
            report.source_count,
            report.destination_count
        ));
    } else {
        let err = OrchestratorError::CountMismatch {
            source_count: report.source_count,
            destination_count: report.destination_count,
        };
        log.warning(format!("{} ({})", err, destination.display()));
    }

    report
}

/// Fan one source out to several destinations, one at a time.
///
/// Each destination gets its own independent reconciliation.
pub fn distribute(
    source: &Path,
    destinations: &[PathBuf],
    filter: &FileFilter,
    log: &mut RunLog,
) -> Vec<SyncReport> {
    destinations
        .iter()
        .map(|destination| sync_directory(source, destination, filter, log))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_is_case_insensitive() {
        let filter = FileFilter::extension(".TAX");
        assert!(filter.matches(Path::new("forms/1040.tax")));
        assert!(filter.matches(Path::new("forms/1040.Tax")));
        assert!(!filter.matches(Path::new("forms/1040.txt")));
        assert!(!filter.matches(Path::new("forms/tax")));
    }

    #[test]
    fn test_missing_source_is_reported_not_panicked() {
        let dir = tempfile::tempdir().unwrap();
        let mut log = RunLog::in_memory().quiet();
        let report = sync_directory(
            &dir.path().join("absent"),
            &dir.path().join("dest"),
            &FileFilter::extension("txt"),
            &mut log,
        );
        assert_eq!(report.outcome(), Outcome::Failed);
        assert!(report.copied.is_empty());
    }

    #[test]
    fn test_non_matching_files_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir(&src).unwrap();
        fs::write(src.join("keep.txt"), "a").unwrap();
        fs::write(src.join("skip.log"), "b").unwrap();

        let mut log = RunLog::in_memory().quiet();
        let dest = dir.path().join("dest");
        let report = sync_directory(&src, &dest, &FileFilter::extension("txt"), &mut log);

        assert_eq!(report.copied.len(), 1);
        assert!(!dest.join("skip.log").exists());
        assert!(report.is_reconciled());
    }
}
