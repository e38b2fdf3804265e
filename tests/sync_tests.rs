//! File sync engine on real directories

use std::collections::BTreeSet;
use std::fs;
use std::path::Path;

use update_orchestrator::outcome::Outcome;
use update_orchestrator::run_log::RunLog;
use update_orchestrator::sync::{FileFilter, distribute, sync_directory};
use update_orchestrator::types::LogLevel;

fn names(dir: &Path) -> BTreeSet<String> {
    fs::read_dir(dir)
        .unwrap()
        .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
        .collect()
}

#[test]
fn copies_both_files_and_reports_count_match() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    let dest = dir.path().join("dest");
    fs::create_dir(&src).unwrap();
    fs::write(src.join("a.txt"), "alpha").unwrap();
    fs::write(src.join("b.txt"), "beta").unwrap();

    let mut log = RunLog::in_memory().quiet();
    let report = sync_directory(&src, &dest, &FileFilter::extension("txt"), &mut log);

    assert_eq!(
        names(&dest),
        ["a.txt", "b.txt"].iter().map(|s| s.to_string()).collect()
    );
    assert_eq!(report.outcome(), Outcome::Succeeded);
    assert!(report.is_reconciled());

    let last = log.entries().last().unwrap();
    assert_eq!(last.level, LogLevel::Info);
    assert!(last.message.ends_with("2 = 2"));
}

#[test]
fn one_failing_file_does_not_stop_the_batch() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    let dest = dir.path().join("dest");
    fs::create_dir(&src).unwrap();
    for name in ["a.txt", "b.txt", "c.txt"] {
        fs::write(src.join(name), name).unwrap();
    }
    // A directory where b.txt should land makes that one copy fail
    fs::create_dir_all(dest.join("b.txt")).unwrap();

    let mut log = RunLog::in_memory().quiet();
    let report = sync_directory(&src, &dest, &FileFilter::extension("txt"), &mut log);

    assert_eq!(report.copied.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.outcome(), Outcome::Failed);
    assert_eq!(report.source_count, 3);
    assert_eq!(report.destination_count, 2);

    let copy_lines = log
        .entries()
        .iter()
        .filter(|e| e.level == LogLevel::Success && e.message.starts_with("Copied"))
        .count();
    assert_eq!(copy_lines, 2);
    assert!(log.entries().iter().any(|e| e.level == LogLevel::Error));
    let last = log.entries().last().unwrap();
    assert_eq!(last.level, LogLevel::Warning);
    assert!(last.message.contains("source has 3, destination has 2"));
}

#[test]
fn distribution_reconciles_each_destination_independently() {
    let dir = tempfile::tempdir().unwrap();
    let src = dir.path().join("src");
    fs::create_dir(&src).unwrap();
    fs::write(src.join("form.tax"), "1040").unwrap();

    let good = dir.path().join("host-b");
    let stale = dir.path().join("host-c");
    fs::create_dir(&stale).unwrap();
    fs::write(stale.join("old.tax"), "stale").unwrap();

    let mut log = RunLog::in_memory().quiet();
    let reports = distribute(
        &src,
        &[good.clone(), stale.clone()],
        &FileFilter::extension("tax"),
        &mut log,
    );

    assert_eq!(reports.len(), 2);
    assert!(reports[0].is_reconciled());
    // Stale extra file makes the counts disagree; nothing failed to copy
    assert!(!reports[1].is_reconciled());
    assert_eq!(reports[1].outcome(), Outcome::Succeeded);
    assert!(good.join("form.tax").exists());
    assert!(stale.join("form.tax").exists());
}
