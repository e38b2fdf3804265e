//! Validation gate behaviour

use update_orchestrator::remote::SimulatedTransport;
use update_orchestrator::run_log::RunLog;
use update_orchestrator::types::{Host, LogLevel};
use update_orchestrator::validator::validate;

#[test]
fn one_unreachable_host_fails_gate_with_exactly_one_error() {
    let dir = tempfile::tempdir().unwrap();
    let mut transport = SimulatedTransport::new()
        .with_host("TAX-APP01")
        .with_host("TAX-APP02")
        .with_unreachable_host("TAX-APP03");
    let mut log = RunLog::in_memory().quiet();

    let report = validate(
        &mut transport,
        &[
            Host::primary("TAX-APP01"),
            Host::target("TAX-APP02"),
            Host::target("TAX-APP03"),
        ],
        &[dir.path().to_path_buf()],
        &mut log,
    );

    assert!(!report.is_ok());
    assert_eq!(report.checks, 4);

    let errors: Vec<_> = log
        .entries()
        .iter()
        .filter(|e| e.level == LogLevel::Error)
        .collect();
    assert_eq!(errors.len(), 1);
    assert_eq!(errors[0].message, "Host TAX-APP03 is unreachable");
}

#[test]
fn checks_continue_after_first_failure() {
    let mut transport = SimulatedTransport::new().with_host("B");
    let mut log = RunLog::in_memory().quiet();

    let report = validate(
        &mut transport,
        &[Host::primary("A"), Host::target("B")],
        &[],
        &mut log,
    );

    // A is unknown to the simulation, B is still pinged
    assert_eq!(report.unreachable_hosts(), vec!["A"]);
    assert_eq!(transport.calls().len(), 2);
    assert_eq!(log.entries().last().unwrap().level, LogLevel::Success);
}
