//! Settings files on disk

use std::fs;

use update_orchestrator::config::Settings;
use update_orchestrator::paths::RunCalendar;
use update_orchestrator::workflow::Workflow;

const SETTINGS: &str = r#"{
    "primary": "TAX-APP01",
    "targets": ["TAX-APP02"],
    "fleets": [
        {
            "name": "branches",
            "members": [
                { "host": "BR-NORTH", "destinations": ["E:\\Tax"] },
                { "host": "BR-SOUTH", "destinations": ["E:\\Tax", "F:\\Archive\\Tax"] }
            ]
        }
    ],
    "service_name": "TaxEngine",
    "process_descriptor": "Tax Engine",
    "file_extension": "tax",
    "data_path": "D:\\TaxApp\\Data",
    "sub_areas": ["TaxData", "StateData"],
    "source_root": "D:\\Updates",
    "backup_root": "D:\\Backup",
    "log_root": "D:\\Logs",
    "settle_interval_secs": 10
}"#;

#[test]
fn load_validate_and_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("settings.json");
    fs::write(&path, SETTINGS).unwrap();

    let settings = Settings::load_from_file(&path).unwrap();
    settings.validate().unwrap();
    assert_eq!(settings.all_hosts().len(), 4);
    assert_eq!(settings.settle_interval().as_secs(), 10);

    let copy = dir.path().join("copy.json");
    settings.save_to_file(&copy).unwrap();
    assert_eq!(Settings::load_from_file(&copy).unwrap(), settings);
}

#[test]
fn missing_file_has_context() {
    let dir = tempfile::tempdir().unwrap();
    let err = Settings::load_from_file(dir.path().join("nope.json")).unwrap_err();
    assert!(format!("{:#}", err).contains("Failed to read settings"));
}

#[test]
fn malformed_json_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.json");
    fs::write(&path, "{ \"primary\": ").unwrap();
    let err = Settings::load_from_file(&path).unwrap_err();
    assert!(err.to_string().contains("Failed to parse settings JSON"));
}

#[test]
fn empty_service_name_fails_validation() {
    let mut settings: Settings = serde_json::from_str(SETTINGS).unwrap();
    settings.service_name = "  ".to_string();
    assert!(settings.validate().is_err());
}

#[test]
fn plan_covers_every_fleet_destination() {
    let settings: Settings = serde_json::from_str(SETTINGS).unwrap();
    let calendar = RunCalendar::from_date(chrono::NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
    let workflow = Workflow::from_settings(&settings, &calendar);

    let plan = workflow.describe();
    assert!(plan.contains("Distribute updated files to fleet 'branches'"));
    assert!(plan.contains("Validation gate: 4 host(s), 2 path(s)"));

    // January backups before the update are filed under the previous December
    assert_eq!(calendar.previous_month, "Dec");
}
