//! The fixed deployment workflow built from [`Settings`].
//!
//! Order: stop the service everywhere, confirm it stopped, back up the
//! primary, let the operator run the update tool, back up again, push the
//! updated files to targets and fleets, restart, and hand over to the operator
//! for final verification.

use std::path::PathBuf;

use crate::config::Settings;
use crate::gate::ManualInstruction;
use crate::paths::{BackupManifest, BackupPhase, RunCalendar, admin_share_path, join};
use crate::step::{
    ConfirmStoppedStep, DistributeStep, DistributionBatch, DistributionTarget, ServiceStep,
    StepAction, StepDefinition, SyncJob, SyncStep, VerifyStep,
};
use crate::sync::FileFilter;
use crate::types::{DesiredState, Host};

/// Validation gate plus the ordered step list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Workflow {
    gate: VerifyStep,
    steps: Vec<StepDefinition>,
}

impl Workflow {
    pub fn new(gate: VerifyStep, steps: Vec<StepDefinition>) -> Self {
        Self { gate, steps }
    }

    pub fn gate(&self) -> &VerifyStep {
        &self.gate
    }

    pub fn steps(&self) -> &[StepDefinition] {
        &self.steps
    }

    /// Build the standard update workflow for one run.
    pub fn from_settings(settings: &Settings, calendar: &RunCalendar) -> Self {
        let mut builder = StepBuilder::default();
        let primary = settings.primary_host();
        let service_hosts = settings.service_hosts();
        let targets = settings.target_hosts();
        let filter = FileFilter::extension(&settings.file_extension);
        let manifest =
            BackupManifest::for_calendar(&settings.backup_root, &settings.backup_prefix, calendar);

        builder.push(
            "Stop service on primary and targets",
            StepAction::Service(ServiceStep {
                service: settings.service_name.clone(),
                desired: DesiredState::Stopped,
                hosts: service_hosts.clone(),
            }),
        );

        builder.push(
            "Confirm service and processes are stopped",
            StepAction::ConfirmStopped(ConfirmStoppedStep {
                service: settings.service_name.clone(),
                process_descriptor: settings.process_descriptor.clone(),
                hosts: service_hosts.clone(),
            }),
        );

        builder.push(
            "Back up primary data (pre-update)",
            StepAction::Sync(backup_step(
                settings,
                &primary,
                &manifest,
                calendar.folder_month(BackupPhase::PreUpdate),
                &filter,
            )),
        );

        builder.push(
            format!("Run {} on primary", settings.update_tool),
            StepAction::Manual(ManualInstruction::new(
                format!("Run {}", settings.update_tool),
                primary.name(),
                vec![
                    format!("Log on to {} as an administrator", primary.name()),
                    format!("Open {}", settings.update_tool),
                    format!("Load the update package from {}", settings.source_root),
                    "Apply the update and wait for it to report completion".to_string(),
                    format!("Close {}", settings.update_tool),
                ],
            )),
        );

        builder.push(
            "Back up primary data (post-update)",
            StepAction::Sync(backup_step(
                settings,
                &primary,
                &manifest,
                calendar.folder_month(BackupPhase::PostUpdate),
                &filter,
            )),
        );

        if !targets.is_empty() {
            builder.push(
                "Verify target hosts before distribution",
                StepAction::Verify(VerifyStep {
                    hosts: targets.clone(),
                    paths: targets
                        .iter()
                        .map(|t| PathBuf::from(admin_share_path(t.name(), &settings.data_path)))
                        .collect(),
                }),
            );

            let post_month = calendar.folder_month(BackupPhase::PostUpdate);
            builder.push(
                "Distribute updated files to targets",
                StepAction::Distribute(DistributeStep {
                    filter: filter.clone(),
                    batches: settings
                        .sub_areas
                        .iter()
                        .map(|sub_area| DistributionBatch {
                            source: manifest.path(post_month, sub_area),
                            targets: targets
                                .iter()
                                .map(|t| DistributionTarget {
                                    host: t.clone(),
                                    destination: PathBuf::from(admin_share_path(
                                        t.name(),
                                        &join(&settings.data_path, sub_area),
                                    )),
                                })
                                .collect(),
                        })
                        .collect(),
                }),
            );

            for target in &targets {
                builder.push(
                    format!("Check {} on {}", settings.update_tool, target.name()),
                    StepAction::Manual(ManualInstruction::new(
                        format!("Check {}", settings.update_tool),
                        target.name(),
                        vec![
                            format!("Log on to {}", target.name()),
                            format!(
                                "Open {} and confirm it shows the new version",
                                settings.update_tool
                            ),
                            format!("Close {}", settings.update_tool),
                        ],
                    )),
                );
            }
        }

        let post_month = calendar.folder_month(BackupPhase::PostUpdate);
        for fleet in &settings.fleets {
            let batches = settings
                .sub_areas
                .iter()
                .map(|sub_area| DistributionBatch {
                    source: manifest.path(post_month, sub_area),
                    targets: fleet
                        .members
                        .iter()
                        .flat_map(|member| {
                            let host = Host::fleet_member(&member.host);
                            member.destinations.iter().map(move |dest| DistributionTarget {
                                host: host.clone(),
                                destination: PathBuf::from(admin_share_path(
                                    host.name(),
                                    &join(dest, sub_area),
                                )),
                            })
                        })
                        .collect(),
                })
                .collect();

            builder.push(
                format!("Distribute updated files to fleet '{}'", fleet.name),
                StepAction::Distribute(DistributeStep {
                    filter: filter.clone(),
                    batches,
                }),
            );
        }

        builder.push(
            "Start service on primary and targets",
            StepAction::Service(ServiceStep {
                service: settings.service_name.clone(),
                desired: DesiredState::Running,
                hosts: service_hosts,
            }),
        );

        builder.push(
            "Final verification",
            StepAction::Manual(ManualInstruction::new(
                "Final verification",
                primary.name(),
                vec![
                    format!("Confirm '{}' is running on every host", settings.service_name),
                    "Open a sample return and check the updated forms load".to_string(),
                    "Review the run summary for warnings and errors".to_string(),
                ],
            )),
        );

        Self::new(
            VerifyStep {
                hosts: settings.all_hosts(),
                paths: settings.gate_paths(),
            },
            builder.steps,
        )
    }

    /// Plan text: the gate followed by one line per step
    pub fn describe(&self) -> String {
        let mut out = format!(
            "Validation gate: {} host(s), {} path(s)\n",
            self.gate.hosts.len(),
            self.gate.paths.len()
        );
        for step in &self.steps {
            out.push_str(&step.to_string());
            out.push('\n');
        }
        out
    }
}

#[derive(Default)]
struct StepBuilder {
    steps: Vec<StepDefinition>,
}

impl StepBuilder {
    fn push(&mut self, label: impl Into<String>, action: StepAction) {
        let ordinal = self.steps.len() + 1;
        self.steps.push(StepDefinition::new(ordinal, label, action));
    }
}

fn backup_step(
    settings: &Settings,
    primary: &Host,
    manifest: &BackupManifest,
    folder_month: &str,
    filter: &FileFilter,
) -> SyncStep {
    SyncStep {
        filter: filter.clone(),
        jobs: settings
            .sub_areas
            .iter()
            .map(|sub_area| SyncJob {
                host: primary.clone(),
                source: PathBuf::from(admin_share_path(
                    primary.name(),
                    &join(&settings.data_path, sub_area),
                )),
                destination: manifest.path(folder_month, sub_area),
            })
            .collect(),
    }
}
