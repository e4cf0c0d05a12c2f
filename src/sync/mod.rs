//! A full sync run: every configured section and group type, reconciled
//! from the roster into the group directory.

use crate::config::{SectionConfig, SyncConfig};
use crate::directory::{DirectoryApplier, GroupDirectory};
use crate::reconciliation::{reconcile, GroupReconciliationResult};
use crate::roster::{GroupType, MembershipSource};
use crate::utils::now_iso;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{error, info, warn};

/// Who asked for a run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggeredBy {
    #[default]
    Scheduler,
    Manual,
    Api,
}

impl TriggeredBy {
    pub fn as_str(&self) -> &'static str {
        match self {
            TriggeredBy::Scheduler => "scheduler",
            TriggeredBy::Manual => "manual",
            TriggeredBy::Api => "api",
        }
    }
}

impl fmt::Display for TriggeredBy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TriggeredBy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "" | "scheduler" => Ok(TriggeredBy::Scheduler),
            "manual" => Ok(TriggeredBy::Manual),
            "api" => Ok(TriggeredBy::Api),
            other => Err(format!("Unknown trigger: {}", other)),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncStatus {
    /// Every group reconciled without a failure
    Success,
    /// Some groups or operations failed; everything else was applied
    CompletedWithErrors,
    /// The run could not start
    Failed,
}

impl SyncStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStatus::Success => "success",
            SyncStatus::CompletedWithErrors => "completed_with_errors",
            SyncStatus::Failed => "failed",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    pub dry_run: bool,
    pub triggered_by: TriggeredBy,
    /// Count "already a member" and "not a member" responses as applied
    pub tolerate_idempotent_errors: bool,
}

/// Outcome for one section group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupSyncReport {
    pub section_id: String,
    pub group_type: GroupType,
    pub group_email: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<GroupReconciliationResult>,
    /// Set when the group could not be reconciled at all
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl GroupSyncReport {
    fn reconciled(
        section_id: &str,
        group_type: GroupType,
        group_email: &str,
        result: GroupReconciliationResult,
    ) -> Self {
        Self {
            section_id: section_id.to_string(),
            group_type,
            group_email: group_email.to_string(),
            result: Some(result),
            error: None,
        }
    }

    fn failed(section_id: &str, group_type: GroupType, group_email: &str, error: String) -> Self {
        Self {
            section_id: section_id.to_string(),
            group_type,
            group_email: group_email.to_string(),
            result: None,
            error: Some(error),
        }
    }

    /// Operation failures as readable lines, plus the group-level error if any
    pub fn error_messages(&self) -> Vec<String> {
        let mut messages = Vec::new();
        if let Some(error) = &self.error {
            messages.push(format!("{}: {}", self.group_email, error));
        }
        if let Some(result) = &self.result {
            for failure in &result.errors {
                messages.push(format!(
                    "{}: {} {}: {}",
                    self.group_email,
                    failure.kind.as_str(),
                    failure.email,
                    failure.error_detail.as_deref().unwrap_or_default()
                ));
            }
        }
        messages
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncSummary {
    pub run_id: String,
    pub started_at: String,
    pub finished_at: String,
    pub triggered_by: TriggeredBy,
    pub dry_run: bool,
    pub status: SyncStatus,
    pub sections_synced: usize,
    pub groups_synced: usize,
    pub total_added: usize,
    pub total_removed: usize,
    pub groups: Vec<GroupSyncReport>,
    pub errors: Vec<String>,
}

impl SyncSummary {
    fn start(options: &SyncOptions) -> Self {
        Self {
            run_id: uuid::Uuid::new_v4().to_string(),
            started_at: now_iso(),
            finished_at: String::new(),
            triggered_by: options.triggered_by,
            dry_run: options.dry_run,
            status: SyncStatus::Success,
            sections_synced: 0,
            groups_synced: 0,
            total_added: 0,
            total_removed: 0,
            groups: Vec::new(),
            errors: Vec::new(),
        }
    }

    fn push(&mut self, report: GroupSyncReport) {
        if let Some(result) = &report.result {
            self.groups_synced += 1;
            self.total_added += result.added_count;
            self.total_removed += result.removed_count;
        }
        self.errors.extend(report.error_messages());
        self.groups.push(report);
    }

    fn finish(mut self) -> Self {
        if self.status != SyncStatus::Failed && !self.errors.is_empty() {
            self.status = SyncStatus::CompletedWithErrors;
        }
        self.finished_at = now_iso();
        self
    }
}

/// Reconcile every configured group from `source` into `directory`.
///
/// Failures for one group never stop the run. An invalid config fails the
/// run before any group is touched.
pub async fn run_sync(
    config: &SyncConfig,
    source: &dyn MembershipSource,
    directory: &dyn GroupDirectory,
    options: SyncOptions,
) -> SyncSummary {
    let mut summary = SyncSummary::start(&options);

    info!(
        run_id = %summary.run_id,
        triggered_by = %options.triggered_by,
        dry_run = options.dry_run,
        sections = config.sections.len(),
        "Starting sync run"
    );

    if let Err(e) = config.validate() {
        error!(run_id = %summary.run_id, error = %e, "Sync run could not start");
        summary.status = SyncStatus::Failed;
        summary.errors.push(e.to_string());
        return summary.finish();
    }

    let applier = DirectoryApplier::new(directory)
        .tolerate_idempotent_errors(options.tolerate_idempotent_errors);

    for section in &config.sections {
        for &group_type in &config.group_types {
            let report = sync_group(config, section, group_type, source, directory, &applier, &options).await;
            log_group_report(&summary.run_id, &report);
            summary.push(report);
        }
        summary.sections_synced += 1;
    }

    let summary = summary.finish();

    info!(
        run_id = %summary.run_id,
        status = summary.status.as_str(),
        sections_synced = summary.sections_synced,
        groups_synced = summary.groups_synced,
        total_added = summary.total_added,
        total_removed = summary.total_removed,
        errors = summary.errors.len(),
        "Sync run finished"
    );

    summary
}

async fn sync_group(
    config: &SyncConfig,
    section: &SectionConfig,
    group_type: GroupType,
    source: &dyn MembershipSource,
    directory: &dyn GroupDirectory,
    applier: &DirectoryApplier<'_, dyn GroupDirectory + '_>,
    options: &SyncOptions,
) -> GroupSyncReport {
    let group_email = config.group_email(section, group_type);
    let fail = |error: String| GroupSyncReport::failed(&section.id, group_type, &group_email, error);

    let desired = match source.desired_members(&section.id, group_type).await {
        Ok(desired) => desired,
        Err(e) => return fail(e.to_string()),
    };

    let current = match directory.list_members(&group_email).await {
        Ok(current) => current,
        Err(e) => return fail(e.to_string()),
    };

    match reconcile(&current, &desired, &group_email, applier, options.dry_run).await {
        Ok(result) => GroupSyncReport::reconciled(&section.id, group_type, &group_email, result),
        Err(e) => fail(e.to_string()),
    }
}

fn log_group_report(run_id: &str, report: &GroupSyncReport) {
    match (&report.result, &report.error) {
        (Some(result), _) if result.is_success() => info!(
            run_id = %run_id,
            section_id = %report.section_id,
            group_type = %report.group_type,
            group_email = %report.group_email,
            added = ?result.added_emails(),
            removed = ?result.removed_emails(),
            dry_run = result.dry_run,
            "Group synced"
        ),
        (Some(result), _) => warn!(
            run_id = %run_id,
            section_id = %report.section_id,
            group_type = %report.group_type,
            group_email = %report.group_email,
            added = result.added_count,
            removed = result.removed_count,
            failed = result.errors.len(),
            dry_run = result.dry_run,
            "Group synced with errors"
        ),
        (None, error) => warn!(
            run_id = %run_id,
            section_id = %report.section_id,
            group_type = %report.group_type,
            group_email = %report.group_email,
            error = error.as_deref().unwrap_or_default(),
            "Group sync failed"
        ),
    }
}
