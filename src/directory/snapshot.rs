use super::{DirectoryApplier, GroupDirectory};
use crate::config::SyncConfig;
use crate::membership::MembershipSet;
use crate::reconciliation::reconcile;
use crate::roster::GroupType;
use crate::sync::GroupSyncReport;
use crate::utils::{now_iso, read_json, write_json_atomic};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tracing::{info, warn};

const SNAPSHOT_PREFIX: &str = "group_snapshot_";

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Snapshot not found: {0}")]
    NotFound(String),

    #[error("Invalid snapshot name: {0}")]
    InvalidName(String),
}

/// Recorded state of one group
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotGroup {
    pub full_email: String,
    pub section_id: String,
    pub group_type: GroupType,
    #[serde(default)]
    pub members: MembershipSet,
    /// Why the group could not be read. Such entries are never restored.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl SnapshotGroup {
    pub fn member_count(&self) -> usize {
        self.members.len()
    }
}

/// Membership of every configured group at a point in time, keyed by group name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupSnapshot {
    pub timestamp: String,
    pub domain: String,
    pub groups: BTreeMap<String, SnapshotGroup>,
}

impl GroupSnapshot {
    pub fn member_count(&self) -> usize {
        self.groups.values().map(SnapshotGroup::member_count).sum()
    }

    /// File name this snapshot is written under
    pub fn file_name(&self) -> String {
        let stamp = chrono::DateTime::parse_from_rfc3339(&self.timestamp)
            .map(|t| t.format("%Y%m%d_%H%M%S").to_string())
            .unwrap_or_else(|_| chrono::Utc::now().format("%Y%m%d_%H%M%S").to_string());
        format!("{}{}.json", SNAPSHOT_PREFIX, stamp)
    }
}

/// Result of restoring a snapshot
#[derive(Debug, Clone, Default)]
pub struct RestoreReport {
    pub groups: Vec<GroupSyncReport>,
    /// Group names skipped because their snapshot entry recorded an error
    pub skipped_groups: Vec<String>,
}

impl RestoreReport {
    pub fn is_success(&self) -> bool {
        self.groups.iter().all(|g| g.error_messages().is_empty())
    }
}

/// Capture every configured group's current members
pub async fn take_snapshot(config: &SyncConfig, directory: &dyn GroupDirectory) -> GroupSnapshot {
    let mut groups = BTreeMap::new();

    for section in &config.sections {
        for &group_type in &config.group_types {
            let group_name = config.group_name(section, group_type);
            let full_email = config.group_email(section, group_type);

            let entry = match directory.list_members(&full_email).await {
                Ok(members) => {
                    info!(group = %group_name, members = members.len(), "Snapshotted group");
                    SnapshotGroup {
                        full_email,
                        section_id: section.id.clone(),
                        group_type,
                        members,
                        error: None,
                    }
                }
                Err(e) => {
                    warn!(group = %group_name, error = %e, "Could not snapshot group");
                    SnapshotGroup {
                        full_email,
                        section_id: section.id.clone(),
                        group_type,
                        members: MembershipSet::new(),
                        error: Some(e.to_string()),
                    }
                }
            };
            groups.insert(group_name, entry);
        }
    }

    GroupSnapshot {
        timestamp: now_iso(),
        domain: config.domain.clone(),
        groups,
    }
}

/// Write a snapshot into `dir`, returning its path.
///
/// An existing snapshot is never overwritten: a second snapshot taken in the
/// same second is written as `group_snapshot_YYYYMMDD_HHMMSS_1.json` and so on.
pub async fn write_snapshot(dir: &Path, snapshot: &GroupSnapshot) -> Result<PathBuf, SnapshotError> {
    let path = unused_path(dir, &snapshot.file_name());
    write_json_atomic(&path, snapshot).await?;

    info!(
        path = %path.display(),
        groups = snapshot.groups.len(),
        members = snapshot.member_count(),
        "Saved snapshot"
    );

    Ok(path)
}

fn unused_path(dir: &Path, file_name: &str) -> PathBuf {
    let path = dir.join(file_name);
    if !path.exists() {
        return path;
    }

    let stem = file_name.trim_end_matches(".json");
    (1..)
        .map(|n| dir.join(format!("{}_{}.json", stem, n)))
        .find(|candidate| !candidate.exists())
        .unwrap_or(path)
}

pub async fn read_snapshot(path: &Path) -> Result<GroupSnapshot, SnapshotError> {
    read_json(path)
        .await?
        .ok_or_else(|| SnapshotError::NotFound(path.display().to_string()))
}

/// Resolve a snapshot file name inside `dir`, refusing anything that is not
/// a plain snapshot file name
pub fn snapshot_path(dir: &Path, file_name: &str) -> Result<PathBuf, SnapshotError> {
    let has_separator = file_name.contains(|c: char| c == '/' || c == '\\');
    if !is_snapshot_file_name(file_name) || has_separator || file_name.contains("..") {
        return Err(SnapshotError::InvalidName(file_name.to_string()));
    }
    Ok(dir.join(file_name))
}

/// Snapshot file names in `dir`, newest first
pub async fn list_snapshots(dir: &Path) -> Result<Vec<String>, SnapshotError> {
    if !dir.exists() {
        return Ok(Vec::new());
    }

    let mut names = Vec::new();
    let mut entries = fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        if let Some(name) = entry.file_name().to_str() {
            if is_snapshot_file_name(name) {
                names.push(name.to_string());
            }
        }
    }

    // Timestamped names sort chronologically
    names.sort_unstable_by(|a, b| b.cmp(a));
    Ok(names)
}

fn is_snapshot_file_name(name: &str) -> bool {
    name.starts_with(SNAPSHOT_PREFIX) && name.ends_with(".json")
}

/// How a restore applies its changes
#[derive(Debug, Clone, Copy, Default)]
pub struct RestoreOptions {
    pub dry_run: bool,
    /// Same meaning as [`crate::sync::SyncOptions::tolerate_idempotent_errors`]
    pub tolerate_idempotent_errors: bool,
}

/// Reconcile every recorded group back to its snapshot membership
pub async fn restore_snapshot(
    snapshot: &GroupSnapshot,
    directory: &dyn GroupDirectory,
    options: RestoreOptions,
) -> RestoreReport {
    let RestoreOptions {
        dry_run,
        tolerate_idempotent_errors,
    } = options;
    let applier =
        DirectoryApplier::new(directory).tolerate_idempotent_errors(tolerate_idempotent_errors);
    let mut report = RestoreReport::default();

    for (group_name, entry) in &snapshot.groups {
        if let Some(error) = &entry.error {
            warn!(group = %group_name, error = %error, "Skipping group with snapshot error");
            report.skipped_groups.push(group_name.clone());
            continue;
        }

        let current = match directory.list_members(&entry.full_email).await {
            Ok(current) => current,
            Err(e) => {
                report.groups.push(restore_failed(entry, e.to_string()));
                continue;
            }
        };

        let group = match reconcile(&current, &entry.members, &entry.full_email, &applier, dry_run).await {
            Ok(result) => {
                info!(
                    group = %group_name,
                    added = result.added_count,
                    removed = result.removed_count,
                    dry_run,
                    "Restored group"
                );
                GroupSyncReport {
                    section_id: entry.section_id.clone(),
                    group_type: entry.group_type,
                    group_email: entry.full_email.clone(),
                    result: Some(result),
                    error: None,
                }
            }
            Err(e) => restore_failed(entry, e.to_string()),
        };
        report.groups.push(group);
    }

    report
}

fn restore_failed(entry: &SnapshotGroup, error: String) -> GroupSyncReport {
    warn!(group = %entry.full_email, error = %error, "Could not restore group");
    GroupSyncReport {
        section_id: entry.section_id.clone(),
        group_type: entry.group_type,
        group_email: entry.full_email.clone(),
        result: None,
        error: Some(error),
    }
}
