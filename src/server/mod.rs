use crate::config::SyncConfig;
use crate::directory::snapshot::{
    list_snapshots, read_snapshot, restore_snapshot, snapshot_path, take_snapshot, write_snapshot,
    RestoreOptions,
};
use crate::directory::GroupDirectory;
use crate::reconciliation::OperationOutcome as InternalOutcome;
use crate::roster::RosterFile;
use crate::sync::{run_sync, GroupSyncReport, SyncOptions, SyncStatus, SyncSummary, TriggeredBy};
use crate::utils::{now_iso, OSM_SYNC_VERSION, ROSTER_FILE, SNAPSHOTS_FOLDER};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use tokio::sync::Mutex;
use tonic::metadata::MetadataValue;
use tonic::service::Interceptor;
use tonic::{Request, Response, Status};
use tracing::{info, warn};

// Import generated protobuf types
pub mod proto {
    tonic::include_proto!("osm_sync");
}

use proto::osm_sync_server::OsmSync;
use proto::*;

pub const SERVICE_NAME: &str = "osm-sync";

pub struct OsmSyncService {
    config: SyncConfig,
    state_path: PathBuf,
    directory: Arc<dyn GroupDirectory>,
    tolerate_idempotent_errors: bool,
    // Sync, snapshot and restore never overlap
    run_lock: Mutex<()>,
}

impl OsmSyncService {
    pub fn new(config: SyncConfig, state_path: PathBuf, directory: Arc<dyn GroupDirectory>) -> Self {
        Self {
            config,
            state_path,
            directory,
            tolerate_idempotent_errors: true,
            run_lock: Mutex::new(()),
        }
    }

    /// Whether "already a member" and "not a member" count as applied during
    /// sync and restore
    pub fn with_idempotent_tolerance(mut self, tolerate: bool) -> Self {
        self.tolerate_idempotent_errors = tolerate;
        self
    }

    fn snapshots_path(&self) -> PathBuf {
        self.state_path.join(SNAPSHOTS_FOLDER)
    }

    fn roster_path(&self) -> PathBuf {
        self.state_path.join(ROSTER_FILE)
    }
}

#[tonic::async_trait]
impl OsmSync for OsmSyncService {
    async fn run_sync(
        &self,
        request: Request<RunSyncRequest>,
    ) -> Result<Response<RunSyncResponse>, Status> {
        let req = request.into_inner();

        let triggered_by: TriggeredBy = req
            .triggered_by
            .parse()
            .map_err(|e: String| Status::invalid_argument(e))?;
        let options = SyncOptions {
            dry_run: req.dry_run,
            triggered_by,
            tolerate_idempotent_errors: self.tolerate_idempotent_errors,
        };

        let _guard = self.run_lock.lock().await;

        let summary = match RosterFile::load(&self.roster_path()).await {
            Ok(source) => {
                run_sync(&self.config, &source, self.directory.as_ref(), options).await
            }
            Err(e) => {
                warn!(error = %e, "Sync run could not load roster");
                failed_summary(&options, e.to_string())
            }
        };

        Ok(Response::new(summary_to_proto(&summary)))
    }

    async fn take_snapshot(
        &self,
        _request: Request<TakeSnapshotRequest>,
    ) -> Result<Response<TakeSnapshotResponse>, Status> {
        let _guard = self.run_lock.lock().await;

        let snapshot = take_snapshot(&self.config, self.directory.as_ref()).await;

        match write_snapshot(&self.snapshots_path(), &snapshot).await {
            Ok(path) => Ok(Response::new(TakeSnapshotResponse {
                success: true,
                error: String::new(),
                file_name: file_name_of(&path),
                group_count: snapshot.groups.len() as u32,
                member_count: snapshot.member_count() as u32,
            })),
            Err(e) => Ok(Response::new(TakeSnapshotResponse {
                success: false,
                error: e.to_string(),
                file_name: String::new(),
                group_count: 0,
                member_count: 0,
            })),
        }
    }

    async fn list_snapshots(
        &self,
        _request: Request<ListSnapshotsRequest>,
    ) -> Result<Response<ListSnapshotsResponse>, Status> {
        match list_snapshots(&self.snapshots_path()).await {
            Ok(file_names) => Ok(Response::new(ListSnapshotsResponse { file_names })),
            Err(e) => Err(Status::internal(e.to_string())),
        }
    }

    async fn restore_snapshot(
        &self,
        request: Request<RestoreSnapshotRequest>,
    ) -> Result<Response<RestoreSnapshotResponse>, Status> {
        let req = request.into_inner();

        let path = snapshot_path(&self.snapshots_path(), &req.file_name)
            .map_err(|e| Status::invalid_argument(e.to_string()))?;

        let _guard = self.run_lock.lock().await;

        let snapshot = match read_snapshot(&path).await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                return Ok(Response::new(RestoreSnapshotResponse {
                    success: false,
                    error: e.to_string(),
                    groups: vec![],
                    skipped_groups: vec![],
                }))
            }
        };

        info!(file = %req.file_name, dry_run = req.dry_run, "Restoring snapshot");
        let options = RestoreOptions {
            dry_run: req.dry_run,
            tolerate_idempotent_errors: self.tolerate_idempotent_errors,
        };
        let report = restore_snapshot(&snapshot, self.directory.as_ref(), options).await;

        let errors: Vec<String> = report
            .groups
            .iter()
            .flat_map(GroupSyncReport::error_messages)
            .collect();

        Ok(Response::new(RestoreSnapshotResponse {
            success: errors.is_empty(),
            error: errors.join("; "),
            groups: report.groups.iter().map(group_report_to_proto).collect(),
            skipped_groups: report.skipped_groups,
        }))
    }

    async fn health(
        &self,
        _request: Request<HealthRequest>,
    ) -> Result<Response<HealthResponse>, Status> {
        Ok(Response::new(HealthResponse {
            status: "healthy".to_string(),
            service: SERVICE_NAME.to_string(),
            version: OSM_SYNC_VERSION.to_string(),
        }))
    }
}

/// Rejects requests that lack `authorization: Bearer <token>` when a token is set
#[derive(Clone, Default)]
pub struct BearerAuth {
    expected: Option<MetadataValue<tonic::metadata::Ascii>>,
}

impl BearerAuth {
    /// `None` or an empty token disables the check
    pub fn new(token: Option<&str>) -> Result<Self, Status> {
        let expected = match token.map(str::trim).filter(|t| !t.is_empty()) {
            Some(token) => Some(
                format!("Bearer {}", token)
                    .parse()
                    .map_err(|_| Status::internal("Scheduler token is not valid header text"))?,
            ),
            None => None,
        };
        Ok(Self { expected })
    }

    pub fn is_enabled(&self) -> bool {
        self.expected.is_some()
    }
}

impl Interceptor for BearerAuth {
    fn call(&mut self, request: Request<()>) -> Result<Request<()>, Status> {
        let Some(expected) = &self.expected else {
            return Ok(request);
        };

        match request.metadata().get("authorization") {
            Some(value) if token_matches(value.as_bytes(), expected.as_bytes()) => Ok(request),
            Some(_) => Err(Status::unauthenticated("Invalid bearer token")),
            None => Err(Status::unauthenticated("Missing bearer token")),
        }
    }
}

fn token_matches(presented: &[u8], expected: &[u8]) -> bool {
    presented.ct_eq(expected).into()
}

fn failed_summary(options: &SyncOptions, error: String) -> SyncSummary {
    let now = now_iso();
    SyncSummary {
        run_id: uuid::Uuid::new_v4().to_string(),
        started_at: now.clone(),
        finished_at: now,
        triggered_by: options.triggered_by,
        dry_run: options.dry_run,
        status: SyncStatus::Failed,
        sections_synced: 0,
        groups_synced: 0,
        total_added: 0,
        total_removed: 0,
        groups: vec![],
        errors: vec![error],
    }
}

fn file_name_of(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .unwrap_or_default()
}

// Helper functions for converting internal types to proto types

fn summary_to_proto(summary: &SyncSummary) -> RunSyncResponse {
    RunSyncResponse {
        run_id: summary.run_id.clone(),
        status: summary.status.as_str().to_string(),
        triggered_by: summary.triggered_by.as_str().to_string(),
        dry_run: summary.dry_run,
        sections_synced: summary.sections_synced as u32,
        groups_synced: summary.groups_synced as u32,
        total_added: summary.total_added as u32,
        total_removed: summary.total_removed as u32,
        errors: summary.errors.clone(),
        groups: summary.groups.iter().map(group_report_to_proto).collect(),
        started_at: summary.started_at.clone(),
        finished_at: summary.finished_at.clone(),
    }
}

fn group_report_to_proto(report: &GroupSyncReport) -> GroupResult {
    let (added_count, removed_count, unchanged_count, outcomes) = match &report.result {
        Some(result) => (
            result.added_count as u32,
            result.removed_count as u32,
            result.unchanged_count as u32,
            result.outcomes.iter().map(outcome_to_proto).collect(),
        ),
        None => (0, 0, 0, vec![]),
    };

    GroupResult {
        section_id: report.section_id.clone(),
        group_type: report.group_type.as_str().to_string(),
        group_email: report.group_email.clone(),
        added_count,
        removed_count,
        unchanged_count,
        outcomes,
        error: report.error.clone().unwrap_or_default(),
    }
}

fn outcome_to_proto(outcome: &InternalOutcome) -> OperationOutcome {
    OperationOutcome {
        email: outcome.email.clone(),
        kind: outcome.kind.as_str().to_string(),
        status: outcome.status.as_str().to_string(),
        error_detail: outcome.error_detail.clone().unwrap_or_default(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SectionConfig;
    use crate::directory::InMemoryDirectory;
    use tempfile::TempDir;

    const ROSTER_JSON: &str = r#"{
        "sections": [{
            "sectionId": "100",
            "sectionName": "Tuesday Scouts",
            "section": "scouts",
            "members": [{
                "memberId": "1",
                "firstName": "Alex",
                "lastName": "Leader",
                "dateOfBirth": "1980-01-01",
                "patrol": "Leaders",
                "sectionId": "100",
                "emails": ["alex@example.com"]
            }]
        }]
    }"#;

    async fn service(temp: &TempDir) -> (OsmSyncService, Arc<InMemoryDirectory>) {
        let mut config = SyncConfig::new("example.org");
        config.sections.push(SectionConfig {
            id: "100".to_string(),
            email_prefix: "tue".to_string(),
        });

        let directory = Arc::new(InMemoryDirectory::new());
        for group_type in &config.group_types {
            let email = config.group_email(&config.sections[0], *group_type);
            directory.create_group(&email, ["old@example.com"]).await;
        }

        tokio::fs::write(temp.path().join(ROSTER_FILE), ROSTER_JSON)
            .await
            .unwrap();

        let service = OsmSyncService::new(config, temp.path().to_path_buf(), directory.clone());
        (service, directory)
    }

    #[tokio::test]
    async fn test_run_sync_applies_changes() {
        let temp = TempDir::new().unwrap();
        let (service, directory) = service(&temp).await;

        let response = service
            .run_sync(Request::new(RunSyncRequest {
                dry_run: false,
                triggered_by: "manual".to_string(),
            }))
            .await
            .unwrap()
            .into_inner();

        assert_eq!(response.status, "success");
        assert_eq!(response.triggered_by, "manual");
        assert_eq!(response.sections_synced, 1);
        assert_eq!(response.groups_synced, 3);
        assert_eq!(response.total_added, 1);
        assert_eq!(response.total_removed, 3);

        let leaders = directory.list_members("tueleaders@example.org").await.unwrap();
        assert_eq!(leaders.to_vec(), vec!["alex@example.com"]);
    }

    #[tokio::test]
    async fn test_run_sync_rejects_unknown_trigger() {
        let temp = TempDir::new().unwrap();
        let (service, _) = service(&temp).await;

        let status = service
            .run_sync(Request::new(RunSyncRequest {
                dry_run: true,
                triggered_by: "cron".to_string(),
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_run_sync_without_roster_fails() {
        let temp = TempDir::new().unwrap();
        let (service, _) = service(&temp).await;
        tokio::fs::remove_file(temp.path().join(ROSTER_FILE))
            .await
            .unwrap();

        let response = service
            .run_sync(Request::new(RunSyncRequest::default()))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(response.status, "failed");
        assert_eq!(response.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_snapshot_then_restore() {
        let temp = TempDir::new().unwrap();
        let (service, directory) = service(&temp).await;

        let taken = service
            .take_snapshot(Request::new(TakeSnapshotRequest {}))
            .await
            .unwrap()
            .into_inner();
        assert!(taken.success);
        assert_eq!(taken.group_count, 3);
        assert_eq!(taken.member_count, 3);

        let listed = service
            .list_snapshots(Request::new(ListSnapshotsRequest {}))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(listed.file_names, vec![taken.file_name.clone()]);

        directory
            .remove_member("tueparents@example.org", "old@example.com")
            .await
            .unwrap();

        let restored = service
            .restore_snapshot(Request::new(RestoreSnapshotRequest {
                file_name: taken.file_name,
                dry_run: false,
            }))
            .await
            .unwrap()
            .into_inner();
        assert!(restored.success);

        let parents = directory.list_members("tueparents@example.org").await.unwrap();
        assert_eq!(parents.to_vec(), vec!["old@example.com"]);
    }

    #[tokio::test]
    async fn test_restore_rejects_path_outside_snapshots() {
        let temp = TempDir::new().unwrap();
        let (service, _) = service(&temp).await;

        let status = service
            .restore_snapshot(Request::new(RestoreSnapshotRequest {
                file_name: "../config.json".to_string(),
                dry_run: true,
            }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
    }

    #[tokio::test]
    async fn test_health() {
        let temp = TempDir::new().unwrap();
        let (service, _) = service(&temp).await;

        let health = service
            .health(Request::new(HealthRequest {}))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(health.status, "healthy");
        assert_eq!(health.version, OSM_SYNC_VERSION);
    }

    #[test]
    fn test_bearer_auth() {
        let mut auth = BearerAuth::new(Some("s3cret")).unwrap();
        assert!(auth.is_enabled());

        let mut ok = Request::new(());
        ok.metadata_mut()
            .insert("authorization", "Bearer s3cret".parse().unwrap());
        assert!(auth.call(ok).is_ok());

        let mut wrong = Request::new(());
        wrong
            .metadata_mut()
            .insert("authorization", "Bearer nope".parse().unwrap());
        assert_eq!(
            auth.call(wrong).unwrap_err().code(),
            tonic::Code::Unauthenticated
        );

        assert_eq!(
            auth.call(Request::new(())).unwrap_err().code(),
            tonic::Code::Unauthenticated
        );
    }

    #[test]
    fn test_bearer_auth_rejects_near_misses() {
        let mut auth = BearerAuth::new(Some("s3cret")).unwrap();
        for presented in ["Bearer s3cre", "Bearer s3cret2", "bearer s3cret", "s3cret"] {
            let mut request = Request::new(());
            request
                .metadata_mut()
                .insert("authorization", presented.parse().unwrap());
            assert!(auth.call(request).is_err(), "{presented} was accepted");
        }
    }

    #[test]
    fn test_token_matches() {
        assert!(token_matches(b"Bearer abc", b"Bearer abc"));
        assert!(!token_matches(b"Bearer abd", b"Bearer abc"));
        assert!(!token_matches(b"Bearer ab", b"Bearer abc"));
    }

    #[test]
    fn test_bearer_auth_disabled_without_token() {
        let mut auth = BearerAuth::new(Some("  ")).unwrap();
        assert!(!auth.is_enabled());
        assert!(auth.call(Request::new(())).is_ok());
    }
}
