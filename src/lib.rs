pub mod config;
pub mod directory;
pub mod membership;
pub mod reconciliation;
pub mod roster;
pub mod server;
pub mod sync;
pub mod utils;

// Re-export commonly used types
pub use config::{read_config, write_config, ConfigError, SectionConfig, SyncConfig};
pub use directory::snapshot::{
    list_snapshots, read_snapshot, restore_snapshot, take_snapshot, write_snapshot, GroupSnapshot,
    RestoreOptions, RestoreReport, SnapshotError, SnapshotGroup,
};
pub use directory::{
    DirectoryApplier, DirectoryError, GroupDirectory, InMemoryDirectory, JsonFileDirectory,
};
pub use membership::{canonicalize_gmail, is_valid_email, normalize_email, MembershipSet};
pub use reconciliation::{
    build_reconciliation_plan, reconcile, ApplyError, GroupReconciliationResult,
    MembershipApplier, OperationKind, OperationOutcome, OperationStatus, ReconcileError,
    ReconciliationPlan,
};
pub use roster::{GroupType, Member, MembershipSource, Roster, RosterFile, Section, SourceError};
pub use server::{BearerAuth, OsmSyncService};
pub use sync::{run_sync, GroupSyncReport, SyncOptions, SyncStatus, SyncSummary, TriggeredBy};
