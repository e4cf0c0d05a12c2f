mod apply;
mod execute;
mod outcome;
mod plan;

pub use apply::{ApplyError, MembershipApplier};
pub use execute::{reconcile, ReconcileError};
pub use outcome::{GroupReconciliationResult, OperationKind, OperationOutcome, OperationStatus};
pub use plan::{build_reconciliation_plan, ReconciliationPlan};
