use super::apply::MembershipApplier;
use super::outcome::{GroupReconciliationResult, OperationKind, OperationOutcome, OperationStatus};
use super::plan::build_reconciliation_plan;
use crate::membership::MembershipSet;
use thiserror::Error;
use tracing::{debug, info, warn};

/// Caller contract violations. Per-member failures never surface here.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ReconcileError {
    #[error("Group name is required")]
    GroupNameRequired,
}

/// Reconcile one group's membership towards `desired`.
///
/// Every planned operation is attempted even when earlier ones fail. Failures
/// are captured as `Failed` outcomes with the applier's message. With
/// `dry_run` set the applier is never called and every planned operation is
/// recorded as `SkippedDryRun`.
pub async fn reconcile<A>(
    current: &MembershipSet,
    desired: &MembershipSet,
    group_name: &str,
    applier: &A,
    dry_run: bool,
) -> Result<GroupReconciliationResult, ReconcileError>
where
    A: MembershipApplier + ?Sized,
{
    if group_name.trim().is_empty() {
        return Err(ReconcileError::GroupNameRequired);
    }

    let plan = build_reconciliation_plan(current, desired);

    info!(
        group = %group_name,
        current = current.len(),
        desired = desired.len(),
        to_add = plan.to_add.len(),
        to_remove = plan.to_remove.len(),
        dry_run,
        "Reconciling group"
    );

    let mut result = GroupReconciliationResult {
        group_name: group_name.to_string(),
        unchanged_count: plan.unchanged.len(),
        dry_run,
        ..Default::default()
    };

    // Process additions
    for email in &plan.to_add {
        let outcome = if dry_run {
            OperationOutcome::skipped(email, OperationKind::Add)
        } else {
            match applier.add(group_name, email).await {
                Ok(()) => OperationOutcome::applied(email, OperationKind::Add),
                Err(e) => OperationOutcome::failed(email, OperationKind::Add, e.to_string()),
            }
        };
        record(&mut result, outcome);
    }

    // Process removals
    for email in &plan.to_remove {
        let outcome = if dry_run {
            OperationOutcome::skipped(email, OperationKind::Remove)
        } else {
            match applier.remove(group_name, email).await {
                Ok(()) => OperationOutcome::applied(email, OperationKind::Remove),
                Err(e) => OperationOutcome::failed(email, OperationKind::Remove, e.to_string()),
            }
        };
        record(&mut result, outcome);
    }

    if result.is_success() {
        info!(
            group = %group_name,
            added = result.added_count,
            removed = result.removed_count,
            unchanged = result.unchanged_count,
            "Group reconciled"
        );
    } else {
        warn!(
            group = %group_name,
            added = result.added_count,
            removed = result.removed_count,
            failed = result.errors.len(),
            "Group reconciled with errors"
        );
    }

    Ok(result)
}

/// Tally an outcome into the result
fn record(result: &mut GroupReconciliationResult, outcome: OperationOutcome) {
    match outcome.status {
        OperationStatus::Applied | OperationStatus::SkippedDryRun => {
            debug!(
                group = %result.group_name,
                email = %outcome.email,
                kind = outcome.kind.as_str(),
                status = outcome.status.as_str(),
                "Membership operation"
            );
            match outcome.kind {
                OperationKind::Add => result.added_count += 1,
                OperationKind::Remove => result.removed_count += 1,
            }
        }
        OperationStatus::Failed => {
            warn!(
                group = %result.group_name,
                email = %outcome.email,
                kind = outcome.kind.as_str(),
                error = outcome.error_detail.as_deref().unwrap_or_default(),
                "Membership operation failed"
            );
            result.errors.push(outcome.clone());
        }
    }
    result.outcomes.push(outcome);
}
