use serde::{Deserialize, Serialize};

/// Kind of membership change
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationKind {
    Add,
    Remove,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::Add => "add",
            OperationKind::Remove => "remove",
        }
    }
}

/// What happened to a planned operation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationStatus {
    Applied,
    SkippedDryRun,
    Failed,
}

impl OperationStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationStatus::Applied => "applied",
            OperationStatus::SkippedDryRun => "skipped_dry_run",
            OperationStatus::Failed => "failed",
        }
    }
}

/// Record of one attempted add or remove
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OperationOutcome {
    pub email: String,
    pub kind: OperationKind,
    pub status: OperationStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
}

impl OperationOutcome {
    pub fn applied(email: &str, kind: OperationKind) -> Self {
        Self {
            email: email.to_string(),
            kind,
            status: OperationStatus::Applied,
            error_detail: None,
        }
    }

    pub fn skipped(email: &str, kind: OperationKind) -> Self {
        Self {
            email: email.to_string(),
            kind,
            status: OperationStatus::SkippedDryRun,
            error_detail: None,
        }
    }

    pub fn failed(email: &str, kind: OperationKind, detail: String) -> Self {
        Self {
            email: email.to_string(),
            kind,
            status: OperationStatus::Failed,
            error_detail: Some(detail),
        }
    }
}

/// Aggregate result of reconciling one group.
///
/// In dry-run mode `added_count` and `removed_count` report the planned
/// operations, since every one of them is `SkippedDryRun`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupReconciliationResult {
    pub group_name: String,
    pub added_count: usize,
    pub removed_count: usize,
    pub unchanged_count: usize,
    /// Outcomes whose status is `Failed`
    pub errors: Vec<OperationOutcome>,
    /// Every planned operation, in the order it was processed
    pub outcomes: Vec<OperationOutcome>,
    pub dry_run: bool,
}

impl GroupReconciliationResult {
    /// True when no operation failed
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }

    /// Addresses added (or planned for addition in dry-run mode)
    pub fn added_emails(&self) -> Vec<&str> {
        self.counted_emails(OperationKind::Add)
    }

    /// Addresses removed (or planned for removal in dry-run mode)
    pub fn removed_emails(&self) -> Vec<&str> {
        self.counted_emails(OperationKind::Remove)
    }

    fn counted_emails(&self, kind: OperationKind) -> Vec<&str> {
        self.outcomes
            .iter()
            .filter(|o| o.kind == kind && o.status != OperationStatus::Failed)
            .map(|o| o.email.as_str())
            .collect()
    }
}
