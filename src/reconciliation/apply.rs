use async_trait::async_trait;
use thiserror::Error;

/// Failure reported by a [`MembershipApplier`] for a single operation.
///
/// The engine records the `Display` text verbatim and carries on with the
/// next operation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    #[error("Member {0} already exists")]
    AlreadyMember(String),

    #[error("Member {0} not found")]
    MemberNotFound(String),

    #[error("Group {0} not found")]
    GroupNotFound(String),

    #[error("{0}")]
    Failed(String),
}

impl ApplyError {
    /// Errors that mean the group already has the state the operation wanted
    pub fn is_idempotent(&self) -> bool {
        matches!(self, ApplyError::AlreadyMember(_) | ApplyError::MemberNotFound(_))
    }
}

/// Capability the engine uses to change a group's membership.
///
/// Timeouts and retries belong to the implementation, not to the engine.
#[async_trait]
pub trait MembershipApplier: Send + Sync {
    async fn add(&self, group_name: &str, email: &str) -> Result<(), ApplyError>;

    async fn remove(&self, group_name: &str, email: &str) -> Result<(), ApplyError>;
}
