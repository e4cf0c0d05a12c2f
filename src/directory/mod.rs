//! Current group membership: the directory interface, local
//! implementations, and the adapter that lets the reconciliation engine
//! drive a directory.

mod file;
mod memory;
pub mod snapshot;

pub use file::JsonFileDirectory;
pub use memory::{GroupTable, InMemoryDirectory};

use crate::membership::MembershipSet;
use crate::reconciliation::{ApplyError, MembershipApplier};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DirectoryError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Group {0} not found")]
    GroupNotFound(String),

    #[error("Member {email} already exists in {group}")]
    AlreadyMember { group: String, email: String },

    #[error("Member {email} not found in {group}")]
    MemberNotFound { group: String, email: String },

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),

    #[error("Directory unavailable: {0}")]
    Unavailable(String),
}

/// Group membership store (Google Workspace in production)
#[async_trait]
pub trait GroupDirectory: Send + Sync {
    /// Current members of a group, normalized
    async fn list_members(&self, group_email: &str) -> Result<MembershipSet, DirectoryError>;

    async fn add_member(&self, group_email: &str, email: &str) -> Result<(), DirectoryError>;

    async fn remove_member(&self, group_email: &str, email: &str) -> Result<(), DirectoryError>;
}

impl From<DirectoryError> for ApplyError {
    fn from(err: DirectoryError) -> Self {
        match err {
            DirectoryError::AlreadyMember { email, .. } => ApplyError::AlreadyMember(email),
            DirectoryError::MemberNotFound { email, .. } => ApplyError::MemberNotFound(email),
            DirectoryError::GroupNotFound(group) => ApplyError::GroupNotFound(group),
            other => ApplyError::Failed(other.to_string()),
        }
    }
}

/// Exposes a [`GroupDirectory`] as the engine's [`MembershipApplier`].
pub struct DirectoryApplier<'a, D: ?Sized> {
    directory: &'a D,
    tolerate_idempotent_errors: bool,
}

impl<'a, D: GroupDirectory + ?Sized> DirectoryApplier<'a, D> {
    pub fn new(directory: &'a D) -> Self {
        Self {
            directory,
            tolerate_idempotent_errors: false,
        }
    }

    /// Treat "already a member" on add and "not found" on remove as success
    pub fn tolerate_idempotent_errors(mut self, tolerate: bool) -> Self {
        self.tolerate_idempotent_errors = tolerate;
        self
    }

    fn settle(&self, result: Result<(), DirectoryError>) -> Result<(), ApplyError> {
        match result.map_err(ApplyError::from) {
            Err(e) if self.tolerate_idempotent_errors && e.is_idempotent() => Ok(()),
            other => other,
        }
    }
}

#[async_trait]
impl<'a, D: GroupDirectory + ?Sized> MembershipApplier for DirectoryApplier<'a, D> {
    async fn add(&self, group_name: &str, email: &str) -> Result<(), ApplyError> {
        self.settle(self.directory.add_member(group_name, email).await)
    }

    async fn remove(&self, group_name: &str, email: &str) -> Result<(), ApplyError> {
        self.settle(self.directory.remove_member(group_name, email).await)
    }
}
