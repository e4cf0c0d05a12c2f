use super::memory::GroupTable;
use super::{DirectoryError, GroupDirectory};
use crate::membership::MembershipSet;
use crate::utils::{read_json, write_json_atomic};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Directory persisted as a JSON map of group address to member list.
///
/// Each mutation is applied to a copy of the table and written out while the
/// lock is held. The copy replaces the live table only once the file is
/// saved, so a failed write leaves memory matching disk.
#[derive(Debug)]
pub struct JsonFileDirectory {
    path: PathBuf,
    table: Mutex<GroupTable>,
}

impl JsonFileDirectory {
    /// Load the directory from `path`. A missing file starts an empty directory.
    pub async fn load(path: &Path) -> Result<Self, DirectoryError> {
        let table: GroupTable = read_json(path).await?.unwrap_or_default();

        info!(
            path = %path.display(),
            groups = table.group_emails().count(),
            "Loaded group directory"
        );

        Ok(Self {
            path: path.to_path_buf(),
            table: Mutex::new(table),
        })
    }

    /// Create a group, or replace its members if it already exists
    pub async fn create_group<S: AsRef<str>>(
        &self,
        group_email: &str,
        members: impl IntoIterator<Item = S>,
    ) -> Result<(), DirectoryError> {
        let mut table = self.table.lock().await;
        let mut updated = table.clone();
        updated.put_group(group_email, members);
        self.commit(&mut table, updated).await
    }

    /// Save `updated` and, only if that succeeds, make it the live table
    async fn commit(&self, table: &mut GroupTable, updated: GroupTable) -> Result<(), DirectoryError> {
        if let Err(e) = write_json_atomic(&self.path, &updated).await {
            warn!(path = %self.path.display(), error = %e, "Could not save group directory");
            return Err(e.into());
        }
        *table = updated;
        debug!(path = %self.path.display(), "Saved group directory");
        Ok(())
    }
}

#[async_trait]
impl GroupDirectory for JsonFileDirectory {
    async fn list_members(&self, group_email: &str) -> Result<MembershipSet, DirectoryError> {
        self.table.lock().await.list(group_email)
    }

    async fn add_member(&self, group_email: &str, email: &str) -> Result<(), DirectoryError> {
        let mut table = self.table.lock().await;
        let mut updated = table.clone();
        updated.add(group_email, email)?;
        self.commit(&mut table, updated).await
    }

    async fn remove_member(&self, group_email: &str, email: &str) -> Result<(), DirectoryError> {
        let mut table = self.table.lock().await;
        let mut updated = table.clone();
        updated.remove(group_email, email)?;
        self.commit(&mut table, updated).await
    }
}
