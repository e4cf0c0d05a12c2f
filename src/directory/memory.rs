use super::{DirectoryError, GroupDirectory};
use crate::membership::{canonicalize_gmail, normalize_email, MembershipSet};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use tokio::sync::Mutex;

/// Group address -> members, with the directory's membership rules
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    from = "BTreeMap<String, MembershipSet>",
    into = "BTreeMap<String, MembershipSet>"
)]
pub struct GroupTable {
    groups: BTreeMap<String, MembershipSet>,
}

impl From<BTreeMap<String, MembershipSet>> for GroupTable {
    fn from(raw: BTreeMap<String, MembershipSet>) -> Self {
        let mut table = GroupTable::new();
        for (group_email, members) in raw {
            table
                .groups
                .entry(group_key(&group_email))
                .or_default()
                .extend_from(&members.gmail_canonicalized());
        }
        table
    }
}

impl From<GroupTable> for BTreeMap<String, MembershipSet> {
    fn from(table: GroupTable) -> Self {
        table.groups
    }
}

impl GroupTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a group, or replace its members if it already exists
    pub fn put_group<S: AsRef<str>>(
        &mut self,
        group_email: &str,
        members: impl IntoIterator<Item = S>,
    ) {
        let members: MembershipSet = members.into_iter().collect();
        self.groups
            .insert(group_key(group_email), members.gmail_canonicalized());
    }

    pub fn group_emails(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn list(&self, group_email: &str) -> Result<MembershipSet, DirectoryError> {
        let members = self
            .groups
            .get(&group_key(group_email))
            .ok_or_else(|| DirectoryError::GroupNotFound(group_email.to_string()))?;

        Ok(members.clone())
    }

    pub fn add(&mut self, group_email: &str, email: &str) -> Result<(), DirectoryError> {
        let normalized = normalize_email(email)
            .map(|e| canonicalize_gmail(&e))
            .ok_or_else(|| DirectoryError::InvalidEmail(email.to_string()))?;
        let members = self
            .groups
            .get_mut(&group_key(group_email))
            .ok_or_else(|| DirectoryError::GroupNotFound(group_email.to_string()))?;

        if !members.insert(&normalized) {
            return Err(DirectoryError::AlreadyMember {
                group: group_email.to_string(),
                email: normalized,
            });
        }
        Ok(())
    }

    pub fn remove(&mut self, group_email: &str, email: &str) -> Result<(), DirectoryError> {
        let members = self
            .groups
            .get_mut(&group_key(group_email))
            .ok_or_else(|| DirectoryError::GroupNotFound(group_email.to_string()))?;

        let normalized = normalize_email(email)
            .map(|e| canonicalize_gmail(&e))
            .unwrap_or_else(|| email.trim().to_lowercase());
        if !members.remove(&normalized) {
            return Err(DirectoryError::MemberNotFound {
                group: group_email.to_string(),
                email: normalized,
            });
        }
        Ok(())
    }
}

fn group_key(group_email: &str) -> String {
    group_email.trim().to_lowercase()
}

/// Directory held entirely in memory
#[derive(Debug, Default)]
pub struct InMemoryDirectory {
    table: Mutex<GroupTable>,
}

impl InMemoryDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a group, or replace its members if it already exists
    pub async fn create_group<S: AsRef<str>>(
        &self,
        group_email: &str,
        members: impl IntoIterator<Item = S>,
    ) {
        self.table.lock().await.put_group(group_email, members);
    }
}

#[async_trait]
impl GroupDirectory for InMemoryDirectory {
    async fn list_members(&self, group_email: &str) -> Result<MembershipSet, DirectoryError> {
        self.table.lock().await.list(group_email)
    }

    async fn add_member(&self, group_email: &str, email: &str) -> Result<(), DirectoryError> {
        self.table.lock().await.add(group_email, email)
    }

    async fn remove_member(&self, group_email: &str, email: &str) -> Result<(), DirectoryError> {
        self.table.lock().await.remove(group_email, email)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_add_list_remove() {
        let directory = InMemoryDirectory::new();
        directory.create_group("Leaders@X.com", Vec::<String>::new()).await;

        directory.add_member("leaders@x.com", "Ann@X.com").await.unwrap();
        let members = directory.list_members("LEADERS@x.com").await.unwrap();
        assert_eq!(members.to_vec(), vec!["ann@x.com"]);

        directory.remove_member("leaders@x.com", "ann@x.com").await.unwrap();
        assert!(directory.list_members("leaders@x.com").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_missing_group() {
        let directory = InMemoryDirectory::new();
        assert!(matches!(
            directory.list_members("nope@x.com").await,
            Err(DirectoryError::GroupNotFound(_))
        ));
        assert!(matches!(
            directory.add_member("nope@x.com", "a@x.com").await,
            Err(DirectoryError::GroupNotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_add_and_missing_remove() {
        let directory = InMemoryDirectory::new();
        directory.create_group("g@x.com", ["a@x.com"]).await;

        assert!(matches!(
            directory.add_member("g@x.com", "A@x.com").await,
            Err(DirectoryError::AlreadyMember { .. })
        ));
        assert!(matches!(
            directory.remove_member("g@x.com", "b@x.com").await,
            Err(DirectoryError::MemberNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_invalid_email_rejected() {
        let directory = InMemoryDirectory::new();
        directory.create_group("g@x.com", Vec::<String>::new()).await;
        assert!(matches!(
            directory.add_member("g@x.com", "nope").await,
            Err(DirectoryError::InvalidEmail(_))
        ));
    }

    #[tokio::test]
    async fn test_googlemail_stored_as_gmail() {
        let directory = InMemoryDirectory::new();
        directory.create_group("g@x.com", ["pat@googlemail.com"]).await;

        let members = directory.list_members("g@x.com").await.unwrap();
        assert_eq!(members.to_vec(), vec!["pat@gmail.com"]);

        directory.add_member("g@x.com", "Sam@GoogleMail.com").await.unwrap();
        assert!(matches!(
            directory.add_member("g@x.com", "sam@gmail.com").await,
            Err(DirectoryError::AlreadyMember { .. })
        ));

        directory.remove_member("g@x.com", "pat@googlemail.com").await.unwrap();
        let members = directory.list_members("g@x.com").await.unwrap();
        assert_eq!(members.to_vec(), vec!["sam@gmail.com"]);
    }
}
