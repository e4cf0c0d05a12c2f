#![allow(dead_code)]

use async_trait::async_trait;
use osm_sync::config::{SectionConfig, SyncConfig};
use osm_sync::membership::MembershipSet;
use osm_sync::reconciliation::{ApplyError, MembershipApplier, OperationKind};
use osm_sync::roster::{GroupType, MembershipSource, SourceError};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;
use tempfile::TempDir;

pub fn create_test_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

pub fn set(emails: &[&str]) -> MembershipSet {
    emails.iter().collect()
}

/// A recorded applier call
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Call {
    pub kind: OperationKind,
    pub group: String,
    pub email: String,
}

/// Applier that records every call and fails for selected addresses
#[derive(Default)]
pub struct FakeApplier {
    calls: Mutex<Vec<Call>>,
    failing: HashMap<String, String>,
}

impl FakeApplier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fail any call for `email` with `message`
    pub fn failing_for(mut self, email: &str, message: &str) -> Self {
        self.failing.insert(email.to_string(), message.to_string());
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self, kind: OperationKind) -> usize {
        self.calls().iter().filter(|c| c.kind == kind).count()
    }

    fn record(&self, kind: OperationKind, group: &str, email: &str) -> Result<(), ApplyError> {
        self.calls.lock().unwrap().push(Call {
            kind,
            group: group.to_string(),
            email: email.to_string(),
        });
        match self.failing.get(email) {
            Some(message) => Err(ApplyError::Failed(message.clone())),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl MembershipApplier for FakeApplier {
    async fn add(&self, group_name: &str, email: &str) -> Result<(), ApplyError> {
        self.record(OperationKind::Add, group_name, email)
    }

    async fn remove(&self, group_name: &str, email: &str) -> Result<(), ApplyError> {
        self.record(OperationKind::Remove, group_name, email)
    }
}

/// Membership source with fixed answers per section and group type
#[derive(Default)]
pub struct FakeSource {
    sets: HashMap<(String, GroupType), MembershipSet>,
    unavailable: HashSet<String>,
}

impl FakeSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, section_id: &str, group_type: GroupType, emails: &[&str]) -> Self {
        self.sets
            .insert((section_id.to_string(), group_type), set(emails));
        self
    }

    /// Every lookup for this section fails
    pub fn unavailable(mut self, section_id: &str) -> Self {
        self.unavailable.insert(section_id.to_string());
        self
    }
}

#[async_trait]
impl MembershipSource for FakeSource {
    async fn desired_members(
        &self,
        section_id: &str,
        group_type: GroupType,
    ) -> Result<MembershipSet, SourceError> {
        if self.unavailable.contains(section_id) {
            return Err(SourceError::Unavailable(format!("section {} offline", section_id)));
        }
        Ok(self
            .sets
            .get(&(section_id.to_string(), group_type))
            .cloned()
            .unwrap_or_default())
    }
}

/// Config for example.org with the given (id, prefix) sections
pub fn sample_config(sections: &[(&str, &str)]) -> SyncConfig {
    let mut config = SyncConfig::new("example.org");
    config.sections = sections
        .iter()
        .map(|(id, prefix)| SectionConfig {
            id: id.to_string(),
            email_prefix: prefix.to_string(),
        })
        .collect();
    config
}
