use super::group_type::GroupType;
use super::member::Member;
use crate::membership::MembershipSet;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// A scout section with its current-term members
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub section_id: String,
    pub section_name: String,
    /// Section type, e.g. "beavers", "cubs", "scouts"
    #[serde(default)]
    pub section: String,
    #[serde(default)]
    pub members: Vec<Member>,
}

impl Section {
    /// Desired membership of one of this section's groups, judged on `on`
    ///
    /// Malformed addresses are dropped and show up in
    /// [`MembershipSet::rejected`].
    pub fn emails_for(&self, group_type: GroupType, on: NaiveDate) -> MembershipSet {
        let emails: MembershipSet = self
            .members
            .iter()
            .filter(|m| belongs_to(m, group_type, on))
            .flat_map(|m| m.raw_emails())
            .collect();
        emails.gmail_canonicalized()
    }
}

fn belongs_to(member: &Member, group_type: GroupType, on: NaiveDate) -> bool {
    match group_type {
        GroupType::Leaders => member.is_adult_leader(on),
        GroupType::YoungLeaders => member.is_young_leader(on),
        GroupType::Parents => !member.is_leader(),
    }
}
