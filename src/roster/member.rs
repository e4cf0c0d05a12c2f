use crate::membership::{canonicalize_gmail, normalize_email};
use chrono::{Datelike, NaiveDate};
use serde::{Deserialize, Serialize};

/// Patrols whose members are treated as leaders
const LEADER_PATROLS: [&str; 2] = ["Leaders", "Young Leaders (YLs)"];

/// Age at which a leader counts as an adult
pub const ADULT_AGE: u32 = 18;

/// A parent or guardian attached to a member record
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Contact {
    #[serde(default)]
    pub first_name: String,
    #[serde(default)]
    pub last_name: String,
    #[serde(default)]
    pub emails: Vec<String>,
}

/// A member of a section as exported from OSM
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub member_id: String,
    pub first_name: String,
    pub last_name: String,
    pub date_of_birth: NaiveDate,
    #[serde(default)]
    pub patrol: String,
    #[serde(default)]
    pub section_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub joined: Option<NaiveDate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub started: Option<NaiveDate>,
    /// The member's own addresses
    #[serde(default)]
    pub emails: Vec<String>,
    #[serde(default)]
    pub contacts: Vec<Contact>,
}

impl Member {
    /// Whole years of age on `date`
    pub fn age_at(&self, date: NaiveDate) -> u32 {
        let mut age = date.year() - self.date_of_birth.year();
        if (date.month(), date.day()) < (self.date_of_birth.month(), self.date_of_birth.day()) {
            age -= 1;
        }
        age.max(0) as u32
    }

    pub fn is_leader(&self) -> bool {
        LEADER_PATROLS.contains(&self.patrol.as_str())
    }

    pub fn is_adult_leader(&self, on: NaiveDate) -> bool {
        self.is_leader() && self.age_at(on) >= ADULT_AGE
    }

    pub fn is_young_leader(&self, on: NaiveDate) -> bool {
        self.is_leader() && self.age_at(on) < ADULT_AGE
    }

    /// Own and contact addresses exactly as recorded
    pub fn raw_emails(&self) -> impl Iterator<Item = &str> {
        self.emails
            .iter()
            .chain(self.contacts.iter().flat_map(|c| c.emails.iter()))
            .map(String::as_str)
    }

    /// Every valid address reachable through this member.
    ///
    /// Includes the member's own addresses and all contact addresses,
    /// normalized, with googlemail spelled as gmail. Order follows the record.
    pub fn contact_emails(&self) -> Vec<String> {
        self.raw_emails()
            .filter_map(normalize_email)
            .map(|email| canonicalize_gmail(&email))
            .collect()
    }
}
