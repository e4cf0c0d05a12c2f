use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The kind of mailing group kept for every section
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GroupType {
    /// Adult leaders (18 and over)
    Leaders,
    /// Leaders under 18
    #[serde(alias = "youngleaders")]
    YoungLeaders,
    /// Contacts of everyone who is not a leader
    Parents,
}

impl GroupType {
    pub const ALL: [GroupType; 3] = [GroupType::Leaders, GroupType::YoungLeaders, GroupType::Parents];

    /// Suffix appended to the section's email prefix to form the group name
    pub fn group_suffix(&self) -> &'static str {
        match self {
            GroupType::Leaders => "leaders",
            GroupType::YoungLeaders => "youngleaders",
            GroupType::Parents => "parents",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            GroupType::Leaders => "leaders",
            GroupType::YoungLeaders => "young_leaders",
            GroupType::Parents => "parents",
        }
    }
}

impl fmt::Display for GroupType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GroupType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "leaders" => Ok(GroupType::Leaders),
            "young_leaders" | "youngleaders" => Ok(GroupType::YoungLeaders),
            "parents" => Ok(GroupType::Parents),
            other => Err(format!("Unknown group type: {}", other)),
        }
    }
}
