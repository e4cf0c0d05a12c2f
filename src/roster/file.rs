use super::group_type::GroupType;
use super::section::Section;
use super::{MembershipSource, SourceError};
use crate::membership::MembershipSet;
use crate::utils::read_json;
use async_trait::async_trait;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// On-disk roster export: every section with its current-term members
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Roster {
    #[serde(default)]
    pub sections: Vec<Section>,
}

/// Membership source backed by a roster export
#[derive(Debug, Clone)]
pub struct RosterFile {
    roster: Roster,
    /// Date used for age checks. `None` means today (UTC).
    reference_date: Option<NaiveDate>,
}

impl RosterFile {
    pub fn new(roster: Roster) -> Self {
        Self {
            roster,
            reference_date: None,
        }
    }

    /// Load a roster from a JSON file
    pub async fn load(path: &Path) -> Result<Self, SourceError> {
        let roster: Roster = read_json(path)
            .await?
            .ok_or_else(|| SourceError::RosterNotFound(path.display().to_string()))?;

        let member_count: usize = roster.sections.iter().map(|s| s.members.len()).sum();
        info!(
            path = %path.display(),
            sections = roster.sections.len(),
            members = member_count,
            "Loaded roster"
        );

        Ok(Self::new(roster))
    }

    /// Pin the date used for leader age checks
    pub fn with_reference_date(mut self, date: NaiveDate) -> Self {
        self.reference_date = Some(date);
        self
    }

    pub fn roster(&self) -> &Roster {
        &self.roster
    }

    pub fn section(&self, section_id: &str) -> Option<&Section> {
        self.roster
            .sections
            .iter()
            .find(|s| s.section_id == section_id)
    }

    fn reference_date(&self) -> NaiveDate {
        self.reference_date
            .unwrap_or_else(|| chrono::Utc::now().date_naive())
    }
}

#[async_trait]
impl MembershipSource for RosterFile {
    async fn desired_members(
        &self,
        section_id: &str,
        group_type: GroupType,
    ) -> Result<MembershipSet, SourceError> {
        let section = self
            .section(section_id)
            .ok_or_else(|| SourceError::SectionNotFound(section_id.to_string()))?;

        let emails = section.emails_for(group_type, self.reference_date());
        if emails.rejected() > 0 {
            warn!(
                section = %section.section_name,
                group_type = %group_type,
                rejected = emails.rejected(),
                "Dropped malformed addresses from roster"
            );
        }
        Ok(emails)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const ROSTER_JSON: &str = r#"{
        "sections": [
            {
                "sectionId": "100",
                "sectionName": "Tuesday Scouts",
                "section": "scouts",
                "members": [
                    {
                        "memberId": "1",
                        "firstName": "Alex",
                        "lastName": "Leader",
                        "dateOfBirth": "1985-04-02",
                        "patrol": "Leaders",
                        "sectionId": "100",
                        "emails": ["alex@example.com"]
                    },
                    {
                        "memberId": "2",
                        "firstName": "Jo",
                        "lastName": "Scout",
                        "dateOfBirth": "2012-11-20",
                        "patrol": "Eagles",
                        "sectionId": "100",
                        "contacts": [
                            { "firstName": "Kim", "lastName": "Scout", "emails": ["Kim@GoogleMail.com"] }
                        ]
                    }
                ]
            }
        ]
    }"#;

    #[tokio::test]
    async fn test_load_and_query_roster() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("roster.json");
        tokio::fs::write(&path, ROSTER_JSON).await.unwrap();

        let source = RosterFile::load(&path)
            .await
            .unwrap()
            .with_reference_date(NaiveDate::from_ymd_opt(2024, 9, 1).unwrap());

        let leaders = source.desired_members("100", GroupType::Leaders).await.unwrap();
        assert_eq!(leaders.to_vec(), vec!["alex@example.com"]);

        let parents = source.desired_members("100", GroupType::Parents).await.unwrap();
        assert_eq!(parents.to_vec(), vec!["kim@gmail.com"]);

        let young = source.desired_members("100", GroupType::YoungLeaders).await.unwrap();
        assert!(young.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_section() {
        let source = RosterFile::new(Roster::default());
        let err = source
            .desired_members("999", GroupType::Leaders)
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::SectionNotFound(id) if id == "999"));
    }

    #[tokio::test]
    async fn test_missing_roster_file() {
        let temp = TempDir::new().unwrap();
        let err = RosterFile::load(&temp.path().join("roster.json"))
            .await
            .unwrap_err();
        assert!(matches!(err, SourceError::RosterNotFound(_)));
    }
}
