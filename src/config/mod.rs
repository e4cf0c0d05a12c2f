use crate::roster::GroupType;
use crate::utils::{read_json, write_json_atomic, CONFIG_FILE};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Config not found at {0}")]
    NotFound(String),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

/// Mapping of an OSM section to its group email prefix
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SectionConfig {
    /// OSM section id
    pub id: String,
    /// Prefix of the section's group addresses, e.g. "tom" for "tomleaders@..."
    #[serde(rename = "email")]
    pub email_prefix: String,
}

fn default_group_types() -> Vec<GroupType> {
    GroupType::ALL.to_vec()
}

/// Sync configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncConfig {
    /// Google Workspace domain the groups live in
    pub domain: String,
    #[serde(default)]
    pub sections: Vec<SectionConfig>,
    /// Group types kept for every section. Defaults to all three.
    #[serde(default = "default_group_types")]
    pub group_types: Vec<GroupType>,
}

impl SyncConfig {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            domain: domain.into(),
            sections: Vec::new(),
            group_types: default_group_types(),
        }
    }

    /// Group name without domain, e.g. "tomleaders"
    pub fn group_name(&self, section: &SectionConfig, group_type: GroupType) -> String {
        format!("{}{}", section.email_prefix, group_type.group_suffix())
    }

    /// Full group address, e.g. "tomleaders@example.org"
    pub fn group_email(&self, section: &SectionConfig, group_type: GroupType) -> String {
        format!("{}@{}", self.group_name(section, group_type), self.domain)
    }

    /// Check the config before a run uses it
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.domain.trim().is_empty() {
            return Err(ConfigError::Invalid("domain is required".to_string()));
        }

        if self.group_types.is_empty() {
            return Err(ConfigError::Invalid(
                "at least one group type is required".to_string(),
            ));
        }

        let mut seen_ids = HashSet::new();
        for (index, section) in self.sections.iter().enumerate() {
            if section.id.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "section {} is missing an id",
                    index + 1
                )));
            }
            if section.email_prefix.trim().is_empty() {
                return Err(ConfigError::Invalid(format!(
                    "section {} is missing an email prefix",
                    section.id
                )));
            }
            if !seen_ids.insert(section.id.as_str()) {
                return Err(ConfigError::Invalid(format!(
                    "section {} is listed more than once",
                    section.id
                )));
            }
        }

        Ok(())
    }
}

/// Read the configuration file from a state directory
pub async fn read_config(state_path: &Path) -> Result<SyncConfig, ConfigError> {
    let config_path = state_path.join(CONFIG_FILE);
    read_json(&config_path)
        .await?
        .ok_or_else(|| ConfigError::NotFound(config_path.display().to_string()))
}

/// Write the configuration file into a state directory
pub async fn write_config(state_path: &Path, config: &SyncConfig) -> Result<(), ConfigError> {
    config.validate()?;
    write_json_atomic(&state_path.join(CONFIG_FILE), config).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn section(id: &str, prefix: &str) -> SectionConfig {
        SectionConfig {
            id: id.to_string(),
            email_prefix: prefix.to_string(),
        }
    }

    #[test]
    fn test_group_email() {
        let config = SyncConfig::new("example.org");
        let s = section("100", "tom");
        assert_eq!(config.group_name(&s, GroupType::YoungLeaders), "tomyoungleaders");
        assert_eq!(
            config.group_email(&s, GroupType::Parents),
            "tomparents@example.org"
        );
    }

    #[test]
    fn test_validate_rejects_missing_prefix() {
        let mut config = SyncConfig::new("example.org");
        config.sections.push(section("123", ""));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_duplicate_ids() {
        let mut config = SyncConfig::new("example.org");
        config.sections.push(section("123", "tom"));
        config.sections.push(section("123", "dick"));
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_validate_rejects_empty_domain() {
        let config = SyncConfig::new(" ");
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_deserialize_defaults_group_types() {
        let config: SyncConfig = serde_json::from_str(
            r#"{"domain": "example.org", "sections": [{"id": "1", "email": "tom"}]}"#,
        )
        .unwrap();
        assert_eq!(config.group_types, GroupType::ALL.to_vec());
        assert_eq!(config.sections[0].email_prefix, "tom");
        assert!(config.validate().is_ok());
    }

    #[tokio::test]
    async fn test_write_then_read_config() {
        let temp = TempDir::new().unwrap();
        let mut config = SyncConfig::new("example.org");
        config.sections.push(section("100", "tom"));

        write_config(temp.path(), &config).await.unwrap();
        let read = read_config(temp.path()).await.unwrap();
        assert_eq!(read, config);
    }

    #[tokio::test]
    async fn test_read_missing_config() {
        let temp = TempDir::new().unwrap();
        assert!(matches!(
            read_config(temp.path()).await,
            Err(ConfigError::NotFound(_))
        ));
    }
}
