//! Entity-type to index mappings.

use std::collections::BTreeSet;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::PipelineError;

/// How resources of one entity type become documents.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityMapping {
    /// Entity type name, matched case-insensitively.
    pub name: String,
    /// Target index.
    pub index: String,
    /// Payload field holding the document id. Defaults to the resource id.
    #[serde(default)]
    pub id_field: Option<String>,
    /// Payload fields that must be present and non-null.
    #[serde(default)]
    pub required_fields: Vec<String>,
    /// Write with a partial update instead of a full replace.
    #[serde(default)]
    pub partial_update: bool,
    /// Index creation body. Falls back to the default settings.
    #[serde(default)]
    pub settings: Option<Value>,
}

/// The full set of entity mappings for a deployment.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MappingConfig {
    pub entities: Vec<EntityMapping>,
}

impl MappingConfig {
    pub fn new(entities: Vec<EntityMapping>) -> Self {
        Self { entities }
    }

    /// Parse and validate a mapping file's contents.
    pub fn from_json(json: &str) -> Result<Self, PipelineError> {
        let config: MappingConfig = serde_json::from_str(json)
            .map_err(|e| PipelineError::config(format!("Invalid mapping config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read a mapping file from disk.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, PipelineError> {
        let path = path.as_ref();
        let json = tokio::fs::read_to_string(path).await.map_err(|e| {
            PipelineError::config(format!("Cannot read mapping file {}: {}", path.display(), e))
        })?;
        Self::from_json(&json)
    }

    pub fn validate(&self) -> Result<(), PipelineError> {
        let mut seen = BTreeSet::new();
        for entity in &self.entities {
            if entity.name.trim().is_empty() {
                return Err(PipelineError::config("Entity mapping with empty name"));
            }
            if entity.index.trim().is_empty() {
                return Err(PipelineError::config(format!(
                    "Entity mapping '{}' has no index",
                    entity.name
                )));
            }
            if !seen.insert(entity.name.to_ascii_lowercase()) {
                return Err(PipelineError::config(format!(
                    "Duplicate entity mapping '{}'",
                    entity.name
                )));
            }
        }
        Ok(())
    }

    /// Find the mapping for an entity type, ignoring case.
    pub fn find_by_name(&self, name: &str) -> Option<&EntityMapping> {
        self.entities
            .iter()
            .find(|entity| entity.name.eq_ignore_ascii_case(name))
    }

    /// Every distinct index with the settings of the first mapping naming it.
    pub fn indices(&self) -> Vec<(&str, Option<&Value>)> {
        let mut indices: Vec<(&str, Option<&Value>)> = Vec::new();
        for entity in &self.entities {
            if !indices.iter().any(|(index, _)| *index == entity.index) {
                indices.push((entity.index.as_str(), entity.settings.as_ref()));
            }
        }
        indices
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MAPPINGS: &str = r#"{
        "entities": [
            {"name": "Person", "index": "people", "required_fields": ["name"]},
            {"name": "Organisation", "index": "orgs", "partial_update": true},
            {"name": "Employee", "index": "people"}
        ]
    }"#;

    #[test]
    fn test_lookup_ignores_case() {
        let config = MappingConfig::from_json(MAPPINGS).unwrap();
        assert_eq!(config.find_by_name("person").unwrap().index, "people");
        assert_eq!(config.find_by_name("ORGANISATION").unwrap().index, "orgs");
        assert!(config.find_by_name("Building").is_none());
    }

    #[test]
    fn test_indices_are_distinct() {
        let config = MappingConfig::from_json(MAPPINGS).unwrap();
        let names: Vec<&str> = config.indices().into_iter().map(|(i, _)| i).collect();
        assert_eq!(names, vec!["people", "orgs"]);
    }

    #[test]
    fn test_duplicate_names_rejected() {
        let json = r#"{"entities": [
            {"name": "Person", "index": "a"},
            {"name": "person", "index": "b"}
        ]}"#;
        assert!(matches!(
            MappingConfig::from_json(json),
            Err(PipelineError::ConfigError(_))
        ));
    }

    #[test]
    fn test_empty_index_rejected() {
        let json = r#"{"entities": [{"name": "Person", "index": " "}]}"#;
        assert!(MappingConfig::from_json(json).is_err());
    }
}
