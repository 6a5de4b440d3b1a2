//! Source resources as produced by the external fetch collaborator.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Tabular result of a facet query attached to a resource.
///
/// Each row binds some subset of `vars` to string values; unbound variables
/// are simply absent from the row.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FacetResultSet {
    /// Column names, in projection order.
    pub vars: Vec<String>,
    /// One map per solution.
    #[serde(default)]
    pub rows: Vec<BTreeMap<String, String>>,
}

impl FacetResultSet {
    /// All non-null values bound to `var`, in row order.
    pub fn values(&self, var: &str) -> Vec<&str> {
        self.rows
            .iter()
            .filter_map(|row| row.get(var).map(String::as_str))
            .collect()
    }

    /// The value bound to `var` when the result set has exactly one row.
    pub fn single_value(&self, var: &str) -> Option<&str> {
        match self.rows.as_slice() {
            [row] => row.get(var).map(String::as_str),
            _ => None,
        }
    }
}

/// An opaque unit of input, read-only for the pipeline.
///
/// `payload` is the graph-derived record already framed as a JSON object. A
/// resource flagged `deleted` maps to a delete of its document; a resource
/// with neither payload nor deletion flag is filtered out.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceResource {
    /// Stable identifier, usually the resource URI.
    pub resource_id: String,
    /// Content hash of the resource as fetched.
    #[serde(default)]
    pub fingerprint: String,
    /// Name of the entity mapping to apply.
    pub entity_type: String,
    /// Graph-derived document fields.
    #[serde(default)]
    pub payload: Option<Value>,
    /// Whether the resource vanished from the source graph.
    #[serde(default)]
    pub deleted: bool,
    /// Facet query results to shape into the document.
    #[serde(default)]
    pub facets: Vec<FacetResultSet>,
}

impl SourceResource {
    /// Create a resource carrying a payload.
    pub fn new(
        resource_id: impl Into<String>,
        entity_type: impl Into<String>,
        payload: Value,
    ) -> Self {
        Self {
            resource_id: resource_id.into(),
            fingerprint: String::new(),
            entity_type: entity_type.into(),
            payload: Some(payload),
            deleted: false,
            facets: Vec::new(),
        }
    }

    /// Create a resource that signals deletion of its document.
    pub fn deleted(resource_id: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            resource_id: resource_id.into(),
            fingerprint: String::new(),
            entity_type: entity_type.into(),
            payload: None,
            deleted: true,
            facets: Vec::new(),
        }
    }

    /// Set the content fingerprint.
    pub fn with_fingerprint(mut self, fingerprint: impl Into<String>) -> Self {
        self.fingerprint = fingerprint.into();
        self
    }

    /// Attach a facet result set.
    pub fn with_facets(mut self, facets: FacetResultSet) -> Self {
        self.facets.push(facets);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(pairs: &[(&str, &str)]) -> BTreeMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_single_value_requires_exactly_one_row() {
        let mut set = FacetResultSet {
            vars: vec!["title".to_string()],
            rows: vec![row(&[("title", "A")])],
        };
        assert_eq!(set.single_value("title"), Some("A"));

        set.rows.push(row(&[("title", "B")]));
        assert_eq!(set.single_value("title"), None);
        assert_eq!(set.values("title"), vec!["A", "B"]);
    }

    #[test]
    fn test_deserialize_defaults() {
        let resource: SourceResource = serde_json::from_value(json!({
            "resource_id": "http://example.org/p/1",
            "entity_type": "person"
        }))
        .unwrap();

        assert!(resource.payload.is_none());
        assert!(!resource.deleted);
        assert!(resource.facets.is_empty());
        assert!(resource.fingerprint.is_empty());
    }
}
