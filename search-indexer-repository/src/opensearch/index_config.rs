//! Default index settings.
//!
//! Used when an entity mapping does not carry its own settings document.

use serde_json::{json, Value};

/// Settings and mappings for a resource index.
///
/// Documents are graph-derived and loosely shaped, so fields are mapped
/// dynamically; only the facet container is declared so that its nested
/// objects stay searchable.
pub fn default_index_settings() -> Value {
    json!({
        "settings": {
            "number_of_shards": 1,
            "number_of_replicas": 1
        },
        "mappings": {
            "dynamic": true,
            "properties": {
                "facets": {
                    "type": "object"
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_settings_structure() {
        let settings = default_index_settings();

        assert!(settings["settings"]["number_of_shards"].is_number());
        assert!(settings["settings"]["number_of_replicas"].is_number());
        assert_eq!(settings["mappings"]["properties"]["facets"]["type"], "object");
    }
}
