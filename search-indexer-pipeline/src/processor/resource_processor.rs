//! Resource processor implementation.
//!
//! Transforms source resources into `IndexDocument`s for indexing.

use serde_json::{Map, Value};
use tracing::{debug, instrument};

use crate::errors::TransformationError;
use crate::processor::{shape_facets, EntityMapping, MappingConfig};
use search_indexer_shared::{DocumentOperation, IndexDocument, SourceResource};

/// Key under which shaped facets are stored in the document body.
const FACETS_FIELD: &str = "facets";

/// Processor that transforms resources into search documents.
///
/// The output depends only on the resource and the mapping configuration,
/// so re-transforming a resource always yields the same document.
#[derive(Debug, Clone)]
pub struct ResourceProcessor {
    mappings: MappingConfig,
}

impl ResourceProcessor {
    pub fn new(mappings: MappingConfig) -> Self {
        Self { mappings }
    }

    pub fn mappings(&self) -> &MappingConfig {
        &self.mappings
    }

    /// Transform one resource.
    ///
    /// # Returns
    ///
    /// * `Ok(Some(doc))` - A document to write or delete
    /// * `Ok(None)` - The resource carries nothing to index
    /// * `Err(TransformationError)` - The resource cannot be mapped
    #[instrument(skip(self, resource), fields(resource_id = %resource.resource_id))]
    pub fn process(
        &self,
        resource: &SourceResource,
    ) -> Result<Option<IndexDocument>, TransformationError> {
        let mapping = self
            .mappings
            .find_by_name(&resource.entity_type)
            .ok_or_else(|| TransformationError::UnknownEntityType(resource.entity_type.clone()))?;

        let payload = match (&resource.payload, resource.deleted) {
            (_, true) => None,
            (Some(Value::Object(fields)), false) => Some(fields),
            (Some(other), false) => {
                return Err(TransformationError::InvalidPayload {
                    resource_id: resource.resource_id.clone(),
                    message: format!("expected a JSON object, got {}", json_kind(other)),
                });
            }
            (None, false) => {
                debug!("Skipping resource with no payload");
                return Ok(None);
            }
        };

        let id = document_id(mapping, resource, payload)?;

        let Some(fields) = payload else {
            return Ok(IndexDocument::delete(id, &mapping.index));
        };

        for field in &mapping.required_fields {
            if fields.get(field).map_or(true, Value::is_null) {
                return Err(TransformationError::MissingField {
                    resource_id: resource.resource_id.clone(),
                    field: field.clone(),
                });
            }
        }

        let mut body = fields.clone();
        if !resource.facets.is_empty() {
            body.insert(
                FACETS_FIELD.to_string(),
                Value::Object(shape_facets(&resource.facets)),
            );
        }

        let bytes = serde_json::to_vec(&Value::Object(body)).map_err(|e| {
            TransformationError::InvalidPayload {
                resource_id: resource.resource_id.clone(),
                message: e.to_string(),
            }
        })?;

        let operation = if mapping.partial_update {
            DocumentOperation::Merge
        } else {
            DocumentOperation::Upsert
        };

        debug!(
            index = %mapping.index,
            size_bytes = bytes.len(),
            "Transformed resource"
        );

        Ok(IndexDocument::new(id, &mapping.index, operation, bytes))
    }
}

/// Resolve the stable document id.
///
/// Deletes carry no payload, so they always use the resource id.
fn document_id(
    mapping: &EntityMapping,
    resource: &SourceResource,
    payload: Option<&Map<String, Value>>,
) -> Result<String, TransformationError> {
    let id = match (&mapping.id_field, payload) {
        (Some(field), Some(fields)) => match fields.get(field) {
            Some(Value::String(s)) => s.trim().to_string(),
            Some(Value::Number(n)) => n.to_string(),
            _ => {
                return Err(TransformationError::MissingField {
                    resource_id: resource.resource_id.clone(),
                    field: field.clone(),
                });
            }
        },
        _ => resource.resource_id.trim().to_string(),
    };

    if id.is_empty() {
        return Err(TransformationError::MissingIdentifier);
    }
    Ok(id)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use search_indexer_shared::FacetResultSet;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn processor() -> ResourceProcessor {
        ResourceProcessor::new(MappingConfig::new(vec![
            EntityMapping {
                name: "Person".to_string(),
                index: "people".to_string(),
                id_field: None,
                required_fields: vec!["name".to_string()],
                partial_update: false,
                settings: None,
            },
            EntityMapping {
                name: "Dataset".to_string(),
                index: "datasets".to_string(),
                id_field: Some("identifier".to_string()),
                required_fields: vec![],
                partial_update: true,
                settings: None,
            },
        ]))
    }

    fn body_json(doc: &IndexDocument) -> Value {
        serde_json::from_slice(doc.body()).unwrap()
    }

    #[test]
    fn test_process_upsert_resource() {
        let resource = SourceResource::new(
            "http://example.org/p/1",
            "person",
            json!({"name": "Ada", "born": 1815}),
        );

        let doc = processor().process(&resource).unwrap().unwrap();
        assert_eq!(doc.id(), "http://example.org/p/1");
        assert_eq!(doc.index(), "people");
        assert_eq!(doc.operation(), DocumentOperation::Upsert);
        assert_eq!(body_json(&doc), json!({"name": "Ada", "born": 1815}));
        assert_eq!(doc.size_bytes(), doc.body().len());
    }

    #[test]
    fn test_process_deleted_resource() {
        let resource = SourceResource::deleted("http://example.org/p/1", "Person");

        let doc = processor().process(&resource).unwrap().unwrap();
        assert_eq!(doc.operation(), DocumentOperation::Delete);
        assert_eq!(doc.id(), "http://example.org/p/1");
        assert!(doc.body().is_empty());
    }

    #[test]
    fn test_skip_resource_without_payload() {
        let resource = SourceResource {
            payload: None,
            ..SourceResource::new("http://example.org/p/1", "Person", json!({}))
        };
        assert_eq!(processor().process(&resource).unwrap(), None);
    }

    #[test]
    fn test_unknown_entity_type() {
        let resource = SourceResource::new("urn:x", "Building", json!({}));
        assert_eq!(
            processor().process(&resource),
            Err(TransformationError::UnknownEntityType("Building".to_string()))
        );
    }

    #[test]
    fn test_missing_required_field() {
        let resource = SourceResource::new("urn:x", "Person", json!({"name": null}));
        assert!(matches!(
            processor().process(&resource),
            Err(TransformationError::MissingField { field, .. }) if field == "name"
        ));
    }

    #[test]
    fn test_empty_identifier() {
        let resource = SourceResource::new("  ", "Person", json!({"name": "Ada"}));
        assert_eq!(
            processor().process(&resource),
            Err(TransformationError::MissingIdentifier)
        );
    }

    #[test]
    fn test_non_object_payload() {
        let resource = SourceResource::new("urn:x", "Person", json!(["Ada"]));
        assert!(matches!(
            processor().process(&resource),
            Err(TransformationError::InvalidPayload { .. })
        ));
    }

    #[test]
    fn test_id_field_and_partial_update() {
        let resource = SourceResource::new(
            "http://example.org/d/1",
            "Dataset",
            json!({"identifier": "ds-1", "title": "Rivers"}),
        );

        let doc = processor().process(&resource).unwrap().unwrap();
        assert_eq!(doc.id(), "ds-1");
        assert_eq!(doc.operation(), DocumentOperation::Merge);
    }

    #[test]
    fn test_facets_are_embedded() {
        let mut row = BTreeMap::new();
        row.insert("themes".to_string(), "water".to_string());
        let resource = SourceResource::new(
            "urn:d:2",
            "Dataset",
            json!({"identifier": "ds-2"}),
        )
        .with_facets(FacetResultSet {
            vars: vec!["themes".to_string()],
            rows: vec![row],
        });

        let doc = processor().process(&resource).unwrap().unwrap();
        assert_eq!(
            body_json(&doc),
            json!({"identifier": "ds-2", "facets": {"themes": ["water"]}})
        );
    }

    #[test]
    fn test_transformation_is_deterministic() {
        let resource = SourceResource::new(
            "urn:p:3",
            "Person",
            json!({"name": "Grace", "roles": ["admiral", "scientist"]}),
        );
        let first = processor().process(&resource).unwrap();
        let second = processor().process(&resource).unwrap();
        assert_eq!(first, second);
    }
}
