//! Newline-delimited bulk request encoding and response decoding.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::SearchIndexError;
use search_indexer_shared::{DocumentOperation, IndexDocument};

#[derive(Serialize)]
struct ActionMeta<'a> {
    #[serde(rename = "_index")]
    index: &'a str,
    #[serde(rename = "_id")]
    id: &'a str,
}

/// An encoded bulk request.
///
/// Documents that cannot be put on the wire are left out of the request and
/// reported in `rejected`; `included` maps every encoded document back to its
/// position in the input slice, so response item `i` belongs to input
/// document `included[i]`.
#[derive(Debug, Clone, Default)]
pub struct BulkRequestBody {
    lines: Vec<String>,
    included: Vec<usize>,
    rejected: Vec<(usize, String)>,
}

impl BulkRequestBody {
    /// Encode documents in order.
    ///
    /// `Upsert` becomes an `index` action followed by the body, `Merge` an
    /// `update` action followed by `{"doc": .., "doc_as_upsert": true}`, and
    /// `Delete` a lone `delete` action.
    pub fn encode(documents: &[IndexDocument]) -> Self {
        let mut request = Self {
            lines: Vec::with_capacity(documents.len() * 2),
            included: Vec::with_capacity(documents.len()),
            rejected: Vec::new(),
        };

        for (position, doc) in documents.iter().enumerate() {
            match encode_document(doc) {
                Ok((action, body)) => {
                    request.lines.push(action);
                    if let Some(body) = body {
                        request.lines.push(body);
                    }
                    request.included.push(position);
                }
                Err(e) => request.rejected.push((position, e.to_string())),
            }
        }

        request
    }

    /// Wire lines, without trailing newlines.
    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Input positions of the encoded documents, in wire order.
    pub fn included(&self) -> &[usize] {
        &self.included
    }

    /// Input positions that could not be encoded, with the reason.
    pub fn rejected(&self) -> &[(usize, String)] {
        &self.rejected
    }

    /// Whether no document made it into the request.
    pub fn is_empty(&self) -> bool {
        self.included.is_empty()
    }

    /// The exact request payload: every line followed by `\n`.
    pub fn to_ndjson(&self) -> String {
        let capacity = self.lines.iter().map(|l| l.len() + 1).sum();
        let mut out = String::with_capacity(capacity);
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}

fn encode_document(doc: &IndexDocument) -> Result<(String, Option<String>), SearchIndexError> {
    let mut action = BTreeMap::new();
    action.insert(
        doc.operation().action(),
        ActionMeta {
            index: doc.index(),
            id: doc.id(),
        },
    );
    let action =
        serde_json::to_string(&action).map_err(|e| SearchIndexError::serialization(e.to_string()))?;

    let body = match doc.operation() {
        DocumentOperation::Delete => None,
        DocumentOperation::Upsert => Some(compact_body(doc)?),
        DocumentOperation::Merge => Some(format!(
            "{{\"doc\":{},\"doc_as_upsert\":true}}",
            compact_body(doc)?
        )),
    };

    Ok((action, body))
}

/// The document body as a single compact JSON line.
///
/// Bodies are opaque bytes, so a pretty-printed document is re-serialized
/// rather than rejected. Both write paths go through this, so a body that is
/// not JSON fails the same way whichever path it takes.
pub fn compact_body(doc: &IndexDocument) -> Result<String, SearchIndexError> {
    let value: Value = serde_json::from_slice(doc.body()).map_err(|e| {
        SearchIndexError::validation(format!("Body of {} is not valid JSON: {}", doc.id(), e))
    })?;
    serde_json::to_string(&value).map_err(|e| SearchIndexError::serialization(e.to_string()))
}

/// One entry of the bulk response's `items` array.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BulkItemResult {
    /// Action name the item answers (`index`, `update`, `delete`, ...).
    pub action: String,
    /// Document id echoed by the engine.
    pub id: Option<String>,
    /// Native status code.
    pub status: u16,
    /// Engine error type, on failure.
    pub error_type: Option<String>,
    /// Engine error reason, on failure.
    pub reason: Option<String>,
}

#[derive(Deserialize)]
struct RawBulkResponse {
    items: Vec<BTreeMap<String, RawBulkItem>>,
}

#[derive(Deserialize)]
struct RawBulkItem {
    #[serde(rename = "_id", default)]
    id: Option<String>,
    status: u16,
    #[serde(default)]
    error: Option<Value>,
}

/// Decode a bulk response and check it against the request.
///
/// `expected_ids` are the ids of the encoded documents in wire order. A body
/// that is not a bulk response, an item count that differs from the request,
/// or an echoed id that differs from the positionally correlated document is
/// a protocol violation.
pub fn decode_bulk_response(
    body: &str,
    expected_ids: &[&str],
) -> Result<Vec<BulkItemResult>, SearchIndexError> {
    let raw: RawBulkResponse = serde_json::from_str(body).map_err(|e| {
        SearchIndexError::protocol_violation(format!("Unreadable bulk response: {}", e))
    })?;

    if raw.items.len() != expected_ids.len() {
        return Err(SearchIndexError::protocol_violation(format!(
            "Bulk response has {} items for {} documents",
            raw.items.len(),
            expected_ids.len()
        )));
    }

    raw.items
        .into_iter()
        .zip(expected_ids)
        .enumerate()
        .map(|(position, (entry, expected))| {
            let mut entry = entry.into_iter();
            let (action, item) = match (entry.next(), entry.next()) {
                (Some(pair), None) => pair,
                _ => {
                    return Err(SearchIndexError::protocol_violation(format!(
                        "Bulk item {} must hold exactly one action",
                        position
                    )))
                }
            };

            if let Some(id) = item.id.as_deref() {
                if id != *expected {
                    return Err(SearchIndexError::protocol_violation(format!(
                        "Bulk item {} answers id {} but document {} was sent",
                        position, id, expected
                    )));
                }
            }

            let (error_type, reason) = split_error(item.error.as_ref());
            Ok(BulkItemResult {
                action,
                id: item.id,
                status: item.status,
                error_type,
                reason,
            })
        })
        .collect()
}

/// Extract error type and reason from a single-document error response.
///
/// Accepts both `{"error": {"type": .., "reason": ..}}` and
/// `{"error": "message"}`; anything else yields `(None, None)`.
pub fn parse_error_body(body: &str) -> (Option<String>, Option<String>) {
    match serde_json::from_str::<Value>(body) {
        Ok(value) => split_error(value.get("error")),
        Err(_) => (None, None),
    }
}

fn split_error(error: Option<&Value>) -> (Option<String>, Option<String>) {
    match error {
        Some(Value::Object(map)) => (
            map.get("type").and_then(Value::as_str).map(str::to_string),
            map.get("reason").and_then(Value::as_str).map(str::to_string),
        ),
        Some(Value::String(message)) => (None, Some(message.clone())),
        _ => (None, None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(id: &str, op: DocumentOperation, body: &str) -> IndexDocument {
        IndexDocument::new(id, "people", op, body.as_bytes().to_vec()).unwrap()
    }

    #[test]
    fn test_encode_wire_format() {
        let docs = vec![
            doc("a", DocumentOperation::Upsert, r#"{"name":"A"}"#),
            doc("b", DocumentOperation::Merge, r#"{"name":"B"}"#),
            IndexDocument::delete("c", "people").unwrap(),
        ];

        let request = BulkRequestBody::encode(&docs);

        assert_eq!(
            request.to_ndjson(),
            concat!(
                "{\"index\":{\"_index\":\"people\",\"_id\":\"a\"}}\n",
                "{\"name\":\"A\"}\n",
                "{\"update\":{\"_index\":\"people\",\"_id\":\"b\"}}\n",
                "{\"doc\":{\"name\":\"B\"},\"doc_as_upsert\":true}\n",
                "{\"delete\":{\"_index\":\"people\",\"_id\":\"c\"}}\n",
            )
        );
        assert_eq!(request.included(), &[0, 1, 2]);
        assert!(request.rejected().is_empty());
    }

    #[test]
    fn test_encode_compacts_pretty_printed_body() {
        let docs = vec![
            doc("a", DocumentOperation::Upsert, "{\n  \"name\": \"A\"\n}"),
            doc("b", DocumentOperation::Merge, "{\n  \"name\": \"B\"\n}"),
        ];

        let request = BulkRequestBody::encode(&docs);

        assert_eq!(request.included(), &[0, 1]);
        assert!(request.rejected().is_empty());
        assert_eq!(request.lines()[1], r#"{"name":"A"}"#);
        assert_eq!(request.lines()[3], r#"{"doc":{"name":"B"},"doc_as_upsert":true}"#);
        assert!(request.lines().iter().all(|line| !line.contains('\n')));
    }

    #[test]
    fn test_encode_skips_body_that_is_not_json() {
        let docs = vec![
            doc("a", DocumentOperation::Upsert, "{not json"),
            doc("b", DocumentOperation::Upsert, "{}"),
        ];

        let request = BulkRequestBody::encode(&docs);

        assert_eq!(request.included(), &[1]);
        assert_eq!(request.rejected().len(), 1);
        assert_eq!(request.rejected()[0].0, 0);
        assert_eq!(request.lines().len(), 2);
    }

    #[test]
    fn test_decode_preserves_order() {
        let body = json!({
            "took": 3,
            "errors": true,
            "items": [
                {"index": {"_id": "a", "status": 201}},
                {"index": {"_id": "b", "status": 409,
                    "error": {"type": "version_conflict_engine_exception", "reason": "conflict"}}},
                {"index": {"_id": "c", "status": 400,
                    "error": {"type": "mapper_parsing_exception", "reason": "bad field"}}}
            ]
        })
        .to_string();

        let items = decode_bulk_response(&body, &["a", "b", "c"]).unwrap();

        assert_eq!(items.len(), 3);
        assert_eq!(items[0].status, 201);
        assert_eq!(items[1].error_type.as_deref(), Some("version_conflict_engine_exception"));
        assert_eq!(items[2].reason.as_deref(), Some("bad field"));
        assert_eq!(items[2].action, "index");
    }

    #[test]
    fn test_decode_count_mismatch_is_violation() {
        let body = json!({"errors": false, "items": [{"index": {"_id": "a", "status": 200}}]})
            .to_string();

        let err = decode_bulk_response(&body, &["a", "b"]).unwrap_err();
        assert!(matches!(err, SearchIndexError::ProtocolViolation(_)));
    }

    #[test]
    fn test_decode_id_mismatch_is_violation() {
        let body = json!({"items": [
            {"index": {"_id": "b", "status": 200}},
            {"index": {"_id": "a", "status": 200}}
        ]})
        .to_string();

        let err = decode_bulk_response(&body, &["a", "b"]).unwrap_err();
        assert!(matches!(err, SearchIndexError::ProtocolViolation(_)));
    }

    #[test]
    fn test_decode_tolerates_unknown_status_and_string_error() {
        let body = json!({"items": [
            {"index": {"_id": "a", "status": 599, "error": "something odd"}}
        ]})
        .to_string();

        let items = decode_bulk_response(&body, &["a"]).unwrap();
        assert_eq!(items[0].status, 599);
        assert_eq!(items[0].error_type, None);
        assert_eq!(items[0].reason.as_deref(), Some("something odd"));
    }

    #[test]
    fn test_decode_garbage_is_violation() {
        let err = decode_bulk_response("<html>bad gateway</html>", &["a"]).unwrap_err();
        assert!(matches!(err, SearchIndexError::ProtocolViolation(_)));
    }

    #[test]
    fn test_parse_error_body() {
        let body = json!({"error": {"type": "mapper_parsing_exception", "reason": "nope"}, "status": 400})
            .to_string();
        assert_eq!(
            parse_error_body(&body),
            (
                Some("mapper_parsing_exception".to_string()),
                Some("nope".to_string())
            )
        );
        assert_eq!(parse_error_body("not json"), (None, None));
    }
}
