//! Shaping of facet result sets into a nested JSON object.
//!
//! A column name like `creator_name` is split on `_` into the path
//! `creator.name`. When the first segment is plural (ends in `s`) the leaf is
//! an array of every distinct bound value; otherwise it is the single bound
//! value, present only when the result set has exactly one row.

use std::collections::BTreeSet;

use serde_json::{Map, Value};

use search_indexer_shared::FacetResultSet;

/// Shape all facet result sets of a resource into one object.
///
/// Later result sets overwrite leaves written by earlier ones.
pub fn shape_facets(sets: &[FacetResultSet]) -> Map<String, Value> {
    let mut facets = Map::new();
    for set in sets {
        for var in &set.vars {
            let path: Vec<&str> = var.split('_').collect();
            let Some((leaf, parents)) = path.split_last() else {
                continue;
            };
            let Some(parent) = object_at(&mut facets, parents) else {
                continue;
            };

            let plural = path.first().is_some_and(|first| first.ends_with('s'));
            let value = if plural {
                let distinct: BTreeSet<&str> = set.values(var).into_iter().collect();
                Value::Array(distinct.into_iter().map(Value::from).collect())
            } else {
                set.single_value(var).map_or(Value::Null, Value::from)
            };
            parent.insert((*leaf).to_string(), value);
        }
    }
    facets
}

/// Walk (and create) nested objects along `path`, replacing non-objects.
fn object_at<'a>(root: &'a mut Map<String, Value>, path: &[&str]) -> Option<&'a mut Map<String, Value>> {
    let mut node = root;
    for segment in path {
        let slot = node
            .entry((*segment).to_string())
            .or_insert_with(|| Value::Object(Map::new()));
        if !slot.is_object() {
            *slot = Value::Object(Map::new());
        }
        node = slot.as_object_mut()?;
    }
    Some(node)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::BTreeMap;

    fn result_set(vars: &[&str], rows: &[&[(&str, &str)]]) -> FacetResultSet {
        FacetResultSet {
            vars: vars.iter().map(|v| v.to_string()).collect(),
            rows: rows
                .iter()
                .map(|row| {
                    row.iter()
                        .map(|(k, v)| (k.to_string(), v.to_string()))
                        .collect::<BTreeMap<_, _>>()
                })
                .collect(),
        }
    }

    #[test]
    fn test_plural_column_yields_sorted_distinct_array() {
        let set = result_set(
            &["keywords"],
            &[
                &[("keywords", "rust")],
                &[("keywords", "async")],
                &[("keywords", "rust")],
                &[],
            ],
        );
        let facets = shape_facets(&[set]);
        assert_eq!(Value::Object(facets), json!({"keywords": ["async", "rust"]}));
    }

    #[test]
    fn test_singular_column_requires_exactly_one_row() {
        let one = result_set(&["title"], &[&[("title", "Report")]]);
        assert_eq!(
            Value::Object(shape_facets(&[one])),
            json!({"title": "Report"})
        );

        let two = result_set(&["title"], &[&[("title", "A")], &[("title", "B")]]);
        assert_eq!(Value::Object(shape_facets(&[two])), json!({"title": null}));
    }

    #[test]
    fn test_underscores_build_nested_paths() {
        let set = result_set(
            &["creator_name", "creator_email", "authors_name"],
            &[&[
                ("creator_name", "Ada"),
                ("creator_email", "ada@example.org"),
                ("authors_name", "Grace"),
            ]],
        );
        let facets = shape_facets(&[set]);
        assert_eq!(
            Value::Object(facets),
            json!({
                "creator": {"name": "Ada", "email": "ada@example.org"},
                "authors": {"name": ["Grace"]}
            })
        );
    }

    #[test]
    fn test_scalar_replaced_by_nested_object() {
        let first = result_set(&["owner"], &[&[("owner", "x")]]);
        let second = result_set(&["owner_id"], &[&[("owner_id", "42")]]);
        let facets = shape_facets(&[first, second]);
        assert_eq!(Value::Object(facets), json!({"owner": {"id": "42"}}));
    }
}
