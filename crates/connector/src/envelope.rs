//! Decoding of upstream response envelopes.
//!
//! Upstream payloads arrive bare, wrapped once (`{data: ...}`) or wrapped
//! twice (`{data: {data: ...}}`). [`Envelope::levels`] enumerates the
//! candidate levels outermost first; the decoders below take the first level
//! that matches the expected shape.

use serde_json::Value;

use crate::error::FetchError;

/// Keys that identify a JSON object as an entity record rather than a wrapper.
const RECORD_ID_KEYS: &[&str] = &["id", "key", "name", "title"];

/// Wrapping depth of a payload.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Envelope<'a> {
    Bare(&'a Value),
    Data { outer: &'a Value, data: &'a Value },
    DataData { outer: &'a Value, data: &'a Value, inner: &'a Value },
}

impl<'a> Envelope<'a> {
    pub fn of(payload: &'a Value) -> Self {
        match payload {
            Value::Object(map) => match map.get("data") {
                Some(data @ Value::Object(inner_map)) => match inner_map.get("data") {
                    Some(inner) => Envelope::DataData { outer: payload, data, inner },
                    None => Envelope::Data { outer: payload, data },
                },
                Some(data) => Envelope::Data { outer: payload, data },
                None => Envelope::Bare(payload),
            },
            _ => Envelope::Bare(payload),
        }
    }

    /// Candidate levels in probe order: `payload`, `payload.data`, `payload.data.data`.
    pub fn levels(&self) -> Vec<&'a Value> {
        match *self {
            Envelope::Bare(v) => vec![v],
            Envelope::Data { outer, data } => vec![outer, data],
            Envelope::DataData { outer, data, inner } => vec![outer, data, inner],
        }
    }
}

/// Shape of a single level when a collection is expected.
#[derive(Debug, PartialEq)]
enum CollectionShape<'a> {
    Array(&'a [Value]),
    Items(&'a [Value]),
    Named(&'a [Value]),
    Other,
}

fn classify<'a>(value: &'a Value, plural_keys: &[String]) -> CollectionShape<'a> {
    match value {
        Value::Array(items) => CollectionShape::Array(items),
        Value::Object(map) => {
            if let Some(Value::Array(items)) = map.get("items") {
                return CollectionShape::Items(items);
            }
            plural_keys
                .iter()
                .find_map(|k| match map.get(k) {
                    Some(Value::Array(items)) => Some(CollectionShape::Named(items)),
                    _ => None,
                })
                .unwrap_or(CollectionShape::Other)
        }
        _ => CollectionShape::Other,
    }
}

fn select<'a>(level: &'a Value, pointer: Option<&str>) -> Option<&'a Value> {
    match pointer {
        Some(ptr) => level.pointer(ptr),
        None => Some(level),
    }
}

/// Decode a collection: an array, or an object carrying `items` or one of
/// the named plural keys.
pub fn decode_collection(
    endpoint: &str,
    payload: &Value,
    plural_keys: &[String],
    pointer: Option<&str>,
) -> Result<Vec<Value>, FetchError> {
    for level in Envelope::of(payload).levels() {
        let Some(candidate) = select(level, pointer) else {
            continue;
        };
        match classify(candidate, plural_keys) {
            CollectionShape::Array(items)
            | CollectionShape::Items(items)
            | CollectionShape::Named(items) => return Ok(items.to_vec()),
            CollectionShape::Other => continue,
        }
    }
    Err(FetchError::Shape {
        endpoint: endpoint.to_string(),
        message: "no collection found at payload, payload.data or payload.data.data".into(),
    })
}

/// Decode a single entity record.
pub fn decode_record(
    endpoint: &str,
    payload: &Value,
    pointer: Option<&str>,
) -> Result<Value, FetchError> {
    for level in Envelope::of(payload).levels() {
        let Some(candidate) = select(level, pointer) else {
            continue;
        };
        if let Value::Object(map) = candidate {
            if RECORD_ID_KEYS.iter().any(|k| map.contains_key(*k)) {
                return Ok(candidate.clone());
            }
        }
    }
    Err(FetchError::Shape {
        endpoint: endpoint.to_string(),
        message: "no record found at payload, payload.data or payload.data.data".into(),
    })
}

/// Flatten child collections embedded in parent records, e.g. backlog items
/// returned nested under sprints. For every parent the first child key
/// holding an array wins.
pub fn flatten_children(
    endpoint: &str,
    payload: &Value,
    parent_keys: &[String],
    child_keys: &[String],
) -> Result<Vec<Value>, FetchError> {
    let parents = decode_collection(endpoint, payload, parent_keys, None)?;
    let mut out = Vec::new();
    for parent in &parents {
        let children = child_keys.iter().find_map(|k| match parent.get(k) {
            Some(Value::Array(items)) => Some(items),
            _ => None,
        });
        if let Some(items) = children {
            out.extend(items.iter().cloned());
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn keys(k: &[&str]) -> Vec<String> {
        k.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn envelope_depths() {
        assert!(matches!(Envelope::of(&json!([1])), Envelope::Bare(_)));
        assert!(matches!(Envelope::of(&json!({"data": [1]})), Envelope::Data { .. }));
        assert!(matches!(
            Envelope::of(&json!({"data": {"data": [1]}})),
            Envelope::DataData { .. }
        ));
        assert_eq!(Envelope::of(&json!({"data": {"data": []}})).levels().len(), 3);
    }

    #[test]
    fn collection_at_every_depth() {
        let tasks = keys(&["tasks"]);
        for payload in [
            json!([{"id": 1}, {"id": 2}]),
            json!({"data": [{"id": 1}, {"id": 2}]}),
            json!({"data": {"data": [{"id": 1}, {"id": 2}]}}),
            json!({"data": {"items": [{"id": 1}, {"id": 2}]}}),
            json!({"tasks": [{"id": 1}, {"id": 2}]}),
        ] {
            let items = decode_collection("e", &payload, &tasks, None).unwrap();
            assert_eq!(items.len(), 2, "payload {payload}");
        }
    }

    #[test]
    fn empty_collection_is_valid() {
        let items = decode_collection("e", &json!({"data": []}), &[], None).unwrap();
        assert!(items.is_empty());
    }

    #[test]
    fn non_collection_is_shape_error() {
        let err = decode_collection("e", &json!({"data": {"count": 3}}), &keys(&["tasks"]), None)
            .unwrap_err();
        assert!(matches!(err, FetchError::Shape { .. }));
    }

    #[test]
    fn record_skips_wrappers() {
        let record = decode_record("e", &json!({"data": {"data": {"id": "P1", "name": "Apollo"}}}), None)
            .unwrap();
        assert_eq!(record["id"], "P1");
    }

    #[test]
    fn pointer_applies_per_level() {
        let payload = json!({"data": {"boards": [{"id": "42", "name": "Board", "items_page": {"items": [{"id": 1}]}}]}});
        let record = decode_record("e", &payload, Some("/boards/0")).unwrap();
        assert_eq!(record["id"], "42");
        let items = decode_collection("e", &payload, &[], Some("/boards/0/items_page/items")).unwrap();
        assert_eq!(items.len(), 1);
    }

    #[test]
    fn backlog_flattened_from_sprints() {
        let payload = json!({"data": {"sprints": [
            {"id": 1, "backlog_items": [{"id": "a"}, {"id": "b"}]},
            {"id": 2, "backlogs": [{"id": "c"}]},
            {"id": 3},
            {"id": 4, "items": [{"id": "d"}]}
        ]}});
        let items = flatten_children(
            "e",
            &payload,
            &keys(&["sprints"]),
            &keys(&["backlog_items", "backlogs", "items"]),
        )
        .unwrap();
        let ids: Vec<_> = items.iter().map(|i| i["id"].as_str().unwrap()).collect();
        assert_eq!(ids, vec!["a", "b", "c", "d"]);
    }
}
