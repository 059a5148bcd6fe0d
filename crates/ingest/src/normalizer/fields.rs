//! Key-probing accessors over loosely typed upstream records.

use chrono::{DateTime, NaiveDate, TimeZone, Utc};
use serde_json::{Map, Value};

/// Keys probed inside an object value when a plain string is expected.
const NAME_KEYS: &[&str] = &["name", "displayName", "display_name", "title", "value", "label"];

/// A raw record with Jira-style `fields` and Monday-style `column_values`
/// lookups folded in.
#[derive(Debug, Clone, Copy)]
pub(crate) struct RawRecord<'a> {
    top: Option<&'a Map<String, Value>>,
    fields: Option<&'a Map<String, Value>>,
    columns: Option<&'a [Value]>,
}

impl<'a> RawRecord<'a> {
    pub fn new(value: &'a Value) -> Self {
        let top = value.as_object();
        let fields = top.and_then(|m| m.get("fields")).and_then(Value::as_object);
        let columns = top
            .and_then(|m| m.get("column_values"))
            .and_then(Value::as_array)
            .map(Vec::as_slice);
        Self { top, fields, columns }
    }

    pub fn is_object(&self) -> bool {
        self.top.is_some()
    }

    /// Non-null value under `key`, top level first, then `fields`.
    pub fn get(&self, key: &str) -> Option<&'a Value> {
        let hit = |m: Option<&'a Map<String, Value>>| m.and_then(|m| m.get(key)).filter(|v| !v.is_null());
        hit(self.top).or_else(|| hit(self.fields))
    }

    /// First non-null value among `keys`.
    pub fn probe(&self, keys: &[&str]) -> Option<&'a Value> {
        keys.iter().find_map(|k| self.get(k))
    }

    /// First key among `keys` yielding a non-empty string.
    pub fn probe_str(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|k| self.get(k).and_then(named_string))
    }

    /// First key holding a string or numeric id.
    pub fn probe_id(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|k| self.get(k).and_then(id_string))
    }

    pub fn probe_number(&self, keys: &[&str]) -> Option<f64> {
        keys.iter().find_map(|k| self.get(k).and_then(number))
    }

    /// First key holding an RFC 3339 or `YYYY-MM-DD` date, or epoch milliseconds.
    pub fn probe_time(&self, keys: &[&str]) -> Option<DateTime<Utc>> {
        keys.iter().find_map(|k| self.get(k).and_then(timestamp))
    }

    /// Text of the first Monday column whose id starts with one of `prefixes`.
    pub fn column_text(&self, prefixes: &[&str]) -> Option<String> {
        let columns = self.columns?;
        prefixes.iter().find_map(|prefix| {
            columns.iter().find_map(|col| {
                let id = col.get("id").and_then(Value::as_str)?;
                if !id.starts_with(prefix) {
                    return None;
                }
                col.get("text").and_then(scalar_string)
            })
        })
    }

    /// Scalar top-level entries not in `consumed`.
    pub fn leftover_scalars(&self, consumed: &[&str]) -> Map<String, Value> {
        self.top
            .map(|m| {
                m.iter()
                    .filter(|(k, v)| {
                        !consumed.contains(&k.as_str())
                            && matches!(v, Value::String(_) | Value::Number(_) | Value::Bool(_))
                    })
                    .map(|(k, v)| (k.clone(), v.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

/// Non-empty trimmed string from a string or number.
pub(crate) fn scalar_string(v: &Value) -> Option<String> {
    match v {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// Like [`scalar_string`], also reading the usual name keys of an object.
pub(crate) fn named_string(v: &Value) -> Option<String> {
    match v {
        Value::Object(map) => NAME_KEYS
            .iter()
            .find_map(|k| map.get(*k).and_then(scalar_string)),
        other => scalar_string(other),
    }
}

/// Identifier from a scalar, an object's `id`, or the last element of an array.
pub(crate) fn id_string(v: &Value) -> Option<String> {
    match v {
        Value::Object(map) => map.get("id").and_then(scalar_string),
        Value::Array(items) => items.last().and_then(id_string),
        other => scalar_string(other),
    }
}

pub(crate) fn number(v: &Value) -> Option<f64> {
    let n = match v {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    n.filter(|n| n.is_finite())
}

/// RFC 3339, plain `YYYY-MM-DD`, or epoch milliseconds.
pub(crate) fn timestamp(v: &Value) -> Option<DateTime<Utc>> {
    match v {
        Value::String(s) => {
            let s = s.trim();
            DateTime::parse_from_rfc3339(s)
                .map(|d| d.with_timezone(&Utc))
                .ok()
                .or_else(|| {
                    // Jira omits the colon in the offset: 2026-01-01T10:00:00.000+0000
                    DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f%z")
                        .map(|d| d.with_timezone(&Utc))
                        .ok()
                })
                .or_else(|| {
                    NaiveDate::parse_from_str(s, "%Y-%m-%d")
                        .ok()
                        .and_then(|d| d.and_hms_opt(0, 0, 0))
                        .map(|d| Utc.from_utc_datetime(&d))
                })
        }
        Value::Number(n) => n.as_i64().and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

/// Flatten rich-text documents (Atlassian ADF and similar) to plain text.
pub(crate) fn plain_text(v: &Value) -> String {
    fn walk(v: &Value, out: &mut Vec<String>) {
        match v {
            Value::String(s) => {
                if !s.trim().is_empty() {
                    out.push(s.trim().to_string());
                }
            }
            Value::Object(map) => {
                if let Some(text) = map.get("text") {
                    walk(text, out);
                }
                if let Some(content) = map.get("content") {
                    walk(content, out);
                }
            }
            Value::Array(items) => items.iter().for_each(|i| walk(i, out)),
            _ => {}
        }
    }
    let mut parts = Vec::new();
    walk(v, &mut parts);
    parts.join(" ")
}

/// Id equality after normalization: numeric ids compare by value, others
/// case-insensitively.
pub(crate) fn ids_equal(a: &str, b: &str) -> bool {
    let (a, b) = (a.trim(), b.trim());
    match (a.parse::<i64>(), b.parse::<i64>()) {
        (Ok(x), Ok(y)) => x == y,
        _ => a.eq_ignore_ascii_case(b),
    }
}
