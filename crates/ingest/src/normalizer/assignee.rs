//! Assignee resolution against the resource roster.

use serde_json::Value;

use super::fields::{ids_equal, named_string, scalar_string, RawRecord};

const ASSIGNEE_KEYS: &[&str] = &["assignee", "assigned_to", "assignedTo", "owner", "responsible"];
const DISPLAY_NAME_KEYS: &[&str] = &[
    "displayName",
    "display_name",
    "fullName",
    "full_name",
    "user_display_name",
];
const ASSIGNEE_ID_KEYS: &[&str] = &[
    "assigneeId",
    "assignee_id",
    "assignedToId",
    "assigned_to_id",
    "ownerId",
    "owner_id",
    "userId",
    "user_id",
];
const PERSON_COLUMNS: &[&str] = &["person", "people", "owner"];

const MEMBER_ID_KEYS: &[&str] = &["id", "accountId", "account_id", "user_id", "userId"];
const MEMBER_NAME_KEYS: &[&str] = &[
    "displayName",
    "display_name",
    "name",
    "fullName",
    "full_name",
    "user_display_name",
];
const MEMBER_EMAIL_KEYS: &[&str] = &["email", "emailAddress", "email_address", "user_email"];
const MEMBER_ROLE_KEYS: &[&str] = &["role", "roleName", "role_name", "title", "jobTitle"];

#[derive(Debug, Clone, Default, PartialEq)]
pub(crate) struct RosterEntry {
    pub id: Option<String>,
    pub name: Option<String>,
    pub email: Option<String>,
    pub role: Option<String>,
}

impl RosterEntry {
    fn from_raw(raw: &Value) -> Self {
        // Trofos nests the user under `user`.
        let user = raw.get("user").filter(|u| u.is_object()).unwrap_or(raw);
        let rec = RawRecord::new(user);
        let outer = RawRecord::new(raw);
        Self {
            id: rec.probe_id(MEMBER_ID_KEYS).or_else(|| outer.probe_id(MEMBER_ID_KEYS)),
            name: rec.probe_str(MEMBER_NAME_KEYS),
            email: rec.probe_str(MEMBER_EMAIL_KEYS),
            role: outer.probe_str(MEMBER_ROLE_KEYS).or_else(|| rec.probe_str(MEMBER_ROLE_KEYS)),
        }
    }
}

/// Raw team resources, searched linearly.
#[derive(Debug, Clone, Default)]
pub(crate) struct Roster {
    entries: Vec<RosterEntry>,
}

impl Roster {
    /// Roster from raw resource records; non-object entries are skipped.
    pub fn from_raw(resources: &[Value]) -> Self {
        Self {
            entries: resources
                .iter()
                .filter(|r| r.is_object())
                .map(RosterEntry::from_raw)
                .collect(),
        }
    }

    /// Lookup by id; numeric and string ids compare equal.
    pub fn find_by_id(&self, id: &str) -> Option<&RosterEntry> {
        self.entries
            .iter()
            .find(|e| e.id.as_deref().is_some_and(|eid| ids_equal(eid, id)))
    }

    pub fn find_by_name(&self, name: &str) -> Option<&RosterEntry> {
        self.entries.iter().find(|e| {
            e.name
                .as_deref()
                .is_some_and(|n| n.trim().eq_ignore_ascii_case(name.trim()))
        })
    }
}

fn display_name(v: &Value) -> Option<String> {
    let obj = v.as_object()?;
    DISPLAY_NAME_KEYS
        .iter()
        .find_map(|k| obj.get(*k).and_then(scalar_string))
        .or_else(|| obj.get("user").and_then(display_name))
}

fn object_name(v: &Value) -> Option<String> {
    v.as_object()?.get("name").and_then(scalar_string)
}

fn object_id(v: &Value) -> Option<String> {
    let obj = v.as_object()?;
    MEMBER_ID_KEYS.iter().find_map(|k| obj.get(*k).and_then(scalar_string))
}

/// Resolve a task's assignee name, in priority order:
/// display-name object, plain string, object `name`, then an id looked up
/// in the roster. Monday person columns are consulted last.
pub(crate) fn resolve_assignee(rec: &RawRecord<'_>, roster: &Roster) -> Option<String> {
    let values: Vec<&Value> = ASSIGNEE_KEYS.iter().filter_map(|k| rec.get(k)).collect();

    values
        .iter()
        .find_map(|v| display_name(v))
        .or_else(|| {
            values.iter().find_map(|v| match v {
                Value::String(_) => named_string(v),
                _ => None,
            })
        })
        .or_else(|| values.iter().find_map(|v| object_name(v)))
        .or_else(|| {
            let id = rec
                .probe_id(ASSIGNEE_ID_KEYS)
                .or_else(|| values.iter().find_map(|v| object_id(v)))
                .or_else(|| {
                    values.iter().find_map(|v| match v {
                        Value::Number(n) => Some(n.to_string()),
                        _ => None,
                    })
                })?;
            roster.find_by_id(&id).and_then(|e| e.name.clone())
        })
        .or_else(|| rec.column_text(PERSON_COLUMNS))
}
