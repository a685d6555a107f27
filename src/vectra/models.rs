//! Normalized Vectra records.
//!
//! Upstream payloads differ between endpoints and platform releases: scores
//! appear as `threat` or `t_score`, related entities as nested objects, bare
//! ids or resource URLs. Everything downstream of this module only sees the
//! structural types defined here.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::error::VectraApiError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    pub fn from_scores(threat: Option<u32>, certainty: Option<u32>) -> Self {
        let threat = threat.unwrap_or(0);
        let certainty = certainty.unwrap_or(0);
        match (threat >= 50, certainty >= 50) {
            (true, true) => Severity::Critical,
            (true, false) => Severity::High,
            (false, true) => Severity::Medium,
            (false, false) => Severity::Low,
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "low" => Some(Severity::Low),
            "medium" => Some(Severity::Medium),
            "high" => Some(Severity::High),
            "critical" => Some(Severity::Critical),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }

    fn resolve(raw: &Value, threat: Option<u32>, certainty: Option<u32>) -> Self {
        text(raw, &["severity"])
            .and_then(|s| Severity::parse(&s))
            .unwrap_or_else(|| Severity::from_scores(threat, certainty))
    }
}

/// Conversion from a raw upstream record.
pub trait Normalize: Sized {
    fn from_upstream(raw: &Value) -> Result<Self, VectraApiError>;
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EntityRef {
    pub id: u64,
    pub name: Option<String>,
    pub ip: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRef {
    pub id: Option<u64>,
    pub username: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Detection {
    pub id: u64,
    pub name: Option<String>,
    pub category: Option<String>,
    pub detection_type: Option<String>,
    pub state: Option<String>,
    pub threat: Option<u32>,
    pub certainty: Option<u32>,
    pub severity: Severity,
    pub src_ip: Option<String>,
    pub src_host: Option<EntityRef>,
    pub src_account: Option<EntityRef>,
    pub first_seen: Option<String>,
    pub last_seen: Option<String>,
    pub is_triaged: bool,
    pub is_targeting_key_asset: bool,
    pub tags: Vec<String>,
    pub summary: Option<Value>,
}

/// Compact view returned by `get_detection_summary`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DetectionSummary {
    pub id: u64,
    pub name: Option<String>,
    pub category: Option<String>,
    pub state: Option<String>,
    pub severity: Severity,
    pub last_seen: Option<String>,
    pub is_triaged: bool,
    pub summary: Option<Value>,
}

impl Detection {
    pub fn summarize(&self) -> DetectionSummary {
        DetectionSummary {
            id: self.id,
            name: self.name.clone(),
            category: self.category.clone(),
            state: self.state.clone(),
            severity: self.severity,
            last_seen: self.last_seen.clone(),
            is_triaged: self.is_triaged,
            summary: self.summary.clone(),
        }
    }
}

impl Normalize for Detection {
    fn from_upstream(raw: &Value) -> Result<Self, VectraApiError> {
        let threat = score(raw, &["threat", "t_score"]);
        let certainty = score(raw, &["certainty", "c_score"]);
        Ok(Self {
            id: require_id(raw, "detection")?,
            name: text(raw, &["detection", "name", "detection_type"]),
            category: text(raw, &["detection_category", "category"]),
            detection_type: text(raw, &["detection_type", "detection"]),
            state: text(raw, &["state"]),
            threat,
            certainty,
            severity: Severity::resolve(raw, threat, certainty),
            src_ip: text(raw, &["src_ip", "last_source", "ip"]),
            src_host: entity_ref(raw, &["src_host", "host"]),
            src_account: entity_ref(raw, &["src_account", "account"]),
            first_seen: text(raw, &["first_timestamp", "first_seen"]),
            last_seen: text(raw, &["last_timestamp", "last_seen"]),
            is_triaged: flag(raw, &["is_triaged"]).unwrap_or(false),
            is_targeting_key_asset: flag(raw, &["is_targeting_key_asset"]).unwrap_or(false),
            tags: string_list(raw, &["tags"]),
            summary: lookup(raw, &["summary"]).cloned(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Host {
    pub id: u64,
    pub name: Option<String>,
    pub ip: Option<String>,
    pub state: Option<String>,
    pub threat: Option<u32>,
    pub certainty: Option<u32>,
    pub severity: Severity,
    pub is_key_asset: bool,
    pub last_detection_at: Option<String>,
    pub sensor: Option<String>,
    pub tags: Vec<String>,
    pub detection_ids: Vec<u64>,
    pub assigned_to: Option<UserRef>,
}

impl Normalize for Host {
    fn from_upstream(raw: &Value) -> Result<Self, VectraApiError> {
        let threat = score(raw, &["threat", "t_score"]);
        let certainty = score(raw, &["certainty", "c_score"]);
        Ok(Self {
            id: require_id(raw, "host")?,
            name: text(raw, &["name", "host_name"]),
            ip: text(raw, &["last_source", "ip"]),
            state: text(raw, &["state"]),
            threat,
            certainty,
            severity: Severity::resolve(raw, threat, certainty),
            is_key_asset: flag(raw, &["is_key_asset"]).unwrap_or(false),
            last_detection_at: text(raw, &["last_detection_timestamp", "last_detection"]),
            sensor: text(raw, &["sensor_name", "sensor"]),
            tags: string_list(raw, &["tags"]),
            detection_ids: id_list(raw, &["detection_ids", "detection_set", "detections"]),
            assigned_to: user_ref(raw, &["assigned_to"]),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Account {
    pub id: u64,
    pub name: Option<String>,
    pub account_type: Option<String>,
    pub state: Option<String>,
    pub threat: Option<u32>,
    pub certainty: Option<u32>,
    pub severity: Severity,
    pub privilege_level: Option<u32>,
    pub privilege_category: Option<String>,
    pub last_detection_at: Option<String>,
    pub tags: Vec<String>,
    pub detection_ids: Vec<u64>,
    pub assigned_to: Option<UserRef>,
}

impl Normalize for Account {
    fn from_upstream(raw: &Value) -> Result<Self, VectraApiError> {
        let threat = score(raw, &["threat", "t_score"]);
        let certainty = score(raw, &["certainty", "c_score"]);
        Ok(Self {
            id: require_id(raw, "account")?,
            name: text(raw, &["name", "account_name"]),
            account_type: text(raw, &["account_type"]),
            state: text(raw, &["state"]),
            threat,
            certainty,
            severity: Severity::resolve(raw, threat, certainty),
            privilege_level: score(raw, &["privilege_level"]),
            privilege_category: text(raw, &["privilege_category"]),
            last_detection_at: text(raw, &["last_detection_timestamp", "last_detection"]),
            tags: string_list(raw, &["tags"]),
            detection_ids: id_list(raw, &["detection_ids", "detection_set", "detections"]),
            assigned_to: user_ref(raw, &["assigned_to"]),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Note {
    pub id: u64,
    pub text: Option<String>,
    pub created_by: Option<String>,
    pub created_at: Option<String>,
    pub modified_by: Option<String>,
    pub modified_at: Option<String>,
}

impl Normalize for Note {
    fn from_upstream(raw: &Value) -> Result<Self, VectraApiError> {
        Ok(Self {
            id: require_id(raw, "note")?,
            text: text(raw, &["note", "text"]),
            created_by: text(raw, &["created_by"]),
            created_at: text(raw, &["date_created", "created_at"]),
            modified_by: text(raw, &["modified_by"]),
            modified_at: text(raw, &["date_modified", "modified_at"]),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Assignment {
    pub id: u64,
    pub assigned_to: UserRef,
    pub assigned_by: Option<UserRef>,
    pub host_id: Option<u64>,
    pub account_id: Option<u64>,
    pub assigned_at: Option<String>,
    pub resolved: bool,
    pub resolved_at: Option<String>,
    pub outcome: Option<String>,
}

impl Normalize for Assignment {
    fn from_upstream(raw: &Value) -> Result<Self, VectraApiError> {
        let resolved_at = text(raw, &["date_resolved", "resolved_at"]);
        let resolved = flag(raw, &["resolved", "is_resolved"])
            .unwrap_or_else(|| resolved_at.is_some() || lookup(raw, &["resolved_by"]).is_some());
        Ok(Self {
            id: require_id(raw, "assignment")?,
            assigned_to: user_ref(raw, &["assigned_to"]).unwrap_or(UserRef {
                id: None,
                username: None,
            }),
            assigned_by: user_ref(raw, &["assigned_by"]),
            host_id: lookup(raw, &["host_id", "host"]).and_then(id_of),
            account_id: lookup(raw, &["account_id", "account"]).and_then(id_of),
            assigned_at: text(raw, &["date_assigned", "assigned_at"]),
            resolved,
            resolved_at,
            outcome: lookup(raw, &["outcome"]).and_then(|v| match v {
                Value::Object(_) => text(v, &["title", "name"]),
                other => scalar_text(other),
            }),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct User {
    pub id: u64,
    pub username: Option<String>,
    pub role: Option<String>,
    pub account_type: Option<String>,
    pub authentication_profile: Option<String>,
    pub last_login: Option<String>,
}

impl Normalize for User {
    fn from_upstream(raw: &Value) -> Result<Self, VectraApiError> {
        Ok(Self {
            id: require_id(raw, "user")?,
            username: text(raw, &["username", "name"]),
            role: text(raw, &["role"]),
            account_type: text(raw, &["account_type"]),
            authentication_profile: text(raw, &["authentication_profile"]),
            last_login: text(raw, &["last_login_timestamp", "last_login"]),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TagSet {
    pub entity_id: u64,
    pub tags: Vec<String>,
}

impl TagSet {
    pub fn from_upstream(entity_id: u64, raw: &Value) -> Self {
        let tags = match raw {
            Value::Array(_) => string_values(raw),
            _ => string_list(raw, &["tags"]),
        };
        Self { entity_id, tags }
    }
}

fn require_id(raw: &Value, family: &str) -> Result<u64, VectraApiError> {
    lookup(raw, &["id"]).and_then(id_of).ok_or_else(|| {
        VectraApiError::InvalidResponse(format!("{} record without a usable id", family))
    })
}

fn lookup<'a>(raw: &'a Value, keys: &[&str]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| raw.get(*key))
        .find(|value| !value.is_null())
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Array(items) => {
            let joined: Vec<String> = items.iter().filter_map(scalar_text).collect();
            (!joined.is_empty()).then(|| joined.join(","))
        }
        Value::Object(map) => ["username", "name"]
            .iter()
            .find_map(|key| map.get(*key).and_then(scalar_text)),
        _ => None,
    }
}

fn text(raw: &Value, keys: &[&str]) -> Option<String> {
    keys.iter()
        .filter_map(|key| raw.get(*key))
        .find_map(scalar_text)
}

fn number(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f.round() as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn score(raw: &Value, keys: &[&str]) -> Option<u32> {
    keys.iter()
        .filter_map(|key| raw.get(*key))
        .find_map(number)
        .map(|n| n.min(u64::from(u32::MAX)) as u32)
}

fn flag(raw: &Value, keys: &[&str]) -> Option<bool> {
    keys.iter()
        .filter_map(|key| raw.get(*key))
        .find_map(|value| match value {
            Value::Bool(b) => Some(*b),
            Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
                "true" | "1" | "yes" => Some(true),
                "false" | "0" | "no" => Some(false),
                _ => None,
            },
            Value::Number(n) => n.as_u64().map(|n| n != 0),
            _ => None,
        })
}

fn string_values(value: &Value) -> Vec<String> {
    value
        .as_array()
        .map(|items| items.iter().filter_map(scalar_text).collect())
        .unwrap_or_default()
}

fn string_list(raw: &Value, keys: &[&str]) -> Vec<String> {
    lookup(raw, keys).map(string_values).unwrap_or_default()
}

/// Accepts `12`, `"12"`, `{"id": 12}` and `https://brain/api/v2.5/hosts/12`.
fn id_of(value: &Value) -> Option<u64> {
    match value {
        Value::Number(_) => number(value),
        Value::String(s) => {
            let s = s.trim().trim_end_matches('/');
            s.parse()
                .ok()
                .or_else(|| s.rsplit('/').next().and_then(|tail| tail.parse().ok()))
        }
        Value::Object(map) => map
            .get("id")
            .and_then(id_of)
            .or_else(|| map.get("url").and_then(id_of)),
        _ => None,
    }
}

fn id_list(raw: &Value, keys: &[&str]) -> Vec<u64> {
    lookup(raw, keys)
        .and_then(Value::as_array)
        .map(|items| items.iter().filter_map(id_of).collect())
        .unwrap_or_default()
}

fn entity_ref(raw: &Value, keys: &[&str]) -> Option<EntityRef> {
    let value = lookup(raw, keys)?;
    let id = id_of(value)?;
    let (name, ip) = match value {
        Value::Object(_) => (
            text(value, &["name"]),
            text(value, &["ip", "last_source"]),
        ),
        _ => (None, None),
    };
    Some(EntityRef { id, name, ip })
}

fn user_ref(raw: &Value, keys: &[&str]) -> Option<UserRef> {
    let value = lookup(raw, keys)?;
    let user = match value {
        Value::Object(_) => UserRef {
            id: lookup(value, &["id"]).and_then(id_of),
            username: text(value, &["username", "name"]),
        },
        Value::Number(_) => UserRef {
            id: number(value),
            username: None,
        },
        Value::String(s) if s.trim().parse::<u64>().is_ok() => UserRef {
            id: id_of(value),
            username: None,
        },
        other => UserRef {
            id: None,
            username: scalar_text(other),
        },
    };
    (user.id.is_some() || user.username.is_some()).then_some(user)
}
