use std::net::IpAddr;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::models::Severity;

pub type Query = Vec<(String, String)>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DetectionState {
    Active,
    Inactive,
    Fixed,
    #[serde(rename = "filteredbyai")]
    FilteredByAi,
    #[serde(rename = "filteredbyrule")]
    FilteredByRule,
}

impl DetectionState {
    pub fn as_str(self) -> &'static str {
        match self {
            DetectionState::Active => "active",
            DetectionState::Inactive => "inactive",
            DetectionState::Fixed => "fixed",
            DetectionState::FilteredByAi => "filteredbyai",
            DetectionState::FilteredByRule => "filteredbyrule",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum DetectionCategory {
    Command,
    Botnet,
    Lateral,
    Reconnaissance,
    Exfiltration,
    Info,
}

impl DetectionCategory {
    /// Value understood by the upstream partial-match category filter.
    pub fn as_str(self) -> &'static str {
        match self {
            DetectionCategory::Command => "command",
            DetectionCategory::Botnet => "botnet",
            DetectionCategory::Lateral => "lateral",
            DetectionCategory::Reconnaissance => "Reconnaissance",
            DetectionCategory::Exfiltration => "exfiltration",
            DetectionCategory::Info => "info",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum EntityState {
    Active,
    Inactive,
}

impl EntityState {
    pub fn as_str(self) -> &'static str {
        match self {
            EntityState::Active => "active",
            EntityState::Inactive => "inactive",
        }
    }
}

/// Entities that carry notes and tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Host,
    Account,
    Detection,
}

impl EntityKind {
    pub fn collection(self) -> &'static str {
        match self {
            EntityKind::Host => "hosts",
            EntityKind::Account => "accounts",
            EntityKind::Detection => "detections",
        }
    }

    pub fn tag_kind(self) -> &'static str {
        match self {
            EntityKind::Host => "host",
            EntityKind::Account => "account",
            EntityKind::Detection => "detection",
        }
    }
}

/// Entities that can be assigned to an analyst.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum AssignableEntity {
    Host,
    Account,
}

impl AssignableEntity {
    pub fn as_kind(self) -> EntityKind {
        match self {
            AssignableEntity::Host => EntityKind::Host,
            AssignableEntity::Account => EntityKind::Account,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum UserAccountType {
    #[serde(rename = "local")]
    Local,
    #[serde(rename = "SAML")]
    Saml,
}

impl UserAccountType {
    pub fn as_str(self) -> &'static str {
        match self {
            UserAccountType::Local => "local",
            UserAccountType::Saml => "SAML",
        }
    }
}

/// Search endpoints under `search/`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum SearchFamily {
    Detections,
    Hosts,
    Accounts,
}

impl SearchFamily {
    pub fn path(self) -> &'static str {
        match self {
            SearchFamily::Detections => "search/detections",
            SearchFamily::Hosts => "search/hosts",
            SearchFamily::Accounts => "search/accounts",
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SearchFamily::Detections => "detections",
            SearchFamily::Hosts => "hosts",
            SearchFamily::Accounts => "accounts",
        }
    }
}

fn push(query: &mut Query, key: &str, value: impl ToString) {
    query.push((key.to_string(), value.to_string()));
}

fn push_opt(query: &mut Query, key: &str, value: Option<impl ToString>) {
    if let Some(value) = value {
        push(query, key, value);
    }
}

fn push_ids(query: &mut Query, key: &str, ids: &[u64]) {
    if !ids.is_empty() {
        let joined: Vec<String> = ids.iter().map(u64::to_string).collect();
        push(query, key, joined.join(","));
    }
}

/// Filters for `GET detections`. `severity` is applied to normalized records.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionFilters {
    pub state: Option<DetectionState>,
    pub category: Option<DetectionCategory>,
    pub detection_type: Option<String>,
    pub src_ip: Option<IpAddr>,
    pub host_id: Option<u64>,
    pub threat_gte: Option<u32>,
    pub certainty_gte: Option<u32>,
    pub is_targeting_key_asset: Option<bool>,
    pub last_timestamp_gte: Option<String>,
    pub last_timestamp_lte: Option<String>,
    pub ordering: Option<String>,
    pub severity: Option<Severity>,
}

impl DetectionFilters {
    pub fn to_query(&self) -> Query {
        let mut query = Query::new();
        push_opt(&mut query, "state", self.state.map(DetectionState::as_str));
        push_opt(&mut query, "detection_category", self.category.map(DetectionCategory::as_str));
        push_opt(&mut query, "detection_type", self.detection_type.as_deref());
        push_opt(&mut query, "src_ip", self.src_ip);
        push_opt(&mut query, "host_id", self.host_id);
        push_opt(&mut query, "threat_gte", self.threat_gte);
        push_opt(&mut query, "certainty_gte", self.certainty_gte);
        push_opt(&mut query, "is_targeting_key_asset", self.is_targeting_key_asset);
        push_opt(&mut query, "last_timestamp_gte", self.last_timestamp_gte.as_deref());
        push_opt(&mut query, "last_timestamp_lte", self.last_timestamp_lte.as_deref());
        push_opt(&mut query, "ordering", self.ordering.as_deref());
        query
    }
}

/// Filters shared by `GET hosts` and `GET accounts`.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EntityFilters {
    pub state: Option<EntityState>,
    pub name: Option<String>,
    pub tags: Option<String>,
    pub min_threat: Option<u32>,
    pub min_certainty: Option<u32>,
    pub is_key_asset: Option<bool>,
    pub account_type: Option<String>,
    pub ordering: Option<String>,
    pub severity: Option<Severity>,
}

impl EntityFilters {
    pub fn to_query(&self) -> Query {
        let mut query = Query::new();
        push_opt(&mut query, "state", self.state.map(EntityState::as_str));
        push_opt(&mut query, "name", self.name.as_deref());
        push_opt(&mut query, "tags", self.tags.as_deref());
        push_opt(&mut query, "min_threat", self.min_threat);
        push_opt(&mut query, "min_certainty", self.min_certainty);
        push_opt(&mut query, "is_key_asset", self.is_key_asset);
        push_opt(&mut query, "account_type", self.account_type.as_deref());
        push_opt(&mut query, "ordering", self.ordering.as_deref());
        query
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct AssignmentFilters {
    pub resolved: Option<bool>,
    pub created_after: Option<String>,
    pub accounts: Vec<u64>,
    pub hosts: Vec<u64>,
    pub assignees: Vec<u64>,
}

impl AssignmentFilters {
    pub fn to_query(&self) -> Query {
        let mut query = Query::new();
        push_opt(&mut query, "resolved", self.resolved);
        push_opt(&mut query, "created_after", self.created_after.as_deref());
        push_ids(&mut query, "accounts", &self.accounts);
        push_ids(&mut query, "hosts", &self.hosts);
        push_ids(&mut query, "assignees", &self.assignees);
        query
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct UserFilters {
    pub username: Option<String>,
    pub role: Option<String>,
    pub account_type: Option<UserAccountType>,
    pub authentication_profile: Option<String>,
    pub last_login_gte: Option<String>,
}

impl UserFilters {
    pub fn to_query(&self) -> Query {
        let mut query = Query::new();
        push_opt(&mut query, "username", self.username.as_deref());
        push_opt(&mut query, "role", self.role.as_deref());
        push_opt(&mut query, "account_type", self.account_type.map(UserAccountType::as_str));
        push_opt(&mut query, "authentication_profile", self.authentication_profile.as_deref());
        push_opt(&mut query, "last_login_gte", self.last_login_gte.as_deref());
        query
    }
}
