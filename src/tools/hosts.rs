use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::info;

use super::error::ToolError;
use super::params::{
    check_id, check_limit, check_not_blank, check_optional_not_blank, check_ordering,
    check_score, check_tags, to_payload, ToolParams,
};
use crate::vectra::filters::{DetectionFilters, EntityFilters, EntityKind, EntityState};
use crate::vectra::models::Severity;
use crate::vectra::VectraClient;

const HOST_ORDERING: &[&str] = &["last_detection_timestamp", "t_score", "c_score", "id", "name"];
const DEFAULT_INVESTIGATION_DETECTIONS: u32 = 100;

fn default_state() -> Option<EntityState> {
    Some(EntityState::Active)
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ListHostsParams {
    #[serde(default = "default_state")]
    #[schemars(description = "Host state. Defaults to 'active'")]
    pub state: Option<EntityState>,
    #[schemars(description = "Only return hosts with this severity")]
    pub severity: Option<Severity>,
    #[schemars(description = "Host name, partial match")]
    pub name: Option<String>,
    #[schemars(description = "Tag to filter by")]
    pub tags: Option<String>,
    #[schemars(description = "Minimum threat score (0-99)")]
    pub min_threat: Option<u32>,
    #[schemars(description = "Minimum certainty score (0-99)")]
    pub min_certainty: Option<u32>,
    #[schemars(description = "Only key assets (true) or only non key assets (false)")]
    pub is_key_asset: Option<bool>,
    #[schemars(description = "Sort field, '-' prefix for descending: last_detection_timestamp, t_score, c_score, id, name")]
    pub ordering: Option<String>,
    #[schemars(description = "Opaque cursor from a previous call to resume from")]
    pub cursor: Option<String>,
    #[schemars(description = "Maximum number of hosts to return (1-1000)")]
    pub limit: Option<u32>,
}

impl ToolParams for ListHostsParams {
    fn validate(&self) -> Result<(), String> {
        check_limit(self.limit)?;
        check_score("min_threat", self.min_threat)?;
        check_score("min_certainty", self.min_certainty)?;
        check_ordering(self.ordering.as_deref(), HOST_ORDERING)?;
        check_optional_not_blank("name", self.name.as_deref())?;
        check_optional_not_blank("tags", self.tags.as_deref())
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct HostIdParams {
    #[schemars(description = "ID of the host")]
    pub host_id: u64,
}

impl ToolParams for HostIdParams {
    fn validate(&self) -> Result<(), String> {
        check_id("host_id", self.host_id)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct InvestigateHostParams {
    #[schemars(description = "ID of the host to investigate")]
    pub host_id: u64,
    #[schemars(description = "Maximum number of detections to include (1-1000, default 100)")]
    pub detection_limit: Option<u32>,
}

impl ToolParams for InvestigateHostParams {
    fn validate(&self) -> Result<(), String> {
        check_id("host_id", self.host_id)?;
        check_limit(self.detection_limit)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct HostNoteParams {
    #[schemars(description = "ID of the host to annotate")]
    pub host_id: u64,
    #[schemars(description = "Note text")]
    pub note: String,
}

impl ToolParams for HostNoteParams {
    fn validate(&self) -> Result<(), String> {
        check_id("host_id", self.host_id)?;
        check_not_blank("note", &self.note)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DeleteHostNoteParams {
    #[schemars(description = "ID of the host")]
    pub host_id: u64,
    #[schemars(description = "ID of the note to delete")]
    pub note_id: u64,
}

impl ToolParams for DeleteHostNoteParams {
    fn validate(&self) -> Result<(), String> {
        check_id("host_id", self.host_id)?;
        check_id("note_id", self.note_id)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateHostTagsParams {
    #[schemars(description = "ID of the host")]
    pub host_id: u64,
    #[schemars(description = "Complete list of tags. Replaces the existing tags")]
    pub tags: Vec<String>,
}

impl ToolParams for UpdateHostTagsParams {
    fn validate(&self) -> Result<(), String> {
        check_id("host_id", self.host_id)?;
        check_tags(&self.tags)
    }
}

pub(crate) async fn list_hosts(
    client: &VectraClient,
    params: ListHostsParams,
) -> Result<Value, ToolError> {
    let filters = EntityFilters {
        state: params.state,
        name: params.name,
        tags: params.tags,
        min_threat: params.min_threat,
        min_certainty: params.min_certainty,
        is_key_asset: params.is_key_asset,
        ordering: params.ordering,
        severity: params.severity,
        ..Default::default()
    };
    let page = client
        .list_hosts(&filters, params.cursor, params.limit.map(|l| l as usize))
        .await?;
    to_payload(&page)
}

pub(crate) async fn get_host_details(
    client: &VectraClient,
    params: HostIdParams,
) -> Result<Value, ToolError> {
    let host = client.get_host(params.host_id).await?;
    to_payload(&host)
}

/// Host record, its detections and its notes, fetched concurrently.
pub(crate) async fn investigate_host(
    client: &VectraClient,
    params: InvestigateHostParams,
) -> Result<Value, ToolError> {
    let host_id = params.host_id;
    info!(host_id, "Investigating host");

    let filters = DetectionFilters {
        host_id: Some(host_id),
        ..Default::default()
    };
    let limit = params
        .detection_limit
        .unwrap_or(DEFAULT_INVESTIGATION_DETECTIONS) as usize;

    let (host, detections, notes) = tokio::try_join!(
        client.get_host(host_id),
        client.list_detections(&filters, None, Some(limit)),
        client.list_notes(EntityKind::Host, host_id),
    )?;

    Ok(json!({
        "host": to_payload(&host)?,
        "detections": to_payload(&detections)?,
        "notes": to_payload(&notes)?,
    }))
}

pub(crate) async fn add_host_note(
    client: &VectraClient,
    params: HostNoteParams,
) -> Result<Value, ToolError> {
    let note = client
        .add_note(EntityKind::Host, params.host_id, params.note.trim())
        .await?;
    to_payload(&note)
}

pub(crate) async fn delete_host_note(
    client: &VectraClient,
    params: DeleteHostNoteParams,
) -> Result<Value, ToolError> {
    client
        .delete_note(EntityKind::Host, params.host_id, params.note_id)
        .await?;
    Ok(json!({ "host_id": params.host_id, "note_id": params.note_id, "deleted": true }))
}

pub(crate) async fn get_host_tags(
    client: &VectraClient,
    params: HostIdParams,
) -> Result<Value, ToolError> {
    let tags = client.get_tags(EntityKind::Host, params.host_id).await?;
    to_payload(&tags)
}

pub(crate) async fn update_host_tags(
    client: &VectraClient,
    params: UpdateHostTagsParams,
) -> Result<Value, ToolError> {
    let tags = client
        .update_tags(EntityKind::Host, params.host_id, &params.tags)
        .await?;
    to_payload(&tags)
}
