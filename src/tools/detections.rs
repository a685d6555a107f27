use std::net::IpAddr;

use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::debug;

use super::error::ToolError;
use super::params::{
    check_id, check_ids, check_limit, check_not_blank, check_optional_not_blank, check_ordering,
    check_score, check_tags, date_range, to_payload, ToolParams,
};
use crate::vectra::filters::{DetectionCategory, DetectionFilters, DetectionState, EntityKind};
use crate::vectra::models::Severity;
use crate::vectra::VectraClient;

const DETECTION_ORDERING: &[&str] = &[
    "last_timestamp",
    "created_datetime",
    "id",
    "threat",
    "certainty",
    "t_score",
    "c_score",
];

fn default_state() -> Option<DetectionState> {
    Some(DetectionState::Active)
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ListDetectionsParams {
    #[schemars(description = "Only return detections with this severity (derived from threat and certainty when the platform does not report one)")]
    pub severity: Option<Severity>,
    #[serde(default = "default_state")]
    #[schemars(description = "Detection state. Defaults to 'active'")]
    pub state: Option<DetectionState>,
    #[schemars(description = "Detection category")]
    pub category: Option<DetectionCategory>,
    #[schemars(description = "Detection type or name, partial match")]
    pub detection_type: Option<String>,
    #[schemars(description = "Source IP address (IPv4 or IPv6) of the host that generated the detection")]
    pub src_ip: Option<IpAddr>,
    #[schemars(description = "Only detections from this host ID")]
    pub host_id: Option<u64>,
    #[schemars(description = "Minimum threat score (0-99)")]
    pub threat_gte: Option<u32>,
    #[schemars(description = "Minimum certainty score (0-99)")]
    pub certainty_gte: Option<u32>,
    #[schemars(description = "Only detections targeting (true) or not targeting (false) a key asset")]
    pub is_targeting_key_asset: Option<bool>,
    #[schemars(description = "Last seen on or after this date (YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS)")]
    pub start_date: Option<String>,
    #[schemars(description = "Last seen on or before this date (YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS)")]
    pub end_date: Option<String>,
    #[schemars(description = "Sort field, '-' prefix for descending: last_timestamp, created_datetime, id, threat, certainty")]
    pub ordering: Option<String>,
    #[schemars(description = "Opaque cursor from a previous call to resume from")]
    pub cursor: Option<String>,
    #[schemars(description = "Maximum number of detections to return (1-1000)")]
    pub limit: Option<u32>,
}

impl ListDetectionsParams {
    fn filters(&self) -> Result<DetectionFilters, ToolError> {
        let (start, end) = date_range(self.start_date.as_deref(), self.end_date.as_deref())
            .map_err(ToolError::Validation)?;
        Ok(DetectionFilters {
            state: self.state,
            category: self.category,
            detection_type: self.detection_type.clone(),
            src_ip: self.src_ip,
            host_id: self.host_id,
            threat_gte: self.threat_gte,
            certainty_gte: self.certainty_gte,
            is_targeting_key_asset: self.is_targeting_key_asset,
            last_timestamp_gte: start,
            last_timestamp_lte: end,
            ordering: self.ordering.clone(),
            severity: self.severity,
        })
    }
}

impl ToolParams for ListDetectionsParams {
    fn validate(&self) -> Result<(), String> {
        check_limit(self.limit)?;
        check_score("threat_gte", self.threat_gte)?;
        check_score("certainty_gte", self.certainty_gte)?;
        check_ordering(self.ordering.as_deref(), DETECTION_ORDERING)?;
        check_optional_not_blank("detection_type", self.detection_type.as_deref())?;
        if let Some(host_id) = self.host_id {
            check_id("host_id", host_id)?;
        }
        date_range(self.start_date.as_deref(), self.end_date.as_deref()).map(|_| ())
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DetectionCountParams {
    #[serde(default = "default_state")]
    #[schemars(description = "Detection state. Defaults to 'active'")]
    pub state: Option<DetectionState>,
    #[schemars(description = "Detection category")]
    pub category: Option<DetectionCategory>,
    #[schemars(description = "Detection type or name, partial match")]
    pub detection_type: Option<String>,
    #[schemars(description = "Source IP address of the host that generated the detection")]
    pub src_ip: Option<IpAddr>,
    #[schemars(description = "Only detections targeting (true) or not targeting (false) a key asset")]
    pub is_targeting_key_asset: Option<bool>,
    #[schemars(description = "Last seen on or after this date (YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS)")]
    pub start_date: Option<String>,
    #[schemars(description = "Last seen on or before this date (YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS)")]
    pub end_date: Option<String>,
}

impl ToolParams for DetectionCountParams {
    fn validate(&self) -> Result<(), String> {
        check_optional_not_blank("detection_type", self.detection_type.as_deref())?;
        date_range(self.start_date.as_deref(), self.end_date.as_deref()).map(|_| ())
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DetectionIdParams {
    #[schemars(description = "ID of the detection")]
    pub detection_id: u64,
}

impl ToolParams for DetectionIdParams {
    fn validate(&self) -> Result<(), String> {
        check_id("detection_id", self.detection_id)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DetectionNoteParams {
    #[schemars(description = "ID of the detection to annotate")]
    pub detection_id: u64,
    #[schemars(description = "Note text")]
    pub note: String,
}

impl ToolParams for DetectionNoteParams {
    fn validate(&self) -> Result<(), String> {
        check_id("detection_id", self.detection_id)?;
        check_not_blank("note", &self.note)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateDetectionTagsParams {
    #[schemars(description = "ID of the detection")]
    pub detection_id: u64,
    #[schemars(description = "Complete list of tags. Replaces the existing tags")]
    pub tags: Vec<String>,
}

impl ToolParams for UpdateDetectionTagsParams {
    fn validate(&self) -> Result<(), String> {
        check_id("detection_id", self.detection_id)?;
        check_tags(&self.tags)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct MarkDetectionFixedParams {
    #[schemars(description = "IDs of the detections to update")]
    pub detection_ids: Vec<u64>,
    #[schemars(description = "true to mark as fixed, false to clear the fixed state")]
    pub mark_fixed: bool,
}

impl ToolParams for MarkDetectionFixedParams {
    fn validate(&self) -> Result<(), String> {
        check_ids("detection_ids", &self.detection_ids)
    }
}

pub(crate) async fn list_detections(
    client: &VectraClient,
    params: ListDetectionsParams,
) -> Result<Value, ToolError> {
    let filters = params.filters()?;
    let limit = params.limit.map(|l| l as usize);
    let page = client.list_detections(&filters, params.cursor, limit).await?;
    debug!(count = page.count, truncated = page.truncated, "Listed detections");
    to_payload(&page)
}

pub(crate) async fn list_detection_ids(
    client: &VectraClient,
    params: ListDetectionsParams,
) -> Result<Value, ToolError> {
    let filters = params.filters()?;
    let limit = params.limit.map(|l| l as usize);
    let page = client.list_detections(&filters, params.cursor, limit).await?;
    to_payload(&page.map(|d| d.id))
}

pub(crate) async fn get_detection_count(
    client: &VectraClient,
    params: DetectionCountParams,
) -> Result<Value, ToolError> {
    let (start, end) = date_range(params.start_date.as_deref(), params.end_date.as_deref())
        .map_err(ToolError::Validation)?;
    let filters = DetectionFilters {
        state: params.state,
        category: params.category,
        detection_type: params.detection_type,
        src_ip: params.src_ip,
        is_targeting_key_asset: params.is_targeting_key_asset,
        last_timestamp_gte: start,
        last_timestamp_lte: end,
        ..Default::default()
    };
    let count = client.count_detections(&filters).await?;
    Ok(json!({ "count": count }))
}

pub(crate) async fn get_detection_details(
    client: &VectraClient,
    params: DetectionIdParams,
) -> Result<Value, ToolError> {
    let detection = client.get_detection(params.detection_id).await?;
    to_payload(&detection)
}

pub(crate) async fn get_detection_summary(
    client: &VectraClient,
    params: DetectionIdParams,
) -> Result<Value, ToolError> {
    let detection = client.get_detection(params.detection_id).await?;
    to_payload(&detection.summarize())
}

pub(crate) async fn create_detection_note(
    client: &VectraClient,
    params: DetectionNoteParams,
) -> Result<Value, ToolError> {
    let note = client
        .add_note(EntityKind::Detection, params.detection_id, params.note.trim())
        .await?;
    to_payload(&note)
}

pub(crate) async fn get_detection_tags(
    client: &VectraClient,
    params: DetectionIdParams,
) -> Result<Value, ToolError> {
    let tags = client
        .get_tags(EntityKind::Detection, params.detection_id)
        .await?;
    to_payload(&tags)
}

pub(crate) async fn update_detection_tags(
    client: &VectraClient,
    params: UpdateDetectionTagsParams,
) -> Result<Value, ToolError> {
    let tags = client
        .update_tags(EntityKind::Detection, params.detection_id, &params.tags)
        .await?;
    to_payload(&tags)
}

pub(crate) async fn mark_detection_fixed(
    client: &VectraClient,
    params: MarkDetectionFixedParams,
) -> Result<Value, ToolError> {
    let upstream = client
        .mark_detections_fixed(&params.detection_ids, params.mark_fixed)
        .await?;
    Ok(json!({
        "detection_ids": params.detection_ids,
        "fixed": params.mark_fixed,
        "upstream": upstream,
    }))
}
