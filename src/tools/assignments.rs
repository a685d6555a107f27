use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::ToolError;
use super::params::{
    check_id, check_ids, check_limit, format_datetime, parse_datetime, to_payload, ToolParams,
};
use crate::vectra::filters::{AssignableEntity, AssignmentFilters};
use crate::vectra::VectraClient;

fn default_unresolved() -> Option<bool> {
    Some(false)
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ListAssignmentsParams {
    #[serde(default = "default_unresolved")]
    #[schemars(description = "Resolved (true) or open (false) assignments. Defaults to false; null returns both")]
    pub resolved: Option<bool>,
    #[schemars(description = "Only assignments created after this date (YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS)")]
    pub created_after: Option<String>,
    #[schemars(description = "Only assignments for these account IDs")]
    pub accounts: Option<Vec<u64>>,
    #[schemars(description = "Only assignments for these host IDs")]
    pub hosts: Option<Vec<u64>>,
    #[schemars(description = "Only assignments owned by these user IDs")]
    pub assignees: Option<Vec<u64>>,
    #[schemars(description = "Maximum number of assignments to return (1-1000)")]
    pub limit: Option<u32>,
}

impl ToolParams for ListAssignmentsParams {
    fn validate(&self) -> Result<(), String> {
        check_limit(self.limit)?;
        if let Some(created_after) = &self.created_after {
            parse_datetime("created_after", created_after)?;
        }
        for (field, ids) in [
            ("accounts", &self.accounts),
            ("hosts", &self.hosts),
            ("assignees", &self.assignees),
        ] {
            if let Some(ids) = ids {
                check_ids(field, ids)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct UserAssignmentsParams {
    #[schemars(description = "ID of the user whose assignments to list")]
    pub user_id: u64,
    #[serde(default = "default_unresolved")]
    #[schemars(description = "Resolved (true) or open (false) assignments. Defaults to false; null returns both")]
    pub resolved: Option<bool>,
    #[schemars(description = "Maximum number of assignments to return (1-1000)")]
    pub limit: Option<u32>,
}

impl ToolParams for UserAssignmentsParams {
    fn validate(&self) -> Result<(), String> {
        check_id("user_id", self.user_id)?;
        check_limit(self.limit)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AssignmentIdParams {
    #[schemars(description = "ID of the assignment")]
    pub assignment_id: u64,
}

impl ToolParams for AssignmentIdParams {
    fn validate(&self) -> Result<(), String> {
        check_id("assignment_id", self.assignment_id)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct EntityAssignmentsParams {
    #[schemars(description = "IDs of the hosts or accounts")]
    pub entity_ids: Vec<u64>,
    #[schemars(description = "Whether the IDs refer to hosts or accounts")]
    pub entity_type: AssignableEntity,
    #[serde(default = "default_unresolved")]
    #[schemars(description = "Resolved (true) or open (false) assignments. Defaults to false; null returns both")]
    pub resolved: Option<bool>,
}

impl ToolParams for EntityAssignmentsParams {
    fn validate(&self) -> Result<(), String> {
        check_ids("entity_ids", &self.entity_ids)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct CreateAssignmentParams {
    #[schemars(description = "ID of the user receiving the assignment")]
    pub assign_to_user_id: u64,
    #[schemars(description = "ID of the host or account to assign")]
    pub assign_entity_id: u64,
    #[schemars(description = "Whether assign_entity_id is a host or an account")]
    pub assign_entity_type: AssignableEntity,
}

impl ToolParams for CreateAssignmentParams {
    fn validate(&self) -> Result<(), String> {
        check_id("assign_to_user_id", self.assign_to_user_id)?;
        check_id("assign_entity_id", self.assign_entity_id)
    }
}

pub(crate) async fn list_assignments(
    client: &VectraClient,
    params: ListAssignmentsParams,
) -> Result<Value, ToolError> {
    let created_after = params
        .created_after
        .as_deref()
        .map(|s| parse_datetime("created_after", s).map(format_datetime))
        .transpose()
        .map_err(ToolError::Validation)?;
    let filters = AssignmentFilters {
        resolved: params.resolved,
        created_after,
        accounts: params.accounts.unwrap_or_default(),
        hosts: params.hosts.unwrap_or_default(),
        assignees: params.assignees.unwrap_or_default(),
    };
    let page = client
        .list_assignments(&filters, params.limit.map(|l| l as usize))
        .await?;
    to_payload(&page)
}

pub(crate) async fn list_assignments_for_user(
    client: &VectraClient,
    params: UserAssignmentsParams,
) -> Result<Value, ToolError> {
    let filters = AssignmentFilters {
        resolved: params.resolved,
        assignees: vec![params.user_id],
        ..Default::default()
    };
    let page = client
        .list_assignments(&filters, params.limit.map(|l| l as usize))
        .await?;
    to_payload(&page)
}

pub(crate) async fn get_assignment_detail_by_id(
    client: &VectraClient,
    params: AssignmentIdParams,
) -> Result<Value, ToolError> {
    let assignment = client.get_assignment(params.assignment_id).await?;
    to_payload(&assignment)
}

pub(crate) async fn get_entity_assignments(
    client: &VectraClient,
    params: EntityAssignmentsParams,
) -> Result<Value, ToolError> {
    let mut filters = AssignmentFilters {
        resolved: params.resolved,
        ..Default::default()
    };
    match params.entity_type {
        AssignableEntity::Host => filters.hosts = params.entity_ids,
        AssignableEntity::Account => filters.accounts = params.entity_ids,
    }
    let page = client.list_assignments(&filters, None).await?;
    to_payload(&page)
}

pub(crate) async fn create_assignment(
    client: &VectraClient,
    params: CreateAssignmentParams,
) -> Result<Value, ToolError> {
    let assignment = client
        .assign(
            params.assign_entity_type,
            params.assign_entity_id,
            params.assign_to_user_id,
        )
        .await?;
    to_payload(&assignment)
}

pub(crate) async fn delete_assignment(
    client: &VectraClient,
    params: AssignmentIdParams,
) -> Result<Value, ToolError> {
    client.delete_assignment(params.assignment_id).await?;
    Ok(json!({ "assignment_id": params.assignment_id, "deleted": true }))
}
