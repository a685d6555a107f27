use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Value};

use super::error::ToolError;
use super::params::{
    check_id, check_limit, check_not_blank, check_optional_not_blank, check_ordering,
    check_score, check_tags, to_payload, ToolParams,
};
use crate::vectra::filters::{EntityFilters, EntityKind, EntityState};
use crate::vectra::models::Severity;
use crate::vectra::VectraClient;

const ACCOUNT_ORDERING: &[&str] = &["last_detection_timestamp", "t_score", "c_score", "id", "name"];

fn default_state() -> Option<EntityState> {
    Some(EntityState::Active)
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ListAccountsParams {
    #[serde(default = "default_state")]
    #[schemars(description = "Account state. Defaults to 'active'")]
    pub state: Option<EntityState>,
    #[schemars(description = "Only return accounts with this severity")]
    pub severity: Option<Severity>,
    #[schemars(description = "Account name, partial match")]
    pub name: Option<String>,
    #[schemars(description = "Account type, e.g. kerberos or o365")]
    pub account_type: Option<String>,
    #[schemars(description = "Tag to filter by")]
    pub tags: Option<String>,
    #[schemars(description = "Minimum threat score (0-99)")]
    pub min_threat: Option<u32>,
    #[schemars(description = "Minimum certainty score (0-99)")]
    pub min_certainty: Option<u32>,
    #[schemars(description = "Sort field, '-' prefix for descending: last_detection_timestamp, t_score, c_score, id, name")]
    pub ordering: Option<String>,
    #[schemars(description = "Opaque cursor from a previous call to resume from")]
    pub cursor: Option<String>,
    #[schemars(description = "Maximum number of accounts to return (1-1000)")]
    pub limit: Option<u32>,
}

impl ToolParams for ListAccountsParams {
    fn validate(&self) -> Result<(), String> {
        check_limit(self.limit)?;
        check_score("min_threat", self.min_threat)?;
        check_score("min_certainty", self.min_certainty)?;
        check_ordering(self.ordering.as_deref(), ACCOUNT_ORDERING)?;
        check_optional_not_blank("name", self.name.as_deref())?;
        check_optional_not_blank("account_type", self.account_type.as_deref())?;
        check_optional_not_blank("tags", self.tags.as_deref())
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AccountDetailsParams {
    #[schemars(description = "ID of the account")]
    pub account_id: u64,
    #[schemars(description = "Optional list of upstream fields to return, e.g. [\"name\", \"privilege_level\"]")]
    pub fields: Option<Vec<String>>,
}

impl ToolParams for AccountDetailsParams {
    fn validate(&self) -> Result<(), String> {
        check_id("account_id", self.account_id)?;
        if let Some(fields) = &self.fields {
            fields
                .iter()
                .try_for_each(|f| check_not_blank("fields", f))?;
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AccountIdParams {
    #[schemars(description = "ID of the account")]
    pub account_id: u64,
}

impl ToolParams for AccountIdParams {
    fn validate(&self) -> Result<(), String> {
        check_id("account_id", self.account_id)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AccountNoteParams {
    #[schemars(description = "ID of the account to annotate")]
    pub account_id: u64,
    #[schemars(description = "Note text")]
    pub note: String,
}

impl ToolParams for AccountNoteParams {
    fn validate(&self) -> Result<(), String> {
        check_id("account_id", self.account_id)?;
        check_not_blank("note", &self.note)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct DeleteAccountNoteParams {
    #[schemars(description = "ID of the account")]
    pub account_id: u64,
    #[schemars(description = "ID of the note to delete")]
    pub note_id: u64,
}

impl ToolParams for DeleteAccountNoteParams {
    fn validate(&self) -> Result<(), String> {
        check_id("account_id", self.account_id)?;
        check_id("note_id", self.note_id)
    }
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct UpdateAccountTagsParams {
    #[schemars(description = "ID of the account")]
    pub account_id: u64,
    #[schemars(description = "Complete list of tags. Replaces the existing tags")]
    pub tags: Vec<String>,
}

impl ToolParams for UpdateAccountTagsParams {
    fn validate(&self) -> Result<(), String> {
        check_id("account_id", self.account_id)?;
        check_tags(&self.tags)
    }
}

pub(crate) async fn list_accounts(
    client: &VectraClient,
    params: ListAccountsParams,
) -> Result<Value, ToolError> {
    let filters = EntityFilters {
        state: params.state,
        name: params.name,
        tags: params.tags,
        min_threat: params.min_threat,
        min_certainty: params.min_certainty,
        account_type: params.account_type,
        ordering: params.ordering,
        severity: params.severity,
        ..Default::default()
    };
    let page = client
        .list_accounts(&filters, params.cursor, params.limit.map(|l| l as usize))
        .await?;
    to_payload(&page)
}

pub(crate) async fn get_account_details(
    client: &VectraClient,
    params: AccountDetailsParams,
) -> Result<Value, ToolError> {
    let (account, projection) = client
        .get_account(params.account_id, params.fields.as_deref())
        .await?;
    match projection {
        Some(fields) => Ok(json!({ "account": to_payload(&account)?, "fields": fields })),
        None => to_payload(&account),
    }
}

pub(crate) async fn add_account_note(
    client: &VectraClient,
    params: AccountNoteParams,
) -> Result<Value, ToolError> {
    let note = client
        .add_note(EntityKind::Account, params.account_id, params.note.trim())
        .await?;
    to_payload(&note)
}

pub(crate) async fn delete_account_note(
    client: &VectraClient,
    params: DeleteAccountNoteParams,
) -> Result<Value, ToolError> {
    client
        .delete_note(EntityKind::Account, params.account_id, params.note_id)
        .await?;
    Ok(json!({ "account_id": params.account_id, "note_id": params.note_id, "deleted": true }))
}

pub(crate) async fn get_account_tags(
    client: &VectraClient,
    params: AccountIdParams,
) -> Result<Value, ToolError> {
    let tags = client
        .get_tags(EntityKind::Account, params.account_id)
        .await?;
    to_payload(&tags)
}

pub(crate) async fn update_account_tags(
    client: &VectraClient,
    params: UpdateAccountTagsParams,
) -> Result<Value, ToolError> {
    let tags = client
        .update_tags(EntityKind::Account, params.account_id, &params.tags)
        .await?;
    to_payload(&tags)
}
