use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value;

use super::error::ToolError;
use super::params::{
    check_limit, check_optional_not_blank, format_datetime, parse_datetime, to_payload, ToolParams,
};
use crate::vectra::filters::{UserAccountType, UserFilters};
use crate::vectra::VectraClient;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct ListUsersParams {
    #[schemars(description = "Filter by username")]
    pub username: Option<String>,
    #[schemars(description = "Filter by user role")]
    pub role: Option<String>,
    #[schemars(description = "Filter by account type")]
    pub account_type: Option<UserAccountType>,
    #[schemars(description = "Filter by authentication profile name")]
    pub authentication_profile: Option<String>,
    #[schemars(description = "Only users who logged in on or after this date (YYYY-MM-DD or YYYY-MM-DDTHH:MM:SS)")]
    pub last_login_after: Option<String>,
    #[schemars(description = "Maximum number of users to return (1-1000)")]
    pub limit: Option<u32>,
}

impl ToolParams for ListUsersParams {
    fn validate(&self) -> Result<(), String> {
        check_limit(self.limit)?;
        check_optional_not_blank("username", self.username.as_deref())?;
        check_optional_not_blank("role", self.role.as_deref())?;
        check_optional_not_blank(
            "authentication_profile",
            self.authentication_profile.as_deref(),
        )?;
        if let Some(last_login) = &self.last_login_after {
            parse_datetime("last_login_after", last_login)?;
        }
        Ok(())
    }
}

pub(crate) async fn list_platform_users(
    client: &VectraClient,
    params: ListUsersParams,
) -> Result<Value, ToolError> {
    let last_login_gte = params
        .last_login_after
        .as_deref()
        .map(|s| parse_datetime("last_login_after", s).map(format_datetime))
        .transpose()
        .map_err(ToolError::Validation)?;
    let filters = UserFilters {
        username: params.username,
        role: params.role,
        account_type: params.account_type,
        authentication_profile: params.authentication_profile,
        last_login_gte,
    };
    let page = client
        .list_users(&filters, params.limit.map(|l| l as usize))
        .await?;
    to_payload(&page)
}
