use futures::future::join_all;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::{debug, warn};

use super::error::ToolError;
use super::params::{check_limit, check_not_blank, to_payload, ToolParams};
use crate::vectra::filters::SearchFamily;
use crate::vectra::models::{Account, Detection, Host};
use crate::vectra::VectraClient;

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct AdvancedSearchParams {
    #[schemars(description = "Lucene style query, e.g. 'host.threat:>=50 AND host.state:\"active\"'")]
    pub query_string: String,
    #[schemars(description = "Opaque cursor from a previous call to resume from")]
    pub cursor: Option<String>,
    #[schemars(description = "Maximum number of results to return (1-1000)")]
    pub limit: Option<u32>,
}

impl ToolParams for AdvancedSearchParams {
    fn validate(&self) -> Result<(), String> {
        check_not_blank("query_string", &self.query_string)?;
        check_limit(self.limit)
    }
}

pub(crate) async fn advanced_search_detections(
    client: &VectraClient,
    params: AdvancedSearchParams,
) -> Result<Value, ToolError> {
    debug!(query = %params.query_string, "Searching detections");
    let page = client
        .search::<Detection>(
            SearchFamily::Detections,
            params.query_string.trim(),
            params.cursor,
            params.limit.map(|l| l as usize),
        )
        .await?;
    to_payload(&page)
}

pub(crate) async fn advanced_search_hosts(
    client: &VectraClient,
    params: AdvancedSearchParams,
) -> Result<Value, ToolError> {
    debug!(query = %params.query_string, "Searching hosts");
    let page = client
        .search::<Host>(
            SearchFamily::Hosts,
            params.query_string.trim(),
            params.cursor,
            params.limit.map(|l| l as usize),
        )
        .await?;
    to_payload(&page)
}

pub(crate) async fn advanced_search_accounts(
    client: &VectraClient,
    params: AdvancedSearchParams,
) -> Result<Value, ToolError> {
    debug!(query = %params.query_string, "Searching accounts");
    let page = client
        .search::<Account>(
            SearchFamily::Accounts,
            params.query_string.trim(),
            params.cursor,
            params.limit.map(|l| l as usize),
        )
        .await?;
    to_payload(&page)
}

#[derive(Debug, Deserialize, JsonSchema)]
#[serde(deny_unknown_fields)]
pub struct UnifiedSearchParams {
    #[schemars(description = "Lucene style query run against every selected entity type, e.g. 'name:admin*'")]
    pub query_string: String,
    #[schemars(description = "Entity types to search: any of 'accounts', 'hosts', 'detections' (default: all)")]
    pub entity_types: Option<Vec<SearchFamily>>,
    #[schemars(description = "Maximum number of results per entity type (1-1000)")]
    pub limit: Option<u32>,
}

impl UnifiedSearchParams {
    /// Selected families in request order, without repeats.
    fn families(&self) -> Vec<SearchFamily> {
        let requested = self.entity_types.clone().unwrap_or_else(|| {
            vec![
                SearchFamily::Accounts,
                SearchFamily::Hosts,
                SearchFamily::Detections,
            ]
        });
        let mut families = Vec::with_capacity(requested.len());
        for family in requested {
            if !families.contains(&family) {
                families.push(family);
            }
        }
        families
    }
}

impl ToolParams for UnifiedSearchParams {
    fn validate(&self) -> Result<(), String> {
        check_not_blank("query_string", &self.query_string)?;
        if matches!(&self.entity_types, Some(types) if types.is_empty()) {
            return Err("entity_types must not be empty".to_string());
        }
        check_limit(self.limit)
    }
}

async fn search_family(
    client: &VectraClient,
    family: SearchFamily,
    query: &str,
    limit: Option<usize>,
) -> Result<Value, ToolError> {
    match family {
        SearchFamily::Detections => {
            to_payload(&client.search::<Detection>(family, query, None, limit).await?)
        }
        SearchFamily::Hosts => to_payload(&client.search::<Host>(family, query, None, limit).await?),
        SearchFamily::Accounts => {
            to_payload(&client.search::<Account>(family, query, None, limit).await?)
        }
    }
}

/// Runs one query against several search families at once. A failing family
/// is reported in place and does not fail the others.
pub(crate) async fn unified_search(
    client: &VectraClient,
    params: UnifiedSearchParams,
) -> Result<Value, ToolError> {
    let query = params.query_string.trim();
    let limit = params.limit.map(|l| l as usize);
    let families = params.families();
    debug!(%query, families = families.len(), "Running unified search");

    let outcomes = join_all(
        families
            .iter()
            .map(|family| search_family(client, *family, query, limit)),
    )
    .await;

    let mut results = Map::new();
    for (family, outcome) in families.into_iter().zip(outcomes) {
        let entry = match outcome {
            Ok(payload) => payload,
            Err(e) => {
                warn!(family = family.as_str(), error = %e, "Unified search failed for one family");
                json!({"error": {"kind": e.kind(), "message": e.to_string()}})
            }
        };
        results.insert(family.as_str().to_string(), entry);
    }
    Ok(Value::Object(results))
}
