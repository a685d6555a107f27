use std::sync::Arc;
use std::time::Duration;

use reqwest::header::{ACCEPT, RETRY_AFTER};
use reqwest::{Client, Method, Response, StatusCode};
use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use super::error::{upstream_message, VectraApiError};
use super::filters::{
    AssignableEntity, AssignmentFilters, DetectionFilters, EntityFilters, EntityKind, Query,
    SearchFamily, UserFilters,
};
use super::models::{Account, Assignment, Detection, Host, Normalize, Note, TagSet, User};
use super::pagination::{Cursor, Page, Paginated, FIRST_PAGE, MAX_PAGES};
use super::ratelimit::RateLimiter;
use super::retry::{parse_retry_after, RetryPolicy};
use super::session::SessionManager;
use crate::config::VectraConfig;

#[derive(Debug, Clone)]
pub struct VectraClient {
    http: Client,
    api_root: String,
    session: Arc<SessionManager>,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
    max_items: usize,
    page_size: u32,
}

impl VectraClient {
    pub fn new(config: &VectraConfig) -> Result<Self, VectraApiError> {
        let api_root = config.credential.api_root();
        debug!(%api_root, verify_tls = config.credential.verify_tls, "Creating new VectraClient");

        let http = Client::builder()
            .danger_accept_invalid_certs(!config.credential.verify_tls)
            .connect_timeout(config.connect_timeout)
            .timeout(config.request_timeout)
            .user_agent(concat!("mcp-server-vectra/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(VectraApiError::HttpClientCreationError)?;

        let session = SessionManager::new(
            http.clone(),
            config.credential.clone(),
            config.auth_retry.clone(),
            config.token_refresh_margin,
        );

        Ok(Self {
            http,
            api_root,
            session: Arc::new(session),
            limiter: Arc::new(RateLimiter::new(
                config.rate_limit_requests,
                config.rate_limit_period,
            )),
            policy: config.retry.clone(),
            max_items: config.max_items.max(1),
            page_size: config.page_size.max(1),
        })
    }

    pub fn session(&self) -> &Arc<SessionManager> {
        &self.session
    }

    // Detections

    pub async fn list_detections(
        &self,
        filters: &DetectionFilters,
        cursor: Option<String>,
        limit: Option<usize>,
    ) -> Result<Paginated<Detection>, VectraApiError> {
        let wanted = filters.severity;
        self.collect_pages("detections", filters.to_query(), cursor, limit, |d: &Detection| {
            wanted.map_or(true, |s| d.severity == s)
        })
        .await
    }

    pub async fn count_detections(&self, filters: &DetectionFilters) -> Result<u64, VectraApiError> {
        let mut query = filters.to_query();
        query.push(("page_size".to_string(), "1".to_string()));
        let body = self.request(Method::GET, "detections", &query, None).await?;
        let page = Page::from_envelope(body)?;
        page.count.ok_or_else(|| {
            VectraApiError::InvalidResponse("detection list without a 'count' field".to_string())
        })
    }

    pub async fn get_detection(&self, detection_id: u64) -> Result<Detection, VectraApiError> {
        let body = self.get(&format!("detections/{}", detection_id)).await?;
        Detection::from_upstream(&body)
    }

    pub async fn mark_detections_fixed(
        &self,
        detection_ids: &[u64],
        fixed: bool,
    ) -> Result<Value, VectraApiError> {
        info!(count = detection_ids.len(), fixed, "Updating detection fixed state");
        let body = json!({
            "detectionIdList": detection_ids,
            "mark_as_fixed": if fixed { "true" } else { "false" },
        });
        self.request(Method::PATCH, "detections", &[], Some(&body))
            .await
    }

    // Hosts and accounts

    pub async fn list_hosts(
        &self,
        filters: &EntityFilters,
        cursor: Option<String>,
        limit: Option<usize>,
    ) -> Result<Paginated<Host>, VectraApiError> {
        let wanted = filters.severity;
        self.collect_pages("hosts", filters.to_query(), cursor, limit, |h: &Host| {
            wanted.map_or(true, |s| h.severity == s)
        })
        .await
    }

    pub async fn get_host(&self, host_id: u64) -> Result<Host, VectraApiError> {
        let body = self.get(&format!("hosts/{}", host_id)).await?;
        Host::from_upstream(&body)
    }

    pub async fn list_accounts(
        &self,
        filters: &EntityFilters,
        cursor: Option<String>,
        limit: Option<usize>,
    ) -> Result<Paginated<Account>, VectraApiError> {
        let wanted = filters.severity;
        self.collect_pages("accounts", filters.to_query(), cursor, limit, |a: &Account| {
            wanted.map_or(true, |s| a.severity == s)
        })
        .await
    }

    /// Fetches one account. With `fields` set, only those upstream fields are
    /// requested and the raw projection is returned alongside the normalized record.
    pub async fn get_account(
        &self,
        account_id: u64,
        fields: Option<&[String]>,
    ) -> Result<(Account, Option<Value>), VectraApiError> {
        let path = format!("accounts/{}", account_id);
        let mut query = Query::new();
        if let Some(fields) = fields.filter(|f| !f.is_empty()) {
            let mut requested: Vec<&str> = fields.iter().map(String::as_str).collect();
            if !requested.contains(&"id") {
                requested.insert(0, "id");
            }
            query.push(("fields".to_string(), requested.join(",")));
        }
        let body = self.request(Method::GET, &path, &query, None).await?;
        let account = Account::from_upstream(&body)?;
        let projection = (!query.is_empty()).then_some(body);
        Ok((account, projection))
    }

    // Notes and tags

    pub async fn list_notes(&self, kind: EntityKind, entity_id: u64) -> Result<Vec<Note>, VectraApiError> {
        let path = format!("{}/{}/notes", kind.collection(), entity_id);
        let body = self.get(&path).await?;
        let page = Page::from_envelope(body)?;
        page.items.iter().map(Note::from_upstream).collect()
    }

    pub async fn add_note(&self, kind: EntityKind, entity_id: u64, text: &str) -> Result<Note, VectraApiError> {
        let path = format!("{}/{}/notes", kind.collection(), entity_id);
        info!(entity = kind.tag_kind(), entity_id, "Adding note");
        let body = self
            .request(Method::POST, &path, &[], Some(&json!({ "note": text })))
            .await?;
        Note::from_upstream(&body)
    }

    pub async fn delete_note(&self, kind: EntityKind, entity_id: u64, note_id: u64) -> Result<Value, VectraApiError> {
        let path = format!("{}/{}/notes/{}", kind.collection(), entity_id, note_id);
        info!(entity = kind.tag_kind(), entity_id, note_id, "Deleting note");
        self.request(Method::DELETE, &path, &[], None).await
    }

    pub async fn get_tags(&self, kind: EntityKind, entity_id: u64) -> Result<TagSet, VectraApiError> {
        let body = self
            .get(&format!("tagging/{}/{}", kind.tag_kind(), entity_id))
            .await?;
        Ok(TagSet::from_upstream(entity_id, &body))
    }

    pub async fn update_tags(
        &self,
        kind: EntityKind,
        entity_id: u64,
        tags: &[String],
    ) -> Result<TagSet, VectraApiError> {
        let path = format!("tagging/{}/{}", kind.tag_kind(), entity_id);
        info!(entity = kind.tag_kind(), entity_id, count = tags.len(), "Replacing tags");
        let body = self
            .request(Method::PATCH, &path, &[], Some(&json!({ "tags": tags })))
            .await?;
        // Some releases answer the PATCH with a bare status object.
        if body.get("tags").is_some() || body.is_array() {
            Ok(TagSet::from_upstream(entity_id, &body))
        } else {
            Ok(TagSet {
                entity_id,
                tags: tags.to_vec(),
            })
        }
    }

    // Assignments and users

    pub async fn list_assignments(
        &self,
        filters: &AssignmentFilters,
        limit: Option<usize>,
    ) -> Result<Paginated<Assignment>, VectraApiError> {
        self.collect_pages("assignments", filters.to_query(), None, limit, |_: &Assignment| true)
            .await
    }

    pub async fn get_assignment(&self, assignment_id: u64) -> Result<Assignment, VectraApiError> {
        let body = self.get(&format!("assignments/{}", assignment_id)).await?;
        // The detail endpoint wraps the record in `{"assignment": {...}}`.
        match body.get("assignment") {
            Some(inner) if inner.is_object() => Assignment::from_upstream(inner),
            _ => Assignment::from_upstream(&body),
        }
    }

    pub async fn assign(
        &self,
        entity: AssignableEntity,
        entity_id: u64,
        assignee: u64,
    ) -> Result<Assignment, VectraApiError> {
        let target_key = match entity {
            AssignableEntity::Host => "assign_host_id",
            AssignableEntity::Account => "assign_account_id",
        };
        info!(entity = entity.as_kind().tag_kind(), entity_id, assignee, "Creating assignment");
        let mut body = serde_json::Map::new();
        body.insert("assign_to_user_id".to_string(), json!(assignee));
        body.insert(target_key.to_string(), json!(entity_id));
        let body = Value::Object(body);
        let created = self
            .request(Method::POST, "assignments", &[], Some(&body))
            .await?;
        match created.get("assignment") {
            Some(inner) if inner.is_object() => Assignment::from_upstream(inner),
            _ => Assignment::from_upstream(&created),
        }
    }

    pub async fn delete_assignment(&self, assignment_id: u64) -> Result<Value, VectraApiError> {
        info!(assignment_id, "Deleting assignment");
        self.request(Method::DELETE, &format!("assignments/{}", assignment_id), &[], None)
            .await
    }

    pub async fn list_users(
        &self,
        filters: &UserFilters,
        limit: Option<usize>,
    ) -> Result<Paginated<User>, VectraApiError> {
        self.collect_pages("users", filters.to_query(), None, limit, |_: &User| true)
            .await
    }

    // Search

    pub async fn search<T: Normalize>(
        &self,
        family: SearchFamily,
        query_string: &str,
        cursor: Option<String>,
        limit: Option<usize>,
    ) -> Result<Paginated<T>, VectraApiError> {
        let query = vec![("query_string".to_string(), query_string.to_string())];
        self.collect_pages(family.path(), query, cursor, limit, |_: &T| true)
            .await
    }

    async fn get(&self, path: &str) -> Result<Value, VectraApiError> {
        self.request(Method::GET, path, &[], None).await
    }

    /// Follows `next` cursors until the list is drained or a cap is hit.
    async fn collect_pages<T, F>(
        &self,
        path: &str,
        base_query: Query,
        start_cursor: Option<String>,
        limit: Option<usize>,
        keep: F,
    ) -> Result<Paginated<T>, VectraApiError>
    where
        T: Normalize,
        F: Fn(&T) -> bool,
    {
        let cap = limit.map_or(self.max_items, |l| l.clamp(1, self.max_items));
        let mut cursor = start_cursor.as_deref().and_then(Cursor::parse);
        let mut items: Vec<T> = Vec::new();
        let mut resume: Option<Cursor> = None;
        let mut truncated = false;
        let mut pages = 0usize;

        loop {
            let mut query = base_query.clone();
            query.push(("page_size".to_string(), self.page_size.to_string()));
            if let Some(current) = &cursor {
                query.push(("page".to_string(), current.page.clone()));
            }

            let body = self.request(Method::GET, path, &query, None).await?;
            let page = Page::from_envelope(body)?;
            pages += 1;
            debug!(%path, pages, fetched = page.items.len(), collected = items.len(), "Fetched page");

            let skip = cursor.as_ref().map_or(0, |c| c.skip);
            for (index, raw) in page.items.iter().enumerate().skip(skip) {
                if items.len() >= cap {
                    let current = cursor.as_ref().map_or(FIRST_PAGE, |c| c.page.as_str());
                    resume = Some(Cursor::within(current, index));
                    break;
                }
                let record = T::from_upstream(raw)?;
                if keep(&record) {
                    items.push(record);
                }
            }

            if resume.is_some() {
                truncated = true;
                break;
            }
            if items.len() >= cap {
                resume = page.next_cursor.map(Cursor::page);
                truncated = resume.is_some();
                break;
            }

            match page.next_cursor {
                None => break,
                Some(next) if cursor.as_ref().map(|c| c.page.as_str()) == Some(next.as_str()) => {
                    warn!(%path, cursor = %next, "Upstream repeated the requested cursor, stopping");
                    truncated = true;
                    break;
                }
                Some(next) if pages >= MAX_PAGES => {
                    warn!(%path, max_pages = MAX_PAGES, "Reached page limit, stopping");
                    resume = Some(Cursor::page(next));
                    truncated = true;
                    break;
                }
                Some(next) => cursor = Some(Cursor::page(next)),
            }
        }

        debug!(%path, pages, count = items.len(), truncated, "Pagination finished");
        Ok(Paginated::new(items, truncated).resume_at(resume))
    }

    /// Sends one logical request, applying re-authentication and retry rules.
    async fn request(
        &self,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<Value, VectraApiError> {
        let url = format!("{}/{}", self.api_root, path.trim_start_matches('/'));
        let mut attempt: u32 = 1;
        let mut reauthenticated = false;

        loop {
            self.limiter.acquire().await;
            let token = self.session.get_valid_token().await?;

            let mut builder = self
                .http
                .request(method.clone(), &url)
                .bearer_auth(token.value())
                .header(ACCEPT, "application/json");
            if !query.is_empty() {
                builder = builder.query(query);
            }
            if let Some(body) = body {
                builder = builder.json(body);
            }

            debug!(%method, %url, attempt, "Sending Vectra API request");
            let failure = match builder.send().await {
                Ok(response) if response.status().is_success() => {
                    let status = response.status().as_u16();
                    match response.bytes().await {
                        Ok(bytes) => {
                            debug!(%method, %url, status, "Vectra API request succeeded");
                            return decode_body(&bytes);
                        }
                        Err(e) => format!("failed to read response body: {}", e),
                    }
                }
                Ok(response) if response.status() == StatusCode::UNAUTHORIZED => {
                    let status = response.status().as_u16();
                    let message = upstream_message(&response.text().await.unwrap_or_default());
                    if reauthenticated {
                        error!(%method, %url, "Vectra API rejected a freshly issued token");
                        return Err(VectraApiError::AuthenticationError { status, message });
                    }
                    warn!(%method, %url, %message, "Token rejected, re-authenticating once");
                    self.session.invalidate(&token);
                    reauthenticated = true;
                    continue;
                }
                Ok(response) if self.policy.is_retryable(response.status().as_u16()) => {
                    let status = response.status();
                    let retry_after = retry_after_hint(&response);
                    let message = upstream_message(&response.text().await.unwrap_or_default());
                    if !self.policy.can_retry(attempt) {
                        error!(%method, %url, status = status.as_u16(), attempt, %message, "Vectra API retries exhausted");
                        return Err(if status == StatusCode::TOO_MANY_REQUESTS {
                            VectraApiError::RateLimited { attempts: attempt }
                        } else {
                            VectraApiError::ServerError {
                                status: status.as_u16(),
                                attempts: attempt,
                                message,
                            }
                        });
                    }
                    let delay = self.policy.delay_for(attempt, retry_after);
                    warn!(%method, %url, status = status.as_u16(), attempt, delay_ms = delay.as_millis() as u64, "Retryable upstream status");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                    continue;
                }
                Ok(response) => {
                    let status = response.status();
                    let message = upstream_message(&response.text().await.unwrap_or_default());
                    warn!(%method, %url, status = status.as_u16(), %message, "Vectra API rejected the request");
                    return Err(if status.is_client_error() {
                        VectraApiError::RequestRejected {
                            status: status.as_u16(),
                            message,
                        }
                    } else {
                        VectraApiError::ServerError {
                            status: status.as_u16(),
                            attempts: attempt,
                            message,
                        }
                    });
                }
                Err(e) => e.to_string(),
            };

            if !self.policy.can_retry(attempt) {
                error!(%method, %url, attempt, error = %failure, "Vectra API request failed");
                return Err(VectraApiError::Network {
                    attempts: attempt,
                    message: failure,
                });
            }
            let delay = self.policy.backoff(attempt);
            warn!(%method, %url, attempt, delay_ms = delay.as_millis() as u64, error = %failure, "Network error, retrying");
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

fn retry_after_hint(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get(RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(parse_retry_after)
}

fn decode_body(bytes: &[u8]) -> Result<Value, VectraApiError> {
    if bytes.iter().all(u8::is_ascii_whitespace) {
        return Ok(Value::Null);
    }
    Ok(serde_json::from_slice(bytes)?)
}
