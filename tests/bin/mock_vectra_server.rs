use axum::{
    extract::{Path, Query, Request},
    http::{header::AUTHORIZATION, HeaderMap, StatusCode},
    middleware::{self, Next},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use tokio::net::TcpListener;
use tracing::{info, warn, Level};
use tracing_subscriber::FmtSubscriber;

const API_KEY: &str = "test_api_key";
const ACCESS_TOKEN: &str = "mock-access-token";

struct MockData {
    detections: Vec<Value>,
    hosts: Vec<Value>,
    accounts: Vec<Value>,
    users: Vec<Value>,
    assignments: Vec<Value>,
    notes: HashMap<(String, u64), Vec<Value>>,
    tags: HashMap<(String, u64), Vec<String>>,
    next_id: u64,
}

static MOCK_DATA: Lazy<Mutex<MockData>> = Lazy::new(|| {
    let detections = vec![
        json!({
            "id": 1001,
            "detection": "Hidden HTTPS Tunnel",
            "detection_category": "COMMAND & CONTROL",
            "detection_type": "Hidden HTTPS Tunnel",
            "state": "active",
            "threat": 80,
            "certainty": 30,
            "src_ip": "10.1.1.20",
            "src_host": {"id": 7, "name": "ws-finance-01", "ip": "10.1.1.20"},
            "first_timestamp": "2024-05-01T08:00:00Z",
            "last_timestamp": "2024-05-02T09:30:00Z",
            "is_triaged": false,
            "is_targeting_key_asset": true,
            "tags": ["c2"],
            "summary": {"dst_ips": ["203.0.113.9"], "bytes_sent": 120394},
        }),
        json!({
            "id": 1002,
            "detection": "Port Scan",
            "detection_category": "RECONNAISSANCE",
            "detection_type": "Port Scan",
            "state": "active",
            "threat": 20,
            "certainty": 40,
            "src_ip": "10.1.1.20",
            "src_host": {"id": 7, "name": "ws-finance-01", "ip": "10.1.1.20"},
            "last_timestamp": "2024-05-02T07:00:00Z",
            "tags": [],
        }),
        json!({
            "id": 1003,
            "detection": "Privilege Anomaly: Unusual Account on Host",
            "detection_category": "LATERAL MOVEMENT",
            "state": "active",
            "threat": 65,
            "certainty": 70,
            "src_account": {"id": 31, "name": "svc-backup@corp.example"},
            "last_timestamp": "2024-05-03T11:15:00Z",
            "tags": [],
        }),
    ];

    let hosts = vec![
        json!({
            "id": 7,
            "name": "ws-finance-01",
            "last_source": "10.1.1.20",
            "state": "active",
            "threat": 72,
            "certainty": 45,
            "is_key_asset": true,
            "sensor_name": "sensor-hq",
            "last_detection_timestamp": "2024-05-02T09:30:00Z",
            "detection_set": [
                "https://brain.example/api/v2.5/detections/1001",
                "https://brain.example/api/v2.5/detections/1002"
            ],
            "assigned_to": null,
        }),
        json!({
            "id": 8,
            "name": "srv-build-02",
            "last_source": "10.1.2.5",
            "state": "inactive",
            "threat": 5,
            "certainty": 10,
            "is_key_asset": false,
            "detection_set": [],
        }),
    ];

    let accounts = vec![json!({
        "id": 31,
        "name": "svc-backup@corp.example",
        "account_type": "kerberos",
        "state": "active",
        "threat": 65,
        "certainty": 70,
        "privilege_level": 8,
        "privilege_category": "High",
        "detection_set": ["https://brain.example/api/v2.5/detections/1003"],
    })];

    let users = vec![
        json!({"id": 3, "username": "analyst1", "role": "Security Analyst", "account_type": "local", "last_login_timestamp": "2024-05-03T08:00:00Z"}),
        json!({"id": 4, "username": "lead", "role": "Admin", "account_type": "SAML", "authentication_profile": "okta"}),
    ];

    let mut notes = HashMap::new();
    notes.insert(
        ("hosts".to_string(), 7),
        vec![json!({"id": 501, "note": "Laptop belongs to the CFO", "created_by": "analyst1", "date_created": "2024-05-02T10:00:00Z"})],
    );

    let mut tags = HashMap::new();
    tags.insert(("host".to_string(), 7), vec!["finance".to_string()]);

    Mutex::new(MockData {
        detections,
        hosts,
        accounts,
        users,
        assignments: vec![json!({
            "id": 900,
            "assigned_to": {"id": 3, "username": "analyst1"},
            "assigned_by": {"id": 4, "username": "lead"},
            "host_id": 7,
            "date_assigned": "2024-05-02T10:05:00Z",
            "date_resolved": null,
        })],
        notes,
        tags,
        next_id: 10_000,
    })
});

fn not_found(what: &str, id: u64) -> Response {
    (
        StatusCode::NOT_FOUND,
        Json(json!({"detail": format!("{} {} not found", what, id)})),
    )
        .into_response()
}

fn find(items: &[Value], id: u64) -> Option<Value> {
    items.iter().find(|v| v["id"].as_u64() == Some(id)).cloned()
}

/// Wraps `items` in the upstream `{count, next, previous, results}` envelope.
fn paginate(collection: &str, items: Vec<Value>, params: &HashMap<String, String>) -> Value {
    let page: usize = params.get("page").and_then(|p| p.parse().ok()).unwrap_or(1).max(1);
    let page_size: usize = params
        .get("page_size")
        .and_then(|p| p.parse().ok())
        .unwrap_or(50)
        .max(1);
    let total = items.len();
    let start = (page - 1) * page_size;
    let results: Vec<Value> = items.into_iter().skip(start).take(page_size).collect();
    let next = (start + page_size < total).then(|| {
        format!(
            "/api/v2.5/{}?page={}&page_size={}",
            collection,
            page + 1,
            page_size
        )
    });
    json!({"count": total, "next": next, "previous": null, "results": results})
}

fn matches_param(item: &Value, params: &HashMap<String, String>, key: &str, field: &str) -> bool {
    match params.get(key) {
        None => true,
        Some(wanted) => match &item[field] {
            Value::String(s) => s.eq_ignore_ascii_case(wanted),
            Value::Number(n) => n.to_string() == *wanted,
            Value::Bool(b) => b.to_string() == *wanted,
            _ => false,
        },
    }
}

async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}

async fn issue_token(headers: HeaderMap, body: String) -> Response {
    let expected = format!("Token {}", API_KEY);
    let presented = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok());
    if presented != Some(expected.as_str()) || !body.contains("grant_type=client_credentials") {
        warn!("Rejected token request");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"error": "invalid_client"})),
        )
            .into_response();
    }
    info!("Issued access token");
    Json(json!({"access_token": ACCESS_TOKEN, "token_type": "Bearer", "expires_in": 3600}))
        .into_response()
}

async fn require_bearer(request: Request, next: Next) -> Response {
    let expected = format!("Bearer {}", ACCESS_TOKEN);
    let presented = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok());
    if presented != Some(expected.as_str()) {
        warn!("Rejected request without a valid bearer token");
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"detail": "Authentication credentials were not provided."})),
        )
            .into_response();
    }
    next.run(request).await
}

async fn list_detections(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    info!("Listing detections: {:?}", params);
    let data = MOCK_DATA.lock().unwrap();
    let items: Vec<Value> = data
        .detections
        .iter()
        .filter(|d| matches_param(d, &params, "state", "state"))
        .filter(|d| match params.get("host_id").and_then(|h| h.parse::<u64>().ok()) {
            Some(host_id) => d["src_host"]["id"].as_u64() == Some(host_id),
            None => true,
        })
        .filter(|d| match params.get("threat_gte").and_then(|t| t.parse::<u64>().ok()) {
            Some(min) => d["threat"].as_u64().unwrap_or(0) >= min,
            None => true,
        })
        .cloned()
        .collect();
    Json(paginate("detections", items, &params))
}

async fn get_detection(Path(id): Path<u64>) -> Response {
    let data = MOCK_DATA.lock().unwrap();
    match find(&data.detections, id) {
        Some(detection) => Json(detection).into_response(),
        None => not_found("Detection", id),
    }
}

async fn mark_fixed(Json(payload): Json<Value>) -> Response {
    let mut data = MOCK_DATA.lock().unwrap();
    let fixed = payload["mark_as_fixed"].as_str() == Some("true");
    let ids: Vec<u64> = payload["detectionIdList"]
        .as_array()
        .map(|ids| ids.iter().filter_map(Value::as_u64).collect())
        .unwrap_or_default();
    for detection in data.detections.iter_mut() {
        if detection["id"].as_u64().map_or(false, |id| ids.contains(&id)) {
            detection["state"] = json!(if fixed { "fixed" } else { "active" });
        }
    }
    info!("Marked {:?} fixed={}", ids, fixed);
    Json(json!({"_meta": {"level": "Success", "message": "Successfully marked detections"}}))
        .into_response()
}

async fn list_hosts(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    let data = MOCK_DATA.lock().unwrap();
    let items: Vec<Value> = data
        .hosts
        .iter()
        .filter(|h| matches_param(h, &params, "state", "state"))
        .filter(|h| matches_param(h, &params, "is_key_asset", "is_key_asset"))
        .cloned()
        .collect();
    Json(paginate("hosts", items, &params))
}

async fn get_host(Path(id): Path<u64>) -> Response {
    let data = MOCK_DATA.lock().unwrap();
    match find(&data.hosts, id) {
        Some(host) => Json(host).into_response(),
        None => not_found("Host", id),
    }
}

async fn list_accounts(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    let data = MOCK_DATA.lock().unwrap();
    let items: Vec<Value> = data
        .accounts
        .iter()
        .filter(|a| matches_param(a, &params, "state", "state"))
        .cloned()
        .collect();
    Json(paginate("accounts", items, &params))
}

async fn get_account(
    Path(id): Path<u64>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let data = MOCK_DATA.lock().unwrap();
    let Some(account) = find(&data.accounts, id) else {
        return not_found("Account", id);
    };
    match params.get("fields") {
        Some(fields) => {
            let projected: serde_json::Map<String, Value> = fields
                .split(',')
                .filter_map(|f| account.get(f).map(|v| (f.to_string(), v.clone())))
                .collect();
            Json(Value::Object(projected)).into_response()
        }
        None => Json(account).into_response(),
    }
}

async fn list_notes(collection: &'static str, id: u64) -> Response {
    let data = MOCK_DATA.lock().unwrap();
    let notes = data
        .notes
        .get(&(collection.to_string(), id))
        .cloned()
        .unwrap_or_default();
    Json(Value::Array(notes)).into_response()
}

async fn add_note(collection: &'static str, id: u64, payload: Value) -> Response {
    let Some(text) = payload["note"].as_str() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "note is required"})),
        )
            .into_response();
    };
    let mut data = MOCK_DATA.lock().unwrap();
    data.next_id += 1;
    let note = json!({
        "id": data.next_id,
        "note": text,
        "created_by": "api_client",
        "date_created": Utc::now().to_rfc3339(),
    });
    data.notes
        .entry((collection.to_string(), id))
        .or_default()
        .push(note.clone());
    info!("Added note to {} {}", collection, id);
    (StatusCode::CREATED, Json(note)).into_response()
}

async fn delete_note(collection: &'static str, id: u64, note_id: u64) -> Response {
    let mut data = MOCK_DATA.lock().unwrap();
    let notes = data.notes.entry((collection.to_string(), id)).or_default();
    let before = notes.len();
    notes.retain(|n| n["id"].as_u64() != Some(note_id));
    if notes.len() == before {
        return not_found("Note", note_id);
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn get_tags(Path((kind, id)): Path<(String, u64)>) -> Response {
    let data = MOCK_DATA.lock().unwrap();
    let tags = data.tags.get(&(kind, id)).cloned().unwrap_or_default();
    Json(json!({"status": "success", "tag_id": id, "tags": tags})).into_response()
}

async fn update_tags(Path((kind, id)): Path<(String, u64)>, Json(payload): Json<Value>) -> Response {
    let tags: Vec<String> = payload["tags"]
        .as_array()
        .map(|t| t.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
        .unwrap_or_default();
    let mut data = MOCK_DATA.lock().unwrap();
    data.tags.insert((kind, id), tags.clone());
    Json(json!({"status": "success", "tag_id": id, "tags": tags})).into_response()
}

async fn list_assignments(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    let data = MOCK_DATA.lock().unwrap();
    let id_filter = |key: &str| -> Vec<u64> {
        params
            .get(key)
            .map(|v| v.split(',').filter_map(|s| s.parse().ok()).collect())
            .unwrap_or_default()
    };
    let hosts = id_filter("hosts");
    let accounts = id_filter("accounts");
    let assignees = id_filter("assignees");
    let items: Vec<Value> = data
        .assignments
        .iter()
        .filter(|a| hosts.is_empty() || a["host_id"].as_u64().map_or(false, |h| hosts.contains(&h)))
        .filter(|a| {
            accounts.is_empty() || a["account_id"].as_u64().map_or(false, |h| accounts.contains(&h))
        })
        .filter(|a| {
            assignees.is_empty()
                || a["assigned_to"]["id"]
                    .as_u64()
                    .map_or(false, |u| assignees.contains(&u))
        })
        .filter(|a| match params.get("resolved").map(String::as_str) {
            Some("true") => !a["date_resolved"].is_null(),
            Some("false") => a["date_resolved"].is_null(),
            _ => true,
        })
        .cloned()
        .collect();
    Json(paginate("assignments", items, &params))
}

async fn get_assignment(Path(id): Path<u64>) -> Response {
    let data = MOCK_DATA.lock().unwrap();
    match find(&data.assignments, id) {
        Some(assignment) => Json(json!({ "assignment": assignment })).into_response(),
        None => not_found("Assignment", id),
    }
}

async fn create_assignment(Json(payload): Json<Value>) -> Response {
    let Some(user_id) = payload["assign_to_user_id"].as_u64() else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "assign_to_user_id is required"})),
        )
            .into_response();
    };
    let mut data = MOCK_DATA.lock().unwrap();
    let username = find(&data.users, user_id).and_then(|u| u["username"].as_str().map(str::to_string));
    data.next_id += 1;
    let assignment = json!({
        "id": data.next_id,
        "assigned_to": {"id": user_id, "username": username},
        "host_id": payload["assign_host_id"],
        "account_id": payload["assign_account_id"],
        "date_assigned": Utc::now().to_rfc3339(),
        "date_resolved": null,
    });
    data.assignments.push(assignment.clone());
    (StatusCode::CREATED, Json(json!({ "assignment": assignment }))).into_response()
}

async fn delete_assignment(Path(id): Path<u64>) -> Response {
    let mut data = MOCK_DATA.lock().unwrap();
    let before = data.assignments.len();
    data.assignments.retain(|a| a["id"].as_u64() != Some(id));
    if data.assignments.len() == before {
        return not_found("Assignment", id);
    }
    StatusCode::NO_CONTENT.into_response()
}

async fn list_users(Query(params): Query<HashMap<String, String>>) -> impl IntoResponse {
    let data = MOCK_DATA.lock().unwrap();
    let items: Vec<Value> = data
        .users
        .iter()
        .filter(|u| matches_param(u, &params, "username", "username"))
        .filter(|u| matches_param(u, &params, "role", "role"))
        .cloned()
        .collect();
    Json(paginate("users", items, &params))
}

async fn search(
    Path(family): Path<String>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    let Some(query_string) = params.get("query_string") else {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({"detail": "query_string is required"})),
        )
            .into_response();
    };
    info!("Search {} with '{}'", family, query_string);
    let data = MOCK_DATA.lock().unwrap();
    // Only `field:value` terms are understood here.
    let term = query_string.split_once(':').map(|(f, v)| {
        (
            f.trim().rsplit('.').next().unwrap_or_default().to_string(),
            v.trim().trim_matches('"').to_string(),
        )
    });
    let source = match family.as_str() {
        "detections" => &data.detections,
        "hosts" => &data.hosts,
        "accounts" => &data.accounts,
        other => {
            return (
                StatusCode::NOT_FOUND,
                Json(json!({"detail": format!("Unknown search family {}", other)})),
            )
                .into_response()
        }
    };
    let items: Vec<Value> = source
        .iter()
        .filter(|item| match &term {
            Some((field, value)) => match &item[field.as_str()] {
                Value::String(s) => s.eq_ignore_ascii_case(value),
                Value::Number(n) => n.to_string() == *value,
                _ => false,
            },
            None => true,
        })
        .cloned()
        .collect();
    Json(paginate(&format!("search/{}", family), items, &params)).into_response()
}

fn notes_routes(collection: &'static str) -> Router {
    Router::new()
        .route(
            &format!("/{}/{{id}}/notes", collection),
            get(move |Path(id): Path<u64>| list_notes(collection, id)).post(
                move |Path(id): Path<u64>, Json(payload): Json<Value>| {
                    add_note(collection, id, payload)
                },
            ),
        )
        .route(
            &format!("/{}/{{id}}/notes/{{note_id}}", collection),
            axum::routing::delete(move |Path((id, note_id)): Path<(u64, u64)>| {
                delete_note(collection, id, note_id)
            }),
        )
}

async fn catch_all(method: axum::http::Method, uri: axum::http::Uri) -> impl IntoResponse {
    warn!("Unhandled request: {} {}", method, uri.path());
    (
        StatusCode::NOT_FOUND,
        Json(json!({"detail": format!("No handler for: {} {}", method, uri.path())})),
    )
}

#[tokio::main]
async fn main() {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber).expect("Failed to set tracing subscriber");

    info!("Starting Mock Vectra Server...");

    let api = Router::new()
        .route("/detections", get(list_detections).patch(mark_fixed))
        .route("/detections/{id}", get(get_detection))
        .route("/hosts", get(list_hosts))
        .route("/hosts/{id}", get(get_host))
        .route("/accounts", get(list_accounts))
        .route("/accounts/{id}", get(get_account))
        .merge(notes_routes("hosts"))
        .merge(notes_routes("accounts"))
        .merge(notes_routes("detections"))
        .route("/tagging/{kind}/{id}", get(get_tags).patch(update_tags))
        .route("/assignments", get(list_assignments).post(create_assignment))
        .route(
            "/assignments/{id}",
            get(get_assignment).delete(delete_assignment),
        )
        .route("/users", get(list_users))
        .route("/search/{family}", get(search))
        .route_layer(middleware::from_fn(require_bearer));

    let app = Router::new()
        .route("/health", get(health_check))
        .route("/oauth2/token", post(issue_token))
        .nest("/api/v2.5", api)
        .fallback(catch_all);

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let port = addr.port();

    println!("MOCK_SERVER_PORT={}", port);
    info!("Mock server listening on 127.0.0.1:{}", port);

    axum::serve(listener, app).await.unwrap();
}
