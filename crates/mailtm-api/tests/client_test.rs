//! HTTP-level tests for the Mail.tm client against an in-process server

use axum::extract::{Path, Query, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use mailtm_api::{Error, MailClient};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

#[derive(Default)]
struct Inbox {
    messages: Mutex<Vec<Value>>,
    seen: Mutex<Vec<String>>,
    auth_headers: Mutex<Vec<String>>,
}

fn message_json(id: &str, subject: &str) -> Value {
    json!({
        "id": id,
        "accountId": "/accounts/acc-1",
        "msgid": format!("<{}@example.org>", id),
        "from": {"address": "sender@example.org", "name": "Sender"},
        "to": [{"address": "me@example.com", "name": ""}],
        "subject": subject,
        "intro": "hello",
        "seen": false,
        "isDeleted": false,
        "hasAttachments": false,
        "size": 10,
        "downloadUrl": format!("/messages/{}/download", id),
        "createdAt": "2024-01-01T00:00:00+00:00",
        "updatedAt": "2024-01-01T00:00:00+00:00"
    })
}

fn record_auth(inbox: &Inbox, headers: &HeaderMap) {
    if let Some(value) = headers.get("authorization").and_then(|v| v.to_str().ok()) {
        inbox.auth_headers.lock().unwrap().push(value.to_string());
    }
}

async fn list_domains(Query(q): Query<HashMap<String, String>>) -> Json<Value> {
    // Two pages of two, three domains total
    let page: usize = q.get("page").and_then(|p| p.parse().ok()).unwrap_or(1);
    let all = [("d1", "a.com"), ("d2", "b.com"), ("d3", "c.com")];
    let member: Vec<Value> = all
        .iter()
        .skip((page - 1) * 2)
        .take(2)
        .map(|(id, name)| json!({"id": id, "domain": name, "isActive": true, "isPrivate": false}))
        .collect();
    Json(json!({"hydra:member": member, "hydra:totalItems": all.len()}))
}

async fn get_domain(Path(id): Path<String>) -> impl IntoResponse {
    if id == "d1" {
        (StatusCode::OK, Json(json!({"id": "d1", "domain": "a.com"})))
    } else {
        (
            StatusCode::NOT_FOUND,
            Json(json!({"hydra:description": "Not Found"})),
        )
    }
}

async fn create_account(Json(body): Json<Value>) -> impl IntoResponse {
    let address = body["address"].as_str().unwrap_or_default().to_string();
    if address.starts_with("taken@") {
        return (
            StatusCode::UNPROCESSABLE_ENTITY,
            Json(json!({"detail": "address: This value is already used."})),
        );
    }
    (
        StatusCode::CREATED,
        Json(json!({"id": "acc-1", "address": address, "quota": 40000000, "used": 0})),
    )
}

async fn issue_token(Json(body): Json<Value>) -> impl IntoResponse {
    if body["password"] == "wrong" {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"code": 401, "message": "Invalid credentials."})),
        );
    }
    (StatusCode::OK, Json(json!({"id": "acc-1", "token": "jwt-1"})))
}

async fn me(State(inbox): State<Arc<Inbox>>, headers: HeaderMap) -> impl IntoResponse {
    record_auth(&inbox, &headers);
    if headers.get("authorization").is_none() {
        return (
            StatusCode::UNAUTHORIZED,
            Json(json!({"code": 401, "message": "JWT Token not found"})),
        );
    }
    (
        StatusCode::OK,
        Json(json!({"id": "acc-1", "address": "me@example.com"})),
    )
}

async fn list_messages(State(inbox): State<Arc<Inbox>>, headers: HeaderMap) -> Json<Value> {
    record_auth(&inbox, &headers);
    // Plain array, no Hydra envelope
    Json(Value::Array(inbox.messages.lock().unwrap().clone()))
}

async fn get_message(State(inbox): State<Arc<Inbox>>, Path(id): Path<String>) -> impl IntoResponse {
    let messages = inbox.messages.lock().unwrap();
    match messages.iter().find(|m| m["id"] == id.as_str()) {
        Some(m) => {
            let mut full = m.clone();
            full["text"] = json!("full body");
            full["html"] = json!(["<p>full body</p>"]);
            (StatusCode::OK, Json(full))
        }
        None => (StatusCode::NOT_FOUND, Json(json!({"detail": "Not Found"}))),
    }
}

async fn delete_message(State(inbox): State<Arc<Inbox>>, Path(id): Path<String>) -> StatusCode {
    let mut messages = inbox.messages.lock().unwrap();
    let before = messages.len();
    messages.retain(|m| m["id"] != id.as_str());
    if messages.len() == before {
        StatusCode::NOT_FOUND
    } else {
        StatusCode::NO_CONTENT
    }
}

async fn patch_message(
    State(inbox): State<Arc<Inbox>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    body: String,
) -> impl IntoResponse {
    let content_type = headers
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if content_type != "application/merge-patch+json" {
        return StatusCode::UNSUPPORTED_MEDIA_TYPE;
    }
    let patch: Value = serde_json::from_str(&body).unwrap_or_default();
    if patch["seen"] == true {
        inbox.seen.lock().unwrap().push(id);
    }
    StatusCode::OK
}

async fn rate_limited() -> impl IntoResponse {
    (StatusCode::TOO_MANY_REQUESTS, "slow down")
}

async fn spawn_server(inbox: Arc<Inbox>) -> String {
    let app = Router::new()
        .route("/domains", get(list_domains))
        .route("/domains/{id}", get(get_domain))
        .route("/accounts", post(create_account))
        .route("/token", post(issue_token))
        .route("/me", get(me))
        .route("/messages", get(list_messages))
        .route(
            "/messages/{id}",
            get(get_message)
                .delete(delete_message)
                .patch(patch_message),
        )
        .route("/sources/{id}", get(rate_limited))
        .with_state(inbox);

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn client_for(inbox: Arc<Inbox>) -> MailClient {
    let base = spawn_server(inbox).await;
    MailClient::builder().base_url(base).build().unwrap()
}

#[tokio::test]
async fn test_all_domains_follows_pagination() {
    let client = client_for(Arc::new(Inbox::default())).await;

    let domains = client.all_domains().await.unwrap();
    let names: Vec<&str> = domains.iter().map(|d| d.name.as_str()).collect();
    assert_eq!(names, vec!["a.com", "b.com", "c.com"]);

    let first = client.domains(1).await.unwrap();
    assert_eq!(first.items.len(), 2);
    assert_eq!(first.total_items, Some(3));
}

#[tokio::test]
async fn test_page_limit_short_of_total_is_an_error() {
    let base = spawn_server(Arc::new(Inbox::default())).await;
    let client = MailClient::builder().base_url(base).max_pages(1).build().unwrap();

    match client.all_domains().await {
        Err(Error::Truncated { fetched, total, .. }) => {
            assert_eq!(fetched, 2);
            assert_eq!(total, 3);
        }
        other => panic!("expected truncated listing, got {:?}", other.map(|d| d.len())),
    }

    // Enough pages to reach the total succeeds
    let base = spawn_server(Arc::new(Inbox::default())).await;
    let client = MailClient::builder().base_url(base).max_pages(2).build().unwrap();
    assert_eq!(client.all_domains().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_domain_lookup_maps_404_to_none() {
    let client = client_for(Arc::new(Inbox::default())).await;

    assert_eq!(client.domain("d1").await.unwrap().unwrap().name, "a.com");
    assert!(client.domain("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_account_and_token_flow() {
    let inbox = Arc::new(Inbox::default());
    let client = client_for(inbox.clone()).await;

    let account = client.create_account("me@a.com", "pw").await.unwrap();
    assert_eq!(account.id, "acc-1");
    assert_eq!(account.quota, 40_000_000);

    let err = client.create_account("taken@a.com", "pw").await.unwrap_err();
    assert!(matches!(err, Error::EntityNotProcessable(ref m) if m.contains("already used")));

    let err = client.token("me@a.com", "wrong").await.unwrap_err();
    assert!(matches!(err, Error::AccountTokenInvalid(_)));

    // No token yet
    assert!(matches!(
        client.me().await.unwrap_err(),
        Error::AccountTokenInvalid(_)
    ));

    let token = client.token("me@a.com", "pw").await.unwrap();
    client.set_token(Some(token.token));
    assert_eq!(client.me().await.unwrap().address, "me@example.com");

    let headers = inbox.auth_headers.lock().unwrap().clone();
    assert_eq!(headers, vec!["Bearer jwt-1".to_string()]);
}

#[tokio::test]
async fn test_messages_plain_array_and_detail() {
    let inbox = Arc::new(Inbox::default());
    inbox
        .messages
        .lock()
        .unwrap()
        .extend([message_json("m1", "first"), message_json("m2", "second")]);
    let client = client_for(inbox.clone()).await;
    client.set_token(Some("jwt-1".to_string()));

    let messages = client.all_messages().await.unwrap();
    assert_eq!(messages.len(), 2);
    assert!(messages[0].text.is_none());

    let full = client.message("m1").await.unwrap().unwrap();
    assert_eq!(full.text.as_deref(), Some("full body"));
    assert_eq!(full.html.len(), 1);

    assert!(client.message("nope").await.unwrap().is_none());
}

#[tokio::test]
async fn test_delete_and_mark_seen() {
    let inbox = Arc::new(Inbox::default());
    inbox
        .messages
        .lock()
        .unwrap()
        .push(message_json("m1", "first"));
    let client = client_for(inbox.clone()).await;

    client.mark_seen("m1").await.unwrap();
    assert_eq!(inbox.seen.lock().unwrap().as_slice(), ["m1".to_string()]);

    client.delete_message("m1").await.unwrap();
    let err = client.delete_message("m1").await.unwrap_err();
    assert!(err.is_not_found());
}

#[tokio::test]
async fn test_rate_limit_is_transient() {
    let client = client_for(Arc::new(Inbox::default())).await;

    let err = client.source("m1").await.unwrap_err();
    assert!(matches!(err, Error::RateLimited(_)));
    assert!(err.is_transient());
}

#[tokio::test]
async fn test_closed_client_issues_no_requests() {
    let inbox = Arc::new(Inbox::default());
    let client = client_for(inbox.clone()).await;
    client.set_token(Some("jwt-1".to_string()));

    client.close();
    assert!(matches!(client.me().await, Err(Error::Closed)));
    assert!(matches!(client.all_messages().await, Err(Error::Closed)));
    assert!(inbox.auth_headers.lock().unwrap().is_empty());
}
