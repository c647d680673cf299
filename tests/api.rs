use axum::{
    body::Body,
    http::{header, Method, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use std::sync::Arc;
use tower::ServiceExt;

use agencydesk::api::{auth::hash_token, create_router};
use agencydesk::config::Config;
use agencydesk::store::{DocumentStore, MemoryStore};
use agencydesk::AppState;

const ADMIN_TOKEN: &str = "test-admin-token";

fn seed() -> Value {
    json!({
        "users": {
            "u1": {
                "id": "u1",
                "name": "Ama Mensah",
                "email": "ama@agency.test",
                "role": "admin",
                "department": "Engineering",
                "status": "active",
                "tokenHash": hash_token("ama-token"),
            },
            "u2": {
                "id": "u2",
                "name": "Kofi Boateng",
                "email": "kofi@agency.test",
                "role": "junior",
                "department": "Design",
                "status": "active",
                "tokenHash": hash_token("kofi-token"),
            }
        },
        "clientProjects": [
            {
                "id": "cp1",
                "email": "client@acme.test",
                "name": "Acme site",
                "description": "Marketing site rebuild",
                "roadmap": [
                    {
                        "id": "ph1",
                        "title": "Build",
                        "tasks": [
                            { "id": "t1", "title": "Layout" },
                            { "id": "t2", "title": "Content" },
                            { "id": "t3", "title": "Forms" },
                            { "id": "t4", "title": "Launch" }
                        ]
                    }
                ]
            }
        ]
    })
}

fn test_app() -> (Router, Arc<MemoryStore>) {
    let mut config = Config::default();
    config.auth.admin_token = ADMIN_TOKEN.to_string();
    let store = Arc::new(MemoryStore::with_data(seed()));
    let state = Arc::new(AppState::new(config, store.clone()));
    (create_router(state), store)
}

fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::AUTHORIZATION, format!("Bearer {}", token));
    }
    match body {
        Some(body) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

async fn send(app: &Router, req: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(req).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn ticket(title: &str) -> Value {
    json!({
        "title": title,
        "description": "Checkout page throws on submit",
        "category": "bug",
        "priority": "high",
        "assignee": "Ama Mensah",
    })
}

#[tokio::test]
async fn test_health_is_public() {
    let (app, _) = test_app();
    let response = app
        .oneshot(request(Method::GET, "/health", None, None))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_missing_token_is_unauthorized() {
    let (app, _) = test_app();
    let (status, body) = send(&app, request(Method::GET, "/api/tickets", None, None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"]["code"], "unauthorized");

    let (status, _) = send(&app, request(Method::GET, "/api/tickets", Some("nope"), None)).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_non_admin_staff_token_is_forbidden() {
    let (app, _) = test_app();
    let (status, body) =
        send(&app, request(Method::GET, "/api/tickets", Some("kofi-token"), None)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
    assert_eq!(body["error"]["code"], "forbidden");
}

#[tokio::test]
async fn test_me_reports_profile() {
    let (app, _) = test_app();

    let (status, body) = send(&app, request(Method::GET, "/api/auth/me", Some(ADMIN_TOKEN), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["source"], "config");
    assert_eq!(body["role"], "admin");

    let (status, body) = send(&app, request(Method::GET, "/api/auth/me", Some("ama-token"), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["id"], "u1");
    assert_eq!(body["source"], "staff");
}

#[tokio::test]
async fn test_token_query_parameter() {
    let (app, _) = test_app();
    let uri = format!("/api/auth/me?token={}", ADMIN_TOKEN);
    let (status, _) = send(&app, request(Method::GET, &uri, None, None)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_create_ticket_without_category_writes_nothing() {
    let (app, store) = test_app();
    let mut body = ticket("Broken checkout");
    body.as_object_mut().unwrap().remove("category");

    let (status, error) =
        send(&app, request(Method::POST, "/api/tickets", Some(ADMIN_TOKEN), Some(body))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(error["error"]["code"], "validation_error");
    assert!(error["error"]["details"]["category"].is_array());

    let stored = tokio_test::assert_ok!(store.read_path("staffdashboard/tickets").await);
    assert!(stored.is_none());
}

#[tokio::test]
async fn test_create_then_get_ticket() {
    let (app, _) = test_app();

    let (status, created) = send(
        &app,
        request(Method::POST, "/api/tickets", Some(ADMIN_TOKEN), Some(ticket("Broken checkout"))),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);
    let id = created["id"].as_str().unwrap().to_string();
    assert!(!id.is_empty());
    assert_eq!(created["status"], "open");

    let (status, fetched) = send(
        &app,
        request(Method::GET, &format!("/api/tickets/{}", id), Some(ADMIN_TOKEN), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(fetched["title"], "Broken checkout");

    let (status, list) = send(&app, request(Method::GET, "/api/tickets", Some(ADMIN_TOKEN), None)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(list["items"].as_array().map(Vec::len), Some(1));
    assert_eq!(list["stats"]["total"], 1);
}

#[tokio::test]
async fn test_get_unknown_ticket_is_not_found() {
    let (app, _) = test_app();
    let (status, body) = send(
        &app,
        request(Method::GET, "/api/tickets/missing", Some(ADMIN_TOKEN), None),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"]["code"], "not_found");
}

#[tokio::test]
async fn test_sequential_updates_both_apply() {
    let (app, _) = test_app();
    let (_, created) = send(
        &app,
        request(Method::POST, "/api/tickets", Some(ADMIN_TOKEN), Some(ticket("Slow search"))),
    )
    .await;
    let uri = format!("/api/tickets/{}", created["id"].as_str().unwrap());

    let (status, _) = send(
        &app,
        request(Method::PUT, &uri, Some(ADMIN_TOKEN), Some(json!({ "priority": "critical" }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(
        &app,
        request(Method::PUT, &uri, Some(ADMIN_TOKEN), Some(json!({ "estimatedHours": 6 }))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, fetched) = send(&app, request(Method::GET, &uri, Some(ADMIN_TOKEN), None)).await;
    assert_eq!(fetched["priority"], "critical");
    assert_eq!(fetched["estimatedHours"], 6.0);
}

#[tokio::test]
async fn test_fire_staff_is_soft_delete() {
    let (app, store) = test_app();
    let (status, body) = send(
        &app,
        request(Method::DELETE, "/api/staff/u2", Some(ADMIN_TOKEN), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["soft"], true);
    assert_eq!(body["item"]["role"], "fired");
    assert_eq!(body["item"]["status"], "inactive");
    assert!(body["item"].get("tokenHash").is_none());

    let stored = store.read_path("users/u2").await.unwrap().unwrap();
    assert_eq!(stored["role"], "fired");
    assert_eq!(stored["tokenHash"], hash_token("kofi-token"));
}

#[tokio::test]
async fn test_staff_list_redacts_token_hash() {
    let (app, _) = test_app();
    let (status, body) = send(&app, request(Method::GET, "/api/staff", Some(ADMIN_TOKEN), None)).await;
    assert_eq!(status, StatusCode::OK);
    let items = body["items"].as_array().unwrap();
    assert_eq!(items.len(), 2);
    assert!(items.iter().all(|m| m.get("tokenHash").is_none()));
}

#[tokio::test]
async fn test_toggling_tasks_updates_progress() {
    let (app, _) = test_app();
    let base = "/api/client-projects/cp1/phases/ph1/tasks";

    for task in ["t1", "t2"] {
        let (status, _) = send(
            &app,
            request(Method::POST, &format!("{}/{}/toggle", base, task), Some(ADMIN_TOKEN), None),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    let (status, project) = send(
        &app,
        request(Method::GET, "/api/client-projects/cp1", Some(ADMIN_TOKEN), None),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(project["progress"], 50);
    assert_eq!(project["roadmap"][0]["tasks"][0]["completed"], true);
    assert_eq!(project["roadmap"][0]["tasks"][2]["completed"], false);
}

#[tokio::test]
async fn test_unknown_phase_is_not_found() {
    let (app, _) = test_app();
    let (status, _) = send(
        &app,
        request(
            Method::POST,
            "/api/client-projects/cp1/phases/nope/tasks",
            Some(ADMIN_TOKEN),
            Some(json!({ "title": "Extra" })),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_store_offline_is_service_unavailable() {
    let (app, store) = test_app();
    store.set_offline(true);
    let (status, body) = send(
        &app,
        request(Method::GET, "/api/projects", Some(ADMIN_TOKEN), None),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["error"]["code"], "service_unavailable");
}
