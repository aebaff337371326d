//! Router tests. None of these routes reach the database; the pool is lazy
//! and never connects.

use std::sync::Arc;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use effects::memory::InMemoryEffects;
use effects::Effects;
use engine::{ActionExecutor, Catalog, ExecutorConfig};

use crate::{router, AppState};

fn app() -> Router {
    let pool = db::pool::create_lazy_pool("postgres://localhost/automation_test", 1)
        .expect("lazy pool");
    router(AppState {
        pool,
        catalog: Arc::new(Catalog::builtin()),
        executor: Arc::new(ActionExecutor::new(
            Effects::from_shared(Arc::new(InMemoryEffects::new())),
            ExecutorConfig::default(),
        )),
    })
}

async fn send(request: Request<Body>) -> (StatusCode, Value) {
    let response = app().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    let body = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, body)
}

fn get(uri: &str) -> Request<Body> {
    Request::get(uri).body(Body::empty()).unwrap()
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

#[tokio::test]
async fn health_is_ok() {
    let (status, body) = send(get("/health")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[tokio::test]
async fn lists_the_whole_catalog() {
    let (status, body) = send(get("/api/v1/recipes")).await;
    assert_eq!(status, StatusCode::OK);
    let recipes = body.as_array().expect("array");
    assert_eq!(recipes.len(), Catalog::builtin().len());
    assert_eq!(recipes[0]["name"], "Donation Receipt (Immediate)");
}

#[tokio::test]
async fn filters_by_category() {
    let (status, body) = send(get("/api/v1/recipes?category=grants")).await;
    assert_eq!(status, StatusCode::OK);

    let names: Vec<&str> = body
        .as_array()
        .expect("array")
        .iter()
        .map(|r| r["name"].as_str().unwrap())
        .collect();
    assert_eq!(
        names,
        vec![
            "Grant Application Triage",
            "Grant Report Due Reminder",
            "Grant Disbursement Payable"
        ]
    );
}

#[tokio::test]
async fn unknown_category_is_a_bad_request() {
    let (status, body) = send(get("/api/v1/recipes?category=payroll")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "unknown category: payroll");
}

#[tokio::test]
async fn trigger_events_are_sorted_and_unique() {
    let (status, body) = send(get("/api/v1/recipes/trigger-events")).await;
    assert_eq!(status, StatusCode::OK);

    let events: Vec<String> = serde_json::from_value(body).unwrap();
    let mut expected = events.clone();
    expected.sort();
    expected.dedup();
    assert_eq!(events, expected);
    assert!(events.contains(&"donation.created".to_owned()));
}

#[tokio::test]
async fn malformed_event_type_is_rejected_before_dispatch() {
    let (status, body) = send(post_json(
        "/api/v1/events",
        json!({
            "org_id": "7f2c1a52-3a55-4a63-9e8b-5b8f0c1d2e3f",
            "type": "DonationCreated",
            "payload": {}
        }),
    ))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("DonationCreated"));
}

#[tokio::test]
async fn non_object_payload_is_rejected() {
    let (status, _) = send(post_json(
        "/api/v1/events",
        json!({
            "org_id": "7f2c1a52-3a55-4a63-9e8b-5b8f0c1d2e3f",
            "type": "donation.created",
            "payload": [1, 2, 3]
        }),
    ))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn event_without_org_is_unprocessable() {
    let (status, _) = send(post_json(
        "/api/v1/events",
        json!({ "type": "donation.created", "payload": {} }),
    ))
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
}

#[tokio::test]
async fn event_runs_require_an_org() {
    let (status, _) = send(get("/api/v1/events/7f2c1a52-3a55-4a63-9e8b-5b8f0c1d2e3f/runs")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn event_runs_reject_a_malformed_event_id() {
    let (status, _) = send(get(
        "/api/v1/events/not-a-uuid/runs?org_id=7f2c1a52-3a55-4a63-9e8b-5b8f0c1d2e3f",
    ))
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}
