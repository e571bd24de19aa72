//! End-to-end tests driving the router with `tower::ServiceExt::oneshot`.

use std::{net::IpAddr, path::PathBuf};

use axum::{
    Router,
    body::Body,
    http::{Method, Request, StatusCode, header},
};
use db::{DBService, test_utils::create_test_db};
use secrecy::SecretString;
use serde_json::{Value, json};
use server::{AppState, routes};
use services::services::{
    config::{AppConfig, SyncConfig},
    sync::worker::SyncService,
};
use tempfile::TempDir;
use tower::ServiceExt;

const ADMIN_TOKEN: &str = "test-admin-token";

fn test_config(admin_token: Option<&str>) -> AppConfig {
    AppConfig {
        host: IpAddr::from([127, 0, 0, 1]),
        port: 0,
        database_path: PathBuf::from("unused.sqlite"),
        public_base_url: "https://awards.example.com".to_string(),
        admin_token: admin_token.map(SecretString::from),
        hubspot: None,
        loops: None,
        sync: SyncConfig::default(),
    }
}

async fn test_app(admin_token: Option<&str>) -> (Router, DBService, TempDir) {
    let (db, dir) = create_test_db().await;
    let sync = SyncService::with_sinks(db.pool.clone(), SyncConfig::default(), Vec::new());
    let state = AppState::new(db.clone(), test_config(admin_token), sync);
    (routes::router(state), db, dir)
}

async fn send(app: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if body.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&body).unwrap_or(Value::String(
            String::from_utf8_lossy(&body).to_string(),
        ))
    };
    (status, json)
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

fn json_request(method: Method, uri: &str, body: &Value) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn admin(mut request: Request<Body>) -> Request<Body> {
    request.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {ADMIN_TOKEN}").parse().unwrap(),
    );
    request
}

fn nomination_body(email: &str, subcategory: &str) -> Value {
    person_nomination("Jane", "Doe", email, subcategory)
}

fn person_nomination(firstname: &str, lastname: &str, email: &str, subcategory: &str) -> Value {
    json!({
        "subcategory_id": subcategory,
        "nominator": {
            "email": "nora@example.com",
            "firstname": "Nora",
            "lastname": "Nominator"
        },
        "nominee": {
            "type": "person",
            "firstname": firstname,
            "lastname": lastname,
            "email": email,
            "job_title": "Head of Talent",
            "linkedin": "https://www.linkedin.com/in/janedoe",
            "why_me": "Placed 400 engineers last year"
        }
    })
}

async fn submit_and_approve(app: &Router) -> String {
    let (status, body) = send(
        app,
        json_request(
            Method::POST,
            "/api/nominations",
            &nomination_body("jane@example.com", "top-recruiter"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    let id = body["data"]["nomination_id"].as_str().unwrap().to_string();

    let (status, body) = send(
        app,
        admin(json_request(
            Method::PATCH,
            &format!("/api/admin/nominations/{id}"),
            &json!({ "decision": "approve" }),
        )),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["state"], "approved");
    id
}

#[tokio::test]
async fn health_reports_database_and_request_id() {
    let (app, _db, _dir) = test_app(None).await;

    let response = app.clone().oneshot(get("/api/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));

    let (_, body) = send(&app, get("/api/health")).await;
    assert_eq!(body["status"], "ok");
    assert_eq!(body["database_ready"], true);
    assert_eq!(body["hubspot_sync"], false);
}

#[tokio::test]
async fn public_settings_and_catalog() {
    let (app, _db, _dir) = test_app(None).await;

    let (status, body) = send(&app, get("/api/settings")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["accepting_nominations"], true);
    assert_eq!(body["data"]["accepting_votes"], false);

    let (status, body) = send(&app, get("/api/categories")).await;
    assert_eq!(status, StatusCode::OK);
    let groups = body["data"].as_array().unwrap();
    assert!(groups.iter().any(|g| g["id"] == "role-specific-excellence"));
}

#[tokio::test]
async fn nomination_errors_use_status_codes() {
    let (app, _db, _dir) = test_app(None).await;
    let body = nomination_body("jane@example.com", "top-recruiter");

    let (status, _) = send(&app, json_request(Method::POST, "/api/nominations", &body)).await;
    assert_eq!(status, StatusCode::CREATED);

    let (status, resp) = send(&app, json_request(Method::POST, "/api/nominations", &body)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(resp["success"], false);

    let mut invalid = nomination_body("not-an-email", "top-recruiter");
    invalid["nominee"]["linkedin"] = json!("https://example.com/jane");
    let (status, resp) = send(&app, json_request(Method::POST, "/api/nominations", &invalid)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["error_data"]["nominee.email"], "Enter a valid email address");
    assert_eq!(resp["error_data"]["nominee.linkedin"], "Enter a LinkedIn URL");

    let wrong_type = nomination_body("john@example.com", "best-recruitment-agency");
    let (status, _) = send(&app, json_request(Method::POST, "/api/nominations", &wrong_type)).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn malformed_requests_use_response_envelope() {
    let (app, _db, _dir) = test_app(Some(ADMIN_TOKEN)).await;

    let broken = Request::builder()
        .method(Method::POST)
        .uri("/api/votes")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from("{\"nomination_id\": "))
        .unwrap();
    let (status, resp) = send(&app, broken).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["success"], false);
    assert!(resp["message"].is_string(), "{resp}");

    let (status, resp) = send(
        &app,
        json_request(Method::POST, "/api/nominations", &json!({ "subcategory_id": 7 })),
    )
    .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(resp["success"], false);

    let untyped = Request::builder()
        .method(Method::POST)
        .uri("/api/nominations")
        .body(Body::from(nomination_body("jane@example.com", "top-recruiter").to_string()))
        .unwrap();
    let (status, resp) = send(&app, untyped).await;
    assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    assert_eq!(resp["success"], false);

    let (status, resp) = send(&app, get("/api/nominees?type=robot")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["success"], false);

    let (status, resp) = send(&app, admin(get("/api/admin/nominations?limit=many"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(resp["success"], false);
}

#[tokio::test]
async fn approved_nominees_are_public() {
    let (app, _db, _dir) = test_app(Some(ADMIN_TOKEN)).await;

    // Submitted nominations stay hidden.
    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            "/api/nominations",
            &person_nomination("John", "Smith", "john@example.com", "best-sourcer"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    submit_and_approve(&app).await;

    let (status, body) = send(&app, get("/api/nominees?subcategory=top-recruiter")).await;
    assert_eq!(status, StatusCode::OK);
    let list = body["data"].as_array().unwrap();
    assert_eq!(list.len(), 1);
    assert_eq!(list[0]["display_name"], "Jane Doe");
    assert!(list[0].get("email").is_none());

    let (_, body) = send(&app, get("/api/nominees")).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);

    let (status, body) = send(&app, get("/api/nominees/jane-doe")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["nominations"][0]["subcategory_id"], "top-recruiter");

    let (status, _) = send(&app, get("/api/nominees/nobody")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, get("/api/nominees/john-smith")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, body) = send(&app, get("/api/podium?subcategory=top-recruiter")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"][0]["entries"][0]["live_url"], "jane-doe");

    let (status, _) = send(&app, get("/api/podium?subcategory=nope")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn voting_flow_over_http() {
    let (app, _db, _dir) = test_app(Some(ADMIN_TOKEN)).await;
    let nomination_id = submit_and_approve(&app).await;
    let vote = json!({
        "nomination_id": nomination_id,
        "subcategory_id": "top-recruiter",
        "voter": { "email": "vic@example.com", "firstname": "Vic", "lastname": "Voter" }
    });

    let (status, _) = send(&app, json_request(Method::POST, "/api/votes", &vote)).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, body) = send(
        &app,
        admin(json_request(
            Method::PUT,
            "/api/admin/settings/voting_open",
            &json!({ "value": "true" }),
        )),
    )
    .await;
    assert_eq!(status, StatusCode::OK, "{body}");

    let (status, body) = send(&app, json_request(Method::POST, "/api/votes", &vote)).await;
    assert_eq!(status, StatusCode::CREATED, "{body}");
    assert_eq!(body["data"]["total_votes"], 1);

    let (status, body) = send(&app, json_request(Method::POST, "/api/votes", &vote)).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["message"], "You have already voted in this category");

    let (_, body) = send(&app, get("/api/stats")).await;
    assert_eq!(body["data"]["total_votes"], 1);
    assert_eq!(body["data"]["unique_voters"], 1);
}

#[tokio::test]
async fn admin_requires_token() {
    let (app, _db, _dir) = test_app(Some(ADMIN_TOKEN)).await;

    let (status, _) = send(&app, get("/api/admin/nominations")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let mut wrong = get("/api/admin/nominations");
    wrong
        .headers_mut()
        .insert(header::AUTHORIZATION, "Bearer nope".parse().unwrap());
    let (status, _) = send(&app, wrong).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = send(&app, admin(get("/api/admin/nominations"))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"].as_array().unwrap().is_empty());
}

#[tokio::test]
async fn admin_disabled_without_token() {
    let (app, _db, _dir) = test_app(None).await;
    let (status, body) = send(&app, admin(get("/api/admin/stats"))).await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["message"], "Admin API is disabled");
}

#[tokio::test]
async fn admin_review_records_actor_and_filters() {
    let (app, _db, _dir) = test_app(Some(ADMIN_TOKEN)).await;
    let (_, body) = send(
        &app,
        json_request(
            Method::POST,
            "/api/nominations",
            &nomination_body("jane@example.com", "top-recruiter"),
        ),
    )
    .await;
    let id = body["data"]["nomination_id"].as_str().unwrap().to_string();

    let mut request = admin(json_request(
        Method::PATCH,
        &format!("/api/admin/nominations/{id}"),
        &json!({ "decision": "approve", "additional_votes": 10, "admin_notes": "verified" }),
    ));
    request
        .headers_mut()
        .insert("x-admin-user", "dana@wsa.org".parse().unwrap());
    let (status, body) = send(&app, request).await;
    assert_eq!(status, StatusCode::OK, "{body}");
    assert_eq!(body["data"]["approved_by"], "dana@wsa.org");
    assert_eq!(body["data"]["additional_votes"], 10);

    let (_, body) = send(&app, admin(get("/api/admin/nominations?state=approved"))).await;
    assert_eq!(body["data"].as_array().unwrap().len(), 1);
    assert_eq!(body["data"][0]["total_votes"], 10);
    let (_, body) = send(&app, admin(get("/api/admin/nominations?state=rejected"))).await;
    assert!(body["data"].as_array().unwrap().is_empty());

    let (status, body) = send(&app, admin(get(&format!("/api/admin/nominations/{id}")))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["nominator"]["email"], "nora@example.com");

    let (status, _) = send(
        &app,
        admin(json_request(
            Method::PATCH,
            &format!("/api/admin/nominations/{id}"),
            &json!({ "additional_votes": -3 }),
        )),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let delete = Request::builder()
        .method(Method::DELETE)
        .uri(format!("/api/admin/nominations/{id}"))
        .body(Body::empty())
        .unwrap();
    let (status, _) = send(&app, admin(delete)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = send(&app, admin(get(&format!("/api/admin/nominations/{id}")))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn admin_settings_validate_keys_and_values() {
    let (app, _db, _dir) = test_app(Some(ADMIN_TOKEN)).await;

    let (status, _) = send(
        &app,
        admin(json_request(
            Method::PUT,
            "/api/admin/settings/theme",
            &json!({ "value": "dark" }),
        )),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = send(
        &app,
        admin(json_request(
            Method::PUT,
            "/api/admin/settings/nominations_open",
            &json!({ "value": "maybe" }),
        )),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, body) = send(
        &app,
        admin(json_request(
            Method::PUT,
            "/api/admin/settings/nominations_open",
            &json!({ "value": "No" }),
        )),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["value"], "false");

    let (status, _) = send(
        &app,
        json_request(
            Method::POST,
            "/api/nominations",
            &nomination_body("jane@example.com", "top-recruiter"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (_, body) = send(&app, admin(get("/api/admin/settings"))).await;
    assert!(
        body["data"]
            .as_array()
            .unwrap()
            .iter()
            .any(|row| row["key"] == "nominations_open" && row["value"] == "false")
    );
}

#[tokio::test]
async fn admin_outbox_endpoints() {
    let (app, _db, _dir) = test_app(Some(ADMIN_TOKEN)).await;
    submit_and_approve(&app).await;

    let (status, body) = send(&app, admin(get("/api/admin/outbox/hubspot?status=pending"))).await;
    assert_eq!(status, StatusCode::OK);
    let events: Vec<_> = body["data"]
        .as_array()
        .unwrap()
        .iter()
        .map(|row| row["event_type"].as_str().unwrap().to_string())
        .collect();
    assert!(events.contains(&"nomination_submitted".to_string()));
    assert!(events.contains(&"nominee_approved".to_string()));

    let (status, body) = send(
        &app,
        admin(json_request(Method::POST, "/api/admin/outbox/loops/sync", &json!({}))),
    )
    .await;
    assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(body["message"], "loops sync is not configured");

    let (status, body) = send(
        &app,
        admin(json_request(Method::POST, "/api/admin/outbox/loops/requeue", &json!({}))),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["requeued"], 0);

    let (status, body) = send(&app, admin(get("/api/admin/stats"))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["nominations"]["approved"], 1);
    let outbox = body["data"]["outbox"].as_array().unwrap();
    assert!(outbox.iter().any(|t| t["target"] == "hubspot" && t["pending"] == 2));
}
