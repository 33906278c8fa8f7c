use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use serde_json::{Value, json};
use tower::ServiceExt;

use duo_api::{AppStateInner, router};
use duo_db::Database;

const ANON_KEY: &str = "anon-test-key";
const JWT_SECRET: &str = "jwt-test-secret";

fn app() -> Router {
    let db = Database::open_in_memory().unwrap();
    router(AppStateInner::new(db, ANON_KEY.into(), JWT_SECRET.into()))
}

async fn call(app: &Router, method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("apikey", ANON_KEY)
        .header("content-type", "application/json");
    if let Some(token) = token {
        builder = builder.header("authorization", format!("Bearer {}", token));
    }
    let body = match body {
        Some(json) => Body::from(json.to_string()),
        None => Body::empty(),
    };

    let response = app.clone().oneshot(builder.body(body).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}

async fn create_couple(app: &Router) -> (String, String, String) {
    let (status, code) = call(app, Method::POST, "/rpc/generate_couple_code", None, None).await;
    assert_eq!(status, StatusCode::OK);
    let code = code["code"].as_str().unwrap().to_string();

    let (status, session) = call(
        app,
        Method::POST,
        "/couples",
        None,
        Some(json!({ "couple_code": code, "partner_name": "Ana", "anniversary_date": "2024-11-13" })),
    )
    .await;
    assert_eq!(status, StatusCode::CREATED);

    let id = session["couple"]["id"].as_str().unwrap().to_string();
    let token = session["token"].as_str().unwrap().to_string();
    (id, code, token)
}

#[tokio::test]
async fn health_needs_no_key() {
    let response = app()
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn missing_api_key_is_unauthorized() {
    let response = app()
        .oneshot(
            Request::post("/rpc/generate_couple_code")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn lookup_and_verify_couple() {
    let app = app();
    let (id, code, _) = create_couple(&app).await;

    let lower = code.to_lowercase();
    let (status, session) = call(&app, Method::GET, &format!("/couples/lookup?code={}", lower), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(session["couple"]["id"], id.as_str());

    let (status, _) = call(&app, Method::GET, "/couples/lookup?code=AB", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = call(&app, Method::GET, &format!("/couples/{}?code={}", id, code), None, None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = call(&app, Method::GET, &format!("/couples/{}?code=ZZZZZZ", id), None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "couple not found");
}

#[tokio::test]
async fn rows_require_a_session_for_the_same_couple() {
    let app = app();
    let (ours, _, our_token) = create_couple(&app).await;
    let (theirs, _, _) = create_couple(&app).await;

    let (status, _) = call(&app, Method::GET, &format!("/couples/{}/tasks", ours), None, None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = call(&app, Method::GET, &format!("/couples/{}/tasks", theirs), Some(&our_token), None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);

    let (status, rows) = call(&app, Method::GET, &format!("/couples/{}/tasks", ours), Some(&our_token), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(rows, json!([]));
}

#[tokio::test]
async fn task_crud_over_http() {
    let app = app();
    let (id, _, token) = create_couple(&app).await;
    let base = format!("/couples/{}/tasks", id);

    let (status, task) = call(&app, Method::POST, &base, Some(&token), Some(json!({ "title": "Buy flowers" }))).await;
    assert_eq!(status, StatusCode::CREATED);
    assert_eq!(task["completed"], false);
    let task_id = task["id"].as_str().unwrap();

    let (status, task) = call(
        &app,
        Method::PATCH,
        &format!("{}/{}", base, task_id),
        Some(&token),
        Some(json!({ "completed": true })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(task["completed"], true);

    let (status, _) = call(&app, Method::DELETE, &format!("{}/{}", base, task_id), Some(&token), None).await;
    assert_eq!(status, StatusCode::NO_CONTENT);

    let (status, _) = call(&app, Method::DELETE, &format!("{}/{}", base, task_id), Some(&token), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn invalid_rows_are_bad_requests() {
    let app = app();
    let (id, _, token) = create_couple(&app).await;

    let (status, body) = call(
        &app,
        Method::POST,
        &format!("/couples/{}/messages", id),
        Some(&token),
        Some(json!({ "content": "x".repeat(501), "sender_name": "Ana" })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "message must be at most 500 characters");
}

#[tokio::test]
async fn extractor_failures_use_the_error_body() {
    let app = app();
    let (id, _, token) = create_couple(&app).await;

    let (status, body) = call(&app, Method::GET, &format!("/couples/{}/bogus", id), Some(&token), None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = call(&app, Method::GET, &format!("/couples/{}", id), None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = call(&app, Method::GET, "/couples/not-a-uuid?code=ABCDEF", None, None).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());

    let (status, body) = call(&app, Method::POST, "/couples", None, Some(json!("not a couple"))).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn partner_slot_fills_once() {
    let app = app();
    let (id, _, token) = create_couple(&app).await;
    let uri = format!("/couples/{}/partner", id);

    let (status, couple) = call(&app, Method::POST, &uri, Some(&token), Some(json!({ "partner_name": "Bea" }))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(couple["partner2_name"], "Bea");

    let (_, couple) = call(&app, Method::POST, &uri, Some(&token), Some(json!({ "partner_name": "Cleo" }))).await;
    assert_eq!(couple["partner2_name"], "Bea");
}
