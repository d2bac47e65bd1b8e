use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use crate::common::{TEST_API_KEY, setup_test_app};

fn source_body(id: &str) -> serde_json::Value {
    serde_json::json!({
        "id": id,
        "name": format!("{id} listings"),
        "kind": "api",
        "endpoint": format!("https://{id}.example/api/listings"),
        "api_key": "k",
        "enabled": true,
        "priority": 5,
        "policy": {
            "refresh_interval_minutes": 120,
            "requires_js": false,
            "difficulty": "easy"
        }
    })
}

fn authed(request: axum::http::request::Builder) -> axum::http::request::Builder {
    request.header("authorization", format!("Bearer {TEST_API_KEY}"))
}

async fn json_body(response: axum::response::Response) -> serde_json::Value {
    let body = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&body).unwrap()
}

#[tokio::test]
async fn health_returns_200() {
    let app = setup_test_app().await;

    let response = app
        .router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = json_body(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["database"], "ok");
}

#[tokio::test]
async fn unauthenticated_request_returns_401() {
    let app = setup_test_app().await;

    let response = app
        .router
        .oneshot(Request::get("/v1/jobs").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn wrong_api_key_returns_401() {
    let app = setup_test_app().await;

    let response = app
        .router
        .oneshot(
            Request::get("/v1/jobs")
                .header("authorization", "Bearer wrong-key")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn upsert_then_list_sources() {
    let app = setup_test_app().await;

    let response = app
        .router
        .clone()
        .oneshot(
            authed(Request::post("/v1/sources"))
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::to_vec(&source_body("src-api")).unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::CREATED);
    let created = json_body(response).await;
    assert_eq!(created["kind"], "api");

    let response = app
        .router
        .oneshot(
            authed(Request::get("/v1/sources"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["total"], 1);
    assert_eq!(json["sources"][0]["id"], "src-api");
    // Connection parameters never leave the server.
    assert!(json["sources"][0].get("endpoint").is_none());
}

#[tokio::test]
async fn invalid_source_definition_returns_400() {
    let app = setup_test_app().await;

    let body = serde_json::json!({"id": "broken", "kind": "api"});
    let response = app
        .router
        .oneshot(
            authed(Request::post("/v1/sources"))
                .header("content-type", "application/json")
                .body(Body::from(serde_json::to_vec(&body).unwrap()))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn async_crawl_schedules_idempotently() {
    let app = setup_test_app().await;

    app.router
        .clone()
        .oneshot(
            authed(Request::post("/v1/sources"))
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::to_vec(&source_body("src-api")).unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    let schedule = || async {
        let response = app
            .router
            .clone()
            .oneshot(
                authed(Request::post("/v1/sources/src-api/crawl"))
                    .header("content-type", "application/json")
                    .body(Body::from(r#"{"async": true}"#))
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        json_body(response).await
    };

    let first = schedule().await;
    assert_eq!(first["status"], "scheduled");
    let second = schedule().await;
    assert_eq!(first["job_id"], second["job_id"]);

    // One queued job, visible in the status surface.
    let response = app
        .router
        .clone()
        .oneshot(
            authed(Request::get("/v1/jobs?state=queued"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let json = json_body(response).await;
    assert_eq!(json["total"], 1);
    assert_eq!(json["jobs"][0]["source_id"], "src-api");
}

#[tokio::test]
async fn crawl_for_unknown_source_returns_404() {
    let app = setup_test_app().await;

    let response = app
        .router
        .oneshot(
            authed(Request::post("/v1/sources/src-nope/crawl"))
                .header("content-type", "application/json")
                .body(Body::from(r#"{"async": true}"#))
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn get_unknown_job_returns_404() {
    let app = setup_test_app().await;

    let response = app
        .router
        .oneshot(
            authed(Request::get(format!(
                "/v1/jobs/{}",
                uuid::Uuid::new_v4()
            )))
            .body(Body::empty())
            .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn sources_report_healthy_without_history() {
    let app = setup_test_app().await;

    app.router
        .clone()
        .oneshot(
            authed(Request::post("/v1/sources"))
                .header("content-type", "application/json")
                .body(Body::from(
                    serde_json::to_vec(&source_body("src-api")).unwrap(),
                ))
                .unwrap(),
        )
        .await
        .unwrap();

    let response = app
        .router
        .oneshot(
            authed(Request::get("/v1/sources/health"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json[0]["source_id"], "src-api");
    assert_eq!(json[0]["status"], "healthy");
    assert_eq!(json[0]["failure_rate"], 0.0);
}

#[tokio::test]
async fn listings_start_empty() {
    let app = setup_test_app().await;

    let response = app
        .router
        .oneshot(
            authed(Request::get("/v1/listings"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = json_body(response).await;
    assert_eq!(json["total"], 0);
}
