//! End-to-end tests for `POST /predict`, driven in-process through the router.

mod common;

use axum::body::Body;
use axum::http::{Request, StatusCode, header};
use common::{FakeRegistry, SEX_MODEL, server};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use titanic_serve::ServiceError;
use titanic_serve::http_server::PredictServerConfig;
use tower::ServiceExt;

async fn post(router: axum::Router, body: impl Into<Body>) -> (StatusCode, Value) {
  let request = Request::builder()
    .method("POST")
    .uri("/predict")
    .header(header::CONTENT_TYPE, "application/json")
    .body(body.into())
    .unwrap();
  let response = router.oneshot(request).await.unwrap();
  let status = response.status();
  let bytes = response.into_body().collect().await.unwrap().to_bytes();
  let value = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
  (status, value)
}

fn passengers() -> Value {
  json!([
    {"Pclass": 3, "Sex": "male", "SibSp": 1, "Parch": 0, "Fare": 7.25},
    {"Pclass": 1, "Sex": "female", "SibSp": 1, "Parch": 0, "Fare": 71.2833}
  ])
}

#[tokio::test]
async fn test_predict_valid_data() {
  let registry = FakeRegistry::serving(SEX_MODEL);
  let router = server(registry.clone(), PredictServerConfig::default(), false).router();

  let (status, body) = post(router, passengers().to_string()).await;

  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!({"predictions": [0, 1]}));
  assert_eq!(registry.fetches(), 1);
}

#[tokio::test]
async fn test_predict_invalid_fare_type() {
  let registry = FakeRegistry::serving(SEX_MODEL);
  let router = server(registry.clone(), PredictServerConfig::default(), false).router();
  let data = json!([{"Pclass": 3, "Sex": "male", "SibSp": 1, "Parch": 0, "Fare": "invalid_fare"}]);

  let (status, body) = post(router, data.to_string()).await;

  assert_eq!(status, StatusCode::OK);
  assert_eq!(
    body,
    json!({"error": "wrong type for field Fare: expected numeric, got object"})
  );
  assert_eq!(registry.fetches(), 0);
}

#[tokio::test]
async fn test_predict_missing_column() {
  let registry = FakeRegistry::serving(SEX_MODEL);
  let router = server(registry.clone(), PredictServerConfig::default(), false).router();

  let (status, body) = post(router, r#"[{"Pclass":3,"Sex":"male","SibSp":1,"Parch":0}]"#).await;

  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!({"error": "missing field: Fare"}));
  assert_eq!(registry.fetches(), 0);
}

#[tokio::test]
async fn test_invalid_json_is_bad_request() {
  let router = server(FakeRegistry::serving(SEX_MODEL), PredictServerConfig::default(), false).router();

  let (status, body) = post(router, "[{\"Pclass\": 3,").await;

  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["error"], "invalid JSON");
}

#[tokio::test]
async fn test_row_indices_follow_dropped_rows() {
  let router = server(FakeRegistry::serving(SEX_MODEL), PredictServerConfig::default(), true).router();
  let data = json!([
    {"Pclass": 3, "Sex": "unknown", "SibSp": 1, "Parch": 0, "Fare": 7.25},
    {"Pclass": 1, "Sex": "female", "SibSp": 1, "Parch": 0, "Fare": 71.2833},
    {"Pclass": 2, "Sex": "male", "SibSp": 0, "Parch": 0}
  ]);

  let (status, body) = post(router, data.to_string()).await;

  assert_eq!(status, StatusCode::OK);
  assert_eq!(body, json!({"predictions": [1], "row_indices": [1]}));
}

#[tokio::test]
async fn test_registry_outage_is_service_unavailable() {
  let registry = FakeRegistry::failing(ServiceError::RegistryUnavailable("connection refused".to_string()));
  let router = server(registry, PredictServerConfig::default(), false).router();

  let (status, body) = post(router, passengers().to_string()).await;

  assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
  assert_eq!(body["kind"], "registry_unavailable");
}

#[tokio::test]
async fn test_missing_model_is_distinct_from_outage() {
  let registry = FakeRegistry::failing(ServiceError::ModelNotFound("models:/titanic/staging".to_string()));
  let router = server(registry, PredictServerConfig::default(), false).router();

  let (status, body) = post(router, passengers().to_string()).await;

  assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
  assert_eq!(body["kind"], "model_not_found");
}

#[tokio::test]
async fn test_oversized_body_rejected() {
  let config = PredictServerConfig { max_body_bytes: 64 };
  let router = server(FakeRegistry::serving(SEX_MODEL), config, false).router();

  let (status, _) = post(router, passengers().to_string()).await;

  assert_eq!(status, StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_model_cached_across_requests() {
  let registry = FakeRegistry::serving(SEX_MODEL);
  let server = server(registry.clone(), PredictServerConfig::default(), false);

  for _ in 0..3 {
    let (status, _) = post(server.router(), passengers().to_string()).await;
    assert_eq!(status, StatusCode::OK);
  }

  assert_eq!(registry.fetches(), 1);
}

#[tokio::test]
async fn test_cors_preflight_allowed() {
  let router = server(FakeRegistry::serving(SEX_MODEL), PredictServerConfig::default(), false).router();
  let request = Request::builder()
    .method("OPTIONS")
    .uri("/predict")
    .header(header::ORIGIN, "https://example.com")
    .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
    .body(Body::empty())
    .unwrap();

  let response = router.oneshot(request).await.unwrap();

  assert_eq!(response.status(), StatusCode::OK);
  assert!(response.headers().contains_key(header::ACCESS_CONTROL_ALLOW_ORIGIN));
}

#[tokio::test]
async fn test_model_loads_on_first_request() {
  let server = server(FakeRegistry::serving(SEX_MODEL), PredictServerConfig::default(), false);
  let provider = server.service().provider();
  assert!(!provider.is_loaded());
  assert_eq!(provider.uri().to_string(), "models:/titanic/staging");

  let (status, _) = post(server.router(), passengers().to_string()).await;

  assert_eq!(status, StatusCode::OK);
  assert!(server.service().provider().is_loaded());
}
