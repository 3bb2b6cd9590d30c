use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
};
use serde_json::Value;
use tower::ServiceExt;

use auth_cell::router::auth_routes;
use shared_utils::test_utils::{JwtTestUtils, TestConfig, TestUser};

async fn call(method: &str, uri: &str, token: Option<&str>) -> (StatusCode, Value) {
    let app = auth_routes(TestConfig::default().to_arc());

    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header("Authorization", format!("Bearer {}", token));
    }

    let response = app.oneshot(builder.body(Body::empty()).unwrap()).await.unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn token_for(user: &TestUser) -> String {
    JwtTestUtils::create_test_token(user, &TestConfig::default().jwt_secret, Some(1))
}

#[tokio::test]
async fn test_role_endpoint_for_each_group() {
    for (group, expected) in [
        ("admin", "admin"),
        ("receptionist", "receptionist"),
        ("doctor", "doctor"),
        ("pharmacist", "pharmacist"),
        ("labtechnician", "labtechnician"),
        ("visitor", "unknown"),
    ] {
        let token = token_for(&TestUser::new("staff@clinic.test", group));
        let (status, body) = call("GET", "/role", Some(&token)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["role"], expected, "group {}", group);
    }
}

#[tokio::test]
async fn test_role_endpoint_requires_token() {
    let (status, body) = call("GET", "/role", None).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["error"], "Missing authorization header");
}

#[tokio::test]
async fn test_validate_and_verify_routes() {
    let token = token_for(&TestUser::doctor("dr@clinic.test"));

    let (status, body) = call("POST", "/validate", Some(&token)).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], true);
    assert_eq!(body["role"], "doctor");

    let (status, _) = call("POST", "/validate", Some("not.a.token")).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, body) = call("POST", "/verify", Some("not.a.token")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["valid"], false);
}
