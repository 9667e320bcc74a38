use super::*;
use axum::http::Request;
use jsonwebtoken::{EncodingKey, Header, encode};
use std::env;

const SECRET: &str = "checkout-signing-secret-for-unit-tests";
const USER_ID: &str = "123e4567-e89b-12d3-a456-426614174000";

fn set_env_vars() {
    unsafe {
        env::set_var("AUTH_JWT_SECRET", SECRET);
    }
}

fn token(sub: &str, exp: usize, secret: &str) -> String {
    let claims = AccessClaims {
        sub: sub.to_string(),
        role: Some("listener".to_string()),
        exp,
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .unwrap()
}

/// `Authorization` header value for `user_id`, valid for the extractor.
pub(crate) fn bearer(user_id: Uuid) -> String {
    set_env_vars();
    format!("Bearer {}", token(&user_id.to_string(), 9999999999, SECRET))
}

async fn extract(authorization: Option<String>) -> Result<AuthUser, (StatusCode, String)> {
    let mut builder = Request::builder().uri("/api/v1/checkout");
    if let Some(value) = authorization {
        builder = builder.header(axum::http::header::AUTHORIZATION, value);
    }
    let (mut parts, _) = builder.body(()).unwrap().into_parts();

    AuthUser::from_request_parts(&mut parts, &()).await
}

#[test]
fn test_validate_access_token_success() {
    let claims = validate_access_token(&token(USER_ID, 9999999999, SECRET), SECRET)
        .expect("Valid token should pass");
    assert_eq!(claims.sub, USER_ID);
    assert_eq!(claims.role.as_deref(), Some("listener"));
}

#[test]
fn test_validate_access_token_expired() {
    let result = validate_access_token(&token(USER_ID, 1, SECRET), SECRET);
    assert!(result.is_err());
}

#[test]
fn test_validate_access_token_invalid_signature() {
    let result = validate_access_token(&token(USER_ID, 9999999999, "wrongsecret"), SECRET);
    assert!(result.is_err());
}

#[tokio::test]
async fn test_extractor_resolves_user_id() {
    set_env_vars();

    let user = extract(Some(format!("Bearer {}", token(USER_ID, 9999999999, SECRET))))
        .await
        .unwrap();
    assert_eq!(user.user_id, Uuid::parse_str(USER_ID).unwrap());
}

#[tokio::test]
async fn test_extractor_rejects_missing_or_malformed_header() {
    set_env_vars();

    let (status, _) = extract(None).await.unwrap_err();
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, _) = extract(Some("Token abc".to_string())).await.unwrap_err();
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let (status, message) = extract(Some(format!(
        "Bearer {}",
        token("not-a-uuid", 9999999999, SECRET)
    )))
    .await
    .unwrap_err();
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(message, "Invalid user ID in token");
}
