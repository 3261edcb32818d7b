//! Integration tests for gateway token signing.

mod helpers;

use chrono::Utc;

use herald_auth::TokenError;
use herald_core::config::AppConfig;
use herald_core::error::{AppError, ErrorKind};
use herald_core::types::ChannelAddress;

#[tokio::test]
async fn test_subscription_token_names_relay_channel() {
    let app = helpers::TestHerald::new().await;
    let channel = ChannelAddress::user("u1");

    let token = app
        .engine
        .tokens
        .issue_subscription_token("u1", &channel)
        .unwrap();
    let claims = app.engine.tokens.verify_subscription(&token, &channel).unwrap();
    assert_eq!(claims.sub, "u1");

    // The relay publishes into the very channel the token grants.
    app.publish_event("message.new", &helpers::message_event("c1", &["u1"]))
        .await;
    app.drain().await;
    assert_eq!(app.transport.calls_to(claims.channel.as_deref().unwrap()).len(), 1);
}

#[tokio::test]
async fn test_connection_token_expiry() {
    let app = helpers::TestHerald::new().await;
    let tokens = &app.engine.tokens;

    let token = tokens.issue_connection_token("u1").unwrap();
    let claims = tokens.verify(&token).unwrap();
    let exp = claims.exp.unwrap();
    assert!(exp > Utc::now().timestamp());
    assert!(exp <= Utc::now().timestamp() + 3600);

    let expired = tokens
        .connection_token("u1", Some(Utc::now().timestamp() - 10))
        .unwrap();
    let err: AppError = tokens.verify(&expired).unwrap_err().into();
    assert_eq!(err.kind, ErrorKind::Authentication);
}

#[tokio::test]
async fn test_leeway_tolerates_small_skew() {
    let mut config = AppConfig::default();
    config.auth.leeway_seconds = 60;
    let app = helpers::TestHerald::with_config(config).await;

    let token = app
        .engine
        .tokens
        .connection_token("u1", Some(Utc::now().timestamp() - 10))
        .unwrap();
    assert!(app.engine.tokens.verify(&token).is_ok());
}

#[tokio::test]
async fn test_tokens_from_other_secret_rejected() {
    let app = helpers::TestHerald::new().await;

    let mut other = AppConfig::default();
    other.auth.token_secret = "another-secret".to_string();
    let foreign = herald_auth::TokenSigner::new(&other.auth)
        .connection_token("u1", None)
        .unwrap();

    assert!(matches!(
        app.engine.tokens.verify(&foreign),
        Err(TokenError::InvalidSignature)
    ));
    assert!(matches!(
        app.engine.tokens.verify("not.a.token"),
        Err(TokenError::Malformed(_))
    ));
}
