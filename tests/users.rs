mod common;

use tonic::{Code, Request};

use realworld::pb::conduit_server::Conduit;
use realworld::pb::*;

use common::*;

#[tokio::test]
async fn register_returns_user_with_token() {
    let app = app();
    let user = app
        .create_user(Request::new(CreateUserRequest {
            email: "a@b.c".to_string(),
            username: "alice".to_string(),
            password: "Passw0rd!".to_string(),
        }))
        .await
        .unwrap()
        .into_inner()
        .user
        .unwrap();

    assert_eq!(user.username, "alice");
    assert_eq!(user.email, "a@b.c");
    assert!(!user.token.is_empty());
    assert_eq!(user.bio, "");
}

#[tokio::test]
async fn duplicate_registration_is_cancelled() {
    let app = app();
    register(&app, "alice").await;

    let result = app
        .create_user(Request::new(CreateUserRequest {
            email: "other@example.com".to_string(),
            username: "alice".to_string(),
            password: "Passw0rd!".to_string(),
        }))
        .await;
    assert_status(result, Code::Cancelled, "failed to create user");
}

#[tokio::test]
async fn invalid_registration_lists_every_field() {
    let app = app();
    let status = app
        .create_user(Request::new(CreateUserRequest {
            email: "nope".to_string(),
            username: String::new(),
            password: "short".to_string(),
        }))
        .await
        .unwrap_err();

    assert_eq!(status.code(), Code::InvalidArgument);
    assert!(status.message().starts_with("validation error: "));
    assert!(status.message().contains("email: invalid email: nope"));
    assert!(status.message().contains("password: must be at least 8 characters"));
    assert!(status.message().contains("username: can't be blank"));
}

#[tokio::test]
async fn login_checks_the_password() {
    let app = app();
    register(&app, "alice").await;

    let user = app
        .login_user(Request::new(LoginUserRequest {
            email: "alice@example.com".to_string(),
            password: "Passw0rd!".to_string(),
        }))
        .await
        .unwrap()
        .into_inner()
        .user
        .unwrap();
    assert_eq!(user.username, "alice");
    assert!(!user.token.is_empty());

    let wrong_password = app
        .login_user(Request::new(LoginUserRequest {
            email: "alice@example.com".to_string(),
            password: "wrong password".to_string(),
        }))
        .await;
    assert_status(wrong_password, Code::InvalidArgument, "invalid email or password");

    let unknown = app
        .login_user(Request::new(LoginUserRequest {
            email: "nobody@example.com".to_string(),
            password: "Passw0rd!".to_string(),
        }))
        .await;
    assert_status(unknown, Code::InvalidArgument, "invalid email or password");
}

#[tokio::test]
async fn current_user_needs_a_token() {
    let app = app();
    let token = register(&app, "alice").await;

    let user = app
        .current_user(authed(Empty {}, &token))
        .await
        .unwrap()
        .into_inner()
        .user
        .unwrap();
    assert_eq!(user.username, "alice");
    assert!(!user.token.is_empty());

    let anonymous = app.current_user(Request::new(Empty {})).await;
    assert_status(anonymous, Code::Unauthenticated, "unauthenticated");

    let garbage = app.current_user(authed(Empty {}, "not-a-jwt")).await;
    assert_status(garbage, Code::Unauthenticated, "unauthenticated");
}

#[tokio::test]
async fn token_for_missing_user_is_not_found() {
    let app = app();
    let result = app.current_user(authed(Empty {}, &ghost_token())).await;
    assert_status(result, Code::NotFound, "user not found");
}

#[tokio::test]
async fn empty_update_changes_nothing() {
    let app = app();
    let token = register(&app, "alice").await;

    let user = app
        .update_user(authed(UpdateUserRequest::default(), &token))
        .await
        .unwrap()
        .into_inner()
        .user
        .unwrap();
    assert_eq!(user.username, "alice");
    assert_eq!(user.email, "alice@example.com");
    assert_eq!(user.bio, "");
    assert_eq!(user.image, "");
    assert!(!user.token.is_empty());
}

#[tokio::test]
async fn update_applies_given_fields() {
    let app = app();
    let token = register(&app, "alice").await;

    let user = app
        .update_user(authed(
            UpdateUserRequest {
                bio: Some("I like to skateboard".to_string()),
                image: Some("https://example.com/a.png".to_string()),
                password: Some("An0ther-secret".to_string()),
                ..Default::default()
            },
            &token,
        ))
        .await
        .unwrap()
        .into_inner()
        .user
        .unwrap();
    assert_eq!(user.bio, "I like to skateboard");
    assert_eq!(user.image, "https://example.com/a.png");

    // The new password replaces the old one.
    let relogin = app
        .login_user(Request::new(LoginUserRequest {
            email: "alice@example.com".to_string(),
            password: "An0ther-secret".to_string(),
        }))
        .await;
    assert!(relogin.is_ok());
    let old = app
        .login_user(Request::new(LoginUserRequest {
            email: "alice@example.com".to_string(),
            password: "Passw0rd!".to_string(),
        }))
        .await;
    assert_status(old, Code::InvalidArgument, "invalid email or password");
}

#[tokio::test]
async fn update_to_taken_username_fails() {
    let app = app();
    let token = register(&app, "alice").await;
    register(&app, "bob").await;

    let result = app
        .update_user(authed(
            UpdateUserRequest {
                username: Some("bob".to_string()),
                ..Default::default()
            },
            &token,
        ))
        .await;
    assert_status(result, Code::InvalidArgument, "failed to update user");
}

#[tokio::test]
async fn update_rejects_bad_email() {
    let app = app();
    let token = register(&app, "alice").await;

    let status = app
        .update_user(authed(
            UpdateUserRequest {
                email: Some("not an email".to_string()),
                ..Default::default()
            },
            &token,
        ))
        .await
        .unwrap_err();
    assert_eq!(status.code(), Code::InvalidArgument);
    assert!(status.message().starts_with("validation error: email"));
}
