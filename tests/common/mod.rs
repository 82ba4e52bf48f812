#![allow(dead_code)]

pub mod flaky;

use std::sync::Arc;
use std::time::Duration;

use tonic::metadata::{Ascii, MetadataValue};
use tonic::{Code, Request, Status};

use realworld::auth::{JwtAuthority, Pbkdf2Scheme, TokenAuthority};
use realworld::db::memory::MemoryStore;
use realworld::db::{ArticleStore, UserStore};
use realworld::pb::conduit_server::Conduit;
use realworld::pb::*;
use realworld::server::ConduitService;
use realworld::state::State;

pub const SECRET: &[u8] = b"integration test secret";

pub fn tokens() -> JwtAuthority {
    JwtAuthority::new(SECRET, Duration::from_secs(3600)).unwrap()
}

pub fn app() -> ConduitService {
    app_over(Arc::new(MemoryStore::new()))
}

pub fn app_over<S>(store: Arc<S>) -> ConduitService
where
    S: UserStore + ArticleStore + 'static,
{
    let state = State::new(
        store,
        Arc::new(tokens()),
        // Low round count keeps debug-mode tests fast.
        Arc::new(Pbkdf2Scheme::new(1_000)),
        8,
    );
    ConduitService::new(state)
}

pub fn authed<T>(message: T, token: &str) -> Request<T> {
    let mut request = Request::new(message);
    let value: MetadataValue<Ascii> = format!("Token {}", token).parse().unwrap();
    request.metadata_mut().insert("authorization", value);
    request
}

/// A token that verifies but names a user that does not exist.
pub fn ghost_token() -> String {
    tokens().issue(9_999).unwrap()
}

pub async fn register(app: &ConduitService, username: &str) -> String {
    let response = app
        .create_user(Request::new(CreateUserRequest {
            email: format!("{}@example.com", username),
            username: username.to_string(),
            password: "Passw0rd!".to_string(),
        }))
        .await
        .unwrap()
        .into_inner();
    response.user.unwrap().token
}

pub async fn publish(app: &ConduitService, token: &str, title: &str, tags: &[&str]) -> Article {
    app.create_article(authed(
        CreateArticleRequest {
            title: title.to_string(),
            description: "D".to_string(),
            body: "B".to_string(),
            tag_list: tags.iter().map(|t| t.to_string()).collect(),
        },
        token,
    ))
    .await
    .unwrap()
    .into_inner()
    .article
    .unwrap()
}

#[track_caller]
pub fn assert_status<T: std::fmt::Debug>(result: Result<T, Status>, code: Code, message: &str) {
    let status = result.unwrap_err();
    assert_eq!(status.code(), code, "unexpected status: {:?}", status);
    assert_eq!(status.message(), message);
}
