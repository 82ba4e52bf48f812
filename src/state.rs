use std::sync::Arc;

use tonic::metadata::MetadataMap;

use crate::auth::{self, PasswordScheme, TokenAuthority};
use crate::db::{ArticleStore, Id, User, UserStore};
use crate::types::{ApiError, ApiResult, OrReject};

/// Everything a handler needs, shared by all in-flight requests.
#[derive(Clone)]
pub struct State {
    pub users: Arc<dyn UserStore>,
    pub articles: Arc<dyn ArticleStore>,
    pub tokens: Arc<dyn TokenAuthority>,
    pub passwords: Arc<dyn PasswordScheme>,
    pub min_password_length: usize,
}

impl State {
    pub fn new<S>(
        store: Arc<S>,
        tokens: Arc<dyn TokenAuthority>,
        passwords: Arc<dyn PasswordScheme>,
        min_password_length: usize,
    ) -> Self
    where
        S: UserStore + ArticleStore + 'static,
    {
        State {
            users: store.clone(),
            articles: store,
            tokens,
            passwords,
            min_password_length,
        }
    }

    /// The identity gate: the only place a request token gets verified.
    pub fn caller(&self, metadata: &MetadataMap) -> ApiResult<Id> {
        auth::resolve_caller(self.tokens.as_ref(), metadata)
            .or_reject(ApiError::Unauthenticated("unauthenticated"))
    }

    /// Like [`State::caller`], for procedures that also serve anonymous
    /// readers. Any token problem just means "anonymous".
    pub fn optional_caller(&self, metadata: &MetadataMap) -> Option<Id> {
        auth::resolve_caller(self.tokens.as_ref(), metadata).ok()
    }

    /// Resolves the caller and loads them. A valid token whose user is gone
    /// is `NotFound`, not `Unauthenticated`.
    pub async fn current_user(&self, metadata: &MetadataMap) -> ApiResult<User> {
        let id = self.caller(metadata)?;
        self.user(id).await
    }

    pub async fn user(&self, id: Id) -> ApiResult<User> {
        self.users
            .user_by_id(id)
            .await
            .or_reject(ApiError::NotFound("user not found"))
    }

    pub fn token_for(&self, user: &User) -> ApiResult<String> {
        self.tokens
            .issue(user.id)
            .or_reject(ApiError::Aborted("internal server error"))
    }
}
