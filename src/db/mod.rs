//! Persistence contract consumed by the request handlers.
//!
//! Handlers only ever see the [`UserStore`] and [`ArticleStore`] traits and
//! treat every [`StoreError`] as opaque. Two realizations exist: the
//! [`memory::MemoryStore`] used by tests and local runs, and the diesel
//! backed [`pg::PgStore`] behind the `postgres` feature.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub mod memory;
#[cfg(feature = "postgres")]
pub mod pg;
#[cfg(feature = "postgres")]
pub mod schema;

pub type Id = i32;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("record not found")]
    NotFound,

    #[error("{0} already taken")]
    Conflict(&'static str),

    #[error("a user cannot follow themselves")]
    SelfFollow,

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    Diesel(diesel::result::Error),

    #[cfg(feature = "postgres")]
    #[error(transparent)]
    Pool(#[from] diesel::r2d2::PoolError),

    #[error("store task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

#[cfg(feature = "postgres")]
impl From<diesel::result::Error> for StoreError {
    fn from(err: diesel::result::Error) -> StoreError {
        match err {
            diesel::result::Error::NotFound => StoreError::NotFound,
            other => StoreError::Diesel(other),
        }
    }
}

pub type StoreResult<T> = Result<T, StoreError>;

#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "postgres", derive(diesel::Queryable, diesel::Selectable))]
#[cfg_attr(
    feature = "postgres",
    diesel(table_name = schema::users, check_for_backend(diesel::pg::Pg))
)]
pub struct User {
    pub id: Id,
    pub email: String,
    pub username: String,
    pub password_hash: String,
    pub bio: String,
    pub image: String,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub email: String,
    pub username: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Article {
    pub id: Id,
    pub author: User,
    pub title: String,
    pub description: String,
    pub body: String,
    pub tags: Vec<String>,
    pub favorites_count: i32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewArticle {
    pub author_id: Id,
    pub title: String,
    pub description: String,
    pub body: String,
    pub tags: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Comment {
    pub id: Id,
    pub article_id: Id,
    pub author: User,
    pub body: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewComment {
    pub article_id: Id,
    pub author_id: Id,
    pub body: String,
}

/// Filters accepted by [`ArticleStore::articles`]. `None` means unfiltered.
#[derive(Debug, Clone, Default)]
pub struct ArticleFilter {
    pub tag: Option<String>,
    pub author: Option<String>,
    pub favorited_by: Option<String>,
    pub limit: i64,
    pub offset: i64,
}

#[async_trait]
pub trait UserStore: Send + Sync {
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;
    async fn user_by_id(&self, id: Id) -> StoreResult<User>;
    async fn user_by_email(&self, email: &str) -> StoreResult<User>;
    async fn user_by_username(&self, username: &str) -> StoreResult<User>;
    async fn update_user(&self, user: &User) -> StoreResult<()>;

    async fn follow(&self, follower: &User, followee: &User) -> StoreResult<()>;
    async fn unfollow(&self, follower: &User, followee: &User) -> StoreResult<()>;
    async fn is_following(&self, follower: Id, followee: Id) -> StoreResult<bool>;
    async fn following_ids(&self, follower: Id) -> StoreResult<Vec<Id>>;
}

#[async_trait]
pub trait ArticleStore: Send + Sync {
    async fn create_article(&self, article: NewArticle) -> StoreResult<Article>;
    async fn article_by_id(&self, id: Id) -> StoreResult<Article>;
    /// Persists title, description and body; returns the stored row.
    async fn update_article(&self, article: &Article) -> StoreResult<Article>;
    async fn delete_article(&self, article: &Article) -> StoreResult<()>;
    /// Newest first.
    async fn articles(&self, filter: ArticleFilter) -> StoreResult<Vec<Article>>;
    /// Articles written by any of `authors`, newest first.
    async fn feed_articles(&self, authors: &[Id], limit: i64, offset: i64)
        -> StoreResult<Vec<Article>>;

    /// Records the favorite and bumps `favorites_count` as one operation.
    /// Adding an existing favorite leaves the count alone.
    async fn add_favorite(&self, article: &mut Article, user: &User) -> StoreResult<()>;
    async fn remove_favorite(&self, article: &mut Article, user: &User) -> StoreResult<()>;
    async fn is_favorited(&self, article: Id, user: Id) -> StoreResult<bool>;

    async fn create_comment(&self, comment: NewComment) -> StoreResult<Comment>;
    async fn comment_by_id(&self, id: Id) -> StoreResult<Comment>;
    /// Oldest first.
    async fn comments(&self, article: Id) -> StoreResult<Vec<Comment>>;
    async fn delete_comment(&self, comment: &Comment) -> StoreResult<()>;

    async fn tags(&self) -> StoreResult<Vec<String>>;
}
