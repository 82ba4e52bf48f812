//! A store that forwards to [`MemoryStore`] but fails the operations it is
//! told to fail.

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use realworld::db::memory::MemoryStore;
use realworld::db::{
    Article, ArticleFilter, ArticleStore, Comment, Id, NewArticle, NewComment, NewUser,
    StoreError, StoreResult, User, UserStore,
};

#[derive(Debug, Default)]
pub struct FlakyStore {
    inner: MemoryStore,
    failing: Mutex<HashSet<&'static str>>,
}

impl FlakyStore {
    pub fn new() -> Arc<Self> {
        Arc::new(FlakyStore::default())
    }

    /// Makes every later call of `op` fail.
    pub fn fail(&self, op: &'static str) {
        self.failing.lock().insert(op);
    }

    fn check(&self, op: &'static str) -> StoreResult<()> {
        if self.failing.lock().contains(op) {
            return Err(StoreError::Conflict(op));
        }
        Ok(())
    }
}

#[async_trait]
impl UserStore for FlakyStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        self.check("create_user")?;
        self.inner.create_user(user).await
    }

    async fn user_by_id(&self, id: Id) -> StoreResult<User> {
        self.check("user_by_id")?;
        self.inner.user_by_id(id).await
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<User> {
        self.check("user_by_email")?;
        self.inner.user_by_email(email).await
    }

    async fn user_by_username(&self, username: &str) -> StoreResult<User> {
        self.check("user_by_username")?;
        self.inner.user_by_username(username).await
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        self.check("update_user")?;
        self.inner.update_user(user).await
    }

    async fn follow(&self, follower: &User, followee: &User) -> StoreResult<()> {
        self.check("follow")?;
        self.inner.follow(follower, followee).await
    }

    async fn unfollow(&self, follower: &User, followee: &User) -> StoreResult<()> {
        self.check("unfollow")?;
        self.inner.unfollow(follower, followee).await
    }

    async fn is_following(&self, follower: Id, followee: Id) -> StoreResult<bool> {
        self.check("is_following")?;
        self.inner.is_following(follower, followee).await
    }

    async fn following_ids(&self, follower: Id) -> StoreResult<Vec<Id>> {
        self.check("following_ids")?;
        self.inner.following_ids(follower).await
    }
}

#[async_trait]
impl ArticleStore for FlakyStore {
    async fn create_article(&self, article: NewArticle) -> StoreResult<Article> {
        self.check("create_article")?;
        self.inner.create_article(article).await
    }

    async fn article_by_id(&self, id: Id) -> StoreResult<Article> {
        self.check("article_by_id")?;
        self.inner.article_by_id(id).await
    }

    async fn update_article(&self, article: &Article) -> StoreResult<Article> {
        self.check("update_article")?;
        self.inner.update_article(article).await
    }

    async fn delete_article(&self, article: &Article) -> StoreResult<()> {
        self.check("delete_article")?;
        self.inner.delete_article(article).await
    }

    async fn articles(&self, filter: ArticleFilter) -> StoreResult<Vec<Article>> {
        self.check("articles")?;
        self.inner.articles(filter).await
    }

    async fn feed_articles(
        &self,
        authors: &[Id],
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Article>> {
        self.check("feed_articles")?;
        self.inner.feed_articles(authors, limit, offset).await
    }

    async fn add_favorite(&self, article: &mut Article, user: &User) -> StoreResult<()> {
        self.check("add_favorite")?;
        self.inner.add_favorite(article, user).await
    }

    async fn remove_favorite(&self, article: &mut Article, user: &User) -> StoreResult<()> {
        self.check("remove_favorite")?;
        self.inner.remove_favorite(article, user).await
    }

    async fn is_favorited(&self, article: Id, user: Id) -> StoreResult<bool> {
        self.check("is_favorited")?;
        self.inner.is_favorited(article, user).await
    }

    async fn create_comment(&self, comment: NewComment) -> StoreResult<Comment> {
        self.check("create_comment")?;
        self.inner.create_comment(comment).await
    }

    async fn comment_by_id(&self, id: Id) -> StoreResult<Comment> {
        self.check("comment_by_id")?;
        self.inner.comment_by_id(id).await
    }

    async fn comments(&self, article: Id) -> StoreResult<Vec<Comment>> {
        self.check("comments")?;
        self.inner.comments(article).await
    }

    async fn delete_comment(&self, comment: &Comment) -> StoreResult<()> {
        self.check("delete_comment")?;
        self.inner.delete_comment(comment).await
    }

    async fn tags(&self) -> StoreResult<Vec<String>> {
        self.check("tags")?;
        self.inner.tags().await
    }
}
