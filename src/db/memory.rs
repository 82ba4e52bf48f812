//! In-memory realization of the store traits.
//!
//! All tables live behind one mutex which is never held across an await, so
//! every operation is atomic with respect to the others. Nothing survives a
//! restart.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, MutexGuard};

use super::{
    Article, ArticleFilter, ArticleStore, Comment, Id, NewArticle, NewComment, NewUser,
    StoreError, StoreResult, User, UserStore,
};

#[derive(Debug, Clone)]
struct ArticleRow {
    id: Id,
    author_id: Id,
    title: String,
    description: String,
    body: String,
    tags: Vec<String>,
    favorites_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
struct CommentRow {
    id: Id,
    article_id: Id,
    author_id: Id,
    body: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct Tables {
    users: BTreeMap<Id, User>,
    articles: BTreeMap<Id, ArticleRow>,
    comments: BTreeMap<Id, CommentRow>,
    tags: BTreeSet<String>,
    // (follower, followee)
    follows: HashSet<(Id, Id)>,
    // (user, article)
    favorites: HashSet<(Id, Id)>,
    last_user_id: Id,
    last_article_id: Id,
    last_comment_id: Id,
}

impl Tables {
    fn user(&self, id: Id) -> StoreResult<&User> {
        self.users.get(&id).ok_or(StoreError::NotFound)
    }

    fn user_named(&self, username: &str) -> Option<&User> {
        self.users.values().find(|u| u.username == username)
    }

    fn check_unique(&self, user_id: Option<Id>, email: &str, username: &str) -> StoreResult<()> {
        for other in self.users.values() {
            if Some(other.id) == user_id {
                continue;
            }
            if other.email == email {
                return Err(StoreError::Conflict("email"));
            }
            if other.username == username {
                return Err(StoreError::Conflict("username"));
            }
        }
        Ok(())
    }

    fn article(&self, row: &ArticleRow) -> StoreResult<Article> {
        Ok(Article {
            id: row.id,
            author: self.user(row.author_id)?.clone(),
            title: row.title.clone(),
            description: row.description.clone(),
            body: row.body.clone(),
            tags: row.tags.clone(),
            favorites_count: row.favorites_count,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn comment(&self, row: &CommentRow) -> StoreResult<Comment> {
        Ok(Comment {
            id: row.id,
            article_id: row.article_id,
            author: self.user(row.author_id)?.clone(),
            body: row.body.clone(),
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }

    fn page<'a, I>(&self, rows: I, limit: i64, offset: i64) -> StoreResult<Vec<Article>>
    where
        I: Iterator<Item = &'a ArticleRow>,
    {
        let mut rows: Vec<&ArticleRow> = rows.collect();
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        rows.into_iter()
            .skip(offset.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|row| self.article(row))
            .collect()
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: Mutex<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, Tables> {
        self.tables.lock()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut tables = self.lock();
        tables.check_unique(None, &user.email, &user.username)?;
        tables.last_user_id += 1;
        let user = User {
            id: tables.last_user_id,
            email: user.email,
            username: user.username,
            password_hash: user.password_hash,
            bio: String::new(),
            image: String::new(),
        };
        tables.users.insert(user.id, user.clone());
        Ok(user)
    }

    async fn user_by_id(&self, id: Id) -> StoreResult<User> {
        self.lock().user(id).cloned()
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<User> {
        self.lock()
            .users
            .values()
            .find(|u| u.email == email)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn user_by_username(&self, username: &str) -> StoreResult<User> {
        self.lock()
            .user_named(username)
            .cloned()
            .ok_or(StoreError::NotFound)
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let mut tables = self.lock();
        tables.user(user.id)?;
        tables.check_unique(Some(user.id), &user.email, &user.username)?;
        tables.users.insert(user.id, user.clone());
        Ok(())
    }

    async fn follow(&self, follower: &User, followee: &User) -> StoreResult<()> {
        if follower.id == followee.id {
            return Err(StoreError::SelfFollow);
        }
        let mut tables = self.lock();
        tables.user(follower.id)?;
        tables.user(followee.id)?;
        tables.follows.insert((follower.id, followee.id));
        Ok(())
    }

    async fn unfollow(&self, follower: &User, followee: &User) -> StoreResult<()> {
        self.lock().follows.remove(&(follower.id, followee.id));
        Ok(())
    }

    async fn is_following(&self, follower: Id, followee: Id) -> StoreResult<bool> {
        Ok(self.lock().follows.contains(&(follower, followee)))
    }

    async fn following_ids(&self, follower: Id) -> StoreResult<Vec<Id>> {
        let mut ids: Vec<Id> = self
            .lock()
            .follows
            .iter()
            .filter(|(from, _)| *from == follower)
            .map(|(_, to)| *to)
            .collect();
        ids.sort_unstable();
        Ok(ids)
    }
}

#[async_trait]
impl ArticleStore for MemoryStore {
    async fn create_article(&self, article: NewArticle) -> StoreResult<Article> {
        let mut tables = self.lock();
        tables.user(article.author_id)?;
        // Deduplicated and sorted by name, matching the postgres store.
        let tags: Vec<String> = article
            .tags
            .into_iter()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        tables.tags.extend(tags.iter().cloned());
        tables.last_article_id += 1;
        let now = Utc::now();
        let row = ArticleRow {
            id: tables.last_article_id,
            author_id: article.author_id,
            title: article.title,
            description: article.description,
            body: article.body,
            tags,
            favorites_count: 0,
            created_at: now,
            updated_at: now,
        };
        let created = tables.article(&row)?;
        tables.articles.insert(row.id, row);
        Ok(created)
    }

    async fn article_by_id(&self, id: Id) -> StoreResult<Article> {
        let tables = self.lock();
        let row = tables.articles.get(&id).ok_or(StoreError::NotFound)?;
        tables.article(row)
    }

    async fn update_article(&self, article: &Article) -> StoreResult<Article> {
        let mut tables = self.lock();
        let row = tables
            .articles
            .get_mut(&article.id)
            .ok_or(StoreError::NotFound)?;
        row.title = article.title.clone();
        row.description = article.description.clone();
        row.body = article.body.clone();
        row.updated_at = Utc::now();
        let row = row.clone();
        tables.article(&row)
    }

    async fn delete_article(&self, article: &Article) -> StoreResult<()> {
        let mut tables = self.lock();
        tables
            .articles
            .remove(&article.id)
            .ok_or(StoreError::NotFound)?;
        tables.comments.retain(|_, c| c.article_id != article.id);
        tables.favorites.retain(|(_, a)| *a != article.id);
        Ok(())
    }

    async fn articles(&self, filter: ArticleFilter) -> StoreResult<Vec<Article>> {
        let tables = self.lock();
        let author = match filter.author.as_deref() {
            Some(name) => match tables.user_named(name) {
                Some(user) => Some(user.id),
                None => return Ok(Vec::new()),
            },
            None => None,
        };
        let favorited_by = match filter.favorited_by.as_deref() {
            Some(name) => match tables.user_named(name) {
                Some(user) => Some(user.id),
                None => return Ok(Vec::new()),
            },
            None => None,
        };
        let rows = tables.articles.values().filter(|row| {
            filter.tag.as_ref().map_or(true, |tag| row.tags.contains(tag))
                && author.map_or(true, |id| row.author_id == id)
                && favorited_by.map_or(true, |id| tables.favorites.contains(&(id, row.id)))
        });
        tables.page(rows, filter.limit, filter.offset)
    }

    async fn feed_articles(
        &self,
        authors: &[Id],
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Article>> {
        let tables = self.lock();
        let rows = tables
            .articles
            .values()
            .filter(|row| authors.contains(&row.author_id));
        tables.page(rows, limit, offset)
    }

    async fn add_favorite(&self, article: &mut Article, user: &User) -> StoreResult<()> {
        let mut tables = self.lock();
        tables.user(user.id)?;
        if !tables.articles.contains_key(&article.id) {
            return Err(StoreError::NotFound);
        }
        let added = tables.favorites.insert((user.id, article.id));
        let row = tables
            .articles
            .get_mut(&article.id)
            .ok_or(StoreError::NotFound)?;
        if added {
            row.favorites_count += 1;
        }
        article.favorites_count = row.favorites_count;
        Ok(())
    }

    async fn remove_favorite(&self, article: &mut Article, user: &User) -> StoreResult<()> {
        let mut tables = self.lock();
        let removed = tables.favorites.remove(&(user.id, article.id));
        let row = tables
            .articles
            .get_mut(&article.id)
            .ok_or(StoreError::NotFound)?;
        if removed {
            row.favorites_count -= 1;
        }
        article.favorites_count = row.favorites_count;
        Ok(())
    }

    async fn is_favorited(&self, article: Id, user: Id) -> StoreResult<bool> {
        Ok(self.lock().favorites.contains(&(user, article)))
    }

    async fn create_comment(&self, comment: NewComment) -> StoreResult<Comment> {
        let mut tables = self.lock();
        if !tables.articles.contains_key(&comment.article_id) {
            return Err(StoreError::NotFound);
        }
        tables.user(comment.author_id)?;
        tables.last_comment_id += 1;
        let now = Utc::now();
        let row = CommentRow {
            id: tables.last_comment_id,
            article_id: comment.article_id,
            author_id: comment.author_id,
            body: comment.body,
            created_at: now,
            updated_at: now,
        };
        let created = tables.comment(&row)?;
        tables.comments.insert(row.id, row);
        Ok(created)
    }

    async fn comment_by_id(&self, id: Id) -> StoreResult<Comment> {
        let tables = self.lock();
        let row = tables.comments.get(&id).ok_or(StoreError::NotFound)?;
        tables.comment(row)
    }

    async fn comments(&self, article: Id) -> StoreResult<Vec<Comment>> {
        let tables = self.lock();
        tables
            .comments
            .values()
            .filter(|row| row.article_id == article)
            .map(|row| tables.comment(row))
            .collect()
    }

    async fn delete_comment(&self, comment: &Comment) -> StoreResult<()> {
        self.lock()
            .comments
            .remove(&comment.id)
            .map(|_| ())
            .ok_or(StoreError::NotFound)
    }

    async fn tags(&self) -> StoreResult<Vec<String>> {
        Ok(self.lock().tags.iter().cloned().collect())
    }
}
