//! PostgreSQL realization of the store traits on top of diesel.
//!
//! diesel is synchronous, so every operation checks a connection out of the
//! r2d2 pool and runs on the blocking thread pool.

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use diesel::dsl::exists;
use diesel::pg::PgConnection;
use diesel::prelude::*;
use diesel::r2d2::{ConnectionManager, Pool};
use diesel::{delete, insert_into, select, update};

use super::schema::{article_tags, articles, comments, favorites, follows, tags, users};
use super::{
    Article, ArticleFilter, ArticleStore, Comment, Id, NewArticle, NewComment, NewUser,
    StoreError, StoreResult, User, UserStore,
};

pub type PgPool = Pool<ConnectionManager<PgConnection>>;

pub fn init_pool(database_url: &str, max_size: u32) -> StoreResult<PgPool> {
    let manager = ConnectionManager::<PgConnection>::new(database_url);
    Ok(Pool::builder().max_size(max_size).build(manager)?)
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = articles, check_for_backend(diesel::pg::Pg))]
struct ArticleRow {
    id: Id,
    author_id: Id,
    title: String,
    description: String,
    body: String,
    favorites_count: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl ArticleRow {
    fn into_article(self, author: User, tags: Vec<String>) -> Article {
        debug_assert_eq!(self.author_id, author.id);
        Article {
            id: self.id,
            author,
            title: self.title,
            description: self.description,
            body: self.body,
            tags,
            favorites_count: self.favorites_count,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(Debug, Queryable, Selectable)]
#[diesel(table_name = comments, check_for_backend(diesel::pg::Pg))]
struct CommentRow {
    id: Id,
    article_id: Id,
    author_id: Id,
    body: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl CommentRow {
    fn into_comment(self, author: User) -> Comment {
        debug_assert_eq!(self.author_id, author.id);
        Comment {
            id: self.id,
            article_id: self.article_id,
            author,
            body: self.body,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

/// Attaches tag names to freshly loaded article rows, keeping row order.
fn with_tags(conn: &mut PgConnection, rows: Vec<(ArticleRow, User)>) -> StoreResult<Vec<Article>> {
    let ids: Vec<Id> = rows.iter().map(|(row, _)| row.id).collect();
    let links: Vec<(Id, String)> = article_tags::table
        .inner_join(tags::table)
        .filter(article_tags::article_id.eq_any(&ids))
        .order((article_tags::article_id, tags::name))
        .select((article_tags::article_id, tags::name))
        .load(conn)?;

    let mut by_article: HashMap<Id, Vec<String>> = HashMap::new();
    for (id, name) in links {
        by_article.entry(id).or_default().push(name);
    }

    Ok(rows
        .into_iter()
        .map(|(row, author)| {
            let tags = by_article.remove(&row.id).unwrap_or_default();
            row.into_article(author, tags)
        })
        .collect())
}

fn load_article(conn: &mut PgConnection, id: Id) -> StoreResult<Article> {
    let row: (ArticleRow, User) = articles::table
        .inner_join(users::table)
        .filter(articles::id.eq(id))
        .select((ArticleRow::as_select(), User::as_select()))
        .first(conn)?;
    with_tags(conn, vec![row])?.pop().ok_or(StoreError::NotFound)
}

fn into_comments(rows: Vec<(CommentRow, User)>) -> Vec<Comment> {
    rows.into_iter()
        .map(|(row, author)| row.into_comment(author))
        .collect()
}

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        PgStore { pool }
    }

    async fn run<T, F>(&self, f: F) -> StoreResult<T>
    where
        F: FnOnce(&mut PgConnection) -> StoreResult<T> + Send + 'static,
        T: Send + 'static,
    {
        let pool = self.pool.clone();
        tokio::task::spawn_blocking(move || {
            let mut conn = pool.get()?;
            f(&mut conn)
        })
        .await?
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        self.run(move |conn| {
            Ok(insert_into(users::table)
                .values((
                    users::email.eq(&user.email),
                    users::username.eq(&user.username),
                    users::password_hash.eq(&user.password_hash),
                ))
                .returning(User::as_returning())
                .get_result(conn)?)
        })
        .await
    }

    async fn user_by_id(&self, id: Id) -> StoreResult<User> {
        self.run(move |conn| {
            Ok(users::table
                .find(id)
                .select(User::as_select())
                .first(conn)?)
        })
        .await
    }

    async fn user_by_email(&self, email: &str) -> StoreResult<User> {
        let email = email.to_owned();
        self.run(move |conn| {
            Ok(users::table
                .filter(users::email.eq(email))
                .select(User::as_select())
                .first(conn)?)
        })
        .await
    }

    async fn user_by_username(&self, username: &str) -> StoreResult<User> {
        let username = username.to_owned();
        self.run(move |conn| {
            Ok(users::table
                .filter(users::username.eq(username))
                .select(User::as_select())
                .first(conn)?)
        })
        .await
    }

    async fn update_user(&self, user: &User) -> StoreResult<()> {
        let user = user.clone();
        self.run(move |conn| {
            let updated = update(users::table.find(user.id))
                .set((
                    users::email.eq(&user.email),
                    users::username.eq(&user.username),
                    users::password_hash.eq(&user.password_hash),
                    users::bio.eq(&user.bio),
                    users::image.eq(&user.image),
                ))
                .execute(conn)?;
            match updated {
                0 => Err(StoreError::NotFound),
                _ => Ok(()),
            }
        })
        .await
    }

    async fn follow(&self, follower: &User, followee: &User) -> StoreResult<()> {
        if follower.id == followee.id {
            return Err(StoreError::SelfFollow);
        }
        let (from, to) = (follower.id, followee.id);
        self.run(move |conn| {
            insert_into(follows::table)
                .values((follows::follower_id.eq(from), follows::followee_id.eq(to)))
                .on_conflict_do_nothing()
                .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn unfollow(&self, follower: &User, followee: &User) -> StoreResult<()> {
        let (from, to) = (follower.id, followee.id);
        self.run(move |conn| {
            delete(
                follows::table
                    .filter(follows::follower_id.eq(from))
                    .filter(follows::followee_id.eq(to)),
            )
            .execute(conn)?;
            Ok(())
        })
        .await
    }

    async fn is_following(&self, follower: Id, followee: Id) -> StoreResult<bool> {
        self.run(move |conn| {
            Ok(select(exists(
                follows::table
                    .filter(follows::follower_id.eq(follower))
                    .filter(follows::followee_id.eq(followee)),
            ))
            .get_result(conn)?)
        })
        .await
    }

    async fn following_ids(&self, follower: Id) -> StoreResult<Vec<Id>> {
        self.run(move |conn| {
            Ok(follows::table
                .filter(follows::follower_id.eq(follower))
                .select(follows::followee_id)
                .order(follows::followee_id)
                .load(conn)?)
        })
        .await
    }
}

#[async_trait]
impl ArticleStore for PgStore {
    async fn create_article(&self, article: NewArticle) -> StoreResult<Article> {
        self.run(move |conn| {
            conn.transaction::<_, StoreError, _>(|conn| {
                let row: ArticleRow = insert_into(articles::table)
                    .values((
                        articles::author_id.eq(article.author_id),
                        articles::title.eq(&article.title),
                        articles::description.eq(&article.description),
                        articles::body.eq(&article.body),
                    ))
                    .returning(ArticleRow::as_returning())
                    .get_result(conn)?;

                if !article.tags.is_empty() {
                    let names: Vec<_> = article.tags.iter().map(|t| tags::name.eq(t)).collect();
                    insert_into(tags::table)
                        .values(&names)
                        .on_conflict(tags::name)
                        .do_nothing()
                        .execute(conn)?;

                    let tag_ids: Vec<Id> = tags::table
                        .filter(tags::name.eq_any(&article.tags))
                        .select(tags::id)
                        .load(conn)?;
                    let links: Vec<_> = tag_ids
                        .into_iter()
                        .map(|tag| {
                            (
                                article_tags::article_id.eq(row.id),
                                article_tags::tag_id.eq(tag),
                            )
                        })
                        .collect();
                    insert_into(article_tags::table)
                        .values(&links)
                        .execute(conn)?;
                }

                load_article(conn, row.id)
            })
        })
        .await
    }

    async fn article_by_id(&self, id: Id) -> StoreResult<Article> {
        self.run(move |conn| load_article(conn, id)).await
    }

    async fn update_article(&self, article: &Article) -> StoreResult<Article> {
        let article = article.clone();
        self.run(move |conn| {
            let row: ArticleRow = update(articles::table.find(article.id))
                .set((
                    articles::title.eq(&article.title),
                    articles::description.eq(&article.description),
                    articles::body.eq(&article.body),
                    articles::updated_at.eq(Utc::now()),
                ))
                .returning(ArticleRow::as_returning())
                .get_result(conn)?;
            Ok(row.into_article(article.author, article.tags))
        })
        .await
    }

    async fn delete_article(&self, article: &Article) -> StoreResult<()> {
        let id = article.id;
        self.run(move |conn| match delete(articles::table.find(id)).execute(conn)? {
            0 => Err(StoreError::NotFound),
            _ => Ok(()),
        })
        .await
    }

    async fn articles(&self, filter: ArticleFilter) -> StoreResult<Vec<Article>> {
        self.run(move |conn| {
            let mut query = articles::table
                .inner_join(users::table)
                .select((ArticleRow::as_select(), User::as_select()))
                .order((articles::created_at.desc(), articles::id.desc()))
                .limit(filter.limit)
                .offset(filter.offset)
                .into_boxed();

            if let Some(tag) = filter.tag {
                let tagged: Vec<Id> = article_tags::table
                    .inner_join(tags::table)
                    .filter(tags::name.eq(tag))
                    .select(article_tags::article_id)
                    .load(conn)?;
                query = query.filter(articles::id.eq_any(tagged));
            }
            if let Some(author) = filter.author {
                query = query.filter(users::username.eq(author));
            }
            if let Some(name) = filter.favorited_by {
                let favorited: Vec<Id> = favorites::table
                    .inner_join(users::table)
                    .filter(users::username.eq(name))
                    .select(favorites::article_id)
                    .load(conn)?;
                query = query.filter(articles::id.eq_any(favorited));
            }

            let rows = query.load::<(ArticleRow, User)>(conn)?;
            with_tags(conn, rows)
        })
        .await
    }

    async fn feed_articles(
        &self,
        authors: &[Id],
        limit: i64,
        offset: i64,
    ) -> StoreResult<Vec<Article>> {
        let authors = authors.to_vec();
        self.run(move |conn| {
            let rows = articles::table
                .inner_join(users::table)
                .filter(articles::author_id.eq_any(authors))
                .select((ArticleRow::as_select(), User::as_select()))
                .order((articles::created_at.desc(), articles::id.desc()))
                .limit(limit)
                .offset(offset)
                .load::<(ArticleRow, User)>(conn)?;
            with_tags(conn, rows)
        })
        .await
    }

    async fn add_favorite(&self, article: &mut Article, user: &User) -> StoreResult<()> {
        let (article_id, user_id) = (article.id, user.id);
        let count = self
            .run(move |conn| {
                conn.transaction::<_, StoreError, _>(|conn| {
                    let inserted = insert_into(favorites::table)
                        .values((
                            favorites::user_id.eq(user_id),
                            favorites::article_id.eq(article_id),
                        ))
                        .on_conflict_do_nothing()
                        .execute(conn)?;
                    if inserted > 0 {
                        update(articles::table.find(article_id))
                            .set(articles::favorites_count.eq(articles::favorites_count + 1))
                            .execute(conn)?;
                    }
                    Ok(articles::table
                        .find(article_id)
                        .select(articles::favorites_count)
                        .first::<i32>(conn)?)
                })
            })
            .await?;
        article.favorites_count = count;
        Ok(())
    }

    async fn remove_favorite(&self, article: &mut Article, user: &User) -> StoreResult<()> {
        let (article_id, user_id) = (article.id, user.id);
        let count = self
            .run(move |conn| {
                conn.transaction::<_, StoreError, _>(|conn| {
                    let removed = delete(
                        favorites::table
                            .filter(favorites::user_id.eq(user_id))
                            .filter(favorites::article_id.eq(article_id)),
                    )
                    .execute(conn)?;
                    if removed > 0 {
                        update(articles::table.find(article_id))
                            .set(articles::favorites_count.eq(articles::favorites_count - 1))
                            .execute(conn)?;
                    }
                    Ok(articles::table
                        .find(article_id)
                        .select(articles::favorites_count)
                        .first::<i32>(conn)?)
                })
            })
            .await?;
        article.favorites_count = count;
        Ok(())
    }

    async fn is_favorited(&self, article: Id, user: Id) -> StoreResult<bool> {
        self.run(move |conn| {
            Ok(select(exists(
                favorites::table
                    .filter(favorites::user_id.eq(user))
                    .filter(favorites::article_id.eq(article)),
            ))
            .get_result(conn)?)
        })
        .await
    }

    async fn create_comment(&self, comment: NewComment) -> StoreResult<Comment> {
        self.run(move |conn| {
            let row: CommentRow = insert_into(comments::table)
                .values((
                    comments::article_id.eq(comment.article_id),
                    comments::author_id.eq(comment.author_id),
                    comments::body.eq(&comment.body),
                ))
                .returning(CommentRow::as_returning())
                .get_result(conn)?;
            let author = users::table
                .find(row.author_id)
                .select(User::as_select())
                .first(conn)?;
            Ok(row.into_comment(author))
        })
        .await
    }

    async fn comment_by_id(&self, id: Id) -> StoreResult<Comment> {
        self.run(move |conn| {
            let row = comments::table
                .inner_join(users::table)
                .filter(comments::id.eq(id))
                .select((CommentRow::as_select(), User::as_select()))
                .first::<(CommentRow, User)>(conn)?;
            into_comments(vec![row])
                .pop()
                .ok_or(StoreError::NotFound)
        })
        .await
    }

    async fn comments(&self, article: Id) -> StoreResult<Vec<Comment>> {
        self.run(move |conn| {
            let rows = comments::table
                .inner_join(users::table)
                .filter(comments::article_id.eq(article))
                .select((CommentRow::as_select(), User::as_select()))
                .order((comments::created_at.asc(), comments::id.asc()))
                .load::<(CommentRow, User)>(conn)?;
            Ok(into_comments(rows))
        })
        .await
    }

    async fn delete_comment(&self, comment: &Comment) -> StoreResult<()> {
        let id = comment.id;
        self.run(move |conn| match delete(comments::table.find(id)).execute(conn)? {
            0 => Err(StoreError::NotFound),
            _ => Ok(()),
        })
        .await
    }

    async fn tags(&self) -> StoreResult<Vec<String>> {
        self.run(|conn| Ok(tags::table.select(tags::name).order(tags::name).load(conn)?))
            .await
    }
}
