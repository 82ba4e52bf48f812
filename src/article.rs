use tonic::metadata::MetadataMap;
use tonic::Request;

use crate::db::{Article, ArticleFilter, Id, NewArticle, User};
use crate::pb::{
    self, ArticleResponse, ArticlesResponse, CreateArticleRequest, DeleteArticleRequest, Empty,
    FavoriteArticleRequest, GetArticleRequest, GetArticlesRequest, GetFeedArticlesRequest,
    UnfavoriteArticleRequest, UpdateArticleRequest,
};
use crate::state::State;
use crate::types::{ApiError, ApiResult, OrReject, Validate};
use crate::utils::{format_date, page, parse_slug, slug};

/// How [`decorate`] learns whether the viewer favorited the article.
#[derive(Debug, Clone, Copy)]
pub enum Favorited {
    Known(bool),
    Lookup,
}

fn to_pb(article: Article, favorited: bool, following: bool) -> pb::Article {
    pb::Article {
        slug: slug(article.id),
        title: article.title,
        description: article.description,
        body: article.body,
        tag_list: article.tags,
        created_at: format_date(&article.created_at),
        updated_at: format_date(&article.updated_at),
        favorited,
        favorites_count: article.favorites_count,
        author: Some(article.author.profile(following)),
    }
}

/// Attaches the viewer's `favorited` and `author.following` flags. Without a
/// viewer both flags are false unless `favorited` is already known.
pub async fn decorate(
    state: &State,
    article: Article,
    viewer: Option<&User>,
    favorited: Favorited,
) -> ApiResult<pb::Article> {
    let Some(viewer) = viewer else {
        let favorited = matches!(favorited, Favorited::Known(true));
        return Ok(to_pb(article, favorited, false));
    };

    let favorited = match favorited {
        Favorited::Known(favorited) => favorited,
        Favorited::Lookup => state
            .articles
            .is_favorited(article.id, viewer.id)
            .await
            .or_reject(ApiError::NotFound("internal server error"))?,
    };
    let following = state
        .users
        .is_following(viewer.id, article.author.id)
        .await
        .or_reject(ApiError::NotFound("internal server error"))?;
    Ok(to_pb(article, favorited, following))
}

fn respond(article: pb::Article) -> ArticleResponse {
    ArticleResponse {
        article: Some(article),
    }
}

pub(crate) async fn find_article(state: &State, id: Id) -> ApiResult<Article> {
    state
        .articles
        .article_by_id(id)
        .await
        .or_reject(ApiError::InvalidArgument("invalid article id"))
}

/// Loads the caller and the article named by `slug`, insisting the caller
/// wrote it.
async fn owned_article(
    state: &State,
    metadata: &MetadataMap,
    slug: &str,
) -> ApiResult<(User, Article)> {
    let current = state.current_user(metadata).await?;
    let article = find_article(state, parse_slug(slug)?).await?;
    if article.author.id != current.id {
        return Err(ApiError::Unauthenticated("forbidden"));
    }
    Ok((current, article))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

#[tracing::instrument(skip_all)]
pub async fn create(state: &State, request: Request<CreateArticleRequest>) -> ApiResult<ArticleResponse> {
    let (metadata, _, req) = request.into_parts();
    let current = state.current_user(&metadata).await?;

    let new_article = NewArticle {
        author_id: current.id,
        title: req.title,
        description: req.description,
        body: req.body,
        tags: req.tag_list,
    }
    .validate()?;

    let article = state
        .articles
        .create_article(new_article)
        .await
        .or_reject(ApiError::Canceled("Failed to create user."))?;
    tracing::info!(article = article.id, author = current.id, "article created");

    let article = decorate(state, article, Some(&current), Favorited::Known(false)).await?;
    Ok(respond(article))
}

#[tracing::instrument(skip_all, fields(slug = %request.get_ref().slug))]
pub async fn get(state: &State, request: Request<GetArticleRequest>) -> ApiResult<ArticleResponse> {
    let (metadata, _, req) = request.into_parts();
    let article = find_article(state, parse_slug(&req.slug)?).await?;

    let viewer = match state.optional_caller(&metadata) {
        Some(id) => Some(state.user(id).await?),
        None => None,
    };
    let article = decorate(state, article, viewer.as_ref(), Favorited::Lookup).await?;
    Ok(respond(article))
}

#[tracing::instrument(skip_all)]
pub async fn list(state: &State, request: Request<GetArticlesRequest>) -> ApiResult<ArticlesResponse> {
    let (metadata, _, req) = request.into_parts();
    let (limit, offset) = page(req.limit, req.offset);
    let filter = ArticleFilter {
        tag: non_empty(req.tag),
        author: non_empty(req.author),
        favorited_by: non_empty(req.favorited),
        limit,
        offset,
    };

    let articles = state
        .articles
        .articles(filter)
        .await
        .or_reject(ApiError::Aborted("internal server error"))?;

    // The token is only checked once the page is loaded.
    let current = state.current_user(&metadata).await?;

    let mut views = Vec::with_capacity(articles.len());
    for article in articles {
        // Listings always report favorited as false.
        views.push(decorate(state, article, Some(&current), Favorited::Known(false)).await?);
    }
    Ok(ArticlesResponse {
        articles_count: views.len() as i32,
        articles: views,
    })
}

#[tracing::instrument(skip_all)]
pub async fn feed(state: &State, request: Request<GetFeedArticlesRequest>) -> ApiResult<ArticlesResponse> {
    let (metadata, _, req) = request.into_parts();
    let current = state.current_user(&metadata).await?;
    let (limit, offset) = page(req.limit, req.offset);

    let authors = state
        .users
        .following_ids(current.id)
        .await
        .or_reject(ApiError::Aborted("internal server error"))?;
    let articles = state
        .articles
        .feed_articles(&authors, limit, offset)
        .await
        .or_reject(ApiError::Aborted("internal server error"))?;

    let mut views = Vec::with_capacity(articles.len());
    for article in articles {
        views.push(decorate(state, article, Some(&current), Favorited::Lookup).await?);
    }
    Ok(ArticlesResponse {
        articles_count: views.len() as i32,
        articles: views,
    })
}

#[tracing::instrument(skip_all, fields(slug = %request.get_ref().slug))]
pub async fn update(state: &State, request: Request<UpdateArticleRequest>) -> ApiResult<ArticleResponse> {
    let (metadata, _, req) = request.into_parts();
    let (current, mut article) = owned_article(state, &metadata, &req.slug).await?;

    if let Some(title) = non_empty(req.title) {
        article.title = title;
    }
    if let Some(description) = non_empty(req.description) {
        article.description = description;
    }
    if let Some(body) = non_empty(req.body) {
        article.body = body;
    }
    let article = article.validate()?;

    let article = state
        .articles
        .update_article(&article)
        .await
        .or_reject(ApiError::InvalidArgument("failed to update article"))?;

    let article = decorate(state, article, Some(&current), Favorited::Lookup).await?;
    Ok(respond(article))
}

#[tracing::instrument(skip_all, fields(slug = %request.get_ref().slug))]
pub async fn delete(state: &State, request: Request<DeleteArticleRequest>) -> ApiResult<Empty> {
    let (metadata, _, req) = request.into_parts();
    let (_, article) = owned_article(state, &metadata, &req.slug).await?;

    state
        .articles
        .delete_article(&article)
        .await
        .or_reject(ApiError::Unauthenticated("failed to delete article"))?;
    tracing::info!(article = article.id, "article deleted");
    Ok(Empty {})
}

#[tracing::instrument(skip_all, fields(slug = %request.get_ref().slug))]
pub async fn favorite(state: &State, request: Request<FavoriteArticleRequest>) -> ApiResult<ArticleResponse> {
    let (metadata, _, req) = request.into_parts();
    let current = state.current_user(&metadata).await?;
    let mut article = find_article(state, parse_slug(&req.slug)?).await?;

    state
        .articles
        .add_favorite(&mut article, &current)
        .await
        .or_reject(ApiError::Aborted("failed to favorite article"))?;

    let article = decorate(state, article, Some(&current), Favorited::Known(true)).await?;
    Ok(respond(article))
}

#[tracing::instrument(skip_all, fields(slug = %request.get_ref().slug))]
pub async fn unfavorite(
    state: &State,
    request: Request<UnfavoriteArticleRequest>,
) -> ApiResult<ArticleResponse> {
    let (metadata, _, req) = request.into_parts();
    let current = state.current_user(&metadata).await?;
    let mut article = find_article(state, parse_slug(&req.slug)?).await?;

    state
        .articles
        .remove_favorite(&mut article, &current)
        .await
        .or_reject(ApiError::Aborted("failed to unfavorite article"))?;

    let article = decorate(state, article, Some(&current), Favorited::Known(false)).await?;
    Ok(respond(article))
}
