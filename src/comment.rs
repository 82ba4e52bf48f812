use tonic::Request;

use crate::article::find_article;
use crate::db::{Comment, NewComment};
use crate::pb::{
    self, CommentResponse, CommentsResponse, CreateCommentRequest, DeleteCommentRequest, Empty,
    GetCommentsRequest,
};
use crate::state::State;
use crate::types::{ApiError, ApiResult, OrReject, Validate};
use crate::utils::{format_date, parse_comment_id, parse_slug};

impl From<(Comment, bool)> for pb::Comment {
    fn from((comment, following): (Comment, bool)) -> Self {
        pb::Comment {
            id: comment.id.to_string(),
            created_at: format_date(&comment.created_at),
            updated_at: format_date(&comment.updated_at),
            body: comment.body,
            author: Some(comment.author.profile(following)),
        }
    }
}

#[tracing::instrument(skip_all, fields(slug = %request.get_ref().slug))]
pub async fn add(state: &State, request: Request<CreateCommentRequest>) -> ApiResult<CommentResponse> {
    let (metadata, _, req) = request.into_parts();
    let current = state.current_user(&metadata).await?;
    let article = find_article(state, parse_slug(&req.slug)?).await?;

    let new_comment = NewComment {
        article_id: article.id,
        author_id: current.id,
        body: req.body,
    }
    .validate()?;

    let comment = state
        .articles
        .create_comment(new_comment)
        .await
        .or_reject(ApiError::Aborted("failed to create comment."))?;

    // The author is the caller, who never follows themselves.
    Ok(CommentResponse {
        comment: Some((comment, false).into()),
    })
}

#[tracing::instrument(skip_all, fields(slug = %request.get_ref().slug))]
pub async fn get(state: &State, request: Request<GetCommentsRequest>) -> ApiResult<CommentsResponse> {
    let (metadata, _, req) = request.into_parts();
    let article = find_article(state, parse_slug(&req.slug)?).await?;
    let comments = state
        .articles
        .comments(article.id)
        .await
        .or_reject(ApiError::Aborted("internal server error"))?;

    let viewer = state.optional_caller(&metadata);
    let mut views = Vec::with_capacity(comments.len());
    for comment in comments {
        let following = match viewer {
            Some(viewer) => state
                .users
                .is_following(viewer, comment.author.id)
                .await
                .or_reject(ApiError::NotFound("internal server error"))?,
            None => false,
        };
        views.push((comment, following).into());
    }
    Ok(CommentsResponse { comments: views })
}

#[tracing::instrument(skip_all, fields(slug = %request.get_ref().slug, id = %request.get_ref().id))]
pub async fn delete(state: &State, request: Request<DeleteCommentRequest>) -> ApiResult<Empty> {
    let (metadata, _, req) = request.into_parts();
    let current = state.current_user(&metadata).await?;
    let article_id = parse_slug(&req.slug)?;
    let id = parse_comment_id(&req.id)?;

    let comment = state
        .articles
        .comment_by_id(id)
        .await
        .or_reject(ApiError::InvalidArgument("invalid comment id"))?;
    if comment.article_id != article_id {
        return Err(ApiError::InvalidArgument("the comment is not in the article"));
    }
    if comment.author.id != current.id {
        return Err(ApiError::InvalidArgument("forbidden"));
    }

    state
        .articles
        .delete_comment(&comment)
        .await
        .or_reject(ApiError::Aborted("failed to delete comment"))?;
    tracing::info!(comment = comment.id, "comment deleted");
    Ok(Empty {})
}
