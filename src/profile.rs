use tonic::Request;

use crate::db::User;
use crate::pb::{FollowRequest, Profile, ProfileResponse, ShowProfileRequest, UnfollowRequest};
use crate::state::State;
use crate::types::{ApiError, ApiResult, OrReject};

fn respond(profile: Profile) -> ProfileResponse {
    ProfileResponse {
        profile: Some(profile),
    }
}

async fn target(state: &State, username: &str) -> ApiResult<User> {
    state
        .users
        .user_by_username(username)
        .await
        .or_reject(ApiError::NotFound("user not found"))
}

#[tracing::instrument(skip_all)]
pub async fn profile(state: &State, request: Request<ShowProfileRequest>) -> ApiResult<ProfileResponse> {
    let (metadata, _, req) = request.into_parts();
    let current = state.current_user(&metadata).await?;
    let user = target(state, &req.username).await?;

    let following = state
        .users
        .is_following(current.id, user.id)
        .await
        .or_reject(ApiError::Internal("internal server error"))?;
    Ok(respond(user.profile(following)))
}

#[tracing::instrument(skip_all)]
pub async fn follow(state: &State, request: Request<FollowRequest>) -> ApiResult<ProfileResponse> {
    let (metadata, _, req) = request.into_parts();
    let current = state.current_user(&metadata).await?;
    // Checked before the lookup; an empty name is refused the same way.
    if req.username.is_empty() || req.username == current.username {
        return Err(ApiError::InvalidArgument("cannot follow yourself"));
    }
    let user = target(state, &req.username).await?;

    state
        .users
        .follow(&current, &user)
        .await
        .or_reject(ApiError::Aborted("failed to follow user"))?;
    tracing::debug!(follower = current.id, followee = user.id, "followed");
    Ok(respond(user.profile(true)))
}

#[tracing::instrument(skip_all)]
pub async fn unfollow(state: &State, request: Request<UnfollowRequest>) -> ApiResult<ProfileResponse> {
    let (metadata, _, req) = request.into_parts();
    let current = state.current_user(&metadata).await?;
    if req.username.is_empty() || req.username == current.username {
        return Err(ApiError::InvalidArgument("cannot follow yourself"));
    }
    let user = target(state, &req.username).await?;

    let following = state
        .users
        .is_following(current.id, user.id)
        .await
        .or_reject(ApiError::Internal("internal server error"))?;
    if !following {
        return Err(ApiError::Unauthenticated("you are not following the user"));
    }

    state
        .users
        .unfollow(&current, &user)
        .await
        .or_reject(ApiError::Aborted("failed to unfollow user"))?;
    tracing::debug!(follower = current.id, followee = user.id, "unfollowed");
    Ok(respond(user.profile(false)))
}
