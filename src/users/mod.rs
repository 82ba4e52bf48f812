use tonic::Request;

use crate::db::NewUser;
use crate::pb::{CreateUserRequest, Empty, LoginUserRequest, UpdateUserRequest, UserResponse};
use crate::state::State;
use crate::types::{ApiError, ApiResult, OrReject};

pub mod models;
mod utils;

use self::models::UserChanges;
use self::utils::*;

#[tracing::instrument(skip_all)]
pub async fn register(state: &State, request: Request<CreateUserRequest>) -> ApiResult<UserResponse> {
    let registration = request.into_inner();
    collect([
        validate_username(&registration.username),
        validate_email(&registration.email),
        validate_password(&registration.password, state.min_password_length),
    ])?;

    let password_hash = state
        .passwords
        .hash(&registration.password)
        .or_reject(ApiError::Aborted("internal server error"))?;
    let user = state
        .users
        .create_user(NewUser {
            email: registration.email,
            username: registration.username,
            password_hash,
        })
        .await
        .or_reject(ApiError::Canceled("failed to create user"))?;

    let token = state.token_for(&user)?;
    tracing::info!(user = user.id, "registered");
    Ok(UserResponse {
        user: Some(user.to_pb(token)),
    })
}

#[tracing::instrument(skip_all)]
pub async fn login(state: &State, request: Request<LoginUserRequest>) -> ApiResult<UserResponse> {
    let login = request.into_inner();
    let rejected = ApiError::InvalidArgument("invalid email or password");

    let user = match state.users.user_by_email(&login.email).await {
        Ok(user) => user,
        Err(_) => return Err(rejected),
    };
    match state.passwords.verify(&login.password, &user.password_hash) {
        Ok(true) => {}
        Ok(false) => return Err(rejected),
        Err(e) => return Err(e).or_reject(rejected),
    }

    let token = state.token_for(&user)?;
    Ok(UserResponse {
        user: Some(user.to_pb(token)),
    })
}

/// Returns the caller with a freshly minted token.
#[tracing::instrument(skip_all)]
pub async fn current(state: &State, request: Request<Empty>) -> ApiResult<UserResponse> {
    let user = state.current_user(request.metadata()).await?;
    let token = state.token_for(&user)?;
    Ok(UserResponse {
        user: Some(user.to_pb(token)),
    })
}

#[tracing::instrument(skip_all)]
pub async fn update(state: &State, request: Request<UpdateUserRequest>) -> ApiResult<UserResponse> {
    let (metadata, _, update) = request.into_parts();
    let mut user = state.current_user(&metadata).await?;
    let mut changes = UserChanges::from(update);

    collect([
        changes.email.as_deref().map_or(Ok(()), validate_email),
        changes.username.as_deref().map_or(Ok(()), validate_username),
        changes
            .password
            .as_deref()
            .map_or(Ok(()), |p| validate_password(p, state.min_password_length)),
    ])?;

    changes.apply(&mut user);
    if let Some(password) = changes.password.take() {
        user.password_hash = state
            .passwords
            .hash(&password)
            .or_reject(ApiError::Aborted("internal server error"))?;
    }

    state
        .users
        .update_user(&user)
        .await
        .or_reject(ApiError::InvalidArgument("failed to update user"))?;

    let token = state.token_for(&user)?;
    Ok(UserResponse {
        user: Some(user.to_pb(token)),
    })
}
