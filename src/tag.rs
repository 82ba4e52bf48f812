use tonic::Request;

use crate::pb::{Empty, TagsResponse};
use crate::state::State;
use crate::types::{ApiError, ApiResult, OrReject};

#[tracing::instrument(skip_all)]
pub async fn tags(state: &State, _request: Request<Empty>) -> ApiResult<TagsResponse> {
    let tags = state
        .articles
        .tags()
        .await
        .or_reject(ApiError::Aborted("internal server error"))?;
    Ok(TagsResponse { tags })
}
