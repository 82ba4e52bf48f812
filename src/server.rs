//! Binds the handler functions to the generated `Conduit` gRPC service.

use tonic::{Request, Response, Status};

use crate::pb::conduit_server::{Conduit, ConduitServer};
use crate::pb::*;
use crate::state::State;
use crate::types::ApiResult;
use crate::{article, comment, profile, tag, users};

fn respond<T>(result: ApiResult<T>) -> Result<Response<T>, Status> {
    result.map(Response::new).map_err(Status::from)
}

#[derive(Clone)]
pub struct ConduitService {
    state: State,
}

impl ConduitService {
    pub fn new(state: State) -> Self {
        ConduitService { state }
    }

    pub fn into_server(self) -> ConduitServer<Self> {
        ConduitServer::new(self)
    }
}

#[tonic::async_trait]
impl Conduit for ConduitService {
    async fn create_user(
        &self,
        request: Request<CreateUserRequest>,
    ) -> Result<Response<UserResponse>, Status> {
        respond(users::register(&self.state, request).await)
    }

    async fn login_user(
        &self,
        request: Request<LoginUserRequest>,
    ) -> Result<Response<UserResponse>, Status> {
        respond(users::login(&self.state, request).await)
    }

    async fn current_user(&self, request: Request<Empty>) -> Result<Response<UserResponse>, Status> {
        respond(users::current(&self.state, request).await)
    }

    async fn update_user(
        &self,
        request: Request<UpdateUserRequest>,
    ) -> Result<Response<UserResponse>, Status> {
        respond(users::update(&self.state, request).await)
    }

    async fn show_profile(
        &self,
        request: Request<ShowProfileRequest>,
    ) -> Result<Response<ProfileResponse>, Status> {
        respond(profile::profile(&self.state, request).await)
    }

    async fn follow_user(
        &self,
        request: Request<FollowRequest>,
    ) -> Result<Response<ProfileResponse>, Status> {
        respond(profile::follow(&self.state, request).await)
    }

    async fn unfollow_user(
        &self,
        request: Request<UnfollowRequest>,
    ) -> Result<Response<ProfileResponse>, Status> {
        respond(profile::unfollow(&self.state, request).await)
    }

    async fn create_article(
        &self,
        request: Request<CreateArticleRequest>,
    ) -> Result<Response<ArticleResponse>, Status> {
        respond(article::create(&self.state, request).await)
    }

    async fn get_article(
        &self,
        request: Request<GetArticleRequest>,
    ) -> Result<Response<ArticleResponse>, Status> {
        respond(article::get(&self.state, request).await)
    }

    async fn get_articles(
        &self,
        request: Request<GetArticlesRequest>,
    ) -> Result<Response<ArticlesResponse>, Status> {
        respond(article::list(&self.state, request).await)
    }

    async fn get_feed_articles(
        &self,
        request: Request<GetFeedArticlesRequest>,
    ) -> Result<Response<ArticlesResponse>, Status> {
        respond(article::feed(&self.state, request).await)
    }

    async fn update_article(
        &self,
        request: Request<UpdateArticleRequest>,
    ) -> Result<Response<ArticleResponse>, Status> {
        respond(article::update(&self.state, request).await)
    }

    async fn delete_article(
        &self,
        request: Request<DeleteArticleRequest>,
    ) -> Result<Response<Empty>, Status> {
        respond(article::delete(&self.state, request).await)
    }

    async fn favorite_article(
        &self,
        request: Request<FavoriteArticleRequest>,
    ) -> Result<Response<ArticleResponse>, Status> {
        respond(article::favorite(&self.state, request).await)
    }

    async fn unfavorite_article(
        &self,
        request: Request<UnfavoriteArticleRequest>,
    ) -> Result<Response<ArticleResponse>, Status> {
        respond(article::unfavorite(&self.state, request).await)
    }

    async fn create_comment(
        &self,
        request: Request<CreateCommentRequest>,
    ) -> Result<Response<CommentResponse>, Status> {
        respond(comment::add(&self.state, request).await)
    }

    async fn get_comments(
        &self,
        request: Request<GetCommentsRequest>,
    ) -> Result<Response<CommentsResponse>, Status> {
        respond(comment::get(&self.state, request).await)
    }

    async fn delete_comment(
        &self,
        request: Request<DeleteCommentRequest>,
    ) -> Result<Response<Empty>, Status> {
        respond(comment::delete(&self.state, request).await)
    }

    async fn get_tags(&self, request: Request<Empty>) -> Result<Response<TagsResponse>, Status> {
        respond(tag::tags(&self.state, request).await)
    }
}
