//! Backend of the RealWorld ("Conduit") blogging application, served over gRPC.
//!
//! Each procedure lives in the module for its resource (`users`, `profile`,
//! `article`, `comment`, `tag`) as a plain async function over [`state::State`];
//! [`server::ConduitService`] binds them to the generated tonic service.

pub mod article;
pub mod auth;
pub mod comment;
pub mod config;
pub mod db;
pub mod profile;
pub mod server;
pub mod state;
pub mod tag;
pub mod types;
pub mod users;
pub mod utils;

pub mod pb {
    tonic::include_proto!("realworld.v1");
}
