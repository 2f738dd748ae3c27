//! Backend service for the MemeLytics app: accounts, profiles, meme
//! uploads, search and the featured feed, backed by DynamoDB and S3.

pub mod auth;
pub mod aws_clients;
pub mod config;
pub mod domain;
pub mod errors;
pub mod handlers;
pub mod models;
pub mod repositories;
pub mod routes;
pub mod search;
pub mod startup;
pub mod state;
pub mod storage;

pub use config::Config;
pub use routes::create_router;
pub use state::AppState;
