pub mod auth;
pub mod error;
pub mod feed;
pub mod middleware;
pub mod posts;
pub mod profile;
pub mod router;
pub mod social;
pub mod state;
