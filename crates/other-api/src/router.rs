use axum::{
    Router,
    extract::DefaultBodyLimit,
    middleware,
    response::Redirect,
    routing::{delete, get, post, put},
};
use tower_http::services::ServeDir;

use crate::error::ApiError;
use crate::middleware::resolve_viewer;
use crate::state::AppState;
use crate::{auth, feed, posts, profile, social};

/// Build the router with every OTHer endpoint. Each request passes
/// through viewer resolution first.
pub fn build_router(state: AppState) -> Router {
    let avatars = ServeDir::new(&state.avatar_dir);

    Router::new()
        .route("/", get(|| async { Redirect::to("/feed") }))
        .route("/health", get(health))
        .route("/auth/register", post(auth::register))
        .route("/auth/login", post(auth::login))
        .route("/auth/logout", post(auth::logout))
        .route("/feed", get(feed::get_feed))
        .route("/feed/subscriptions", get(feed::get_subscriptions))
        .route("/search", post(social::search))
        .route("/users", get(social::list_users))
        .route("/users/{id}", get(profile::user_profile))
        .route(
            "/users/{id}/follow",
            post(social::follow_user).delete(social::unfollow_user),
        )
        .route("/posts", post(posts::create_post))
        .route("/posts/{id}", delete(posts::delete_post))
        .route("/me", get(profile::my_profile))
        .route("/me/bio", put(profile::update_bio))
        .route(
            "/me/avatar",
            put(profile::upload_avatar).layer(DefaultBodyLimit::max(profile::MAX_AVATAR_SIZE)),
        )
        .nest_service("/avatars", avatars)
        .fallback(not_found)
        .layer(middleware::from_fn_with_state(state.clone(), resolve_viewer))
        .with_state(state)
}

async fn not_found() -> ApiError {
    ApiError::NotFound("There is nothing here.".into())
}

async fn health() -> &'static str {
    "ok"
}
