use axum::{
    Extension, Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    response::IntoResponse,
};

use other_types::api::{SearchRequest, View};
use other_types::viewer::Viewer;

use crate::error::{ApiError, InView};
use crate::feed;
use crate::middleware::require_user;
use crate::state::{AppState, with_db};

/// POST /search: open to anonymous viewers, who get results without
/// follow buttons.
pub async fn search(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    body: Result<Json<SearchRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let form_view = if viewer.is_signed_in() {
        View::SearchLoggedIn
    } else {
        View::SearchNoSession
    };
    let Json(req) = body.in_view(form_view)?;

    let page = with_db(&state, move |db| feed::search(db, viewer, &req.search_field)).await?;
    Ok(Json(page))
}

/// GET /users
pub async fn list_users(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
) -> Result<impl IntoResponse, ApiError> {
    require_user(viewer, "see the other users")?;
    let page = with_db(&state, move |db| feed::user_listing(db, viewer)).await?;
    Ok(Json(page))
}

/// POST /users/{id}/follow: idempotent; answers with the refreshed
/// user listing.
pub async fn follow_user(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    Extension(viewer): Extension<Viewer>,
) -> Result<impl IntoResponse, ApiError> {
    let follower = require_user(viewer, "follow users")?;
    let Path(followee) = path?;

    let page = with_db(&state, move |db| {
        db.follow(follower, followee).in_view(View::Users)?;
        feed::user_listing(db, viewer)
    })
    .await?;

    Ok(Json(page))
}

/// DELETE /users/{id}/follow
pub async fn unfollow_user(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    Extension(viewer): Extension<Viewer>,
) -> Result<impl IntoResponse, ApiError> {
    let follower = require_user(viewer, "unfollow users")?;
    let Path(followee) = path?;

    let page = with_db(&state, move |db| {
        db.unfollow(follower, followee)?;
        feed::user_listing(db, viewer)
    })
    .await?;

    Ok(Json(page))
}
