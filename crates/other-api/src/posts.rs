use axum::{
    Extension, Json,
    extract::{
        Path, State,
        rejection::{JsonRejection, PathRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};

use other_types::api::{CreatePostRequest, PostedPage, Rendered, View};
use other_types::viewer::Viewer;

use crate::error::{ApiError, InView};
use crate::feed;
use crate::middleware::require_user;
use crate::state::{AppState, with_db};

/// POST /posts: publish an other and echo it back with its author.
pub async fn create_post(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    body: Result<Json<CreatePostRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let author_id = require_user(viewer, "post")?;
    let Json(req) = body.in_view(View::Othern)?;

    let page = with_db(&state, move |db| {
        let just_sent = db.create_post(author_id, &req.text).in_view(View::Othern)?;
        let user = db
            .get_user_by_id(author_id)?
            .ok_or_else(|| ApiError::NotFound(format!("User {} does not exist.", author_id)))?;
        Ok(PostedPage { user, just_sent })
    })
    .await?;

    Ok((StatusCode::CREATED, Json(Rendered::new(View::Othern, page))))
}

/// DELETE /posts/{id}: remove one of the viewer's own posts, then show
/// their profile.
pub async fn delete_post(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    Extension(viewer): Extension<Viewer>,
) -> Result<impl IntoResponse, ApiError> {
    let requester_id = require_user(viewer, "delete posts")?;
    let Path(post_id) = path?;

    let page = with_db(&state, move |db| {
        db.delete_post(post_id, requester_id)?;
        feed::profile(db, viewer, requester_id)
    })
    .await?;

    Ok(Json(page))
}
