use std::path::Path as FsPath;

use axum::{
    Extension, Json,
    body::Bytes,
    extract::{
        Path, Query, State,
        rejection::{BytesRejection, JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tracing::{error, warn};
use uuid::Uuid;

use other_db::DEFAULT_AVATAR;
use other_types::api::{UpdateBioRequest, View};
use other_types::viewer::Viewer;

use crate::error::{ApiError, InView};
use crate::feed;
use crate::middleware::require_user;
use crate::state::{AppState, with_db};

/// 5 MB upload limit for avatars
pub const MAX_AVATAR_SIZE: usize = 5 * 1024 * 1024;

const AVATAR_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "gif", "webp"];

const TOO_LARGE: &str = "The file is too large.";

#[derive(Debug, Deserialize)]
pub struct AvatarQuery {
    pub ext: String,
}

/// GET /me
pub async fn my_profile(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = require_user(viewer, "see your profile")?;
    let page = with_db(&state, move |db| feed::profile(db, viewer, user_id)).await?;
    Ok(Json(page))
}

/// GET /users/{id}
pub async fn user_profile(
    State(state): State<AppState>,
    path: Result<Path<i64>, PathRejection>,
    Extension(viewer): Extension<Viewer>,
) -> Result<impl IntoResponse, ApiError> {
    require_user(viewer, "see other users")?;
    let Path(user_id) = path?;
    let page = with_db(&state, move |db| feed::profile(db, viewer, user_id)).await?;
    Ok(Json(page))
}

/// PUT /me/bio
pub async fn update_bio(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    body: Result<Json<UpdateBioRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = require_user(viewer, "update your profile")?;
    let Json(req) = body.in_view(View::MyProfile)?;

    let page = with_db(&state, move |db| {
        db.update_bio(user_id, &req.bio)?;
        feed::profile(db, viewer, user_id)
    })
    .await?;

    Ok(Json(page))
}

/// PUT /me/avatar?ext=png: accepts the raw image bytes, stores them as
/// `{uuid}.{ext}` in the avatar directory and points the profile at that
/// file. The previous upload is removed once the profile is updated.
pub async fn upload_avatar(
    State(state): State<AppState>,
    Extension(viewer): Extension<Viewer>,
    query: Result<Query<AvatarQuery>, QueryRejection>,
    bytes: Result<Bytes, BytesRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let user_id = require_user(viewer, "update your profile")?;
    let Query(query) = query.in_view(View::MyProfile)?;
    let bytes = bytes.map_err(|rejection| {
        warn!("Rejected avatar upload: {}", rejection.body_text());
        if rejection.status() == StatusCode::PAYLOAD_TOO_LARGE {
            ApiError::validation(View::MyProfile, TOO_LARGE)
        } else {
            ApiError::validation(View::MyProfile, "The upload could not be read.")
        }
    })?;

    let ext = query.ext.to_ascii_lowercase();
    if !AVATAR_EXTENSIONS.contains(&ext.as_str()) {
        return Err(ApiError::validation(
            View::MyProfile,
            format!("Unsupported image type: {}", query.ext),
        ));
    }
    if bytes.is_empty() {
        return Err(ApiError::validation(View::MyProfile, "No file was uploaded."));
    }
    if bytes.len() > MAX_AVATAR_SIZE {
        return Err(ApiError::validation(View::MyProfile, TOO_LARGE));
    }

    tokio::fs::create_dir_all(&state.avatar_dir)
        .await
        .map_err(|e| {
            error!("Failed to create avatar directory: {}", e);
            ApiError::Internal(e.to_string())
        })?;

    let avatar_ref = format!("{}.{}", Uuid::new_v4(), ext);
    let file_path = state.avatar_dir.join(&avatar_ref);
    if let Err(e) = write_file(&file_path, &bytes).await {
        error!("Failed to write file {}: {}", file_path.display(), e);
        remove_avatar(&file_path).await;
        return Err(ApiError::Internal(e.to_string()));
    }

    let stored = avatar_ref.clone();
    let updated = with_db(&state, move |db| {
        let previous = db
            .get_user_by_id(user_id)?
            .ok_or_else(|| ApiError::NotFound(format!("User {} does not exist.", user_id)))?
            .avatar_ref;
        db.update_avatar(user_id, &stored)?;
        let page = feed::profile(db, viewer, user_id)?;
        Ok((previous, page))
    })
    .await;

    let (previous, page) = match updated {
        Ok(done) => done,
        Err(e) => {
            remove_avatar(&file_path).await;
            return Err(e);
        }
    };

    if previous != DEFAULT_AVATAR && previous != avatar_ref {
        remove_avatar(&state.avatar_dir.join(&previous)).await;
    }

    Ok(Json(page))
}

async fn write_file(path: &FsPath, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = tokio::fs::File::create(path).await?;
    file.write_all(bytes).await?;
    file.flush().await
}

async fn remove_avatar(path: &FsPath) {
    if let Err(e) = tokio::fs::remove_file(path).await {
        warn!("Failed to remove avatar {}: {}", path.display(), e);
    }
}
