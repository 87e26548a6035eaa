use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use axum_extra::{
    TypedHeader,
    headers::{Authorization, authorization::Bearer},
    typed_header::TypedHeaderRejection,
};
use jsonwebtoken::{DecodingKey, Validation, decode};
use tracing::warn;

use other_types::api::Claims;
use other_types::viewer::Viewer;

use crate::error::ApiError;
use crate::state::AppState;

/// Resolve the viewer for every request. No Authorization header means
/// anonymous; a header that is not a valid bearer token is rejected.
pub async fn resolve_viewer(
    State(state): State<AppState>,
    bearer: Result<TypedHeader<Authorization<Bearer>>, TypedHeaderRejection>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let viewer = match bearer {
        Ok(TypedHeader(Authorization(bearer))) => {
            let claims = decode_token(&state.jwt_secret, bearer.token())?;
            Viewer::User(claims.sub)
        }
        Err(rejection) if rejection.is_missing() => Viewer::Anonymous,
        Err(rejection) => {
            warn!("Rejected Authorization header: {}", rejection);
            return Err(ApiError::Unauthorized);
        }
    };

    req.extensions_mut().insert(viewer);
    Ok(next.run(req).await)
}

pub fn decode_token(secret: &str, token: &str) -> Result<Claims, ApiError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|e| {
        warn!("Rejected bearer token: {}", e);
        ApiError::Unauthorized
    })
}

/// The signed-in user's id, or an access-denied error naming `action`.
pub fn require_user(viewer: Viewer, action: &str) -> Result<i64, ApiError> {
    viewer.user_id().ok_or_else(|| {
        warn!("Anonymous request tried to {}", action);
        ApiError::Forbidden(format!("You must be signed in to {}.", action))
    })
}
