use axum::{
    Json,
    extract::{
        Query,
        rejection::{JsonRejection, PathRejection, QueryRejection},
    },
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;
use tracing::{error, warn};

use other_db::{DbError, DbResult};
use other_types::api::{ErrorPage, EventPage, Rendered, View};

#[derive(Debug, Error)]
pub enum ApiError {
    /// Bad user input. Re-renders `view` with the message; not a failure
    /// status.
    #[error("{message}")]
    Validation { view: View, message: String },

    #[error("invalid or expired token")]
    Unauthorized,

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn validation(view: View, message: impl Into<String>) -> Self {
        ApiError::Validation {
            view,
            message: message.into(),
        }
    }
}

impl From<DbError> for ApiError {
    fn from(e: DbError) -> Self {
        match e {
            DbError::Validation(message) => ApiError::Validation {
                view: View::Event,
                message,
            },
            DbError::Forbidden(msg) => ApiError::Forbidden(msg),
            DbError::NotFound(msg) => ApiError::NotFound(msg),
            other => ApiError::Store(other.to_string()),
        }
    }
}

/// Attach the view a validation failure should re-render.
pub trait InView<T> {
    fn in_view(self, view: View) -> Result<T, ApiError>;
}

impl<T> InView<T> for DbResult<T> {
    fn in_view(self, view: View) -> Result<T, ApiError> {
        self.map_err(|e| match e {
            DbError::Validation(message) => ApiError::Validation { view, message },
            other => other.into(),
        })
    }
}

/// Shown when a request body or query string cannot be read.
pub const MALFORMED_FORM: &str = "Please fill in every field of the form.";

impl<T> InView<Json<T>> for Result<Json<T>, JsonRejection> {
    fn in_view(self, view: View) -> Result<Json<T>, ApiError> {
        self.map_err(|rejection| {
            warn!("Rejected request body: {}", rejection.body_text());
            ApiError::validation(view, MALFORMED_FORM)
        })
    }
}

impl<T> InView<Query<T>> for Result<Query<T>, QueryRejection> {
    fn in_view(self, view: View) -> Result<Query<T>, ApiError> {
        self.map_err(|rejection| {
            warn!("Rejected query string: {}", rejection.body_text());
            ApiError::validation(view, MALFORMED_FORM)
        })
    }
}

/// Path ids that do not parse name nothing that exists.
impl From<PathRejection> for ApiError {
    fn from(rejection: PathRejection) -> Self {
        ApiError::NotFound(rejection.body_text())
    }
}

fn event(status: StatusCode, title: &str, error: String) -> Response {
    let body = Rendered::new(
        View::Event,
        EventPage {
            title: title.to_string(),
            message: None,
            error: Some(error),
        },
    );
    (status, Json(body)).into_response()
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::Validation { view, message } => {
                (StatusCode::OK, Json(Rendered::new(view, ErrorPage { error: message })))
                    .into_response()
            }
            ApiError::Unauthorized => event(
                StatusCode::UNAUTHORIZED,
                "Not signed in",
                "Your session is invalid or has expired.".into(),
            ),
            ApiError::Forbidden(msg) => event(StatusCode::FORBIDDEN, "Access denied", msg),
            ApiError::NotFound(msg) => event(StatusCode::NOT_FOUND, "Not found", msg),
            ApiError::Store(msg) | ApiError::Internal(msg) => {
                error!("Request failed: {}", msg);
                event(
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Something went wrong",
                    "Internal server error".into(),
                )
            }
        }
    }
}
