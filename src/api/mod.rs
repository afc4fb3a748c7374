use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
    Json, Router,
};
use serde_json::json;
use thiserror::Error;

use crate::auth::AuthError;
use crate::store::StoreError;
use crate::AppState;

pub mod greeting;
pub mod resource;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("No input data provided")]
    NoInput,
    #[error("Malformed request body: {0}")]
    Malformed(String),
    #[error("{0}")]
    Validation(String),
    #[error("Invalid resource identifier: {0}")]
    BadIdentifier(String),
    #[error("Unable to find entry with identifier {0} in database")]
    NotFound(i64),
    #[error("Unable to find requested resource")]
    Gone,
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match self {
            ApiError::Auth(e) => return e.into_response(),
            ApiError::NoInput | ApiError::Malformed(_) | ApiError::BadIdentifier(_) => {
                StatusCode::BAD_REQUEST
            }
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Gone => StatusCode::GONE,
            ApiError::Store(ref e) => {
                tracing::error!("{}", e);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };
        let message = match self {
            ApiError::Store(_) => "Internal server error".to_owned(),
            other => other.to_string(),
        };
        let body = Json(json!({
            "status": status.as_u16(),
            "message": message,
        }));
        (status, body).into_response()
    }
}

async fn healthz() -> Json<serde_json::Value> {
    Json(json!({ "code": 200, "message": "OK" }))
}

/// Every JSON endpoint, each reachable with and without a trailing slash.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/healthz/", get(healthz))
        .route("/api/greeting/v1", get(greeting::v1))
        .route("/api/greeting/v1/", get(greeting::v1))
        .route("/api/greeting/v2", get(greeting::v2))
        .route("/api/greeting/v2/", get(greeting::v2))
        .route("/api/greeting/v3", get(greeting::v3))
        .route("/api/greeting/v3/", get(greeting::v3))
        .route(
            "/api/resource/v1",
            get(resource::get_all).post(resource::create),
        )
        .route(
            "/api/resource/v1/",
            get(resource::get_all).post(resource::create),
        )
        .route(
            "/api/resource/v1/:id",
            get(resource::get_one)
                .put(resource::modify)
                .delete(resource::remove),
        )
}
