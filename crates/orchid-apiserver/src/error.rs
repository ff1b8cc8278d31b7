//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use orchid_store_sqlite::Error as StoreError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("conflict: {0}")]
  Conflict(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Conflict(m) => (StatusCode::CONFLICT, m.clone()),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        (StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
      }
    };
    (status, Json(json!({ "error": message }))).into_response()
  }
}

impl From<orchid_core::Error> for ApiError {
  fn from(e: orchid_core::Error) -> Self { ApiError::BadRequest(e.to_string()) }
}

impl From<StoreError> for ApiError {
  fn from(e: StoreError) -> Self {
    match e {
      StoreError::Core(_)
      | StoreError::Validation(_)
      | StoreError::TypeMapping { .. }
      | StoreError::Extraction(_) => ApiError::BadRequest(e.to_string()),
      StoreError::UnregisteredKind(_) => ApiError::NotFound(e.to_string()),
      StoreError::AlreadyRegistered(_) => ApiError::Conflict(e.to_string()),
      other => ApiError::Store(Box::new(other)),
    }
  }
}
