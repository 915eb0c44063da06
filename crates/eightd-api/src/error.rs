//! API error type and [`axum::response::IntoResponse`] implementation.

use axum::{
  extract::rejection::{JsonRejection, PathRejection, QueryRejection},
  http::StatusCode,
  response::{IntoResponse, Response},
};
use eightd_core::{DomainError, ErrorKind, FieldErrors, problem::INVALID_STATUS};
use thiserror::Error;

use crate::envelope::failure;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("not found: {0}")]
  NotFound(String),

  #[error("bad request: {0}")]
  BadRequest(String),

  #[error("validation failed: {0}")]
  Validation(FieldErrors),

  #[error("integrity violation: {0}")]
  Integrity(String),

  #[error("service unavailable: {0}")]
  Unavailable(String),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl ApiError {
  /// Classify a backend error, surfacing its domain error where it has one.
  pub fn from_store<E>(e: E) -> Self
  where
    E: std::error::Error + DomainError + Send + Sync + 'static,
  {
    match e.domain() {
      Some(domain) => Self::from_domain(domain),
      None => Self::Store(Box::new(e)),
    }
  }

  fn from_domain(e: &eightd_core::Error) -> Self {
    match (e.kind(), e) {
      (_, eightd_core::Error::Validation(fields)) => Self::Validation(fields.clone()),
      (_, eightd_core::Error::UnknownStatus(_)) => {
        Self::Validation(single_field_error("status", INVALID_STATUS.into()))
      }
      (ErrorKind::Validation, other) => {
        Self::Validation(single_field_error("input", other.to_string()))
      }
      (ErrorKind::NotFound, other) => Self::NotFound(other.to_string()),
      (ErrorKind::Integrity, other) => Self::Integrity(other.to_string()),
      (ErrorKind::EmptyUpdate, other) => Self::BadRequest(other.to_string()),
    }
  }
}

fn single_field_error(field: &str, message: String) -> FieldErrors {
  let mut errors = FieldErrors::new();
  errors.add(field, message);
  errors
}

impl From<eightd_core::Error> for ApiError {
  fn from(e: eightd_core::Error) -> Self { Self::from_domain(&e) }
}

impl From<JsonRejection> for ApiError {
  fn from(e: JsonRejection) -> Self {
    Self::BadRequest(format!("Invalid JSON input: {}", e.body_text()))
  }
}

impl From<PathRejection> for ApiError {
  fn from(e: PathRejection) -> Self { Self::BadRequest(e.body_text()) }
}

impl From<QueryRejection> for ApiError {
  fn from(e: QueryRejection) -> Self { Self::BadRequest(e.body_text()) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    match &self {
      ApiError::NotFound(m) => failure(StatusCode::NOT_FOUND, m, None),
      ApiError::BadRequest(m) | ApiError::Integrity(m) => {
        failure(StatusCode::BAD_REQUEST, m, None)
      }
      ApiError::Validation(fields) => failure(
        StatusCode::UNPROCESSABLE_ENTITY,
        "Validation failed",
        Some(fields),
      ),
      ApiError::Unavailable(detail) => failure(
        StatusCode::SERVICE_UNAVAILABLE,
        "Service Unavailable",
        Some(&single_field_error("detail", detail.clone())),
      ),
      ApiError::Store(e) => {
        tracing::error!(error = %e, "store failure");
        failure(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string(), None)
      }
    }
  }
}
