//! The JSON envelope wrapped around every API response.
//!
//! Success: `{"success": true, "message": ..., "data": ..., "timestamp": ...}`
//!
//! Failure: `{"success": false, "message": ..., "errors": {...} | null,
//! "timestamp": ...}`

use axum::{
  Json,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use eightd_core::FieldErrors;
use serde::Serialize;

#[derive(Serialize)]
struct SuccessBody<'a, T> {
  success:   bool,
  message:   &'a str,
  data:      T,
  timestamp: DateTime<Utc>,
}

#[derive(Serialize)]
struct FailureBody<'a> {
  success:   bool,
  message:   &'a str,
  errors:    Option<&'a FieldErrors>,
  timestamp: DateTime<Utc>,
}

/// A successful response carrying `data`.
#[derive(Debug)]
pub struct Envelope<T> {
  pub status:  StatusCode,
  pub message: String,
  pub data:    T,
}

impl<T> Envelope<T> {
  /// `200 OK`.
  pub fn ok(data: T, message: impl Into<String>) -> Self {
    Self { status: StatusCode::OK, message: message.into(), data }
  }

  /// `201 Created`.
  pub fn created(data: T, message: impl Into<String>) -> Self {
    Self { status: StatusCode::CREATED, message: message.into(), data }
  }
}

impl<T: Serialize> IntoResponse for Envelope<T> {
  fn into_response(self) -> Response {
    let body = SuccessBody {
      success:   true,
      message:   &self.message,
      data:      self.data,
      timestamp: Utc::now(),
    };
    (self.status, Json(body)).into_response()
  }
}

/// Render a failure envelope; used by [`crate::ApiError`].
pub(crate) fn failure(
  status: StatusCode,
  message: &str,
  errors: Option<&FieldErrors>,
) -> Response {
  let body = FailureBody { success: false, message, errors, timestamp: Utc::now() };
  (status, Json(body)).into_response()
}
