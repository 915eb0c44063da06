//! Handler for `GET /health`.

use std::sync::Arc;

use axum::extract::State;
use chrono::{DateTime, Utc};
use eightd_core::store::Backend;
use serde::Serialize;

use crate::{envelope::Envelope, error::ApiError};

#[derive(Debug, Serialize)]
pub struct Health {
  pub status:    &'static str,
  pub database:  &'static str,
  pub timestamp: DateTime<Utc>,
  pub version:   &'static str,
}

/// `GET /health`, 503 when the datastore does not answer.
pub async fn handler<S>(State(store): State<Arc<S>>) -> Result<Envelope<Health>, ApiError>
where
  S: Backend,
{
  store
    .ping()
    .await
    .map_err(|e| ApiError::Unavailable(e.to_string()))?;

  Ok(Envelope::ok(
    Health {
      status:    "healthy",
      database:  "connected",
      timestamp: Utc::now(),
      version:   env!("CARGO_PKG_VERSION"),
    },
    "Success",
  ))
}
