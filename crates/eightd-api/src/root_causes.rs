//! Handlers for root-cause endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/problems/{problem_id}/root-causes` | Tree payload ([`RootCauseTree`]) |
//! | `POST`   | `/problems/{problem_id}/root-causes/{id}/mark` | Body: `{"action_plan":"..."}` |
//! | `GET`    | `/root-causes/{id}` | Single cause |
//! | `POST`   | `/root-causes` | Body: [`RootCauseInput`]; returns 201 |
//! | `PUT`    | `/root-causes/{id}` | Sparse `cause_text` / `is_root_cause` / `action_plan` |
//! | `DELETE` | `/root-causes/{id}` | Removes the whole subtree |

use std::sync::Arc;

use axum::{
  Json,
  extract::{
    Path, State,
    rejection::{JsonRejection, PathRejection},
  },
};
use eightd_core::{
  root_cause::{RootCause, RootCauseInput},
  store::RootCauseRepository,
  tree::RootCauseTree,
};
use serde::Deserialize;

use crate::{envelope::Envelope, error::ApiError};

fn not_found() -> ApiError { ApiError::NotFound("Root cause not found".into()) }

// ─── Tree ─────────────────────────────────────────────────────────────────────

/// `GET /problems/{problem_id}/root-causes`
pub async fn tree<S>(
  State(store): State<Arc<S>>,
  problem_id: Result<Path<i64>, PathRejection>,
) -> Result<Envelope<RootCauseTree>, ApiError>
where
  S: RootCauseRepository,
{
  let Path(problem_id) = problem_id?;
  let tree = store
    .root_cause_tree(problem_id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound("Problem not found".into()))?;
  Ok(Envelope::ok(tree, "Success"))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /root-causes/{id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  id: Result<Path<i64>, PathRejection>,
) -> Result<Envelope<RootCause>, ApiError>
where
  S: RootCauseRepository,
{
  let Path(id) = id?;
  let cause = store
    .get_root_cause(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(not_found)?;
  Ok(Envelope::ok(cause, "Success"))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /root-causes` returns 201 + the stored [`RootCause`] with its
/// computed `level`.
pub async fn create<S>(
  State(store): State<Arc<S>>,
  body: Result<Json<RootCauseInput>, JsonRejection>,
) -> Result<Envelope<RootCause>, ApiError>
where
  S: RootCauseRepository,
{
  let Json(body) = body?;
  let input = body.into_new()?;

  let cause = store
    .create_root_cause(input)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Envelope::created(cause, "Root cause created successfully"))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PUT /root-causes/{id}`. Tree position fields in the body are ignored.
pub async fn update<S>(
  State(store): State<Arc<S>>,
  id: Result<Path<i64>, PathRejection>,
  body: Result<Json<RootCauseInput>, JsonRejection>,
) -> Result<Envelope<RootCause>, ApiError>
where
  S: RootCauseRepository,
{
  let Path(id) = id?;
  let Json(body) = body?;
  let patch = body.into_patch()?;

  let cause = store
    .update_root_cause(id, patch)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(not_found)?;
  Ok(Envelope::ok(cause, "Root cause updated successfully"))
}

// ─── Mark ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct MarkBody {
  #[serde(default)]
  pub action_plan: String,
}

/// `POST /problems/{problem_id}/root-causes/{id}/mark`
pub async fn mark<S>(
  State(store): State<Arc<S>>,
  ids: Result<Path<(i64, i64)>, PathRejection>,
  body: Result<Json<MarkBody>, JsonRejection>,
) -> Result<Envelope<RootCause>, ApiError>
where
  S: RootCauseRepository,
{
  let Path((problem_id, id)) = ids?;
  let Json(body) = body?;

  let cause = store
    .mark_as_root_cause(problem_id, id, body.action_plan)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Envelope::ok(cause, "Root cause identified"))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /root-causes/{id}`
pub async fn delete_one<S>(
  State(store): State<Arc<S>>,
  id: Result<Path<i64>, PathRejection>,
) -> Result<Envelope<()>, ApiError>
where
  S: RootCauseRepository,
{
  let Path(id) = id?;
  let deleted = store
    .delete_root_cause(id)
    .await
    .map_err(ApiError::from_store)?;
  if !deleted {
    return Err(not_found());
  }
  Ok(Envelope::ok(
    (),
    "Root cause deleted successfully (including children)",
  ))
}
