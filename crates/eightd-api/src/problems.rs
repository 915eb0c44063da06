//! Handlers for `/problems` endpoints.
//!
//! | Method   | Path | Notes |
//! |----------|------|-------|
//! | `GET`    | `/problems` | Optional `?status=open\|closed` and `?team=<name>` |
//! | `GET`    | `/problems/statistics` | Total / open / closed counts |
//! | `GET`    | `/problems/{id}` | 404 if not found |
//! | `POST`   | `/problems` | Body: [`ProblemInput`]; returns 201 |
//! | `PUT`    | `/problems/{id}` | Sparse body: [`ProblemInput`] |
//! | `DELETE` | `/problems/{id}` | Cascades to the problem's root causes |

use std::sync::Arc;

use axum::{
  Json,
  extract::{
    Path, Query, State,
    rejection::{JsonRejection, PathRejection, QueryRejection},
  },
};
use eightd_core::{
  problem::{Problem, ProblemFilter, ProblemInput, ProblemStatistics, ProblemStatus},
  store::ProblemRepository,
};
use serde::{Deserialize, Serialize};

use crate::{envelope::Envelope, error::ApiError};

// ─── List ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct ListParams {
  pub status: Option<String>,
  #[serde(alias = "responsible_team")]
  pub team:   Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ProblemList {
  pub problems: Vec<Problem>,
  pub count:    usize,
}

/// `GET /problems[?status=<status>][&team=<team>]`
pub async fn list<S>(
  State(store): State<Arc<S>>,
  params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Envelope<ProblemList>, ApiError>
where
  S: ProblemRepository,
{
  let Query(params) = params?;
  let filter = ProblemFilter {
    status:           params
      .status
      .as_deref()
      .map(ProblemStatus::parse)
      .transpose()?,
    responsible_team: params.team,
  };

  let problems = store
    .list_problems(filter)
    .await
    .map_err(ApiError::from_store)?;
  let count = problems.len();
  Ok(Envelope::ok(ProblemList { problems, count }, "Success"))
}

// ─── Statistics ───────────────────────────────────────────────────────────────

/// `GET /problems/statistics`
pub async fn statistics<S>(
  State(store): State<Arc<S>>,
) -> Result<Envelope<ProblemStatistics>, ApiError>
where
  S: ProblemRepository,
{
  let stats = store
    .problem_statistics()
    .await
    .map_err(ApiError::from_store)?;
  Ok(Envelope::ok(stats, "Success"))
}

// ─── Get one ──────────────────────────────────────────────────────────────────

/// `GET /problems/{id}`
pub async fn get_one<S>(
  State(store): State<Arc<S>>,
  id: Result<Path<i64>, PathRejection>,
) -> Result<Envelope<Problem>, ApiError>
where
  S: ProblemRepository,
{
  let Path(id) = id?;
  let problem = store
    .get_problem(id)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound("Problem not found".into()))?;
  Ok(Envelope::ok(problem, "Success"))
}

// ─── Create ───────────────────────────────────────────────────────────────────

/// `POST /problems` returns 201 + the stored [`Problem`].
pub async fn create<S>(
  State(store): State<Arc<S>>,
  body: Result<Json<ProblemInput>, JsonRejection>,
) -> Result<Envelope<Problem>, ApiError>
where
  S: ProblemRepository,
{
  let Json(body) = body?;
  let input = body.into_new()?;

  let problem = store
    .create_problem(input)
    .await
    .map_err(ApiError::from_store)?;
  Ok(Envelope::created(problem, "Problem created successfully"))
}

// ─── Update ───────────────────────────────────────────────────────────────────

/// `PUT /problems/{id}`: only the supplied fields change.
pub async fn update<S>(
  State(store): State<Arc<S>>,
  id: Result<Path<i64>, PathRejection>,
  body: Result<Json<ProblemInput>, JsonRejection>,
) -> Result<Envelope<Problem>, ApiError>
where
  S: ProblemRepository,
{
  let Path(id) = id?;
  let Json(body) = body?;
  let patch = body.into_patch()?;

  let problem = store
    .update_problem(id, patch)
    .await
    .map_err(ApiError::from_store)?
    .ok_or_else(|| ApiError::NotFound("Problem not found".into()))?;
  Ok(Envelope::ok(problem, "Problem updated successfully"))
}

// ─── Delete ───────────────────────────────────────────────────────────────────

/// `DELETE /problems/{id}`
pub async fn delete_one<S>(
  State(store): State<Arc<S>>,
  id: Result<Path<i64>, PathRejection>,
) -> Result<Envelope<()>, ApiError>
where
  S: ProblemRepository,
{
  let Path(id) = id?;
  let deleted = store
    .delete_problem(id)
    .await
    .map_err(ApiError::from_store)?;
  if !deleted {
    return Err(ApiError::NotFound("Problem not found".into()));
  }
  Ok(Envelope::ok((), "Problem deleted successfully"))
}
