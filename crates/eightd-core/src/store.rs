//! Repository traits for problems and root causes.
//!
//! The traits are implemented by storage backends (e.g.
//! `eightd-store-sqlite`). The HTTP layer depends on these abstractions, not
//! on any concrete backend. A backend value is constructed by the caller and
//! handed to whatever needs it; there is no global connection.

use std::future::Future;

use crate::{
  error::DomainError,
  problem::{NewProblem, Problem, ProblemFilter, ProblemPatch, ProblemStatistics},
  root_cause::{NewRootCause, RootCause, RootCausePatch},
  tree::{RootCauseNode, RootCauseTree},
};

/// Shared by every repository trait so a single backend has one error type.
///
/// All methods return `Send` futures so the traits can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait Backend: Send + Sync {
  type Error: std::error::Error + DomainError + Send + Sync + 'static;

  /// Cheap round-trip to the datastore, used by health checks.
  fn ping(&self) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

// ─── Problems ────────────────────────────────────────────────────────────────

pub trait ProblemRepository: Backend {
  /// Problems matching `filter`, newest first.
  fn list_problems(
    &self,
    filter: ProblemFilter,
  ) -> impl Future<Output = Result<Vec<Problem>, Self::Error>> + Send + '_;

  /// Retrieve a problem by id. Returns `None` if not found.
  fn get_problem(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<Problem>, Self::Error>> + Send + '_;

  /// Persist a new problem. `id` and `created_at` are set by the store.
  fn create_problem(
    &self,
    input: NewProblem,
  ) -> impl Future<Output = Result<Problem, Self::Error>> + Send + '_;

  /// Apply a sparse update. Returns `None` if the problem does not exist and
  /// fails with `EmptyUpdate` when `patch` carries no field.
  fn update_problem(
    &self,
    id: i64,
    patch: ProblemPatch,
  ) -> impl Future<Output = Result<Option<Problem>, Self::Error>> + Send + '_;

  /// Delete a problem together with all of its root causes. Returns `false`
  /// if nothing was deleted.
  fn delete_problem(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Total, open and closed problem counts.
  fn problem_statistics(
    &self,
  ) -> impl Future<Output = Result<ProblemStatistics, Self::Error>> + Send + '_;
}

// ─── Root causes ─────────────────────────────────────────────────────────────

pub trait RootCauseRepository: Backend {
  /// The problem's causes assembled into a forest.
  fn get_tree_by_problem_id(
    &self,
    problem_id: i64,
  ) -> impl Future<Output = Result<Vec<RootCauseNode>, Self::Error>> + Send + '_;

  /// The full tree payload for a problem, or `None` if the problem does not
  /// exist.
  fn root_cause_tree(
    &self,
    problem_id: i64,
  ) -> impl Future<Output = Result<Option<RootCauseTree>, Self::Error>> + Send + '_;

  /// The problem's causes as flat rows ordered by `(level, created_at, id)`.
  fn get_all_by_problem_id(
    &self,
    problem_id: i64,
  ) -> impl Future<Output = Result<Vec<RootCause>, Self::Error>> + Send + '_;

  /// Retrieve a cause by id. Returns `None` if not found.
  fn get_root_cause(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<Option<RootCause>, Self::Error>> + Send + '_;

  /// Persist a new cause below `input.parent_id` (or at the top level).
  ///
  /// Fails with a not-found error if the problem or parent is missing and
  /// with an integrity error if the parent belongs to another problem. The
  /// level is derived from the parent.
  fn create_root_cause(
    &self,
    input: NewRootCause,
  ) -> impl Future<Output = Result<RootCause, Self::Error>> + Send + '_;

  /// Apply a sparse update. Setting `is_root_cause` clears the flag on every
  /// other cause of the same problem. Returns `None` if the cause does not
  /// exist and fails with `EmptyUpdate` when `patch` carries no field.
  fn update_root_cause(
    &self,
    id: i64,
    patch: RootCausePatch,
  ) -> impl Future<Output = Result<Option<RootCause>, Self::Error>> + Send + '_;

  /// Flag `cause_id` as the problem's root cause with `action_plan`,
  /// clearing any previous flag on the problem in the same transaction.
  fn mark_as_root_cause(
    &self,
    problem_id: i64,
    cause_id: i64,
    action_plan: String,
  ) -> impl Future<Output = Result<RootCause, Self::Error>> + Send + '_;

  /// Delete a cause and its entire subtree. Returns `false` if nothing was
  /// deleted.
  fn delete_root_cause(
    &self,
    id: i64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// The cause currently flagged as root cause for the problem, if any.
  fn get_root_cause_by_problem_id(
    &self,
    problem_id: i64,
  ) -> impl Future<Output = Result<Option<RootCause>, Self::Error>> + Send + '_;

  /// Deepest level among the problem's causes, 0 when it has none.
  fn get_max_depth(
    &self,
    problem_id: i64,
  ) -> impl Future<Output = Result<u32, Self::Error>> + Send + '_;
}
