//! [`SqliteStore`]: the SQLite implementation of the repository traits.

use std::path::Path;

use chrono::Utc;
use eightd_core::{
  Error as CoreError,
  problem::{NewProblem, Problem, ProblemFilter, ProblemPatch, ProblemStatistics},
  root_cause::{NewRootCause, RootCause, RootCausePatch, level_for, validate_action_plan},
  store::{Backend, ProblemRepository, RootCauseRepository},
  tree::{self, RootCauseNode, RootCauseTree},
};
use rusqlite::{OptionalExtension as _, Transaction, TransactionBehavior};

use crate::{
  Error, Result,
  encode::{
    PROBLEM_COLUMNS, ROOT_CAUSE_COLUMNS, RawProblem, RawRootCause, encode_dt,
    encode_status,
  },
  schema::SCHEMA,
};

/// Outcome of a database closure that may also reject the request on domain
/// grounds. Returning the domain error as a value lets the closure bail out
/// and roll back its transaction without abusing the driver's error type.
type Checked<T> = std::result::Result<T, CoreError>;

// ─── Store ───────────────────────────────────────────────────────────────────

/// An 8D store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted. All calls
/// are serialised on the connection's worker thread.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, used by tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Transaction helpers ─────────────────────────────────────────────────────

fn select_root_cause(
  tx: &Transaction<'_>,
  id: i64,
) -> rusqlite::Result<Option<RawRootCause>> {
  tx.query_row(
    &format!("SELECT {ROOT_CAUSE_COLUMNS} FROM root_causes WHERE id = ?1"),
    rusqlite::params![id],
    RawRootCause::from_row,
  )
  .optional()
}

/// Drop the root-cause flag (and its action plan) from every cause of the
/// problem.
fn clear_marks(tx: &Transaction<'_>, problem_id: i64) -> rusqlite::Result<usize> {
  tx.execute(
    "UPDATE root_causes SET is_root_cause = 0, action_plan = NULL
     WHERE problem_id = ?1",
    rusqlite::params![problem_id],
  )
}

// ─── Backend impl ────────────────────────────────────────────────────────────

impl Backend for SqliteStore {
  type Error = Error;

  async fn ping(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── ProblemRepository impl ──────────────────────────────────────────────────

impl ProblemRepository for SqliteStore {
  async fn list_problems(&self, filter: ProblemFilter) -> Result<Vec<Problem>> {
    let status = filter.status.map(encode_status);
    let team = filter.responsible_team;

    let raws: Vec<RawProblem> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {PROBLEM_COLUMNS} FROM problems
           WHERE (?1 IS NULL OR status = ?1)
             AND (?2 IS NULL OR responsible_team = ?2)
           ORDER BY created_at DESC, id DESC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![status, team], RawProblem::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawProblem::into_problem).collect()
  }

  async fn get_problem(&self, id: i64) -> Result<Option<Problem>> {
    let raw: Option<RawProblem> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {PROBLEM_COLUMNS} FROM problems WHERE id = ?1"),
              rusqlite::params![id],
              RawProblem::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawProblem::into_problem).transpose()
  }

  async fn create_problem(&self, input: NewProblem) -> Result<Problem> {
    let at_str = encode_dt(Utc::now());
    let status_str = encode_status(input.status);
    let NewProblem { title, description, responsible_team: team, .. } = input;

    let id = self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO problems (title, description, responsible_team, status, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![title, description, team, status_str, at_str],
        )?;
        Ok(conn.last_insert_rowid())
      })
      .await?;

    tracing::debug!(id, "created problem");

    // Round-trip the timestamp through its stored form so callers see exactly
    // what a later read returns.
    let stored = self.get_problem(id).await?;
    stored.ok_or(Error::Core(CoreError::ProblemNotFound(id)))
  }

  async fn update_problem(&self, id: i64, patch: ProblemPatch) -> Result<Option<Problem>> {
    if self.get_problem(id).await?.is_none() {
      return Ok(None);
    }
    if patch.is_empty() {
      return Err(CoreError::EmptyUpdate.into());
    }

    let status = patch.status.map(encode_status);
    let ProblemPatch { title, description, responsible_team, .. } = patch;

    self
      .conn
      .call(move |conn| {
        conn.execute(
          "UPDATE problems SET
             title            = COALESCE(?1, title),
             description      = COALESCE(?2, description),
             responsible_team = COALESCE(?3, responsible_team),
             status           = COALESCE(?4, status)
           WHERE id = ?5",
          rusqlite::params![title, description, responsible_team, status, id],
        )?;
        Ok(())
      })
      .await?;

    tracing::debug!(id, "updated problem");
    self.get_problem(id).await
  }

  async fn delete_problem(&self, id: i64) -> Result<bool> {
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM problems WHERE id = ?1", rusqlite::params![id])?)
      })
      .await?;

    tracing::debug!(id, deleted, "deleted problem");
    Ok(deleted > 0)
  }

  async fn problem_statistics(&self) -> Result<ProblemStatistics> {
    let (total, open, closed): (i64, i64, i64) = self
      .conn
      .call(|conn| {
        Ok(conn.query_row(
          "SELECT COUNT(*),
                  COALESCE(SUM(status = 'open'), 0),
                  COALESCE(SUM(status = 'closed'), 0)
           FROM problems",
          [],
          |row| Ok((row.get(0)?, row.get(1)?, row.get(2)?)),
        )?)
      })
      .await?;

    Ok(ProblemStatistics {
      total:        total as u64,
      open_count:   open as u64,
      closed_count: closed as u64,
    })
  }
}

// ─── RootCauseRepository impl ────────────────────────────────────────────────

impl RootCauseRepository for SqliteStore {
  async fn get_tree_by_problem_id(&self, problem_id: i64) -> Result<Vec<RootCauseNode>> {
    let rows = self.get_all_by_problem_id(problem_id).await?;
    Ok(tree::build_tree(&rows, None))
  }

  async fn root_cause_tree(&self, problem_id: i64) -> Result<Option<RootCauseTree>> {
    if self.get_problem(problem_id).await?.is_none() {
      return Ok(None);
    }

    let rows = self.get_all_by_problem_id(problem_id).await?;
    let orphans = tree::orphaned_rows(&rows);
    if !orphans.is_empty() {
      let ids: Vec<i64> = orphans.iter().map(|row| row.id).collect();
      tracing::warn!(problem_id, ?ids, "root causes unreachable from the tree top level");
    }

    Ok(Some(RootCauseTree::from_rows(problem_id, &rows)))
  }

  async fn get_all_by_problem_id(&self, problem_id: i64) -> Result<Vec<RootCause>> {
    let raws: Vec<RawRootCause> = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(&format!(
          "SELECT {ROOT_CAUSE_COLUMNS} FROM root_causes
           WHERE problem_id = ?1
           ORDER BY level ASC, created_at ASC, id ASC"
        ))?;
        let rows = stmt
          .query_map(rusqlite::params![problem_id], RawRootCause::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRootCause::into_root_cause).collect()
  }

  async fn get_root_cause(&self, id: i64) -> Result<Option<RootCause>> {
    let raw: Option<RawRootCause> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!("SELECT {ROOT_CAUSE_COLUMNS} FROM root_causes WHERE id = ?1"),
              rusqlite::params![id],
              RawRootCause::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRootCause::into_root_cause).transpose()
  }

  async fn create_root_cause(&self, input: NewRootCause) -> Result<RootCause> {
    let at_str = encode_dt(Utc::now());
    let NewRootCause { problem_id, parent_id, cause_text, is_root_cause, action_plan } =
      input;

    let raw = self
      .conn
      .call(move |conn| -> Result<Checked<RawRootCause>, tokio_rusqlite::Error> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let problem_exists = tx
          .query_row(
            "SELECT 1 FROM problems WHERE id = ?1",
            rusqlite::params![problem_id],
            |_| Ok(()),
          )
          .optional()?
          .is_some();
        if !problem_exists {
          return Ok(Err(CoreError::ProblemNotFound(problem_id)));
        }

        let parent_level = match parent_id {
          None => None,
          Some(pid) => {
            let parent: Option<(i64, u32)> = tx
              .query_row(
                "SELECT problem_id, level FROM root_causes WHERE id = ?1",
                rusqlite::params![pid],
                |row| Ok((row.get(0)?, row.get(1)?)),
              )
              .optional()?;
            match parent {
              None => return Ok(Err(CoreError::ParentNotFound(pid))),
              Some((parent_problem_id, _)) if parent_problem_id != problem_id => {
                return Ok(Err(CoreError::ParentProblemMismatch {
                  parent_id: pid,
                  parent_problem_id,
                  problem_id,
                }));
              }
              Some((_, level)) => Some(level),
            }
          }
        };

        if is_root_cause {
          clear_marks(&tx, problem_id)?;
        }

        tx.execute(
          "INSERT INTO root_causes
             (problem_id, parent_id, cause_text, is_root_cause, action_plan, level, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            problem_id,
            parent_id,
            cause_text,
            is_root_cause,
            action_plan,
            level_for(parent_level),
            at_str,
          ],
        )?;
        let id = tx.last_insert_rowid();
        let raw = select_root_cause(&tx, id)?;
        tx.commit()?;

        Ok(raw.ok_or(CoreError::RootCauseNotFound(id)))
      })
      .await??;

    tracing::debug!(id = raw.id, problem_id, level = raw.level, "created root cause");
    raw.into_root_cause()
  }

  async fn update_root_cause(
    &self,
    id: i64,
    patch: RootCausePatch,
  ) -> Result<Option<RootCause>> {
    let raw = self
      .conn
      .call(move |conn| -> Result<Checked<Option<RawRootCause>>, tokio_rusqlite::Error> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let Some(existing) = select_root_cause(&tx, id)? else {
          return Ok(Ok(None));
        };
        if patch.is_empty() {
          return Ok(Err(CoreError::EmptyUpdate));
        }

        let marks = patch.marks_root_cause();
        let ends_marked = patch.is_root_cause.unwrap_or(existing.is_root_cause);
        let plan = if marks {
          patch.action_plan.as_deref()
        } else {
          patch.action_plan.as_deref().or(existing.action_plan.as_deref())
        };
        if ends_marked && plan.is_none_or(|p| p.trim().is_empty()) {
          return Ok(Err(CoreError::field(
            "action_plan",
            "Action plan is required when marking as root cause",
          )));
        }

        if marks {
          clear_marks(&tx, existing.problem_id)?;
        }

        tx.execute(
          "UPDATE root_causes SET
             cause_text    = COALESCE(?1, cause_text),
             is_root_cause = COALESCE(?2, is_root_cause),
             action_plan   = COALESCE(?3, action_plan)
           WHERE id = ?4",
          rusqlite::params![patch.cause_text, patch.is_root_cause, patch.action_plan, id],
        )?;
        let raw = select_root_cause(&tx, id)?;
        tx.commit()?;

        Ok(Ok(raw))
      })
      .await??;

    tracing::debug!(id, "updated root cause");
    raw.map(RawRootCause::into_root_cause).transpose()
  }

  async fn mark_as_root_cause(
    &self,
    problem_id: i64,
    cause_id: i64,
    action_plan: String,
  ) -> Result<RootCause> {
    validate_action_plan(&action_plan)?;

    let raw = self
      .conn
      .call(move |conn| -> Result<Checked<RawRootCause>, tokio_rusqlite::Error> {
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

        let owner: Option<i64> = tx
          .query_row(
            "SELECT problem_id FROM root_causes WHERE id = ?1",
            rusqlite::params![cause_id],
            |row| row.get(0),
          )
          .optional()?;
        match owner {
          None => return Ok(Err(CoreError::RootCauseNotFound(cause_id))),
          Some(owner) if owner != problem_id => {
            return Ok(Err(CoreError::CauseProblemMismatch { cause_id, problem_id }));
          }
          Some(_) => {}
        }

        clear_marks(&tx, problem_id)?;
        tx.execute(
          "UPDATE root_causes SET is_root_cause = 1, action_plan = ?1 WHERE id = ?2",
          rusqlite::params![action_plan, cause_id],
        )?;
        let raw = select_root_cause(&tx, cause_id)?;
        tx.commit()?;

        Ok(raw.ok_or(CoreError::RootCauseNotFound(cause_id)))
      })
      .await??;

    tracing::debug!(problem_id, cause_id, "marked root cause");
    raw.into_root_cause()
  }

  async fn delete_root_cause(&self, id: i64) -> Result<bool> {
    // Descendants go with it through the self-referencing ON DELETE CASCADE.
    let deleted = self
      .conn
      .call(move |conn| {
        Ok(conn.execute("DELETE FROM root_causes WHERE id = ?1", rusqlite::params![id])?)
      })
      .await?;

    tracing::debug!(id, deleted, "deleted root cause");
    Ok(deleted > 0)
  }

  async fn get_root_cause_by_problem_id(&self, problem_id: i64) -> Result<Option<RootCause>> {
    let raw: Option<RawRootCause> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              &format!(
                "SELECT {ROOT_CAUSE_COLUMNS} FROM root_causes
                 WHERE problem_id = ?1 AND is_root_cause = 1
                 LIMIT 1"
              ),
              rusqlite::params![problem_id],
              RawRootCause::from_row,
            )
            .optional()?,
        )
      })
      .await?;

    raw.map(RawRootCause::into_root_cause).transpose()
  }

  async fn get_max_depth(&self, problem_id: i64) -> Result<u32> {
    let depth: i64 = self
      .conn
      .call(move |conn| {
        Ok(conn.query_row(
          "SELECT COALESCE(MAX(level), 0) FROM root_causes WHERE problem_id = ?1",
          rusqlite::params![problem_id],
          |row| row.get(0),
        )?)
      })
      .await?;

    u32::try_from(depth).map_err(|_| Error::Decode(format!("max level {depth}")))
  }
}
