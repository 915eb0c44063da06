//! Encoding and decoding helpers between Rust domain types and the plain
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as RFC 3339 strings with a fixed microsecond
//! precision and a `Z` suffix, so text ordering matches time ordering.
//! Booleans are stored as `0`/`1`.

use chrono::{DateTime, SecondsFormat, Utc};
use eightd_core::{
  problem::{Problem, ProblemStatus},
  root_cause::RootCause,
};

use crate::{Error, Result};

// ─── DateTime<Utc> ───────────────────────────────────────────────────────────

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

// ─── ProblemStatus ───────────────────────────────────────────────────────────

pub fn encode_status(s: ProblemStatus) -> &'static str {
  match s {
    ProblemStatus::Open => "open",
    ProblemStatus::Closed => "closed",
  }
}

pub fn decode_status(s: &str) -> Result<ProblemStatus> {
  ProblemStatus::parse(s).map_err(|e| Error::Decode(e.to_string()))
}

// ─── Column lists ────────────────────────────────────────────────────────────

pub const PROBLEM_COLUMNS: &str =
  "id, title, description, responsible_team, status, created_at";

pub const ROOT_CAUSE_COLUMNS: &str = "id, problem_id, parent_id, cause_text, \
                                      is_root_cause, action_plan, level, \
                                      created_at";

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `problems` row.
pub struct RawProblem {
  pub id:               i64,
  pub title:            String,
  pub description:      String,
  pub responsible_team: String,
  pub status:           String,
  pub created_at:       String,
}

impl RawProblem {
  /// Read a row selected with [`PROBLEM_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:               row.get(0)?,
      title:            row.get(1)?,
      description:      row.get(2)?,
      responsible_team: row.get(3)?,
      status:           row.get(4)?,
      created_at:       row.get(5)?,
    })
  }

  pub fn into_problem(self) -> Result<Problem> {
    Ok(Problem {
      id:               self.id,
      title:            self.title,
      description:      self.description,
      responsible_team: self.responsible_team,
      status:           decode_status(&self.status)?,
      created_at:       decode_dt(&self.created_at)?,
    })
  }
}

/// Raw values read directly from a `root_causes` row.
pub struct RawRootCause {
  pub id:            i64,
  pub problem_id:    i64,
  pub parent_id:     Option<i64>,
  pub cause_text:    String,
  pub is_root_cause: bool,
  pub action_plan:   Option<String>,
  pub level:         i64,
  pub created_at:    String,
}

impl RawRootCause {
  /// Read a row selected with [`ROOT_CAUSE_COLUMNS`].
  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      id:            row.get(0)?,
      problem_id:    row.get(1)?,
      parent_id:     row.get(2)?,
      cause_text:    row.get(3)?,
      is_root_cause: row.get(4)?,
      action_plan:   row.get(5)?,
      level:         row.get(6)?,
      created_at:    row.get(7)?,
    })
  }

  pub fn into_root_cause(self) -> Result<RootCause> {
    let level = u32::try_from(self.level).map_err(|_| {
      Error::Decode(format!("root cause {} has level {}", self.id, self.level))
    })?;

    Ok(RootCause {
      id: self.id,
      problem_id: self.problem_id,
      parent_id: self.parent_id,
      cause_text: self.cause_text,
      is_root_cause: self.is_root_cause,
      action_plan: self.action_plan,
      level,
      created_at: decode_dt(&self.created_at)?,
    })
  }
}
