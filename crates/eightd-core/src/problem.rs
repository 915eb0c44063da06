//! Problems: the flat resource every root-cause tree hangs off.
//!
//! A problem is described once (title, description, owning team) and then
//! moves between `open` and `closed`. Deleting a problem deletes its whole
//! root-cause forest.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

use crate::{Error, FieldErrors, Result};

/// Longest accepted problem title, in characters.
pub const MAX_TITLE_CHARS: usize = 255;

// ─── Status ──────────────────────────────────────────────────────────────────

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Default,
  Serialize,
  Deserialize,
  Display,
  EnumString,
  AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum ProblemStatus {
  #[default]
  Open,
  Closed,
}

impl ProblemStatus {
  /// Parse the wire/database spelling (`"open"` / `"closed"`).
  pub fn parse(s: &str) -> Result<Self> {
    s.parse().map_err(|_| Error::UnknownStatus(s.to_owned()))
  }
}

// ─── Problem ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Problem {
  pub id:               i64,
  pub title:            String,
  pub description:      String,
  pub responsible_team: String,
  pub status:           ProblemStatus,
  /// Server-assigned; never changes after creation.
  pub created_at:       DateTime<Utc>,
}

/// Validated input to [`crate::store::ProblemRepository::create_problem`].
#[derive(Debug, Clone)]
pub struct NewProblem {
  pub title:            String,
  pub description:      String,
  pub responsible_team: String,
  pub status:           ProblemStatus,
}

impl NewProblem {
  pub fn new(
    title: impl Into<String>,
    description: impl Into<String>,
    responsible_team: impl Into<String>,
  ) -> Self {
    Self {
      title:            title.into(),
      description:      description.into(),
      responsible_team: responsible_team.into(),
      status:           ProblemStatus::default(),
    }
  }
}

/// Sparse update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct ProblemPatch {
  pub title:            Option<String>,
  pub description:      Option<String>,
  pub responsible_team: Option<String>,
  pub status:           Option<ProblemStatus>,
}

impl ProblemPatch {
  pub fn is_empty(&self) -> bool {
    self.title.is_none()
      && self.description.is_none()
      && self.responsible_team.is_none()
      && self.status.is_none()
  }
}

/// Equality filters for [`crate::store::ProblemRepository::list_problems`].
#[derive(Debug, Clone, Default)]
pub struct ProblemFilter {
  pub status:           Option<ProblemStatus>,
  pub responsible_team: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ProblemStatistics {
  pub total:        u64,
  pub open_count:   u64,
  pub closed_count: u64,
}

// ─── Unvalidated input ───────────────────────────────────────────────────────

/// Problem fields as received from a client, before validation.
///
/// The same shape serves creation (all descriptive fields required) and
/// sparse updates (every field optional).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProblemInput {
  pub title:            Option<String>,
  pub description:      Option<String>,
  pub responsible_team: Option<String>,
  pub status:           Option<String>,
}

impl ProblemInput {
  /// Validate for creation. Missing status defaults to `open`.
  pub fn into_new(self) -> Result<NewProblem> {
    let mut errors = FieldErrors::new();
    let status = self.checked_status(&mut errors);

    let title = required(self.title, "title", "Title is required", &mut errors);
    let description = required(
      self.description,
      "description",
      "Description is required",
      &mut errors,
    );
    let responsible_team = required(
      self.responsible_team,
      "responsible_team",
      "Responsible team is required",
      &mut errors,
    );
    check_title_length(&title, &mut errors);

    errors.into_result()?;
    Ok(NewProblem {
      title,
      description,
      responsible_team,
      status: status.unwrap_or_default(),
    })
  }

  /// Validate for a sparse update.
  pub fn into_patch(self) -> Result<ProblemPatch> {
    let mut errors = FieldErrors::new();
    let status = self.checked_status(&mut errors);

    for (field, value) in [
      ("title", &self.title),
      ("description", &self.description),
      ("responsible_team", &self.responsible_team),
    ] {
      if value.as_deref().is_some_and(is_blank) {
        errors.add(field, format!("{field} must not be empty"));
      }
    }
    if let Some(title) = &self.title {
      check_title_length(title, &mut errors);
    }

    errors.into_result()?;
    Ok(ProblemPatch {
      title: self.title,
      description: self.description,
      responsible_team: self.responsible_team,
      status,
    })
  }

  fn checked_status(&self, errors: &mut FieldErrors) -> Option<ProblemStatus> {
    let raw = self.status.as_deref()?;
    match ProblemStatus::parse(raw) {
      Ok(status) => Some(status),
      Err(_) => {
        errors.add("status", INVALID_STATUS);
        None
      }
    }
  }
}

/// Field message for a status outside `open` / `closed`.
pub const INVALID_STATUS: &str = "Status must be either \"open\" or \"closed\"";

pub(crate) fn is_blank(s: &str) -> bool { s.trim().is_empty() }

pub(crate) fn required(
  value: Option<String>,
  field: &str,
  message: &str,
  errors: &mut FieldErrors,
) -> String {
  match value {
    Some(v) if !is_blank(&v) => v,
    _ => {
      errors.add(field, message);
      String::new()
    }
  }
}

fn check_title_length(title: &str, errors: &mut FieldErrors) {
  if title.chars().count() > MAX_TITLE_CHARS {
    errors.add(
      "title",
      format!("Title must not exceed {MAX_TITLE_CHARS} characters"),
    );
  }
}
