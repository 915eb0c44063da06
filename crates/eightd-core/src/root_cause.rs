//! Root causes, the nodes of a problem's "5 Whys" forest.
//!
//! Rows are stored flat with a nullable `parent_id` and reassembled into
//! trees on read (see [`crate::tree`]). Each level of a tree is one "why".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::IgnoredAny};

use crate::{
  FieldErrors, Result,
  problem::{is_blank, required},
};

// ─── RootCause ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RootCause {
  pub id:            i64,
  pub problem_id:    i64,
  /// `None` for the first "why" under a problem.
  pub parent_id:     Option<i64>,
  pub cause_text:    String,
  /// At most one cause per problem carries this flag.
  pub is_root_cause: bool,
  /// Always present while `is_root_cause` is set.
  pub action_plan:   Option<String>,
  /// Depth in the tree, fixed at creation.
  pub level:         u32,
  pub created_at:    DateTime<Utc>,
}

/// Depth of a new cause given the level of its parent, if it has one.
pub fn level_for(parent_level: Option<u32>) -> u32 {
  parent_level.map_or(0, |level| level + 1)
}

/// Validated input to [`crate::store::RootCauseRepository::create_root_cause`].
/// `level` and `created_at` are always set by the store.
#[derive(Debug, Clone)]
pub struct NewRootCause {
  pub problem_id:    i64,
  pub parent_id:     Option<i64>,
  pub cause_text:    String,
  pub is_root_cause: bool,
  pub action_plan:   Option<String>,
}

impl NewRootCause {
  /// A plain, unmarked cause.
  pub fn new(
    problem_id: i64,
    parent_id: Option<i64>,
    cause_text: impl Into<String>,
  ) -> Self {
    Self {
      problem_id,
      parent_id,
      cause_text: cause_text.into(),
      is_root_cause: false,
      action_plan: None,
    }
  }
}

/// Sparse update; `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct RootCausePatch {
  pub cause_text:    Option<String>,
  pub is_root_cause: Option<bool>,
  pub action_plan:   Option<String>,
}

impl RootCausePatch {
  pub fn is_empty(&self) -> bool {
    self.cause_text.is_none()
      && self.is_root_cause.is_none()
      && self.action_plan.is_none()
  }

  /// Whether applying this patch marks the cause as *the* root cause.
  pub fn marks_root_cause(&self) -> bool { self.is_root_cause == Some(true) }
}

// ─── Unvalidated input ───────────────────────────────────────────────────────

/// An identifier as a client may send it. Numbers and numeric strings are
/// accepted; any other JSON value is kept so validation can report it.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum IdInput {
  Number(i64),
  Text(String),
  Other(IgnoredAny),
}

impl IdInput {
  /// `Ok(None)` for an empty value (blank string or zero), `Err(())` when
  /// not an integer.
  fn resolve(&self) -> std::result::Result<Option<i64>, ()> {
    let id = match self {
      Self::Number(n) => *n,
      Self::Text(s) if is_blank(s) => return Ok(None),
      Self::Text(s) => s.trim().parse::<i64>().map_err(|_| ())?,
      Self::Other(_) => return Err(()),
    };
    Ok((id != 0).then_some(id))
  }
}

/// A boolean flag as a client may send it.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FlagInput {
  Bool(bool),
  Other(IgnoredAny),
}

/// Root cause fields as received from a client, before validation.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RootCauseInput {
  pub problem_id:    Option<IdInput>,
  pub parent_id:     Option<IdInput>,
  pub cause_text:    Option<String>,
  pub is_root_cause: Option<FlagInput>,
  pub action_plan:   Option<String>,
}

impl RootCauseInput {
  /// Validate for creation.
  pub fn into_new(self) -> Result<NewRootCause> {
    let mut errors = FieldErrors::new();

    let problem_id = match self.problem_id.as_ref().map(IdInput::resolve) {
      Some(Ok(Some(id))) => Some(id),
      Some(Err(())) => {
        errors.add("problem_id", "Problem ID must be numeric");
        None
      }
      Some(Ok(None)) | None => {
        errors.add("problem_id", "Problem ID is required");
        None
      }
    };

    let parent_id = match self.parent_id.as_ref().map(IdInput::resolve) {
      Some(Ok(id)) => id,
      Some(Err(())) => {
        errors.add("parent_id", "Parent ID must be numeric");
        None
      }
      None => None,
    };

    let cause_text = required(
      self.cause_text,
      "cause_text",
      "Cause text is required",
      &mut errors,
    );

    let is_root_cause = checked_flag(self.is_root_cause.as_ref(), &mut errors)
      .unwrap_or(false);
    check_action_plan(is_root_cause, self.action_plan.as_deref(), &mut errors);

    errors.into_result()?;
    Ok(NewRootCause {
      problem_id: problem_id.unwrap_or_default(),
      parent_id,
      cause_text,
      is_root_cause,
      action_plan: self.action_plan,
    })
  }

  /// Validate for a sparse update. Only `cause_text`, `is_root_cause` and
  /// `action_plan` are updatable; the tree position is fixed.
  pub fn into_patch(self) -> Result<RootCausePatch> {
    let mut errors = FieldErrors::new();

    if self.cause_text.as_deref().is_some_and(is_blank) {
      errors.add("cause_text", "Cause text must not be empty");
    }
    let is_root_cause = checked_flag(self.is_root_cause.as_ref(), &mut errors);
    check_action_plan(
      is_root_cause == Some(true),
      self.action_plan.as_deref(),
      &mut errors,
    );

    errors.into_result()?;
    Ok(RootCausePatch {
      cause_text: self.cause_text,
      is_root_cause,
      action_plan: self.action_plan,
    })
  }
}

fn checked_flag(flag: Option<&FlagInput>, errors: &mut FieldErrors) -> Option<bool> {
  match flag? {
    FlagInput::Bool(b) => Some(*b),
    FlagInput::Other(_) => {
      errors.add("is_root_cause", "is_root_cause must be boolean");
      None
    }
  }
}

fn check_action_plan(
  marking: bool,
  action_plan: Option<&str>,
  errors: &mut FieldErrors,
) {
  if marking && action_plan.is_none_or(is_blank) {
    errors.add(
      "action_plan",
      "Action plan is required when marking as root cause",
    );
  }
}

/// Require a non-blank action plan for a mark-as-root-cause request.
pub fn validate_action_plan(action_plan: &str) -> Result<()> {
  let mut errors = FieldErrors::new();
  check_action_plan(true, Some(action_plan), &mut errors);
  errors.into_result()
}
