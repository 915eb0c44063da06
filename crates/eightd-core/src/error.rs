//! Error types for `eightd-core`.

use std::{collections::BTreeMap, fmt};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Field-level validation messages, keyed by the offending input field.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FieldErrors(BTreeMap<String, String>);

impl FieldErrors {
  pub fn new() -> Self { Self::default() }

  /// Record a message for `field`. The first message for a field wins.
  pub fn add(&mut self, field: &str, message: impl Into<String>) {
    self
      .0
      .entry(field.to_owned())
      .or_insert_with(|| message.into());
  }

  pub fn get(&self, field: &str) -> Option<&str> {
    self.0.get(field).map(String::as_str)
  }

  pub fn contains(&self, field: &str) -> bool { self.0.contains_key(field) }

  pub fn is_empty(&self) -> bool { self.0.is_empty() }

  pub fn len(&self) -> usize { self.0.len() }

  /// `Ok(())` when no field was flagged, otherwise [`Error::Validation`].
  pub fn into_result(self) -> Result<()> {
    if self.is_empty() {
      Ok(())
    } else {
      Err(Error::Validation(self))
    }
  }
}

impl fmt::Display for FieldErrors {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let mut first = true;
    for (field, message) in &self.0 {
      if !first {
        f.write_str("; ")?;
      }
      write!(f, "{field}: {message}")?;
      first = false;
    }
    Ok(())
  }
}

/// Broad classification of a domain error, used by transport layers to pick
/// a response status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
  Validation,
  NotFound,
  Integrity,
  EmptyUpdate,
}

#[derive(Debug, Error)]
pub enum Error {
  #[error("validation failed: {0}")]
  Validation(FieldErrors),

  #[error("problem not found: {0}")]
  ProblemNotFound(i64),

  #[error("root cause not found: {0}")]
  RootCauseNotFound(i64),

  #[error("parent cause not found: {0}")]
  ParentNotFound(i64),

  #[error(
    "parent cause {parent_id} belongs to problem {parent_problem_id}, not \
     {problem_id}"
  )]
  ParentProblemMismatch {
    parent_id:         i64,
    parent_problem_id: i64,
    problem_id:        i64,
  },

  #[error("root cause {cause_id} does not belong to problem {problem_id}")]
  CauseProblemMismatch { cause_id: i64, problem_id: i64 },

  #[error("no updatable fields supplied")]
  EmptyUpdate,

  #[error("unknown problem status: {0:?}")]
  UnknownStatus(String),
}

impl Error {
  pub fn kind(&self) -> ErrorKind {
    match self {
      Self::Validation(_) | Self::UnknownStatus(_) => ErrorKind::Validation,
      Self::ProblemNotFound(_)
      | Self::RootCauseNotFound(_)
      | Self::ParentNotFound(_) => ErrorKind::NotFound,
      Self::ParentProblemMismatch { .. } | Self::CauseProblemMismatch { .. } => {
        ErrorKind::Integrity
      }
      Self::EmptyUpdate => ErrorKind::EmptyUpdate,
    }
  }

  /// Shorthand for a validation error on a single field.
  pub fn field(field: &str, message: impl Into<String>) -> Self {
    let mut errors = FieldErrors::new();
    errors.add(field, message);
    Self::Validation(errors)
  }
}

/// Implemented by backend error types so callers can recover the domain error
/// (if any) behind an opaque store failure.
pub trait DomainError {
  fn domain(&self) -> Option<&Error>;
}

impl DomainError for Error {
  fn domain(&self) -> Option<&Error> { Some(self) }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
