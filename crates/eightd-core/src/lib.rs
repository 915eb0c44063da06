//! Core types and trait definitions for the 8D problem solving service.
//!
//! This crate is deliberately free of HTTP and database dependencies.
//! All other crates depend on it.

pub mod error;
pub mod problem;
pub mod root_cause;
pub mod store;
pub mod tree;

pub use error::{DomainError, Error, ErrorKind, FieldErrors, Result};
