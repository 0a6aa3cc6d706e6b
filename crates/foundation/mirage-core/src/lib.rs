//! Mirage core
//!
//! Shared vocabulary for every other crate in the workspace:
//!
//! - [`Identifier`]: the filesystem-safe name of a generated page
//! - [`make_identifier`]: derives a fresh identifier from a short tag
//! - [`CoreError`]: failures raised while validating identifiers

pub mod identifier;

pub use identifier::{make_identifier, Identifier, MAX_IDENTIFIER_LEN, MAX_TAG_LEN};

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    #[error("Invalid identifier {value:?}: {reason}")]
    InvalidIdentifier { value: String, reason: &'static str },
}

pub type Result<T> = std::result::Result<T, CoreError>;
