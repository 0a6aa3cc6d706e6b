//! Artifact identifiers
//!
//! Every generated page is stored and served under an identifier of the form
//! `<tag>-<suffix>`: a short slug derived from whatever the caller hands in,
//! followed by eight hex characters taken from a fresh v4 UUID.
//!
//! ```
//! use mirage_core::make_identifier;
//!
//! let id = make_identifier("Cat Café!");
//! assert!(id.as_str().starts_with("cat-caf-"));
//! assert_eq!(id.suffix().len(), 8);
//! ```

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{CoreError, Result};

/// Longest slug kept from the caller-supplied tag.
pub const MAX_TAG_LEN: usize = 32;

/// Longest identifier accepted by [`Identifier::parse`].
pub const MAX_IDENTIFIER_LEN: usize = 64;

const SUFFIX_LEN: usize = 8;
const FALLBACK_TAG: &str = "page";

/// Filesystem-safe, immutable name of a stored artifact.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Identifier(String);

impl Identifier {
    /// Validate an identifier that came from outside the process
    /// (a URL segment, a directory entry).
    pub fn parse(value: impl Into<String>) -> Result<Self> {
        let value = value.into();

        let reason = if value.is_empty() {
            Some("empty")
        } else if value.len() > MAX_IDENTIFIER_LEN {
            Some("too long")
        } else if value.starts_with('-') {
            Some("leading dash")
        } else if !value.bytes().all(is_identifier_byte) {
            Some("contains characters outside [A-Za-z0-9_-]")
        } else {
            None
        };

        match reason {
            Some(reason) => Err(CoreError::InvalidIdentifier { value, reason }),
            None => Ok(Self(value)),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The slug portion, everything before the last dash.
    pub fn tag(&self) -> &str {
        self.0.rsplit_once('-').map(|(tag, _)| tag).unwrap_or(&self.0)
    }

    /// The random portion, everything after the last dash.
    pub fn suffix(&self) -> &str {
        self.0.rsplit_once('-').map(|(_, suffix)| suffix).unwrap_or("")
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Identifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Identifier {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl FromStr for Identifier {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Identifier {
    type Error = CoreError;

    fn try_from(value: String) -> Result<Self> {
        Self::parse(value)
    }
}

impl From<Identifier> for String {
    fn from(id: Identifier) -> Self {
        id.0
    }
}

/// Derive a fresh identifier from an arbitrary tag.
///
/// The tag is lowercased, every run of characters outside `[a-z0-9_]` collapses
/// to a single `-`, and the result is cut to [`MAX_TAG_LEN`]. Path separators
/// and dots never survive, so the output is always a plain file stem.
pub fn make_identifier(tag: &str) -> Identifier {
    let token = Uuid::new_v4().simple().to_string();
    let suffix = &token[..SUFFIX_LEN];
    Identifier(format!("{}-{}", slugify(tag), suffix))
}

fn slugify(tag: &str) -> String {
    let mut slug = String::with_capacity(tag.len().min(MAX_TAG_LEN));
    let mut pending_dash = false;

    for ch in tag.chars() {
        let ch = ch.to_ascii_lowercase();
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() || ch == '_' {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }

        if slug.len() >= MAX_TAG_LEN {
            break;
        }
    }

    slug.truncate(MAX_TAG_LEN);
    let trimmed = slug.trim_end_matches('-');

    if trimmed.is_empty() {
        FALLBACK_TAG.to_string()
    } else {
        trimmed.to_string()
    }
}

fn is_identifier_byte(b: u8) -> bool {
    b.is_ascii_alphanumeric() || b == b'-' || b == b'_'
}
