//! Common types used across the platform

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Longest lot/serial identifier accepted after trimming
pub const MAX_LOT_IDENTIFIER_LEN: usize = 255;

/// Canonical, comparable form of a scanned or typed lot identifier.
///
/// Two identifiers name the same lot iff their keys are equal: the raw text is
/// trimmed and case-folded before comparison, so `"lot001 "` and `"LOT001"`
/// share one key.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct LotKey(String);

/// Why a piece of scanned text could not be turned into a [`LotKey`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LotKeyError {
    #[error("no identifier supplied")]
    Empty,

    #[error("identifier is longer than {max} characters")]
    TooLong { max: usize },
}

impl LotKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for LotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for LotKey {
    type Err = LotKeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        normalize(s)
    }
}

impl TryFrom<String> for LotKey {
    type Error = LotKeyError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        normalize(&value)
    }
}

impl From<LotKey> for String {
    fn from(key: LotKey) -> Self {
        key.0
    }
}

/// Normalize raw scanner/keyboard input using the default length limit
pub fn normalize(raw: &str) -> Result<LotKey, LotKeyError> {
    normalize_with_limit(raw, MAX_LOT_IDENTIFIER_LEN)
}

/// Normalize raw input: trim surrounding whitespace, then case-fold.
///
/// Whitespace-only input is [`LotKeyError::Empty`]; the length limit counts
/// characters, not bytes.
pub fn normalize_with_limit(raw: &str, max_len: usize) -> Result<LotKey, LotKeyError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(LotKeyError::Empty);
    }
    if trimmed.chars().count() > max_len {
        return Err(LotKeyError::TooLong { max: max_len });
    }
    Ok(LotKey(trimmed.to_lowercase()))
}

/// Display form of an identifier: the operator's text, trimmed but not folded
pub fn display_identifier(raw: &str) -> String {
    raw.trim().to_string()
}
