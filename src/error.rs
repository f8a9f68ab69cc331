use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Failure to produce the account list. `Io` is fatal for the run; `Parse`
/// is reported and the run ends without processing anything.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to read accounts file '{}'", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse accounts file '{}': {message}", .path.display())]
    Parse { path: PathBuf, message: String },
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StrKeyError {
    #[error("invalid base32 character '{0}'")]
    InvalidCharacter(char),
    #[error("key has {0} characters (expected 56)")]
    InvalidLength(usize),
    #[error("unexpected version byte (expected a key starting with '{expected}')")]
    InvalidVersion { expected: char },
    #[error("checksum mismatch")]
    InvalidChecksum,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LookupError {
    #[error("account {0} not found")]
    NotFound(String),
    #[error("horizon returned an invalid account record: {0}")]
    InvalidResponse(String),
    #[error("account lookup failed: {0}")]
    Transport(String),
}

/// Per-account failure before submission. The account is skipped, its
/// siblings are not affected.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BuildError {
    #[error("invalid secret seed: {0}")]
    InvalidSecret(StrKeyError),
    #[error("secret seed derives {derived}, not {address}")]
    AddressMismatch { address: String, derived: String },
    #[error("{0}")]
    AccountLookup(LookupError),
    #[error("sequence number {0} cannot be incremented")]
    SequenceOverflow(i64),
}

/// Result codes extracted from a Horizon problem response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rejection {
    pub status: u16,
    pub transaction_code: String,
    pub operation_codes: Vec<String>,
}

impl fmt::Display for Rejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.transaction_code)?;
        if !self.operation_codes.is_empty() {
            write!(f, " [{}]", self.operation_codes.join(", "))?;
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SubmitError {
    #[error("transaction rejected: {0}")]
    Rejected(Rejection),
    #[error("{0}")]
    Transport(String),
}
