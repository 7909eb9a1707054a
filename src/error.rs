use thiserror::Error;

/// A validation failure: the received payload does not match the control
/// payload. Carries the complete diagnostic for the first mismatch found.
#[derive(Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct ValidationError {
    message: String,
}

impl ValidationError {
    pub(crate) fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

/// A failure outside the assertion itself: malformed payloads, invalid
/// path expressions, unknown matchers. Distinct from [`ValidationError`]
/// so callers can tell "the assertion failed" apart from "the input was
/// not well-formed".
#[derive(Debug, Error)]
pub enum SystemError {
    #[error("failed to parse JSON payload: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("failed to parse XML payload: {0}")]
    InvalidXml(String),

    #[error("unsupported token type for value '{0}'")]
    UnsupportedTokenType(String),

    #[error("invalid path expression '{expression}': {reason}")]
    InvalidPathExpression { expression: String, reason: String },

    #[error("unknown validation matcher '{0}'")]
    UnknownMatcher(String),

    #[error("invalid validation matcher expression '{0}'")]
    InvalidMatcherExpression(String),

    #[error("unresolved variable placeholder in '{0}'")]
    UnresolvedPlaceholder(String),
}

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    System(#[from] SystemError),
}

pub type Result<T> = std::result::Result<T, Error>;
