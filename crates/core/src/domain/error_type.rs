use serde::{Deserialize, Serialize};

/// Classification of a step failure, kept as a durable process variable so
/// it can be reported after the process halts.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "typescript", derive(ts_rs::TS))]
#[cfg_attr(feature = "typescript", ts(export))]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorType {
    /// Invalid input or descriptor, fixable by the user.
    ContentError,
    /// Unexpected or platform failure.
    UnknownError,
    /// Operator requested cancellation.
    AbortError,
    /// Deadline exceeded while polling.
    TimeoutError,
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ContentError => "CONTENT_ERROR",
            Self::UnknownError => "UNKNOWN_ERROR",
            Self::AbortError => "ABORT_ERROR",
            Self::TimeoutError => "TIMEOUT_ERROR",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "CONTENT_ERROR" => Some(Self::ContentError),
            "UNKNOWN_ERROR" => Some(Self::UnknownError),
            "ABORT_ERROR" => Some(Self::AbortError),
            "TIMEOUT_ERROR" => Some(Self::TimeoutError),
            _ => None,
        }
    }

    /// Content errors need a changed descriptor; retrying as-is will fail again.
    pub fn is_retriable(&self) -> bool {
        !matches!(self, Self::ContentError)
    }
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
