use thiserror::Error;

/// Why a fetch attempt produced no data.
///
/// All kinds mean "no data for this attempt"; the kind only drives what the
/// user is told.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FetchFailure {
    #[error("location not found: {0}")]
    NotFound(String),

    #[error("weather service unavailable: {0}")]
    Unavailable(String),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("no usable data: {0}")]
    Empty(String),
}

impl FetchFailure {
    /// Only transport-level failures are worth retrying with the same input.
    pub fn is_retryable(&self) -> bool {
        matches!(self, FetchFailure::Unavailable(_))
    }

    /// Message for the person who typed `location`.
    pub fn user_message(&self, location: &str) -> String {
        match self {
            FetchFailure::NotFound(_) | FetchFailure::Malformed(_) | FetchFailure::Empty(_) => {
                format!("Could not find weather for '{location}'. Please check the name and try again.")
            }
            FetchFailure::Unavailable(_) => {
                "Weather service is temporarily unavailable. Please try again in a moment."
                    .to_string()
            }
        }
    }

    pub(crate) fn from_reqwest(err: reqwest::Error) -> Self {
        if err.is_decode() {
            FetchFailure::Malformed(err.to_string())
        } else {
            FetchFailure::Unavailable(err.to_string())
        }
    }
}
