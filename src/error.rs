use thiserror::Error;

/// A version string that could not be coerced into `major.minor.patch` form.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("Invalid Version: {input}")]
pub struct NotSemverError {
    pub input: String,
}

impl NotSemverError {
    pub(crate) fn new(input: &str) -> Self {
        NotSemverError {
            input: input.to_string(),
        }
    }

    /// The user-facing notice attached to a heuristic comparison result.
    pub fn notice(&self) -> String {
        format!("Not a valid semver version: {}", self.input)
    }
}

/// Failures of the store lookup. These are reported to the caller as an error envelope.
#[derive(Debug, Error)]
pub enum LookupError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("HTTP error: {0}")]
    Status(u16),

    #[error("App not found: {0}")]
    NotFound(String),

    #[error("Unsupported platform: {0}")]
    UnsupportedPlatform(String),

    #[error("Invalid lookup URL: {0}")]
    InvalidUrl(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Failures answering an update check.
#[derive(Debug, Error)]
pub enum CheckError {
    #[error(transparent)]
    Lookup(#[from] LookupError),

    #[error("Failed to encode response: {0}")]
    Encode(#[from] serde_json::Error),
}

impl CheckError {
    /// HTTP status reported for this failure. Lookup problems are the
    /// caller's (400); encoding problems are ours (500).
    pub fn status_code(&self) -> u16 {
        match self {
            CheckError::Lookup(_) => 400,
            CheckError::Encode(_) => 500,
        }
    }
}
