//! Provider-specific error types.

use thiserror::Error;

/// A failed provider request.
///
/// Network failures, provider-side errors (4xx/5xx) and undecodable payloads
/// are all collapsed into this one kind on purpose: the fallback layer treats
/// every failure identically, so distinguishing them would change behavior
/// downstream.
#[derive(Debug, Error)]
#[error("failed to fetch {context}: {detail}")]
pub struct FetchError {
    context: String,
    detail: String,
}

impl FetchError {
    pub fn new(context: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            context: context.into(),
            detail: detail.into(),
        }
    }

    /// What was being fetched, e.g. "weather for london".
    pub fn context(&self) -> &str {
        &self.context
    }

    /// User-friendly error message for UI display.
    pub fn user_message(&self) -> String {
        format!("Failed to fetch {}. Please try again.", self.context)
    }
}

/// Device location errors.
#[derive(Debug, Error)]
pub enum LocationError {
    #[error("Location permission denied")]
    PermissionDenied,
    #[error("Location service unavailable")]
    ServiceUnavailable,
    #[error("Location request timed out")]
    Timeout,
    #[error("Location error: {0}")]
    Other(String),
}

impl LocationError {
    /// User-friendly error message for UI display.
    ///
    /// Location failures are surfaced as guidance and never retried
    /// automatically.
    pub fn user_message(&self) -> &'static str {
        match self {
            Self::PermissionDenied => {
                "Location access was denied. Please search for a city manually."
            }
            Self::ServiceUnavailable => {
                "Location is not available on this system. Please search for a city manually."
            }
            Self::Timeout => "Locating you took too long. Please search for a city manually.",
            Self::Other(_) => "Unable to determine your location. Please search for a city manually.",
        }
    }
}
