use std::time::Duration;
use thiserror::Error;

use crate::models::OddsSnapshot;

/// Malformed race identifier
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RaceIdError {
    #[error("race id must be exactly 12 digits, got {0:?}")]
    Format(String),

    #[error("unknown venue code {0}")]
    UnknownVenue(u8),
}

/// Fatal failures while driving the browser to the odds pages
#[derive(Debug, Error)]
pub enum NavigationError {
    #[error("invalid race id: {0}")]
    InvalidRaceId(#[from] RaceIdError),

    #[error("link {name:?} not found on {page}")]
    LinkNotFound { name: String, page: &'static str },

    #[error("unknown bet type tab label {0:?}")]
    UnknownBetTab(String),

    #[error("navigation timed out after {0:?}")]
    Timeout(Duration),

    #[error("browser error: {0}")]
    Browser(String),
}

/// Errors raised inside an extractor before it can look at any row
///
/// These never leave the extractor; they become diagnostics.
#[derive(Debug, Error)]
pub enum ScraperError {
    #[error("Failed to parse selector: {0}")]
    Selector(String),

    #[error("Failed to compile pattern: {0}")]
    Pattern(#[from] regex::Error),
}

/// A navigation failure together with the tabs captured before it happened
#[derive(Debug, Error)]
#[error("{error}")]
pub struct CaptureFailure {
    #[source]
    pub error: NavigationError,
    pub partial: OddsSnapshot,
}

impl CaptureFailure {
    pub fn new(error: NavigationError, partial: OddsSnapshot) -> Self {
        Self { error, partial }
    }

    /// Failure that happened before any page was loaded
    pub fn early(error: NavigationError) -> Self {
        Self {
            error,
            partial: OddsSnapshot::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = NavigationError::LinkNotFound {
            name: "オッズ".to_string(),
            page: "top page",
        };
        assert_eq!(err.to_string(), "link \"オッズ\" not found on top page");
    }

    #[test]
    fn test_race_id_error_converts() {
        let err: NavigationError = RaceIdError::UnknownVenue(11).into();
        assert!(err.to_string().contains("unknown venue code 11"));
    }

    #[test]
    fn test_capture_failure_keeps_source() {
        use std::error::Error as _;

        let failure = CaptureFailure::early(NavigationError::Timeout(Duration::from_secs(30)));
        assert_eq!(failure.to_string(), "navigation timed out after 30s");
        assert!(failure.source().is_some());
        assert!(failure.partial.pages.is_empty());
    }
}
