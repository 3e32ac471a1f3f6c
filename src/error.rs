// ABOUTME: Error types with structured exit codes for CLI
// ABOUTME: Maps sync failures to specific exit codes for CI scripting

use std::path::PathBuf;
use thiserror::Error;

/// Exit code for a run that completed but skipped pages or left assets remote.
pub const PARTIAL_FAILURE_EXIT_CODE: i32 = 1;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Authentication failed: {0}")]
    Auth(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("API error {status} on {endpoint}: {message}")]
    Api {
        endpoint: String,
        status: u16,
        message: String,
    },

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Filesystem error: {0}")]
    Filesystem(#[from] std::io::Error),

    #[error("Gave up on page {page_id} after {attempts} attempts: {message}")]
    Transient {
        page_id: String,
        attempts: u32,
        message: String,
    },

    #[error("Page {page_id} is not accessible (HTTP {status})")]
    NotFound { page_id: String, status: u16 },

    #[error(
        "Sync state at {} is unreadable: {message}. Run `notion-mirror clean` or delete the file to rebuild from Notion",
        path.display()
    )]
    StateCorruption { path: PathBuf, message: String },

    #[error("Version control error: {0}")]
    Sink(#[from] SinkError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Sync cancelled")]
    Cancelled,
}

impl Error {
    pub fn exit_code(&self) -> i32 {
        match self {
            Error::Auth(_) => 2,
            Error::Network(_) => 3,
            Error::Api { .. } => 4,
            Error::Parse(_) => 5,
            Error::Filesystem(_) => 6,
            Error::Transient { .. } => 7,
            Error::NotFound { .. } => 8,
            Error::StateCorruption { .. } => 9,
            Error::Sink(_) => 10,
            Error::Config(_) => 11,
            Error::Cancelled => 130,
        }
    }

    /// Page-scoped errors that skip the page instead of failing the run.
    pub fn is_skippable(&self) -> bool {
        matches!(self, Error::NotFound { .. })
    }
}

/// Failures reported by the version-control sink.
#[derive(Debug, Error)]
pub enum SinkError {
    #[error("nothing staged to commit")]
    NothingStaged,

    #[error("no remote configured")]
    NoRemote,

    #[error("push rejected: {0}")]
    PushRejected(String),

    #[error("git {command} failed: {stderr}")]
    Command { command: String, stderr: String },

    #[error("could not run git: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_exit_codes() {
        assert_eq!(Error::Auth("test".into()).exit_code(), 2);
        assert_eq!(
            Error::Api {
                endpoint: "test".into(),
                status: 400,
                message: "bad request".into()
            }
            .exit_code(),
            4
        );
        assert_eq!(Error::Config("missing".into()).exit_code(), 11);
        assert_eq!(Error::Cancelled.exit_code(), 130);
    }

    #[test]
    fn test_partial_code_is_distinct() {
        let fatal = [
            Error::Auth("x".into()).exit_code(),
            Error::Sink(SinkError::NoRemote).exit_code(),
            Error::Transient {
                page_id: "p".into(),
                attempts: 5,
                message: "503".into(),
            }
            .exit_code(),
        ];
        assert!(!fatal.contains(&PARTIAL_FAILURE_EXIT_CODE));
        assert_ne!(PARTIAL_FAILURE_EXIT_CODE, 0);
    }

    #[test]
    fn test_transient_message_names_page() {
        let err = Error::Transient {
            page_id: "abc123".into(),
            attempts: 5,
            message: "HTTP 503".into(),
        };
        assert!(err.to_string().contains("abc123"));
    }

    #[test]
    fn test_state_corruption_includes_remediation() {
        let err = Error::StateCorruption {
            path: PathBuf::from("/repo/.notion-sync/state.json"),
            message: "expected value".into(),
        };
        let text = err.to_string();
        assert!(text.contains("state.json"));
        assert!(text.contains("notion-mirror clean"));
    }

    #[test]
    fn test_only_not_found_is_skippable() {
        assert!(Error::NotFound {
            page_id: "p".into(),
            status: 404
        }
        .is_skippable());
        assert!(!Error::Auth("x".into()).is_skippable());
    }
}
