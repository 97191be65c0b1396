//! Error types and handling for the mesh
//!
//! One error enum covers the whole crate. `ErrorKind` groups the variants
//! into the categories callers branch on: chain breaks, unknown attacks,
//! upstream failures and malformed input.

use thiserror::Error;

/// Result type alias for mesh operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error categories used for propagation decisions and HTTP mapping
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// A hop in token resolution failed
    ChainBreak,
    /// Dispatch referenced an attack id absent from the catalog
    UnknownTarget,
    /// A resolved call returned non-200 or an unparsable body
    Upstream,
    /// Request bodies or path segments failed to parse
    MalformedInput,
    /// Startup configuration or topology problems
    Configuration,
    /// Anything else
    Internal,
}

#[derive(Debug, Error)]
pub enum Error {
    #[error("could not get token from {service} (hop {hop}): {reason}")]
    ChainBreak {
        hop: usize,
        service: String,
        reason: String,
    },

    #[error("unknown attack {0}")]
    UnknownAttack(u32),

    #[error("upstream call to {url} failed: {reason}")]
    Upstream { url: String, reason: String },

    #[error("malformed input: {0}")]
    MalformedInput(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("invalid topology: {0}")]
    Topology(String),

    #[error("identity token source failed: {0}")]
    TokenSource(String),

    #[error("store error: {0}")]
    Store(String),

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid URL: {0}")]
    Url(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Build an upstream error for a non-200 answer
    pub fn unexpected_status(url: impl Into<String>, status: reqwest::StatusCode) -> Self {
        Error::Upstream {
            url: url.into(),
            reason: format!("unexpected status {}", status.as_u16()),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ChainBreak { .. } => ErrorKind::ChainBreak,
            Self::UnknownAttack(_) => ErrorKind::UnknownTarget,
            Self::Upstream { .. } | Self::Http(_) | Self::Json(_) | Self::TokenSource(_) => {
                ErrorKind::Upstream
            }
            Self::MalformedInput(_) | Self::Url(_) => ErrorKind::MalformedInput,
            Self::Config(_) | Self::Topology(_) => ErrorKind::Configuration,
            Self::Store(_) | Self::Io(_) => ErrorKind::Internal,
        }
    }

    /// HTTP status used when the error is surfaced to a client
    pub fn status_code(&self) -> u16 {
        match self.kind() {
            ErrorKind::MalformedInput => 400,
            ErrorKind::UnknownTarget => 404,
            ErrorKind::ChainBreak | ErrorKind::Upstream => 502,
            ErrorKind::Configuration | ErrorKind::Internal => 500,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kinds_map_to_statuses() {
        assert_eq!(Error::UnknownAttack(999).status_code(), 404);
        assert_eq!(Error::MalformedInput("x".into()).status_code(), 400);
        let chain = Error::ChainBreak {
            hop: 1,
            service: "http://order".into(),
            reason: "status 403".into(),
        };
        assert_eq!(chain.kind(), ErrorKind::ChainBreak);
        assert_eq!(chain.status_code(), 502);
        assert_eq!(Error::Config("x".into()).status_code(), 500);
    }

    #[test]
    fn test_chain_break_names_service() {
        let err = Error::ChainBreak {
            hop: 0,
            service: "http://website".into(),
            reason: "connection refused".into(),
        };
        let text = err.to_string();
        assert!(text.contains("http://website"));
        assert!(text.contains("hop 0"));
    }
}
