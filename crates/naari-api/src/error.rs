use thiserror::Error;

/// Top-level error type for the `naari-api` crate.
///
/// Splits failures into the two classes the retry engine cares about:
/// transient ones (network, timeout, HTTP >= 400) and terminal ones
/// (malformed JSON on a 2xx, bad address). `naari-core` maps these into
/// user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection refused, DNS failure, timeout, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// Device address could not be turned into a URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Building the underlying `reqwest::Client` failed.
    #[error("Failed to build HTTP client: {0}")]
    ClientBuild(String),

    // ── Device responses ────────────────────────────────────────────
    /// Device answered with an HTTP status >= 400.
    #[error("HTTP {status} from {url}")]
    Status { url: String, status: u16 },

    /// Device answered 2xx but the body was not valid JSON.
    #[error("Invalid JSON from {url}: {message}")]
    InvalidJson {
        url: String,
        message: String,
        body: String,
    },

    // ── Retry ───────────────────────────────────────────────────────
    /// Every attempt of one logical request failed with a transient error.
    #[error("Request to {address} failed after {attempts} attempts: {last}")]
    RetryExhausted {
        address: String,
        attempts: u32,
        #[source]
        last: Box<Error>,
    },
}

impl Error {
    /// Returns `true` if this is a transient error worth retrying.
    ///
    /// Timeouts, connection failures and HTTP statuses >= 400 are all
    /// retried alike. A 2xx with an unparseable body is not.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => !e.is_builder(),
            Self::Status { .. } => true,
            _ => false,
        }
    }

    /// Returns `true` if a device responded but the payload was malformed.
    pub fn is_invalid_response(&self) -> bool {
        matches!(self, Self::InvalidJson { .. })
    }

    /// HTTP status carried by this error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::RetryExhausted { last, .. } => last.status(),
            _ => None,
        }
    }

    /// Number of attempts made, for retry-exhausted errors.
    pub fn attempts(&self) -> Option<u32> {
        match self {
            Self::RetryExhausted { attempts, .. } => Some(*attempts),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn status_errors_are_transient() {
        let err = Error::Status {
            url: "http://10.0.0.2/json".into(),
            status: 503,
        };
        assert!(err.is_transient());
        assert_eq!(err.status(), Some(503));
    }

    #[test]
    fn invalid_json_is_terminal() {
        let err = Error::InvalidJson {
            url: "http://10.0.0.2/json".into(),
            message: "expected value at line 1 column 1".into(),
            body: "<html>".into(),
        };
        assert!(!err.is_transient());
        assert!(err.is_invalid_response());
    }

    #[test]
    fn exhausted_reports_last_status() {
        let err = Error::RetryExhausted {
            address: "10.0.0.2".into(),
            attempts: 3,
            last: Box::new(Error::Status {
                url: "http://10.0.0.2/json".into(),
                status: 500,
            }),
        };
        assert!(!err.is_transient());
        assert_eq!(err.attempts(), Some(3));
        assert_eq!(err.status(), Some(500));
        assert!(err.to_string().contains("after 3 attempts"));
    }
}
