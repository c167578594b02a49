use thiserror::Error;

/// Error taxonomy shared by every external collaborator.
///
/// The pipeline maps these onto its retry/abort policy:
/// - [`NotAuthenticated`](ConnectorError::NotAuthenticated) aborts the whole
///   run immediately, without retry
/// - [`Network`](ConnectorError::Network) is retried at the call site within
///   the caller's bounded backoff budget
/// - [`Remote`](ConnectorError::Remote) exhausts its retry budget and then
///   becomes an item-level failure
/// - [`Parse`](ConnectorError::Parse) and [`Io`](ConnectorError::Io) are
///   item-level failures with no retry
#[derive(Error, Debug)]
pub enum ConnectorError {
    #[error("not authenticated with the source platform")]
    NotAuthenticated,

    #[error("transient network failure: {0}")]
    Network(String),

    #[error("remote call failed with status {status}: {message}")]
    Remote { status: u16, message: String },

    #[error("malformed response: {0}")]
    Parse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConnectorError {
    /// Whether a bounded-retry loop should attempt this call again.
    ///
    /// Network failures, rate limiting (429) and server errors (5xx) are
    /// transient; everything else is not.
    pub fn is_transient(&self) -> bool {
        match self {
            ConnectorError::Network(_) => true,
            ConnectorError::Remote { status, .. } => {
                *status == 429 || (500..600).contains(status)
            }
            _ => false,
        }
    }

    /// Whether this error must abort the entire run.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ConnectorError::NotAuthenticated)
    }
}

pub type Result<T> = std::result::Result<T, ConnectorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn network_and_server_errors_are_transient() {
        assert!(ConnectorError::Network("reset".into()).is_transient());
        assert!(ConnectorError::Remote {
            status: 429,
            message: "rate limited".into()
        }
        .is_transient());
        assert!(ConnectorError::Remote {
            status: 503,
            message: "unavailable".into()
        }
        .is_transient());
    }

    #[test]
    fn client_errors_and_auth_are_not_transient() {
        assert!(!ConnectorError::Remote {
            status: 404,
            message: "missing".into()
        }
        .is_transient());
        assert!(!ConnectorError::NotAuthenticated.is_transient());
        assert!(ConnectorError::NotAuthenticated.is_fatal());
    }
}
