use connector_traits::ConnectorError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum IngestApiError {
    #[error("API request failed: status={status_code}, {message}")]
    Api { status_code: u16, message: String },

    #[error("Failed to parse API response: {0}")]
    Parse(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

pub type Result<T> = std::result::Result<T, IngestApiError>;

impl From<IngestApiError> for ConnectorError {
    fn from(error: IngestApiError) -> Self {
        match error {
            IngestApiError::Api {
                status_code: 401 | 403,
                ..
            } => ConnectorError::NotAuthenticated,
            IngestApiError::Api {
                status_code,
                message,
            } => ConnectorError::Remote {
                status: status_code,
                message,
            },
            IngestApiError::Parse(message) => ConnectorError::Parse(message),
            IngestApiError::Http(e) => ConnectorError::Network(e.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_statuses_map_to_not_authenticated() {
        let error = IngestApiError::Api {
            status_code: 401,
            message: "invalid token".into(),
        };
        assert!(matches!(
            ConnectorError::from(error),
            ConnectorError::NotAuthenticated
        ));
    }

    #[test]
    fn server_errors_stay_transient() {
        let error = IngestApiError::Api {
            status_code: 503,
            message: "busy".into(),
        };
        let mapped = ConnectorError::from(error);
        assert!(mapped.is_transient());
    }

    #[test]
    fn parse_errors_are_not_transient() {
        let mapped = ConnectorError::from(IngestApiError::Parse("bad json".into()));
        assert!(!mapped.is_transient());
        assert!(matches!(mapped, ConnectorError::Parse(_)));
    }
}
