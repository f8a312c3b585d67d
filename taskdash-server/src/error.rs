//! Error types shared by the Motion client, the task service and the web layer.

pub type Result<T> = std::result::Result<T, DashboardError>;

#[derive(Debug, thiserror::Error)]
pub enum DashboardError {
    /// Missing credential or unusable settings. Fatal at startup.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// The upstream fetch failed as a unit; the cache is left as it was.
    #[error("task fetch failed: {0}")]
    ProviderFetch(#[from] FetchError),

    /// No fetch has ever succeeded, so there is nothing to serve.
    #[error("no task data available yet")]
    NoDataAvailable(#[source] Box<DashboardError>),
}

/// Why a fetch from the task provider failed.
#[derive(Debug, thiserror::Error)]
pub enum FetchError {
    #[error("error making request: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("API error: {status} - {body}")]
    Status {
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("error reading response body: {0}")]
    Body(#[source] reqwest::Error),

    #[error("error decoding response: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("pagination did not finish after {max_pages} pages")]
    TooManyPages { max_pages: usize },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::error::Error;

    #[test]
    fn test_no_data_keeps_fetch_cause() {
        let cause = DashboardError::from(FetchError::TooManyPages { max_pages: 3 });
        let err = DashboardError::NoDataAvailable(Box::new(cause));

        assert_eq!(err.to_string(), "no task data available yet");
        let source = err.source().unwrap().to_string();
        assert_eq!(source, "task fetch failed: pagination did not finish after 3 pages");
    }
}
