use reqwest::StatusCode;

/// Errors that can happen within the docbench-client.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Any error emitted from the underlying [`reqwest`] client.
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    /// Errors serializing request bodies or parsing response bodies.
    #[error(transparent)]
    Json(#[from] serde_json::Error),
    /// Error when URL manipulation fails.
    #[error("{message}")]
    InvalidUrl {
        /// The URL error message.
        message: String,
    },
    /// The service answered with a non-success status code.
    #[error("status {status}: {reason}")]
    Status {
        /// The HTTP status returned by the service.
        status: StatusCode,
        /// The reason reported by the service, or the raw response body.
        reason: String,
    },
}

/// A convenience alias that defaults our [`Error`] type.
pub type Result<T, E = Error> = std::result::Result<T, E>;
