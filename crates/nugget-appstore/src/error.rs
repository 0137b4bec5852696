use thiserror::Error;

/// Errors from the storefront search and lookup endpoints.
///
/// Every variant is transient from the batch pipeline's point of view: the
/// item that triggered it can be retried in a later attempt, but nothing is
/// retried automatically within one attempt.
#[derive(Debug, Error)]
pub enum FetchError {
    /// Network, TLS, or timeout failure from the underlying HTTP client.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("unexpected HTTP status {status} from {url}")]
    UnexpectedStatus { status: u16, url: String },

    /// The response body could not be deserialized into the expected type.
    #[error("JSON deserialization error for {context}: {source}")]
    Deserialize {
        context: String,
        #[source]
        source: serde_json::Error,
    },

    /// Every lookup chunk failed, so no enrichment data exists at all.
    #[error("all {chunks} lookup chunks failed; last error: {last}")]
    AllChunksFailed { chunks: usize, last: String },

    #[error("invalid base URL \"{url}\": {reason}")]
    InvalidBaseUrl { url: String, reason: String },

    /// Attribute name outside the software allow-list; the endpoint would
    /// answer HTTP 400, so it is rejected before any request is made.
    #[error("invalid search attribute \"{0}\" for software entities")]
    InvalidAttribute(String),
}
