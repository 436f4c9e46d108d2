//! Error types shared by the network-facing collaborators.
//!
//! The text-processing core (links, citations, chunker, transcode) never
//! returns errors: it either fails open or treats misuse as a programming
//! error. Everything that talks to the outside world returns [`RecapError`].

use thiserror::Error;

/// Errors raised by configuration, LLM calls, publishers and persistence.
#[derive(Debug, Error)]
pub enum RecapError {
    #[error("configuration error: {0}")]
    Config(String),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{service} returned {status}: {body}")]
    Api {
        service: &'static str,
        status: u16,
        body: String,
    },

    #[error("GitHub GraphQL error: {0}")]
    GraphQl(String),

    #[error("{0} returned an empty response")]
    EmptyResponse(&'static str),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("nothing to send to {0}")]
    NothingToSend(&'static str),

    #[error("unsupported news source: {0}")]
    UnsupportedSource(String),
}

pub type RecapResult<T> = Result<T, RecapError>;

impl RecapError {
    /// Build an [`RecapError::Api`] from a non-success response, keeping a
    /// bounded preview of the body.
    pub async fn from_response(service: &'static str, response: reqwest::Response) -> Self {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        RecapError::Api {
            service,
            status,
            body: crate::utils::truncate_for_log(&body, 300),
        }
    }
}
