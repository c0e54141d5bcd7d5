use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Failure to retrieve raw content from an upstream source.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered with HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("could not read response body from {url}: {source}")]
    Body {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

/// Upstream payload that could not be turned into features.
#[derive(Debug, Error)]
pub enum ConversionError {
    #[error("could not read CSV header: {0}")]
    CsvHeader(#[from] csv::Error),
    #[error("CSV is missing required column '{0}'")]
    MissingColumn(&'static str),
    #[error("Invalid source data")]
    InvalidSourceData,
}

/// Anything that abandons a refresh cycle.
#[derive(Debug, Error)]
pub enum RefreshError {
    #[error(transparent)]
    Fetch(#[from] FetchError),
    #[error(transparent)]
    Conversion(#[from] ConversionError),
}

/// Bad query parameters, surfaced to the caller as 400.
#[derive(Debug, Error, PartialEq)]
pub enum ClientRequestError {
    #[error("Missing bbox parameter")]
    MissingBbox,
    #[error("Invalid bbox parameter '{0}': expected minLon,minLat,maxLon,maxLat")]
    InvalidBbox(String),
}

impl IntoResponse for ClientRequestError {
    fn into_response(self) -> Response {
        (StatusCode::BAD_REQUEST, self.to_string()).into_response()
    }
}

/// Anything that fails a bbox query.
#[derive(Debug, Error)]
pub enum QueryError {
    #[error(transparent)]
    Client(#[from] ClientRequestError),
    #[error("feature filtering task failed: {0}")]
    Filter(#[from] tokio::task::JoinError),
}

impl IntoResponse for QueryError {
    fn into_response(self) -> Response {
        match self {
            QueryError::Client(err) => err.into_response(),
            QueryError::Filter(err) => {
                log::error!("Feature filtering task failed: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR.into_response()
            }
        }
    }
}
