//! Per-request failures and their wire representation.

use ann_serve_core::IndexError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Everything that can end a search request early.
///
/// Client-input kinds map to 400; the rest are server-side and map to 500.
/// None of them is retried.
#[derive(Error, Debug)]
pub enum RequestError {
    #[error("payload is not a valid JSON object: {0}")]
    MalformedPayload(String),

    #[error("missing required field `{0}`")]
    MissingField(&'static str),

    #[error("field `{field}` has the wrong type: expected {expected}")]
    TypeMismatch {
        field: &'static str,
        expected: &'static str,
    },

    #[error("dimension mismatch: query {position} has {actual} components, index expects {expected}")]
    DimensionMismatch {
        position: usize,
        expected: usize,
        actual: usize,
    },

    #[error("result too large: {num_queries} queries x k={k} exceeds {limit} result slots")]
    ResultTooLarge {
        num_queries: usize,
        k: usize,
        limit: usize,
    },

    #[error("search engine failure: {0}")]
    SearchEngine(String),

    #[error("failed to encode response: {0}")]
    Encoding(#[from] serde_json::Error),
}

impl From<IndexError> for RequestError {
    fn from(err: IndexError) -> Self {
        RequestError::SearchEngine(err.to_string())
    }
}

/// Pipeline stage a failure surfaced in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Decode,
    Search,
    Encode,
}

impl Stage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Decode => "decode",
            Stage::Search => "search",
            Stage::Encode => "encode",
        }
    }
}

impl RequestError {
    pub fn status(&self) -> StatusCode {
        match self {
            RequestError::MalformedPayload(_)
            | RequestError::MissingField(_)
            | RequestError::TypeMismatch { .. }
            | RequestError::DimensionMismatch { .. }
            | RequestError::ResultTooLarge { .. } => StatusCode::BAD_REQUEST,
            RequestError::SearchEngine(_) | RequestError::Encoding(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            RequestError::MalformedPayload(_)
            | RequestError::MissingField(_)
            | RequestError::TypeMismatch { .. }
            | RequestError::DimensionMismatch { .. }
            | RequestError::ResultTooLarge { .. } => Stage::Decode,
            RequestError::SearchEngine(_) => Stage::Search,
            RequestError::Encoding(_) => Stage::Encode,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorBody {
    pub reason: String,
}

impl IntoResponse for RequestError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            reason: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}
