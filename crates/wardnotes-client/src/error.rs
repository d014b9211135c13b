//! Error types for `wardnotes-client`.

use reqwest::{Method, StatusCode};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
  /// Connection, timeout, or body transfer failure.
  #[error("request failed: {0}")]
  Http(#[from] reqwest::Error),

  /// The API answered with a non-success status. `message` is the `detail`
  /// field of a JSON error body when there is one, else the body verbatim.
  #[error("Failed to {method} {path}: {message}")]
  Status {
    method:  Method,
    path:    String,
    status:  StatusCode,
    message: String,
  },

  #[error("invalid JSON in response: {0}")]
  Json(#[from] serde_json::Error),

  /// The direct PUT to blob storage was rejected.
  #[error("File upload failed ({status})")]
  Upload { status: StatusCode },

  #[error("No access token found. Please login first.")]
  MissingToken,
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
