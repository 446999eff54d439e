use std::path::PathBuf;

use chrono::{DateTime, Utc};
use reqwest::blocking::RequestBuilder;
use serde::de::DeserializeOwned;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
  #[error("request failed: {0}")]
  Http(#[from] reqwest::Error),
  #[error("server answered {status}: {message}")]
  Status {
    status: reqwest::StatusCode,
    message: String,
  },
  #[error("malformed payload: {0}")]
  Json(#[from] serde_json::Error),
  #[error(transparent)]
  Io(#[from] std::io::Error),
  #[error("token not defined for bucket {0}, expected it in ${1}")]
  MissingToken(String, String),
  #[error("record {0} not found, run get_filebase_cids first")]
  MissingRecord(PathBuf),
  #[error("listing of {bucket} keeps answering pins at or after {before}, giving up")]
  StalledListing {
    bucket: String,
    before: DateTime<Utc>,
  },
}

impl Error {
  /// Builds a `Status` error out of a non-success response, keeping whatever
  /// message the server put in the body.
  pub(crate) fn from_response(resp: reqwest::blocking::Response) -> Error {
    let status = resp.status();
    let body = resp.text().unwrap_or_default();
    Error::Status {
      status,
      message: error_message(&body),
    }
  }
}

/// Sends the request and decodes a successful JSON answer.
pub(crate) fn send_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
  let resp = request.send()?;
  if !resp.status().is_success() {
    return Err(Error::from_response(resp));
  }
  let body = resp.text()?;
  Ok(serde_json::from_str(&body)?)
}

// Kubo answers `{"Message": ..}`, the pinning service `{"error": {"reason", "details"}}`.
fn error_message(body: &str) -> String {
  let value: serde_json::Value = match serde_json::from_str(body) {
    Ok(value) => value,
    Err(_) => return body.trim().to_string(),
  };
  if let Some(message) = value.get("Message").and_then(|m| m.as_str()) {
    return message.to_string();
  }
  if let Some(error) = value.get("error") {
    let reason = error.get("reason").and_then(|r| r.as_str()).unwrap_or_default();
    return match error.get("details").and_then(|d| d.as_str()) {
      Some(details) => format!("{}: {}", reason, details),
      None => reason.to_string(),
    };
  }
  body.trim().to_string()
}

#[cfg(test)]
mod tests {
  use super::error_message;

  #[test]
  fn kubo_error_body() {
    let body = r#"{"Message":"context deadline exceeded","Code":0,"Type":"error"}"#;
    assert_eq!(error_message(body), "context deadline exceeded");
  }

  #[test]
  fn pinning_service_error_body() {
    let body = r#"{"error":{"reason":"NOT_FOUND","details":"no pin with that requestid"}}"#;
    assert_eq!(error_message(body), "NOT_FOUND: no pin with that requestid");
  }

  #[test]
  fn plain_text_body() {
    assert_eq!(error_message("bad gateway\n"), "bad gateway");
  }
}
