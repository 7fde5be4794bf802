// Error types for backend calls.
// Clone-able so a failure can sit in a cache entry and be shown to every subscriber.

use std::collections::BTreeMap;

use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApiError {
  #[error("Backend unreachable: {0}")]
  Transport(String),

  #[error("Not found: {0}")]
  NotFound(String),

  #[error("Request rejected ({status}): {message}")]
  Rejected {
    status: u16,
    message: String,
    /// Field-level messages reported by the backend
    fields: BTreeMap<String, String>,
  },

  #[error("Server error ({status}): {message}")]
  Server { status: u16, message: String },

  #[error("Unexpected response: {0}")]
  Decode(String),

  #[error("Invalid request URL: {0}")]
  Url(String),
}

pub type Result<T> = std::result::Result<T, ApiError>;

/// Error body shape the backend uses for 4xx/5xx responses.
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
  #[serde(default, alias = "error", alias = "Message")]
  message: Option<String>,
  #[serde(default, alias = "Errors", alias = "fields")]
  errors: BTreeMap<String, String>,
}

impl ApiError {
  /// Classify a non-success response.
  pub fn from_response(status: StatusCode, path: &str, body: &str) -> Self {
    let parsed: ApiErrorBody = serde_json::from_str(body).unwrap_or_default();
    let message = parsed
      .message
      .filter(|m| !m.is_empty())
      .unwrap_or_else(|| {
        let trimmed = body.trim();
        if trimmed.is_empty() {
          status
            .canonical_reason()
            .unwrap_or("unknown error")
            .to_string()
        } else {
          trimmed.to_string()
        }
      });

    if status == StatusCode::NOT_FOUND {
      ApiError::NotFound(path.to_string())
    } else if status.is_client_error() {
      ApiError::Rejected {
        status: status.as_u16(),
        message,
        fields: parsed.errors,
      }
    } else {
      ApiError::Server {
        status: status.as_u16(),
        message,
      }
    }
  }

  pub fn is_not_found(&self) -> bool {
    matches!(self, ApiError::NotFound(_))
  }

  /// Field messages to render next to form inputs, if the backend sent any.
  pub fn field_errors(&self) -> Option<&BTreeMap<String, String>> {
    match self {
      ApiError::Rejected { fields, .. } if !fields.is_empty() => Some(fields),
      _ => None,
    }
  }
}

impl From<reqwest::Error> for ApiError {
  fn from(err: reqwest::Error) -> Self {
    if err.is_decode() {
      ApiError::Decode(err.to_string())
    } else {
      ApiError::Transport(err.to_string())
    }
  }
}

impl From<serde_json::Error> for ApiError {
  fn from(err: serde_json::Error) -> Self {
    ApiError::Decode(err.to_string())
  }
}

impl From<url::ParseError> for ApiError {
  fn from(err: url::ParseError) -> Self {
    ApiError::Url(err.to_string())
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_not_found() {
    let err = ApiError::from_response(StatusCode::NOT_FOUND, "/api/v1/ipam/networks/N1", "");
    assert!(err.is_not_found());
    assert_eq!(err.to_string(), "Not found: /api/v1/ipam/networks/N1");
  }

  #[test]
  fn test_rejected_with_field_errors() {
    let body = r#"{"message": "validation failed", "errors": {"gateway": "Gateway outside network"}}"#;
    let err = ApiError::from_response(StatusCode::UNPROCESSABLE_ENTITY, "/x", body);

    match &err {
      ApiError::Rejected {
        status, message, ..
      } => {
        assert_eq!(*status, 422);
        assert_eq!(message, "validation failed");
      }
      other => panic!("unexpected error: {other:?}"),
    }
    assert_eq!(
      err
        .field_errors()
        .and_then(|f| f.get("gateway"))
        .map(String::as_str),
      Some("Gateway outside network")
    );
  }

  #[test]
  fn test_plain_text_body() {
    let err = ApiError::from_response(StatusCode::BAD_REQUEST, "/x", "name taken\n");
    assert_eq!(
      err,
      ApiError::Rejected {
        status: 400,
        message: "name taken".to_string(),
        fields: BTreeMap::new(),
      }
    );
    assert!(err.field_errors().is_none());
  }

  #[test]
  fn test_server_error_uses_reason_when_body_empty() {
    let err = ApiError::from_response(StatusCode::BAD_GATEWAY, "/x", "");
    assert_eq!(
      err,
      ApiError::Server {
        status: 502,
        message: "Bad Gateway".to_string(),
      }
    );
  }
}
