//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every failure renders as `{"error": "<message>"}`. Domain errors keep
//! their message; internal failures are logged and replaced with a generic
//! one.

use axum::{
  Json,
  extract::rejection::{JsonRejection, PathRejection, QueryRejection},
  http::{HeaderValue, StatusCode, header},
  response::{IntoResponse, Response},
};
use sanctuari_core::Error as CoreError;
use serde_json::json;
use thiserror::Error;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error("unauthorized")]
  Unauthorized,

  #[error("{0}")]
  NotFound(String),

  #[error("{0}")]
  BadRequest(String),

  #[error("internal error: {0}")]
  Internal(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl From<CoreError> for ApiError {
  fn from(err: CoreError) -> Self {
    match err {
      CoreError::Unauthorized => Self::Unauthorized,

      CoreError::RfqNotFound(_)
      | CoreError::BidNotFound { .. }
      | CoreError::InvitationNotFound(_)
      | CoreError::MemberNotFound(_)
      | CoreError::ProductNotFound(_)
      | CoreError::QuestionNotFound(_) => Self::NotFound(err.to_string()),

      CoreError::InvalidTransition { .. }
      | CoreError::InvalidState { .. }
      | CoreError::TokenNotFound
      | CoreError::TokenExpired
      | CoreError::TokenConsumed
      | CoreError::RfqNotAcceptingBids(_)
      | CoreError::Validation(_) => Self::BadRequest(err.to_string()),

      CoreError::ConflictRetryable(_) | CoreError::Store(_) => Self::Internal(Box::new(err)),
    }
  }
}

impl From<JsonRejection> for ApiError {
  fn from(rejection: JsonRejection) -> Self { Self::BadRequest(rejection.body_text()) }
}

impl From<QueryRejection> for ApiError {
  fn from(rejection: QueryRejection) -> Self { Self::BadRequest(rejection.body_text()) }
}

impl From<PathRejection> for ApiError {
  fn from(rejection: PathRejection) -> Self { Self::BadRequest(rejection.body_text()) }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, message) = match &self {
      ApiError::Unauthorized => (StatusCode::UNAUTHORIZED, self.to_string()),
      ApiError::NotFound(m) => (StatusCode::NOT_FOUND, m.clone()),
      ApiError::BadRequest(m) => (StatusCode::BAD_REQUEST, m.clone()),
      ApiError::Internal(e) => {
        tracing::error!(error = %e, "request failed");
        (StatusCode::INTERNAL_SERVER_ERROR, "internal server error".to_owned())
      }
    };

    let mut res = (status, Json(json!({ "error": message }))).into_response();
    if status == StatusCode::UNAUTHORIZED {
      res.headers_mut().insert(
        header::WWW_AUTHENTICATE,
        HeaderValue::from_static("Basic realm=\"sanctuari\""),
      );
    }
    res
  }
}

#[cfg(test)]
mod tests {
  use sanctuari_core::{lifecycle::Guard, rfq::RfqStatus};
  use uuid::Uuid;

  use super::*;

  fn status_of(err: CoreError) -> StatusCode {
    ApiError::from(err).into_response().status()
  }

  #[test]
  fn domain_errors_map_to_client_statuses() {
    assert_eq!(status_of(CoreError::RfqNotFound(Uuid::nil())), StatusCode::NOT_FOUND);
    assert_eq!(status_of(CoreError::QuestionNotFound(Uuid::nil())), StatusCode::NOT_FOUND);
    assert_eq!(status_of(CoreError::TokenConsumed), StatusCode::BAD_REQUEST);
    assert_eq!(
      status_of(CoreError::InvalidTransition {
        from:  RfqStatus::Draft,
        to:    RfqStatus::Completed,
        guard: Guard::NotPermitted,
      }),
      StatusCode::BAD_REQUEST
    );
    assert_eq!(status_of(CoreError::Unauthorized), StatusCode::UNAUTHORIZED);
  }

  #[test]
  fn exhausted_retries_are_internal() {
    assert_eq!(
      status_of(CoreError::ConflictRetryable("publish")),
      StatusCode::INTERNAL_SERVER_ERROR
    );
  }

  #[tokio::test]
  async fn internal_detail_is_not_leaked() {
    let res = ApiError::from(CoreError::ConflictRetryable("submit_bid")).into_response();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
    let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(body["error"], "internal server error");
  }
}
