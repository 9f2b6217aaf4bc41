//! Error types for `sanctuari-core`.

use thiserror::Error;
use uuid::Uuid;

use crate::{lifecycle::Guard, rfq::RfqStatus};

#[derive(Debug, Error)]
pub enum Error {
  #[error("unauthorized")]
  Unauthorized,

  #[error("rfq not found: {0}")]
  RfqNotFound(Uuid),

  #[error("bid {bid} not found on rfq {rfq}")]
  BidNotFound { rfq: Uuid, bid: Uuid },

  #[error("invitation not found: {0}")]
  InvitationNotFound(Uuid),

  #[error("network member not found: {0}")]
  MemberNotFound(Uuid),

  #[error("insurance product not found: {0}")]
  ProductNotFound(Uuid),

  #[error("question not found: {0}")]
  QuestionNotFound(Uuid),

  /// The requested lifecycle change is not in the transition table, or its
  /// guard is not satisfied.
  #[error("cannot move rfq from {from} to {to}: {guard}")]
  InvalidTransition {
    from:  RfqStatus,
    to:    RfqStatus,
    guard: Guard,
  },

  /// The operation requires the RFQ to be in a specific status.
  #[error("rfq is {current}, expected {expected}")]
  InvalidState {
    current:  RfqStatus,
    expected: RfqStatus,
  },

  #[error("invitation token not found")]
  TokenNotFound,

  #[error("invitation token has expired")]
  TokenExpired,

  #[error("invitation token has already been used")]
  TokenConsumed,

  #[error("rfq is {0} and is not accepting bids")]
  RfqNotAcceptingBids(RfqStatus),

  #[error("invalid input: {0}")]
  Validation(String),

  /// An atomic conditional write lost a race and the bounded retries were
  /// exhausted.
  #[error("conflicting concurrent write during {0}")]
  ConflictRetryable(&'static str),

  #[error("store error: {0}")]
  Store(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl Error {
  /// Wrap a backend error.
  pub fn store<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Store(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
