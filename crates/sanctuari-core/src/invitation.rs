//! Invitation tokens: capability strings that bind a party to an RFQ (bid
//! invitations) or to a company (company invitations).
//!
//! Bid invitations are single-use: one token, one bid. Company invitations
//! can be opened any number of times until they are accepted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

/// Allowed range for the validity window of a distributed bid invitation.
pub const INVITATION_EXPIRY_DAYS: std::ops::RangeInclusive<u32> = 1..=90;

/// Why a token can no longer be used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Unusable {
  Expired,
  Consumed,
}

impl From<Unusable> for Error {
  fn from(u: Unusable) -> Self {
    match u {
      Unusable::Expired => Error::TokenExpired,
      Unusable::Consumed => Error::TokenConsumed,
    }
  }
}

// ─── Bid invitations ─────────────────────────────────────────────────────────

/// A single-use link inviting a network member or an external email address
/// to bid on an RFQ.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidInvitation {
  pub invitation_id: Uuid,
  pub rfq_id:        Uuid,
  pub token:         String,
  pub member_id:     Option<Uuid>,
  pub email:         String,
  pub issued_at:     DateTime<Utc>,
  pub expires_at:    Option<DateTime<Utc>>,
  pub consumed_at:   Option<DateTime<Utc>>,
}

impl BidInvitation {
  pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
    self.expires_at.is_some_and(|at| now > at)
  }

  /// Consumption is checked before expiry so a used link reports as used.
  pub fn usability(&self, now: DateTime<Utc>) -> Result<(), Unusable> {
    if self.consumed_at.is_some() {
      Err(Unusable::Consumed)
    } else if self.is_expired(now) {
      Err(Unusable::Expired)
    } else {
      Ok(())
    }
  }
}

/// Who a distributed invitation goes to. Either a directory member (whose
/// contact email is used unless overridden) or a bare email address.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Recipient {
  pub member_id: Option<Uuid>,
  pub email:     Option<String>,
}

// ─── Company invitations ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CompanyRole {
  Admin,
  #[default]
  Member,
}

impl CompanyRole {
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Admin => "admin",
      Self::Member => "member",
    }
  }
}

/// An invitation for a user to join a company account.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompanyInvitation {
  pub invitation_id: Uuid,
  pub company_id:    Uuid,
  pub token:         String,
  pub email:         String,
  pub role:          CompanyRole,
  pub invited_by:    Uuid,
  pub issued_at:     DateTime<Utc>,
  pub expires_at:    Option<DateTime<Utc>>,
  pub accepted_at:   Option<DateTime<Utc>>,
  pub accepted_by:   Option<Uuid>,
}

impl CompanyInvitation {
  pub fn usability(&self, now: DateTime<Utc>) -> Result<(), Unusable> {
    if self.accepted_at.is_some() {
      Err(Unusable::Consumed)
    } else if self.expires_at.is_some_and(|at| now > at) {
      Err(Unusable::Expired)
    } else {
      Ok(())
    }
  }
}
