//! RFQ — the unit of procurement work created by a customer.

use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

/// Largest policy document accepted from the file-storage provider.
pub const MAX_POLICY_DOCUMENT_BYTES: u64 = 16 * 1024 * 1024;

pub const POLICY_DOCUMENT_CONTENT_TYPE: &str = "application/pdf";

// ─── Status ──────────────────────────────────────────────────────────────────

/// Lifecycle status of an RFQ. Legal moves between variants are defined in
/// [`crate::lifecycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RfqStatus {
  Draft,
  Published,
  Bidding,
  Reviewing,
  Completed,
  Cancelled,
}

impl RfqStatus {
  pub const ALL: [RfqStatus; 6] = [
    Self::Draft,
    Self::Published,
    Self::Bidding,
    Self::Reviewing,
    Self::Completed,
    Self::Cancelled,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Draft => "draft",
      Self::Published => "published",
      Self::Bidding => "bidding",
      Self::Reviewing => "reviewing",
      Self::Completed => "completed",
      Self::Cancelled => "cancelled",
    }
  }

  /// Whether an invited party may still attach a bid.
  pub fn accepts_bids(self) -> bool {
    matches!(self, Self::Published | Self::Bidding)
  }
}

impl fmt::Display for RfqStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for RfqStatus {
  type Err = Error;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    Self::ALL
      .into_iter()
      .find(|status| status.as_str() == s)
      .ok_or_else(|| Error::Validation(format!("unknown rfq status: {s:?}")))
  }
}

// ─── Policy document ─────────────────────────────────────────────────────────

/// An uploaded policy document. Only the durable URL returned by the file
/// storage provider is kept; the contents are never read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyDocument {
  pub url:          String,
  pub file_name:    String,
  pub content_type: String,
  pub size_bytes:   u64,
}

impl PolicyDocument {
  pub fn validate(&self) -> Result<(), Error> {
    if self.url.trim().is_empty() {
      return Err(Error::Validation("document url is required".into()));
    }
    if self.content_type != POLICY_DOCUMENT_CONTENT_TYPE {
      return Err(Error::Validation(format!(
        "policy documents must be PDF, got {}",
        self.content_type
      )));
    }
    if self.size_bytes > MAX_POLICY_DOCUMENT_BYTES {
      return Err(Error::Validation(format!(
        "policy document is {} bytes, limit is {MAX_POLICY_DOCUMENT_BYTES}",
        self.size_bytes
      )));
    }
    Ok(())
  }
}

// ─── Rfq ─────────────────────────────────────────────────────────────────────

/// A request for quotation.
///
/// `number` is `Some` exactly when `status` is not [`RfqStatus::Draft`]; once
/// assigned it never changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rfq {
  pub rfq_id:          Uuid,
  pub number:          Option<String>,
  pub owner_id:        Uuid,
  pub company_id:      Option<Uuid>,
  pub product_id:      Option<Uuid>,
  pub title:           String,
  pub status:          RfqStatus,
  /// Submission deadline communicated to invitees.
  pub deadline:        Option<DateTime<Utc>>,
  pub policy_document: Option<PolicyDocument>,
  pub created_at:      DateTime<Utc>,
  pub updated_at:      DateTime<Utc>,
  pub published_at:    Option<DateTime<Utc>>,
}

impl Rfq {
  pub fn is_owned_by(&self, user_id: Uuid) -> bool { self.owner_id == user_id }
}

/// Input to [`crate::store::ProcurementStore::create_rfq`]. The store always
/// creates RFQs in `draft` without a number.
#[derive(Debug, Clone)]
pub struct NewRfq {
  pub owner_id:   Uuid,
  pub company_id: Option<Uuid>,
  pub product_id: Option<Uuid>,
  pub title:      String,
  pub deadline:   Option<DateTime<Utc>>,
}

/// Owner edits to a draft. `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RfqPatch {
  pub title:      Option<String>,
  pub product_id: Option<Uuid>,
  pub company_id: Option<Uuid>,
  pub deadline:   Option<DateTime<Utc>>,
}

impl RfqPatch {
  pub fn is_empty(&self) -> bool {
    self.title.is_none()
      && self.product_id.is_none()
      && self.company_id.is_none()
      && self.deadline.is_none()
  }
}
