//! Bids — an invited insurer's or broker's quoted response to an RFQ.
//!
//! Bids are append-only. The only change a stored bid ever sees is the
//! one-time `selected` flag set when the owner picks a winner.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::Error;

/// Policy term used when the bidder does not state one.
pub const DEFAULT_POLICY_TERM_MONTHS: u32 = 12;

fn default_policy_term() -> u32 { DEFAULT_POLICY_TERM_MONTHS }

/// The monetary payload of a bid. The core stores it verbatim and only
/// checks that it is plausible.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Quote {
  pub premium_amount:     f64,
  pub coverage_amount:    f64,
  pub deductible:         Option<f64>,
  #[serde(default = "default_policy_term")]
  pub policy_term_months: u32,
  pub additional_terms:   Option<String>,
}

/// A supporting file uploaded alongside a bid. Only the storage URL is kept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BidDocument {
  pub file_name:       String,
  pub file_url:        String,
  pub file_type:       String,
  pub file_size_bytes: Option<u64>,
}

/// Everything the bidder supplies through the invitation link.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BidSubmission {
  pub bidder_company_name:   String,
  pub bidder_contact_person: Option<String>,
  pub bidder_email:          String,
  pub bidder_phone:          Option<String>,
  pub quote:                 Quote,
  #[serde(default)]
  pub documents:             Vec<BidDocument>,
}

impl BidSubmission {
  pub fn validate(&self) -> Result<(), Error> {
    if self.bidder_company_name.trim().is_empty() {
      return Err(Error::Validation("bidder company name is required".into()));
    }
    if !self.bidder_email.contains('@') {
      return Err(Error::Validation(format!(
        "invalid bidder email: {:?}",
        self.bidder_email
      )));
    }
    let quote = &self.quote;
    if !(quote.premium_amount.is_finite() && quote.premium_amount > 0.0) {
      return Err(Error::Validation("premium amount must be positive".into()));
    }
    if !(quote.coverage_amount.is_finite() && quote.coverage_amount > 0.0) {
      return Err(Error::Validation("coverage amount must be positive".into()));
    }
    if quote.deductible.is_some_and(|d| !d.is_finite() || d < 0.0) {
      return Err(Error::Validation("deductible cannot be negative".into()));
    }
    if quote.policy_term_months == 0 {
      return Err(Error::Validation("policy term must be at least one month".into()));
    }
    if let Some(doc) = self.documents.iter().find(|d| d.file_url.trim().is_empty()) {
      return Err(Error::Validation(format!(
        "document {:?} has no url",
        doc.file_name
      )));
    }
    Ok(())
  }
}

/// A stored bid.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Bid {
  pub bid_id:                Uuid,
  pub rfq_id:                Uuid,
  pub invitation_id:         Uuid,
  /// The directory member the invitation was issued to, if any.
  pub member_id:             Option<Uuid>,
  pub bidder_company_name:   String,
  pub bidder_contact_person: Option<String>,
  pub bidder_email:          String,
  pub bidder_phone:          Option<String>,
  pub quote:                 Quote,
  pub documents:             Vec<BidDocument>,
  pub submitted_at:          DateTime<Utc>,
  pub selected:              bool,
}
