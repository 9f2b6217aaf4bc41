//! The RFQ lifecycle state machine.
//!
//! ```text
//! draft ──▶ published ──▶ bidding ──▶ reviewing ──▶ completed
//!   │           │            │
//!   └───────────┴────────────┴──▶ cancelled
//! ```
//!
//! Transitions only move forward; `cancelled` is the single side exit. Every
//! status change in the crate, including the automatic `published → bidding`
//! on the first bid, is validated here before it reaches the store.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error,
  rfq::{Rfq, RfqStatus},
};

// ─── Guards ──────────────────────────────────────────────────────────────────

/// The condition that blocked a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Guard {
  /// The pair is not in the transition table at all.
  NotPermitted,
  ProductRequired,
  DeadlineRequired,
  NumberAlreadyAssigned,
  NoBids,
  NoSelectedBid,
  WinnerAlreadySelected,
}

impl fmt::Display for Guard {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      Self::NotPermitted => "transition is not permitted",
      Self::ProductRequired => "an insurance product must be selected",
      Self::DeadlineRequired => "a submission deadline must be set",
      Self::NumberAlreadyAssigned => "an rfq number is already assigned",
      Self::NoBids => "no bids have been received",
      Self::NoSelectedBid => "no winning bid is selected",
      Self::WinnerAlreadySelected => "a winning bid is already selected",
    })
  }
}

/// Facts about an RFQ that guards are evaluated against.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GuardFacts {
  pub has_product:      bool,
  pub has_deadline:     bool,
  pub has_number:       bool,
  pub bid_count:        u64,
  pub has_selected_bid: bool,
}

impl GuardFacts {
  /// Facts readable from the RFQ row alone. Bid facts default to "none".
  pub fn of(rfq: &Rfq) -> Self {
    Self {
      has_product:      rfq.product_id.is_some(),
      has_deadline:     rfq.deadline.is_some(),
      has_number:       rfq.number.is_some(),
      bid_count:        0,
      has_selected_bid: false,
    }
  }

  pub fn with_bids(mut self, bid_count: u64, has_selected_bid: bool) -> Self {
    self.bid_count = bid_count;
    self.has_selected_bid = has_selected_bid;
    self
  }
}

// ─── Table ───────────────────────────────────────────────────────────────────

/// Statuses reachable from `from` in one step.
pub fn successors(from: RfqStatus) -> &'static [RfqStatus] {
  use RfqStatus::*;
  match from {
    Draft => &[Published, Cancelled],
    Published => &[Bidding, Cancelled],
    Bidding => &[Reviewing, Cancelled],
    Reviewing => &[Completed],
    Completed | Cancelled => &[],
  }
}

pub fn is_permitted(from: RfqStatus, to: RfqStatus) -> bool {
  successors(from).contains(&to)
}

/// Validate `from → to` against the table and its guard.
pub fn check_transition(
  from: RfqStatus,
  to: RfqStatus,
  facts: &GuardFacts,
) -> Result<(), Error> {
  let deny = |guard| Err(Error::InvalidTransition { from, to, guard });

  if !is_permitted(from, to) {
    return deny(Guard::NotPermitted);
  }

  match to {
    RfqStatus::Draft | RfqStatus::Bidding => Ok(()),
    RfqStatus::Published => {
      if !facts.has_product {
        deny(Guard::ProductRequired)
      } else if !facts.has_deadline {
        deny(Guard::DeadlineRequired)
      } else if facts.has_number {
        deny(Guard::NumberAlreadyAssigned)
      } else {
        Ok(())
      }
    }
    RfqStatus::Reviewing if facts.bid_count == 0 => deny(Guard::NoBids),
    RfqStatus::Reviewing => Ok(()),
    RfqStatus::Completed if !facts.has_selected_bid => {
      deny(Guard::NoSelectedBid)
    }
    RfqStatus::Completed => Ok(()),
    RfqStatus::Cancelled if facts.has_selected_bid => {
      deny(Guard::WinnerAlreadySelected)
    }
    RfqStatus::Cancelled => Ok(()),
  }
}

/// The transition a newly received bid triggers, if any.
///
/// A first bid on a `published` RFQ opens bidding; later bids leave the
/// status alone. Any other status refuses the bid.
pub fn on_bid_received(status: RfqStatus) -> Result<Option<RfqStatus>, Error> {
  match status {
    RfqStatus::Published => {
      check_transition(status, RfqStatus::Bidding, &GuardFacts::default())?;
      Ok(Some(RfqStatus::Bidding))
    }
    RfqStatus::Bidding => Ok(None),
    RfqStatus::Draft
    | RfqStatus::Reviewing
    | RfqStatus::Completed
    | RfqStatus::Cancelled => Err(Error::RfqNotAcceptingBids(status)),
  }
}

// ─── History ─────────────────────────────────────────────────────────────────

/// An append-only record of a committed status change.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransitionRecord {
  pub transition_id: Uuid,
  pub rfq_id:        Uuid,
  pub from:          RfqStatus,
  pub to:            RfqStatus,
  pub recorded_at:   DateTime<Utc>,
}
