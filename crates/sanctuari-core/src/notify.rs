//! The email-provider seam.
//!
//! Notifications are side effects of committed changes. A failing notifier
//! is logged and otherwise ignored; it never rolls back or fails the
//! operation that produced the notice.

use std::{convert::Infallible, future::Future};

use crate::{
  bid::Bid,
  invitation::{BidInvitation, CompanyInvitation},
  message::Message,
  rfq::Rfq,
};

/// Something that happened that an external party should hear about.
#[derive(Debug, Clone)]
pub enum Notice {
  RfqPublished {
    rfq: Rfq,
  },
  RfqCompleted {
    rfq:         Rfq,
    winning_bid: Bid,
  },
  BidInvitation {
    rfq:        Rfq,
    invitation: BidInvitation,
    resent:     bool,
  },
  CompanyInvitation {
    invitation: CompanyInvitation,
  },
  BidderMessage {
    rfq:     Rfq,
    message: Message,
  },
}

impl Notice {
  pub fn kind(&self) -> &'static str {
    match self {
      Self::RfqPublished { .. } => "rfq_published",
      Self::RfqCompleted { .. } => "rfq_completed",
      Self::BidInvitation { resent: false, .. } => "bid_invitation",
      Self::BidInvitation { resent: true, .. } => "bid_invitation_resent",
      Self::CompanyInvitation { .. } => "company_invitation",
      Self::BidderMessage { .. } => "bidder_message",
    }
  }
}

pub trait Notifier: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  fn notify(
    &self,
    notice: Notice,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;
}

/// Writes notices to the log instead of sending email. Used when no email
/// provider is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
  type Error = Infallible;

  async fn notify(&self, notice: Notice) -> Result<(), Infallible> {
    match &notice {
      Notice::RfqPublished { rfq } | Notice::RfqCompleted { rfq, .. } => {
        tracing::info!(kind = notice.kind(), rfq_id = %rfq.rfq_id, "notice");
      }
      Notice::BidInvitation { rfq, invitation, .. } => {
        tracing::info!(
          kind = notice.kind(),
          rfq_id = %rfq.rfq_id,
          to = %invitation.email,
          "notice"
        );
      }
      Notice::CompanyInvitation { invitation } => {
        tracing::info!(
          kind = notice.kind(),
          company_id = %invitation.company_id,
          to = %invitation.email,
          "notice"
        );
      }
      Notice::BidderMessage { rfq, message } => {
        tracing::info!(
          kind = notice.kind(),
          rfq_id = %rfq.rfq_id,
          to = %message.recipient_email,
          "notice"
        );
      }
    }
    Ok(())
  }
}
