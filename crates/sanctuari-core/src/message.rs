//! Messages from an RFQ owner to the parties invited to bid on it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One message as delivered to one invitee.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
  pub message_id:      Uuid,
  pub rfq_id:          Uuid,
  pub invitation_id:   Uuid,
  pub recipient_email: String,
  pub sender_id:       Uuid,
  pub body:            String,
  pub sent_at:         DateTime<Utc>,
}

/// Body of a send. Without an `invitation_id` the message goes to every
/// invitation issued for the RFQ.
#[derive(Debug, Clone, Deserialize)]
pub struct SendMessage {
  pub text:          String,
  #[serde(default)]
  pub invitation_id: Option<Uuid>,
}
