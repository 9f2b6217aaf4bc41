//! Encoding and decoding helpers between domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`)
//! so that lexical order is chronological order. Structured payloads (quotes,
//! documents, category tags) are stored as compact JSON. UUIDs are stored as
//! hyphenated lowercase strings.

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::Row;
use sanctuari_core::{
  bid::{Bid, BidDocument, Quote},
  directory::{InsuranceProduct, MemberType, NetworkMember},
  invitation::{BidInvitation, CompanyInvitation, CompanyRole},
  lifecycle::TransitionRecord,
  message::Message,
  questionnaire::{Answer, FieldType, Question},
  rfq::{PolicyDocument, Rfq, RfqStatus},
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

fn decode_opt_uuid(s: Option<String>) -> Result<Option<Uuid>> {
  s.as_deref().map(decode_uuid).transpose()
}

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(e.to_string()))
}

fn decode_opt_dt(s: Option<String>) -> Result<Option<DateTime<Utc>>> {
  s.as_deref().map(decode_dt).transpose()
}

pub fn decode_status(s: &str) -> Result<RfqStatus> {
  s.parse().map_err(|_| Error::Decode { column: "status", value: s.to_owned() })
}

fn decode_member_type(s: &str) -> Result<MemberType> {
  s.parse()
    .map_err(|_| Error::Decode { column: "member_type", value: s.to_owned() })
}

fn decode_field_type(s: &str) -> Result<FieldType> {
  s.parse()
    .map_err(|_| Error::Decode { column: "field_type", value: s.to_owned() })
}

fn decode_role(s: &str) -> Result<CompanyRole> {
  match s {
    "admin" => Ok(CompanyRole::Admin),
    "member" => Ok(CompanyRole::Member),
    other => Err(Error::Decode { column: "role", value: other.to_owned() }),
  }
}

// ─── Column lists ────────────────────────────────────────────────────────────

pub const PRODUCT_COLUMNS: &str =
  "product_id, name, category, description, is_active, created_at";

pub const MEMBER_COLUMNS: &str =
  "member_id, company_name, member_type, categories, contact_email, is_active, created_at";

pub const RFQ_COLUMNS: &str = "rfq_id, rfq_number, owner_id, company_id, product_id, title, \
   status, deadline, policy_document, created_at, updated_at, published_at";

pub const BID_INVITATION_COLUMNS: &str =
  "invitation_id, rfq_id, token, member_id, email, issued_at, expires_at, consumed_at";

pub const BID_COLUMNS: &str = "bid_id, rfq_id, invitation_id, member_id, bidder_company_name, \
   bidder_contact_person, bidder_email, bidder_phone, quote, documents, submitted_at, selected";

pub const COMPANY_INVITATION_COLUMNS: &str = "invitation_id, company_id, token, email, role, \
   invited_by, issued_at, expires_at, accepted_at, accepted_by";

pub const TRANSITION_COLUMNS: &str =
  "transition_id, rfq_id, from_status, to_status, recorded_at";

pub const QUESTION_COLUMNS: &str = "question_id, product_id, section, order_index, \
   question_text, field_type, options, guidance_text, placeholder, required";

pub const ANSWER_COLUMNS: &str = "rfq_id, question_id, value, file_url, updated_at";

pub const MESSAGE_COLUMNS: &str =
  "message_id, rfq_id, invitation_id, recipient_email, sender_id, body, sent_at";

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from an `insurance_products` row.
pub struct RawProduct {
  pub product_id:  String,
  pub name:        String,
  pub category:    String,
  pub description: Option<String>,
  pub is_active:   bool,
  pub created_at:  String,
}

impl RawProduct {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      product_id:  row.get(0)?,
      name:        row.get(1)?,
      category:    row.get(2)?,
      description: row.get(3)?,
      is_active:   row.get(4)?,
      created_at:  row.get(5)?,
    })
  }

  pub fn into_product(self) -> Result<InsuranceProduct> {
    Ok(InsuranceProduct {
      product_id:  decode_uuid(&self.product_id)?,
      name:        self.name,
      category:    self.category,
      description: self.description,
      is_active:   self.is_active,
      created_at:  decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from a `network_members` row.
pub struct RawMember {
  pub member_id:     String,
  pub company_name:  String,
  pub member_type:   String,
  pub categories:    String,
  pub contact_email: String,
  pub is_active:     bool,
  pub created_at:    String,
}

impl RawMember {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      member_id:     row.get(0)?,
      company_name:  row.get(1)?,
      member_type:   row.get(2)?,
      categories:    row.get(3)?,
      contact_email: row.get(4)?,
      is_active:     row.get(5)?,
      created_at:    row.get(6)?,
    })
  }

  pub fn into_member(self) -> Result<NetworkMember> {
    Ok(NetworkMember {
      member_id:     decode_uuid(&self.member_id)?,
      company_name:  self.company_name,
      member_type:   decode_member_type(&self.member_type)?,
      categories:    serde_json::from_str(&self.categories)?,
      contact_email: self.contact_email,
      is_active:     self.is_active,
      created_at:    decode_dt(&self.created_at)?,
    })
  }
}

/// Raw strings read directly from an `rfqs` row.
pub struct RawRfq {
  pub rfq_id:          String,
  pub rfq_number:      Option<String>,
  pub owner_id:        String,
  pub company_id:      Option<String>,
  pub product_id:      Option<String>,
  pub title:           String,
  pub status:          String,
  pub deadline:        Option<String>,
  pub policy_document: Option<String>,
  pub created_at:      String,
  pub updated_at:      String,
  pub published_at:    Option<String>,
}

impl RawRfq {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      rfq_id:          row.get(0)?,
      rfq_number:      row.get(1)?,
      owner_id:        row.get(2)?,
      company_id:      row.get(3)?,
      product_id:      row.get(4)?,
      title:           row.get(5)?,
      status:          row.get(6)?,
      deadline:        row.get(7)?,
      policy_document: row.get(8)?,
      created_at:      row.get(9)?,
      updated_at:      row.get(10)?,
      published_at:    row.get(11)?,
    })
  }

  pub fn into_rfq(self) -> Result<Rfq> {
    let policy_document: Option<PolicyDocument> = self
      .policy_document
      .as_deref()
      .map(serde_json::from_str)
      .transpose()?;

    Ok(Rfq {
      rfq_id: decode_uuid(&self.rfq_id)?,
      number: self.rfq_number,
      owner_id: decode_uuid(&self.owner_id)?,
      company_id: decode_opt_uuid(self.company_id)?,
      product_id: decode_opt_uuid(self.product_id)?,
      title: self.title,
      status: decode_status(&self.status)?,
      deadline: decode_opt_dt(self.deadline)?,
      policy_document,
      created_at: decode_dt(&self.created_at)?,
      updated_at: decode_dt(&self.updated_at)?,
      published_at: decode_opt_dt(self.published_at)?,
    })
  }
}

/// Raw strings read directly from a `bid_invitations` row.
pub struct RawBidInvitation {
  pub invitation_id: String,
  pub rfq_id:        String,
  pub token:         String,
  pub member_id:     Option<String>,
  pub email:         String,
  pub issued_at:     String,
  pub expires_at:    Option<String>,
  pub consumed_at:   Option<String>,
}

impl RawBidInvitation {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      invitation_id: row.get(0)?,
      rfq_id:        row.get(1)?,
      token:         row.get(2)?,
      member_id:     row.get(3)?,
      email:         row.get(4)?,
      issued_at:     row.get(5)?,
      expires_at:    row.get(6)?,
      consumed_at:   row.get(7)?,
    })
  }

  pub fn into_invitation(self) -> Result<BidInvitation> {
    Ok(BidInvitation {
      invitation_id: decode_uuid(&self.invitation_id)?,
      rfq_id:        decode_uuid(&self.rfq_id)?,
      token:         self.token,
      member_id:     decode_opt_uuid(self.member_id)?,
      email:         self.email,
      issued_at:     decode_dt(&self.issued_at)?,
      expires_at:    decode_opt_dt(self.expires_at)?,
      consumed_at:   decode_opt_dt(self.consumed_at)?,
    })
  }
}

/// Raw strings read directly from a `bids` row.
pub struct RawBid {
  pub bid_id:                String,
  pub rfq_id:                String,
  pub invitation_id:         String,
  pub member_id:             Option<String>,
  pub bidder_company_name:   String,
  pub bidder_contact_person: Option<String>,
  pub bidder_email:          String,
  pub bidder_phone:          Option<String>,
  pub quote:                 String,
  pub documents:             String,
  pub submitted_at:          String,
  pub selected:              bool,
}

impl RawBid {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      bid_id:                row.get(0)?,
      rfq_id:                row.get(1)?,
      invitation_id:         row.get(2)?,
      member_id:             row.get(3)?,
      bidder_company_name:   row.get(4)?,
      bidder_contact_person: row.get(5)?,
      bidder_email:          row.get(6)?,
      bidder_phone:          row.get(7)?,
      quote:                 row.get(8)?,
      documents:             row.get(9)?,
      submitted_at:          row.get(10)?,
      selected:              row.get(11)?,
    })
  }

  pub fn into_bid(self) -> Result<Bid> {
    let quote: Quote = serde_json::from_str(&self.quote)?;
    let documents: Vec<BidDocument> = serde_json::from_str(&self.documents)?;

    Ok(Bid {
      bid_id: decode_uuid(&self.bid_id)?,
      rfq_id: decode_uuid(&self.rfq_id)?,
      invitation_id: decode_uuid(&self.invitation_id)?,
      member_id: decode_opt_uuid(self.member_id)?,
      bidder_company_name: self.bidder_company_name,
      bidder_contact_person: self.bidder_contact_person,
      bidder_email: self.bidder_email,
      bidder_phone: self.bidder_phone,
      quote,
      documents,
      submitted_at: decode_dt(&self.submitted_at)?,
      selected: self.selected,
    })
  }
}

/// Raw strings read directly from a `company_invitations` row.
pub struct RawCompanyInvitation {
  pub invitation_id: String,
  pub company_id:    String,
  pub token:         String,
  pub email:         String,
  pub role:          String,
  pub invited_by:    String,
  pub issued_at:     String,
  pub expires_at:    Option<String>,
  pub accepted_at:   Option<String>,
  pub accepted_by:   Option<String>,
}

impl RawCompanyInvitation {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      invitation_id: row.get(0)?,
      company_id:    row.get(1)?,
      token:         row.get(2)?,
      email:         row.get(3)?,
      role:          row.get(4)?,
      invited_by:    row.get(5)?,
      issued_at:     row.get(6)?,
      expires_at:    row.get(7)?,
      accepted_at:   row.get(8)?,
      accepted_by:   row.get(9)?,
    })
  }

  pub fn into_invitation(self) -> Result<CompanyInvitation> {
    Ok(CompanyInvitation {
      invitation_id: decode_uuid(&self.invitation_id)?,
      company_id:    decode_uuid(&self.company_id)?,
      token:         self.token,
      email:         self.email,
      role:          decode_role(&self.role)?,
      invited_by:    decode_uuid(&self.invited_by)?,
      issued_at:     decode_dt(&self.issued_at)?,
      expires_at:    decode_opt_dt(self.expires_at)?,
      accepted_at:   decode_opt_dt(self.accepted_at)?,
      accepted_by:   decode_opt_uuid(self.accepted_by)?,
    })
  }
}

/// Raw strings read directly from an `rfq_transitions` row.
pub struct RawTransition {
  pub transition_id: String,
  pub rfq_id:        String,
  pub from_status:   String,
  pub to_status:     String,
  pub recorded_at:   String,
}

impl RawTransition {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      transition_id: row.get(0)?,
      rfq_id:        row.get(1)?,
      from_status:   row.get(2)?,
      to_status:     row.get(3)?,
      recorded_at:   row.get(4)?,
    })
  }

  pub fn into_record(self) -> Result<TransitionRecord> {
    Ok(TransitionRecord {
      transition_id: decode_uuid(&self.transition_id)?,
      rfq_id:        decode_uuid(&self.rfq_id)?,
      from:          decode_status(&self.from_status)?,
      to:            decode_status(&self.to_status)?,
      recorded_at:   decode_dt(&self.recorded_at)?,
    })
  }
}

/// Raw strings read directly from an `rfq_questions` row.
pub struct RawQuestion {
  pub question_id:   String,
  pub product_id:    String,
  pub section:       String,
  pub order_index:   u32,
  pub question_text: String,
  pub field_type:    String,
  pub options:       String,
  pub guidance_text: Option<String>,
  pub placeholder:   Option<String>,
  pub required:      bool,
}

impl RawQuestion {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      question_id:   row.get(0)?,
      product_id:    row.get(1)?,
      section:       row.get(2)?,
      order_index:   row.get(3)?,
      question_text: row.get(4)?,
      field_type:    row.get(5)?,
      options:       row.get(6)?,
      guidance_text: row.get(7)?,
      placeholder:   row.get(8)?,
      required:      row.get(9)?,
    })
  }

  pub fn into_question(self) -> Result<Question> {
    Ok(Question {
      question_id:   decode_uuid(&self.question_id)?,
      product_id:    decode_uuid(&self.product_id)?,
      section:       self.section,
      order_index:   self.order_index,
      question_text: self.question_text,
      field_type:    decode_field_type(&self.field_type)?,
      options:       serde_json::from_str(&self.options)?,
      guidance_text: self.guidance_text,
      placeholder:   self.placeholder,
      required:      self.required,
    })
  }
}

/// Raw strings read directly from an `rfq_answers` row.
pub struct RawAnswer {
  pub rfq_id:      String,
  pub question_id: String,
  pub value:       Option<String>,
  pub file_url:    Option<String>,
  pub updated_at:  String,
}

impl RawAnswer {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      rfq_id:      row.get(0)?,
      question_id: row.get(1)?,
      value:       row.get(2)?,
      file_url:    row.get(3)?,
      updated_at:  row.get(4)?,
    })
  }

  pub fn into_answer(self) -> Result<Answer> {
    let value: Option<serde_json::Value> =
      self.value.as_deref().map(serde_json::from_str).transpose()?;

    Ok(Answer {
      rfq_id: decode_uuid(&self.rfq_id)?,
      question_id: decode_uuid(&self.question_id)?,
      value,
      file_url: self.file_url,
      updated_at: decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw strings read directly from an `rfq_messages` row.
pub struct RawMessage {
  pub message_id:      String,
  pub rfq_id:          String,
  pub invitation_id:   String,
  pub recipient_email: String,
  pub sender_id:       String,
  pub body:            String,
  pub sent_at:         String,
}

impl RawMessage {
  pub fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      message_id:      row.get(0)?,
      rfq_id:          row.get(1)?,
      invitation_id:   row.get(2)?,
      recipient_email: row.get(3)?,
      sender_id:       row.get(4)?,
      body:            row.get(5)?,
      sent_at:         row.get(6)?,
    })
  }

  pub fn into_message(self) -> Result<Message> {
    Ok(Message {
      message_id:      decode_uuid(&self.message_id)?,
      rfq_id:          decode_uuid(&self.rfq_id)?,
      invitation_id:   decode_uuid(&self.invitation_id)?,
      recipient_email: self.recipient_email,
      sender_id:       decode_uuid(&self.sender_id)?,
      body:            self.body,
      sent_at:         decode_dt(&self.sent_at)?,
    })
  }
}
