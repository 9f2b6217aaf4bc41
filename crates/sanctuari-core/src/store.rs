//! The `ProcurementStore` trait and the write-outcome types it returns.
//!
//! The trait is implemented by storage backends (e.g.
//! `sanctuari-store-sqlite`). The workflow in [`crate::workflow`] depends on
//! this abstraction, not on any concrete backend.
//!
//! Every write that can race with another request is expressed as a
//! conditional write that either commits atomically or reports that its
//! precondition no longer held. Backends never apply half of such a write.

use std::future::Future;

use uuid::Uuid;

use crate::{
  bid::Bid,
  directory::{InsuranceProduct, NetworkMember, NewMember, NewProduct},
  invitation::{BidInvitation, CompanyInvitation},
  lifecycle::TransitionRecord,
  message::Message,
  query::{MemberQuery, ProductQuery, RfqQuery},
  questionnaire::{Answer, AnswerInput, NewQuestion, Question},
  rfq::{NewRfq, PolicyDocument, Rfq, RfqPatch, RfqStatus},
};

// ─── Outcomes ────────────────────────────────────────────────────────────────

/// Result of a conditional write.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteOutcome<T> {
  Committed(T),
  /// The row no longer matched the expected precondition (status moved on,
  /// token already consumed, winner already chosen). Nothing was written.
  Stale,
  /// A uniqueness constraint rejected the write (token or number clash).
  /// Nothing was written; retrying with fresh values may succeed.
  Collision,
}

impl<T> WriteOutcome<T> {
  pub fn committed(self) -> Option<T> {
    match self {
      Self::Committed(v) => Some(v),
      Self::Stale | Self::Collision => None,
    }
  }

  pub fn try_map<U, E>(
    self,
    f: impl FnOnce(T) -> Result<U, E>,
  ) -> Result<WriteOutcome<U>, E> {
    Ok(match self {
      Self::Committed(v) => WriteOutcome::Committed(f(v)?),
      Self::Stale => WriteOutcome::Stale,
      Self::Collision => WriteOutcome::Collision,
    })
  }
}

/// Everything that must commit together when a bid is accepted.
///
/// The backend consumes `bid.invitation_id` (only if not yet consumed),
/// verifies the RFQ is still in `expected_status`, applies `transition` as a
/// compare-and-set from `expected_status` when present, and inserts the bid.
#[derive(Debug, Clone)]
pub struct BidCommit {
  pub bid:             Bid,
  pub expected_status: RfqStatus,
  pub transition:      Option<RfqStatus>,
}

/// Bid facts consulted by lifecycle guards.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BidStats {
  pub count:        u64,
  pub has_selected: bool,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a procurement store backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait ProcurementStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Directory ─────────────────────────────────────────────────────────

  fn add_product(
    &self,
    input: NewProduct,
  ) -> impl Future<Output = Result<InsuranceProduct, Self::Error>> + Send + '_;

  fn get_product(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<InsuranceProduct>, Self::Error>> + Send + '_;

  fn list_products<'a>(
    &'a self,
    query: &'a ProductQuery,
  ) -> impl Future<Output = Result<Vec<InsuranceProduct>, Self::Error>> + Send + 'a;

  fn add_member(
    &self,
    input: NewMember,
  ) -> impl Future<Output = Result<NetworkMember, Self::Error>> + Send + '_;

  fn get_member(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<NetworkMember>, Self::Error>> + Send + '_;

  /// Activate or deactivate a member. Returns `None` if it does not exist.
  fn set_member_active(
    &self,
    id: Uuid,
    active: bool,
  ) -> impl Future<Output = Result<Option<NetworkMember>, Self::Error>> + Send + '_;

  fn list_members<'a>(
    &'a self,
    query: &'a MemberQuery,
  ) -> impl Future<Output = Result<Vec<NetworkMember>, Self::Error>> + Send + 'a;

  // ── RFQs ──────────────────────────────────────────────────────────────

  /// Persist a new RFQ in `draft` with no number. Timestamps are set by the
  /// store.
  fn create_rfq(
    &self,
    input: NewRfq,
  ) -> impl Future<Output = Result<Rfq, Self::Error>> + Send + '_;

  fn get_rfq(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Rfq>, Self::Error>> + Send + '_;

  fn list_rfqs<'a>(
    &'a self,
    query: &'a RfqQuery,
  ) -> impl Future<Output = Result<Vec<Rfq>, Self::Error>> + Send + 'a;

  /// Apply `patch` only while the RFQ is still a draft; `Stale` otherwise.
  fn update_draft(
    &self,
    id: Uuid,
    patch: RfqPatch,
  ) -> impl Future<Output = Result<WriteOutcome<Rfq>, Self::Error>> + Send + '_;

  /// Record the policy document URL while the RFQ is a draft.
  fn set_policy_document(
    &self,
    id: Uuid,
    document: PolicyDocument,
  ) -> impl Future<Output = Result<WriteOutcome<Rfq>, Self::Error>> + Send + '_;

  /// Atomically take the next sequence for `year`, assign the formatted
  /// number and move `draft → published`. `Stale` if the RFQ is no longer an
  /// unnumbered draft; `Collision` if the number is already taken.
  fn publish_rfq(
    &self,
    id: Uuid,
    year: i32,
  ) -> impl Future<Output = Result<WriteOutcome<Rfq>, Self::Error>> + Send + '_;

  /// Compare-and-set the status from `from` to `to` and append a history
  /// record. Leaving `draft` (cancelling an unpublished RFQ) also assigns a
  /// number for the current year, so only drafts are ever unnumbered.
  fn transition_rfq(
    &self,
    id: Uuid,
    from: RfqStatus,
    to: RfqStatus,
  ) -> impl Future<Output = Result<WriteOutcome<Rfq>, Self::Error>> + Send + '_;

  /// Committed status changes, oldest first.
  fn rfq_history(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Vec<TransitionRecord>, Self::Error>> + Send + '_;

  // ── Questionnaires ────────────────────────────────────────────────────

  /// Persist a normalised question. Without an `order_index` it is placed
  /// after the product's last question.
  fn add_question(
    &self,
    input: NewQuestion,
  ) -> impl Future<Output = Result<Question, Self::Error>> + Send + '_;

  fn get_question(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Question>, Self::Error>> + Send + '_;

  /// A product's questions ordered by section name, then position.
  fn list_questions(
    &self,
    product_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Question>, Self::Error>> + Send + '_;

  fn list_answers(
    &self,
    rfq_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Answer>, Self::Error>> + Send + '_;

  /// Insert or replace the answer and touch the RFQ's `updated_at`, only
  /// while the RFQ is a draft whose product owns the question. `Stale`
  /// otherwise.
  fn save_answer(
    &self,
    rfq_id: Uuid,
    answer: AnswerInput,
  ) -> impl Future<Output = Result<WriteOutcome<Answer>, Self::Error>> + Send + '_;

  // ── Bid invitations ───────────────────────────────────────────────────

  /// `Collision` if the token is already in use.
  fn insert_bid_invitation(
    &self,
    invitation: BidInvitation,
  ) -> impl Future<Output = Result<WriteOutcome<BidInvitation>, Self::Error>> + Send + '_;

  fn get_bid_invitation(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<BidInvitation>, Self::Error>> + Send + '_;

  fn find_bid_invitation(
    &self,
    token: String,
  ) -> impl Future<Output = Result<Option<BidInvitation>, Self::Error>> + Send + '_;

  fn list_bid_invitations(
    &self,
    rfq_id: Uuid,
  ) -> impl Future<Output = Result<Vec<BidInvitation>, Self::Error>> + Send + '_;

  // ── Bids ──────────────────────────────────────────────────────────────

  /// See [`BidCommit`]. `Stale` if the token was consumed or the RFQ moved.
  fn commit_bid(
    &self,
    commit: BidCommit,
  ) -> impl Future<Output = Result<WriteOutcome<Bid>, Self::Error>> + Send + '_;

  fn get_bid(
    &self,
    id: Uuid,
  ) -> impl Future<Output = Result<Option<Bid>, Self::Error>> + Send + '_;

  /// Bids for an RFQ in submission order.
  fn list_bids(
    &self,
    rfq_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Bid>, Self::Error>> + Send + '_;

  fn bid_stats(
    &self,
    rfq_id: Uuid,
  ) -> impl Future<Output = Result<BidStats, Self::Error>> + Send + '_;

  /// Mark `bid_id` selected and move the RFQ `reviewing → completed` in one
  /// transaction. `Stale` if the RFQ left `reviewing` or a winner exists.
  fn select_bid(
    &self,
    rfq_id: Uuid,
    bid_id: Uuid,
  ) -> impl Future<Output = Result<WriteOutcome<(Rfq, Bid)>, Self::Error>> + Send + '_;

  // ── Messages ──────────────────────────────────────────────────────────

  /// Record a batch of messages; all or none are written.
  fn insert_messages(
    &self,
    messages: Vec<Message>,
  ) -> impl Future<Output = Result<Vec<Message>, Self::Error>> + Send + '_;

  /// Messages for an RFQ, oldest first.
  fn list_messages(
    &self,
    rfq_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Message>, Self::Error>> + Send + '_;

  // ── Company invitations ───────────────────────────────────────────────

  fn insert_company_invitation(
    &self,
    invitation: CompanyInvitation,
  ) -> impl Future<Output = Result<WriteOutcome<CompanyInvitation>, Self::Error>>
  + Send
  + '_;

  fn find_company_invitation(
    &self,
    token: String,
  ) -> impl Future<Output = Result<Option<CompanyInvitation>, Self::Error>> + Send + '_;

  /// Mark accepted by `user_id` if not yet accepted; `Stale` otherwise.
  fn accept_company_invitation(
    &self,
    id: Uuid,
    user_id: Uuid,
  ) -> impl Future<Output = Result<WriteOutcome<CompanyInvitation>, Self::Error>>
  + Send
  + '_;
}
