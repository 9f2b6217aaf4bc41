//! [`Procurement`] — the RFQ and bid-collection operations.
//!
//! Each operation validates its input and lifecycle guards before touching
//! the store, then issues a single conditional write. When that write loses
//! a race the operation re-reads and re-validates, up to
//! [`Settings::max_conflict_retries`] times, so the caller sees either a
//! precise domain error or [`Error::ConflictRetryable`].

use std::{future::Future, sync::Arc};

use chrono::{DateTime, Datelike as _, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  Error, Result,
  bid::{Bid, BidSubmission},
  directory::{InsuranceProduct, NetworkMember, NewMember, NewProduct},
  ids,
  invitation::{
    BidInvitation, CompanyInvitation, CompanyRole, INVITATION_EXPIRY_DAYS, Recipient,
  },
  lifecycle::{self, GuardFacts, TransitionRecord},
  message::{Message, SendMessage},
  notify::{Notice, Notifier},
  query::{MemberQuery, ProductQuery, RfqQuery},
  questionnaire::{Answer, AnswerInput, NewQuestion, Question, Questionnaire},
  rfq::{NewRfq, PolicyDocument, Rfq, RfqPatch, RfqStatus},
  store::{BidCommit, ProcurementStore, WriteOutcome},
};

/// Title used for a new RFQ when neither the caller nor the product name
/// supplies one.
pub const FALLBACK_TITLE: &str = "Insurance Bid";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct Settings {
  /// How many times a lost conditional write is retried before giving up.
  pub max_conflict_retries: u32,
}

impl Default for Settings {
  fn default() -> Self { Self { max_conflict_retries: 3 } }
}

// ─── Inputs and views ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CreateRfq {
  pub company_id: Option<Uuid>,
  pub product_id: Option<Uuid>,
  pub title:      Option<String>,
  pub deadline:   Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Distribution {
  pub recipients:  Vec<Recipient>,
  /// Days until the issued links expire; must be within
  /// [`INVITATION_EXPIRY_DAYS`].
  pub expiry_days: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompanyInvite {
  pub email:       String,
  #[serde(default)]
  pub role:        CompanyRole,
  pub expiry_days: Option<u32>,
}

/// What an invitee sees when opening a bid link.
#[derive(Debug, Clone, Serialize)]
pub struct InvitationView {
  pub invitation_id: Uuid,
  pub rfq_id:        Uuid,
  pub rfq_number:    Option<String>,
  pub title:         String,
  pub deadline:      Option<DateTime<Utc>>,
  pub email:         String,
  pub expires_at:    Option<DateTime<Utc>>,
}

// ─── Service ─────────────────────────────────────────────────────────────────

pub struct Procurement<S, N> {
  store:    Arc<S>,
  notifier: N,
  settings: Settings,
}

impl<S, N> Procurement<S, N>
where
  S: ProcurementStore,
  N: Notifier,
{
  pub fn new(store: Arc<S>, notifier: N, settings: Settings) -> Self {
    Self { store, notifier, settings }
  }

  pub fn store(&self) -> &S { &self.store }

  // ── Directory ─────────────────────────────────────────────────────────

  pub async fn add_product(&self, input: NewProduct) -> Result<InsuranceProduct> {
    let input = input.normalized()?;
    self.store.add_product(input).await.map_err(Error::store)
  }

  pub async fn list_products(&self, query: &ProductQuery) -> Result<Vec<InsuranceProduct>> {
    self.store.list_products(query).await.map_err(Error::store)
  }

  pub async fn add_member(&self, input: NewMember) -> Result<NetworkMember> {
    let input = input.normalized()?;
    self.store.add_member(input).await.map_err(Error::store)
  }

  pub async fn set_member_active(&self, id: Uuid, active: bool) -> Result<NetworkMember> {
    let member = self
      .store
      .set_member_active(id, active)
      .await
      .map_err(Error::store)?
      .ok_or(Error::MemberNotFound(id))?;
    tracing::info!(member_id = %id, active, "member activity changed");
    Ok(member)
  }

  pub async fn list_members(&self, query: &MemberQuery) -> Result<Vec<NetworkMember>> {
    self.store.list_members(query).await.map_err(Error::store)
  }

  // ── RFQ content ───────────────────────────────────────────────────────

  pub async fn create_rfq(&self, actor: Uuid, input: CreateRfq) -> Result<Rfq> {
    let product = match input.product_id {
      Some(id) => Some(self.active_product(id).await?),
      None => None,
    };

    let title = match input.title.as_deref().map(str::trim) {
      Some(t) if !t.is_empty() => t.to_owned(),
      _ => product
        .as_ref()
        .map(|p| format!("{} Bid", p.name))
        .unwrap_or_else(|| FALLBACK_TITLE.to_owned()),
    };

    let rfq = self
      .store
      .create_rfq(NewRfq {
        owner_id: actor,
        company_id: input.company_id,
        product_id: input.product_id,
        title,
        deadline: input.deadline,
      })
      .await
      .map_err(Error::store)?;

    tracing::info!(rfq_id = %rfq.rfq_id, owner_id = %actor, "rfq created");
    Ok(rfq)
  }

  /// Fetch an RFQ owned by `actor`. Other users' RFQs read as not found.
  pub async fn get_rfq(&self, actor: Uuid, id: Uuid) -> Result<Rfq> {
    self
      .store
      .get_rfq(id)
      .await
      .map_err(Error::store)?
      .filter(|rfq| rfq.is_owned_by(actor))
      .ok_or(Error::RfqNotFound(id))
  }

  /// List `actor`'s RFQs; any owner in `query` is overridden.
  pub async fn list_rfqs(&self, actor: Uuid, mut query: RfqQuery) -> Result<Vec<Rfq>> {
    query.owner_id = Some(actor);
    self.store.list_rfqs(&query).await.map_err(Error::store)
  }

  pub async fn update_draft(&self, actor: Uuid, id: Uuid, mut patch: RfqPatch) -> Result<Rfq> {
    let rfq = self.get_rfq(actor, id).await?;
    require_status(&rfq, RfqStatus::Draft)?;

    if let Some(title) = patch.title.as_mut() {
      *title = title.trim().to_owned();
      if title.is_empty() {
        return Err(Error::Validation("title cannot be blank".into()));
      }
    }
    if let Some(product_id) = patch.product_id {
      self.active_product(product_id).await?;
    }
    if patch.is_empty() {
      return Ok(rfq);
    }

    match self.store.update_draft(id, patch).await.map_err(Error::store)? {
      WriteOutcome::Committed(rfq) => Ok(rfq),
      WriteOutcome::Stale | WriteOutcome::Collision => {
        Err(self.left_status(actor, id, RfqStatus::Draft).await)
      }
    }
  }

  /// Record a policy document already uploaded to file storage.
  pub async fn attach_policy_document(
    &self,
    actor: Uuid,
    id: Uuid,
    document: PolicyDocument,
  ) -> Result<Rfq> {
    document.validate()?;
    let rfq = self.get_rfq(actor, id).await?;
    require_status(&rfq, RfqStatus::Draft)?;

    match self.store.set_policy_document(id, document).await.map_err(Error::store)? {
      WriteOutcome::Committed(rfq) => Ok(rfq),
      WriteOutcome::Stale | WriteOutcome::Collision => {
        Err(self.left_status(actor, id, RfqStatus::Draft).await)
      }
    }
  }

  pub async fn history(&self, actor: Uuid, id: Uuid) -> Result<Vec<TransitionRecord>> {
    self.get_rfq(actor, id).await?;
    self.store.rfq_history(id).await.map_err(Error::store)
  }

  // ── Questionnaires ────────────────────────────────────────────────────

  pub async fn add_question(&self, input: NewQuestion) -> Result<Question> {
    let input = input.normalized()?;
    self
      .store
      .get_product(input.product_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::ProductNotFound(input.product_id))?;
    let question = self.store.add_question(input).await.map_err(Error::store)?;
    tracing::info!(
      question_id = %question.question_id,
      product_id = %question.product_id,
      "question added"
    );
    Ok(question)
  }

  /// The questions of the RFQ's product, grouped into sections. Empty while
  /// no product is chosen.
  pub async fn questionnaire(&self, actor: Uuid, rfq_id: Uuid) -> Result<Questionnaire> {
    let rfq = self.get_rfq(actor, rfq_id).await?;
    let Some(product_id) = rfq.product_id else {
      return Ok(Questionnaire::default());
    };
    let questions = self
      .store
      .list_questions(product_id)
      .await
      .map_err(Error::store)?;
    Ok(Questionnaire::group(questions))
  }

  pub async fn answers(&self, actor: Uuid, rfq_id: Uuid) -> Result<Vec<Answer>> {
    self.get_rfq(actor, rfq_id).await?;
    self.store.list_answers(rfq_id).await.map_err(Error::store)
  }

  /// Save the owner's answer to one question while the RFQ is a draft.
  pub async fn save_answer(
    &self,
    actor: Uuid,
    rfq_id: Uuid,
    input: AnswerInput,
  ) -> Result<Answer> {
    let input = &input.normalized();
    self
      .with_retries("save_answer", move || self.try_save_answer(actor, rfq_id, input))
      .await
  }

  async fn try_save_answer(
    &self,
    actor: Uuid,
    rfq_id: Uuid,
    input: &AnswerInput,
  ) -> Result<WriteOutcome<Answer>> {
    let rfq = self.get_rfq(actor, rfq_id).await?;
    require_status(&rfq, RfqStatus::Draft)?;
    self
      .store
      .get_question(input.question_id)
      .await
      .map_err(Error::store)?
      .filter(|q| rfq.product_id == Some(q.product_id))
      .ok_or(Error::QuestionNotFound(input.question_id))?;
    self
      .store
      .save_answer(rfq_id, input.clone())
      .await
      .map_err(Error::store)
  }

  // ── Lifecycle ─────────────────────────────────────────────────────────

  /// `draft → published`, assigning the RFQ number for the current year.
  pub async fn publish(&self, actor: Uuid, id: Uuid) -> Result<Rfq> {
    let rfq = self
      .with_retries("publish", move || self.try_publish(actor, id))
      .await?;

    tracing::info!(
      rfq_id = %id,
      number = rfq.number.as_deref().unwrap_or_default(),
      "rfq published"
    );
    self.notify(Notice::RfqPublished { rfq: rfq.clone() }).await;
    Ok(rfq)
  }

  async fn try_publish(&self, actor: Uuid, id: Uuid) -> Result<WriteOutcome<Rfq>> {
    let rfq = self.get_rfq(actor, id).await?;
    lifecycle::check_transition(rfq.status, RfqStatus::Published, &GuardFacts::of(&rfq))?;
    self
      .store
      .publish_rfq(id, Utc::now().year())
      .await
      .map_err(Error::store)
  }

  /// `published → bidding` on the owner's request.
  pub async fn open_bidding(&self, actor: Uuid, id: Uuid) -> Result<Rfq> {
    self.transition(actor, id, RfqStatus::Bidding).await
  }

  /// `bidding → reviewing`; requires at least one bid.
  pub async fn close_bidding(&self, actor: Uuid, id: Uuid) -> Result<Rfq> {
    self.transition(actor, id, RfqStatus::Reviewing).await
  }

  pub async fn cancel(&self, actor: Uuid, id: Uuid) -> Result<Rfq> {
    self.transition(actor, id, RfqStatus::Cancelled).await
  }

  async fn transition(&self, actor: Uuid, id: Uuid, to: RfqStatus) -> Result<Rfq> {
    let rfq = self
      .with_retries("transition", move || self.try_transition(actor, id, to))
      .await?;
    tracing::info!(rfq_id = %id, to = %to, "rfq status changed");
    Ok(rfq)
  }

  async fn try_transition(
    &self,
    actor: Uuid,
    id: Uuid,
    to: RfqStatus,
  ) -> Result<WriteOutcome<Rfq>> {
    let rfq = self.get_rfq(actor, id).await?;
    let stats = self.store.bid_stats(id).await.map_err(Error::store)?;
    let facts = GuardFacts::of(&rfq).with_bids(stats.count, stats.has_selected);
    lifecycle::check_transition(rfq.status, to, &facts)?;
    self
      .store
      .transition_rfq(id, rfq.status, to)
      .await
      .map_err(Error::store)
  }

  // ── Invitations ───────────────────────────────────────────────────────

  /// Issue one single-use bid invitation per recipient and notify each.
  ///
  /// Every recipient is resolved and validated before any invitation is
  /// written.
  pub async fn distribute(
    &self,
    actor: Uuid,
    rfq_id: Uuid,
    distribution: Distribution,
  ) -> Result<Vec<BidInvitation>> {
    if distribution.recipients.is_empty() {
      return Err(Error::Validation("at least one recipient is required".into()));
    }
    if !INVITATION_EXPIRY_DAYS.contains(&distribution.expiry_days) {
      return Err(Error::Validation(format!(
        "expiry days must be between {} and {}",
        INVITATION_EXPIRY_DAYS.start(),
        INVITATION_EXPIRY_DAYS.end()
      )));
    }

    let rfq = self.get_rfq(actor, rfq_id).await?;
    if !rfq.status.accepts_bids() {
      return Err(Error::RfqNotAcceptingBids(rfq.status));
    }

    let mut targets = Vec::with_capacity(distribution.recipients.len());
    for recipient in &distribution.recipients {
      targets.push(self.resolve_recipient(recipient).await?);
    }

    let expires_at = Utc::now() + Duration::days(i64::from(distribution.expiry_days));
    let mut issued = Vec::with_capacity(targets.len());
    for (member_id, email) in targets {
      let email = email.as_str();
      let invitation = self
        .with_retries("issue_invitation", move || {
          self.try_issue_invitation(rfq_id, member_id, email, expires_at)
        })
        .await?;
      self
        .notify(Notice::BidInvitation {
          rfq:        rfq.clone(),
          invitation: invitation.clone(),
          resent:     false,
        })
        .await;
      issued.push(invitation);
    }

    tracing::info!(rfq_id = %rfq_id, count = issued.len(), "bid invitations issued");
    Ok(issued)
  }

  async fn resolve_recipient(&self, recipient: &Recipient) -> Result<(Option<Uuid>, String)> {
    let email = recipient.email.as_deref().map(str::trim).filter(|e| !e.is_empty());

    match recipient.member_id {
      Some(member_id) => {
        let member = self
          .store
          .get_member(member_id)
          .await
          .map_err(Error::store)?
          .ok_or(Error::MemberNotFound(member_id))?;
        if !member.is_active {
          return Err(Error::Validation(format!(
            "network member {} is inactive",
            member.company_name
          )));
        }
        let email = email.map(str::to_owned).unwrap_or(member.contact_email);
        Ok((Some(member_id), email))
      }
      None => match email {
        Some(email) if email.contains('@') => Ok((None, email.to_owned())),
        Some(email) => Err(Error::Validation(format!("invalid recipient email: {email:?}"))),
        None => Err(Error::Validation(
          "each recipient needs a member id or an email".into(),
        )),
      },
    }
  }

  async fn try_issue_invitation(
    &self,
    rfq_id: Uuid,
    member_id: Option<Uuid>,
    email: &str,
    expires_at: DateTime<Utc>,
  ) -> Result<WriteOutcome<BidInvitation>> {
    let invitation = BidInvitation {
      invitation_id: Uuid::new_v4(),
      rfq_id,
      token: ids::bid_invitation_token(),
      member_id,
      email: email.to_owned(),
      issued_at: Utc::now(),
      expires_at: Some(expires_at),
      consumed_at: None,
    };
    self
      .store
      .insert_bid_invitation(invitation)
      .await
      .map_err(Error::store)
  }

  pub async fn list_invitations(&self, actor: Uuid, rfq_id: Uuid) -> Result<Vec<BidInvitation>> {
    self.get_rfq(actor, rfq_id).await?;
    self.store.list_bid_invitations(rfq_id).await.map_err(Error::store)
  }

  /// Send an open invitation's link again.
  pub async fn resend_invitation(
    &self,
    actor: Uuid,
    rfq_id: Uuid,
    invitation_id: Uuid,
  ) -> Result<BidInvitation> {
    let rfq = self.get_rfq(actor, rfq_id).await?;
    let invitation = self
      .store
      .get_bid_invitation(invitation_id)
      .await
      .map_err(Error::store)?
      .filter(|inv| inv.rfq_id == rfq_id)
      .ok_or(Error::InvitationNotFound(invitation_id))?;

    invitation.usability(Utc::now())?;
    if !rfq.status.accepts_bids() {
      return Err(Error::RfqNotAcceptingBids(rfq.status));
    }

    self
      .notify(Notice::BidInvitation {
        rfq,
        invitation: invitation.clone(),
        resent: true,
      })
      .await;
    Ok(invitation)
  }

  /// Resolve a bid link for the invitee, applying the same checks as
  /// [`Self::submit_bid`].
  pub async fn view_invitation(&self, token: &str) -> Result<InvitationView> {
    let (invitation, rfq) = self.open_bid_invitation(token).await?;
    if !rfq.status.accepts_bids() {
      return Err(Error::RfqNotAcceptingBids(rfq.status));
    }
    Ok(InvitationView {
      invitation_id: invitation.invitation_id,
      rfq_id:        rfq.rfq_id,
      rfq_number:    rfq.number,
      title:         rfq.title,
      deadline:      rfq.deadline,
      email:         invitation.email,
      expires_at:    invitation.expires_at,
    })
  }

  async fn open_bid_invitation(&self, token: &str) -> Result<(BidInvitation, Rfq)> {
    if !ids::is_well_formed_token(token, ids::BID_INVITATION_TOKEN_LEN) {
      return Err(Error::TokenNotFound);
    }
    let invitation = self
      .store
      .find_bid_invitation(token.to_owned())
      .await
      .map_err(Error::store)?
      .ok_or(Error::TokenNotFound)?;
    invitation.usability(Utc::now())?;

    let rfq = self
      .store
      .get_rfq(invitation.rfq_id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::RfqNotFound(invitation.rfq_id))?;
    Ok((invitation, rfq))
  }

  // ── Bids ──────────────────────────────────────────────────────────────

  /// Accept a bid through an invitation token.
  ///
  /// Consumes the token and, on an RFQ's first bid, moves it
  /// `published → bidding` in the same store transaction.
  pub async fn submit_bid(&self, token: &str, submission: BidSubmission) -> Result<Bid> {
    submission.validate()?;
    let submission = &submission;

    let bid = self
      .with_retries("submit_bid", move || self.try_submit_bid(token, submission))
      .await?;

    tracing::info!(
      bid_id = %bid.bid_id,
      rfq_id = %bid.rfq_id,
      invitation_id = %bid.invitation_id,
      "bid submitted"
    );
    Ok(bid)
  }

  async fn try_submit_bid(
    &self,
    token: &str,
    submission: &BidSubmission,
  ) -> Result<WriteOutcome<Bid>> {
    let (invitation, rfq) = self.open_bid_invitation(token).await?;
    let transition = lifecycle::on_bid_received(rfq.status)?;

    let bid = Bid {
      bid_id:                Uuid::new_v4(),
      rfq_id:                rfq.rfq_id,
      invitation_id:         invitation.invitation_id,
      member_id:             invitation.member_id,
      bidder_company_name:   submission.bidder_company_name.trim().to_owned(),
      bidder_contact_person: submission.bidder_contact_person.clone(),
      bidder_email:          submission.bidder_email.trim().to_owned(),
      bidder_phone:          submission.bidder_phone.clone(),
      quote:                 submission.quote.clone(),
      documents:             submission.documents.clone(),
      submitted_at:          Utc::now(),
      selected:              false,
    };

    let outcome = self
      .store
      .commit_bid(BidCommit { bid, expected_status: rfq.status, transition })
      .await
      .map_err(Error::store)?;

    if let (WriteOutcome::Committed(_), Some(to)) = (&outcome, transition) {
      tracing::info!(rfq_id = %rfq.rfq_id, from = %rfq.status, to = %to, "first bid received");
    }
    Ok(outcome)
  }

  pub async fn list_bids(&self, actor: Uuid, rfq_id: Uuid) -> Result<Vec<Bid>> {
    self.get_rfq(actor, rfq_id).await?;
    self.store.list_bids(rfq_id).await.map_err(Error::store)
  }

  /// Pick the winning bid and complete the RFQ.
  pub async fn select_winning_bid(
    &self,
    actor: Uuid,
    rfq_id: Uuid,
    bid_id: Uuid,
  ) -> Result<(Rfq, Bid)> {
    let (rfq, bid) = self
      .with_retries("select_winning_bid", move || self.try_select(actor, rfq_id, bid_id))
      .await?;

    tracing::info!(rfq_id = %rfq_id, bid_id = %bid_id, "winning bid selected");
    self
      .notify(Notice::RfqCompleted { rfq: rfq.clone(), winning_bid: bid.clone() })
      .await;
    Ok((rfq, bid))
  }

  async fn try_select(
    &self,
    actor: Uuid,
    rfq_id: Uuid,
    bid_id: Uuid,
  ) -> Result<WriteOutcome<(Rfq, Bid)>> {
    let rfq = self.get_rfq(actor, rfq_id).await?;
    require_status(&rfq, RfqStatus::Reviewing)?;

    self
      .store
      .get_bid(bid_id)
      .await
      .map_err(Error::store)?
      .filter(|bid| bid.rfq_id == rfq_id)
      .ok_or(Error::BidNotFound { rfq: rfq_id, bid: bid_id })?;

    let stats = self.store.bid_stats(rfq_id).await.map_err(Error::store)?;
    // The guard is evaluated as of after the selection.
    let facts = GuardFacts::of(&rfq).with_bids(stats.count, true);
    lifecycle::check_transition(rfq.status, RfqStatus::Completed, &facts)?;

    self
      .store
      .select_bid(rfq_id, bid_id)
      .await
      .map_err(Error::store)
  }

  // ── Messages ──────────────────────────────────────────────────────────

  /// Message one invitee, or every invitee when no invitation is named.
  /// Each recipient gets its own record and notice.
  pub async fn send_message(
    &self,
    actor: Uuid,
    rfq_id: Uuid,
    message: SendMessage,
  ) -> Result<Vec<Message>> {
    let body = message.text.trim();
    if body.is_empty() {
      return Err(Error::Validation("message text is required".into()));
    }

    let rfq = self.get_rfq(actor, rfq_id).await?;
    let invitations = self
      .store
      .list_bid_invitations(rfq_id)
      .await
      .map_err(Error::store)?;
    let recipients = match message.invitation_id {
      Some(id) => vec![
        invitations
          .into_iter()
          .find(|inv| inv.invitation_id == id)
          .ok_or(Error::InvitationNotFound(id))?,
      ],
      None => invitations,
    };
    if recipients.is_empty() {
      return Err(Error::Validation("rfq has no invitees to message".into()));
    }

    let sent_at = Utc::now();
    let messages = recipients
      .into_iter()
      .map(|inv| Message {
        message_id: Uuid::new_v4(),
        rfq_id,
        invitation_id: inv.invitation_id,
        recipient_email: inv.email,
        sender_id: actor,
        body: body.to_owned(),
        sent_at,
      })
      .collect();
    let messages = self
      .store
      .insert_messages(messages)
      .await
      .map_err(Error::store)?;

    tracing::info!(rfq_id = %rfq_id, count = messages.len(), "messages sent");
    for message in &messages {
      self
        .notify(Notice::BidderMessage { rfq: rfq.clone(), message: message.clone() })
        .await;
    }
    Ok(messages)
  }

  pub async fn list_messages(&self, actor: Uuid, rfq_id: Uuid) -> Result<Vec<Message>> {
    self.get_rfq(actor, rfq_id).await?;
    self.store.list_messages(rfq_id).await.map_err(Error::store)
  }

  // ── Company invitations ───────────────────────────────────────────────

  pub async fn invite_to_company(
    &self,
    actor: Uuid,
    company_id: Uuid,
    invite: CompanyInvite,
  ) -> Result<CompanyInvitation> {
    let email = invite.email.trim().to_owned();
    if !email.contains('@') {
      return Err(Error::Validation(format!("invalid email: {email:?}")));
    }
    if invite
      .expiry_days
      .is_some_and(|days| !INVITATION_EXPIRY_DAYS.contains(&days))
    {
      return Err(Error::Validation(format!(
        "expiry days must be between {} and {}",
        INVITATION_EXPIRY_DAYS.start(),
        INVITATION_EXPIRY_DAYS.end()
      )));
    }

    let email = email.as_str();
    let role = invite.role;
    let expires_at = invite
      .expiry_days
      .map(|days| Utc::now() + Duration::days(i64::from(days)));

    let invitation = self
      .with_retries("invite_to_company", move || {
        self.try_invite_to_company(actor, company_id, email, role, expires_at)
      })
      .await?;

    tracing::info!(company_id = %company_id, role = role.as_str(), "company invitation issued");
    self
      .notify(Notice::CompanyInvitation { invitation: invitation.clone() })
      .await;
    Ok(invitation)
  }

  async fn try_invite_to_company(
    &self,
    actor: Uuid,
    company_id: Uuid,
    email: &str,
    role: CompanyRole,
    expires_at: Option<DateTime<Utc>>,
  ) -> Result<WriteOutcome<CompanyInvitation>> {
    let invitation = CompanyInvitation {
      invitation_id: Uuid::new_v4(),
      company_id,
      token: ids::company_invitation_token(),
      email: email.to_owned(),
      role,
      invited_by: actor,
      issued_at: Utc::now(),
      expires_at,
      accepted_at: None,
      accepted_by: None,
    };
    self
      .store
      .insert_company_invitation(invitation)
      .await
      .map_err(Error::store)
  }

  /// Accept a company invitation. The token stays valid until this
  /// succeeds once.
  pub async fn accept_company_invitation(
    &self,
    token: &str,
    user_id: Uuid,
  ) -> Result<CompanyInvitation> {
    if !ids::is_well_formed_token(token, ids::COMPANY_INVITATION_TOKEN_LEN) {
      return Err(Error::TokenNotFound);
    }
    let invitation = self
      .with_retries("accept_company_invitation", move || {
        self.try_accept(token, user_id)
      })
      .await?;
    tracing::info!(
      company_id = %invitation.company_id,
      user_id = %user_id,
      "company invitation accepted"
    );
    Ok(invitation)
  }

  async fn try_accept(
    &self,
    token: &str,
    user_id: Uuid,
  ) -> Result<WriteOutcome<CompanyInvitation>> {
    let invitation = self
      .store
      .find_company_invitation(token.to_owned())
      .await
      .map_err(Error::store)?
      .ok_or(Error::TokenNotFound)?;
    invitation.usability(Utc::now())?;
    self
      .store
      .accept_company_invitation(invitation.invitation_id, user_id)
      .await
      .map_err(Error::store)
  }

  // ── Helpers ───────────────────────────────────────────────────────────

  async fn active_product(&self, id: Uuid) -> Result<InsuranceProduct> {
    let product = self
      .store
      .get_product(id)
      .await
      .map_err(Error::store)?
      .ok_or(Error::ProductNotFound(id))?;
    if !product.is_active {
      return Err(Error::Validation(format!("product {} is no longer offered", product.name)));
    }
    Ok(product)
  }

  /// Build the error for a conditional write that found the RFQ had already
  /// left `expected`.
  async fn left_status(&self, actor: Uuid, id: Uuid, expected: RfqStatus) -> Error {
    match self.get_rfq(actor, id).await {
      Ok(rfq) => Error::InvalidState { current: rfq.status, expected },
      Err(err) => err,
    }
  }

  /// Run `attempt` until it commits, a domain error surfaces, or the retry
  /// budget is spent.
  async fn with_retries<T, F, Fut>(&self, operation: &'static str, mut attempt: F) -> Result<T>
  where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<WriteOutcome<T>>>,
  {
    for round in 0..=self.settings.max_conflict_retries {
      match attempt().await? {
        WriteOutcome::Committed(value) => return Ok(value),
        WriteOutcome::Stale | WriteOutcome::Collision => {
          tracing::debug!(operation, round, "conditional write lost a race, retrying");
        }
      }
    }
    tracing::warn!(operation, "giving up after repeated write conflicts");
    Err(Error::ConflictRetryable(operation))
  }

  async fn notify(&self, notice: Notice) {
    let kind = notice.kind();
    if let Err(err) = self.notifier.notify(notice).await {
      tracing::warn!(kind, error = %err, "notification failed");
    }
  }
}

fn require_status(rfq: &Rfq, expected: RfqStatus) -> Result<()> {
  if rfq.status == expected {
    Ok(())
  } else {
    Err(Error::InvalidState { current: rfq.status, expected })
  }
}
