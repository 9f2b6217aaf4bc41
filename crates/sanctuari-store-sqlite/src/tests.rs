//! Integration tests for `SqliteStore` and the procurement workflow running
//! on top of it, against an in-memory database.

use std::sync::{Arc, Mutex};

use chrono::{Datelike as _, Duration, Utc};
use sanctuari_core::{
  Error,
  bid::{BidSubmission, Quote},
  directory::{MemberType, NewMember, NewProduct},
  ids,
  invitation::{BidInvitation, CompanyRole, Recipient},
  lifecycle::Guard,
  message::SendMessage,
  notify::{LogNotifier, Notice, Notifier},
  query::{MemberQuery, MemberSort, ProductQuery, RfqQuery, SortOrder},
  questionnaire::{AnswerInput, FieldType, NewQuestion},
  rfq::{Rfq, RfqPatch, RfqStatus},
  store::{ProcurementStore, WriteOutcome},
  workflow::{CompanyInvite, CreateRfq, Distribution, FALLBACK_TITLE, Procurement, Settings},
};
use serde_json::json;
use uuid::Uuid;

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn service() -> Procurement<SqliteStore, LogNotifier> {
  Procurement::new(Arc::new(store().await), LogNotifier, Settings::default())
}

fn member(name: &str, member_type: MemberType, categories: &[&str]) -> NewMember {
  NewMember {
    company_name: name.into(),
    member_type,
    categories: categories.iter().map(|c| c.to_string()).collect(),
    contact_email: format!("bids@{}.example", name.to_lowercase().replace(' ', "-")),
  }
}

fn submission(company: &str) -> BidSubmission {
  BidSubmission {
    bidder_company_name:   company.into(),
    bidder_contact_person: Some("Jo Broker".into()),
    bidder_email:          "quotes@bidder.example".into(),
    bidder_phone:          None,
    quote:                 Quote {
      premium_amount:     12_500.0,
      coverage_amount:    1_000_000.0,
      deductible:         Some(5_000.0),
      policy_term_months: 12,
      additional_terms:   None,
    },
    documents:             vec![],
  }
}

/// A published RFQ owned by `owner`, with its product set and a deadline.
async fn published_rfq<N: Notifier>(svc: &Procurement<SqliteStore, N>, owner: Uuid) -> Rfq {
  let product = svc
    .add_product(NewProduct {
      name:        "Cyber Liability".into(),
      category:    "cyber".into(),
      description: None,
    })
    .await
    .unwrap();
  let rfq = svc
    .create_rfq(owner, CreateRfq {
      product_id: Some(product.product_id),
      deadline: Some(Utc::now() + Duration::days(14)),
      ..Default::default()
    })
    .await
    .unwrap();
  svc.publish(owner, rfq.rfq_id).await.unwrap()
}

/// Distribute `rfq` to `n` external email addresses and return their tokens.
async fn tokens<N: Notifier>(
  svc: &Procurement<SqliteStore, N>,
  owner: Uuid,
  rfq_id: Uuid,
  n: usize,
) -> Vec<String> {
  let recipients = (0..n)
    .map(|i| Recipient { member_id: None, email: Some(format!("uw{i}@carrier.example")) })
    .collect();
  svc
    .distribute(owner, rfq_id, Distribution { recipients, expiry_days: 7 })
    .await
    .unwrap()
    .into_iter()
    .map(|inv| inv.token)
    .collect()
}

// ─── Directory ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn products_filter_by_category_and_search() {
  let svc = service().await;
  let products = [
    ("Marine Cargo", "marine"),
    ("Cyber Liability", "cyber"),
    ("cyber Extortion", "Cyber"),
  ];
  for (name, category) in products {
    svc
      .add_product(NewProduct { name: name.into(), category: category.into(), description: None })
      .await
      .unwrap();
  }

  let cyber = svc
    .list_products(&ProductQuery { category: Some("CYBER".into()), ..Default::default() })
    .await
    .unwrap();
  let names: Vec<_> = cyber.iter().map(|p| p.name.as_str()).collect();
  assert_eq!(names, ["cyber Extortion", "Cyber Liability"]);

  let found = svc
    .list_products(&ProductQuery { search: Some("CARGO".into()), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].category, "marine");
}

#[tokio::test]
async fn search_folds_non_ascii_case() {
  let svc = service().await;
  for (name, category) in [("Ärzte Haftpflicht", "liability"), ("Øresund Cargo", "marine")] {
    svc
      .add_product(NewProduct { name: name.into(), category: category.into(), description: None })
      .await
      .unwrap();
  }
  svc.add_member(member("Société Générale Re", MemberType::Insurer, &["marine"])).await.unwrap();

  let found = svc
    .list_products(&ProductQuery { search: Some("ärzte".into()), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(found.len(), 1);
  assert_eq!(found[0].name, "Ärzte Haftpflicht");

  let found = svc
    .list_products(&ProductQuery { search: Some("ØRESUND".into()), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(found.len(), 1);

  let hits = svc
    .list_members(&MemberQuery { search: Some("SOCIÉTÉ".into()), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(hits.len(), 1);

  let owner = Uuid::new_v4();
  svc
    .create_rfq(owner, CreateRfq { title: Some("Ölplattform 2026".into()), ..Default::default() })
    .await
    .unwrap();
  let rfqs = svc
    .list_rfqs(owner, RfqQuery { search: Some("ölPLATT".into()), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(rfqs.len(), 1);
}

#[tokio::test]
async fn member_filters_compose_with_and() {
  let svc = service().await;
  svc.add_member(member("Acme Re", MemberType::Insurer, &["cyber", "marine"])).await.unwrap();
  svc.add_member(member("acme brokers", MemberType::Broker, &["cyber"])).await.unwrap();
  svc.add_member(member("Beacon Mutual", MemberType::Insurer, &["cyber"])).await.unwrap();
  svc.add_member(member("Harbor Marine", MemberType::Insurer, &["marine"])).await.unwrap();

  let hits = svc
    .list_members(&MemberQuery {
      member_type: Some(MemberType::Insurer),
      category: Some("cyber".into()),
      search: Some("ACME".into()),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(hits.len(), 1);
  assert_eq!(hits[0].company_name, "Acme Re");

  let cyber = svc
    .list_members(&MemberQuery { category: Some("cyber".into()), ..Default::default() })
    .await
    .unwrap();
  let names: Vec<_> = cyber.iter().map(|m| m.company_name.as_str()).collect();
  assert_eq!(names, ["acme brokers", "Acme Re", "Beacon Mutual"]);
}

#[tokio::test]
async fn members_default_order_and_descending() {
  let svc = service().await;
  for name in ["charlie", "Alpha", "bravo"] {
    svc.add_member(member(name, MemberType::Broker, &["cyber"])).await.unwrap();
  }

  let asc = svc.list_members(&MemberQuery::default()).await.unwrap();
  let names: Vec<_> = asc.iter().map(|m| m.company_name.as_str()).collect();
  assert_eq!(names, ["Alpha", "bravo", "charlie"]);

  let desc = svc
    .list_members(&MemberQuery {
      sort: MemberSort::CompanyName,
      order: SortOrder::Desc,
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(desc[0].company_name, "charlie");
}

#[tokio::test]
async fn inactive_members_are_hidden_unless_requested() {
  let svc = service().await;
  let gone = svc.add_member(member("Gone Re", MemberType::Insurer, &["cyber"])).await.unwrap();
  svc.add_member(member("Here Re", MemberType::Insurer, &["cyber"])).await.unwrap();

  let updated = svc.set_member_active(gone.member_id, false).await.unwrap();
  assert!(!updated.is_active);

  let visible = svc.list_members(&MemberQuery::default()).await.unwrap();
  assert_eq!(visible.len(), 1);
  assert_eq!(visible[0].company_name, "Here Re");

  let all = svc
    .list_members(&MemberQuery { include_inactive: true, ..Default::default() })
    .await
    .unwrap();
  assert_eq!(all.len(), 2);

  assert!(matches!(
    svc.set_member_active(Uuid::new_v4(), true).await,
    Err(Error::MemberNotFound(_))
  ));
}

#[tokio::test]
async fn member_paging() {
  let svc = service().await;
  for name in ["a", "b", "c", "d"] {
    svc.add_member(member(name, MemberType::Broker, &["cyber"])).await.unwrap();
  }
  let page = svc
    .list_members(&MemberQuery { limit: Some(2), offset: Some(1), ..Default::default() })
    .await
    .unwrap();
  let names: Vec<_> = page.iter().map(|m| m.company_name.as_str()).collect();
  assert_eq!(names, ["b", "c"]);
}

// ─── RFQ content ─────────────────────────────────────────────────────────────

#[tokio::test]
async fn create_rfq_defaults_title_from_product() {
  let svc = service().await;
  let owner = Uuid::new_v4();
  let product = svc
    .add_product(NewProduct { name: "D&O".into(), category: "liability".into(), description: None })
    .await
    .unwrap();

  let named = svc
    .create_rfq(owner, CreateRfq { product_id: Some(product.product_id), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(named.title, "D&O Bid");
  assert_eq!(named.status, RfqStatus::Draft);
  assert!(named.number.is_none());

  let bare = svc.create_rfq(owner, CreateRfq::default()).await.unwrap();
  assert_eq!(bare.title, FALLBACK_TITLE);

  let fetched = svc.get_rfq(owner, named.rfq_id).await.unwrap();
  assert_eq!(fetched.product_id, Some(product.product_id));
}

#[tokio::test]
async fn other_users_rfqs_read_as_not_found() {
  let svc = service().await;
  let rfq = svc.create_rfq(Uuid::new_v4(), CreateRfq::default()).await.unwrap();
  assert!(matches!(
    svc.get_rfq(Uuid::new_v4(), rfq.rfq_id).await,
    Err(Error::RfqNotFound(id)) if id == rfq.rfq_id
  ));
}

#[tokio::test]
async fn drafts_are_editable_until_published() {
  let svc = service().await;
  let owner = Uuid::new_v4();
  let rfq = published_rfq(&svc, owner).await;

  let err = svc
    .update_draft(owner, rfq.rfq_id, RfqPatch {
      title: Some("Renamed".into()),
      ..Default::default()
    })
    .await
    .unwrap_err();
  assert!(matches!(
    err,
    Error::InvalidState { current: RfqStatus::Published, expected: RfqStatus::Draft }
  ));

  let draft = svc.create_rfq(owner, CreateRfq::default()).await.unwrap();
  let renamed = svc
    .update_draft(owner, draft.rfq_id, RfqPatch {
      title: Some("  Fleet cover ".into()),
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(renamed.title, "Fleet cover");
}

#[tokio::test]
async fn list_rfqs_is_owner_scoped_and_hides_cancelled() {
  let svc = service().await;
  let owner = Uuid::new_v4();
  for title in ["Marine 2025", "cyber renewal", "Aviation"] {
    svc
      .create_rfq(owner, CreateRfq { title: Some(title.into()), ..Default::default() })
      .await
      .unwrap();
  }
  svc
    .create_rfq(Uuid::new_v4(), CreateRfq { title: Some("Not mine".into()), ..Default::default() })
    .await
    .unwrap();

  let mine = svc.list_rfqs(owner, RfqQuery::default()).await.unwrap();
  let titles: Vec<_> = mine.iter().map(|r| r.title.as_str()).collect();
  assert_eq!(titles, ["Aviation", "cyber renewal", "Marine 2025"]);

  svc.cancel(owner, mine[0].rfq_id).await.unwrap();
  assert_eq!(svc.list_rfqs(owner, RfqQuery::default()).await.unwrap().len(), 2);

  let hidden = svc
    .list_rfqs(owner, RfqQuery { status: Some(RfqStatus::Cancelled), ..Default::default() })
    .await
    .unwrap();
  assert!(hidden.is_empty());

  let cancelled = svc
    .list_rfqs(
      owner,
      RfqQuery {
        status: Some(RfqStatus::Cancelled),
        include_inactive: true,
        ..Default::default()
      },
    )
    .await
    .unwrap();
  assert_eq!(cancelled.len(), 1);
  assert_eq!(
    svc
      .list_rfqs(owner, RfqQuery { include_inactive: true, ..Default::default() })
      .await
      .unwrap()
      .len(),
    3
  );

  let searched = svc
    .list_rfqs(owner, RfqQuery { search: Some("MARINE".into()), ..Default::default() })
    .await
    .unwrap();
  assert_eq!(searched.len(), 1);
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

#[tokio::test]
async fn publish_requires_product_and_deadline() {
  let svc = service().await;
  let owner = Uuid::new_v4();

  let rfq = svc.create_rfq(owner, CreateRfq::default()).await.unwrap();
  assert!(matches!(
    svc.publish(owner, rfq.rfq_id).await,
    Err(Error::InvalidTransition { guard: Guard::ProductRequired, .. })
  ));

  let product = svc
    .add_product(NewProduct {
      name:        "Property".into(),
      category:    "property".into(),
      description: None,
    })
    .await
    .unwrap();
  svc
    .update_draft(owner, rfq.rfq_id, RfqPatch {
      product_id: Some(product.product_id),
      ..Default::default()
    })
    .await
    .unwrap();
  assert!(matches!(
    svc.publish(owner, rfq.rfq_id).await,
    Err(Error::InvalidTransition { guard: Guard::DeadlineRequired, .. })
  ));

  let still_draft = svc.get_rfq(owner, rfq.rfq_id).await.unwrap();
  assert_eq!(still_draft.status, RfqStatus::Draft);
  assert!(still_draft.number.is_none());
}

#[tokio::test]
async fn publish_numbers_sequentially_within_a_year() {
  let svc = service().await;
  let owner = Uuid::new_v4();
  let year = Utc::now().year();

  let first = published_rfq(&svc, owner).await;
  let second = published_rfq(&svc, owner).await;

  assert_eq!(first.status, RfqStatus::Published);
  assert_eq!(first.number.as_deref(), Some(format!("RFQ-{year}-0001").as_str()));
  assert_eq!(second.number.as_deref(), Some(format!("RFQ-{year}-0002").as_str()));
  assert!(first.published_at.is_some());
  assert_eq!(ids::parse_rfq_number(second.number.as_deref().unwrap()), Some((year, 2)));
}

#[tokio::test]
async fn republishing_is_not_permitted_and_keeps_the_number() {
  let svc = service().await;
  let owner = Uuid::new_v4();
  let rfq = published_rfq(&svc, owner).await;

  assert!(matches!(
    svc.publish(owner, rfq.rfq_id).await,
    Err(Error::InvalidTransition {
      from: RfqStatus::Published,
      to: RfqStatus::Published,
      guard: Guard::NotPermitted,
    })
  ));
  let fetched = svc.get_rfq(owner, rfq.rfq_id).await.unwrap();
  assert_eq!(fetched.number, rfq.number);
}

#[tokio::test]
async fn cancelling_a_draft_assigns_a_number() {
  let svc = service().await;
  let owner = Uuid::new_v4();
  let draft = svc.create_rfq(owner, CreateRfq::default()).await.unwrap();

  let cancelled = svc.cancel(owner, draft.rfq_id).await.unwrap();
  assert_eq!(cancelled.status, RfqStatus::Cancelled);
  assert!(cancelled.number.is_some());
  assert!(cancelled.published_at.is_none());

  assert!(matches!(
    svc.cancel(owner, draft.rfq_id).await,
    Err(Error::InvalidTransition { guard: Guard::NotPermitted, .. })
  ));
}

#[tokio::test]
async fn closing_bidding_needs_a_bid() {
  let svc = service().await;
  let owner = Uuid::new_v4();
  let rfq = published_rfq(&svc, owner).await;

  let bidding = svc.open_bidding(owner, rfq.rfq_id).await.unwrap();
  assert_eq!(bidding.status, RfqStatus::Bidding);

  assert!(matches!(
    svc.close_bidding(owner, rfq.rfq_id).await,
    Err(Error::InvalidTransition { guard: Guard::NoBids, .. })
  ));
}

#[tokio::test]
async fn history_records_each_transition() {
  let svc = service().await;
  let owner = Uuid::new_v4();
  let rfq = published_rfq(&svc, owner).await;
  let token = tokens(&svc, owner, rfq.rfq_id, 1).await.remove(0);
  svc.submit_bid(&token, submission("Acme")).await.unwrap();
  svc.close_bidding(owner, rfq.rfq_id).await.unwrap();

  let history = svc.history(owner, rfq.rfq_id).await.unwrap();
  let steps: Vec<_> = history.iter().map(|t| (t.from, t.to)).collect();
  assert_eq!(steps, [
    (RfqStatus::Draft, RfqStatus::Published),
    (RfqStatus::Published, RfqStatus::Bidding),
    (RfqStatus::Bidding, RfqStatus::Reviewing),
  ]);
}

// ─── Distribution ────────────────────────────────────────────────────────────

#[tokio::test]
async fn distribute_validates_before_writing() {
  let svc = service().await;
  let owner = Uuid::new_v4();
  let rfq = published_rfq(&svc, owner).await;
  let active = svc.add_member(member("Active Re", MemberType::Insurer, &["cyber"])).await.unwrap();
  let idle = svc.add_member(member("Idle Re", MemberType::Insurer, &["cyber"])).await.unwrap();
  svc.set_member_active(idle.member_id, false).await.unwrap();

  let bad_expiry = Distribution {
    recipients:  vec![Recipient { member_id: Some(active.member_id), email: None }],
    expiry_days: 91,
  };
  assert!(matches!(
    svc.distribute(owner, rfq.rfq_id, bad_expiry).await,
    Err(Error::Validation(_))
  ));

  let with_inactive = Distribution {
    recipients:  vec![
      Recipient { member_id: Some(active.member_id), email: None },
      Recipient { member_id: Some(idle.member_id), email: None },
    ],
    expiry_days: 7,
  };
  assert!(matches!(
    svc.distribute(owner, rfq.rfq_id, with_inactive).await,
    Err(Error::Validation(_))
  ));
  assert!(svc.list_invitations(owner, rfq.rfq_id).await.unwrap().is_empty());

  let ok = Distribution {
    recipients:  vec![
      Recipient { member_id: Some(active.member_id), email: None },
      Recipient { member_id: None, email: Some("ext@carrier.example".into()) },
    ],
    expiry_days: 30,
  };
  let issued = svc.distribute(owner, rfq.rfq_id, ok).await.unwrap();
  assert_eq!(issued.len(), 2);
  assert_eq!(issued[0].email, active.contact_email);
  assert_eq!(issued[0].member_id, Some(active.member_id));
  assert!(issued.iter().all(|i| i.token.len() == ids::BID_INVITATION_TOKEN_LEN));
  assert_ne!(issued[0].token, issued[1].token);
}

#[tokio::test]
async fn drafts_cannot_be_distributed() {
  let svc = service().await;
  let owner = Uuid::new_v4();
  let draft = svc.create_rfq(owner, CreateRfq::default()).await.unwrap();
  let distribution = Distribution {
    recipients:  vec![Recipient { member_id: None, email: Some("a@b.example".into()) }],
    expiry_days: 7,
  };
  assert!(matches!(
    svc.distribute(owner, draft.rfq_id, distribution).await,
    Err(Error::RfqNotAcceptingBids(RfqStatus::Draft))
  ));
}

// ─── Bids ────────────────────────────────────────────────────────────────────

#[tokio::test]
async fn first_bid_opens_bidding_and_later_bids_do_not() {
  let svc = service().await;
  let owner = Uuid::new_v4();
  let rfq = published_rfq(&svc, owner).await;
  let tokens = tokens(&svc, owner, rfq.rfq_id, 2).await;

  let first = svc.submit_bid(&tokens[0], submission("Acme")).await.unwrap();
  assert_eq!(first.rfq_id, rfq.rfq_id);
  assert!(!first.selected);
  assert_eq!(svc.get_rfq(owner, rfq.rfq_id).await.unwrap().status, RfqStatus::Bidding);

  svc.submit_bid(&tokens[1], submission("Beacon")).await.unwrap();
  let after = svc.get_rfq(owner, rfq.rfq_id).await.unwrap();
  assert_eq!(after.status, RfqStatus::Bidding);
  assert_eq!(after.number, rfq.number);

  let bids = svc.list_bids(owner, rfq.rfq_id).await.unwrap();
  let bidders: Vec<_> = bids.iter().map(|b| b.bidder_company_name.as_str()).collect();
  assert_eq!(bidders, ["Acme", "Beacon"]);
}

#[tokio::test]
async fn tokens_are_single_use() {
  let svc = service().await;
  let owner = Uuid::new_v4();
  let rfq = published_rfq(&svc, owner).await;
  let token = tokens(&svc, owner, rfq.rfq_id, 1).await.remove(0);

  svc.submit_bid(&token, submission("Acme")).await.unwrap();
  assert!(matches!(
    svc.submit_bid(&token, submission("Acme again")).await,
    Err(Error::TokenConsumed)
  ));
  assert_eq!(svc.list_bids(owner, rfq.rfq_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn unknown_and_malformed_tokens_are_not_found() {
  let svc = service().await;
  assert!(matches!(
    svc.submit_bid(&ids::bid_invitation_token(), submission("Acme")).await,
    Err(Error::TokenNotFound)
  ));
  assert!(matches!(
    svc.submit_bid("../etc/passwd", submission("Acme")).await,
    Err(Error::TokenNotFound)
  ));
}

#[tokio::test]
async fn expired_tokens_are_refused() {
  let svc = service().await;
  let owner = Uuid::new_v4();
  let rfq = published_rfq(&svc, owner).await;

  let issued_at = Utc::now() - Duration::days(10);
  let invitation = BidInvitation {
    invitation_id: Uuid::new_v4(),
    rfq_id: rfq.rfq_id,
    token: ids::bid_invitation_token(),
    member_id: None,
    email: "late@carrier.example".into(),
    issued_at,
    expires_at: Some(issued_at + Duration::days(3)),
    consumed_at: None,
  };
  let token = invitation.token.clone();
  assert!(matches!(
    svc.store().insert_bid_invitation(invitation).await.unwrap(),
    WriteOutcome::Committed(_)
  ));

  assert!(matches!(svc.submit_bid(&token, submission("Late")).await, Err(Error::TokenExpired)));
  assert!(matches!(svc.view_invitation(&token).await, Err(Error::TokenExpired)));
  assert_eq!(svc.get_rfq(owner, rfq.rfq_id).await.unwrap().status, RfqStatus::Published);
}

#[tokio::test]
async fn bids_on_closed_rfqs_are_refused() {
  let svc = service().await;
  let owner = Uuid::new_v4();
  let rfq = published_rfq(&svc, owner).await;
  let tokens = tokens(&svc, owner, rfq.rfq_id, 2).await;

  svc.cancel(owner, rfq.rfq_id).await.unwrap();
  assert!(matches!(
    svc.submit_bid(&tokens[0], submission("Acme")).await,
    Err(Error::RfqNotAcceptingBids(RfqStatus::Cancelled))
  ));
}

#[tokio::test]
async fn concurrent_submissions_with_one_token_yield_one_bid() {
  let svc = service().await;
  let owner = Uuid::new_v4();
  let rfq = published_rfq(&svc, owner).await;
  let token = tokens(&svc, owner, rfq.rfq_id, 1).await.remove(0);

  let (a, b) = tokio::join!(
    svc.submit_bid(&token, submission("Acme")),
    svc.submit_bid(&token, submission("Acme")),
  );
  let succeeded = [&a, &b].iter().filter(|r| r.is_ok()).count();
  assert_eq!(succeeded, 1);
  assert!(
    matches!(a, Err(Error::TokenConsumed)) || matches!(b, Err(Error::TokenConsumed))
  );
  assert_eq!(svc.list_bids(owner, rfq.rfq_id).await.unwrap().len(), 1);
}

#[tokio::test]
async fn concurrent_first_bids_on_different_tokens_both_land() {
  let svc = service().await;
  let owner = Uuid::new_v4();
  let rfq = published_rfq(&svc, owner).await;
  let tokens = tokens(&svc, owner, rfq.rfq_id, 2).await;

  let (a, b) = tokio::join!(
    svc.submit_bid(&tokens[0], submission("Acme")),
    svc.submit_bid(&tokens[1], submission("Beacon")),
  );
  a.unwrap();
  b.unwrap();

  assert_eq!(svc.list_bids(owner, rfq.rfq_id).await.unwrap().len(), 2);
  let history = svc.history(owner, rfq.rfq_id).await.unwrap();
  let opened = history.iter().filter(|t| t.to == RfqStatus::Bidding).count();
  assert_eq!(opened, 1);
}

#[tokio::test]
async fn view_invitation_shows_the_rfq() {
  let svc = service().await;
  let owner = Uuid::new_v4();
  let rfq = published_rfq(&svc, owner).await;
  let token = tokens(&svc, owner, rfq.rfq_id, 1).await.remove(0);

  let view = svc.view_invitation(&token).await.unwrap();
  assert_eq!(view.rfq_id, rfq.rfq_id);
  assert_eq!(view.rfq_number, rfq.number);
  assert_eq!(view.email, "uw0@carrier.example");
}

#[tokio::test]
async fn resend_refuses_used_invitations() {
  let svc = service().await;
  let owner = Uuid::new_v4();
  let rfq = published_rfq(&svc, owner).await;
  let token = tokens(&svc, owner, rfq.rfq_id, 1).await.remove(0);
  let invitation = svc.list_invitations(owner, rfq.rfq_id).await.unwrap().remove(0);

  let resent = svc
    .resend_invitation(owner, rfq.rfq_id, invitation.invitation_id)
    .await
    .unwrap();
  assert_eq!(resent.token, token);

  svc.submit_bid(&token, submission("Acme")).await.unwrap();
  assert!(matches!(
    svc.resend_invitation(owner, rfq.rfq_id, invitation.invitation_id).await,
    Err(Error::TokenConsumed)
  ));
  assert!(matches!(
    svc.resend_invitation(owner, rfq.rfq_id, Uuid::new_v4()).await,
    Err(Error::InvitationNotFound(_))
  ));
}

// ─── Winner selection ────────────────────────────────────────────────────────

#[tokio::test]
async fn selecting_a_winner_completes_the_rfq_once() {
  let svc = service().await;
  let owner = Uuid::new_v4();
  let rfq = published_rfq(&svc, owner).await;
  let tokens = tokens(&svc, owner, rfq.rfq_id, 2).await;
  let acme = svc.submit_bid(&tokens[0], submission("Acme")).await.unwrap();
  let beacon = svc.submit_bid(&tokens[1], submission("Beacon")).await.unwrap();

  assert!(matches!(
    svc.select_winning_bid(owner, rfq.rfq_id, acme.bid_id).await,
    Err(Error::InvalidState { current: RfqStatus::Bidding, expected: RfqStatus::Reviewing })
  ));

  svc.close_bidding(owner, rfq.rfq_id).await.unwrap();
  let (completed, winner) = svc
    .select_winning_bid(owner, rfq.rfq_id, beacon.bid_id)
    .await
    .unwrap();
  assert_eq!(completed.status, RfqStatus::Completed);
  assert!(winner.selected);
  assert_eq!(winner.bid_id, beacon.bid_id);

  assert!(matches!(
    svc.select_winning_bid(owner, rfq.rfq_id, acme.bid_id).await,
    Err(Error::InvalidState { current: RfqStatus::Completed, .. })
  ));
  let stats = svc.store().bid_stats(rfq.rfq_id).await.unwrap();
  assert_eq!(stats.count, 2);
  assert!(stats.has_selected);
  assert!(matches!(
    svc.cancel(owner, rfq.rfq_id).await,
    Err(Error::InvalidTransition { guard: Guard::NotPermitted, .. })
  ));
}

#[tokio::test]
async fn selecting_a_bid_from_another_rfq_is_not_found() {
  let svc = service().await;
  let owner = Uuid::new_v4();
  let rfq = published_rfq(&svc, owner).await;
  let other = published_rfq(&svc, owner).await;

  let token = tokens(&svc, owner, rfq.rfq_id, 1).await.remove(0);
  svc.submit_bid(&token, submission("Acme")).await.unwrap();
  svc.close_bidding(owner, rfq.rfq_id).await.unwrap();

  let other_token = tokens(&svc, owner, other.rfq_id, 1).await.remove(0);
  let foreign = svc.submit_bid(&other_token, submission("Beacon")).await.unwrap();

  assert!(matches!(
    svc.select_winning_bid(owner, rfq.rfq_id, foreign.bid_id).await,
    Err(Error::BidNotFound { .. })
  ));
}

// ─── Questionnaires ──────────────────────────────────────────────────────────

fn question(product_id: Uuid, section: Option<&str>, text: &str) -> NewQuestion {
  NewQuestion {
    product_id,
    section: section.map(String::from),
    question_text: text.into(),
    ..Default::default()
  }
}

#[tokio::test]
async fn questionnaire_follows_the_rfq_product() {
  let svc = service().await;
  let owner = Uuid::new_v4();
  let product = svc
    .add_product(NewProduct {
      name:        "Marine Cargo".into(),
      category:    "marine".into(),
      description: None,
    })
    .await
    .unwrap();
  let pid = product.product_id;

  let first = svc.add_question(question(pid, Some("Voyages"), "Main trade lanes")).await.unwrap();
  let second = svc.add_question(question(pid, None, "Legal entity name")).await.unwrap();
  svc
    .add_question(NewQuestion {
      field_type: FieldType::Select,
      options: vec!["FOB".into(), " CIF ".into(), "".into()],
      order_index: Some(0),
      ..question(pid, Some("Voyages"), "Incoterms")
    })
    .await
    .unwrap();
  assert_eq!((first.order_index, second.order_index), (1, 2));
  assert_eq!(second.section, "General");

  let draft = svc.create_rfq(owner, CreateRfq::default()).await.unwrap();
  let empty = svc.questionnaire(owner, draft.rfq_id).await.unwrap();
  assert_eq!((empty.total_questions, empty.total_sections), (0, 0));

  svc
    .update_draft(owner, draft.rfq_id, RfqPatch {
      product_id: Some(pid),
      ..Default::default()
    })
    .await
    .unwrap();
  let form = svc.questionnaire(owner, draft.rfq_id).await.unwrap();
  assert_eq!((form.total_questions, form.total_sections), (3, 2));
  assert_eq!(form.sections[0].name, "General");
  let voyages: Vec<_> = form.sections[1]
    .questions
    .iter()
    .map(|q| q.question_text.as_str())
    .collect();
  assert_eq!(voyages, ["Incoterms", "Main trade lanes"]);
  assert_eq!(form.sections[1].questions[0].options, ["FOB", "CIF"]);

  assert!(matches!(
    svc.questionnaire(Uuid::new_v4(), draft.rfq_id).await,
    Err(Error::RfqNotFound(_))
  ));
}

#[tokio::test]
async fn questions_need_a_known_product_and_choices() {
  let svc = service().await;
  let missing = Uuid::new_v4();
  assert!(matches!(
    svc.add_question(question(missing, None, "Fleet size")).await,
    Err(Error::ProductNotFound(id)) if id == missing
  ));

  let product = svc
    .add_product(NewProduct { name: "Fleet".into(), category: "motor".into(), description: None })
    .await
    .unwrap();
  let no_options = NewQuestion {
    field_type: FieldType::Radio,
    ..question(product.product_id, None, "Vehicle class")
  };
  assert!(matches!(svc.add_question(no_options).await, Err(Error::Validation(_))));
}

#[tokio::test]
async fn answers_are_replaced_while_the_rfq_is_a_draft() {
  let svc = service().await;
  let owner = Uuid::new_v4();
  let product = svc
    .add_product(NewProduct { name: "Cyber".into(), category: "cyber".into(), description: None })
    .await
    .unwrap();
  let other = svc
    .add_product(NewProduct { name: "Marine".into(), category: "marine".into(), description: None })
    .await
    .unwrap();
  let q = svc.add_question(question(product.product_id, None, "Annual revenue")).await.unwrap();
  let foreign = svc.add_question(question(other.product_id, None, "Vessel count")).await.unwrap();

  let rfq = svc
    .create_rfq(owner, CreateRfq {
      product_id: Some(product.product_id),
      deadline: Some(Utc::now() + Duration::days(14)),
      ..Default::default()
    })
    .await
    .unwrap();
  let answer = |question_id, value| AnswerInput { question_id, value, file_url: None };

  svc.save_answer(owner, rfq.rfq_id, answer(q.question_id, Some(json!("2m")))).await.unwrap();
  let saved = svc
    .save_answer(owner, rfq.rfq_id, answer(q.question_id, Some(json!(2_500_000))))
    .await
    .unwrap();
  assert_eq!(saved.value, Some(json!(2_500_000)));

  let answers = svc.answers(owner, rfq.rfq_id).await.unwrap();
  assert_eq!(answers.len(), 1);
  assert_eq!(answers[0].value, Some(json!(2_500_000)));
  let touched = svc.get_rfq(owner, rfq.rfq_id).await.unwrap();
  assert!(touched.updated_at >= rfq.updated_at);

  svc.save_answer(owner, rfq.rfq_id, answer(q.question_id, Some(json!("  ")))).await.unwrap();
  let answers = svc.answers(owner, rfq.rfq_id).await.unwrap();
  assert_eq!(answers.len(), 1);
  assert_eq!(answers[0].value, None);

  assert!(matches!(
    svc.save_answer(owner, rfq.rfq_id, answer(foreign.question_id, Some(json!(3)))).await,
    Err(Error::QuestionNotFound(_))
  ));
  assert!(matches!(
    svc.save_answer(owner, rfq.rfq_id, answer(Uuid::new_v4(), None)).await,
    Err(Error::QuestionNotFound(_))
  ));

  svc.publish(owner, rfq.rfq_id).await.unwrap();
  assert!(matches!(
    svc.save_answer(owner, rfq.rfq_id, answer(q.question_id, Some(json!("late")))).await,
    Err(Error::InvalidState { current: RfqStatus::Published, .. })
  ));
}

#[tokio::test]
async fn stale_answer_saves_write_nothing() {
  let s = store().await;
  let outcome = s
    .save_answer(Uuid::new_v4(), AnswerInput {
      question_id: Uuid::new_v4(),
      value:       Some(json!("orphan")),
      file_url:    None,
    })
    .await
    .unwrap();
  assert!(matches!(outcome, WriteOutcome::Stale));
}

// ─── Notifications ───────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
#[error("mail relay unavailable")]
struct RelayDown;

struct FailingNotifier;

impl Notifier for FailingNotifier {
  type Error = RelayDown;

  async fn notify(&self, _notice: Notice) -> Result<(), RelayDown> { Err(RelayDown) }
}

#[derive(Clone, Default)]
struct RecordingNotifier(Arc<Mutex<Vec<&'static str>>>);

impl Notifier for RecordingNotifier {
  type Error = std::convert::Infallible;

  async fn notify(&self, notice: Notice) -> Result<(), Self::Error> {
    self.0.lock().unwrap().push(notice.kind());
    Ok(())
  }
}

#[tokio::test]
async fn notifier_failures_do_not_fail_operations() {
  let svc = Procurement::new(Arc::new(store().await), FailingNotifier, Settings::default());
  let owner = Uuid::new_v4();

  let rfq = published_rfq(&svc, owner).await;
  assert_eq!(rfq.status, RfqStatus::Published);
  let issued = tokens(&svc, owner, rfq.rfq_id, 2).await;
  assert_eq!(issued.len(), 2);
}

#[tokio::test]
async fn notices_follow_committed_changes() {
  let notifier = RecordingNotifier::default();
  let svc = Procurement::new(Arc::new(store().await), notifier.clone(), Settings::default());
  let owner = Uuid::new_v4();

  let rfq = published_rfq(&svc, owner).await;
  let token = tokens(&svc, owner, rfq.rfq_id, 1).await.remove(0);
  let invitation = svc.list_invitations(owner, rfq.rfq_id).await.unwrap().remove(0);
  svc.resend_invitation(owner, rfq.rfq_id, invitation.invitation_id).await.unwrap();
  let bid = svc.submit_bid(&token, submission("Acme")).await.unwrap();
  svc.close_bidding(owner, rfq.rfq_id).await.unwrap();
  svc.select_winning_bid(owner, rfq.rfq_id, bid.bid_id).await.unwrap();

  let kinds = notifier.0.lock().unwrap().clone();
  assert_eq!(kinds, [
    "rfq_published",
    "bid_invitation",
    "bid_invitation_resent",
    "rfq_completed",
  ]);
}

// ─── Messages ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn messages_go_to_every_invitee_or_one() {
  let notifier = RecordingNotifier::default();
  let svc = Procurement::new(Arc::new(store().await), notifier.clone(), Settings::default());
  let owner = Uuid::new_v4();
  let rfq = published_rfq(&svc, owner).await;
  tokens(&svc, owner, rfq.rfq_id, 2).await;
  notifier.0.lock().unwrap().clear();

  let all = svc
    .send_message(owner, rfq.rfq_id, SendMessage {
      text:          "  Deadline moved by a week.  ".into(),
      invitation_id: None,
    })
    .await
    .unwrap();
  assert_eq!(all.len(), 2);
  assert!(all.iter().all(|m| m.body == "Deadline moved by a week." && m.sender_id == owner));

  let target = all[1].invitation_id;
  let one = svc
    .send_message(owner, rfq.rfq_id, SendMessage {
      text:          "Please confirm the limit.".into(),
      invitation_id: Some(target),
    })
    .await
    .unwrap();
  assert_eq!(one.len(), 1);
  assert_eq!(one[0].recipient_email, all[1].recipient_email);

  assert_eq!(svc.list_messages(owner, rfq.rfq_id).await.unwrap().len(), 3);
  assert_eq!(*notifier.0.lock().unwrap(), ["bidder_message"; 3]);
}

#[tokio::test]
async fn message_input_is_validated() {
  let svc = service().await;
  let owner = Uuid::new_v4();
  let rfq = published_rfq(&svc, owner).await;
  let send = |text: &str, invitation_id| SendMessage { text: text.into(), invitation_id };

  assert!(matches!(
    svc.send_message(owner, rfq.rfq_id, send("hello", None)).await,
    Err(Error::Validation(_))
  ));

  tokens(&svc, owner, rfq.rfq_id, 1).await;
  assert!(matches!(
    svc.send_message(owner, rfq.rfq_id, send("   ", None)).await,
    Err(Error::Validation(_))
  ));
  assert!(matches!(
    svc.send_message(owner, rfq.rfq_id, send("hello", Some(Uuid::new_v4()))).await,
    Err(Error::InvitationNotFound(_))
  ));
  assert!(matches!(
    svc.send_message(Uuid::new_v4(), rfq.rfq_id, send("hello", None)).await,
    Err(Error::RfqNotFound(_))
  ));
  assert!(svc.list_messages(owner, rfq.rfq_id).await.unwrap().is_empty());
}

// ─── Company invitations ─────────────────────────────────────────────────────

#[tokio::test]
async fn company_invitations_are_accepted_once() {
  let svc = service().await;
  let admin = Uuid::new_v4();
  let company = Uuid::new_v4();

  let invitation = svc
    .invite_to_company(admin, company, CompanyInvite {
      email:       " new.hire@client.example ".into(),
      role:        CompanyRole::Admin,
      expiry_days: Some(7),
    })
    .await
    .unwrap();
  assert_eq!(invitation.email, "new.hire@client.example");
  assert_eq!(invitation.token.len(), ids::COMPANY_INVITATION_TOKEN_LEN);

  let user = Uuid::new_v4();
  let accepted = svc.accept_company_invitation(&invitation.token, user).await.unwrap();
  assert_eq!(accepted.accepted_by, Some(user));
  assert_eq!(accepted.role, CompanyRole::Admin);

  assert!(matches!(
    svc.accept_company_invitation(&invitation.token, Uuid::new_v4()).await,
    Err(Error::TokenConsumed)
  ));
}

#[tokio::test]
async fn company_invitation_input_is_validated() {
  let svc = service().await;
  let invite = |email: &str, expiry_days| CompanyInvite {
    email: email.into(),
    role: CompanyRole::Member,
    expiry_days,
  };

  assert!(matches!(
    svc.invite_to_company(Uuid::new_v4(), Uuid::new_v4(), invite("nobody", None)).await,
    Err(Error::Validation(_))
  ));
  assert!(matches!(
    svc.invite_to_company(Uuid::new_v4(), Uuid::new_v4(), invite("a@b.example", Some(0))).await,
    Err(Error::Validation(_))
  ));
  assert!(matches!(
    svc.accept_company_invitation(&ids::bid_invitation_token(), Uuid::new_v4()).await,
    Err(Error::TokenNotFound)
  ));
}

// ─── Store ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn duplicate_tokens_collide() {
  let s = store().await;
  let rfq = s
    .create_rfq(sanctuari_core::rfq::NewRfq {
      owner_id:   Uuid::new_v4(),
      company_id: None,
      product_id: None,
      title:      "Collision".into(),
      deadline:   None,
    })
    .await
    .unwrap();

  let make = |token: &str| BidInvitation {
    invitation_id: Uuid::new_v4(),
    rfq_id:        rfq.rfq_id,
    token:         token.into(),
    member_id:     None,
    email:         "x@y.example".into(),
    issued_at:     Utc::now(),
    expires_at:    None,
    consumed_at:   None,
  };
  let token = ids::bid_invitation_token();
  assert!(matches!(
    s.insert_bid_invitation(make(&token)).await.unwrap(),
    WriteOutcome::Committed(_)
  ));
  let again = s.insert_bid_invitation(make(&token)).await.unwrap();
  assert_eq!(again.committed().map(|i| i.token), None);

  let found = s.find_bid_invitation(token.clone()).await.unwrap().unwrap();
  assert_eq!(found.rfq_id, rfq.rfq_id);
  assert!(found.consumed_at.is_none());
}

#[tokio::test]
async fn stale_transitions_write_nothing() {
  let s = store().await;
  let rfq = s
    .create_rfq(sanctuari_core::rfq::NewRfq {
      owner_id:   Uuid::new_v4(),
      company_id: None,
      product_id: None,
      title:      "Stale".into(),
      deadline:   None,
    })
    .await
    .unwrap();

  let outcome = s
    .transition_rfq(rfq.rfq_id, RfqStatus::Bidding, RfqStatus::Reviewing)
    .await
    .unwrap();
  assert!(matches!(outcome, WriteOutcome::Stale));
  assert!(s.rfq_history(rfq.rfq_id).await.unwrap().is_empty());

  let published = s.publish_rfq(rfq.rfq_id, 2025).await.unwrap().committed().unwrap();
  assert_eq!(published.number.as_deref(), Some("RFQ-2025-0001"));
  assert!(matches!(s.publish_rfq(rfq.rfq_id, 2025).await.unwrap(), WriteOutcome::Stale));
}
