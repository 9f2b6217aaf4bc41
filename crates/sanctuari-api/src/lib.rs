//! JSON REST API for Sanctuari.
//!
//! Exposes an axum [`Router`] backed by a [`Procurement`] workflow over any
//! [`ProcurementStore`]. Owner endpoints authenticate with HTTP Basic against
//! the configured [`Accounts`]; bid submission authenticates with the
//! invitation token instead. TLS and transport concerns are the caller's
//! responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", sanctuari_api::api_router(procurement, accounts))
//! ```

pub mod auth;
pub mod bids;
pub mod companies;
pub mod directory;
pub mod error;
pub mod messages;
pub mod questionnaires;
pub mod rfqs;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use sanctuari_core::{notify::Notifier, store::ProcurementStore, workflow::Procurement};

pub use auth::{Account, Accounts};
pub use error::ApiError;

/// Shared state threaded through all handlers.
pub struct ApiState<S, N> {
  pub procurement: Arc<Procurement<S, N>>,
  pub accounts:    Arc<Accounts>,
}

impl<S, N> Clone for ApiState<S, N> {
  fn clone(&self) -> Self {
    Self {
      procurement: Arc::clone(&self.procurement),
      accounts:    Arc::clone(&self.accounts),
    }
  }
}

/// Build a fully-materialised API router.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, N>(procurement: Arc<Procurement<S, N>>, accounts: Arc<Accounts>) -> Router<()>
where
  S: ProcurementStore + 'static,
  N: Notifier + 'static,
{
  Router::new()
    // Directory
    .route("/products", get(directory::products::<S, N>))
    .route("/network/members", get(directory::members::<S, N>))
    // RFQs
    .route("/rfqs", get(rfqs::list::<S, N>).post(rfqs::create::<S, N>))
    .route("/rfqs/{id}", get(rfqs::get_one::<S, N>).patch(rfqs::update::<S, N>))
    .route("/rfqs/{id}/publish", post(rfqs::publish::<S, N>))
    .route("/rfqs/{id}/open-bidding", post(rfqs::open_bidding::<S, N>))
    .route("/rfqs/{id}/close-bidding", post(rfqs::close_bidding::<S, N>))
    .route("/rfqs/{id}/cancel", post(rfqs::cancel::<S, N>))
    .route("/rfqs/{id}/policy-document", post(rfqs::attach_policy_document::<S, N>))
    .route("/rfqs/{id}/history", get(rfqs::history::<S, N>))
    // Questionnaire
    .route("/rfqs/{id}/questions", get(questionnaires::questions::<S, N>))
    .route(
      "/rfqs/{id}/responses",
      get(questionnaires::responses::<S, N>).patch(questionnaires::save_response::<S, N>),
    )
    // Invitations and bids
    .route("/rfqs/{id}/distribute", post(bids::distribute::<S, N>))
    .route("/rfqs/{id}/invitations", get(bids::list_invitations::<S, N>))
    .route(
      "/rfqs/{id}/invitations/{invitation_id}/resend",
      post(bids::resend::<S, N>),
    )
    .route("/rfqs/{id}/bids", get(bids::list::<S, N>))
    .route("/rfqs/{id}/select", post(bids::select::<S, N>))
    .route("/bids", post(bids::submit::<S, N>))
    .route("/bids/invitation/{token}", get(bids::view_invitation::<S, N>))
    // Messages
    .route(
      "/rfqs/{id}/messages",
      get(messages::list::<S, N>).post(messages::send::<S, N>),
    )
    // Companies
    .route("/companies/{id}/invitations", post(companies::invite::<S, N>))
    .route("/invitations/{token}/accept", post(companies::accept::<S, N>))
    .with_state(ApiState { procurement, accounts })
}
