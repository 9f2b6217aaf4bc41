//! Handlers for bids and bid invitations.
//!
//! | Method | Path | Auth | Notes |
//! |--------|------|------|-------|
//! | `POST` | `/rfqs/{id}/distribute` | owner | Body: [`Distribution`] |
//! | `GET`  | `/rfqs/{id}/invitations` | owner | |
//! | `POST` | `/rfqs/{id}/invitations/{invitation_id}/resend` | owner | |
//! | `GET`  | `/rfqs/{id}/bids` | owner | Submission order |
//! | `POST` | `/rfqs/{id}/select` | owner | Body: `{"bid_id": "…"}` |
//! | `GET`  | `/bids/invitation/{token}` | token | What the invitee is bidding on |
//! | `POST` | `/bids` | token | Body: `{"token": "…", …BidSubmission}` |

use axum::{
  Json,
  extract::{
    Path, State,
    rejection::{JsonRejection, PathRejection},
  },
  http::StatusCode,
  response::IntoResponse,
};
use sanctuari_core::{
  bid::{Bid, BidSubmission},
  invitation::BidInvitation,
  notify::Notifier,
  rfq::Rfq,
  store::ProcurementStore,
  workflow::{Distribution, InvitationView},
};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{ApiState, auth::CurrentUser, error::ApiError};

// ─── Invitations ─────────────────────────────────────────────────────────────

/// `POST /rfqs/{id}/distribute`
pub async fn distribute<S, N>(
  State(state): State<ApiState<S, N>>,
  CurrentUser(user): CurrentUser,
  path: Result<Path<Uuid>, PathRejection>,
  body: Result<Json<Distribution>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ProcurementStore + 'static,
  N: Notifier + 'static,
{
  let Path(id) = path?;
  let Json(distribution) = body?;
  let issued = state.procurement.distribute(user, id, distribution).await?;
  Ok((StatusCode::CREATED, Json(issued)))
}

/// `GET /rfqs/{id}/invitations`
pub async fn list_invitations<S, N>(
  State(state): State<ApiState<S, N>>,
  CurrentUser(user): CurrentUser,
  path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<BidInvitation>>, ApiError>
where
  S: ProcurementStore + 'static,
  N: Notifier + 'static,
{
  let Path(id) = path?;
  Ok(Json(state.procurement.list_invitations(user, id).await?))
}

/// `POST /rfqs/{id}/invitations/{invitation_id}/resend`
pub async fn resend<S, N>(
  State(state): State<ApiState<S, N>>,
  CurrentUser(user): CurrentUser,
  path: Result<Path<(Uuid, Uuid)>, PathRejection>,
) -> Result<Json<BidInvitation>, ApiError>
where
  S: ProcurementStore + 'static,
  N: Notifier + 'static,
{
  let Path((id, invitation_id)) = path?;
  Ok(Json(
    state
      .procurement
      .resend_invitation(user, id, invitation_id)
      .await?,
  ))
}

/// `GET /bids/invitation/{token}`
pub async fn view_invitation<S, N>(
  State(state): State<ApiState<S, N>>,
  path: Result<Path<String>, PathRejection>,
) -> Result<Json<InvitationView>, ApiError>
where
  S: ProcurementStore + 'static,
  N: Notifier + 'static,
{
  let Path(token) = path?;
  Ok(Json(state.procurement.view_invitation(&token).await?))
}

// ─── Bids ────────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct SubmitBody {
  pub token:      String,
  #[serde(flatten)]
  pub submission: BidSubmission,
}

/// `POST /bids`
pub async fn submit<S, N>(
  State(state): State<ApiState<S, N>>,
  body: Result<Json<SubmitBody>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ProcurementStore + 'static,
  N: Notifier + 'static,
{
  let Json(SubmitBody { token, submission }) = body?;
  let bid = state.procurement.submit_bid(&token, submission).await?;
  Ok((StatusCode::CREATED, Json(bid)))
}

/// `GET /rfqs/{id}/bids`
pub async fn list<S, N>(
  State(state): State<ApiState<S, N>>,
  CurrentUser(user): CurrentUser,
  path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<Bid>>, ApiError>
where
  S: ProcurementStore + 'static,
  N: Notifier + 'static,
{
  let Path(id) = path?;
  Ok(Json(state.procurement.list_bids(user, id).await?))
}

#[derive(Debug, Deserialize)]
pub struct SelectBody {
  pub bid_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct Selection {
  pub rfq: Rfq,
  pub bid: Bid,
}

/// `POST /rfqs/{id}/select`
pub async fn select<S, N>(
  State(state): State<ApiState<S, N>>,
  CurrentUser(user): CurrentUser,
  path: Result<Path<Uuid>, PathRejection>,
  body: Result<Json<SelectBody>, JsonRejection>,
) -> Result<Json<Selection>, ApiError>
where
  S: ProcurementStore + 'static,
  N: Notifier + 'static,
{
  let Path(id) = path?;
  let Json(SelectBody { bid_id }) = body?;
  let (rfq, bid) = state
    .procurement
    .select_winning_bid(user, id, bid_id)
    .await?;
  Ok(Json(Selection { rfq, bid }))
}
