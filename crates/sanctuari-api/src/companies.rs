//! Handlers for company invitations.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/companies/{id}/invitations` | Body: [`CompanyInvite`] |
//! | `POST` | `/invitations/{token}/accept` | Joins as the authenticated user |

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
  invitation::CompanyInvitation,
  notify::Notifier,
  store::ProcurementStore,
  workflow::CompanyInvite,
};
use uuid::Uuid;

use crate::{ApiState, auth::CurrentUser, error::ApiError};

/// `POST /companies/{id}/invitations`
pub async fn invite<S, N>(
  State(state): State<ApiState<S, N>>,
  CurrentUser(user): CurrentUser,
  path: Result<Path<Uuid>, PathRejection>,
  body: Result<Json<CompanyInvite>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ProcurementStore + 'static,
  N: Notifier + 'static,
{
  let Path(company_id) = path?;
  let Json(invite) = body?;
  let invitation = state
    .procurement
    .invite_to_company(user, company_id, invite)
    .await?;
  Ok((StatusCode::CREATED, Json(invitation)))
}

/// `POST /invitations/{token}/accept`
pub async fn accept<S, N>(
  State(state): State<ApiState<S, N>>,
  CurrentUser(user): CurrentUser,
  path: Result<Path<String>, PathRejection>,
) -> Result<Json<CompanyInvitation>, ApiError>
where
  S: ProcurementStore + 'static,
  N: Notifier + 'static,
{
  let Path(token) = path?;
  Ok(Json(
    state
      .procurement
      .accept_company_invitation(&token, user)
      .await?,
  ))
}
