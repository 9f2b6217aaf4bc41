//! Handlers for owner-to-bidder messages.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/rfqs/{id}/messages` | Body: [`SendMessage`]; one record per recipient |
//! | `GET`  | `/rfqs/{id}/messages` | Oldest first |

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
  message::{Message, SendMessage},
  notify::Notifier,
  store::ProcurementStore,
};
use uuid::Uuid;

use crate::{ApiState, auth::CurrentUser, error::ApiError};

/// `POST /rfqs/{id}/messages`
pub async fn send<S, N>(
  State(state): State<ApiState<S, N>>,
  CurrentUser(user): CurrentUser,
  path: Result<Path<Uuid>, PathRejection>,
  body: Result<Json<SendMessage>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ProcurementStore + 'static,
  N: Notifier + 'static,
{
  let Path(id) = path?;
  let Json(message) = body?;
  let sent = state.procurement.send_message(user, id, message).await?;
  Ok((StatusCode::CREATED, Json(sent)))
}

/// `GET /rfqs/{id}/messages`
pub async fn list<S, N>(
  State(state): State<ApiState<S, N>>,
  CurrentUser(user): CurrentUser,
  path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<Message>>, ApiError>
where
  S: ProcurementStore + 'static,
  N: Notifier + 'static,
{
  let Path(id) = path?;
  Ok(Json(state.procurement.list_messages(user, id).await?))
}
