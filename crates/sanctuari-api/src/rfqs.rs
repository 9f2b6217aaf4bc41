//! Handlers for `/rfqs` endpoints. All of them act as the authenticated
//! owner; other users' RFQs answer 404.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/rfqs` | `?status=&product_id=&search=&sort=&order=&include_inactive=&limit=&offset=` |
//! | `POST`  | `/rfqs` | Body: [`CreateRfq`]; starts in `draft` |
//! | `GET`   | `/rfqs/{id}` | |
//! | `PATCH` | `/rfqs/{id}` | Body: [`RfqPatch`]; drafts only |
//! | `POST`  | `/rfqs/{id}/publish` | Assigns the RFQ number |
//! | `POST`  | `/rfqs/{id}/open-bidding` | |
//! | `POST`  | `/rfqs/{id}/close-bidding` | Requires a bid |
//! | `POST`  | `/rfqs/{id}/cancel` | |
//! | `POST`  | `/rfqs/{id}/policy-document` | Body: [`PolicyDocument`] |
//! | `GET`   | `/rfqs/{id}/history` | Committed status changes |

use axum::{
  Json,
  extract::{
    Path, Query, State,
    rejection::{JsonRejection, PathRejection, QueryRejection},
  },
  http::StatusCode,
  response::IntoResponse,
};
use sanctuari_core::{
  lifecycle::TransitionRecord,
  notify::Notifier,
  query::{self, RfqQuery, RfqSort, SortOrder},
  rfq::{PolicyDocument, Rfq, RfqPatch, RfqStatus},
  store::ProcurementStore,
  workflow::CreateRfq,
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, auth::CurrentUser, error::ApiError};

// ─── List ────────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
  /// A status name, or `all`.
  pub status:           Option<String>,
  pub product_id:       Option<Uuid>,
  pub search:           Option<String>,
  #[serde(default)]
  pub sort:             RfqSort,
  #[serde(default)]
  pub order:            SortOrder,
  #[serde(default)]
  pub include_inactive: bool,
  pub limit:            Option<usize>,
  pub offset:           Option<usize>,
}

/// `GET /rfqs`
pub async fn list<S, N>(
  State(state): State<ApiState<S, N>>,
  CurrentUser(user): CurrentUser,
  params: Result<Query<ListParams>, QueryRejection>,
) -> Result<Json<Vec<Rfq>>, ApiError>
where
  S: ProcurementStore + 'static,
  N: Notifier + 'static,
{
  let Query(params) = params?;
  let query = RfqQuery {
    owner_id:         Some(user),
    status:           query::selector::<RfqStatus>(params.status.as_deref())?,
    product_id:       params.product_id,
    search:           query::search_text(params.search.as_deref()),
    include_inactive: params.include_inactive,
    sort:             params.sort,
    order:            params.order,
    limit:            params.limit,
    offset:           params.offset,
  };
  Ok(Json(state.procurement.list_rfqs(user, query).await?))
}

// ─── Create / read / edit ────────────────────────────────────────────────────

/// `POST /rfqs`
pub async fn create<S, N>(
  State(state): State<ApiState<S, N>>,
  CurrentUser(user): CurrentUser,
  body: Result<Json<CreateRfq>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ProcurementStore + 'static,
  N: Notifier + 'static,
{
  let Json(body) = body?;
  let rfq = state.procurement.create_rfq(user, body).await?;
  Ok((StatusCode::CREATED, Json(rfq)))
}

/// `GET /rfqs/{id}`
pub async fn get_one<S, N>(
  State(state): State<ApiState<S, N>>,
  CurrentUser(user): CurrentUser,
  path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Rfq>, ApiError>
where
  S: ProcurementStore + 'static,
  N: Notifier + 'static,
{
  let Path(id) = path?;
  Ok(Json(state.procurement.get_rfq(user, id).await?))
}

/// `PATCH /rfqs/{id}`
pub async fn update<S, N>(
  State(state): State<ApiState<S, N>>,
  CurrentUser(user): CurrentUser,
  path: Result<Path<Uuid>, PathRejection>,
  body: Result<Json<RfqPatch>, JsonRejection>,
) -> Result<Json<Rfq>, ApiError>
where
  S: ProcurementStore + 'static,
  N: Notifier + 'static,
{
  let Path(id) = path?;
  let Json(patch) = body?;
  Ok(Json(state.procurement.update_draft(user, id, patch).await?))
}

/// `POST /rfqs/{id}/policy-document`
pub async fn attach_policy_document<S, N>(
  State(state): State<ApiState<S, N>>,
  CurrentUser(user): CurrentUser,
  path: Result<Path<Uuid>, PathRejection>,
  body: Result<Json<PolicyDocument>, JsonRejection>,
) -> Result<Json<Rfq>, ApiError>
where
  S: ProcurementStore + 'static,
  N: Notifier + 'static,
{
  let Path(id) = path?;
  let Json(document) = body?;
  Ok(Json(
    state
      .procurement
      .attach_policy_document(user, id, document)
      .await?,
  ))
}

// ─── Lifecycle ───────────────────────────────────────────────────────────────

/// `POST /rfqs/{id}/publish`
pub async fn publish<S, N>(
  State(state): State<ApiState<S, N>>,
  CurrentUser(user): CurrentUser,
  path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Rfq>, ApiError>
where
  S: ProcurementStore + 'static,
  N: Notifier + 'static,
{
  let Path(id) = path?;
  Ok(Json(state.procurement.publish(user, id).await?))
}

/// `POST /rfqs/{id}/open-bidding`
pub async fn open_bidding<S, N>(
  State(state): State<ApiState<S, N>>,
  CurrentUser(user): CurrentUser,
  path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Rfq>, ApiError>
where
  S: ProcurementStore + 'static,
  N: Notifier + 'static,
{
  let Path(id) = path?;
  Ok(Json(state.procurement.open_bidding(user, id).await?))
}

/// `POST /rfqs/{id}/close-bidding`
pub async fn close_bidding<S, N>(
  State(state): State<ApiState<S, N>>,
  CurrentUser(user): CurrentUser,
  path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Rfq>, ApiError>
where
  S: ProcurementStore + 'static,
  N: Notifier + 'static,
{
  let Path(id) = path?;
  Ok(Json(state.procurement.close_bidding(user, id).await?))
}

/// `POST /rfqs/{id}/cancel`
pub async fn cancel<S, N>(
  State(state): State<ApiState<S, N>>,
  CurrentUser(user): CurrentUser,
  path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Rfq>, ApiError>
where
  S: ProcurementStore + 'static,
  N: Notifier + 'static,
{
  let Path(id) = path?;
  Ok(Json(state.procurement.cancel(user, id).await?))
}

/// `GET /rfqs/{id}/history`
pub async fn history<S, N>(
  State(state): State<ApiState<S, N>>,
  CurrentUser(user): CurrentUser,
  path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Vec<TransitionRecord>>, ApiError>
where
  S: ProcurementStore + 'static,
  N: Notifier + 'static,
{
  let Path(id) = path?;
  Ok(Json(state.procurement.history(user, id).await?))
}
