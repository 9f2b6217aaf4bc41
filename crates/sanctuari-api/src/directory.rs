//! Handlers for the platform directory.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/products` | `?category=&search=&include_inactive=`; ordered by name |
//! | `GET`  | `/network/members` | `?type=&category=&search=&sort=&order=&include_inactive=`; authenticated |
//!
//! `type` and `category` accept `all` to mean "no constraint".

use axum::{
  Json,
  extract::{Query, State, rejection::QueryRejection},
};
use sanctuari_core::{
  directory::{InsuranceProduct, MemberType, NetworkMember},
  notify::Notifier,
  query::{self, MemberQuery, MemberSort, ProductQuery, SortOrder},
  store::ProcurementStore,
};
use serde::Deserialize;

use crate::{ApiState, auth::CurrentUser, error::ApiError};

// ─── Products ────────────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct ProductParams {
  pub category:         Option<String>,
  pub search:           Option<String>,
  #[serde(default)]
  pub include_inactive: bool,
  pub limit:            Option<usize>,
  pub offset:           Option<usize>,
}

/// `GET /products`
pub async fn products<S, N>(
  State(state): State<ApiState<S, N>>,
  params: Result<Query<ProductParams>, QueryRejection>,
) -> Result<Json<Vec<InsuranceProduct>>, ApiError>
where
  S: ProcurementStore + 'static,
  N: Notifier + 'static,
{
  let Query(params) = params?;
  let query = ProductQuery {
    category:         query::tag_selector(params.category.as_deref()),
    search:           query::search_text(params.search.as_deref()),
    include_inactive: params.include_inactive,
    limit:            params.limit,
    offset:           params.offset,
  };
  Ok(Json(state.procurement.list_products(&query).await?))
}

// ─── Network members ─────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
pub struct MemberParams {
  #[serde(rename = "type")]
  pub member_type:      Option<String>,
  pub category:         Option<String>,
  pub search:           Option<String>,
  #[serde(default)]
  pub sort:             MemberSort,
  #[serde(default)]
  pub order:            SortOrder,
  #[serde(default)]
  pub include_inactive: bool,
  pub limit:            Option<usize>,
  pub offset:           Option<usize>,
}

/// `GET /network/members`
pub async fn members<S, N>(
  State(state): State<ApiState<S, N>>,
  _user: CurrentUser,
  params: Result<Query<MemberParams>, QueryRejection>,
) -> Result<Json<Vec<NetworkMember>>, ApiError>
where
  S: ProcurementStore + 'static,
  N: Notifier + 'static,
{
  let Query(params) = params?;
  let query = MemberQuery {
    member_type:      query::selector::<MemberType>(params.member_type.as_deref())?,
    category:         query::tag_selector(params.category.as_deref()),
    search:           query::search_text(params.search.as_deref()),
    include_inactive: params.include_inactive,
    sort:             params.sort,
    order:            params.order,
    limit:            params.limit,
    offset:           params.offset,
  };
  Ok(Json(state.procurement.list_members(&query).await?))
}
