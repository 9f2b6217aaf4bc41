//! HTTP Basic-auth current-user extractor.
//!
//! Accounts come from configuration: a username, an argon2 PHC string and
//! the user id the account acts as. Bid submission and invitation viewing
//! do not use this; the invitation token is their capability.

use argon2::{Argon2, PasswordHash, PasswordVerifier};
use axum::{
  extract::FromRequestParts,
  http::{HeaderMap, header, request::Parts},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as B64};
use sanctuari_core::{notify::Notifier, store::ProcurementStore};
use serde::Deserialize;
use uuid::Uuid;

use crate::{ApiState, error::ApiError};

/// One login accepted by this server instance.
#[derive(Debug, Clone, Deserialize)]
pub struct Account {
  pub username:      String,
  /// PHC string produced by argon2, e.g. `$argon2id$v=19$…`
  pub password_hash: String,
  pub user_id:       Uuid,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(transparent)]
pub struct Accounts(pub Vec<Account>);

impl Accounts {
  fn find(&self, username: &str) -> Option<&Account> {
    self.0.iter().find(|a| a.username == username)
  }
}

/// The authenticated user a request acts as.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CurrentUser(pub Uuid);

/// Resolve the user from an `Authorization: Basic` header.
pub fn authenticate(headers: &HeaderMap, accounts: &Accounts) -> Result<Uuid, ApiError> {
  let header_val = headers
    .get(header::AUTHORIZATION)
    .and_then(|v| v.to_str().ok())
    .ok_or(ApiError::Unauthorized)?;

  let encoded = header_val
    .strip_prefix("Basic ")
    .ok_or(ApiError::Unauthorized)?;

  let decoded = B64.decode(encoded).map_err(|_| ApiError::Unauthorized)?;
  let creds = std::str::from_utf8(&decoded).map_err(|_| ApiError::Unauthorized)?;

  let (username, password) = creds.split_once(':').ok_or(ApiError::Unauthorized)?;
  let account = accounts.find(username).ok_or(ApiError::Unauthorized)?;

  let parsed_hash =
    PasswordHash::new(&account.password_hash).map_err(|_| ApiError::Unauthorized)?;

  Argon2::default()
    .verify_password(password.as_bytes(), &parsed_hash)
    .map_err(|_| {
      tracing::debug!(username, "password rejected");
      ApiError::Unauthorized
    })?;

  Ok(account.user_id)
}

impl<S, N> FromRequestParts<ApiState<S, N>> for CurrentUser
where
  S: ProcurementStore + 'static,
  N: Notifier + 'static,
{
  type Rejection = ApiError;

  async fn from_request_parts(
    parts: &mut Parts,
    state: &ApiState<S, N>,
  ) -> Result<Self, Self::Rejection> {
    authenticate(&parts.headers, &state.accounts).map(CurrentUser)
  }
}
