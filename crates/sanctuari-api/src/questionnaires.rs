//! Handlers for an RFQ's questionnaire and the owner's answers.
//!
//! | Method  | Path | Notes |
//! |---------|------|-------|
//! | `GET`   | `/rfqs/{id}/questions` | The product's questions by section |
//! | `GET`   | `/rfqs/{id}/responses` | Answers keyed by question id |
//! | `PATCH` | `/rfqs/{id}/responses` | Body: [`AnswerInput`]; drafts only |

use std::collections::BTreeMap;

use axum::{
  Json,
  extract::{
    Path, State,
    rejection::{JsonRejection, PathRejection},
  },
};
use sanctuari_core::{
  notify::Notifier,
  questionnaire::{Answer, AnswerInput, Questionnaire},
  store::ProcurementStore,
};
use uuid::Uuid;

use crate::{ApiState, auth::CurrentUser, error::ApiError};

/// `GET /rfqs/{id}/questions`
pub async fn questions<S, N>(
  State(state): State<ApiState<S, N>>,
  CurrentUser(user): CurrentUser,
  path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<Questionnaire>, ApiError>
where
  S: ProcurementStore + 'static,
  N: Notifier + 'static,
{
  let Path(id) = path?;
  Ok(Json(state.procurement.questionnaire(user, id).await?))
}

/// `GET /rfqs/{id}/responses`
pub async fn responses<S, N>(
  State(state): State<ApiState<S, N>>,
  CurrentUser(user): CurrentUser,
  path: Result<Path<Uuid>, PathRejection>,
) -> Result<Json<BTreeMap<Uuid, Answer>>, ApiError>
where
  S: ProcurementStore + 'static,
  N: Notifier + 'static,
{
  let Path(id) = path?;
  let answers = state.procurement.answers(user, id).await?;
  Ok(Json(answers.into_iter().map(|a| (a.question_id, a)).collect()))
}

/// `PATCH /rfqs/{id}/responses`
pub async fn save_response<S, N>(
  State(state): State<ApiState<S, N>>,
  CurrentUser(user): CurrentUser,
  path: Result<Path<Uuid>, PathRejection>,
  body: Result<Json<AnswerInput>, JsonRejection>,
) -> Result<Json<Answer>, ApiError>
where
  S: ProcurementStore + 'static,
  N: Notifier + 'static,
{
  let Path(id) = path?;
  let Json(input) = body?;
  Ok(Json(state.procurement.save_answer(user, id, input).await?))
}
