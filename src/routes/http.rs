//! HTTP endpoint handlers. These are thin wrappers that forward to the pipelines.
//! Each handler is instrumented; passwords and file bodies are never recorded.

use std::sync::Arc;
use axum::{
  extract::{multipart::{Field, MultipartError}, Multipart, Path, Query, State},
  http::StatusCode,
  response::IntoResponse,
  Json,
};
use tracing::{info, instrument};

use crate::domain::{Level, LevelLabel, Round};
use crate::error::QuizError;
use crate::ingest::{QuestionSources, RegistrationStatus};
use crate::leaderboard::coerce_patch;
use crate::protocol::*;
use crate::state::AppState;
use crate::util::value_to_text;

type HttpResult<T> = Result<T, QuizError>;

#[instrument(level = "info")]
pub async fn http_health() -> impl IntoResponse { Json(HealthOut { status: "ok" }) }

#[instrument(level = "info", skip(state, body))]
pub async fn http_register(
  State(state): State<Arc<AppState>>,
  JsonBody(body): JsonBody<RegisterIn>,
) -> HttpResult<impl IntoResponse> {
  let outcome = state
    .registrar
    .register(
      &value_to_text(body.registration_id.as_ref()),
      &value_to_text(body.password.as_ref()),
      &value_to_text(body.confirm_password.as_ref()),
    )
    .await?;
  let (status, message) = match outcome.status {
    RegistrationStatus::Created => (StatusCode::CREATED, "Registered successfully"),
    RegistrationStatus::AlreadyRegistered => (StatusCode::OK, "Already registered"),
  };
  Ok((status, Json(RegisterOut { message, user_id: outcome.participant_id })))
}

#[instrument(level = "info", skip(state))]
pub async fn http_leaderboard(State(state): State<Arc<AppState>>) -> HttpResult<impl IntoResponse> {
  let rows = state.leaderboard.standings().await?;
  info!(target: "leaderboard", rows = rows.len(), "HTTP leaderboard served");
  Ok(Json(rows))
}

#[instrument(level = "info", skip(state, body))]
pub async fn http_update_scores(
  State(state): State<Arc<AppState>>,
  JsonBody(body): JsonBody<ScoreUpdateIn>,
) -> HttpResult<impl IntoResponse> {
  let registration_id = value_to_text(body.registration_id.as_ref());
  let patch = coerce_patch(body.score.as_ref(), body.correct_count.as_ref(), body.wrong_count.as_ref());
  let entry = state.leaderboard.update(&registration_id, patch).await?;
  Ok(Json(ScoreUpdateOut { message: "Scores updated", entry }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_count_users(State(state): State<Arc<AppState>>) -> HttpResult<impl IntoResponse> {
  Ok(Json(CountOut { count: state.participant_count().await? }))
}

#[instrument(level = "info", skip(state))]
pub async fn http_list_users(State(state): State<Arc<AppState>>) -> HttpResult<impl IntoResponse> {
  let participants = state.participants_newest_first().await?;
  let out: Vec<ParticipantSummary> = participants.iter().map(ParticipantSummary::from).collect();
  Ok(Json(out))
}

/// Multipart field `file` (preferred) or `users` holding the credentials CSV.
#[instrument(level = "info", skip(state, multipart))]
pub async fn http_upload_users(
  State(state): State<Arc<AppState>>,
  mut multipart: Multipart,
) -> HttpResult<impl IntoResponse> {
  let mut file = None;
  let mut users = None;
  while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
    match field.name() {
      Some("file") if file.is_none() => file = Some(read_field(field).await?),
      Some("users") if users.is_none() => users = Some(read_field(field).await?),
      _ => reject_unexpected_file(&field)?,
    }
  }
  let bytes = file
    .or(users)
    .ok_or_else(|| QuizError::Validation("CSV file is required (field name: file or users).".into()))?;

  let report = state.registrar.register_bulk(&bytes).await?;
  Ok((StatusCode::CREATED, Json(ParticipantUploadOut { message: "Users upload processed", report })))
}

/// `?round=N` plus one multipart file per level label.
#[instrument(level = "info", skip(state, multipart))]
pub async fn http_upload_questions(
  State(state): State<Arc<AppState>>,
  Query(q): Query<UploadQuery>,
  mut multipart: Multipart,
) -> HttpResult<impl IntoResponse> {
  let round = q.round.unwrap_or_default();
  // Reject a bad round before reading any file body.
  Round::parse(&round)?;

  let mut sources = QuestionSources::new();
  while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
    let label = field.name().and_then(LevelLabel::from_field_name);
    match label {
      Some(label) if sources.contains_key(&label) => {
        return Err(QuizError::Validation(format!("Field '{}' may only be sent once.", label.as_str())));
      }
      Some(label) => {
        let bytes = read_field(field).await?;
        sources.insert(label, bytes);
      }
      None => reject_unexpected_file(&field)?,
    }
  }

  let report = state.questions.ingest(&round, sources).await?;
  Ok((StatusCode::CREATED, Json(QuestionUploadOut { message: "Questions uploaded", report })))
}

#[instrument(level = "info", skip(state))]
pub async fn http_list_questions(State(state): State<Arc<AppState>>) -> HttpResult<impl IntoResponse> {
  Ok(Json(state.all_questions().await?))
}

#[instrument(level = "info", skip(state))]
pub async fn http_list_questions_by_level(
  State(state): State<Arc<AppState>>,
  Path((round, level)): Path<(String, String)>,
) -> HttpResult<impl IntoResponse> {
  let round = Round::parse(&round)?;
  let level = Level::parse(&level)?;
  Ok(Json(state.questions_for(round, level).await?))
}

async fn read_field(field: Field<'_>) -> HttpResult<Vec<u8>> {
  Ok(field.bytes().await.map_err(multipart_error)?.to_vec())
}

/// Unknown file parts are an error; stray text parts are ignored.
fn reject_unexpected_file(field: &Field<'_>) -> HttpResult<()> {
  if field.file_name().is_some() {
    let name = field.name().unwrap_or("<unnamed>");
    return Err(QuizError::Validation(format!("Unexpected upload field '{name}'.")));
  }
  Ok(())
}

fn multipart_error(e: MultipartError) -> QuizError {
  QuizError::Validation(format!("Invalid multipart upload: {}", e.body_text()))
}
