//! Public HTTP request/response structs (serde ready).
//! Field names follow the camelCase wire format clients already send.

use axum::extract::FromRequest;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use uuid::Uuid;

use crate::domain::Participant;
use crate::error::QuizError;
use crate::ingest::{BulkRegistrationReport, QuestionIngestReport};
use crate::leaderboard::LeaderboardEntry;

/// Keeps an explicit JSON `null` as `Some(Value::Null)`; only a missing key is `None`.
fn present<'de, D: Deserializer<'de>>(d: D) -> Result<Option<Value>, D::Error> {
    Value::deserialize(d).map(Some)
}

/// `Json` extractor whose rejections are reported as `QuizError`.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(QuizError))]
pub struct JsonBody<T>(pub T);

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterIn {
    #[serde(default)]
    pub registration_id: Option<Value>,
    #[serde(default)]
    pub password: Option<Value>,
    #[serde(default)]
    pub confirm_password: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterOut {
    pub message: &'static str,
    pub user_id: Uuid,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreUpdateIn {
    #[serde(default)]
    pub registration_id: Option<Value>,
    #[serde(default, deserialize_with = "present")]
    pub score: Option<Value>,
    #[serde(default, deserialize_with = "present", alias = "correct")]
    pub correct_count: Option<Value>,
    #[serde(default, deserialize_with = "present", alias = "wrong")]
    pub wrong_count: Option<Value>,
}

#[derive(Debug, Serialize)]
pub struct ScoreUpdateOut {
    pub message: &'static str,
    #[serde(flatten)]
    pub entry: LeaderboardEntry,
}

#[derive(Debug, Serialize)]
pub struct CountOut {
    pub count: u64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ParticipantSummary {
    pub registration_id: String,
    pub created_at: DateTime<Utc>,
}

impl From<&Participant> for ParticipantSummary {
    fn from(p: &Participant) -> Self {
        Self {
            registration_id: p.registration_id.clone(),
            created_at: p.created_at,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UploadQuery {
    pub round: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct QuestionUploadOut {
    pub message: &'static str,
    #[serde(flatten)]
    pub report: QuestionIngestReport,
}

#[derive(Debug, Serialize)]
pub struct ParticipantUploadOut {
    pub message: &'static str,
    #[serde(flatten)]
    pub report: BulkRegistrationReport,
}

#[derive(Serialize)]
pub struct HealthOut {
    pub status: &'static str,
}
