//! Participant registration: the single idempotent path and bulk CSV upload.
//!
//! A duplicate registration id is never an error. The single path answers
//! with the existing identity; the bulk path counts the row as
//! `skipped_existing`. Existing passwords and stats are never touched.

use std::sync::Arc;

use serde::Serialize;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use crate::credentials::{hash_blocking, PasswordHasher};
use crate::domain::{registration_id_in_bounds, NewParticipant};
use crate::error::{QuizError, QuizResult};
use crate::normalize::{parse_rows, CanonicalRow, FieldSpec};
use crate::store::{QuizStore, Registration, StoreError};

#[derive(Clone, Debug, Default, PartialEq)]
pub struct ParticipantRow {
  pub registration_id: String,
  pub password: String,
}

impl CanonicalRow for ParticipantRow {
  const FIELDS: &'static [FieldSpec] = &[
    FieldSpec { canonical: "registrationId", aliases: &["registrationid", "registration_id", "id"] },
    FieldSpec { canonical: "password", aliases: &["password", "pass"] },
  ];

  fn from_fields(values: Vec<String>) -> Self {
    let mut it = values.into_iter();
    ParticipantRow {
      registration_id: it.next().unwrap_or_default(),
      password: it.next().unwrap_or_default(),
    }
  }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum RegistrationStatus {
  Created,
  AlreadyRegistered,
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisterOutcome {
  pub status: RegistrationStatus,
  pub participant_id: Uuid,
}

/// Counters of one bulk upload. `inserted + skipped_existing + invalid == total_rows`.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BulkRegistrationReport {
  pub inserted: usize,
  pub skipped_existing: usize,
  pub invalid: usize,
  pub total_rows: usize,
}

pub struct Registrar {
  store: Arc<dyn QuizStore>,
  hasher: Arc<dyn PasswordHasher>,
  min_password_len: usize,
}

impl Registrar {
  pub fn new(store: Arc<dyn QuizStore>, hasher: Arc<dyn PasswordHasher>, min_password_len: usize) -> Self {
    Self { store, hasher, min_password_len: min_password_len.max(1) }
  }

  /// Register one participant. Replaying the same request returns the same identity.
  #[instrument(level = "info", skip(self, registration_id, password, confirm_password), fields(registration_id = %registration_id.trim()))]
  pub async fn register(
    &self,
    registration_id: &str,
    password: &str,
    confirm_password: &str,
  ) -> QuizResult<RegisterOutcome> {
    let registration_id = registration_id.trim();
    if registration_id.is_empty() || password.is_empty() || confirm_password.is_empty() {
      return Err(QuizError::FieldsRequired);
    }
    if password != confirm_password {
      return Err(QuizError::PasswordMismatch);
    }
    if password.chars().count() < self.min_password_len {
      return Err(QuizError::PasswordTooShort { min: self.min_password_len });
    }
    if !registration_id_in_bounds(registration_id) {
      return Err(QuizError::Validation("registrationId must be 3-64 characters.".into()));
    }

    if let Some(existing) = self.store.find_participant(registration_id).await? {
      info!(target: "quiz_backend", %registration_id, "Already registered");
      return Ok(RegisterOutcome { status: RegistrationStatus::AlreadyRegistered, participant_id: existing.id });
    }

    let outcome = self.create(registration_id, password).await?;
    let status = if outcome.is_created() {
      info!(target: "quiz_backend", %registration_id, "Registered participant");
      RegistrationStatus::Created
    } else {
      // Another request created the same id between our lookup and insert.
      info!(target: "quiz_backend", %registration_id, "Registration lost race; returning existing identity");
      RegistrationStatus::AlreadyRegistered
    };
    Ok(RegisterOutcome { status, participant_id: outcome.participant().id })
  }

  /// Register every row of a credentials CSV, in row order. First occurrence wins.
  #[instrument(level = "info", skip(self, bytes), fields(bytes = bytes.len()))]
  pub async fn register_bulk(&self, bytes: &[u8]) -> QuizResult<BulkRegistrationReport> {
    let rows = parse_rows::<ParticipantRow>(bytes)?;
    let mut report = BulkRegistrationReport { total_rows: rows.len(), ..Default::default() };

    for (idx, row) in rows.enumerate() {
      let registration_id = row.registration_id.trim();
      if registration_id.is_empty() || row.password.is_empty() || !registration_id_in_bounds(registration_id) {
        debug!(target: "ingest", row = idx + 1, "Skipping invalid credential row");
        report.invalid += 1;
        continue;
      }

      if self.store.find_participant(registration_id).await?.is_some() {
        report.skipped_existing += 1;
        continue;
      }

      match self.create(registration_id, &row.password).await {
        Ok(Registration::Created(_)) => report.inserted += 1,
        Ok(Registration::Existing(_)) => report.skipped_existing += 1,
        Err(QuizError::Store(StoreError::Constraint(msg))) => {
          warn!(target: "ingest", row = idx + 1, error = %msg, "Store rejected credential row");
          report.invalid += 1;
        }
        Err(e) => return Err(e),
      }
    }

    info!(
      target: "ingest",
      inserted = report.inserted,
      skipped_existing = report.skipped_existing,
      invalid = report.invalid,
      total_rows = report.total_rows,
      "Participant upload processed"
    );
    Ok(report)
  }

  async fn create(&self, registration_id: &str, password: &str) -> QuizResult<Registration> {
    let password_hash = hash_blocking(self.hasher.clone(), password.to_string()).await?;
    let registration = self
      .store
      .create_participant(NewParticipant { registration_id: registration_id.to_string(), password_hash })
      .await?;
    Ok(registration)
  }
}
