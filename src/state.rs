//! Application state: the injected store handle and the services built on it.
//!
//! The store is opened once by the service shell and shared by every pipeline;
//! nothing else here holds mutable state between requests.

use std::sync::Arc;

use tracing::{info, instrument};

use crate::config::{QuizConfig, StoreBackend};
use crate::credentials::{BcryptHasher, PasswordHasher};
use crate::domain::{Level, Participant, Question, Round};
use crate::error::QuizResult;
use crate::ingest::{QuestionIngest, Registrar};
use crate::leaderboard::Leaderboard;
use crate::store::{MemoryStore, QuestionQuery, QuizStore, SqliteStore, StoreResult};

pub struct AppState {
    pub config: QuizConfig,
    pub store: Arc<dyn QuizStore>,
    pub questions: QuestionIngest,
    pub registrar: Registrar,
    pub leaderboard: Leaderboard,
}

impl AppState {
    pub fn new(config: QuizConfig, store: Arc<dyn QuizStore>, hasher: Arc<dyn PasswordHasher>) -> Self {
        Self {
            questions: QuestionIngest::new(store.clone()),
            registrar: Registrar::new(store.clone(), hasher, config.auth.min_password_len),
            leaderboard: Leaderboard::new(store.clone()),
            store,
            config,
        }
    }

    /// Open the configured backend and wire the services to it.
    #[instrument(level = "info", skip_all)]
    pub fn from_config(config: QuizConfig) -> StoreResult<Self> {
        let store: Arc<dyn QuizStore> = match config.store.backend {
            StoreBackend::Sqlite => Arc::new(SqliteStore::open(&config.store.path)?),
            StoreBackend::Memory => {
                info!(target: "quiz_backend", "Using in-memory store; data is lost on exit");
                Arc::new(MemoryStore::new())
            }
        };
        let hasher = Arc::new(BcryptHasher::new(config.auth.bcrypt_cost));
        Ok(Self::new(config, store, hasher))
    }

    /// Newest first within one round/level, capped by `questions_by_level_max`.
    pub async fn questions_for(&self, round: Round, level: Level) -> QuizResult<Vec<Question>> {
        let query = QuestionQuery {
            scope: Some((round, level)),
            limit: self.config.limits.questions_by_level_max,
        };
        Ok(self.store.list_questions(query).await?)
    }

    /// Whole bank by round, level, newest first, capped by `questions_list_max`.
    pub async fn all_questions(&self) -> QuizResult<Vec<Question>> {
        let query = QuestionQuery { scope: None, limit: self.config.limits.questions_list_max };
        Ok(self.store.list_questions(query).await?)
    }

    /// Most recent registrations first.
    pub async fn participants_newest_first(&self) -> QuizResult<Vec<Participant>> {
        let mut participants = self.store.participants().await?;
        participants.sort_by(|a, b| {
            b.created_at
                .cmp(&a.created_at)
                .then_with(|| a.registration_id.cmp(&b.registration_id))
        });
        Ok(participants)
    }

    pub async fn participant_count(&self) -> QuizResult<u64> {
        Ok(self.store.count_participants().await?)
    }
}
