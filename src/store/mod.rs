//! Record store: durable Questions and Participants.
//!
//! Pipelines and the leaderboard only see `dyn QuizStore`; the service shell
//! decides which backend to open and owns its lifecycle.
//!
//! Guarantees every backend provides:
//!   - `registration_id` uniqueness is enforced by the store itself, so two
//!     concurrent creates for one id yield one `Created` and one `Existing`;
//!   - `insert_questions` is continue-on-error: a record that violates a
//!     constraint is skipped and the rest of the batch still persists. The
//!     returned count is what was actually stored.

use async_trait::async_trait;
use thiserror::Error;

use crate::domain::{Level, NewParticipant, NewQuestion, Participant, Question, Round, ScorePatch};

pub mod memory;
pub mod sqlite;

pub use memory::MemoryStore;
pub use sqlite::SqliteStore;

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("Constraint violation: {0}")]
    Constraint(String),

    #[error("Corrupt record: {0}")]
    Corrupt(String),

    #[error("Store unavailable: {0}")]
    Unavailable(String),
}

/// Outcome of a participant create. A duplicate id is not an error.
#[derive(Clone, Debug, PartialEq)]
pub enum Registration {
    Created(Participant),
    Existing(Participant),
}

impl Registration {
    pub fn participant(&self) -> &Participant {
        match self {
            Registration::Created(p) | Registration::Existing(p) => p,
        }
    }

    pub fn is_created(&self) -> bool {
        matches!(self, Registration::Created(_))
    }
}

/// Question retrieval: optional round/level scope plus a result cap.
///
/// Scoped queries return newest first; unscoped ones sort by round, then
/// level, then newest first.
#[derive(Clone, Copy, Debug)]
pub struct QuestionQuery {
    pub scope: Option<(Round, Level)>,
    pub limit: usize,
}

#[async_trait]
pub trait QuizStore: Send + Sync {
    /// Best-effort batch insert. Returns the number of records persisted.
    async fn insert_questions(&self, batch: Vec<NewQuestion>) -> StoreResult<usize>;

    async fn list_questions(&self, query: QuestionQuery) -> StoreResult<Vec<Question>>;

    async fn find_participant(&self, registration_id: &str) -> StoreResult<Option<Participant>>;

    /// First writer wins: a duplicate returns the stored participant untouched.
    async fn create_participant(&self, new: NewParticipant) -> StoreResult<Registration>;

    /// Every participant, in no particular order.
    async fn participants(&self) -> StoreResult<Vec<Participant>>;

    async fn count_participants(&self) -> StoreResult<u64>;

    /// Applies only the fields present in `patch`. `None` when no participant matches.
    async fn update_scores(
        &self,
        registration_id: &str,
        patch: ScorePatch,
    ) -> StoreResult<Option<Participant>>;
}
