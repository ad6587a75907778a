//! SQLite-backed store.
//!
//! Constraints live in the schema: the UNIQUE index on `registration_id`
//! decides registration races, CHECK clauses reject bad question records
//! individually inside a batch transaction.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::{params, types::Type, Connection, OptionalExtension, Row};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};
use uuid::Uuid;

use super::{QuestionQuery, QuizStore, Registration, StoreError, StoreResult};
use crate::domain::{
    Level, NewParticipant, NewQuestion, OptionLabel, Options, Participant, Question, Round,
    ScorePatch,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS questions (
    id TEXT PRIMARY KEY,
    round INTEGER NOT NULL CHECK (round BETWEEN 1 AND 4),
    level INTEGER NOT NULL CHECK (level BETWEEN 1 AND 3),
    question TEXT NOT NULL CHECK (length(trim(question)) > 0),
    option_a TEXT NOT NULL CHECK (length(trim(option_a)) > 0),
    option_b TEXT NOT NULL CHECK (length(trim(option_b)) > 0),
    option_c TEXT NOT NULL CHECK (length(trim(option_c)) > 0),
    option_d TEXT NOT NULL CHECK (length(trim(option_d)) > 0),
    answer TEXT NOT NULL CHECK (answer IN ('A', 'B', 'C', 'D')),
    points REAL NOT NULL DEFAULT 1 CHECK (points >= 0),
    created_at TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_questions_round_level ON questions (round, level);

CREATE TABLE IF NOT EXISTS participants (
    id TEXT PRIMARY KEY,
    registration_id TEXT NOT NULL UNIQUE
        CHECK (length(registration_id) BETWEEN 3 AND 64),
    password_hash TEXT NOT NULL,
    score REAL NOT NULL DEFAULT 0 CHECK (score >= 0),
    correct_count REAL NOT NULL DEFAULT 0 CHECK (correct_count >= 0),
    wrong_count REAL NOT NULL DEFAULT 0 CHECK (wrong_count >= 0),
    created_at TEXT NOT NULL
);
";

const PARTICIPANT_COLUMNS: &str =
    "id, registration_id, password_hash, score, correct_count, wrong_count, created_at";

const QUESTION_COLUMNS: &str =
    "id, round, level, question, option_a, option_b, option_c, option_d, answer, points, created_at";

pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open (or create) the database file and ensure the schema exists.
    pub fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref();
        let conn = Connection::open(path)?;
        conn.busy_timeout(Duration::from_secs(5))?;
        info!(target: "store", path = %path.display(), "Opened SQLite store");
        Self::init(conn)
    }

    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn: Mutex::new(conn) })
    }
}

#[async_trait]
impl QuizStore for SqliteStore {
    #[instrument(level = "debug", skip(self, batch), fields(batch_len = batch.len()))]
    async fn insert_questions(&self, batch: Vec<NewQuestion>) -> StoreResult<usize> {
        let mut conn = self.conn.lock().await;
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO questions ({QUESTION_COLUMNS})
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)"
            ))?;
            for (idx, q) in batch.iter().enumerate() {
                let res = stmt.execute(params![
                    Uuid::new_v4().to_string(),
                    q.round.get(),
                    q.level.get(),
                    q.text,
                    q.options.a,
                    q.options.b,
                    q.options.c,
                    q.options.d,
                    q.answer.as_str(),
                    q.points,
                    timestamp(Utc::now()),
                ]);
                match res {
                    Ok(_) => inserted += 1,
                    Err(e) if is_constraint(&e) => {
                        warn!(target: "store", idx, error = %e, "Question rejected by store; continuing batch");
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        }
        tx.commit()?;
        debug!(target: "store", inserted, "Question batch committed");
        Ok(inserted)
    }

    async fn list_questions(&self, query: QuestionQuery) -> StoreResult<Vec<Question>> {
        let conn = self.conn.lock().await;
        let limit = i64::try_from(query.limit).unwrap_or(i64::MAX);
        let rows = match query.scope {
            Some((round, level)) => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {QUESTION_COLUMNS} FROM questions
                     WHERE round = ?1 AND level = ?2
                     ORDER BY created_at DESC, rowid DESC LIMIT ?3"
                ))?;
                let rows = stmt
                    .query_map(params![round.get(), level.get(), limit], question_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
            None => {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {QUESTION_COLUMNS} FROM questions
                     ORDER BY round ASC, level ASC, created_at DESC, rowid DESC LIMIT ?1"
                ))?;
                let rows = stmt
                    .query_map(params![limit], question_from_row)?
                    .collect::<Result<Vec<_>, _>>()?;
                rows
            }
        };
        Ok(rows)
    }

    async fn find_participant(&self, registration_id: &str) -> StoreResult<Option<Participant>> {
        let conn = self.conn.lock().await;
        select_participant(&conn, registration_id)
    }

    #[instrument(level = "debug", skip(self, new), fields(registration_id = %new.registration_id))]
    async fn create_participant(&self, new: NewParticipant) -> StoreResult<Registration> {
        let conn = self.conn.lock().await;
        let changed = conn
            .execute(
                "INSERT INTO participants
                     (id, registration_id, password_hash, score, correct_count, wrong_count, created_at)
                 VALUES (?1, ?2, ?3, 0, 0, 0, ?4)
                 ON CONFLICT(registration_id) DO NOTHING",
                params![
                    Uuid::new_v4().to_string(),
                    new.registration_id,
                    new.password_hash,
                    timestamp(Utc::now()),
                ],
            )
            .map_err(constraint_or_db)?;

        let stored = select_participant(&conn, &new.registration_id)?.ok_or_else(|| {
            StoreError::Corrupt(format!("participant '{}' vanished after insert", new.registration_id))
        })?;
        Ok(if changed == 1 {
            Registration::Created(stored)
        } else {
            Registration::Existing(stored)
        })
    }

    async fn participants(&self) -> StoreResult<Vec<Participant>> {
        let conn = self.conn.lock().await;
        let mut stmt = conn.prepare(&format!("SELECT {PARTICIPANT_COLUMNS} FROM participants"))?;
        let rows = stmt
            .query_map([], participant_from_row)?
            .collect::<Result<Vec<_>, _>>()?;
        Ok(rows)
    }

    async fn count_participants(&self) -> StoreResult<u64> {
        let conn = self.conn.lock().await;
        let n: i64 = conn.query_row("SELECT COUNT(*) FROM participants", [], |row| row.get(0))?;
        Ok(n.max(0) as u64)
    }

    #[instrument(level = "debug", skip(self))]
    async fn update_scores(
        &self,
        registration_id: &str,
        patch: ScorePatch,
    ) -> StoreResult<Option<Participant>> {
        let conn = self.conn.lock().await;
        let changed = conn
            .execute(
                "UPDATE participants SET
                     score = COALESCE(?2, score),
                     correct_count = COALESCE(?3, correct_count),
                     wrong_count = COALESCE(?4, wrong_count)
                 WHERE registration_id = ?1",
                params![
                    registration_id,
                    patch.score,
                    patch.correct_count,
                    patch.wrong_count,
                ],
            )
            .map_err(constraint_or_db)?;
        if changed == 0 {
            return Ok(None);
        }
        select_participant(&conn, registration_id)
    }
}

fn select_participant(conn: &Connection, registration_id: &str) -> StoreResult<Option<Participant>> {
    let found = conn
        .query_row(
            &format!("SELECT {PARTICIPANT_COLUMNS} FROM participants WHERE registration_id = ?1"),
            params![registration_id],
            participant_from_row,
        )
        .optional()?;
    Ok(found)
}

fn participant_from_row(row: &Row<'_>) -> rusqlite::Result<Participant> {
    Ok(Participant {
        id: parse_uuid(row, 0)?,
        registration_id: row.get(1)?,
        password_hash: row.get(2)?,
        score: row.get(3)?,
        correct_count: row.get(4)?,
        wrong_count: row.get(5)?,
        created_at: parse_timestamp(row, 6)?,
    })
}

fn question_from_row(row: &Row<'_>) -> rusqlite::Result<Question> {
    let round: u8 = row.get(1)?;
    let level: u8 = row.get(2)?;
    let answer: String = row.get(8)?;
    Ok(Question {
        id: parse_uuid(row, 0)?,
        round: Round::new(round).map_err(|e| conversion_error(1, e.to_string()))?,
        level: Level::new(level).map_err(|e| conversion_error(2, e.to_string()))?,
        text: row.get(3)?,
        options: Options {
            a: row.get(4)?,
            b: row.get(5)?,
            c: row.get(6)?,
            d: row.get(7)?,
        },
        correct_label: OptionLabel::parse(&answer)
            .ok_or_else(|| conversion_error(8, format!("bad answer label '{answer}'")))?,
        points: row.get(9)?,
        created_at: parse_timestamp(row, 10)?,
    })
}

fn parse_uuid(row: &Row<'_>, idx: usize) -> rusqlite::Result<Uuid> {
    let raw: String = row.get(idx)?;
    Uuid::parse_str(&raw).map_err(|e| conversion_error(idx, e.to_string()))
}

fn parse_timestamp(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|d| d.with_timezone(&Utc))
        .map_err(|e| conversion_error(idx, e.to_string()))
}

fn conversion_error(idx: usize, msg: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, msg.into())
}

/// Fixed-width UTC timestamps sort lexicographically in creation order.
fn timestamp(t: DateTime<Utc>) -> String {
    t.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn is_constraint(e: &rusqlite::Error) -> bool {
    matches!(
        e,
        rusqlite::Error::SqliteFailure(err, _) if err.code == rusqlite::ErrorCode::ConstraintViolation
    )
}

fn constraint_or_db(e: rusqlite::Error) -> StoreError {
    if is_constraint(&e) {
        StoreError::Constraint(e.to_string())
    } else {
        StoreError::Database(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::{participant, question};
    use tempfile::NamedTempFile;

    #[tokio::test]
    async fn batch_continues_past_constraint_violations() {
        let store = SqliteStore::open_in_memory().unwrap();
        let batch = vec![
            question(1, Level::Low, "valid one", 1.0),
            question(1, Level::Low, "negative points", -5.0),
            question(1, Level::Low, "   ", 1.0),
            question(1, Level::Low, "valid two", 2.5),
        ];
        assert_eq!(store.insert_questions(batch).await.unwrap(), 2);

        let scope = Some((Round::new(1).unwrap(), Level::Low));
        let stored = store.list_questions(QuestionQuery { scope, limit: 100 }).await.unwrap();
        let texts: Vec<_> = stored.iter().map(|q| q.text.as_str()).collect();
        assert_eq!(texts, vec!["valid two", "valid one"]);
        assert_eq!(stored[0].points, 2.5);
        assert_eq!(stored[0].correct_label, OptionLabel::B);
    }

    #[tokio::test]
    async fn unscoped_listing_orders_by_round_and_level() {
        let store = SqliteStore::open_in_memory().unwrap();
        store
            .insert_questions(vec![
                question(4, Level::Low, "r4l1", 1.0),
                question(2, Level::High, "r2l3", 1.0),
                question(2, Level::Medium, "r2l2", 1.0),
            ])
            .await
            .unwrap();
        let all = store
            .list_questions(QuestionQuery { scope: None, limit: 2 })
            .await
            .unwrap();
        let texts: Vec<_> = all.iter().map(|q| q.text.as_str()).collect();
        assert_eq!(texts, vec!["r2l2", "r2l3"]);
    }

    #[tokio::test]
    async fn unique_index_decides_duplicate_registration() {
        let store = SqliteStore::open_in_memory().unwrap();
        let first = store.create_participant(participant("bob")).await.unwrap();
        assert!(first.is_created());

        let mut dup = participant("bob");
        dup.password_hash = "other".into();
        let second = store.create_participant(dup).await.unwrap();
        assert!(!second.is_created());
        assert_eq!(second.participant().id, first.participant().id);
        assert_eq!(second.participant().password_hash, "hash-of-bob");
        assert_eq!(store.count_participants().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn registration_id_length_is_a_constraint() {
        let store = SqliteStore::open_in_memory().unwrap();
        let err = store.create_participant(participant("ab")).await.unwrap_err();
        assert!(matches!(err, StoreError::Constraint(_)));
    }

    #[tokio::test]
    async fn sparse_update_keeps_absent_columns() {
        let store = SqliteStore::open_in_memory().unwrap();
        store.create_participant(participant("carol")).await.unwrap();
        store
            .update_scores(
                "carol",
                ScorePatch { score: Some(9.0), correct_count: Some(4.0), wrong_count: Some(1.0) },
            )
            .await
            .unwrap();

        let updated = store
            .update_scores("carol", ScorePatch { correct_count: Some(3.0), ..Default::default() })
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.score, 9.0);
        assert_eq!(updated.correct_count, 3.0);
        assert_eq!(updated.wrong_count, 1.0);

        assert!(store
            .update_scores("nobody", ScorePatch { score: Some(1.0), ..Default::default() })
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn data_survives_reopen() {
        let file = NamedTempFile::new().unwrap();
        {
            let store = SqliteStore::open(file.path()).unwrap();
            store.create_participant(participant("dave")).await.unwrap();
            store
                .insert_questions(vec![question(3, Level::Medium, "persisted", 1.0)])
                .await
                .unwrap();
        }
        let reopened = SqliteStore::open(file.path()).unwrap();
        let dave = reopened.find_participant("dave").await.unwrap().unwrap();
        assert_eq!(dave.score, 0.0);
        assert_eq!(reopened.participants().await.unwrap().len(), 1);
        let questions = reopened
            .list_questions(QuestionQuery { scope: None, limit: 10 })
            .await
            .unwrap();
        assert_eq!(questions[0].round.get(), 3);
        assert_eq!(questions[0].level, Level::Medium);
    }
}
