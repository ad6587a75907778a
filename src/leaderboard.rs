//! Leaderboard: deterministic ranking and sparse score updates.
//!
//! Ranking order is a strict total order:
//!   1. score, descending
//!   2. correct answers, descending
//!   3. registration time, ascending (earlier registrant first)
//!   4. registration id, ascending (only reached on identical timestamps)

use std::cmp::Ordering;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, instrument};

use crate::domain::{Participant, ScorePatch};
use crate::error::{QuizError, QuizResult};
use crate::store::QuizStore;

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub registration_id: String,
    pub score: f64,
    pub correct_count: f64,
    pub wrong_count: f64,
}

impl From<&Participant> for LeaderboardEntry {
    fn from(p: &Participant) -> Self {
        Self {
            registration_id: p.registration_id.clone(),
            score: p.score,
            correct_count: p.correct_count,
            wrong_count: p.wrong_count,
        }
    }
}

pub fn ranking_order(a: &Participant, b: &Participant) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| b.correct_count.total_cmp(&a.correct_count))
        .then_with(|| a.created_at.cmp(&b.created_at))
        .then_with(|| a.registration_id.cmp(&b.registration_id))
}

pub fn rank(mut participants: Vec<Participant>) -> Vec<LeaderboardEntry> {
    participants.sort_by(ranking_order);
    participants.iter().map(LeaderboardEntry::from).collect()
}

/// Coerce a client-supplied value the lenient way: numbers and numeric
/// strings parse, `true` is 1, anything else is 0. Negative and non-finite
/// results clamp to 0.
pub fn coerce_number(v: &Value) -> f64 {
    let n = match v {
        Value::Number(n) => n.as_f64().unwrap_or(0.0),
        Value::String(s) => {
            let s = s.trim();
            if s.is_empty() { 0.0 } else { s.parse::<f64>().unwrap_or(0.0) }
        }
        Value::Bool(true) => 1.0,
        _ => 0.0,
    };
    if n.is_finite() && n > 0.0 { n } else { 0.0 }
}

/// Build a sparse patch: only fields present in the request are set.
pub fn coerce_patch(score: Option<&Value>, correct: Option<&Value>, wrong: Option<&Value>) -> ScorePatch {
    ScorePatch {
        score: score.map(coerce_number),
        correct_count: correct.map(coerce_number),
        wrong_count: wrong.map(coerce_number),
    }
}

pub struct Leaderboard {
    store: Arc<dyn QuizStore>,
}

impl Leaderboard {
    pub fn new(store: Arc<dyn QuizStore>) -> Self {
        Self { store }
    }

    #[instrument(level = "debug", skip(self))]
    pub async fn standings(&self) -> QuizResult<Vec<LeaderboardEntry>> {
        let participants = self.store.participants().await?;
        debug!(target: "leaderboard", participants = participants.len(), "Ranking participants");
        Ok(rank(participants))
    }

    /// Apply a sparse update. Replaying the same patch yields the same stored state.
    #[instrument(level = "info", skip(self))]
    pub async fn update(&self, registration_id: &str, patch: ScorePatch) -> QuizResult<LeaderboardEntry> {
        let registration_id = registration_id.trim();
        if registration_id.is_empty() {
            return Err(QuizError::Validation("registrationId is required".into()));
        }
        let updated = self
            .store
            .update_scores(registration_id, patch)
            .await?
            .ok_or_else(|| QuizError::NotFound("User not found".into()))?;
        info!(
            target: "leaderboard",
            %registration_id,
            score = updated.score,
            correct = updated.correct_count,
            wrong = updated.wrong_count,
            "Scores updated"
        );
        Ok(LeaderboardEntry::from(&updated))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::testing::participant;
    use crate::store::{MemoryStore, SqliteStore};
    use chrono::{Duration, Utc};
    use serde_json::json;
    use uuid::Uuid;

    fn p(id: &str, score: f64, correct: f64, registered_secs_ago: i64) -> Participant {
        Participant {
            id: Uuid::new_v4(),
            registration_id: id.to_string(),
            password_hash: String::new(),
            score,
            correct_count: correct,
            wrong_count: 0.0,
            created_at: Utc::now() - Duration::seconds(registered_secs_ago),
        }
    }

    fn ids(entries: &[LeaderboardEntry]) -> Vec<&str> {
        entries.iter().map(|e| e.registration_id.as_str()).collect()
    }

    #[test]
    fn score_then_correct_count() {
        let ranked = rank(vec![p("A", 10.0, 5.0, 30), p("B", 10.0, 7.0, 20), p("C", 12.0, 1.0, 10)]);
        assert_eq!(ids(&ranked), vec!["C", "B", "A"]);
    }

    #[test]
    fn earlier_registrant_wins_exact_ties() {
        let ranked = rank(vec![p("late", 5.0, 2.0, 1), p("early", 5.0, 2.0, 100), p("mid", 5.0, 2.0, 50)]);
        assert_eq!(ids(&ranked), vec!["early", "mid", "late"]);
    }

    #[test]
    fn ranking_is_independent_of_input_order() {
        let now = Utc::now();
        let mut people = vec![p("x1", 3.0, 1.0, 0), p("x2", 3.0, 1.0, 0), p("y", 9.0, 0.0, 0)];
        for person in &mut people {
            person.created_at = now;
        }
        let forward = rank(people.clone());
        people.reverse();
        let backward = rank(people);
        assert_eq!(forward, backward);
        assert_eq!(ids(&forward), vec!["y", "x1", "x2"]);
    }

    #[test]
    fn coercion_is_lenient() {
        assert_eq!(coerce_number(&json!(4.5)), 4.5);
        assert_eq!(coerce_number(&json!(" 7 ")), 7.0);
        assert_eq!(coerce_number(&json!("seven")), 0.0);
        assert_eq!(coerce_number(&json!(null)), 0.0);
        assert_eq!(coerce_number(&json!(true)), 1.0);
        assert_eq!(coerce_number(&json!([1])), 0.0);
        assert_eq!(coerce_number(&json!(-3)), 0.0);
        assert_eq!(coerce_number(&json!("NaN")), 0.0);
    }

    #[test]
    fn patch_only_sets_present_fields() {
        let patch = coerce_patch(None, Some(&json!("3.9")), None);
        assert_eq!(patch, ScorePatch { score: None, correct_count: Some(3.9), wrong_count: None });
        assert!(coerce_patch(None, None, None).is_empty());
    }

    #[tokio::test]
    async fn partial_update_leaves_other_fields() {
        let store = Arc::new(MemoryStore::new());
        store.create_participant(participant("xavier")).await.unwrap();
        let board = Leaderboard::new(store.clone());
        board
            .update("xavier", coerce_patch(Some(&json!(10)), Some(&json!(5)), Some(&json!(2))))
            .await
            .unwrap();

        let entry = board
            .update("xavier", coerce_patch(None, Some(&json!(3)), None))
            .await
            .unwrap();
        assert_eq!(entry.score, 10.0);
        assert_eq!(entry.correct_count, 3.0);
        assert_eq!(entry.wrong_count, 2.0);
    }

    #[tokio::test]
    async fn update_is_idempotent() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        store.create_participant(participant("yolanda")).await.unwrap();
        let board = Leaderboard::new(store);
        let patch = coerce_patch(Some(&json!("12")), Some(&json!(4)), None);
        let first = board.update("yolanda", patch).await.unwrap();
        let second = board.update("yolanda", patch).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(board.standings().await.unwrap(), vec![first]);
    }

    #[tokio::test]
    async fn unknown_participant_is_not_found_and_nothing_changes() {
        let store = Arc::new(MemoryStore::new());
        store.create_participant(participant("zoe")).await.unwrap();
        let board = Leaderboard::new(store.clone());
        let err = board
            .update("nobody", coerce_patch(Some(&json!(100)), None, None))
            .await
            .unwrap_err();
        assert!(matches!(err, QuizError::NotFound(_)));
        let standings = board.standings().await.unwrap();
        assert_eq!(standings[0].score, 0.0);
    }

    #[tokio::test]
    async fn blank_registration_id_is_rejected() {
        let board = Leaderboard::new(Arc::new(MemoryStore::new()));
        let err = board.update("  ", ScorePatch::default()).await.unwrap_err();
        assert!(matches!(err, QuizError::Validation(_)));
    }

    #[tokio::test]
    async fn standings_from_store_follow_ranking() {
        let store = Arc::new(SqliteStore::open_in_memory().unwrap());
        for id in ["anna", "bert", "cleo"] {
            store.create_participant(participant(id)).await.unwrap();
        }
        let board = Leaderboard::new(store);
        board.update("anna", coerce_patch(Some(&json!(10)), Some(&json!(5)), None)).await.unwrap();
        board.update("bert", coerce_patch(Some(&json!(10)), Some(&json!(7)), None)).await.unwrap();
        board.update("cleo", coerce_patch(Some(&json!(12)), Some(&json!(1)), None)).await.unwrap();
        let standings = board.standings().await.unwrap();
        assert_eq!(ids(&standings), vec!["cleo", "bert", "anna"]);
    }
}
