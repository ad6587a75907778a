//! In-memory store: `RwLock`-guarded maps with the same constraints as SQLite.
//!
//! Uniqueness of `registration_id` holds because the existence check and the
//! insert happen under one write guard.

use std::collections::{hash_map::Entry, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};
use uuid::Uuid;

use super::{QuestionQuery, QuizStore, Registration, StoreError, StoreResult};
use crate::domain::{
    registration_id_in_bounds, NewParticipant, NewQuestion, Participant, Question, ScorePatch,
};

#[derive(Clone, Default)]
pub struct MemoryStore {
    questions: Arc<RwLock<Vec<Question>>>,
    by_registration: Arc<RwLock<HashMap<String, Participant>>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl QuizStore for MemoryStore {
    #[instrument(level = "debug", skip(self, batch), fields(batch_len = batch.len()))]
    async fn insert_questions(&self, batch: Vec<NewQuestion>) -> StoreResult<usize> {
        let mut questions = self.questions.write().await;
        let mut inserted = 0;
        for (idx, q) in batch.into_iter().enumerate() {
            if let Some(reason) = q.constraint_violation() {
                warn!(target: "store", idx, reason, "Question rejected by store; continuing batch");
                continue;
            }
            questions.push(Question {
                id: Uuid::new_v4(),
                round: q.round,
                level: q.level,
                text: q.text,
                options: q.options,
                correct_label: q.answer,
                points: q.points,
                created_at: Utc::now(),
            });
            inserted += 1;
        }
        debug!(target: "store", inserted, "Question batch stored");
        Ok(inserted)
    }

    async fn list_questions(&self, query: QuestionQuery) -> StoreResult<Vec<Question>> {
        let questions = self.questions.read().await;
        // Reverse insertion order first so the stable sort keeps newest first on equal timestamps.
        let mut out: Vec<Question> = questions
            .iter()
            .rev()
            .filter(|q| match query.scope {
                Some((round, level)) => q.round == round && q.level == level,
                None => true,
            })
            .cloned()
            .collect();
        out.sort_by(|a, b| {
            a.round
                .cmp(&b.round)
                .then(a.level.cmp(&b.level))
                .then(b.created_at.cmp(&a.created_at))
        });
        out.truncate(query.limit);
        Ok(out)
    }

    async fn find_participant(&self, registration_id: &str) -> StoreResult<Option<Participant>> {
        Ok(self.by_registration.read().await.get(registration_id).cloned())
    }

    #[instrument(level = "debug", skip(self, new), fields(registration_id = %new.registration_id))]
    async fn create_participant(&self, new: NewParticipant) -> StoreResult<Registration> {
        if !registration_id_in_bounds(&new.registration_id) {
            return Err(StoreError::Constraint(format!(
                "registration_id '{}' must be 3-64 characters",
                new.registration_id
            )));
        }
        let mut by_registration = self.by_registration.write().await;
        match by_registration.entry(new.registration_id) {
            Entry::Occupied(existing) => Ok(Registration::Existing(existing.get().clone())),
            Entry::Vacant(slot) => {
                let p = Participant {
                    id: Uuid::new_v4(),
                    registration_id: slot.key().clone(),
                    password_hash: new.password_hash,
                    score: 0.0,
                    correct_count: 0.0,
                    wrong_count: 0.0,
                    created_at: Utc::now(),
                };
                slot.insert(p.clone());
                Ok(Registration::Created(p))
            }
        }
    }

    async fn participants(&self) -> StoreResult<Vec<Participant>> {
        Ok(self.by_registration.read().await.values().cloned().collect())
    }

    async fn count_participants(&self) -> StoreResult<u64> {
        Ok(self.by_registration.read().await.len() as u64)
    }

    async fn update_scores(
        &self,
        registration_id: &str,
        patch: ScorePatch,
    ) -> StoreResult<Option<Participant>> {
        if let Some(score) = patch.score {
            if !score.is_finite() || score < 0.0 {
                return Err(StoreError::Constraint(format!("score {score} must be non-negative")));
            }
        }
        let mut by_registration = self.by_registration.write().await;
        Ok(by_registration.get_mut(registration_id).map(|p| {
            patch.apply(p);
            p.clone()
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Level, Round};
    use crate::store::testing::{participant, question};

    #[tokio::test]
    async fn batch_skips_records_that_violate_constraints() {
        let store = MemoryStore::new();
        let batch = vec![
            question(1, Level::Low, "ok", 1.0),
            question(1, Level::Low, "negative", -2.0),
            question(1, Level::Low, "also ok", 3.0),
        ];
        assert_eq!(store.insert_questions(batch).await.unwrap(), 2);
        let all = store
            .list_questions(QuestionQuery { scope: None, limit: 10 })
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
    }

    #[tokio::test]
    async fn scoped_listing_filters_and_caps() {
        let store = MemoryStore::new();
        store
            .insert_questions(vec![
                question(2, Level::High, "first", 1.0),
                question(2, Level::High, "second", 1.0),
                question(2, Level::Low, "other level", 1.0),
                question(3, Level::High, "other round", 1.0),
            ])
            .await
            .unwrap();
        let scope = Some((Round::new(2).unwrap(), Level::High));
        let got = store.list_questions(QuestionQuery { scope, limit: 10 }).await.unwrap();
        let texts: Vec<_> = got.iter().map(|q| q.text.as_str()).collect();
        assert_eq!(texts, vec!["second", "first"]);

        let capped = store.list_questions(QuestionQuery { scope, limit: 1 }).await.unwrap();
        assert_eq!(capped.len(), 1);
    }

    #[tokio::test]
    async fn unscoped_listing_sorts_by_round_then_level() {
        let store = MemoryStore::new();
        store
            .insert_questions(vec![
                question(3, Level::Low, "r3l1", 1.0),
                question(1, Level::High, "r1l3", 1.0),
                question(1, Level::Low, "r1l1", 1.0),
            ])
            .await
            .unwrap();
        let got = store
            .list_questions(QuestionQuery { scope: None, limit: 10 })
            .await
            .unwrap();
        let texts: Vec<_> = got.iter().map(|q| q.text.as_str()).collect();
        assert_eq!(texts, vec!["r1l1", "r1l3", "r3l1"]);
    }

    #[tokio::test]
    async fn duplicate_registration_returns_first_writer() {
        let store = MemoryStore::new();
        let first = store.create_participant(participant("alice")).await.unwrap();
        assert!(first.is_created());

        let mut again = participant("alice");
        again.password_hash = "different".into();
        let second = store.create_participant(again).await.unwrap();
        assert!(!second.is_created());
        assert_eq!(second.participant().id, first.participant().id);
        assert_eq!(second.participant().password_hash, "hash-of-alice");
        assert_eq!(store.count_participants().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn concurrent_creates_yield_one_participant() {
        let store = MemoryStore::new();
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = store.clone();
                tokio::spawn(async move { store.create_participant(participant("racer")).await })
            })
            .collect();
        let mut created = 0;
        for h in handles {
            if h.await.unwrap().unwrap().is_created() {
                created += 1;
            }
        }
        assert_eq!(created, 1);
        assert_eq!(store.count_participants().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn update_of_unknown_participant_is_none() {
        let store = MemoryStore::new();
        let patch = ScorePatch { score: Some(4.0), ..Default::default() };
        assert!(store.update_scores("ghost", patch).await.unwrap().is_none());
        assert_eq!(store.count_participants().await.unwrap(), 0);
    }
}
