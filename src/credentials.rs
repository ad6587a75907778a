//! Salted one-way password hashing.

use std::sync::Arc;

use crate::error::{QuizError, QuizResult};

pub trait PasswordHasher: Send + Sync {
    fn hash(&self, password: &str) -> QuizResult<String>;
    fn verify(&self, password: &str, hash: &str) -> QuizResult<bool>;
}

const MIN_COST: u32 = 4;
const MAX_COST: u32 = 31;

/// bcrypt with a configurable work factor.
#[derive(Clone, Debug)]
pub struct BcryptHasher {
    cost: u32,
}

impl BcryptHasher {
    pub fn new(cost: u32) -> Self {
        Self { cost: cost.clamp(MIN_COST, MAX_COST) }
    }
}

impl Default for BcryptHasher {
    fn default() -> Self {
        Self::new(bcrypt::DEFAULT_COST)
    }
}

impl PasswordHasher for BcryptHasher {
    fn hash(&self, password: &str) -> QuizResult<String> {
        bcrypt::hash(password, self.cost)
            .map_err(|e| QuizError::Internal(format!("failed to hash password: {e}")))
    }

    fn verify(&self, password: &str, hash: &str) -> QuizResult<bool> {
        bcrypt::verify(password, hash)
            .map_err(|e| QuizError::Internal(format!("failed to verify password: {e}")))
    }
}

/// Hash on the blocking pool; bcrypt is deliberately slow.
pub async fn hash_blocking(hasher: Arc<dyn PasswordHasher>, password: String) -> QuizResult<String> {
    tokio::task::spawn_blocking(move || hasher.hash(&password))
        .await
        .map_err(|e| QuizError::Internal(format!("hashing task failed: {e}")))?
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hash_is_salted_and_verifies() {
        let hasher = BcryptHasher::new(4);
        let h1 = hasher.hash("secret").unwrap();
        let h2 = hasher.hash("secret").unwrap();
        assert_ne!(h1, "secret");
        assert_ne!(h1, h2);
        assert!(hasher.verify("secret", &h1).unwrap());
        assert!(!hasher.verify("wrong", &h1).unwrap());
    }

    #[test]
    fn cost_is_clamped_to_supported_range() {
        let hasher = BcryptHasher::new(1);
        assert!(hasher.hash("x").unwrap().starts_with("$2b$04$"));
    }

    #[tokio::test]
    async fn blocking_hash_round_trips() {
        let hasher: Arc<dyn PasswordHasher> = Arc::new(BcryptHasher::new(4));
        let h = hash_blocking(hasher.clone(), "pw".into()).await.unwrap();
        assert!(hasher.verify("pw", &h).unwrap());
    }
}
