use crate::error::PayloadError;
use serde::Serialize;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

/// Client-supplied key letting the ledger deduplicate charges and withdrawals.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct IdempotencyToken(String);

impl IdempotencyToken {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdempotencyToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Generates tokens unique within a run: `<run id>-<counter>`.
///
/// The run id is a fresh v4 UUID even for seeded runs, so replaying a seed against a ledger
/// which persists keys never collides with an earlier run.
#[derive(Debug)]
pub struct TokenGenerator {
    run_id: Uuid,
    next: AtomicU64,
}

impl TokenGenerator {
    pub fn new() -> Self {
        Self::with_run_id(Uuid::new_v4())
    }

    pub fn with_run_id(run_id: Uuid) -> Self {
        Self {
            run_id,
            next: AtomicU64::new(0),
        }
    }

    #[cfg(test)]
    fn starting_at(run_id: Uuid, next: u64) -> Self {
        Self {
            run_id,
            next: AtomicU64::new(next),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn next(&self) -> Result<IdempotencyToken, PayloadError> {
        let n = self
            .next
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |n| n.checked_add(1))
            .map_err(|_| PayloadError::TokensExhausted)?;
        Ok(IdempotencyToken(format!("{}-{n}", self.run_id)))
    }
}

impl Default for TokenGenerator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::sync::Arc;

    #[test]
    fn tokens_are_prefixed_with_run_id() {
        let run_id = Uuid::new_v4();
        let tokens = TokenGenerator::with_run_id(run_id);
        assert_eq!(tokens.next().unwrap().as_str(), format!("{run_id}-0"));
        assert_eq!(tokens.next().unwrap().as_str(), format!("{run_id}-1"));
    }

    #[test]
    fn unique_across_threads() {
        let tokens = Arc::new(TokenGenerator::new());
        let handles: Vec<_> = (0..8)
            .map(|_| {
                let tokens = tokens.clone();
                std::thread::spawn(move || {
                    (0..1_000)
                        .map(|_| tokens.next().unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();

        let mut seen = HashSet::new();
        for handle in handles {
            for token in handle.join().unwrap() {
                assert!(seen.insert(token), "duplicate token");
            }
        }
        assert_eq!(seen.len(), 8_000);
    }

    #[test]
    fn exhaustion_is_an_error() {
        let tokens = TokenGenerator::starting_at(Uuid::nil(), u64::MAX - 1);
        assert!(tokens.next().is_ok());
        assert_eq!(tokens.next(), Err(PayloadError::TokensExhausted));
        assert_eq!(tokens.next(), Err(PayloadError::TokensExhausted));
    }
}
