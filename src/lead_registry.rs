use chrono::{DateTime, Utc};
use moka::future::Cache;
use sha2::{Digest, Sha256};
use std::time::Duration;

use crate::validation::only_digits;

/// In-memory registry of recently forwarded applicants.
///
/// Keys are SHA-256 hashes of the tax-identifier digits so raw documents are
/// never held in memory longer than the request. Entries expire after the
/// configured TTL.
#[derive(Clone)]
pub struct LeadRegistry {
    entries: Cache<String, DateTime<Utc>>,
}

impl LeadRegistry {
    pub fn new(ttl: Duration, max_capacity: u64) -> Self {
        Self {
            entries: Cache::builder()
                .time_to_live(ttl)
                .max_capacity(max_capacity)
                .build(),
        }
    }

    /// Registry key for a document: hex SHA-256 of its digits.
    pub fn key_for(document: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(only_digits(document).as_bytes());
        hex::encode(hasher.finalize())
    }

    /// Atomically claims a document for forwarding.
    ///
    /// Returns `None` when this call made the claim, or the time of the
    /// earlier claim when the applicant is already registered. Concurrent
    /// claims for the same document see exactly one `None`.
    pub async fn claim(&self, document: &str) -> Option<DateTime<Utc>> {
        let entry = self
            .entries
            .entry(Self::key_for(document))
            .or_insert_with(async { Utc::now() })
            .await;
        if entry.is_fresh() {
            None
        } else {
            Some(entry.into_value())
        }
    }

    /// Drops a claim whose forwarding failed, so the applicant can retry.
    pub async fn release(&self, document: &str) {
        self.entries.invalidate(&Self::key_for(document)).await;
    }
}

impl Default for LeadRegistry {
    /// 24 hour TTL, 10k entries.
    fn default() -> Self {
        Self::new(Duration::from_secs(86_400), 10_000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_ignores_formatting() {
        assert_eq!(
            LeadRegistry::key_for("529.982.247-25"),
            LeadRegistry::key_for("52998224725")
        );
        assert_eq!(LeadRegistry::key_for("52998224725").len(), 64);
    }

    #[test]
    fn test_key_does_not_contain_document() {
        assert!(!LeadRegistry::key_for("52998224725").contains("52998224725"));
    }

    #[tokio::test]
    async fn test_claim_then_duplicate() {
        let registry = LeadRegistry::default();
        assert!(registry.claim("529.982.247-25").await.is_none());
        assert!(registry.claim("52998224725").await.is_some());
        assert!(registry.claim("11144477735").await.is_none());
    }

    #[tokio::test]
    async fn test_release_allows_new_claim() {
        let registry = LeadRegistry::default();
        assert!(registry.claim("52998224725").await.is_none());
        registry.release("52998224725").await;
        assert!(registry.claim("52998224725").await.is_none());
    }

    #[tokio::test]
    async fn test_concurrent_claims_have_one_winner() {
        let registry = LeadRegistry::default();
        let claims = (0..16).map(|_| {
            let registry = registry.clone();
            tokio::spawn(async move { registry.claim("52998224725").await.is_none() })
        });

        let mut winners = 0;
        for claim in claims.collect::<Vec<_>>() {
            if claim.await.unwrap() {
                winners += 1;
            }
        }
        assert_eq!(winners, 1);
    }

    #[tokio::test]
    async fn test_instances_are_isolated() {
        let first = LeadRegistry::default();
        let second = LeadRegistry::default();
        first.claim("52998224725").await;
        assert!(second.claim("52998224725").await.is_none());
    }
}
