//! Trait for the pattern-topology provider.

use anyhow::Result;
use tracing::debug;

use crate::model::{Pattern, PatternId};

/// Abstraction over a pattern topology source (e.g., a bus tracker API).
///
/// Implementors answer one capped batch at a time; callers use
/// [`PatternProvider::patterns`], which splits larger requests.
#[async_trait::async_trait]
pub trait PatternProvider: Send + Sync {
    /// Largest number of pattern ids accepted by one request.
    fn max_batch(&self) -> usize;

    async fn pattern_batch(&self, pattern_ids: &[PatternId]) -> Result<Vec<Pattern>>;

    /// Fetches all `pattern_ids` with sequential requests of at most
    /// `max_batch()` ids each, concatenating the results.
    async fn patterns(&self, pattern_ids: &[PatternId]) -> Result<Vec<Pattern>> {
        let batch = self.max_batch().max(1);
        let mut patterns = Vec::with_capacity(pattern_ids.len());

        for chunk in pattern_ids.chunks(batch) {
            debug!(ids = ?chunk, "Requesting pattern batch");
            patterns.extend(self.pattern_batch(chunk).await?);
        }

        Ok(patterns)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        cap: usize,
        calls: Mutex<Vec<Vec<PatternId>>>,
    }

    #[async_trait::async_trait]
    impl PatternProvider for Recorder {
        fn max_batch(&self) -> usize {
            self.cap
        }

        async fn pattern_batch(&self, pattern_ids: &[PatternId]) -> Result<Vec<Pattern>> {
            self.calls.lock().unwrap().push(pattern_ids.to_vec());
            Ok(pattern_ids
                .iter()
                .map(|&pattern_id| Pattern {
                    pattern_id,
                    direction: "East".into(),
                    points: vec![],
                })
                .collect())
        }
    }

    #[tokio::test]
    async fn test_patterns_split_into_capped_batches() {
        let provider = Recorder {
            cap: 10,
            calls: Mutex::new(Vec::new()),
        };
        let ids: Vec<PatternId> = (1..=23).collect();

        let patterns = provider.patterns(&ids).await.unwrap();
        let calls = provider.calls.lock().unwrap();

        assert_eq!(patterns.len(), 23);
        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0].len(), 10);
        assert_eq!(calls[2], vec![21, 22, 23]);
    }

    #[tokio::test]
    async fn test_no_ids_no_requests() {
        let provider = Recorder {
            cap: 10,
            calls: Mutex::new(Vec::new()),
        };
        assert!(provider.patterns(&[]).await.unwrap().is_empty());
        assert!(provider.calls.lock().unwrap().is_empty());
    }
}
