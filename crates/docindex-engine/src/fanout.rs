//! Concurrent per-document embedding

use futures::stream::{self, StreamExt};
use std::sync::Arc;

use docindex_core::{Document, EmbeddingProvider, Error, Result};

use crate::config::DEFAULT_EMBED_CONCURRENCY;

/// Embeds a batch of documents with a bounded number of calls in flight.
///
/// Results come back in input order: `compute(docs)[i]` is the embedding of
/// `docs[i].content` no matter which call finished first.
pub struct EmbeddingFanout<E: EmbeddingProvider + ?Sized> {
    provider: Arc<E>,
    concurrency: usize,
}

impl<E: EmbeddingProvider + ?Sized> EmbeddingFanout<E> {
    pub fn new(provider: Arc<E>) -> Self {
        Self {
            provider,
            concurrency: DEFAULT_EMBED_CONCURRENCY,
        }
    }

    /// Set the number of concurrent embedding calls (at least one)
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency
    }

    /// Embed every document, failing on the first error
    pub async fn compute(&self, documents: &[Document]) -> Result<Vec<Vec<f32>>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let provider = &self.provider;
        let mut pending = stream::iter(documents.iter().enumerate())
            .map(|(index, document)| async move {
                (index, provider.embed_one(&document.content).await)
            })
            .buffer_unordered(self.concurrency);

        let mut slots: Vec<Option<Vec<f32>>> = vec![None; documents.len()];
        let mut dims: Option<usize> = None;

        // dropping `pending` on error abandons the calls still in flight
        while let Some((index, result)) = pending.next().await {
            let vector = result.map_err(|source| Error::Embedding {
                index,
                source: Box::new(source),
            })?;
            check_dims(index, &vector, &mut dims)?;
            slots[index] = Some(vector);
        }

        slots
            .into_iter()
            .enumerate()
            .map(|(index, slot)| {
                slot.ok_or_else(|| Error::Embedding {
                    index,
                    source: Box::new(Error::EmbeddingProvider(
                        "No embedding produced".to_string(),
                    )),
                })
            })
            .collect()
    }
}

/// All vectors of a batch must be non-empty and share one dimension
fn check_dims(index: usize, vector: &[f32], dims: &mut Option<usize>) -> Result<()> {
    let mismatch = |message: String| Error::Embedding {
        index,
        source: Box::new(Error::EmbeddingProvider(message)),
    };

    if vector.is_empty() {
        return Err(mismatch("Empty embedding".to_string()));
    }
    match *dims {
        None => *dims = Some(vector.len()),
        Some(expected) if expected != vector.len() => {
            return Err(mismatch(format!(
                "Embedding has {} dimensions, expected {}",
                vector.len(),
                expected
            )));
        }
        Some(_) => {}
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use std::time::Duration;

    /// Encodes the numeric suffix of "doc-N" as the vector, sleeping longer for lower N
    struct SlowFirstProvider {
        total: u64,
        in_flight: AtomicUsize,
        max_in_flight: AtomicUsize,
        completed: Mutex<Vec<usize>>,
    }

    impl SlowFirstProvider {
        fn new(total: u64) -> Self {
            Self {
                total,
                in_flight: AtomicUsize::new(0),
                max_in_flight: AtomicUsize::new(0),
                completed: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl EmbeddingProvider for SlowFirstProvider {
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            let mut out = Vec::new();
            for text in texts {
                out.push(self.embed_one(text).await?);
            }
            Ok(out)
        }

        async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
            let n: usize = text.trim_start_matches("doc-").parse().unwrap();

            let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_in_flight.fetch_max(now, Ordering::SeqCst);

            let delay = (self.total - n as u64) * 15;
            tokio::time::sleep(Duration::from_millis(delay)).await;

            self.in_flight.fetch_sub(1, Ordering::SeqCst);
            self.completed.lock().unwrap().push(n);
            Ok(vec![n as f32, 1.0])
        }

        fn model_id(&self) -> &str {
            "slow-first"
        }
    }

    struct FailingProvider {
        fail_on: String,
    }

    #[async_trait]
    impl EmbeddingProvider for FailingProvider {
        async fn embed(&self, _texts: &[String]) -> Result<Vec<Vec<f32>>> {
            unreachable!("fanout only calls embed_one")
        }

        async fn embed_one(&self, text: &str) -> Result<Vec<f32>> {
            if text == self.fail_on {
                Err(Error::EmbeddingProvider("status 429: rate limited".to_string()))
            } else {
                Ok(vec![0.1, 0.2])
            }
        }

        fn model_id(&self) -> &str {
            "failing"
        }
    }

    fn docs(n: usize) -> Vec<Document> {
        (0..n).map(|i| Document::new(format!("doc-{i}"))).collect()
    }

    #[tokio::test]
    async fn test_output_follows_input_order_not_completion_order() {
        let provider = Arc::new(SlowFirstProvider::new(10));
        let fanout = EmbeddingFanout::new(provider.clone());

        let vectors = fanout.compute(&docs(10)).await.unwrap();

        assert_eq!(vectors.len(), 10);
        for (i, vector) in vectors.iter().enumerate() {
            assert_eq!(vector[0], i as f32);
        }

        // the later documents really did finish first
        let completed = provider.completed.lock().unwrap().clone();
        assert_eq!(completed.first(), Some(&9));
        assert_eq!(completed.last(), Some(&0));
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let provider = Arc::new(SlowFirstProvider::new(8));
        let fanout = EmbeddingFanout::new(provider.clone()).with_concurrency(3);

        fanout.compute(&docs(8)).await.unwrap();

        let max = provider.max_in_flight.load(Ordering::SeqCst);
        assert!(max <= 3, "max in flight was {max}");
        assert!(max >= 2, "calls did not overlap");
    }

    #[tokio::test]
    async fn test_single_failure_fails_batch_with_index() {
        let provider = Arc::new(FailingProvider {
            fail_on: "beta".to_string(),
        });
        let fanout = EmbeddingFanout::new(provider);
        let documents = vec![
            Document::new("alpha"),
            Document::new("beta"),
            Document::new("gamma"),
        ];

        let err = fanout.compute(&documents).await.unwrap_err();
        match err {
            Error::Embedding { index, source } => {
                assert_eq!(index, 1);
                assert!(matches!(*source, Error::EmbeddingProvider(_)));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_empty_input() {
        let provider = Arc::new(FailingProvider {
            fail_on: String::new(),
        });
        let vectors = EmbeddingFanout::new(provider).compute(&[]).await.unwrap();
        assert!(vectors.is_empty());
    }

    #[test]
    fn test_zero_concurrency_clamped() {
        let provider = Arc::new(SlowFirstProvider::new(1));
        assert_eq!(EmbeddingFanout::new(provider).with_concurrency(0).concurrency(), 1);
    }

    #[test]
    fn test_check_dims() {
        let mut dims = None;
        check_dims(0, &[1.0, 2.0], &mut dims).unwrap();
        assert_eq!(dims, Some(2));
        assert!(check_dims(1, &[1.0], &mut dims).is_err());
        assert!(check_dims(2, &[], &mut dims).is_err());
    }
}
