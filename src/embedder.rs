use std::sync::OnceLock;
use std::time::Duration;

use fastembed::{EmbeddingModel, InitOptions, TextEmbedding};

/// Process-wide embedding singleton. Explicit init-on-first-use via
/// `OnceLock` rather than a lazily-populated module-level global — there is
/// exactly one instance, constructed once, never torn down until process
/// exit.
static EMBEDDER: OnceLock<Embedder> = OnceLock::new();

pub struct Embedder {
    model: std::sync::Mutex<TextEmbedding>,
}

#[derive(Debug, thiserror::Error)]
pub enum EmbedderError {
    #[error("embedding model failed to load: {0}")]
    LoadFailed(String),
    #[error("embedding model load timed out")]
    LoadTimedOut,
    #[error("embedding failed: {0}")]
    EmbedFailed(String),
}

impl Embedder {
    /// Loads the model on first call (may block up to 60s, via
    /// `spawn_blocking` under a timeout) and returns the resident instance
    /// on every subsequent call.
    pub async fn get() -> Result<&'static Embedder, EmbedderError> {
        if let Some(embedder) = EMBEDDER.get() {
            return Ok(embedder);
        }

        let loaded = tokio::time::timeout(
            Duration::from_secs(60),
            tokio::task::spawn_blocking(|| {
                TextEmbedding::try_new(
                    InitOptions::new(EmbeddingModel::MultilingualE5Small).with_show_download_progress(false),
                )
            }),
        )
.await
.map_err(|_| EmbedderError::LoadTimedOut)?
.map_err(|e| EmbedderError::LoadFailed(e.to_string()))?
.map_err(|e| EmbedderError::LoadFailed(e.to_string()))?;

        let embedder = Embedder {
            model: std::sync::Mutex::new(loaded),
        };
        Ok(EMBEDDER.get_or_init(|| embedder))
    }

    /// Hot path used by the Matching Engine and Enricher. CPU-bound, so run
    /// off the async executor via `spawn_blocking`.
    pub async fn embed_batch(&'static self, texts: Vec<String>) -> Result<Vec<Vec<f32>>, EmbedderError> {
        tokio::task::spawn_blocking(move || {
            let mut model = self.model.lock().unwrap();
            model
.embed(texts, None)
.map_err(|e| EmbedderError::EmbedFailed(e.to_string()))
        })
.await
.map_err(|e| EmbedderError::EmbedFailed(e.to_string()))?
    }

    pub async fn embed(&'static self, text: String) -> Result<Vec<f32>, EmbedderError> {
        let mut vectors = self.embed_batch(vec![text]).await?;
        vectors.pop().ok_or_else(|| EmbedderError::EmbedFailed("empty batch result".to_string()))
    }
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a * norm_b)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cosine_similarity_of_identical_vectors_is_one() {
        let v = vec![1.0, 2.0, 3.0];
        assert!((cosine_similarity(&v, &v) - 1.0).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_of_orthogonal_vectors_is_zero() {
        let a = vec![1.0, 0.0];
        let b = vec![0.0, 1.0];
        assert!(cosine_similarity(&a, &b).abs() < 1e-6);
    }

    #[test]
    fn cosine_similarity_handles_zero_vector() {
        let a = vec![0.0, 0.0];
        let b = vec![1.0, 1.0];
        assert_eq!(cosine_similarity(&a, &b), 0.0);
    }
}
