//! In-memory semantic index and the startup-time builder.
//!
//! Each content domain (technical PDF, diet web page) gets its own
//! [`SemanticIndex`]: chunk records paired with embedding vectors, searched
//! by brute-force cosine similarity. Corpora here are a handful of documents,
//! so linear scan beats any ANN structure on both simplicity and latency.
//!
//! A build is all-or-nothing per domain. If either extraction or embedding
//! fails, the domain's slot in the [`KnowledgeBase`] stays empty and the
//! service runs degraded; it never serves a half-built index.

use tracing::{error, info};

use crate::chunk::chunk_text;
use crate::config::{ChunkingConfig, KnowledgeConfig};
use crate::embedding::{cosine_similarity, Embedder};
use crate::loader::{ContentLoader, PdfLoader, WebPageLoader};
use crate::models::DocumentChunk;

/// Why a domain index could not be built.
#[derive(Debug)]
pub enum BuildError {
    Extraction(String),
    Embedding(String),
}

impl std::fmt::Display for BuildError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BuildError::Extraction(e) => write!(f, "content extraction failed: {}", e),
            BuildError::Embedding(e) => write!(f, "embedding failed: {}", e),
        }
    }
}

impl std::error::Error for BuildError {}

/// Chunks plus their embedding vectors for one content domain.
pub struct SemanticIndex {
    label: String,
    entries: Vec<(DocumentChunk, Vec<f32>)>,
}

impl SemanticIndex {
    /// Assemble from parallel chunk/vector lists (must be equal length).
    pub fn from_parts(label: &str, chunks: Vec<DocumentChunk>, vectors: Vec<Vec<f32>>) -> Self {
        debug_assert_eq!(chunks.len(), vectors.len());
        Self {
            label: label.to_string(),
            entries: chunks.into_iter().zip(vectors).collect(),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The `k` chunks nearest to `query_vec`, best first.
    pub fn top_k(&self, query_vec: &[f32], k: usize) -> Vec<(&DocumentChunk, f32)> {
        let mut scored: Vec<(&DocumentChunk, f32)> = self
            .entries
            .iter()
            .map(|(chunk, vec)| (chunk, cosine_similarity(query_vec, vec)))
            .collect();

        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(k);
        scored
    }
}

/// Build one domain index: extract, chunk, embed every chunk, assemble.
pub async fn build_index(
    label: &str,
    loader: &dyn ContentLoader,
    embedder: &dyn Embedder,
    chunking: &ChunkingConfig,
) -> Result<SemanticIndex, BuildError> {
    info!(source = %loader.describe(), "loading {} content", label);
    let text = loader
        .load()
        .await
        .map_err(|e| BuildError::Extraction(e.to_string()))?;

    let chunks = chunk_text(label, &text, chunking.window_chars, chunking.overlap_chars);
    if chunks.is_empty() {
        return Err(BuildError::Extraction(format!(
            "no chunks produced from {}",
            loader.describe()
        )));
    }
    info!(chunks = chunks.len(), "embedding {} chunks", label);

    let texts: Vec<String> = chunks.iter().map(|c| c.text.clone()).collect();
    let vectors = embedder
        .embed(&texts)
        .await
        .map_err(|e| BuildError::Embedding(e.to_string()))?;
    if vectors.len() != chunks.len() {
        return Err(BuildError::Embedding(format!(
            "expected {} vectors, got {}",
            chunks.len(),
            vectors.len()
        )));
    }

    Ok(SemanticIndex::from_parts(label, chunks, vectors))
}

/// Readiness of the knowledge base as a whole.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    /// Neither index built; knowledge queries must be refused.
    Uninitialized,
    /// One index built; the other domain is unavailable.
    Partial { technical: bool, diet: bool },
    /// Both indexes built.
    Ready,
}

/// The two domain indexes, each independently present or absent.
#[derive(Default)]
pub struct KnowledgeBase {
    pub technical: Option<SemanticIndex>,
    pub diet: Option<SemanticIndex>,
}

impl KnowledgeBase {
    pub fn readiness(&self) -> Readiness {
        match (&self.technical, &self.diet) {
            (Some(_), Some(_)) => Readiness::Ready,
            (None, None) => Readiness::Uninitialized,
            (t, d) => Readiness::Partial {
                technical: t.is_some(),
                diet: d.is_some(),
            },
        }
    }
}

/// Build both domain indexes, tolerating per-domain failure.
pub async fn build_knowledge_base(
    knowledge: &KnowledgeConfig,
    chunking: &ChunkingConfig,
    embedder: &dyn Embedder,
) -> KnowledgeBase {
    let pdf_loader = PdfLoader::new(knowledge.technical_pdf.clone());
    let technical = match build_index("technical", &pdf_loader, embedder, chunking).await {
        Ok(index) => {
            info!(index = index.label(), chunks = index.len(), "index ready");
            Some(index)
        }
        Err(e) => {
            error!(error = %e, "technical index build failed; domain disabled");
            None
        }
    };

    let web_loader = WebPageLoader::new(
        knowledge.diet_url.clone(),
        std::time::Duration::from_secs(knowledge.fetch_timeout_secs),
    );
    let diet = match build_index("diet", &web_loader, embedder, chunking).await {
        Ok(index) => {
            info!(index = index.label(), chunks = index.len(), "index ready");
            Some(index)
        }
        Err(e) => {
            error!(error = %e, "diet index build failed; domain disabled");
            None
        }
    };

    KnowledgeBase { technical, diet }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk_text;

    fn index_with(label: &str, items: Vec<(&str, Vec<f32>)>) -> SemanticIndex {
        let mut chunks = Vec::new();
        let mut vectors = Vec::new();
        for (i, (text, vec)) in items.into_iter().enumerate() {
            let mut c = chunk_text(label, text, 1000, 200);
            let mut chunk = c.remove(0);
            chunk.chunk_index = i as i64;
            chunks.push(chunk);
            vectors.push(vec);
        }
        SemanticIndex::from_parts(label, chunks, vectors)
    }

    #[test]
    fn top_k_orders_by_similarity() {
        let index = index_with(
            "technical",
            vec![
                ("far", vec![0.0, 1.0]),
                ("near", vec![1.0, 0.0]),
                ("middling", vec![0.7, 0.7]),
            ],
        );
        let hits = index.top_k(&[1.0, 0.0], 2);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].0.text, "near");
        assert_eq!(hits[1].0.text, "middling");
        assert!(hits[0].1 > hits[1].1);
    }

    #[test]
    fn top_k_clamps_to_index_size() {
        let index = index_with("diet", vec![("only", vec![1.0, 0.0])]);
        assert_eq!(index.label(), "diet");
        assert!(!index.is_empty());
        assert_eq!(index.top_k(&[1.0, 0.0], 3).len(), 1);
    }

    #[test]
    fn readiness_reflects_present_indexes() {
        let both = KnowledgeBase {
            technical: Some(index_with("technical", vec![("t", vec![1.0])])),
            diet: Some(index_with("diet", vec![("d", vec![1.0])])),
        };
        assert_eq!(both.readiness(), Readiness::Ready);

        let neither = KnowledgeBase::default();
        assert_eq!(neither.readiness(), Readiness::Uninitialized);

        let only_diet = KnowledgeBase {
            technical: None,
            diet: Some(index_with("diet", vec![("d", vec![1.0])])),
        };
        assert_eq!(
            only_diet.readiness(),
            Readiness::Partial {
                technical: false,
                diet: true
            }
        );
    }
}
