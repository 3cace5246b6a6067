//! Retrieval engine: nearest-chunk search plus answer synthesis.
//!
//! Embeds the query, pulls the `top_k` nearest chunks from one domain index,
//! stuffs them into a context block, and asks the generator to answer from
//! that block alone.

use anyhow::{Context, Result};
use std::sync::Arc;

use crate::embedding::Embedder;
use crate::generate::Generator;
use crate::index::SemanticIndex;

const SYNTHESIS_SYSTEM_PROMPT: &str = "You are a careful assistant answering questions for \
clinicians and patients. Answer using ONLY the provided context. If the context does not \
contain the answer, say that you do not know. Keep the answer concise.";

#[derive(Clone)]
pub struct RetrievalEngine {
    embedder: Arc<dyn Embedder>,
    generator: Arc<dyn Generator>,
    top_k: usize,
}

impl RetrievalEngine {
    pub fn new(embedder: Arc<dyn Embedder>, generator: Arc<dyn Generator>, top_k: usize) -> Self {
        Self {
            embedder,
            generator,
            top_k,
        }
    }

    /// Answer `query` from a single domain index.
    pub async fn answer(&self, query: &str, index: &SemanticIndex) -> Result<String> {
        let query_vec = self
            .embedder
            .embed_one(query)
            .await
            .context("query embedding failed")?;

        let hits = index.top_k(&query_vec, self.top_k);
        let context_block = hits
            .iter()
            .map(|(chunk, _)| chunk.text.as_str())
            .collect::<Vec<_>>()
            .join("\n\n---\n\n");

        let user_prompt = format!("Context:\n{}\n\nQuestion: {}", context_block, query);
        self.generator
            .complete(SYNTHESIS_SYSTEM_PROMPT, &user_prompt)
            .await
            .context("answer synthesis failed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chunk::chunk_text;
    use crate::index::SemanticIndex;
    use async_trait::async_trait;
    use std::sync::Mutex;

    struct AxisEmbedder;

    #[async_trait]
    impl Embedder for AxisEmbedder {
        fn model_name(&self) -> &str {
            "axis"
        }

        // "diet" queries map to the y axis, everything else to x.
        async fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
            Ok(texts
                .iter()
                .map(|t| {
                    if t.contains("diet") {
                        vec![0.0, 1.0]
                    } else {
                        vec![1.0, 0.0]
                    }
                })
                .collect())
        }
    }

    struct EchoGenerator {
        prompts: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl Generator for EchoGenerator {
        async fn complete(&self, _system: &str, user: &str) -> Result<String> {
            self.prompts.lock().unwrap().push(user.to_string());
            Ok("synthesized".to_string())
        }
    }

    fn fixture_index() -> SemanticIndex {
        let chunks = vec![
            chunk_text("technical", "dosage guidance", 1000, 200).remove(0),
            chunk_text("technical", "diet and meals", 1000, 200).remove(0),
        ];
        SemanticIndex::from_parts("technical", chunks, vec![vec![1.0, 0.0], vec![0.0, 1.0]])
    }

    #[tokio::test]
    async fn nearest_chunks_reach_the_generator() {
        let generator = Arc::new(EchoGenerator {
            prompts: Mutex::new(Vec::new()),
        });
        let engine = RetrievalEngine::new(Arc::new(AxisEmbedder), generator.clone(), 1);

        let answer = engine
            .answer("what diet should I follow", &fixture_index())
            .await
            .unwrap();
        assert_eq!(answer, "synthesized");

        let prompts = generator.prompts.lock().unwrap();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("diet and meals"));
        assert!(!prompts[0].contains("dosage guidance"));
    }

    #[tokio::test]
    async fn top_k_limits_context_size() {
        let generator = Arc::new(EchoGenerator {
            prompts: Mutex::new(Vec::new()),
        });
        let engine = RetrievalEngine::new(Arc::new(AxisEmbedder), generator.clone(), 2);

        engine.answer("dosage", &fixture_index()).await.unwrap();
        let prompts = generator.prompts.lock().unwrap();
        assert!(prompts[0].contains("dosage guidance"));
        assert!(prompts[0].contains("diet and meals"));
    }
}
