//! Retriever - 질문으로 관련 청크 검색

use std::sync::Arc;

use crate::error::Result;

use super::index::VectorIndex;

/// 검색된 청크 (프롬프트 조립에 필요한 필드만)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetrievedChunk {
    pub chunk_id: String,
    pub source: String,
    pub text: String,
}

/// 검색기
pub struct Retriever {
    index: Arc<dyn VectorIndex>,
    min_score: Option<f32>,
}

impl Retriever {
    pub fn new(index: Arc<dyn VectorIndex>) -> Self {
        Self {
            index,
            min_score: None,
        }
    }

    /// 최소 유사도 지정 (미만은 버림)
    pub fn with_min_score(mut self, min_score: Option<f32>) -> Self {
        self.min_score = min_score;
        self
    }

    /// 상위 `k`개 청크 검색 (인덱스가 돌려준 순서 유지)
    pub async fn retrieve(&self, question: &str, k: usize) -> Result<Vec<RetrievedChunk>> {
        let results = self.index.query(question, k).await?;

        let retrieved: Vec<RetrievedChunk> = results
            .into_iter()
            .filter(|r| self.min_score.map_or(true, |min| r.score >= min))
            .map(|r| RetrievedChunk {
                chunk_id: r.chunk.chunk_id,
                source: r.chunk.metadata.source,
                text: r.chunk.text,
            })
            .collect();

        tracing::debug!("Retrieved {} chunks for: {}", retrieved.len(), question);
        Ok(retrieved)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use crate::embedding::HashEmbedding;
    use crate::error::ChatError;
    use crate::knowledge::{MemoryVectorStore, SemanticIndex};
    use crate::models::Chunk;

    async fn retriever() -> Retriever {
        let index = SemanticIndex::new(
            Arc::new(HashEmbedding::new(256)),
            Arc::new(MemoryVectorStore::new()),
        );
        let chunks: Vec<Chunk> = [
            ("forwards.txt", "A forward contract fixes a price for later delivery."),
            ("options.txt", "Option pricing depends on volatility."),
        ]
        .iter()
        .map(|(doc, text)| Chunk {
            id: Chunk::make_id(doc, 0),
            document_id: doc.to_string(),
            source: doc.to_string(),
            text: text.to_string(),
            order_index: 0,
            start_offset: 0,
        })
        .collect();
        index.add(&chunks).await.unwrap();
        Retriever::new(Arc::new(index))
    }

    #[tokio::test]
    async fn test_retrieve_keeps_order_and_source() {
        let retriever = retriever().await;
        let results = retriever.retrieve("forward contract price", 2).await.unwrap();

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].source, "forwards.txt");
        assert_eq!(results[0].chunk_id, "forwards.txt#0");
    }

    #[tokio::test]
    async fn test_min_score_filters() {
        let retriever = retriever().await.with_min_score(Some(0.99));
        let results = retriever.retrieve("unrelated question", 2).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn test_empty_index_surfaces_error() {
        let index = SemanticIndex::new(
            Arc::new(HashEmbedding::new(16)),
            Arc::new(MemoryVectorStore::new()),
        );
        let retriever = Retriever::new(Arc::new(index));
        assert!(matches!(
            retriever.retrieve("q", 1).await,
            Err(ChatError::IndexEmpty)
        ));
    }
}
