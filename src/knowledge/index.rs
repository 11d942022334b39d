//! Vector Index - 임베딩 계산 + 벡터 저장소
//!
//! `VectorIndex`는 파이프라인이 보는 인터페이스(add / query)이고,
//! `SemanticIndex`는 임베딩 프로바이더와 교체 가능한 `VectorStore` 백엔드를 묶습니다.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::embedding::EmbeddingProvider;
use crate::error::{ChatError, Result};
use crate::models::{Chunk, IndexedChunk, ScoredChunk};
use crate::timeout::bounded;

use super::vector::VectorStore;

/// 기본 임베딩 호출 제한 시간
const DEFAULT_EMBED_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// VectorIndex Trait
// ============================================================================

/// 벡터 인덱스 트레이트
#[async_trait]
pub trait VectorIndex: Send + Sync {
    /// 청크 임베딩 후 저장 (같은 청크 ID는 덮어씀)
    ///
    /// 하나라도 임베딩에 실패하면 아무것도 저장하지 않습니다.
    async fn add(&self, chunks: &[Chunk]) -> Result<usize>;

    /// 문서 재인덱싱: `document_ids`의 기존 청크를 모두 버리고 `chunks`로 교체
    ///
    /// 임베딩에 실패하면 기존 청크는 그대로 남습니다.
    async fn replace_documents(&self, document_ids: &[String], chunks: &[Chunk]) -> Result<usize>;

    /// 유사도 상위 `k`개 검색 (내림차순, 동점은 삽입 순)
    async fn query(&self, text: &str, k: usize) -> Result<Vec<ScoredChunk>>;

    /// 저장된 청크 수
    async fn len(&self) -> Result<usize>;

    /// 전체 삭제
    async fn clear(&self) -> Result<()>;
}

// ============================================================================
// SemanticIndex
// ============================================================================

/// 임베딩 기반 인덱스
pub struct SemanticIndex {
    embedder: Arc<dyn EmbeddingProvider>,
    store: Arc<dyn VectorStore>,
    embed_timeout: Duration,
}

impl SemanticIndex {
    pub fn new(embedder: Arc<dyn EmbeddingProvider>, store: Arc<dyn VectorStore>) -> Self {
        Self {
            embedder,
            store,
            embed_timeout: DEFAULT_EMBED_TIMEOUT,
        }
    }

    /// 임베딩 호출 제한 시간 지정
    pub fn with_embed_timeout(mut self, timeout: Duration) -> Self {
        self.embed_timeout = timeout;
        self
    }

    /// 모든 청크 임베딩 (하나라도 실패하면 에러)
    async fn embed_chunks(&self, chunks: &[Chunk]) -> Result<Vec<IndexedChunk>> {
        let mut indexed = Vec::with_capacity(chunks.len());

        for (i, chunk) in chunks.iter().enumerate() {
            tracing::debug!("Embedding chunk {}/{}: {}", i + 1, chunks.len(), chunk.id);

            let embedding = bounded("embed", self.embed_timeout, self.embedder.embed(&chunk.text))
                .await
                .map_err(|e| ChatError::embedding(e.to_string()))?
                .map_err(|e| ChatError::embedding(format!("{}: {:#}", chunk.id, e)))?;

            indexed.push(IndexedChunk::from_chunk(chunk, embedding));
        }

        Ok(indexed)
    }
}

#[async_trait]
impl VectorIndex for SemanticIndex {
    async fn add(&self, chunks: &[Chunk]) -> Result<usize> {
        if chunks.is_empty() {
            return Ok(0);
        }

        let indexed = self.embed_chunks(chunks).await?;
        let count = self
            .store
            .upsert(indexed)
            .await
            .map_err(|e| ChatError::store(format!("{:#}", e)))?;

        tracing::info!("Indexed {} chunks into {} store", count, self.store.name());
        Ok(count)
    }

    async fn replace_documents(&self, document_ids: &[String], chunks: &[Chunk]) -> Result<usize> {
        let indexed = self.embed_chunks(chunks).await?;
        let count = self
            .store
            .replace_documents(document_ids, indexed)
            .await
            .map_err(|e| ChatError::store(format!("{:#}", e)))?;

        tracing::info!(
            "Re-indexed {} documents ({} chunks) into {} store",
            document_ids.len(),
            count,
            self.store.name()
        );
        Ok(count)
    }

    async fn query(&self, text: &str, k: usize) -> Result<Vec<ScoredChunk>> {
        if k == 0 {
            return Err(ChatError::config("k must be >= 1"));
        }

        if self.len().await? == 0 {
            return Err(ChatError::IndexEmpty);
        }

        let query_embedding =
            bounded("embed_query", self.embed_timeout, self.embedder.embed_query(text))
                .await
                .map_err(|e| ChatError::embedding(e.to_string()))?
                .map_err(|e| ChatError::embedding(format!("{:#}", e)))?;

        self.store
            .search(&query_embedding, k)
            .await
            .map_err(|e| ChatError::store(format!("{:#}", e)))
    }

    async fn len(&self) -> Result<usize> {
        self.store
            .count()
            .await
            .map_err(|e| ChatError::store(format!("{:#}", e)))
    }

    async fn clear(&self) -> Result<()> {
        self.store
            .clear()
            .await
            .map_err(|e| ChatError::store(format!("{:#}", e)))
    }
}

// ============================================================================
// Tests
// ============================================================================
