//! Vector Store - 벡터 저장소 트레이트 및 유틸리티
//!
//! 임베딩이 끝난 청크를 저장하고 유사도로 찾는 백엔드 인터페이스입니다.
//! 임베딩 계산은 `SemanticIndex`가 담당합니다.

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{IndexedChunk, ScoredChunk};

/// 벡터 임베딩 차원 (Gemini gemini-embedding-001 기본값)
/// source: https://ai.google.dev/gemini-api/docs/embeddings
pub const EMBEDDING_DIMENSION: i32 = 768;

// ============================================================================
// VectorStore Trait
// ============================================================================

/// VectorStore 트레이트 (async)
///
/// 벡터 저장소의 공통 인터페이스입니다.
/// 결과는 유사도 내림차순, 동점이면 먼저 삽입된 순서입니다.
#[async_trait]
pub trait VectorStore: Send + Sync {
    /// 청크 배치 삽입 (같은 chunk_id는 덮어쓰고 삽입 순서는 유지)
    async fn upsert(&self, chunks: Vec<IndexedChunk>) -> Result<usize>;

    /// 벡터 검색
    async fn search(&self, query_embedding: &[f32], limit: usize) -> Result<Vec<ScoredChunk>>;

    /// 저장된 청크 수
    async fn count(&self) -> Result<usize>;

    /// 문서에 속한 청크 전부 삭제, 삭제된 청크 수 반환
    async fn delete_by_document(&self, document_ids: &[String]) -> Result<usize>;

    /// 문서들의 기존 청크를 새 청크로 교체
    ///
    /// 기본 구현은 삭제 후 삽입이므로 그 사이의 검색은 해당 문서를 보지 못할 수 있습니다.
    async fn replace_documents(
        &self,
        document_ids: &[String],
        chunks: Vec<IndexedChunk>,
    ) -> Result<usize> {
        self.delete_by_document(document_ids).await?;
        self.upsert(chunks).await
    }

    /// 전체 삭제 (재인덱싱용)
    async fn clear(&self) -> Result<()>;

    /// 백엔드 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Utility Functions
// ============================================================================

/// 코사인 유사도 계산
///
/// 두 벡터 간의 코사인 유사도를 계산합니다.
/// 결과는 -1.0 ~ 1.0 범위입니다.
///
/// # Arguments
/// * `a` - 첫 번째 벡터
/// * `b` - 두 번째 벡터
///
/// # Returns
/// 코사인 유사도 (-1.0 ~ 1.0)
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }

    let dot_product: f32 = a.iter().zip(b.iter()).map(|(x, y)| x * y).sum();
    let norm_a: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let norm_b: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    dot_product / (norm_a * norm_b)
}

/// (삽입 순번, 청크, 점수) 목록을 정렬하여 상위 `limit`개 반환
///
/// 점수 내림차순, 동점이면 순번 오름차순입니다. NaN 점수는 가장 낮게 취급합니다.
pub fn rank_by_score(mut scored: Vec<(u64, IndexedChunk, f32)>, limit: usize) -> Vec<ScoredChunk> {
    let key = |score: f32| if score.is_nan() { f32::NEG_INFINITY } else { score };
    scored.sort_by(|a, b| key(b.2).total_cmp(&key(a.2)).then_with(|| a.0.cmp(&b.0)));
    scored.truncate(limit);

    scored
        .into_iter()
        .map(|(_, chunk, score)| ScoredChunk { chunk, score })
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
