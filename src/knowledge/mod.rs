//! Knowledge 모듈 - 청크 분할 + 벡터 인덱스 + 검색
//!
//! - Chunker: 겹침(overlap)을 둔 재귀 텍스트 분할
//! - VectorStore: 임베딩 저장 백엔드 (메모리 스냅샷 / LanceDB)
//! - SemanticIndex: 임베딩 계산과 저장소를 묶은 인덱스
//! - Retriever: 질문 → 관련 청크

mod chunker;
mod vector;
mod memory;
#[cfg(feature = "lance")]
mod lance;
mod index;
mod retriever;

// Re-exports
pub use chunker::{Chunker, RecursiveChunker, ChunkConfig, reassemble};
pub use vector::{
    VectorStore,
    cosine_similarity, rank_by_score,
    EMBEDDING_DIMENSION,
};
pub use memory::MemoryVectorStore;
#[cfg(feature = "lance")]
pub use lance::LanceVectorStore;
pub use index::{VectorIndex, SemanticIndex};
pub use retriever::{Retriever, RetrievedChunk};
