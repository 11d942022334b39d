//! 공용 데이터 모델
//!
//! 문서 → 청크 → 인덱싱된 청크 순으로 파이프라인을 따라 흐르는 타입입니다.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// 로드된 원본 문서 (생성 후 불변)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Document {
    /// 문서 ID (수집 디렉토리 기준 상대 경로)
    pub id: String,
    /// 원본 파일 경로
    pub source_path: PathBuf,
    /// 출처 표시용 파일 이름
    pub source: String,
    /// 추출된 텍스트
    pub raw_text: String,
}

/// 문서의 일부 구간 (검색 단위)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chunk {
    /// `{document_id}#{order_index}`
    pub id: String,
    pub document_id: String,
    pub source: String,
    pub text: String,
    /// 문서 내 순서 (0-based)
    pub order_index: usize,
    /// 문서 내 시작 위치 (문자 단위)
    pub start_offset: usize,
}

impl Chunk {
    /// 청크 ID 생성
    pub fn make_id(document_id: &str, order_index: usize) -> String {
        format!("{}#{}", document_id, order_index)
    }
}

/// 청크 메타데이터 (인덱스에 함께 저장)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkMetadata {
    pub document_id: String,
    pub source: String,
    pub order_index: usize,
}

/// 임베딩과 함께 저장된 청크
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedChunk {
    pub chunk_id: String,
    pub embedding: Vec<f32>,
    pub text: String,
    pub metadata: ChunkMetadata,
}

impl IndexedChunk {
    pub fn from_chunk(chunk: &Chunk, embedding: Vec<f32>) -> Self {
        Self {
            chunk_id: chunk.id.clone(),
            embedding,
            text: chunk.text.clone(),
            metadata: ChunkMetadata {
                document_id: chunk.document_id.clone(),
                source: chunk.source.clone(),
                order_index: chunk.order_index,
            },
        }
    }
}

/// 유사도 점수가 붙은 검색 결과
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredChunk {
    pub chunk: IndexedChunk,
    pub score: f32,
}
