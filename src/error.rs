//! 에러 타입
//!
//! 파이프라인 경계에서 사용하는 에러 분류입니다.
//! - `Load`: 읽을 수 없거나 잘못된 형식의 원본 파일 (파일 단위로 건너뜀)
//! - `Config`: 잘못된 설정 (호출자가 수정해야 함)
//! - `IndexEmpty`: 인덱싱 전에 검색
//! - `Generation`: LLM 호출 실패/타임아웃 (같은 질문으로 재시도 가능)

use std::path::PathBuf;

use thiserror::Error;

/// 파이프라인 Result 별칭
pub type Result<T> = std::result::Result<T, ChatError>;

// ============================================================================
// LoadError
// ============================================================================

/// 문서 로드 실패 (파일 단위)
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("문서 로드 실패 '{}': {reason}", path.display())]
pub struct LoadError {
    /// 실패한 파일 경로
    pub path: PathBuf,
    /// 실패 사유
    pub reason: String,
}

impl LoadError {
    pub fn new(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            reason: reason.into(),
        }
    }
}

// ============================================================================
// ChatError
// ============================================================================

/// 챗봇 파이프라인 에러
#[derive(Debug, Error)]
pub enum ChatError {
    /// 원본 문서 로드 실패
    #[error(transparent)]
    Load(#[from] LoadError),

    /// 설정 오류
    #[error("설정 오류: {0}")]
    Config(String),

    /// 빈 인덱스 검색
    #[error("인덱스가 비어 있습니다. 먼저 문서를 수집(ingest)하세요")]
    IndexEmpty,

    /// 답변 생성 실패 (LLM 에러 또는 타임아웃)
    #[error("답변 생성 실패: {0}")]
    Generation(String),

    /// 임베딩 실패
    #[error("임베딩 실패: {0}")]
    Embedding(String),

    /// 벡터 저장소 에러
    #[error("벡터 저장소 에러: {0}")]
    Store(String),

    /// IO 에러
    #[error("IO 에러: {0}")]
    Io(#[from] std::io::Error),
}

impl ChatError {
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config(message.into())
    }

    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation(message.into())
    }

    pub fn embedding(message: impl Into<String>) -> Self {
        Self::Embedding(message.into())
    }

    pub fn store(message: impl Into<String>) -> Self {
        Self::Store(message.into())
    }

    /// 같은 요청을 다시 시도할 수 있는 에러인지
    pub fn is_retryable(&self) -> bool {
        matches!(self, ChatError::Generation(_) | ChatError::Embedding(_))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_error_message() {
        let err = LoadError::new("data/broken.docx", "invalid zip archive");
        let msg = err.to_string();
        assert!(msg.contains("broken.docx"));
        assert!(msg.contains("invalid zip archive"));
    }

    #[test]
    fn test_retryable() {
        assert!(ChatError::generation("timeout").is_retryable());
        assert!(!ChatError::IndexEmpty.is_retryable());
        assert!(!ChatError::config("overlap").is_retryable());
    }
}
