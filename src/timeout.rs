//! 외부 호출 타임아웃
//!
//! 임베딩/LLM 호출을 제한 시간 안에서 실행합니다.
//! 시간이 초과되면 대기 중인 future는 drop되어 요청이 취소됩니다.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// 제한 시간 초과
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{operation} 호출이 {limit:?} 안에 끝나지 않았습니다")]
pub struct TimedOut {
    pub operation: String,
    pub limit: Duration,
}

/// 제한 시간 안에서 future 실행
///
/// 초과 시 future를 drop하고 `TimedOut`을 반환합니다.
pub async fn bounded<F, T>(operation: &str, limit: Duration, fut: F) -> Result<T, TimedOut>
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(limit, fut).await {
        Ok(value) => Ok(value),
        Err(_) => {
            tracing::warn!("{} timed out after {:?}", operation, limit);
            Err(TimedOut {
                operation: operation.to_string(),
                limit,
            })
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
