//! 임베딩 모듈 - 텍스트 벡터화
//!
//! - `GeminiEmbedding`: Gemini REST API (문서/질문 태스크 타입 구분)
//! - `HashEmbedding`: 네트워크 없이 동작하는 결정적 단어 해시 임베딩
//!
//! ## 사용법
//! ```rust,ignore
//! let embedder = GeminiEmbedding::from_env()?;
//! let doc_vec = embedder.embed("A forward contract is ...").await?;
//! let query_vec = embedder.embed_query("what is a forward contract?").await?;
//! ```

mod hash;

pub use hash::HashEmbedding;

use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;

// ============================================================================
// EmbeddingProvider Trait
// ============================================================================

/// 임베딩 프로바이더 트레이트
///
/// 텍스트를 벡터로 변환하는 인터페이스입니다.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// 문서(청크) 임베딩
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// 질문 임베딩 (기본 구현: 문서 임베딩과 동일)
    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed(text).await
    }

    /// 임베딩 차원 수
    fn dimension(&self) -> usize;

    /// 프로바이더 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Google Gemini Embedding
// ============================================================================

/// Gemini 임베딩 API 엔드포인트 (gemini-embedding-001 - MRL 지원)
/// source: https://ai.google.dev/gemini-api/docs/embeddings
const GEMINI_EMBED_URL: &str =
    "https://generativelanguage.googleapis.com/v1beta/models/gemini-embedding-001:embedContent";

/// 기본 임베딩 차원
pub const DEFAULT_DIMENSION: usize = 768;

/// Rate Limiter 설정 (Gemini 무료 티어: 60 RPM)
const RATE_LIMIT_RPM: u32 = 60;
const RATE_LIMIT_WINDOW: Duration = Duration::from_secs(60);
/// 호출 간 최소 딜레이 (1000ms = 60 RPM 준수)
const MIN_DELAY_MS: u64 = 1000;
/// 429 에러 시 최대 재시도 횟수
const MAX_RETRIES: u32 = 3;
/// 재시도 시 초기 백오프 (ms)
const INITIAL_BACKOFF_MS: u64 = 2000;

/// 임베딩 태스크 타입
/// source: https://ai.google.dev/api/embeddings#tasktype
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskType {
    /// 검색 대상 문서
    RetrievalDocument,
    /// 검색 질문
    RetrievalQuery,
}

impl TaskType {
    fn as_str(&self) -> &'static str {
        match self {
            TaskType::RetrievalDocument => "RETRIEVAL_DOCUMENT",
            TaskType::RetrievalQuery => "RETRIEVAL_QUERY",
        }
    }
}

/// Google Gemini 임베딩 구현체
#[derive(Debug)]
pub struct GeminiEmbedding {
    api_key: String,
    client: reqwest::Client,
    dimension: usize,
    rate_limiter: Arc<Mutex<RateLimiter>>,
}

/// Rate Limiter with minimum delay between requests
#[derive(Debug)]
struct RateLimiter {
    requests: Vec<Instant>,
    max_requests: u32,
    window: Duration,
    min_delay: Duration,
    last_request: Option<Instant>,
}

impl RateLimiter {
    fn new(max_requests: u32, window: Duration) -> Self {
        Self {
            requests: Vec::new(),
            max_requests,
            window,
            min_delay: Duration::from_millis(MIN_DELAY_MS),
            last_request: None,
        }
    }

    /// 요청 가능할 때까지 대기
    async fn acquire(&mut self) {
        // 버스트 방지
        if let Some(last) = self.last_request {
            let elapsed = last.elapsed();
            if elapsed < self.min_delay {
                tokio::time::sleep(self.min_delay - elapsed).await;
            }
        }

        let now = Instant::now();
        self.requests.retain(|&t| now.duration_since(t) < self.window);

        if self.requests.len() >= self.max_requests as usize {
            if let Some(&oldest) = self.requests.first() {
                let wait_time = self.window.saturating_sub(now.duration_since(oldest));
                if !wait_time.is_zero() {
                    tracing::debug!("Rate limit reached, waiting {:?}", wait_time);
                    tokio::time::sleep(wait_time).await;
                }
                let now = Instant::now();
                self.requests.retain(|&t| now.duration_since(t) < self.window);
            }
        }

        let now = Instant::now();
        self.requests.push(now);
        self.last_request = Some(now);
    }
}

impl GeminiEmbedding {
    /// 새 Gemini 임베딩 인스턴스 생성
    ///
    /// # Arguments
    /// * `api_key` - Google AI API 키
    pub fn new(api_key: String) -> Result<Self> {
        Self::with_dimension(api_key, DEFAULT_DIMENSION)
    }

    /// 차원을 지정하여 생성
    ///
    /// # Arguments
    /// * `api_key` - Google AI API 키
    /// * `dimension` - 임베딩 차원 (768, 1536, 3072 중 선택)
    pub fn with_dimension(api_key: String, dimension: usize) -> Result<Self> {
        if ![768, 1536, 3072].contains(&dimension) {
            anyhow::bail!(
                "Invalid dimension: {}. Must be 768, 1536, or 3072",
                dimension
            );
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_key,
            client,
            dimension,
            rate_limiter: Arc::new(Mutex::new(RateLimiter::new(
                RATE_LIMIT_RPM,
                RATE_LIMIT_WINDOW,
            ))),
        })
    }

    /// 환경변수에서 API 키를 읽어 생성
    pub fn from_env() -> Result<Self> {
        Self::new(get_api_key()?)
    }

    /// 태스크 타입을 지정하여 임베딩
    pub async fn embed_with_task(&self, text: &str, task: TaskType) -> Result<Vec<f32>> {
        if text.trim().is_empty() {
            return Ok(vec![0.0; self.dimension]);
        }

        let request = EmbedRequest {
            model: "models/gemini-embedding-001".to_string(),
            content: EmbedContent {
                parts: vec![EmbedPart {
                    text: text.to_string(),
                }],
            },
            task_type: task.as_str().to_string(),
            output_dimensionality: Some(self.dimension),
        };

        let mut last_error: Option<anyhow::Error> = None;

        // 재시도 루프 (전송 실패/429 에러 시 지수 백오프)
        for attempt in 0..=MAX_RETRIES {
            self.rate_limiter.lock().await.acquire().await;

            let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));

            // API 키는 URL이 아닌 헤더로 전송
            let response = match self
                .client
                .post(GEMINI_EMBED_URL)
                .header("x-goog-api-key", &self.api_key)
                .json(&request)
                .send()
                .await
            {
                Ok(resp) => resp,
                Err(e) => {
                    last_error = Some(anyhow::anyhow!("Failed to send embedding request: {}", e));
                    if attempt < MAX_RETRIES {
                        tracing::warn!(
                            "Embedding request failed, retrying in {:?} (attempt {}/{})",
                            backoff,
                            attempt + 1,
                            MAX_RETRIES
                        );
                        tokio::time::sleep(backoff).await;
                    }
                    continue;
                }
            };

            let status = response.status();
            let body = response
                .text()
                .await
                .context("Failed to read response body")?;

            if status.is_success() {
                let parsed: EmbedResponse =
                    serde_json::from_str(&body).context("Failed to parse embedding response")?;
                return Ok(parsed.embedding.values);
            }

            if status.as_u16() == 429 {
                tracing::warn!(
                    "Rate limit hit (429), backing off {:?} (attempt {}/{})",
                    backoff,
                    attempt + 1,
                    MAX_RETRIES
                );
                last_error = Some(anyhow::anyhow!("Rate limit exceeded (429)"));
                if attempt < MAX_RETRIES {
                    tokio::time::sleep(backoff).await;
                }
                continue;
            }

            // 다른 에러 - 즉시 실패
            return Err(gemini_api_error(status, &body));
        }

        Err(last_error
            .unwrap_or_else(|| anyhow::anyhow!("Embedding failed after {} retries", MAX_RETRIES)))
    }
}

/// Gemini API 요청 본문
#[derive(Debug, Serialize)]
struct EmbedRequest {
    model: String,
    content: EmbedContent,
    #[serde(rename = "taskType")]
    task_type: String,
    #[serde(rename = "outputDimensionality", skip_serializing_if = "Option::is_none")]
    output_dimensionality: Option<usize>,
}

#[derive(Debug, Serialize)]
struct EmbedContent {
    parts: Vec<EmbedPart>,
}

#[derive(Debug, Serialize)]
struct EmbedPart {
    text: String,
}

/// Gemini API 응답
#[derive(Debug, Deserialize)]
struct EmbedResponse {
    embedding: EmbeddingValues,
}

#[derive(Debug, Deserialize)]
struct EmbeddingValues {
    values: Vec<f32>,
}

/// Gemini API 에러 응답
#[derive(Debug, Deserialize)]
struct GeminiError {
    error: GeminiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorDetail {
    message: String,
    #[serde(default)]
    status: String,
}

/// Gemini 에러 본문을 읽을 수 있는 메시지로 변환
pub(crate) fn gemini_api_error(status: reqwest::StatusCode, body: &str) -> anyhow::Error {
    match serde_json::from_str::<GeminiError>(body) {
        Ok(error) => anyhow::anyhow!(
            "Gemini API error ({}): {}",
            error.error.status,
            error.error.message
        ),
        Err(_) => anyhow::anyhow!("Gemini API error ({}): {}", status, body),
    }
}

#[async_trait]
impl EmbeddingProvider for GeminiEmbedding {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_with_task(text, TaskType::RetrievalDocument).await
    }

    async fn embed_query(&self, text: &str) -> Result<Vec<f32>> {
        self.embed_with_task(text, TaskType::RetrievalQuery).await
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn name(&self) -> &str {
        "gemini-embedding-001"
    }
}

// ============================================================================
// API Key Management
// ============================================================================

/// API 키 로드 (환경변수에서)
///
/// 우선순위:
/// 1. `GEMINI_API_KEY` 환경변수
/// 2. `GOOGLE_AI_API_KEY` 환경변수
pub fn get_api_key() -> Result<String> {
    for var in ["GEMINI_API_KEY", "GOOGLE_AI_API_KEY"] {
        if let Ok(key) = std::env::var(var) {
            if !key.is_empty() {
                tracing::debug!("Using API key from {}", var);
                return Ok(key);
            }
        }
    }

    anyhow::bail!(
        "API key not found. Set GEMINI_API_KEY or GOOGLE_AI_API_KEY environment variable.\n\
         Get your API key at: https://aistudio.google.com/app/apikey"
    )
}

/// API 키 존재 여부 확인
pub fn has_api_key() -> bool {
    ["GEMINI_API_KEY", "GOOGLE_AI_API_KEY"]
        .iter()
        .any(|var| std::env::var(var).map(|k| !k.is_empty()).unwrap_or(false))
}

// ============================================================================
// Factory Function
// ============================================================================

/// 임베딩 프로바이더 생성
///
/// API 키가 있으면 Gemini, `offline`이면 HashEmbedding을 사용합니다.
pub fn create_embedder(offline: bool) -> Result<Arc<dyn EmbeddingProvider>> {
    if offline {
        tracing::info!("Using offline hash embedding (dimension: {})", DEFAULT_DIMENSION);
        return Ok(Arc::new(HashEmbedding::new(DEFAULT_DIMENSION)));
    }

    if !has_api_key() {
        anyhow::bail!(
            "GEMINI_API_KEY or GOOGLE_AI_API_KEY not set.\n\
             Set: export GEMINI_API_KEY=your-api-key\n\
             Or run with --offline to use the local hash embedding"
        );
    }

    let embedder = GeminiEmbedding::from_env()?;
    tracing::info!(
        "Using Gemini API embedding (dimension: {})",
        embedder.dimension()
    );
    Ok(Arc::new(embedder))
}

// ============================================================================
// Tests
// ============================================================================
