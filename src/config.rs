//! 설정 모듈
//!
//! 기본값 → 환경변수 → CLI 플래그 순으로 덮어씁니다.
//! API 키는 `embedding::get_api_key`에서 따로 읽습니다.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};
use crate::knowledge::ChunkConfig;

// ============================================================================
// Data Directory
// ============================================================================

/// 데이터 디렉토리 경로 (~/.derivatives-chatbot/)
///
/// `CHATBOT_DATA_DIR` 환경변수가 있으면 우선합니다.
pub fn get_data_dir() -> PathBuf {
    if let Some(dir) = env_value("CHATBOT_DATA_DIR") {
        return PathBuf::from(dir);
    }

    dirs::data_local_dir()
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".derivatives-chatbot")
}

// ============================================================================
// Generation Config
// ============================================================================

/// LLM 디코딩 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationConfig {
    /// 호출할 호스팅 모델
    pub model: String,
    /// 출력 무작위성
    pub temperature: f32,
    /// 응답 길이 상한 (토큰)
    pub max_tokens: u32,
    /// 호출 제한 시간
    #[serde(with = "duration_secs")]
    pub timeout: Duration,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            model: "gemini-2.0-flash".to_string(),
            temperature: 0.0,
            max_tokens: 1024,
            timeout: Duration::from_secs(60),
        }
    }
}

// ============================================================================
// Retrieval Config
// ============================================================================

/// 검색 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalConfig {
    /// 검색할 청크 수
    pub top_k: usize,
    /// 최소 유사도 (이보다 낮은 결과는 버림)
    pub min_score: Option<f32>,
    /// 검색 결과가 없을 때 질문을 여러 관점으로 재작성하여 다시 검색
    pub multi_query: bool,
    /// 임베딩 호출 제한 시간
    #[serde(with = "duration_secs")]
    pub embed_timeout: Duration,
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            top_k: 4,
            min_score: None,
            multi_query: true,
            embed_timeout: Duration::from_secs(30),
        }
    }
}

// ============================================================================
// ChatbotConfig
// ============================================================================

/// 챗봇 전체 설정
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatbotConfig {
    /// 인덱스 저장 디렉토리
    pub data_dir: PathBuf,
    /// 피드백/대화 로그 디렉토리
    pub feedback_dir: PathBuf,
    /// 청킹 설정
    pub chunking: ChunkConfig,
    /// 검색 설정
    pub retrieval: RetrievalConfig,
    /// 프롬프트에 포함할 최근 대화 턴 수
    pub history_turns: usize,
    /// LLM 설정
    pub generation: GenerationConfig,
}

impl Default for ChatbotConfig {
    fn default() -> Self {
        let data_dir = get_data_dir();
        Self {
            feedback_dir: data_dir.join("logs"),
            data_dir,
            chunking: ChunkConfig::default(),
            retrieval: RetrievalConfig::default(),
            // 최근 5회 문답 (사용자 + 어시스턴트)
            history_turns: 10,
            generation: GenerationConfig::default(),
        }
    }
}

impl ChatbotConfig {
    /// 기본값에 환경변수를 적용하여 생성
    pub fn from_env() -> Result<Self> {
        let mut config = Self::default();
        config.apply_env()?;
        Ok(config)
    }

    /// 환경변수 덮어쓰기
    pub fn apply_env(&mut self) -> Result<()> {
        self.apply_vars(|key| std::env::var(key).ok())
    }

    /// `lookup`으로 읽은 변수 덮어쓰기
    fn apply_vars(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let value = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        if let Some(model) = value("CHATBOT_MODEL") {
            self.generation.model = model;
        }
        if let Some(v) = parse_value::<f32>("CHATBOT_TEMPERATURE", value("CHATBOT_TEMPERATURE"))? {
            self.generation.temperature = v;
        }
        if let Some(v) = parse_value::<u32>("CHATBOT_MAX_TOKENS", value("CHATBOT_MAX_TOKENS"))? {
            self.generation.max_tokens = v;
        }
        if let Some(v) = parse_value::<u64>("CHATBOT_TIMEOUT_SECS", value("CHATBOT_TIMEOUT_SECS"))? {
            self.generation.timeout = Duration::from_secs(v);
        }
        if let Some(v) = parse_value::<usize>("CHATBOT_TOP_K", value("CHATBOT_TOP_K"))? {
            self.retrieval.top_k = v;
        }
        if let Some(v) = parse_value::<f32>("CHATBOT_MIN_SCORE", value("CHATBOT_MIN_SCORE"))? {
            self.retrieval.min_score = Some(v);
        }
        if let Some(v) = parse_value::<usize>("CHATBOT_HISTORY_TURNS", value("CHATBOT_HISTORY_TURNS"))? {
            self.history_turns = v;
        }
        if let Some(dir) = value("CHATBOT_FEEDBACK_DIR") {
            self.feedback_dir = PathBuf::from(dir);
        }
        Ok(())
    }

    /// 설정 검증
    pub fn validate(&self) -> Result<()> {
        self.chunking.validate()?;

        if self.retrieval.top_k == 0 {
            return Err(ChatError::config("top_k must be >= 1"));
        }
        if let Some(min) = self.retrieval.min_score {
            if !(-1.0..=1.0).contains(&min) {
                return Err(ChatError::config(format!(
                    "min_score must be within -1.0..=1.0, got {}",
                    min
                )));
            }
        }
        if !(0.0..=2.0).contains(&self.generation.temperature) {
            return Err(ChatError::config(format!(
                "temperature must be within 0.0..=2.0, got {}",
                self.generation.temperature
            )));
        }
        if self.generation.max_tokens == 0 {
            return Err(ChatError::config("max_tokens must be >= 1"));
        }
        if self.generation.model.trim().is_empty() {
            return Err(ChatError::config("model must not be empty"));
        }
        Ok(())
    }

    /// 인덱스 스냅샷 경로
    pub fn index_path(&self) -> PathBuf {
        self.data_dir.join("index.json")
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn parse_value<T: FromStr>(key: &str, raw: Option<String>) -> Result<Option<T>> {
    match raw {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map(Some)
            .map_err(|_| ChatError::config(format!("{key}: invalid value '{raw}'"))),
        None => Ok(None),
    }
}

mod duration_secs {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

// ============================================================================
// Tests
// ============================================================================
