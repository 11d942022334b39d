//! 언어 모델 클라이언트
//!
//! Gemini `generateContent` REST API로 프롬프트를 완성합니다.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::config::GenerationConfig;
use crate::embedding::{gemini_api_error, get_api_key};

/// Gemini 모델 API 베이스 URL
const GEMINI_MODELS_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";

// ============================================================================
// LanguageModel Trait
// ============================================================================

/// 언어 모델 트레이트
#[async_trait]
pub trait LanguageModel: Send + Sync {
    /// 프롬프트 완성 (재시도 없음)
    async fn complete(&self, prompt: &str, config: &GenerationConfig) -> Result<String>;

    /// 모델 이름
    fn name(&self) -> &str;
}

// ============================================================================
// Gemini
// ============================================================================

/// Gemini 채팅 모델
#[derive(Debug)]
pub struct GeminiChat {
    api_key: String,
    client: reqwest::Client,
}

impl GeminiChat {
    pub fn new(api_key: String) -> Result<Self> {
        // 전체 요청 시간은 호출 측 타임아웃이 제한함
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self { api_key, client })
    }

    /// 환경변수에서 API 키를 읽어 생성
    pub fn from_env() -> Result<Self> {
        Self::new(get_api_key()?)
    }

    fn endpoint(model: &str) -> String {
        format!("{}/{}:generateContent", GEMINI_MODELS_URL, model)
    }
}

#[async_trait]
impl LanguageModel for GeminiChat {
    async fn complete(&self, prompt: &str, config: &GenerationConfig) -> Result<String> {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: prompt.to_string(),
                }],
            }],
            generation_config: RequestConfig {
                temperature: config.temperature,
                max_output_tokens: config.max_tokens,
            },
        };

        tracing::debug!("generateContent: model={}, prompt={} chars", config.model, prompt.len());

        let response = self
            .client
            .post(Self::endpoint(&config.model))
            .header("x-goog-api-key", &self.api_key)
            .json(&request)
            .send()
            .await
            .context("Failed to send generateContent request")?;

        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read response body")?;

        if !status.is_success() {
            return Err(gemini_api_error(status, &body));
        }

        let parsed: GenerateResponse =
            serde_json::from_str(&body).context("Failed to parse generateContent response")?;

        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("Model returned no candidates"))?;

        if let Some(reason) = candidate.finish_reason.as_deref() {
            if reason != "STOP" && reason != "MAX_TOKENS" {
                tracing::warn!("Generation finished with reason: {}", reason);
            }
        }

        let text: String = candidate
            .content
            .map(|c| c.parts.into_iter().map(|p| p.text).collect())
            .unwrap_or_default();

        Ok(text)
    }

    fn name(&self) -> &str {
        "gemini"
    }
}

// ============================================================================
// API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct GenerateRequest {
    contents: Vec<Content>,
    #[serde(rename = "generationConfig")]
    generation_config: RequestConfig,
}

#[derive(Debug, Serialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Debug, Serialize)]
struct Part {
    text: String,
}

#[derive(Debug, Serialize)]
struct RequestConfig {
    temperature: f32,
    #[serde(rename = "maxOutputTokens")]
    max_output_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
    #[serde(rename = "finishReason")]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<TextPart>,
}

#[derive(Debug, Deserialize)]
struct TextPart {
    #[serde(default)]
    text: String,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint() {
        assert_eq!(
            GeminiChat::endpoint("gemini-2.0-flash"),
            "https://generativelanguage.googleapis.com/v1beta/models/gemini-2.0-flash:generateContent"
        );
    }

    #[test]
    fn test_request_serialization() {
        let request = GenerateRequest {
            contents: vec![Content {
                role: "user".to_string(),
                parts: vec![Part {
                    text: "hi".to_string(),
                }],
            }],
            generation_config: RequestConfig {
                temperature: 0.0,
                max_output_tokens: 256,
            },
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["contents"][0]["parts"][0]["text"], "hi");
        assert_eq!(json["generationConfig"]["maxOutputTokens"], 256);
    }

    #[test]
    fn test_response_parsing_joins_parts() {
        let body = r#"{"candidates": [{"content": {"parts": [{"text": "A forward "}, {"text": "is OTC [1]."}], "role": "model"}, "finishReason": "STOP"}]}"#;
        let parsed: GenerateResponse = serde_json::from_str(body).unwrap();
        let text: String = parsed.candidates[0]
            .content
            .as_ref()
            .map(|c| c.parts.iter().map(|p| p.text.as_str()).collect())
            .unwrap_or_default();
        assert_eq!(text, "A forward is OTC [1].");
    }

    #[test]
    fn test_response_without_candidates() {
        let parsed: GenerateResponse = serde_json::from_str("{}").unwrap();
        assert!(parsed.candidates.is_empty());
    }
}
