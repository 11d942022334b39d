//! 답변 생성
//!
//! 언어 모델 호출을 제한 시간 안에서 실행하고,
//! 답변의 인용 표시 `[n]`을 n번째 컨텍스트 청크 ID로 변환합니다.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::config::GenerationConfig;
use crate::error::{ChatError, Result};
use crate::knowledge::RetrievedChunk;
use crate::timeout::bounded;

use super::model::LanguageModel;
use super::prompt::multi_query_prompt;

/// 대체 질문 최대 개수
const MAX_ALTERNATIVE_QUERIES: usize = 5;

/// 인용 표시 `[1]`, `[1, 3]`
static CITATION_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[(\d+(?:\s*,\s*\d+)*)\]").expect("Invalid regex"));

/// 목록 머리 `1.`, `2)`, `-`, `*`, `•`
static LIST_PREFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*(?:\d+[.)]|[-*•])\s*").expect("Invalid regex"));

/// 생성된 답변
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GeneratedAnswer {
    pub text: String,
    /// 인용된 청크 ID (처음 등장한 순서, 중복 없음)
    pub cited_chunk_ids: Vec<String>,
}

/// 답변 생성기
pub struct AnswerGenerator {
    model: Arc<dyn LanguageModel>,
    config: GenerationConfig,
}

impl AnswerGenerator {
    pub fn new(model: Arc<dyn LanguageModel>, config: GenerationConfig) -> Self {
        Self { model, config }
    }

    /// 프롬프트로 답변 생성
    ///
    /// 실패, 타임아웃, 빈 응답은 모두 `ChatError::Generation`입니다. 재시도하지 않습니다.
    pub async fn generate(&self, prompt: &str, chunks: &[RetrievedChunk]) -> Result<GeneratedAnswer> {
        let text = self.complete("generate", prompt).await?;

        let text = text.trim().to_string();
        if text.is_empty() {
            return Err(ChatError::generation("model returned an empty answer"));
        }

        let cited_chunk_ids = extract_citations(&text, chunks);
        tracing::debug!(
            "Generated answer ({} chars, {} citations)",
            text.len(),
            cited_chunk_ids.len()
        );

        Ok(GeneratedAnswer {
            text,
            cited_chunk_ids,
        })
    }

    /// 질문을 다른 표현 최대 5개로 재작성
    pub async fn expand_queries(&self, question: &str) -> Result<Vec<String>> {
        let output = self
            .complete("expand_queries", &multi_query_prompt(question))
            .await?;

        let queries = parse_query_lines(&output);
        tracing::debug!("Expanded into {} alternative queries", queries.len());
        Ok(queries)
    }

    async fn complete(&self, operation: &str, prompt: &str) -> Result<String> {
        bounded(
            operation,
            self.config.timeout,
            self.model.complete(prompt, &self.config),
        )
        .await
        .map_err(|e| ChatError::generation(e.to_string()))?
        .map_err(|e| ChatError::generation(format!("{}: {:#}", self.model.name(), e)))
    }
}

/// 답변의 `[n]`, `[n, m]` 표시를 청크 ID로 변환
///
/// 범위를 벗어난 번호는 무시합니다. 유효한 표시가 없으면 빈 목록입니다.
pub fn extract_citations(text: &str, chunks: &[RetrievedChunk]) -> Vec<String> {
    let mut cited: Vec<String> = Vec::new();

    for cap in CITATION_MARKER.captures_iter(text) {
        let numbers = cap.get(1).map(|m| m.as_str()).unwrap_or("");
        for n in numbers.split(',').filter_map(|n| n.trim().parse::<usize>().ok()) {
            let Some(chunk) = n.checked_sub(1).and_then(|i| chunks.get(i)) else {
                continue;
            };
            if !cited.contains(&chunk.chunk_id) {
                cited.push(chunk.chunk_id.clone());
            }
        }
    }

    cited
}

/// 모델 출력 → 질문 목록 (번호/글머리 제거, 중복 제거)
fn parse_query_lines(output: &str) -> Vec<String> {
    let mut queries: Vec<String> = Vec::new();
    for line in output.lines() {
        let query = LIST_PREFIX.replace(line, "").trim().to_string();
        if !query.is_empty() && !queries.contains(&query) {
            queries.push(query);
        }
        if queries.len() == MAX_ALTERNATIVE_QUERIES {
            break;
        }
    }
    queries
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::time::Duration;

    use async_trait::async_trait;

    struct FixedModel(&'static str);

    #[async_trait]
    impl LanguageModel for FixedModel {
        async fn complete(&self, _prompt: &str, _config: &GenerationConfig) -> anyhow::Result<String> {
            Ok(self.0.to_string())
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    struct FailingModel;

    #[async_trait]
    impl LanguageModel for FailingModel {
        async fn complete(&self, _prompt: &str, _config: &GenerationConfig) -> anyhow::Result<String> {
            anyhow::bail!("503 Service Unavailable")
        }

        fn name(&self) -> &str {
            "failing"
        }
    }

    struct SlowModel;

    #[async_trait]
    impl LanguageModel for SlowModel {
        async fn complete(&self, _prompt: &str, _config: &GenerationConfig) -> anyhow::Result<String> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok("too late".to_string())
        }

        fn name(&self) -> &str {
            "slow"
        }
    }

    fn chunks() -> Vec<RetrievedChunk> {
        ["a#0", "b#0", "c#2"]
            .iter()
            .map(|id| RetrievedChunk {
                chunk_id: id.to_string(),
                source: "doc".to_string(),
                text: "text".to_string(),
            })
            .collect()
    }

    fn generator(model: impl LanguageModel + 'static) -> AnswerGenerator {
        AnswerGenerator::new(Arc::new(model), GenerationConfig::default())
    }

    #[test]
    fn test_extract_citations_maps_markers() {
        let ids = extract_citations("Forwards are OTC [2]. Futures trade on exchanges [1, 2].", &chunks());
        assert_eq!(ids, vec!["b#0", "a#0"]);
    }

    #[test]
    fn test_extract_citations_ignores_out_of_range() {
        assert!(extract_citations("See [0] and [7].", &chunks()).is_empty());
        assert!(extract_citations("No markers at all.", &chunks()).is_empty());
        assert!(extract_citations("[1]", &[]).is_empty());
    }

    #[test]
    fn test_parse_query_lines() {
        let output = "1. What is a forward?\n\n2) Define forward contract\n- What is a forward?\n* forward vs future\nA\nB\nC";
        let queries = parse_query_lines(output);
        assert_eq!(
            queries,
            vec!["What is a forward?", "Define forward contract", "forward vs future", "A", "B"]
        );
    }

    #[tokio::test]
    async fn test_generate_with_citation() {
        let answer = generator(FixedModel("  A forward is a private agreement [3].  "))
            .generate("prompt", &chunks())
            .await
            .unwrap();
        assert_eq!(answer.text, "A forward is a private agreement [3].");
        assert_eq!(answer.cited_chunk_ids, vec!["c#2"]);
    }

    #[tokio::test]
    async fn test_empty_output_is_generation_error() {
        let result = generator(FixedModel("   \n")).generate("prompt", &chunks()).await;
        assert!(matches!(result, Err(ChatError::Generation(_))));
    }

    #[tokio::test]
    async fn test_model_failure_is_generation_error() {
        let result = generator(FailingModel).generate("prompt", &chunks()).await;
        match result {
            Err(ChatError::Generation(msg)) => assert!(msg.contains("503")),
            other => panic!("unexpected: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_is_generation_error() {
        let config = GenerationConfig {
            timeout: Duration::from_millis(100),
            ..Default::default()
        };
        let generator = AnswerGenerator::new(Arc::new(SlowModel), config);

        let result = generator.generate("prompt", &chunks()).await;
        assert!(matches!(result, Err(ChatError::Generation(_))));
    }
}
