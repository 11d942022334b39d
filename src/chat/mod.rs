//! Chat 모듈 - 질의응답 파이프라인
//!
//! `Chatbot`은 UI가 호출하는 두 진입점을 제공합니다.
//! - `ingest`: 디렉토리 로드 → 청킹 → 인덱싱
//! - `ask`: 검색 → (필요 시 다중 질의) → 프롬프트 조립 → 답변 생성 → 기록 추가

pub mod generator;
pub mod history;
pub mod model;
pub mod prompt;

pub use generator::{extract_citations, AnswerGenerator, GeneratedAnswer};
pub use history::{ChatSession, ConversationTurn, Role};
pub use model::{GeminiChat, LanguageModel};
pub use prompt::{multi_query_prompt, PromptAssembler};

use std::path::Path;
use std::sync::Arc;

use crate::config::{ChatbotConfig, RetrievalConfig};
use crate::error::{ChatError, LoadError, Result};
use crate::knowledge::{ChunkConfig, Chunker, RecursiveChunker, RetrievedChunk, Retriever, VectorIndex};
use crate::loader::{document_id, DocumentLoader};
use crate::models::Chunk;

// ============================================================================
// Results
// ============================================================================

/// 수집 결과 요약
#[derive(Debug, Clone, Default)]
pub struct IngestionSummary {
    pub documents_loaded: usize,
    pub chunks_indexed: usize,
    /// 건너뛴 파일과 사유
    pub skipped: Vec<LoadError>,
}

/// 질문에 대한 답변
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Answer {
    pub answer_text: String,
    /// 답변이 인용한 청크 ID
    pub cited_chunk_ids: Vec<String>,
    /// 검색된 컨텍스트의 출처 파일 (중복 제거, 검색 순)
    pub sources: Vec<String>,
}

// ============================================================================
// Chatbot
// ============================================================================

/// RAG 챗봇
pub struct Chatbot {
    index: Arc<dyn VectorIndex>,
    retriever: Retriever,
    assembler: PromptAssembler,
    generator: AnswerGenerator,
    loader: DocumentLoader,
    retrieval: RetrievalConfig,
}

impl Chatbot {
    pub fn new(
        config: &ChatbotConfig,
        index: Arc<dyn VectorIndex>,
        model: Arc<dyn LanguageModel>,
    ) -> Self {
        Self {
            retriever: Retriever::new(index.clone()).with_min_score(config.retrieval.min_score),
            index,
            assembler: PromptAssembler::new(config.history_turns),
            generator: AnswerGenerator::new(model, config.generation.clone()),
            loader: DocumentLoader::with_defaults(),
            retrieval: config.retrieval.clone(),
        }
    }

    pub fn index(&self) -> &Arc<dyn VectorIndex> {
        &self.index
    }

    /// 디렉토리의 문서를 인덱스에 추가
    ///
    /// 읽을 수 없는 파일은 `skipped`에 기록되고 나머지는 계속 처리됩니다.
    /// 다시 읽은 문서(건너뛴 파일 포함)의 이전 청크는 새 청크로 교체됩니다.
    pub async fn ingest(&self, dir: &Path, chunk_config: ChunkConfig) -> Result<IngestionSummary> {
        let chunker = RecursiveChunker::new(chunk_config)?;

        // 파일 읽기와 PDF 파싱은 CPU/IO 바운드
        let loader = self.loader.clone();
        let dir_owned = dir.to_path_buf();
        let outcome = tokio::task::spawn_blocking(move || loader.load_directory(&dir_owned))
            .await
            .map_err(|e| ChatError::Io(std::io::Error::new(std::io::ErrorKind::Other, e)))??;

        let chunks: Vec<Chunk> = outcome
            .documents
            .iter()
            .flat_map(|document| chunker.chunk(document))
            .collect();

        tracing::info!(
            "Chunked {} documents into {} chunks ({})",
            outcome.documents.len(),
            chunks.len(),
            chunker.name()
        );

        let mut document_ids: Vec<String> =
            outcome.documents.iter().map(|d| d.id.clone()).collect();
        document_ids.extend(outcome.skipped.iter().map(|e| document_id(dir, &e.path)));

        let chunks_indexed = self.index.replace_documents(&document_ids, &chunks).await?;

        Ok(IngestionSummary {
            documents_loaded: outcome.documents.len(),
            chunks_indexed,
            skipped: outcome.skipped,
        })
    }

    /// 질문에 답변하고 세션 기록에 추가
    ///
    /// 실패하면 세션 기록은 바뀌지 않습니다.
    pub async fn ask(&self, question: &str, session: &mut ChatSession) -> Result<Answer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(ChatError::config("question must not be empty"));
        }

        let mut chunks = self.retriever.retrieve(question, self.retrieval.top_k).await?;

        if chunks.is_empty() && self.retrieval.multi_query {
            tracing::info!("No context found, retrying with alternative questions");
            chunks = self.multi_query_retrieve(question).await?;
        }

        let prompt = self.assembler.assemble(question, &chunks, session.history());
        let generated = self.generator.generate(&prompt, &chunks).await?;

        let mut sources: Vec<String> = Vec::new();
        for chunk in &chunks {
            if !sources.contains(&chunk.source) {
                sources.push(chunk.source.clone());
            }
        }

        session.record_exchange(
            ConversationTurn::user(question),
            ConversationTurn::assistant(&generated.text, generated.cited_chunk_ids.clone()),
        );

        Ok(Answer {
            answer_text: generated.text,
            cited_chunk_ids: generated.cited_chunk_ids,
            sources,
        })
    }

    /// 대체 질문별 검색 결과 합집합 (청크 ID 기준 중복 제거, 처음 등장 순)
    async fn multi_query_retrieve(&self, question: &str) -> Result<Vec<RetrievedChunk>> {
        let queries = self.generator.expand_queries(question).await?;

        let mut union: Vec<RetrievedChunk> = Vec::new();
        for query in &queries {
            for chunk in self.retriever.retrieve(query, self.retrieval.top_k).await? {
                if !union.iter().any(|c| c.chunk_id == chunk.chunk_id) {
                    union.push(chunk);
                }
            }
        }

        tracing::debug!(
            "Multi-query retrieval: {} queries, {} unique chunks",
            queries.len(),
            union.len()
        );
        Ok(union)
    }
}

// ============================================================================
// Tests
// ============================================================================
