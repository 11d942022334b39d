//! derivatives-chatbot - 파생상품 문서 기반 RAG 챗봇
//!
//! 문서 로드 → 청킹 → 벡터 인덱싱 → 유사도 검색 → 프롬프트 조립 → 답변 생성.
//! 대화 기록은 세션 단위로 호출자가 소유하고, 피드백은 파일에 덧붙입니다.

pub mod chat;
pub mod cli;
pub mod config;
pub mod embedding;
pub mod error;
pub mod feedback;
pub mod knowledge;
pub mod loader;
pub mod models;
pub mod timeout;

// Re-exports
pub use chat::{
    Answer, AnswerGenerator, ChatSession, Chatbot, ConversationTurn, GeminiChat,
    IngestionSummary, LanguageModel, PromptAssembler, Role,
};
pub use config::{get_data_dir, ChatbotConfig, GenerationConfig, RetrievalConfig};
pub use embedding::{
    create_embedder, get_api_key, has_api_key, EmbeddingProvider, GeminiEmbedding,
    HashEmbedding,
};
pub use error::{ChatError, LoadError, Result};
pub use feedback::{FeedbackRecord, FeedbackSink, FileFeedbackLog, Rating};
pub use knowledge::{
    ChunkConfig, Chunker, MemoryVectorStore, RecursiveChunker, RetrievedChunk, Retriever,
    SemanticIndex, VectorIndex, VectorStore,
};
#[cfg(feature = "lance")]
pub use knowledge::LanceVectorStore;
pub use loader::{load_documents, DocumentLoader, LoadOutcome, LoaderConfig};
pub use models::{Chunk, Document, IndexedChunk, ScoredChunk};
