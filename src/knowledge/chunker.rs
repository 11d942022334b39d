//! Text Chunking Module
//!
//! 문서를 겹치는 고정 크기 청크로 분할합니다.
//! 크기 단위는 문자(char)이며, 창 안에서 문단/줄/공백 경계를 우선합니다.
//!
//! 다음 청크는 항상 이전 청크 끝에서 `chunk_overlap` 문자 앞에서 시작하므로
//! 겹치는 부분을 제거하고 이어 붙이면 원문이 그대로 복원됩니다.

use serde::{Deserialize, Serialize};

use crate::error::{ChatError, Result};
use crate::models::{Chunk, Document};

/// 분할 우선순위 (문단 → 줄 → 단어)
const SEPARATORS: [&str; 3] = ["\n\n", "\n", " "];

// ============================================================================
// Chunk Configuration
// ============================================================================

/// 청킹 설정
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChunkConfig {
    /// 최대 청크 크기 (문자 수)
    pub chunk_size: usize,
    /// 연속 청크 간 공유 문자 수
    pub chunk_overlap: usize,
}

impl Default for ChunkConfig {
    fn default() -> Self {
        Self {
            chunk_size: 800,
            chunk_overlap: 200,
        }
    }
}

impl ChunkConfig {
    pub fn new(chunk_size: usize, chunk_overlap: usize) -> Self {
        Self {
            chunk_size,
            chunk_overlap,
        }
    }

    /// `0 <= overlap < size` 검증
    pub fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(ChatError::config("chunk_size must be >= 1"));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(ChatError::config(format!(
                "chunk_overlap ({}) must be smaller than chunk_size ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

// ============================================================================
// Chunker Trait
// ============================================================================

/// 텍스트 청킹 전략 트레이트
pub trait Chunker: Send + Sync {
    /// 문서를 순서가 있는 청크로 분할
    fn chunk(&self, document: &Document) -> Vec<Chunk>;

    /// 청커 이름
    fn name(&self) -> &'static str;
}

// ============================================================================
// RecursiveChunker
// ============================================================================

/// 구분자 인식 고정 크기 청커
pub struct RecursiveChunker {
    config: ChunkConfig,
}

impl RecursiveChunker {
    /// 설정으로 생성 (설정이 잘못되면 `ConfigError`)
    pub fn new(config: ChunkConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    pub fn config(&self) -> &ChunkConfig {
        &self.config
    }

    /// 텍스트를 (시작 위치, 청크 텍스트) 목록으로 분할
    pub fn split_text(&self, text: &str) -> Vec<(usize, String)> {
        let chars: Vec<char> = text.chars().collect();
        if chars.is_empty() {
            return vec![];
        }

        let size = self.config.chunk_size;
        let overlap = self.config.chunk_overlap;

        if chars.len() <= size {
            return vec![(0, text.to_string())];
        }

        let mut pieces = Vec::new();
        let mut start = 0;

        loop {
            let hard_end = (start + size).min(chars.len());
            if hard_end == chars.len() {
                pieces.push((start, chars[start..].iter().collect()));
                break;
            }

            // 진행 보장: end - overlap > start
            let lower = (start + overlap + 1).max(start + size / 2);
            let end = find_split_point(&chars, lower, hard_end);

            pieces.push((start, chars[start..end].iter().collect()));
            start = end - overlap;
        }

        pieces
    }
}

impl Chunker for RecursiveChunker {
    fn chunk(&self, document: &Document) -> Vec<Chunk> {
        self.split_text(&document.raw_text)
            .into_iter()
            .enumerate()
            .map(|(order_index, (start_offset, text))| Chunk {
                id: Chunk::make_id(&document.id, order_index),
                document_id: document.id.clone(),
                source: document.source.clone(),
                text,
                order_index,
                start_offset,
            })
            .collect()
    }

    fn name(&self) -> &'static str {
        "RecursiveChunker"
    }
}

// ============================================================================
// Helper Functions
// ============================================================================

/// `[lower, upper]` 범위에서 구분자 바로 뒤의 가장 늦은 위치를 찾음
///
/// 구분자가 없으면 `upper`에서 자릅니다.
fn find_split_point(chars: &[char], lower: usize, upper: usize) -> usize {
    for sep in SEPARATORS {
        let sep: Vec<char> = sep.chars().collect();
        let mut end = upper;
        while end >= lower && end >= sep.len() {
            if chars[end - sep.len()..end] == sep[..] {
                return end;
            }
            end -= 1;
        }
    }
    upper
}

/// 청크를 겹침 없이 이어 붙여 원문 복원
pub fn reassemble(chunks: &[Chunk], chunk_overlap: usize) -> String {
    let mut out = String::new();
    for (i, chunk) in chunks.iter().enumerate() {
        if i == 0 {
            out.push_str(&chunk.text);
        } else {
            out.extend(chunk.text.chars().skip(chunk_overlap));
        }
    }
    out
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use std::path::PathBuf;

    fn doc(text: &str) -> Document {
        Document {
            id: "forwards.docx".to_string(),
            source_path: PathBuf::from("data/forwards.docx"),
            source: "forwards.docx".to_string(),
            raw_text: text.to_string(),
        }
    }

    fn sample_text() -> String {
        let mut text = String::new();
        for i in 0..40 {
            text.push_str(&format!(
                "Paragraph {} explains how a forward contract locks in a price today.\n",
                i
            ));
            if i % 5 == 4 {
                text.push('\n');
            }
        }
        text
    }

    #[test]
    fn test_chunker_empty() {
        let chunker = RecursiveChunker::new(ChunkConfig::default()).unwrap();
        assert!(chunker.chunk(&doc("")).is_empty());
    }

    #[test]
    fn test_short_document_yields_one_chunk() {
        let chunker = RecursiveChunker::new(ChunkConfig::new(100, 20)).unwrap();
        let chunks = chunker.chunk(&doc("A swap exchanges cash flows."));
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].text, "A swap exchanges cash flows.");
        assert_eq!(chunks[0].order_index, 0);
        assert_eq!(chunks[0].id, "forwards.docx#0");
    }

    #[test]
    fn test_exact_size_yields_one_chunk() {
        let chunker = RecursiveChunker::new(ChunkConfig::new(10, 3)).unwrap();
        let chunks = chunker.chunk(&doc("0123456789"));
        assert_eq!(chunks.len(), 1);
    }

    #[test]
    fn test_reassemble_round_trip() {
        let text = sample_text();
        for (size, overlap) in [(50, 0), (50, 10), (120, 40), (200, 199), (7, 3), (1, 0)] {
            let chunker = RecursiveChunker::new(ChunkConfig::new(size, overlap)).unwrap();
            let chunks = chunker.chunk(&doc(&text));
            assert!(chunks.len() > 1, "size={size}");
            assert_eq!(reassemble(&chunks, overlap), text, "size={size} overlap={overlap}");
        }
    }

    #[test]
    fn test_round_trip_unicode() {
        let text = "선도계약은 미래의 정해진 날짜에 자산을 사고파는 계약입니다. ".repeat(20);
        let chunker = RecursiveChunker::new(ChunkConfig::new(30, 8)).unwrap();
        let chunks = chunker.chunk(&doc(&text));
        assert_eq!(reassemble(&chunks, 8), text);
    }

    #[test]
    fn test_chunks_respect_size_and_overlap() {
        let text = sample_text();
        let chunker = RecursiveChunker::new(ChunkConfig::new(120, 30)).unwrap();
        let chunks = chunker.chunk(&doc(&text));

        for pair in chunks.windows(2) {
            let prev: Vec<char> = pair[0].text.chars().collect();
            let next: Vec<char> = pair[1].text.chars().collect();
            assert!(prev.len() <= 120);
            assert_eq!(prev[prev.len() - 30..], next[..30]);
            assert_eq!(pair[1].start_offset, pair[0].start_offset + prev.len() - 30);
            assert_eq!(pair[1].order_index, pair[0].order_index + 1);
        }
    }

    #[test]
    fn test_prefers_paragraph_boundary() {
        let text = format!("{}\n\n{}", "a".repeat(60), "b".repeat(60));
        let chunker = RecursiveChunker::new(ChunkConfig::new(100, 0)).unwrap();
        let chunks = chunker.chunk(&doc(&text));
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].text.ends_with("\n\n"));
        assert_eq!(chunks[1].text, "b".repeat(60));
    }

    #[test]
    fn test_overlap_not_smaller_than_size_is_config_error() {
        assert!(matches!(
            RecursiveChunker::new(ChunkConfig::new(100, 100)),
            Err(ChatError::Config(_))
        ));
        assert!(matches!(
            RecursiveChunker::new(ChunkConfig::new(100, 150)),
            Err(ChatError::Config(_))
        ));
        assert!(matches!(
            RecursiveChunker::new(ChunkConfig::new(0, 0)),
            Err(ChatError::Config(_))
        ));
    }

    #[test]
    fn test_default_config() {
        let default = ChunkConfig::default();
        assert_eq!(default.chunk_size, 800);
        assert_eq!(default.chunk_overlap, 200);
        assert!(default.validate().is_ok());
        assert!(ChunkConfig::new(1, 0).validate().is_ok());
    }
}
