//! 프롬프트 조립
//!
//! 같은 입력이면 항상 같은 프롬프트를 만듭니다 (시간, 난수 없음).

use crate::knowledge::RetrievedChunk;

use super::history::ConversationTurn;

/// 기록이 없을 때 넣는 문장
pub const NO_HISTORY: &str =
    "This is the beginning of our conversation. There is no prior history.";

/// 검색 결과가 없을 때 넣는 문장
pub const NO_CONTEXT: &str = "No relevant context was found in the documents.";

const INSTRUCTIONS: &str = "\
You are a market finance assistant for question-answering tasks.
Below is the history of our conversation followed by some context retrieved from documents.

Use the following pieces of retrieved context to answer the question.
If the context does not provide a clear answer, refer to the conversation history to construct your response.
If you still don't know the answer, just say that you are a market finance chatbot for derivatives academy. Keep the answer concise.
When you use a piece of context, cite it with its bracketed number, for example [1].

Note: The Conversation History is presented in chronological order, from the oldest to the most recent interactions.";

/// 프롬프트 조립기
#[derive(Debug, Clone)]
pub struct PromptAssembler {
    history_window: usize,
}

impl PromptAssembler {
    /// `history_window`: 프롬프트에 넣을 최근 턴 수
    pub fn new(history_window: usize) -> Self {
        Self { history_window }
    }

    /// 질문 + 검색 청크 + 기록 → 프롬프트
    pub fn assemble(
        &self,
        question: &str,
        chunks: &[RetrievedChunk],
        history: &[ConversationTurn],
    ) -> String {
        format!(
            "{instructions}\n\nRetrieved Context:\n{context}\n\nConversation History:\n{history}\n\nQuestion: {question}\n",
            instructions = INSTRUCTIONS,
            context = Self::format_context(chunks),
            history = self.format_history(history),
            question = question.trim(),
        )
    }

    /// `[n] (source: 파일명)` 형식의 컨텍스트 블록
    fn format_context(chunks: &[RetrievedChunk]) -> String {
        if chunks.is_empty() {
            return NO_CONTEXT.to_string();
        }

        chunks
            .iter()
            .enumerate()
            .map(|(i, chunk)| format!("[{}] (source: {})\n{}", i + 1, chunk.source, chunk.text))
            .collect::<Vec<_>>()
            .join("\n\n")
    }

    /// 최근 N턴 (오래된 순)
    fn format_history(&self, history: &[ConversationTurn]) -> String {
        let start = history.len().saturating_sub(self.history_window);
        let recent = &history[start..];

        if recent.is_empty() {
            return NO_HISTORY.to_string();
        }

        recent
            .iter()
            .map(|turn| format!("{}: {}", turn.role.label(), turn.text))
            .collect::<Vec<_>>()
            .join("\n")
    }
}

/// 대체 질문 생성 프롬프트 (검색 결과가 없을 때 사용)
pub fn multi_query_prompt(question: &str) -> String {
    format!(
        "You are an AI language model assistant. Your task is to generate five\n\
         different versions of the given user question to retrieve relevant documents from a vector\n\
         database. By generating multiple perspectives on the user question, your goal is to help\n\
         the user overcome some of the limitations of the distance-based similarity search.\n\
         Provide these alternative questions separated by newlines. Original question: {}",
        question.trim()
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chunk(id: &str, source: &str, text: &str) -> RetrievedChunk {
        RetrievedChunk {
            chunk_id: id.to_string(),
            source: source.to_string(),
            text: text.to_string(),
        }
    }

    #[test]
    fn test_assemble_is_deterministic() {
        let assembler = PromptAssembler::new(4);
        let chunks = vec![chunk("a#0", "a.docx", "Futures are exchange traded.")];
        let history = vec![ConversationTurn::user("hi")];

        assert_eq!(
            assembler.assemble("What is a future?", &chunks, &history),
            assembler.assemble("What is a future?", &chunks, &history)
        );
    }

    #[test]
    fn test_context_markers_and_question() {
        let assembler = PromptAssembler::new(4);
        let chunks = vec![
            chunk("a#0", "a.docx", "first"),
            chunk("b#3", "b.docx", "second"),
        ];
        let prompt = assembler.assemble("Define swap", &chunks, &[]);

        assert!(prompt.contains("[1] (source: a.docx)\nfirst"));
        assert!(prompt.contains("[2] (source: b.docx)\nsecond"));
        assert!(prompt.contains(NO_HISTORY));
        assert!(prompt.trim_end().ends_with("Question: Define swap"));
    }

    #[test]
    fn test_history_window_drops_oldest() {
        let assembler = PromptAssembler::new(2);
        let history = vec![
            ConversationTurn::user("oldest question"),
            ConversationTurn::assistant("oldest answer", vec![]),
            ConversationTurn::user("recent question"),
            ConversationTurn::assistant("recent answer", vec![]),
        ];
        let prompt = assembler.assemble("next", &[], &history);

        assert!(!prompt.contains("oldest"));
        assert!(prompt.contains("User: recent question\nAssistant: recent answer"));
        assert!(prompt.contains(NO_CONTEXT));
    }

    #[test]
    fn test_history_window_bounds() {
        let history = vec![
            ConversationTurn::user("q0"),
            ConversationTurn::assistant("a0", vec![]),
            ConversationTurn::user("q1"),
        ];

        let none = PromptAssembler::new(0).assemble("next", &[], &history);
        assert!(none.contains(NO_HISTORY));
        assert!(!none.contains("User: q0"));

        let all = PromptAssembler::new(100).assemble("next", &[], &history);
        assert!(all.contains("User: q0\nAssistant: a0\nUser: q1"));

        let odd = PromptAssembler::new(1).assemble("next", &[], &history);
        assert!(odd.contains("Conversation History:\nUser: q1\n"));
    }

    #[test]
    fn test_multi_query_prompt_mentions_question() {
        let prompt = multi_query_prompt("  what is delta hedging? ");
        assert!(prompt.ends_with("Original question: what is delta hedging?"));
    }
}
