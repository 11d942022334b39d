//! 대화 기록
//!
//! `ChatSession`은 호출자가 소유합니다. 전역 상태는 없고,
//! 세션마다 독립된 기록을 가집니다.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 발화자
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    /// 프롬프트 표시용 이름
    pub fn label(&self) -> &'static str {
        match self {
            Role::User => "User",
            Role::Assistant => "Assistant",
        }
    }
}

/// 대화 한 턴
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub role: Role,
    pub text: String,
    /// 답변이 인용한 청크 ID (사용자 턴은 비어 있음)
    #[serde(default)]
    pub cited_sources: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl ConversationTurn {
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            text: text.into(),
            cited_sources: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    pub fn assistant(text: impl Into<String>, cited_sources: Vec<String>) -> Self {
        Self {
            role: Role::Assistant,
            text: text.into(),
            cited_sources,
            timestamp: Utc::now(),
        }
    }
}

/// 대화 세션
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatSession {
    pub id: Uuid,
    history: Vec<ConversationTurn>,
}

impl ChatSession {
    pub fn new() -> Self {
        Self {
            id: Uuid::new_v4(),
            history: Vec::new(),
        }
    }

    /// 전체 기록 (오래된 순)
    pub fn history(&self) -> &[ConversationTurn] {
        &self.history
    }

    /// 질문/답변 한 쌍 추가
    pub fn record_exchange(&mut self, question: ConversationTurn, answer: ConversationTurn) {
        self.history.push(question);
        self.history.push(answer);
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    /// 기록 초기화 (세션 ID는 유지)
    pub fn clear(&mut self) {
        self.history.clear();
    }
}

impl Default for ChatSession {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_record_exchange_appends_in_order() {
        let mut session = ChatSession::new();
        for i in 0..2 {
            session.record_exchange(
                ConversationTurn::user(format!("q{}", i)),
                ConversationTurn::assistant(format!("a{}", i), vec![format!("doc#{}", i)]),
            );
        }

        let texts: Vec<&str> = session.history().iter().map(|t| t.text.as_str()).collect();
        assert_eq!(texts, vec!["q0", "a0", "q1", "a1"]);
        assert_eq!(session.history()[3].role, Role::Assistant);
        assert_eq!(session.history()[3].cited_sources, vec!["doc#1"]);

        let id = session.id;
        session.clear();
        assert!(session.is_empty());
        assert_eq!(session.id, id);
    }

    #[test]
    fn test_sessions_are_independent() {
        let mut a = ChatSession::new();
        let b = ChatSession::new();
        a.record_exchange(
            ConversationTurn::user("hello"),
            ConversationTurn::assistant("hi", vec![]),
        );

        assert_ne!(a.id, b.id);
        assert_eq!(a.len(), 2);
        assert!(b.is_empty());
    }
}
