//! 피드백 / 대화 로그
//!
//! 로그 디렉토리의 `feedback.txt`, `conversation_log.txt`에 블록 단위로 덧붙입니다.
//!
//! ```text
//! Time: 2024-05-01 14:03:22
//! Session: 6f1c...
//! Question: What is a forward contract?
//! Bot Response: A forward contract is ...
//! ----------------------------------------
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use async_trait::async_trait;
use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

use crate::error::Result;

/// 피드백 파일 이름
pub const FEEDBACK_FILE: &str = "feedback.txt";
/// 대화 로그 파일 이름
pub const CONVERSATION_FILE: &str = "conversation_log.txt";

/// 세션 전체에 대한 피드백일 때 Question/Bot Response 자리 표시
const SESSION_QUESTION: &str = "Overall Session Feedback";
const SESSION_RESPONSE: &str = "Overall Feedback";

const SEPARATOR_WIDTH: usize = 40;

// ============================================================================
// Types
// ============================================================================

/// 평가
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rating {
    Positive,
    Neutral,
    Negative,
}

impl Rating {
    pub fn as_str(&self) -> &'static str {
        match self {
            Rating::Positive => "positive",
            Rating::Neutral => "neutral",
            Rating::Negative => "negative",
        }
    }
}

impl fmt::Display for Rating {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rating {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "positive" | "good" | "+" | "up" => Ok(Rating::Positive),
            "neutral" | "ok" | "0" => Ok(Rating::Neutral),
            "negative" | "bad" | "-" | "down" => Ok(Rating::Negative),
            other => Err(format!(
                "unknown rating '{}' (expected positive, neutral or negative)",
                other
            )),
        }
    }
}

/// 세션 피드백
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeedbackRecord {
    pub session_id: Uuid,
    pub rating: Option<Rating>,
    pub comment: String,
    pub timestamp: DateTime<Utc>,
}

impl FeedbackRecord {
    pub fn new(session_id: Uuid, rating: Option<Rating>, comment: impl Into<String>) -> Self {
        Self {
            session_id,
            rating,
            comment: comment.into(),
            timestamp: Utc::now(),
        }
    }

    fn to_block(&self) -> String {
        let mut block = format!(
            "Time: {}\nSession: {}\nQuestion: {}\nBot Response: {}\n",
            format_time(&self.timestamp),
            self.session_id,
            SESSION_QUESTION,
            SESSION_RESPONSE
        );
        if let Some(rating) = self.rating {
            block.push_str(&format!("Rating: {}\n", rating));
        }
        block.push_str(&format!("Feedback: {}\n{}\n", self.comment, separator()));
        block
    }
}

fn format_time(timestamp: &DateTime<Utc>) -> String {
    timestamp
        .with_timezone(&Local)
        .format("%Y-%m-%d %H:%M:%S")
        .to_string()
}

fn separator() -> String {
    "-".repeat(SEPARATOR_WIDTH)
}

// ============================================================================
// FeedbackSink Trait
// ============================================================================

/// 피드백/대화 기록 대상 (추가만 가능)
#[async_trait]
pub trait FeedbackSink: Send + Sync {
    /// 피드백 기록
    async fn record_feedback(&self, record: &FeedbackRecord) -> Result<()>;

    /// 질문/답변 한 쌍 기록
    async fn record_exchange(&self, session_id: Uuid, question: &str, answer: &str) -> Result<()>;
}

// ============================================================================
// FileFeedbackLog
// ============================================================================

/// 텍스트 파일 로그
#[derive(Debug, Clone)]
pub struct FileFeedbackLog {
    dir: PathBuf,
}

impl FileFeedbackLog {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn feedback_path(&self) -> PathBuf {
        self.dir.join(FEEDBACK_FILE)
    }

    pub fn conversation_path(&self) -> PathBuf {
        self.dir.join(CONVERSATION_FILE)
    }

    async fn append(&self, path: &Path, block: &str) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;

        let mut file = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await?;
        file.write_all(block.as_bytes()).await?;
        file.flush().await?;

        tracing::debug!("Appended {} bytes to {:?}", block.len(), path);
        Ok(())
    }
}

#[async_trait]
impl FeedbackSink for FileFeedbackLog {
    async fn record_feedback(&self, record: &FeedbackRecord) -> Result<()> {
        self.append(&self.feedback_path(), &record.to_block()).await?;
        tracing::info!("Saved feedback for session {}", record.session_id);
        Ok(())
    }

    async fn record_exchange(&self, session_id: Uuid, question: &str, answer: &str) -> Result<()> {
        let block = format!(
            "Time: {}\nSession: {}\nQuestion: {}\nBot Response: {}\n{}\n",
            format_time(&Utc::now()),
            session_id,
            question,
            answer,
            separator()
        );
        self.append(&self.conversation_path(), &block).await
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn test_rating_from_str() {
        assert_eq!("Positive".parse::<Rating>().unwrap(), Rating::Positive);
        assert_eq!("-".parse::<Rating>().unwrap(), Rating::Negative);
        assert_eq!("ok".parse::<Rating>().unwrap(), Rating::Neutral);
        assert!("great".parse::<Rating>().is_err());
    }

    #[tokio::test]
    async fn test_feedback_appends_blocks() {
        let dir = TempDir::new().unwrap();
        let log = FileFeedbackLog::new(dir.path().join("logs"));
        let session = Uuid::new_v4();

        log.record_feedback(&FeedbackRecord::new(session, Some(Rating::Positive), "Very clear"))
            .await
            .unwrap();
        log.record_feedback(&FeedbackRecord::new(session, None, "Second note"))
            .await
            .unwrap();

        let content = std::fs::read_to_string(log.feedback_path()).unwrap();
        assert_eq!(content.matches(&"-".repeat(40)).count(), 2);
        assert!(content.contains("Rating: positive\nFeedback: Very clear\n"));
        assert!(content.contains("Question: Overall Session Feedback\nBot Response: Overall Feedback\nFeedback: Second note\n"));
        assert!(content.starts_with("Time: "));
    }

    #[tokio::test]
    async fn test_exchange_log_format() {
        let dir = TempDir::new().unwrap();
        let log = FileFeedbackLog::new(dir.path());
        let session = Uuid::new_v4();

        log.record_exchange(session, "What is a swap?", "An exchange of cash flows [1].")
            .await
            .unwrap();

        let content = std::fs::read_to_string(log.conversation_path()).unwrap();
        assert!(content.contains(&format!("Session: {}\n", session)));
        assert!(content.contains("Question: What is a swap?\nBot Response: An exchange of cash flows [1].\n"));
        assert!(content.ends_with(&format!("{}\n", "-".repeat(40))));
    }
}
