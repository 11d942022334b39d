//! CLI 모듈
//!
//! derivatives-chatbot CLI 명령어 정의 및 구현

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use clap::{Parser, Subcommand};
use tokio::io::{AsyncBufReadExt, BufReader};
use uuid::Uuid;

use crate::chat::{Answer, ChatSession, Chatbot, GeminiChat, IngestionSummary, LanguageModel};
use crate::config::{ChatbotConfig, GenerationConfig};
use crate::embedding::{create_embedder, has_api_key};
use crate::feedback::{FeedbackRecord, FeedbackSink, FileFeedbackLog, Rating};
use crate::knowledge::{MemoryVectorStore, SemanticIndex, VectorIndex, VectorStore};

// ============================================================================
// CLI Definition
// ============================================================================

#[derive(Parser)]
#[command(name = "derivatives-chatbot")]
#[command(version, about = "파생상품 문서 기반 질의응답 챗봇", long_about = None)]
pub struct Cli {
    /// 데이터 디렉토리 (기본: CHATBOT_DATA_DIR 또는 ~/.derivatives-chatbot)
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// API 없이 로컬 해시 임베딩 사용
    #[arg(long, global = true)]
    pub offline: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// 폴더의 문서를 인덱스에 추가
    Ingest {
        /// 수집할 폴더 경로 (재귀)
        dir: PathBuf,

        /// 청크 크기 (문자 수)
        #[arg(long)]
        chunk_size: Option<usize>,

        /// 청크 겹침 (문자 수)
        #[arg(long)]
        chunk_overlap: Option<usize>,

        /// 기존 인덱스를 비우고 다시 수집
        #[arg(long)]
        reset: bool,
    },

    /// 질문 하나에 답변
    Ask {
        /// 질문
        question: String,

        /// 검색할 청크 수
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// 최소 유사도 (미만이면 대체 질문으로 재검색)
        #[arg(long)]
        min_score: Option<f32>,
    },

    /// 대화형 세션
    Chat {
        /// 검색할 청크 수
        #[arg(short = 'k', long)]
        top_k: Option<usize>,

        /// 최소 유사도 (미만이면 대체 질문으로 재검색)
        #[arg(long)]
        min_score: Option<f32>,
    },

    /// 피드백 남기기
    Feedback {
        /// 피드백 내용
        comment: String,

        /// 평가 (positive, neutral, negative)
        #[arg(short, long)]
        rating: Option<Rating>,

        /// 대상 세션 ID
        #[arg(short, long)]
        session: Option<Uuid>,
    },

    /// 상태 확인
    Status,
}

// ============================================================================
// CLI Runner
// ============================================================================

/// CLI 명령어 실행
pub async fn run(cli: Cli) -> Result<()> {
    let mut config = ChatbotConfig::from_env().context("환경변수 설정 오류")?;
    if let Some(dir) = cli.data_dir {
        config.feedback_dir = dir.join("logs");
        config.data_dir = dir;
    }

    match cli.command {
        Commands::Ingest {
            dir,
            chunk_size,
            chunk_overlap,
            reset,
        } => {
            if let Some(size) = chunk_size {
                config.chunking.chunk_size = size;
            }
            if let Some(overlap) = chunk_overlap {
                config.chunking.chunk_overlap = overlap;
            }
            cmd_ingest(config, &dir, cli.offline, reset).await
        }
        Commands::Ask {
            question,
            top_k,
            min_score,
        } => {
            apply_retrieval_args(&mut config, top_k, min_score);
            cmd_ask(config, &question, cli.offline).await
        }
        Commands::Chat { top_k, min_score } => {
            apply_retrieval_args(&mut config, top_k, min_score);
            cmd_chat(config, cli.offline).await
        }
        Commands::Feedback {
            comment,
            rating,
            session,
        } => cmd_feedback(config, comment, rating, session).await,
        Commands::Status => cmd_status(config).await,
    }
}

/// 검색 옵션 덮어쓰기 (CLI > 환경변수 > 기본값)
fn apply_retrieval_args(config: &mut ChatbotConfig, top_k: Option<usize>, min_score: Option<f32>) {
    if let Some(k) = top_k {
        config.retrieval.top_k = k;
    }
    if min_score.is_some() {
        config.retrieval.min_score = min_score;
    }
}

// ============================================================================
// Index Setup
// ============================================================================

/// 열린 벡터 저장소
struct OpenedStore {
    store: Arc<dyn VectorStore>,
    /// 메모리 저장소면 스냅샷 저장 대상
    snapshot: Option<Arc<MemoryVectorStore>>,
}

impl OpenedStore {
    fn persist(&self) -> Result<()> {
        if let Some(memory) = &self.snapshot {
            memory.persist().context("인덱스 저장 실패")?;
        }
        Ok(())
    }
}

#[cfg(not(feature = "lance"))]
async fn open_store(config: &ChatbotConfig) -> Result<OpenedStore> {
    let memory = Arc::new(
        MemoryVectorStore::open(&config.index_path()).context("인덱스 열기 실패")?,
    );
    Ok(OpenedStore {
        store: memory.clone(),
        snapshot: Some(memory),
    })
}

#[cfg(feature = "lance")]
async fn open_store(config: &ChatbotConfig) -> Result<OpenedStore> {
    let lance = crate::knowledge::LanceVectorStore::open(&config.data_dir.join("chunks.lance"))
        .await
        .context("LanceDB 열기 실패")?;
    Ok(OpenedStore {
        store: Arc::new(lance),
        snapshot: None,
    })
}

/// 임베딩 + 저장소로 인덱스 구성
async fn open_index(config: &ChatbotConfig, offline: bool) -> Result<(Arc<dyn VectorIndex>, OpenedStore)> {
    if !offline && !has_api_key() {
        bail!(
            "API 키가 설정되지 않았습니다.\n\n\
             설정 방법:\n  \
             export GEMINI_API_KEY=your-api-key\n  \
             또는\n  \
             export GOOGLE_AI_API_KEY=your-api-key\n\n\
             API 키 없이 실행하려면 --offline 을 사용하세요.\n\
             API 키 발급: https://aistudio.google.com/app/apikey"
        );
    }

    let embedder = create_embedder(offline)?;
    let opened = open_store(config).await?;
    let index = SemanticIndex::new(embedder, opened.store.clone())
        .with_embed_timeout(config.retrieval.embed_timeout);

    Ok((Arc::new(index), opened))
}

/// 질의응답용 챗봇 구성 (LLM은 항상 Gemini)
async fn open_chatbot(config: &ChatbotConfig, offline: bool) -> Result<Chatbot> {
    config.validate()?;

    if !has_api_key() {
        bail!(
            "답변 생성에는 API 키가 필요합니다.\n\
             설정: export GEMINI_API_KEY=your-key"
        );
    }

    let (index, _opened) = open_index(config, offline).await?;
    let model = GeminiChat::from_env().context("Gemini 클라이언트 생성 실패")?;

    Ok(Chatbot::new(config, index, Arc::new(model)))
}

// ============================================================================
// Command Implementations
// ============================================================================

/// 문서 수집 명령어 (ingest)
async fn cmd_ingest(config: ChatbotConfig, dir: &Path, offline: bool, reset: bool) -> Result<()> {
    config.validate()?;

    let (index, opened) = open_index(&config, offline).await?;

    if reset {
        index.clear().await.context("인덱스 초기화 실패")?;
        println!("[*] 기존 인덱스를 비웠습니다.");
    }

    println!("[*] 문서 수집 중: {}", dir.display());
    println!(
        "    청크 크기: {}, 겹침: {}",
        config.chunking.chunk_size, config.chunking.chunk_overlap
    );

    // 수집에는 LLM이 필요 없으므로 모델 없이 인덱스만 사용
    let chatbot = Chatbot::new(&config, index.clone(), Arc::new(NoModel));
    let summary = chatbot
        .ingest(dir, config.chunking.clone())
        .await
        .context("문서 수집 실패")?;

    opened.persist()?;

    print_summary(&summary);
    println!("    인덱스 전체: {} 청크", index.len().await?);
    Ok(())
}

fn print_summary(summary: &IngestionSummary) {
    println!();
    println!(
        "[OK] 완료: 문서 {}, 청크 {}, 건너뜀 {}",
        summary.documents_loaded,
        summary.chunks_indexed,
        summary.skipped.len()
    );

    for skipped in &summary.skipped {
        println!(
            "[!] 건너뜀: {} ({})",
            skipped.path.display(),
            truncate_text(&skipped.reason, 120)
        );
    }
}

/// 질문 명령어 (ask)
async fn cmd_ask(config: ChatbotConfig, question: &str, offline: bool) -> Result<()> {
    let chatbot = open_chatbot(&config, offline).await?;
    let log = FileFeedbackLog::new(&config.feedback_dir);

    let mut session = ChatSession::new();
    let answer = chatbot
        .ask(question, &mut session)
        .await
        .context("답변 생성 실패")?;

    print_answer(&answer);

    if let Err(e) = log
        .record_exchange(session.id, question, &answer.answer_text)
        .await
    {
        tracing::warn!("대화 로그 저장 실패: {}", e);
    }

    Ok(())
}

/// 대화형 세션 명령어 (chat)
async fn cmd_chat(config: ChatbotConfig, offline: bool) -> Result<()> {
    let chatbot = open_chatbot(&config, offline).await?;
    let log = FileFeedbackLog::new(&config.feedback_dir);
    let mut session = ChatSession::new();

    println!("파생상품 챗봇 (세션 {})", session.id);
    println!("질문을 입력하세요. /clear 기록 초기화, /quit 종료");
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let input = line.trim();

        match input {
            "" => continue,
            "/quit" | "/exit" => break,
            "/clear" => {
                session.clear();
                println!("[OK] 대화 기록을 비웠습니다.");
                continue;
            }
            _ => {}
        }

        match chatbot.ask(input, &mut session).await {
            Ok(answer) => {
                print_answer(&answer);
                if let Err(e) = log
                    .record_exchange(session.id, input, &answer.answer_text)
                    .await
                {
                    tracing::warn!("대화 로그 저장 실패: {}", e);
                }
            }
            Err(e) if e.is_retryable() => {
                println!("[!] {} (같은 질문으로 다시 시도할 수 있습니다)", e);
            }
            Err(e) => println!("[!] {}", e),
        }
        println!();
    }

    // 세션 종료 피드백
    print!("\n[?] 이번 세션에 대한 피드백을 남겨주세요 (예: \"+ 설명이 명확함\", Enter로 건너뛰기): ");
    std::io::stdout().flush()?;

    if let Some(line) = lines.next_line().await? {
        if let Some((rating, comment)) = parse_feedback_line(&line) {
            log.record_feedback(&FeedbackRecord::new(session.id, rating, comment))
                .await?;
            println!("[OK] 피드백 감사합니다!");
        }
    }

    Ok(())
}

fn print_answer(answer: &Answer) {
    println!();
    println!("{}", answer.answer_text);

    if !answer.sources.is_empty() {
        println!();
        println!("[*] 출처: {}", answer.sources.join(", "));
    }
    if !answer.cited_chunk_ids.is_empty() {
        println!("    인용: {}", answer.cited_chunk_ids.join(", "));
    }
}

/// 피드백 명령어 (feedback)
async fn cmd_feedback(
    config: ChatbotConfig,
    comment: String,
    rating: Option<Rating>,
    session: Option<Uuid>,
) -> Result<()> {
    if comment.trim().is_empty() {
        bail!("피드백 내용을 입력해야 합니다");
    }

    let log = FileFeedbackLog::new(&config.feedback_dir);
    let record = FeedbackRecord::new(session.unwrap_or_else(Uuid::new_v4), rating, comment);
    log.record_feedback(&record)
        .await
        .context("피드백 저장 실패")?;

    println!("[OK] 피드백이 저장되었습니다: {}", log.feedback_path().display());
    Ok(())
}

/// 상태 명령어 (status)
async fn cmd_status(config: ChatbotConfig) -> Result<()> {
    println!("derivatives-chatbot v{}", env!("CARGO_PKG_VERSION"));
    println!();

    println!("[*] 데이터 디렉토리: {}", config.data_dir.display());
    println!("[*] 로그 디렉토리: {}", config.feedback_dir.display());
    println!(
        "[*] 모델: {} (temperature {}, max_tokens {}, timeout {:?})",
        config.generation.model,
        config.generation.temperature,
        config.generation.max_tokens,
        config.generation.timeout
    );

    if has_api_key() {
        println!("[OK] API 키: 설정됨");
    } else {
        println!("[!] API 키: 미설정");
        println!("    설정: export GEMINI_API_KEY=your-key");
    }

    match open_store(&config).await {
        Ok(opened) => match opened.store.count().await {
            Ok(count) => {
                println!("[OK] 벡터 인덱스: {} 청크 ({})", count, opened.store.name());
                if let Ok(metadata) = std::fs::metadata(config.index_path()) {
                    println!("     스냅샷 크기: {}", format_bytes(metadata.len() as usize));
                }
            }
            Err(e) => println!("[!] 인덱스 조회 실패: {}", e),
        },
        Err(e) => println!("[!] 인덱스 열기 실패: {}", e),
    }

    Ok(())
}

// ============================================================================
// Helper Functions
// ============================================================================

/// 수집 전용 자리 표시 모델 (호출되면 에러)
struct NoModel;

#[async_trait]
impl LanguageModel for NoModel {
    async fn complete(&self, _prompt: &str, _config: &GenerationConfig) -> Result<String> {
        bail!("language model is not configured for ingestion")
    }

    fn name(&self) -> &str {
        "none"
    }
}

/// "평가 내용" 형식의 입력 분리 (평가는 생략 가능)
fn parse_feedback_line(line: &str) -> Option<(Option<Rating>, String)> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let (first, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
    match first.parse::<Rating>() {
        Ok(rating) => Some((Some(rating), rest.trim().to_string())),
        Err(_) => Some((None, line.to_string())),
    }
}

/// 텍스트 자르기 (UTF-8 안전)
fn truncate_text(text: &str, max_chars: usize) -> String {
    let cleaned = text.replace('\n', " ").replace('\r', "");
    let cleaned = cleaned.trim();

    if cleaned.chars().count() <= max_chars {
        cleaned.to_string()
    } else {
        let truncated: String = cleaned.chars().take(max_chars).collect();
        format!("{}...", truncated)
    }
}

/// 바이트 크기 포맷팅
fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;

    if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_feedback_line() {
        assert_eq!(parse_feedback_line("   "), None);
        assert_eq!(
            parse_feedback_line("+ 설명이 명확함"),
            Some((Some(Rating::Positive), "설명이 명확함".to_string()))
        );
        assert_eq!(
            parse_feedback_line("negative"),
            Some((Some(Rating::Negative), String::new()))
        );
        assert_eq!(
            parse_feedback_line("답변이 너무 길어요"),
            Some((None, "답변이 너무 길어요".to_string()))
        );
    }

    #[test]
    fn test_cli_parses_ingest_flags() {
        let cli = Cli::try_parse_from([
            "derivatives-chatbot",
            "--offline",
            "ingest",
            "./data",
            "--chunk-size",
            "500",
            "--chunk-overlap",
            "50",
        ])
        .unwrap();

        assert!(cli.offline);
        match cli.command {
            Commands::Ingest {
                dir,
                chunk_size,
                chunk_overlap,
                reset,
            } => {
                assert_eq!(dir, PathBuf::from("./data"));
                assert_eq!(chunk_size, Some(500));
                assert_eq!(chunk_overlap, Some(50));
                assert!(!reset);
            }
            _ => panic!("expected ingest"),
        }
    }

    #[test]
    fn test_cli_min_score_overrides_config() {
        let cli = Cli::try_parse_from([
            "derivatives-chatbot",
            "ask",
            "What is a swap?",
            "-k",
            "2",
            "--min-score",
            "0.35",
        ])
        .unwrap();

        let mut config = ChatbotConfig::default();
        match cli.command {
            Commands::Ask {
                top_k, min_score, ..
            } => apply_retrieval_args(&mut config, top_k, min_score),
            _ => panic!("expected ask"),
        }
        assert_eq!(config.retrieval.top_k, 2);
        assert_eq!(config.retrieval.min_score, Some(0.35));

        // 플래그가 없으면 기존 값 유지
        config.retrieval.min_score = Some(0.5);
        apply_retrieval_args(&mut config, None, None);
        assert_eq!(config.retrieval.min_score, Some(0.5));
    }

    #[test]
    fn test_cli_parses_feedback_rating() {
        let cli = Cli::try_parse_from(["derivatives-chatbot", "feedback", "좋아요", "-r", "positive"])
            .unwrap();
        match cli.command {
            Commands::Feedback { rating, .. } => assert_eq!(rating, Some(Rating::Positive)),
            _ => panic!("expected feedback"),
        }
    }

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("hello", 10), "hello");
        assert_eq!(truncate_text("hello world", 5), "hello...");
        assert_eq!(truncate_text("hello\nworld", 20), "hello world");
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 B");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1048576), "1.00 MB");
    }
}
