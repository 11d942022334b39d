//! 문서 로더 모듈
//!
//! 디렉토리를 재귀 탐색하여 지원하는 문서(.txt, .md, .docx, .pdf)의 텍스트를 읽습니다.
//! 읽을 수 없는 파일은 `LoadError`로 기록하고 건너뛰며, 나머지 파일은 계속 처리합니다.

pub mod docx;
pub mod pdf;

use std::path::{Path, PathBuf};

use ignore::WalkBuilder;

use crate::error::{ChatError, LoadError, Result};
use crate::models::Document;

// ============================================================================
// File Types
// ============================================================================

/// 지원하는 문서 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileType {
    /// 텍스트 파일 (UTF-8)
    Text,
    /// Word 문서
    Docx,
    /// PDF 파일
    Pdf,
}

impl FileType {
    /// 확장자로 파일 타입 결정
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "txt" | "md" | "markdown" => Some(FileType::Text),
            "docx" => Some(FileType::Docx),
            "pdf" => Some(FileType::Pdf),
            _ => None,
        }
    }

    /// 파일 경로에서 타입 결정
    pub fn from_path(path: &Path) -> Option<Self> {
        path.extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }
}

// ============================================================================
// Loader
// ============================================================================

/// 로더 설정
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// .gitignore 패턴 존중 여부
    pub respect_gitignore: bool,
    /// 숨김 파일 포함 여부
    pub include_hidden: bool,
    /// 최대 파일 크기 (바이트, 0이면 제한 없음)
    pub max_file_size: u64,
    /// 최대 탐색 깊이 (None이면 제한 없음)
    pub max_depth: Option<usize>,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            respect_gitignore: true,
            include_hidden: false,
            max_file_size: 10 * 1024 * 1024, // 10MB
            max_depth: None,
        }
    }
}

/// 로드 결과
#[derive(Debug, Default)]
pub struct LoadOutcome {
    /// 로드된 문서 (경로 순)
    pub documents: Vec<Document>,
    /// 건너뛴 파일
    pub skipped: Vec<LoadError>,
}

/// 문서 로더
#[derive(Debug, Clone)]
pub struct DocumentLoader {
    config: LoaderConfig,
}

impl DocumentLoader {
    pub fn new(config: LoaderConfig) -> Self {
        Self { config }
    }

    /// 기본 설정으로 로더 생성
    pub fn with_defaults() -> Self {
        Self::new(LoaderConfig::default())
    }

    /// 디렉토리의 모든 지원 문서 로드
    ///
    /// 디렉토리가 없으면 에러, 개별 파일 실패는 `skipped`에 기록합니다.
    pub fn load_directory(&self, dir: &Path) -> Result<LoadOutcome> {
        if !dir.exists() {
            return Err(ChatError::config(format!(
                "Directory not found: {}",
                dir.display()
            )));
        }
        if !dir.is_dir() {
            return Err(ChatError::config(format!(
                "Not a directory: {}",
                dir.display()
            )));
        }

        let mut outcome = LoadOutcome::default();

        for path in self.collect_paths(dir) {
            match self.load_file(dir, &path) {
                Ok(document) => {
                    tracing::debug!(
                        "Loaded {} ({} chars)",
                        document.id,
                        document.raw_text.chars().count()
                    );
                    outcome.documents.push(document);
                }
                Err(e) => {
                    tracing::warn!("Skipping {}: {}", path.display(), e.reason);
                    outcome.skipped.push(e);
                }
            }
        }

        tracing::info!(
            "Loaded {} documents from {:?} ({} skipped)",
            outcome.documents.len(),
            dir,
            outcome.skipped.len()
        );
        Ok(outcome)
    }

    /// 지원 확장자 파일 경로 수집 (정렬됨)
    fn collect_paths(&self, dir: &Path) -> Vec<PathBuf> {
        let walker = WalkBuilder::new(dir)
            .hidden(!self.config.include_hidden)
            .git_ignore(self.config.respect_gitignore)
            .git_global(self.config.respect_gitignore)
            .git_exclude(self.config.respect_gitignore)
            .max_depth(self.config.max_depth)
            .build();

        let mut paths = Vec::new();

        for entry in walker {
            let entry = match entry {
                Ok(e) => e,
                Err(e) => {
                    tracing::warn!("Failed to read entry: {}", e);
                    continue;
                }
            };

            if !entry.file_type().map(|ft| ft.is_file()).unwrap_or(false) {
                continue;
            }

            if FileType::from_path(entry.path()).is_none() {
                tracing::debug!("Ignoring unsupported file: {:?}", entry.path());
                continue;
            }

            paths.push(entry.into_path());
        }

        paths.sort();
        paths
    }

    /// 단일 파일 로드
    pub fn load_file(&self, root: &Path, path: &Path) -> std::result::Result<Document, LoadError> {
        let file_type = FileType::from_path(path)
            .ok_or_else(|| LoadError::new(path, "unsupported file type"))?;

        let metadata =
            std::fs::metadata(path).map_err(|e| LoadError::new(path, e.to_string()))?;
        if self.config.max_file_size > 0 && metadata.len() > self.config.max_file_size {
            return Err(LoadError::new(
                path,
                format!(
                    "file too large ({} bytes, limit {})",
                    metadata.len(),
                    self.config.max_file_size
                ),
            ));
        }

        let bytes = std::fs::read(path).map_err(|e| LoadError::new(path, e.to_string()))?;

        let raw_text = match file_type {
            FileType::Text => String::from_utf8(bytes)
                .map_err(|_| LoadError::new(path, "not valid UTF-8 text"))?,
            FileType::Docx => docx::extract_text_from_docx(&bytes)
                .map_err(|e| LoadError::new(path, format!("{:#}", e)))?,
            FileType::Pdf => pdf::extract_text_from_pdf(&bytes)
                .map_err(|e| LoadError::new(path, format!("{:#}", e)))?,
        };

        if raw_text.trim().is_empty() {
            return Err(LoadError::new(path, "document contains no text"));
        }

        let source = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());

        Ok(Document {
            id: document_id(root, path),
            source_path: path.to_path_buf(),
            source,
            raw_text,
        })
    }
}

/// 문서 ID: `root` 기준 상대 경로를 `/`로 이은 값
pub fn document_id(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// 기본 설정으로 디렉토리 로드
pub fn load_documents(dir: &Path) -> Result<LoadOutcome> {
    DocumentLoader::with_defaults().load_directory(dir)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tempfile::TempDir;

    #[test]
    fn test_file_type_from_extension() {
        assert_eq!(FileType::from_extension("md"), Some(FileType::Text));
        assert_eq!(FileType::from_extension("TXT"), Some(FileType::Text));
        assert_eq!(FileType::from_extension("docx"), Some(FileType::Docx));
        assert_eq!(FileType::from_extension("PDF"), Some(FileType::Pdf));
        assert_eq!(FileType::from_extension("png"), None);
    }

    #[test]
    fn test_load_directory_records_skipped_files() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("forwards.txt"), "A forward contract...").unwrap();
        std::fs::write(
            dir.path().join("options.docx"),
            docx::tests::build_docx(&["Options", "give the right, not the obligation."]),
        )
        .unwrap();
        std::fs::write(dir.path().join("broken.docx"), b"not a zip archive").unwrap();
        std::fs::write(dir.path().join("notes.csv"), "a,b,c").unwrap();

        let outcome = load_documents(dir.path()).unwrap();

        let ids: Vec<&str> = outcome.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["forwards.txt", "options.docx"]);
        assert_eq!(
            outcome.documents[1].raw_text,
            "Options\ngive the right, not the obligation."
        );

        assert_eq!(outcome.skipped.len(), 1);
        assert!(outcome.skipped[0].path.ends_with("broken.docx"));
    }

    #[test]
    fn test_crashing_pdf_is_skipped() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.txt"), "Forwards settle on a future date.").unwrap();
        std::fs::write(dir.path().join("b.txt"), "Futures are exchange traded.").unwrap();
        std::fs::write(dir.path().join("c.pdf"), pdf::tests::malformed_font_pdf()).unwrap();

        let outcome = load_documents(dir.path()).unwrap();

        let ids: Vec<&str> = outcome.documents.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["a.txt", "b.txt"]);
        assert_eq!(outcome.skipped.len(), 1);
        assert!(outcome.skipped[0].path.ends_with("c.pdf"));
    }

    #[test]
    fn test_empty_and_invalid_utf8_are_skipped() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("empty.txt"), "   \n\t").unwrap();
        std::fs::write(dir.path().join("binary.txt"), [0xff, 0xfe, 0x00, 0x80]).unwrap();

        let outcome = load_documents(dir.path()).unwrap();
        assert!(outcome.documents.is_empty());
        assert_eq!(outcome.skipped.len(), 2);
    }

    #[test]
    fn test_nested_document_id_uses_relative_path() {
        let dir = TempDir::new().unwrap();
        std::fs::create_dir(dir.path().join("swaps")).unwrap();
        std::fs::write(dir.path().join("swaps").join("irs.md"), "Interest rate swap").unwrap();

        let outcome = load_documents(dir.path()).unwrap();
        assert_eq!(outcome.documents[0].id, "swaps/irs.md");
        assert_eq!(outcome.documents[0].source, "irs.md");
    }

    #[test]
    fn test_file_over_size_limit_is_skipped() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("big.txt"), "x".repeat(64)).unwrap();

        let loader = DocumentLoader::new(LoaderConfig {
            max_file_size: 16,
            ..Default::default()
        });
        let outcome = loader.load_directory(dir.path()).unwrap();
        assert!(outcome.documents.is_empty());
        assert!(outcome.skipped[0].reason.contains("too large"));
    }

    #[test]
    fn test_missing_directory_is_error() {
        let dir = TempDir::new().unwrap();
        let result = load_documents(&dir.path().join("nope"));
        assert!(matches!(result, Err(ChatError::Config(_))));
    }
}
