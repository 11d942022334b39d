//! PDF 텍스트 추출 모듈
//!
//! pdf-extract 크레이트를 사용하여 PDF에서 텍스트를 추출합니다.
//! pdf-extract는 잘못된 폰트 사전 등에서 에러 대신 panic하므로
//! 추출 호출을 `catch_unwind`로 격리해 해당 파일만 실패로 처리합니다.

use std::panic::{catch_unwind, AssertUnwindSafe};

use anyhow::{Context, Result};

/// PDF 바이트에서 텍스트 추출
///
/// 폼피드(`\x0c`)로 나뉜 페이지는 빈 줄로 이어 붙입니다.
/// 텍스트 레이어가 없는 PDF(스캔 문서)는 빈 문자열을 돌려줍니다.
pub fn extract_text_from_pdf(bytes: &[u8]) -> Result<String> {
    let text = isolate_panic(|| pdf_extract::extract_text_from_mem(bytes))?
        .context("Failed to extract text from PDF")?;

    if text.trim().is_empty() {
        tracing::warn!("No text extracted from PDF. It might be a scanned document.");
        return Ok(String::new());
    }

    Ok(join_pages(&text))
}

/// panic을 에러로 변환
fn isolate_panic<T>(f: impl FnOnce() -> T) -> Result<T> {
    catch_unwind(AssertUnwindSafe(f)).map_err(|payload| {
        let message = payload
            .downcast_ref::<&str>()
            .map(|s| s.to_string())
            .or_else(|| payload.downcast_ref::<String>().cloned())
            .unwrap_or_else(|| "unknown panic".to_string());
        tracing::warn!("PDF parser panicked: {}", message);
        anyhow::anyhow!("PDF parser crashed: {}", message)
    })
}

/// 페이지 구분(폼피드)을 문단 구분으로 변환
fn join_pages(text: &str) -> String {
    text.split('\x0c')
        .map(str::trim)
        .filter(|page| !page.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

// ============================================================================
// Tests
// ============================================================================
