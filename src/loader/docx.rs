//! Word(.docx) 텍스트 추출
//!
//! OOXML 압축 파일에서 `word/document.xml`을 읽고,
//! 문단(`w:p`)마다 텍스트 런(`w:t`)을 이어 붙인 뒤 문단을 줄바꿈으로 연결합니다.

use std::io::{Cursor, Read};

use anyhow::{Context, Result};
use quick_xml::events::Event;
use quick_xml::Reader;

/// document.xml 최대 크기 (압축 해제 후)
const MAX_DOCUMENT_XML_BYTES: u64 = 50 * 1024 * 1024;

const DOCUMENT_XML: &str = "word/document.xml";

/// .docx 바이트에서 텍스트 추출
pub fn extract_text_from_docx(bytes: &[u8]) -> Result<String> {
    let mut archive =
        zip::ZipArchive::new(Cursor::new(bytes)).context("Not a valid .docx (zip) archive")?;

    let entry = archive
        .by_name(DOCUMENT_XML)
        .with_context(|| format!("{} not found in archive", DOCUMENT_XML))?;

    let mut xml = Vec::new();
    entry
        .take(MAX_DOCUMENT_XML_BYTES)
        .read_to_end(&mut xml)
        .with_context(|| format!("Failed to read {}", DOCUMENT_XML))?;

    if xml.len() as u64 >= MAX_DOCUMENT_XML_BYTES {
        anyhow::bail!("{} exceeds size limit", DOCUMENT_XML);
    }

    paragraphs_from_xml(&xml).map(|paragraphs| paragraphs.join("\n"))
}

/// document.xml에서 문단 텍스트 목록 추출
fn paragraphs_from_xml(xml: &[u8]) -> Result<Vec<String>> {
    let mut reader = Reader::from_reader(xml);
    reader.config_mut().trim_text(false);

    let mut paragraphs = Vec::new();
    // 열린 문단 (텍스트 상자 안의 문단은 바깥 문단 위에 쌓임)
    let mut open: Vec<String> = Vec::new();
    let mut in_text = false;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => match e.local_name().as_ref() {
                b"p" => open.push(String::new()),
                b"t" => in_text = true,
                _ => {}
            },
            Ok(Event::End(e)) => match e.local_name().as_ref() {
                b"p" => {
                    if let Some(paragraph) = open.pop() {
                        paragraphs.push(paragraph);
                    }
                }
                b"t" => in_text = false,
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.local_name().as_ref() {
                // 빈 문단
                b"p" => paragraphs.push(String::new()),
                b"tab" => {
                    if let Some(paragraph) = open.last_mut() {
                        paragraph.push('\t');
                    }
                }
                _ => {}
            },
            Ok(Event::Text(te)) if in_text => {
                let text = te.unescape().context("Invalid XML text")?;
                if let Some(paragraph) = open.last_mut() {
                    paragraph.push_str(&text);
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => anyhow::bail!("Malformed {}: {}", DOCUMENT_XML, e),
            _ => {}
        }
        buf.clear();
    }

    Ok(paragraphs)
}

// ============================================================================
// Tests
// ============================================================================
