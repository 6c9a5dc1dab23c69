//! Plain-text extraction from uploaded quiz source documents.

use std::io::Read;
use std::path::{Path, PathBuf};

use quick_xml::Reader;
use quick_xml::events::Event;

use crate::quiz::{QuizError, QuizResult};

const DOCX_BODY: &str = "word/document.xml";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentKind {
    Pdf,
    Word,
}

impl DocumentKind {
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "docx" => Some(Self::Word),
            _ => None,
        }
    }

    pub fn from_file_name(name: &str) -> Option<Self> {
        let (_, extension) = name.rsplit_once('.')?;
        Self::from_extension(extension)
    }

    pub fn extension(&self) -> &'static str {
        match self {
            Self::Pdf => "pdf",
            Self::Word => "docx",
        }
    }
}

/// Extracts the text of `path`. Empty output counts as a failure.
#[tracing::instrument]
pub async fn extract_text(path: PathBuf, kind: DocumentKind) -> QuizResult<String> {
    let text = tokio::task::spawn_blocking(move || match kind {
        DocumentKind::Pdf => extract_pdf(&path),
        DocumentKind::Word => extract_docx(&path),
    })
    .await??;

    if text.trim().is_empty() {
        return Err(QuizError::EmptyDocument);
    }

    tracing::debug!("extracted {} characters", text.len());
    Ok(text)
}

fn extract_pdf(path: &Path) -> QuizResult<String> {
    pdf_extract::extract_text(path).map_err(|e| QuizError::Extraction(e.to_string()))
}

fn extract_docx(path: &Path) -> QuizResult<String> {
    let file = std::fs::File::open(path)?;
    let mut archive =
        zip::ZipArchive::new(file).map_err(|e| QuizError::Extraction(e.to_string()))?;
    let mut body = archive
        .by_name(DOCX_BODY)
        .map_err(|e| QuizError::Extraction(e.to_string()))?;

    let mut raw = Vec::new();
    body.read_to_end(&mut raw)?;
    docx_body_text(&String::from_utf8_lossy(&raw))
}

/// Text runs of a WordprocessingML body, one line per paragraph.
fn docx_body_text(xml: &str) -> QuizResult<String> {
    let mut reader = Reader::from_str(xml);
    let mut out = String::new();
    let mut in_run_text = false;

    loop {
        match reader.read_event() {
            Ok(Event::Start(e)) if e.name().as_ref() == b"w:t" => in_run_text = true,
            Ok(Event::End(e)) => match e.name().as_ref() {
                b"w:t" => in_run_text = false,
                b"w:p" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Empty(e)) => match e.name().as_ref() {
                b"w:tab" => out.push('\t'),
                b"w:br" => out.push('\n'),
                _ => {}
            },
            Ok(Event::Text(t)) if in_run_text => {
                let text = t
                    .unescape()
                    .map_err(|e| QuizError::Extraction(e.to_string()))?;
                out.push_str(&text);
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(QuizError::Extraction(e.to_string())),
            _ => {}
        }
    }

    Ok(out)
}
