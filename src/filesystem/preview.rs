//! Bounded text excerpts used as classification input

use std::fmt;
use std::path::Path;

use tokio::io::AsyncReadExt;

/// Outcome of a preview extraction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Preview {
    Text(String),
    /// Extension (with leading dot, lowercased) that has no extractor
    Unsupported(String),
    ReadError(String),
}

impl Preview {
    /// Extracted text, or an empty string when nothing could be read
    pub fn text(&self) -> &str {
        match self {
            Preview::Text(text) => text,
            Preview::Unsupported(_) | Preview::ReadError(_) => "",
        }
    }
}

impl fmt::Display for Preview {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Preview::Text(text) => f.write_str(text),
            Preview::Unsupported(ext) => write!(f, "[UNSUPPORTED EXTENSION] {}", ext),
            Preview::ReadError(detail) => write!(f, "[READ ERROR] {}", detail),
        }
    }
}

/// Lowercased extension with its leading dot, or empty
pub fn dotted_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| format!(".{}", e.to_lowercase()))
        .unwrap_or_default()
}

/// Extract at most `max_chars` characters of text from `path`
pub async fn extract_preview(path: &Path, max_chars: usize) -> Preview {
    let ext = dotted_extension(path);
    let result = match ext.as_str() {
        ".txt" | ".md" | ".log" => read_plain_text(path, max_chars).await,
        ".pdf" => read_pdf(path, max_chars).await,
        ".docx" => read_docx(path, max_chars).await,
        _ => return Preview::Unsupported(ext),
    };

    match result {
        Ok(text) => Preview::Text(text.trim().to_string()),
        Err(detail) => {
            tracing::debug!("Preview of {} failed: {}", path.display(), detail);
            Preview::ReadError(detail)
        }
    }
}

/// Text used for classification: like [`extract_preview`], but extensions
/// without an extractor are read as plain text
pub async fn extract_text(path: &Path, max_chars: usize) -> Preview {
    match extract_preview(path, max_chars).await {
        Preview::Unsupported(_) => match read_plain_text(path, max_chars).await {
            Ok(text) => Preview::Text(text.trim().to_string()),
            Err(detail) => Preview::ReadError(detail),
        },
        other => other,
    }
}

async fn read_plain_text(path: &Path, max_chars: usize) -> Result<String, String> {
    let file = tokio::fs::File::open(path)
        .await
        .map_err(|e| e.to_string())?;

    // A char is at most four UTF-8 bytes
    let mut buffer = Vec::new();
    file.take((max_chars as u64).saturating_mul(4))
        .read_to_end(&mut buffer)
        .await
        .map_err(|e| e.to_string())?;

    let text: String = String::from_utf8_lossy(&buffer)
        .chars()
        .filter(|c| *c != char::REPLACEMENT_CHARACTER)
        .take(max_chars)
        .collect();
    Ok(text)
}

async fn read_pdf(path: &Path, max_chars: usize) -> Result<String, String> {
    let bytes = tokio::fs::read(path).await.map_err(|e| e.to_string())?;
    let text = tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| e.to_string())?
        .map_err(|e| format!("PDF extraction failed: {}", e))?;
    Ok(truncate_chars(&text, max_chars))
}

async fn read_docx(path: &Path, max_chars: usize) -> Result<String, String> {
    let bytes = tokio::fs::read(path).await.map_err(|e| e.to_string())?;
    tokio::task::spawn_blocking(move || docx_paragraphs(&bytes, max_chars))
        .await
        .map_err(|e| e.to_string())?
}

/// Paragraph text, one per line, stopping once `max_chars` is reached
fn docx_paragraphs(bytes: &[u8], max_chars: usize) -> Result<String, String> {
    use docx_rs::{DocumentChild, ParagraphChild, RunChild};

    let docx = docx_rs::read_docx(bytes).map_err(|e| format!("DOCX parsing failed: {}", e))?;

    let mut text = String::new();
    let mut chars = 0usize;
    for child in &docx.document.children {
        if let DocumentChild::Paragraph(p) = child {
            let mut line = String::new();
            for paragraph_child in &p.children {
                if let ParagraphChild::Run(run) = paragraph_child {
                    for run_child in &run.children {
                        if let RunChild::Text(t) = run_child {
                            line.push_str(&t.text);
                        }
                    }
                }
            }
            if line.is_empty() {
                continue;
            }
            chars += line.chars().count() + 1;
            text.push_str(&line);
            text.push('\n');
            if chars >= max_chars {
                break;
            }
        }
    }

    Ok(truncate_chars(&text, max_chars))
}

fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
