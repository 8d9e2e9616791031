//! Text extraction with page-offset tracking
//!
//! Extraction is a capability lookup: a small closed set of document kinds
//! maps to extractors, and anything outside the set fails with
//! `UnsupportedType` instead of being string-checked ad hoc in the pipeline.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// Separator inserted between concatenated pages
const PAGE_SEPARATOR: char = '\n';

/// The character range within the concatenated text attributable to one page
///
/// Offsets are in characters, half-open `[start_char, end_char)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageSpan {
    /// 1-indexed page number
    pub page_number: u32,
    pub start_char: usize,
    pub end_char: usize,
}

/// Full extracted text plus its page-offset map
#[derive(Debug, Clone)]
pub struct ExtractedText {
    /// Pages joined with a single separator character
    pub text: String,
    /// Cumulative spans over `text`
    pub page_spans: Vec<PageSpan>,
}

/// Recognized document kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocumentKind {
    Pdf,
    PlainText,
    Markdown,
}

impl DocumentKind {
    /// Resolve from a declared MIME type
    pub fn from_mime(mime: &str) -> Option<Self> {
        match mime.split(';').next().unwrap_or("").trim() {
            "application/pdf" => Some(Self::Pdf),
            "text/plain" => Some(Self::PlainText),
            "text/markdown" => Some(Self::Markdown),
            _ => None,
        }
    }

    /// Resolve from a filename extension
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "pdf" => Some(Self::Pdf),
            "txt" | "text" => Some(Self::PlainText),
            "md" | "markdown" => Some(Self::Markdown),
            _ => None,
        }
    }

    /// Resolve from declared MIME type first, then the filename
    pub fn resolve(mime: &str, filename: &str) -> Option<Self> {
        if let Some(kind) = Self::from_mime(mime) {
            return Some(kind);
        }
        if let Some(kind) = mime_guess::from_path(filename)
            .first_raw()
            .and_then(Self::from_mime)
        {
            return Some(kind);
        }
        filename
            .rsplit('.')
            .next()
            .and_then(Self::from_extension)
    }
}

/// Trait for converting raw document bytes into text with page spans
pub trait TextExtractor: Send + Sync {
    fn extract(&self, raw: &[u8]) -> Result<ExtractedText>;

    /// Extractor name for logging
    fn name(&self) -> &str;
}

/// Join page texts into the concatenated representation with cumulative spans
fn assemble_pages(pages: Vec<(u32, String)>) -> ExtractedText {
    let mut text = String::new();
    let mut page_spans = Vec::with_capacity(pages.len());
    let mut offset = 0usize;

    for (i, (page_number, content)) in pages.into_iter().enumerate() {
        if i > 0 {
            text.push(PAGE_SEPARATOR);
            offset += 1;
        }
        let len = content.chars().count();
        page_spans.push(PageSpan {
            page_number,
            start_char: offset,
            end_char: offset + len,
        });
        text.push_str(&content);
        offset += len;
    }

    ExtractedText { text, page_spans }
}

/// PDF extractor producing per-page text via lopdf
pub struct PdfExtractor;

impl TextExtractor for PdfExtractor {
    fn extract(&self, raw: &[u8]) -> Result<ExtractedText> {
        let document = lopdf::Document::load_mem(raw)
            .map_err(|e| Error::UnsupportedType(format!("unreadable PDF: {e}")))?;

        let mut pages = Vec::new();
        for (page_number, _) in document.get_pages() {
            let content = match document.extract_text(&[page_number]) {
                Ok(content) => content.trim_end().to_string(),
                Err(e) => {
                    tracing::warn!(page_number, "page text extraction failed: {e}");
                    String::new()
                }
            };
            pages.push((page_number, content));
        }

        Ok(assemble_pages(pages))
    }

    fn name(&self) -> &str {
        "pdf"
    }
}

/// Extractor for plain text and markdown: the whole file is one page
pub struct PlainTextExtractor;

impl TextExtractor for PlainTextExtractor {
    fn extract(&self, raw: &[u8]) -> Result<ExtractedText> {
        let content = String::from_utf8_lossy(raw).into_owned();
        Ok(assemble_pages(vec![(1, content)]))
    }

    fn name(&self) -> &str {
        "plain-text"
    }
}

/// Capability registry mapping document kinds to extractors
pub struct ExtractorRegistry {
    extractors: HashMap<DocumentKind, Box<dyn TextExtractor>>,
}

impl ExtractorRegistry {
    /// Registry covering the supported kinds
    pub fn with_defaults() -> Self {
        let mut extractors: HashMap<DocumentKind, Box<dyn TextExtractor>> = HashMap::new();
        extractors.insert(DocumentKind::Pdf, Box::new(PdfExtractor));
        extractors.insert(DocumentKind::PlainText, Box::new(PlainTextExtractor));
        extractors.insert(DocumentKind::Markdown, Box::new(PlainTextExtractor));
        Self { extractors }
    }

    /// Extract text for a document, enforcing the supported-type and
    /// non-empty-content guards
    pub fn extract(&self, mime: &str, filename: &str, raw: &[u8]) -> Result<ExtractedText> {
        let kind = DocumentKind::resolve(mime, filename).ok_or_else(|| {
            Error::UnsupportedType(format!("'{filename}' (mime '{mime}') is not a supported type"))
        })?;
        let extractor = self.extractors.get(&kind).ok_or_else(|| {
            Error::UnsupportedType(format!("no extractor registered for {kind:?}"))
        })?;

        tracing::debug!(extractor = extractor.name(), filename, "extracting text");
        let extracted = extractor.extract(raw)?;

        if extracted.text.trim().is_empty() {
            return Err(Error::EmptyContent(format!(
                "'{filename}' parsed but produced no text"
            )));
        }
        Ok(extracted)
    }
}

impl Default for ExtractorRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
