//! Document ingestion: text extraction and chunking

mod chunker;
mod extractor;

pub use chunker::{pages_for_span, ChunkSpan, TextChunker};
pub use extractor::{
    DocumentKind, ExtractedText, ExtractorRegistry, PageSpan, PdfExtractor, PlainTextExtractor,
    TextExtractor,
};
