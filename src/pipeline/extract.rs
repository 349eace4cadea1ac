//! PDF text extraction and cleaning.
//!
//! Pages that mention common front-matter headings are dropped wholesale before the surviving
//! text is normalized into a single whitespace-collapsed line.

use super::types::{ExtractedDocument, ExtractionError};
use lopdf::Document;
use regex::Regex;
use std::sync::LazyLock;

/// Substrings that mark a page as front matter. Matching is exact and case-sensitive.
pub const FRONT_MATTER_MARKERS: &[&str] = &[
    "CONTENTS",
    "Contents",
    "contents",
    "PREFACE",
    "Preface",
    "preface",
    "ILLUSTRATIONS",
    "Illustrations",
    "illustrations",
    "COPYRIGHT INFORMATION",
    "Copyright Information",
    "copyright information",
    "FOREWORD",
    "Foreword",
    "foreword",
    "ACKNOWLEDGEMENTS",
    "Acknowledgments",
    "acknowledgments",
];

static COPYRIGHT_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"©.*").expect("valid regex"));
static FONT_CODE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/[A-Z0-9]+").expect("valid regex"));
static URL: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"https?://\S+").expect("valid regex"));

/// Extract the text of every page in a PDF, in page order.
///
/// Pages whose text cannot be decoded are returned as empty strings so a single bad page does
/// not sink the document.
pub fn extract_pages(bytes: &[u8]) -> Result<Vec<String>, ExtractionError> {
    let document =
        Document::load_mem(bytes).map_err(|error| ExtractionError::Unreadable(error.to_string()))?;
    let pages = document.get_pages();
    if pages.is_empty() {
        return Err(ExtractionError::NoPages);
    }

    Ok(pages
        .keys()
        .map(|&page_number| match document.extract_text(&[page_number]) {
            Ok(text) => text,
            Err(error) => {
                tracing::warn!(page_number, error = %error, "Failed to extract page text");
                String::new()
            }
        })
        .collect())
}

/// Whether a page carries one of the front-matter markers.
pub fn is_front_matter(page: &str) -> bool {
    FRONT_MATTER_MARKERS
        .iter()
        .any(|marker| page.contains(marker))
}

/// Normalize extracted text.
///
/// In order: newlines and carriage returns become spaces, everything from a `©` onward is
/// removed, slash-prefixed font codes and URLs are stripped, and whitespace runs collapse to a
/// single space.
pub fn clean_text(text: &str) -> String {
    let text = text.replace(['\n', '\r'], " ");
    let text = COPYRIGHT_RUN.replace_all(&text, "");
    let text = FONT_CODE.replace_all(&text, "");
    let text = URL.replace_all(&text, "");
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Build an [`ExtractedDocument`] from already-extracted page texts.
pub fn assemble_document(pages: Vec<String>) -> Result<ExtractedDocument, ExtractionError> {
    if pages.is_empty() {
        return Err(ExtractionError::NoPages);
    }
    if pages.iter().all(|page| page.trim().is_empty()) {
        return Err(ExtractionError::EmptyDocument);
    }

    let page_count = pages.len();
    let kept: Vec<String> = pages
        .into_iter()
        .filter(|page| !is_front_matter(page))
        .collect();
    let pages_kept = kept.len();
    let extracted = kept.concat();
    let cleaned = clean_text(&extracted);

    tracing::debug!(
        page_count,
        pages_kept,
        cleaned_chars = cleaned.len(),
        "Extracted document text"
    );
    Ok(ExtractedDocument {
        page_count,
        pages_kept,
        extracted,
        cleaned,
    })
}

/// Extract and clean a PDF in one step.
pub fn extract_document(bytes: &[u8]) -> Result<ExtractedDocument, ExtractionError> {
    assemble_document(extract_pages(bytes)?)
}
