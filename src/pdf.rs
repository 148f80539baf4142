//! Per-page plain text from PDF files.

use std::fs;
use std::path::Path;

use lopdf::Document;
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// Text of every page, in page order. A page whose content stream cannot
/// be decoded contributes an empty string.
pub fn page_texts(path: &Path) -> Result<Vec<String>> {
    let data = fs::read(path)
        .map_err(|e| Error::extraction(format!("cannot read {}: {}", path.display(), e)))?;
    texts_from_bytes(&data, &path.display().to_string())
}

fn texts_from_bytes(data: &[u8], origin: &str) -> Result<Vec<String>> {
    let doc = Document::load_mem(data)
        .map_err(|e| Error::extraction(format!("cannot load {}: {}", origin, e)))?;
    Ok(texts_of(&doc))
}

fn texts_of(doc: &Document) -> Vec<String> {
    let pages: Vec<u32> = doc.get_pages().keys().copied().collect();
    debug!(pages = pages.len(), "extracting page text");
    pages
        .into_iter()
        .map(|page| match doc.extract_text(&[page]) {
            Ok(text) => text,
            Err(e) => {
                warn!(page, error = %e, "could not extract page text");
                String::new()
            }
        })
        .collect()
}
