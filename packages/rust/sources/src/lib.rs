//! Grounding sources: PDF documents and web pages.
//!
//! This crate provides:
//! - [`document`]: [`SourceLoader`], a cached, bounded PDF text reader
//! - [`web`]: [`SourceFetcher`], a single-shot page fetcher with visible-text extraction

pub mod document;
pub mod web;

pub use document::{DocumentCache, DocumentExtractor, PdfExtractor, SourceLoader};
pub use web::{SourceFetcher, normalize_url, visible_text};
