//! Block-level content elements
//!
//! This module defines the structured representation of extracted page
//! content at the block level (headings, paragraphs, lists and spacers).

use itertools::Itertools;

/// Block-level content element derived from one HTML node
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContentBlock {
    /// An in-content heading (all HTML levels share one visual level)
    Heading(String),

    /// A paragraph of normalized text
    Paragraph(String),

    /// An ordered or unordered list
    List {
        /// Whether items are numbered (`<ol>`) rather than bulleted (`<ul>`)
        ordered: bool,
        /// Normalized text of each first-level item
        items: Vec<String>,
    },

    /// Small fixed-height vertical gap (from `<br>`)
    Spacer,
}

impl ContentBlock {
    /// Number of words carried by this block
    pub fn word_count(&self) -> usize {
        match self {
            ContentBlock::Heading(text) | ContentBlock::Paragraph(text) => {
                text.split_whitespace().count()
            }
            ContentBlock::List { items, .. } => {
                items.iter().map(|i| i.split_whitespace().count()).sum()
            }
            ContentBlock::Spacer => 0,
        }
    }
}

/// Normalize text taken from HTML
///
/// Non-breaking spaces become regular spaces, whitespace runs collapse to a
/// single space and the result is trimmed. Applying it twice is a no-op.
pub fn normalize_text(text: &str) -> String {
    text.replace('\u{a0}', " ").split_whitespace().join(" ")
}
