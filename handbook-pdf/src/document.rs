//! Handbook document model
//!
//! The assembled handbook is a flat story: an ordered list of items that the
//! layout engine flows onto pages. Front matter (title page and table of
//! contents) uses an undecorated page template, the body uses a template with
//! a running header and page numbers.

use crate::blocks::ContentBlock;
use crate::fetcher::FetchFailure;

/// Page decoration applied from the next page on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageTemplate {
    /// Title page and table of contents: no header or footer
    Front,
    /// Handbook body: running header and page number footer
    Body,
}

/// One item of the story
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoryItem {
    /// Switch page template; takes effect on a new page
    NextTemplate(PageTemplate),
    /// The title page block
    TitlePage,
    /// Table of contents, filled from the layout registry
    TableOfContents,
    /// A configured section's heading (TOC and outline entry)
    SectionHeading(String),
    /// Extracted or placeholder content
    Block(ContentBlock),
    /// Explicit page break
    PageBreak,
}

/// Document metadata shown on the title page and embedded in the PDF
#[derive(Debug, Clone)]
pub struct DocumentMetadata {
    /// Document title
    pub title: String,
    /// Optional subtitle
    pub subtitle: Option<String>,
    /// PDF author
    pub author: Option<String>,
    /// Running header text on body pages
    pub header_text: String,
    /// Official online version, linked from the title page
    pub source_url: Option<String>,
    /// Human-readable capture timestamp
    pub captured: String,
}

/// Outcome of processing one configured section
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionStatus {
    /// Content was extracted into this many blocks
    Extracted(usize),
    /// The page could not be fetched
    FetchFailed(FetchFailure),
    /// The page was fetched but yielded no usable content
    NoContent,
}

/// Per-section processing summary
#[derive(Debug, Clone)]
pub struct SectionReport {
    /// Section title
    pub title: String,
    /// Source URL
    pub url: String,
    /// What happened while fetching and extracting
    pub status: SectionStatus,
}

/// The assembled handbook, ready for layout
#[derive(Debug, Clone)]
pub struct Handbook {
    /// Document metadata
    pub metadata: DocumentMetadata,
    /// Ordered story items
    pub story: Vec<StoryItem>,
    /// One report per configured section, in order
    pub sections: Vec<SectionReport>,
}

impl Handbook {
    /// Titles of all section headings, in story order
    pub fn section_headings(&self) -> Vec<&str> {
        self.story
            .iter()
            .filter_map(|item| match item {
                StoryItem::SectionHeading(title) => Some(title.as_str()),
                _ => None,
            })
            .collect()
    }

    /// Number of sections whose content could not be used
    pub fn failed_section_count(&self) -> usize {
        self.sections
            .iter()
            .filter(|s| !matches!(s.status, SectionStatus::Extracted(_)))
            .count()
    }

    /// Total word count of all content blocks
    pub fn word_count(&self) -> usize {
        self.story
            .iter()
            .map(|item| match item {
                StoryItem::Block(block) => block.word_count(),
                _ => 0,
            })
            .sum()
    }
}
