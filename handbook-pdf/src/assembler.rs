//! Handbook assembly
//!
//! Sections are processed one at a time: fetch, extract, convert to blocks,
//! append to the story. A section that yields nothing still gets its heading
//! and a one-line notice, so the number and order of section headings always
//! matches the configuration.

use crate::blocks::ContentBlock;
use crate::document::{
    DocumentMetadata, Handbook, PageTemplate, SectionReport, SectionStatus, StoryItem,
};
use crate::extractor::ParsedPage;
use crate::fetcher::Fetch;
use crate::handbook_config::{HandbookConfig, SectionDescriptor};

/// Build the complete handbook story
///
/// # Parameters
/// * `config` - Handbook definition
/// * `fetcher` - Page source
/// * `captured` - Capture timestamp printed on the title page
///
/// # Returns
/// * `Handbook` - Front matter plus one section per configured entry
pub fn assemble(config: &HandbookConfig, fetcher: &dyn Fetch, captured: String) -> Handbook {
    let metadata = DocumentMetadata {
        title: config.title.clone(),
        subtitle: config.subtitle.clone(),
        author: config.author.clone(),
        header_text: config.running_header().to_string(),
        source_url: config.source_url.clone(),
        captured,
    };

    let mut story = vec![
        StoryItem::NextTemplate(PageTemplate::Front),
        StoryItem::TitlePage,
        StoryItem::PageBreak,
        StoryItem::TableOfContents,
        StoryItem::NextTemplate(PageTemplate::Body),
    ];
    let mut sections = Vec::with_capacity(config.sections.len());

    for (idx, section) in config.sections.iter().enumerate() {
        let (items, status) = process_section(section, fetcher);
        story.extend(items);
        sections.push(SectionReport {
            title: section.title.clone(),
            url: section.url.clone(),
            status,
        });

        if idx + 1 < config.sections.len() {
            story.push(StoryItem::PageBreak);
        }
    }

    Handbook {
        metadata,
        story,
        sections,
    }
}

/// Fetch and convert a single section
///
/// The section heading and a spacer always come first. Fetch failures and empty
/// extractions are logged separately but both end in a placeholder paragraph
/// naming the source URL.
pub fn process_section(
    section: &SectionDescriptor,
    fetcher: &dyn Fetch,
) -> (Vec<StoryItem>, SectionStatus) {
    println!("\nProcessing: {}", section.title);

    let mut items = vec![
        StoryItem::SectionHeading(section.title.clone()),
        StoryItem::Block(ContentBlock::Spacer),
    ];

    println!("  Fetching: {}", section.url);
    let page = match fetcher.fetch(&section.url) {
        Ok(page) => page,
        Err(failure) => {
            log::warn!("Fetch failed for '{}': {}", section.title, failure);
            println!("  Error fetching {}: {}", section.url, failure);
            items.push(placeholder(format!(
                "Could not retrieve content from {}",
                section.url
            )));
            return (items, SectionStatus::FetchFailed(failure));
        }
    };

    log::debug!("{}: {} bytes received", page.url, page.bytes.len());
    let parsed = ParsedPage::parse(&page.bytes, page.charset.as_deref());
    let region = parsed.main_content();
    match region.preview() {
        Some(snippet) => println!("  Preview: {}", snippet),
        None => println!("  Warning: no extractable text found for this section."),
    }

    let blocks = region.to_blocks();
    let status = if blocks.is_empty() {
        log::warn!(
            "No content blocks extracted for '{}' ({}, region '{}')",
            section.title,
            section.url,
            region.matched
        );
        items.push(placeholder(format!(
            "No readable content could be extracted from {}",
            section.url
        )));
        SectionStatus::NoContent
    } else {
        log::debug!(
            "'{}': {} blocks from region '{}'",
            section.title,
            blocks.len(),
            region.matched
        );
        let count = blocks.len();
        items.extend(blocks.into_iter().map(StoryItem::Block));
        SectionStatus::Extracted(count)
    };

    println!("  Added {} flowables", items.len());
    (items, status)
}

fn placeholder(text: String) -> StoryItem {
    StoryItem::Block(ContentBlock::Paragraph(text))
}
