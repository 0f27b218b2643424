//! Main-content extraction from fetched HTML
//!
//! A page is parsed, stripped of navigation and script noise, and narrowed to
//! its main content region. That region is then walked into an ordered list
//! of [`ContentBlock`]s.
//!
//! The selectors are tuned for WordPress/Elementor sites and common article
//! layouts.

use crate::blocks::{normalize_text, ContentBlock};
use encoding_rs::{Encoding, UTF_8};
use itertools::Itertools;
use scraper::{ElementRef, Html, Selector};

/// Elements removed from the document before any region is selected
const DENYLIST: &str = "nav, header, footer, script, style, form, noscript";

/// Content region selectors, most specific first
const REGION_SELECTORS: &[&str] = &[
    "article",
    ".entry-content",
    ".post-content",
    ".elementor-widget-theme-post-content",
    ".elementor-location-single",
    "main",
    "#main-content",
    "body",
];

/// Maximum number of characters shown in a console preview
pub const PREVIEW_CHARS: usize = 180;

/// A parsed and cleaned HTML page
pub struct ParsedPage {
    html: Html,
}

/// The element chosen as a page's main content
#[derive(Debug, Clone, Copy)]
pub struct ContentRegion<'a> {
    /// Root element of the region
    pub element: ElementRef<'a>,
    /// Selector that matched, or `"document"` for the whole-page fallback
    pub matched: &'static str,
}

/// One entry of the region fallback chain
struct RegionRule {
    name: &'static str,
    selector: Selector,
}

impl RegionRule {
    /// First element matching this rule whose text is non-empty
    fn find<'a>(&self, html: &'a Html) -> Option<ElementRef<'a>> {
        html.select(&self.selector)
            .next()
            .filter(|el| !element_text(*el).is_empty())
    }
}

fn region_rules() -> Vec<RegionRule> {
    REGION_SELECTORS
        .iter()
        .filter_map(|&name| match Selector::parse(name) {
            Ok(selector) => Some(RegionRule { name, selector }),
            Err(e) => {
                log::error!("Invalid region selector '{}': {:?}", name, e);
                None
            }
        })
        .collect()
}

impl ParsedPage {
    /// Decode, parse and clean a page body
    ///
    /// # Parameters
    /// * `bytes` - Raw response body
    /// * `charset` - Charset label from the `Content-Type` header, if any
    ///
    /// # Returns
    /// * `ParsedPage` - The page with every denylisted element detached
    pub fn parse(bytes: &[u8], charset: Option<&str>) -> Self {
        let encoding = charset
            .and_then(|label| Encoding::for_label(label.as_bytes()))
            .unwrap_or(UTF_8);
        let (text, used, had_errors) = encoding.decode(bytes);
        if had_errors {
            log::debug!("Malformed {} sequences replaced while decoding", used.name());
        }

        let mut html = Html::parse_document(&text);
        strip_denylisted(&mut html);
        Self { html }
    }

    /// Locate the main content region
    ///
    /// Region rules are tried in order; the first one whose first match has
    /// non-empty text wins. Without a match the whole cleaned document is used.
    pub fn main_content(&self) -> ContentRegion<'_> {
        for rule in region_rules() {
            if let Some(element) = rule.find(&self.html) {
                log::debug!("Main content matched '{}'", rule.name);
                return ContentRegion {
                    element,
                    matched: rule.name,
                };
            }
        }

        log::debug!("No content region matched, using the whole document");
        ContentRegion {
            element: self.html.root_element(),
            matched: "document",
        }
    }
}

impl ContentRegion<'_> {
    /// Normalized text of the whole region
    pub fn text(&self) -> String {
        element_text(self.element)
    }

    /// Console preview: the first [`PREVIEW_CHARS`] characters, `...` when cut
    pub fn preview(&self) -> Option<String> {
        let text = self.text();
        if text.is_empty() {
            return None;
        }
        if text.chars().count() > PREVIEW_CHARS {
            let snippet: String = text.chars().take(PREVIEW_CHARS).collect();
            Some(format!("{}...", snippet))
        } else {
            Some(text)
        }
    }

    /// Convert the region into content blocks
    pub fn to_blocks(&self) -> Vec<ContentBlock> {
        to_blocks(self.element)
    }
}

fn strip_denylisted(html: &mut Html) {
    let Ok(denylist) = Selector::parse(DENYLIST) else {
        log::error!("Invalid denylist selector '{}'", DENYLIST);
        return;
    };

    let ids: Vec<_> = html.select(&denylist).map(|el| el.id()).collect();
    log::debug!("Removing {} navigation/script elements", ids.len());
    for id in ids {
        if let Some(mut node) = html.tree.get_mut(id) {
            node.detach();
        }
    }
}

/// How an element is converted into blocks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagCategory {
    /// `h2`..`h6`
    Heading,
    /// `p`
    Paragraph,
    /// `ul` / `ol`
    List { ordered: bool },
    /// `br`
    LineBreak,
    /// Dropped with all descendants
    Suppressed,
    /// Wrapper whose children are visited
    Transparent,
}

impl TagCategory {
    fn of(name: &str) -> Self {
        match name {
            "h2" | "h3" | "h4" | "h5" | "h6" => TagCategory::Heading,
            "p" => TagCategory::Paragraph,
            "ul" => TagCategory::List { ordered: false },
            "ol" => TagCategory::List { ordered: true },
            "br" => TagCategory::LineBreak,
            "script" | "style" | "nav" | "header" | "footer" | "noscript" => {
                TagCategory::Suppressed
            }
            _ => TagCategory::Transparent,
        }
    }
}

/// Walk an element tree into content blocks
///
/// Text is only captured through a heading, paragraph or list item; bare text
/// nodes contribute nothing on their own.
pub fn to_blocks(element: ElementRef<'_>) -> Vec<ContentBlock> {
    let mut blocks = Vec::new();
    collect_blocks(element, &mut blocks);
    blocks
}

fn collect_blocks(element: ElementRef<'_>, blocks: &mut Vec<ContentBlock>) {
    match TagCategory::of(element.value().name()) {
        TagCategory::Heading => {
            let text = element_text(element);
            if text.chars().count() > 1 {
                blocks.push(ContentBlock::Heading(text));
            }
        }
        TagCategory::Paragraph => {
            let text = element_text(element);
            if text.chars().count() > 1 && !inside_list(element) {
                blocks.push(ContentBlock::Paragraph(text));
            }
        }
        TagCategory::List { ordered } => {
            let items: Vec<String> = child_elements(element)
                .filter(|child| child.value().name() == "li")
                .map(element_text)
                .filter(|text| !text.is_empty())
                .collect();
            if !items.is_empty() {
                blocks.push(ContentBlock::List { ordered, items });
            }
        }
        TagCategory::LineBreak => blocks.push(ContentBlock::Spacer),
        TagCategory::Suppressed => {}
        TagCategory::Transparent => {
            for child in child_elements(element) {
                collect_blocks(child, blocks);
            }
        }
    }
}

fn child_elements<'a>(element: ElementRef<'a>) -> impl Iterator<Item = ElementRef<'a>> {
    element.children().filter_map(ElementRef::wrap)
}

fn inside_list(element: ElementRef<'_>) -> bool {
    element
        .ancestors()
        .filter_map(ElementRef::wrap)
        .any(|a| matches!(a.value().name(), "ul" | "ol"))
}

/// Normalized text of an element and its descendants
fn element_text(element: ElementRef<'_>) -> String {
    normalize_text(&element.text().join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn blocks_of(html: &str) -> Vec<ContentBlock> {
        let page = ParsedPage::parse(html.as_bytes(), None);
        page.main_content().to_blocks()
    }

    #[test]
    fn test_denylisted_elements_are_removed() {
        let html = r#"<html><body>
            <nav><p>Menu entry</p></nav>
            <header><h2>Site banner</h2></header>
            <div><p>Real content here.</p><script>var x = "hidden";</script></div>
            <form><p>Search the site</p></form>
            <footer><p>Copyright</p></footer>
        </body></html>"#;

        let page = ParsedPage::parse(html.as_bytes(), None);
        let region = page.main_content();

        assert_eq!(region.matched, "body");
        assert_eq!(region.text(), "Real content here.");
        assert_eq!(
            region.to_blocks(),
            vec![ContentBlock::Paragraph("Real content here.".to_string())]
        );
    }

    #[test]
    fn test_article_preferred_over_body() {
        let html = r#"<html><body>
            <p>Sidebar teaser</p>
            <article><p>The article text.</p></article>
        </body></html>"#;

        let page = ParsedPage::parse(html.as_bytes(), None);
        let region = page.main_content();

        assert_eq!(region.matched, "article");
        assert_eq!(
            region.to_blocks(),
            vec![ContentBlock::Paragraph("The article text.".to_string())]
        );
    }

    #[test]
    fn test_empty_region_falls_through_to_next_rule() {
        let html = r#"<html><body>
            <article>   </article>
            <div class="entry-content"><p>Entry body text.</p></div>
        </body></html>"#;

        let page = ParsedPage::parse(html.as_bytes(), None);
        assert_eq!(page.main_content().matched, ".entry-content");
    }

    #[test]
    fn test_elementor_post_content() {
        let html = r#"<html><body>
            <div class="elementor-location-single">
              <div class="elementor-widget-theme-post-content"><h3>Buddy System</h3></div>
            </div>
        </body></html>"#;

        let page = ParsedPage::parse(html.as_bytes(), None);
        let region = page.main_content();
        assert_eq!(region.matched, ".elementor-widget-theme-post-content");
        assert_eq!(
            region.to_blocks(),
            vec![ContentBlock::Heading("Buddy System".to_string())]
        );
    }

    #[test]
    fn test_empty_page_falls_back_to_document() {
        let page = ParsedPage::parse(b"<html><body><nav>Only nav</nav></body></html>", None);
        let region = page.main_content();
        assert_eq!(region.matched, "document");
        assert!(region.preview().is_none());
        assert!(region.to_blocks().is_empty());
    }

    #[test]
    fn test_headings_collapse_and_short_ones_drop() {
        let blocks = blocks_of(
            "<body><h1>Page Title</h1><h2>A</h2><h4>  Swim\u{a0} Test </h4><h6>Lifeguards</h6></body>",
        );
        assert_eq!(
            blocks,
            vec![
                ContentBlock::Heading("Swim Test".to_string()),
                ContentBlock::Heading("Lifeguards".to_string()),
            ]
        );
    }

    #[test]
    fn test_paragraph_minimum_length() {
        let blocks = blocks_of("<body><p>x</p><p> ok </p><p></p></body>");
        assert_eq!(blocks, vec![ContentBlock::Paragraph("ok".to_string())]);
    }

    #[test]
    fn test_paragraph_text_includes_inline_markup() {
        let blocks =
            blocks_of("<body><p>Always <strong>swim</strong> with a <a href='#'>buddy</a>.</p></body>");
        assert_eq!(
            blocks,
            vec![ContentBlock::Paragraph(
                "Always swim with a buddy .".to_string()
            )]
        );
    }

    #[test]
    fn test_lists() {
        let blocks = blocks_of(
            "<body><ul><li>First</li><li> Second </li></ul><ol><li>One</li></ol></body>",
        );
        assert_eq!(
            blocks,
            vec![
                ContentBlock::List {
                    ordered: false,
                    items: vec!["First".to_string(), "Second".to_string()],
                },
                ContentBlock::List {
                    ordered: true,
                    items: vec!["One".to_string()],
                },
            ]
        );
    }

    #[test]
    fn test_list_without_items_emits_nothing() {
        let blocks = blocks_of("<body><ul><li>  </li><li>\u{a0}</li></ul><ol></ol></body>");
        assert!(blocks.is_empty());
    }

    #[test]
    fn test_nested_list_items_stay_in_their_parent_item() {
        let blocks = blocks_of(
            "<body><ul><li>Outer <ul><li>Inner A</li><li>Inner B</li></ul></li><li>Second</li></ul></body>",
        );
        assert_eq!(
            blocks,
            vec![ContentBlock::List {
                ordered: false,
                items: vec!["Outer Inner A Inner B".to_string(), "Second".to_string()],
            }]
        );
    }

    #[test]
    fn test_paragraphs_inside_lists_are_not_separate_blocks() {
        let blocks = blocks_of("<body><ul><li><p>Item paragraph</p></li></ul></body>");
        assert_eq!(
            blocks,
            vec![ContentBlock::List {
                ordered: false,
                items: vec!["Item paragraph".to_string()],
            }]
        );
    }

    #[test]
    fn test_paragraph_walk_started_inside_list_is_skipped() {
        let page = ParsedPage::parse(b"<body><ol><li><p>Inside</p></li></ol></body>", None);
        let selector = Selector::parse("p").unwrap();
        let p = page.html.select(&selector).next().unwrap();
        assert!(to_blocks(p).is_empty());
    }

    #[test]
    fn test_line_break_and_wrappers() {
        let blocks = blocks_of(
            "<body><div><section><p>Before</p><br><span>loose text</span><p>After</p></section></div></body>",
        );
        assert_eq!(
            blocks,
            vec![
                ContentBlock::Paragraph("Before".to_string()),
                ContentBlock::Spacer,
                ContentBlock::Paragraph("After".to_string()),
            ]
        );
    }

    #[test]
    fn test_suppressed_subtree_inside_region() {
        let page = ParsedPage::parse(b"<body><div><p>Kept</p></div></body>", None);
        let selector = Selector::parse("body").unwrap();
        let body = page.html.select(&selector).next().unwrap();
        assert_eq!(TagCategory::of("noscript"), TagCategory::Suppressed);
        assert_eq!(
            to_blocks(body),
            vec![ContentBlock::Paragraph("Kept".to_string())]
        );
    }

    #[test]
    fn test_preview_truncates() {
        let long = "word ".repeat(100);
        let html = format!("<body><p>{}</p></body>", long);
        let page = ParsedPage::parse(html.as_bytes(), None);
        let preview = page.main_content().preview().unwrap();

        assert!(preview.ends_with("..."));
        assert_eq!(preview.chars().count(), PREVIEW_CHARS + 3);
    }

    #[test]
    fn test_declared_charset_is_honoured() {
        // "Café" in windows-1252
        let bytes = b"<body><p>Caf\xe9 menu</p></body>";
        let page = ParsedPage::parse(bytes, Some("windows-1252"));
        assert_eq!(
            page.main_content().to_blocks(),
            vec![ContentBlock::Paragraph("Café menu".to_string())]
        );
    }
}
