//! Typst-based handbook layout and PDF export
//!
//! The handbook story is turned into Typst markup and compiled repeatedly.
//! The table of contents needs the page of every section heading, which is
//! only known after a full pagination pass, so every pass renders the TOC with
//! the pages resolved by the previous one. Each pass owns a fresh
//! [`LayoutPass`] context: its heading counter restarts at one, which keeps the
//! bookmark keys (`sec_1`, `sec_2`, ...) stable from pass to pass.
//!
//! Section headings are level-1 Typst headings; typst-pdf turns them into the
//! top level of the PDF outline. In-content headings are excluded from both
//! the TOC and the outline.

use crate::blocks::ContentBlock;
use crate::document::{Handbook, PageTemplate, StoryItem};
use std::path::Path;
use std::sync::OnceLock;
use thiserror::Error;
use typst::diag::{FileError, FileResult};
use typst::foundations::{Bytes, Datetime, Label};
use typst::layout::PagedDocument;
use typst::syntax::{FileId, Source, VirtualPath};
use typst::text::{Font, FontBook};
use typst::utils::{LazyHash, PicoStr};
use typst::{Library, World};
use typst_kit::fonts::{FontSearcher, FontSlot};

/// Upper bound on layout passes before giving up
pub const MAX_PASSES: usize = 10;

/// Fonts tried in order for body text; the last one ships with typst-kit
const TEXT_FONTS: &[&str] = &[
    "Helvetica",
    "Liberation Sans",
    "Arial",
    "DejaVu Sans",
    "Libertinus Serif",
];

/// Layout and export errors
#[derive(Error, Debug)]
pub enum LayoutError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Typst compilation failed: {0}")]
    CompilationError(String),

    #[error("PDF export failed: {0}")]
    ExportError(String),

    #[error("Font loading error: {0}")]
    FontError(String),

    #[error("Section heading '{key}' could not be located: {message}")]
    MissingHeading { key: String, message: String },

    #[error("Expected {expected} section headings, layout produced {found}")]
    HeadingMismatch { expected: usize, found: usize },

    #[error("Table of contents did not settle after {0} passes")]
    Unstable(usize),
}

/// One table of contents / outline entry
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    /// Section title, verbatim
    pub title: String,
    /// Bookmark key, also the Typst label of the heading
    pub key: String,
    /// 1-based physical page the heading renders on, once resolved
    pub page: Option<usize>,
}

/// Per-pass layout state
///
/// Created fresh at the start of every pass, never shared between passes.
#[derive(Debug)]
pub struct LayoutPass {
    number: usize,
    heading_counter: usize,
    registry: Vec<TocEntry>,
}

impl LayoutPass {
    /// Start pass `number` (1-based) with an empty registry
    pub fn new(number: usize) -> Self {
        Self {
            number,
            heading_counter: 0,
            registry: Vec::new(),
        }
    }

    /// Register the next section heading and return its bookmark key
    pub fn register_heading(&mut self, title: &str) -> String {
        self.heading_counter += 1;
        let key = section_key(self.heading_counter);
        self.registry.push(TocEntry {
            title: title.to_string(),
            key: key.clone(),
            page: None,
        });
        key
    }

    /// Entries registered so far
    pub fn entries(&self) -> &[TocEntry] {
        &self.registry
    }

    /// Fill in the page of every registered heading from a compiled document
    fn resolve_pages(&mut self, document: &PagedDocument) -> Result<(), LayoutError> {
        for entry in &mut self.registry {
            let missing = |message: String| LayoutError::MissingHeading {
                key: entry.key.clone(),
                message,
            };
            let label = Label::new(PicoStr::intern(&entry.key));
            let content = document
                .introspector
                .query_label(label)
                .map_err(|e| missing(e.to_string()))?;
            let location = content
                .location()
                .ok_or_else(|| missing("heading has no location".to_string()))?;
            entry.page = Some(document.introspector.page(location).get());
        }
        Ok(())
    }

    fn into_entries(self) -> Vec<TocEntry> {
        self.registry
    }
}

/// Bookmark key of the `n`-th section heading (1-based)
pub fn section_key(n: usize) -> String {
    format!("sec_{}", n)
}

/// Summary of a finished layout
#[derive(Debug, Clone)]
pub struct LayoutReport {
    /// Total number of pages
    pub pages: usize,
    /// Number of layout passes run
    pub passes: usize,
    /// Final TOC / outline entries, one per section, pages resolved
    pub entries: Vec<TocEntry>,
}

/// Static library instance (created once, reused)
static LIBRARY: OnceLock<LazyHash<Library>> = OnceLock::new();

/// Get or create the standard library
fn get_library() -> &'static LazyHash<Library> {
    LIBRARY.get_or_init(|| LazyHash::new(Library::builder().build()))
}

/// The World implementation for handbook layout
///
/// Serves the generated markup as the only source file, plus the fonts found
/// by typst-kit (embedded fonts, and system fonts when enabled).
struct HandbookWorld {
    main_source: Source,
    font_book: LazyHash<FontBook>,
    fonts: Vec<FontSlot>,
}

impl HandbookWorld {
    fn new(system_fonts: bool) -> Result<Self, LayoutError> {
        let found = FontSearcher::new()
            .include_system_fonts(system_fonts)
            .search();
        if found.fonts.is_empty() {
            return Err(LayoutError::FontError(
                "No fonts could be loaded".to_string(),
            ));
        }
        log::debug!("{} font faces available", found.fonts.len());

        let main_id = FileId::new(None, VirtualPath::new("main.typ"));
        Ok(Self {
            main_source: Source::new(main_id, String::new()),
            font_book: LazyHash::new(found.book),
            fonts: found.fonts,
        })
    }

    /// Replace the markup compiled by the next pass
    fn set_markup(&mut self, markup: String) {
        self.main_source = Source::new(self.main_source.id(), markup);
    }

    fn compile(&self) -> Result<PagedDocument, LayoutError> {
        let result = typst::compile::<PagedDocument>(self);
        for warning in &result.warnings {
            log::debug!("typst warning: {}", warning.message);
        }
        result.output.map_err(|errors| {
            let error_msgs: Vec<String> = errors
                .iter()
                .map(|e| format!("{}: {}", self.error_location(e), e.message))
                .collect();
            LayoutError::CompilationError(error_msgs.join("\n"))
        })
    }

    /// Format the markup line/column of a diagnostic
    fn error_location(&self, error: &typst::diag::SourceDiagnostic) -> String {
        let Some(range) = self.main_source.range(error.span) else {
            return "main.typ".to_string();
        };
        let line = self.main_source.byte_to_line(range.start).unwrap_or(0) + 1;
        let col = self.main_source.byte_to_column(range.start).unwrap_or(0) + 1;
        format!("main.typ:{}:{}", line, col)
    }
}

impl World for HandbookWorld {
    fn library(&self) -> &LazyHash<Library> {
        get_library()
    }

    fn book(&self) -> &LazyHash<FontBook> {
        &self.font_book
    }

    fn main(&self) -> FileId {
        self.main_source.id()
    }

    fn source(&self, id: FileId) -> FileResult<Source> {
        if id == self.main_source.id() {
            Ok(self.main_source.clone())
        } else {
            Err(FileError::NotFound(id.vpath().as_rootless_path().into()))
        }
    }

    fn file(&self, id: FileId) -> FileResult<Bytes> {
        Err(FileError::NotFound(id.vpath().as_rootless_path().into()))
    }

    fn font(&self, index: usize) -> Option<Font> {
        self.fonts.get(index)?.get()
    }

    fn today(&self, offset: Option<i64>) -> Option<Datetime> {
        use chrono::Datelike;

        let now = match offset {
            None => chrono::Local::now().naive_local(),
            Some(hours) => (chrono::Utc::now() + chrono::Duration::hours(hours)).naive_utc(),
        };
        Datetime::from_ymd(
            now.year(),
            now.month().try_into().ok()?,
            now.day().try_into().ok()?,
        )
    }
}

/// Layout options
#[derive(Debug, Clone, Copy)]
pub struct LayoutOptions {
    /// Also search the system font directories
    pub system_fonts: bool,
}

impl Default for LayoutOptions {
    fn default() -> Self {
        Self { system_fonts: true }
    }
}

/// Lay out a handbook and write it as PDF
///
/// # Parameters
/// * `handbook` - The assembled handbook
/// * `output_path` - Path where the PDF file will be written
/// * `options` - Font discovery options
///
/// # Returns
/// * `Ok(LayoutReport)` - PDF written; pages, passes and final TOC entries
/// * `Err(LayoutError)` - Compilation, convergence, export or IO failure
pub fn to_pdf(
    handbook: &Handbook,
    output_path: &Path,
    options: LayoutOptions,
) -> Result<LayoutReport, LayoutError> {
    let (document, report) = layout(handbook, options)?;

    let pdf_bytes = typst_pdf::pdf(&document, &typst_pdf::PdfOptions::default())
        .map_err(|e| LayoutError::ExportError(format!("{:?}", e)))?;

    if let Some(parent) = output_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(output_path, pdf_bytes)?;

    comemo::evict(10);
    Ok(report)
}

/// Run layout passes until the table of contents is stable
///
/// At least two passes always run: the first one cannot know any page
/// numbers. A pass is final once its resolved pages equal those it rendered
/// into the TOC.
pub fn layout(
    handbook: &Handbook,
    options: LayoutOptions,
) -> Result<(PagedDocument, LayoutReport), LayoutError> {
    let mut world = HandbookWorld::new(options.system_fonts)?;
    let expected = handbook.section_headings();

    // Entries rendered into the first pass's TOC: keys known, pages unknown.
    let mut toc: Vec<TocEntry> = expected
        .iter()
        .enumerate()
        .map(|(idx, title)| TocEntry {
            title: title.to_string(),
            key: section_key(idx + 1),
            page: None,
        })
        .collect();

    for number in 1..=MAX_PASSES {
        let mut pass = LayoutPass::new(number);
        world.set_markup(generate_typst_markup(handbook, &mut pass, &toc));
        let document = world.compile()?;

        if pass.entries().len() != handbook.sections.len() {
            return Err(LayoutError::HeadingMismatch {
                expected: handbook.sections.len(),
                found: pass.entries().len(),
            });
        }
        pass.resolve_pages(&document)?;
        log::debug!(
            "Layout pass {}: {} pages, headings on {:?}",
            pass.number,
            document.pages.len(),
            pass.entries().iter().map(|e| e.page).collect::<Vec<_>>()
        );

        let entries = pass.into_entries();
        if entries == toc {
            log::info!("Layout settled after {} passes", number);
            let report = LayoutReport {
                pages: document.pages.len(),
                passes: number,
                entries,
            };
            return Ok((document, report));
        }
        toc = entries;
    }

    Err(LayoutError::Unstable(MAX_PASSES))
}

/// Generate the Typst markup for one pass
///
/// # Parameters
/// * `handbook` - The assembled handbook
/// * `pass` - Context of the pass; section headings are registered as they are emitted
/// * `toc` - Entries shown in the table of contents (pages from the previous pass)
fn generate_typst_markup(handbook: &Handbook, pass: &mut LayoutPass, toc: &[TocEntry]) -> String {
    let mut output = generate_preamble(handbook);

    for item in &handbook.story {
        match item {
            StoryItem::NextTemplate(template) => output.push_str(&generate_template(*template)),
            StoryItem::TitlePage => output.push_str(&generate_title_page(handbook)),
            StoryItem::TableOfContents => output.push_str(&generate_toc(toc)),
            StoryItem::SectionHeading(title) => {
                let key = pass.register_heading(title);
                output.push_str(&format!(
                    "#heading(level: 1, bookmarked: true, \"{}\") <{}>\n\n",
                    escape_typst_string(title),
                    key
                ));
            }
            StoryItem::Block(block) => output.push_str(&generate_block(block)),
            StoryItem::PageBreak => output.push_str("#pagebreak(weak: true)\n\n"),
        }
    }

    output
}

/// Document setup, styles and helper definitions
fn generate_preamble(handbook: &Handbook) -> String {
    let meta = &handbook.metadata;
    let mut preamble = String::new();

    preamble.push_str(&format!(
        "#set document(title: \"{}\", author: \"{}\")\n",
        escape_typst_string(&meta.title),
        escape_typst_string(meta.author.as_deref().unwrap_or("")),
    ));

    let fonts: Vec<String> = TEXT_FONTS.iter().map(|f| format!("\"{}\"", f)).collect();
    preamble.push_str(&format!(
        "#set text(font: ({}), size: 12pt)\n",
        fonts.join(", ")
    ));
    preamble.push_str(&format!(
        "#let running-header = \"{}\"\n",
        escape_typst_string(&meta.header_text)
    ));

    preamble.push_str(
        r##"#set page(paper: "us-letter", margin: (left: 1.1in, right: 1.1in, top: 1in, bottom: 1in))
#set par(leading: 0.5em, spacing: 12pt)
#set heading(numbering: none)
#set list(indent: 16pt, spacing: 8pt)
#set enum(indent: 16pt, spacing: 8pt)

// Section titles and in-content subheadings
#show heading.where(level: 1): set text(size: 19pt, fill: rgb("#003F87"))
#show heading.where(level: 2): set text(size: 15pt, fill: rgb("#003F87"))
#show heading.where(level: 1): it => block(above: 18pt, below: 12pt, sticky: true)[#it]
#show heading.where(level: 2): it => block(above: 12pt, below: 8pt, sticky: true)[#it]

#let toc-entry(target, title, page) = block(above: 3pt, below: 3pt, link(target)[#title #box(width: 1fr, repeat[.]) #page])

"##,
    );

    preamble
}

/// Page template switch; a changed page setup always starts a new page
fn generate_template(template: PageTemplate) -> String {
    match template {
        PageTemplate::Front => "#set page(header: none, footer: none)\n\n".to_string(),
        PageTemplate::Body => r#"#set page(
  header: align(left, text(size: 9pt, style: "italic", fill: luma(35%), running-header)),
  footer: context align(right, text(size: 9pt, fill: luma(35%), counter(page).display())),
)

"#
        .to_string(),
    }
}

/// Title page: title, subtitle, capture date and source notice
fn generate_title_page(handbook: &Handbook) -> String {
    let meta = &handbook.metadata;
    let mut output = String::new();

    output.push_str("#v(2in)\n");
    output.push_str(&format!(
        "#align(center, text(size: 28pt, weight: \"bold\", fill: rgb(\"#CE1126\"), \"{}\"))\n",
        escape_typst_string(&meta.title)
    ));
    output.push_str("#v(18pt)\n");

    if let Some(subtitle) = &meta.subtitle {
        output.push_str(&format!(
            "#align(center, text(size: 12pt, fill: gray, \"{}\"))\n",
            escape_typst_string(subtitle)
        ));
    }

    output.push_str("#v(0.3in)\n");
    output.push_str(&format!(
        "#align(center, text(size: 12pt, fill: gray, \"Captured: {}\"))\n",
        escape_typst_string(&meta.captured)
    ));
    output.push_str("#v(0.5in)\n\n");

    output.push_str(&format!(
        "#\"Unofficial compilation of the online {}.\" \\\n",
        escape_typst_string(&meta.title)
    ));
    if let Some(url) = &meta.source_url {
        let display = url
            .trim_start_matches("https://")
            .trim_start_matches("http://");
        output.push_str("#\"Always refer to the official, most current version at:\" \\\n");
        output.push_str(&format!(
            "#link(\"{}\", \"{}\")\n",
            escape_typst_string(url),
            escape_typst_string(display)
        ));
    }
    output.push('\n');

    output
}

/// Table of contents with clickable entries
fn generate_toc(entries: &[TocEntry]) -> String {
    let mut output = String::new();

    output.push_str("#text(size: 18pt, weight: \"bold\", \"Table of Contents\")\n");
    output.push_str("#v(0.15in)\n");

    for entry in entries {
        let page = entry
            .page
            .map(|p| p.to_string())
            .unwrap_or_else(|| "0".to_string());
        output.push_str(&format!(
            "#toc-entry(<{}>, \"{}\", \"{}\")\n",
            entry.key,
            escape_typst_string(&entry.title),
            page
        ));
    }
    output.push('\n');

    output
}

/// Typst markup for one content block
///
/// Text is always emitted as a string literal, so page text can never be
/// interpreted as markup.
fn generate_block(block: &ContentBlock) -> String {
    match block {
        ContentBlock::Heading(text) => format!(
            "#v(0.08in)\n#heading(level: 2, outlined: false, bookmarked: false, \"{}\")\n\n",
            escape_typst_string(text)
        ),
        ContentBlock::Paragraph(text) => format!("#\"{}\"\n\n", escape_typst_string(text)),
        ContentBlock::List { ordered, items } => {
            let func = if *ordered { "enum" } else { "list" };
            let items: Vec<String> = items
                .iter()
                .map(|item| format!("  \"{}\",\n", escape_typst_string(item)))
                .collect();
            format!("#{}(\n{})\n#v(0.06in)\n\n", func, items.concat())
        }
        ContentBlock::Spacer => "#v(0.04in)\n\n".to_string(),
    }
}

/// Escape a value for use inside a Typst string literal
fn escape_typst_string(s: &str) -> String {
    s.replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
        .replace('\r', "\\r")
}
