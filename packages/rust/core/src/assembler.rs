//! Aggregated document assembly.
//!
//! Combines titled sections into one standalone markup document: preamble,
//! document heading, table of contents, then one chapter per section, each
//! followed by a page break. Chapter blocks are rendered before anything is
//! emitted so a section that cannot be rendered drops out of both the table
//! of contents and the body.

use scraper::Html;
use tracing::{debug, info, instrument, warn};

use docbinder_shared::{BinderError, DocumentConfig, Result, Section};

use crate::toc::{self, TocEntry};

/// Marker emitted between pages.
pub const PAGE_BREAK: &str = "<div class=\"page-break\"></div>\n";

const STYLESHEET: &str = r#"body {
  font-family: Arial, sans-serif;
  max-width: 800px;
  margin: 0 auto;
  padding: 20px;
}
.page-break {
  page-break-after: always;
  height: 1px;
}
.chapter {
  margin-top: 30px;
}
pre {
  background-color: #f5f5f5;
  padding: 10px;
  border-radius: 5px;
  overflow-x: auto;
}
code {
  font-family: monospace;
}
"#;

/// Options for assembling the aggregated document.
#[derive(Debug, Clone)]
pub struct AssembleOptions {
    /// Document title, used for `<title>` and the top-level heading.
    pub title: String,
    /// Heading above the table of contents.
    pub toc_heading: String,
}

impl Default for AssembleOptions {
    fn default() -> Self {
        Self::from(&DocumentConfig::default())
    }
}

impl From<&DocumentConfig> for AssembleOptions {
    fn from(config: &DocumentConfig) -> Self {
        Self {
            title: config.title.clone(),
            toc_heading: config.toc_heading.clone(),
        }
    }
}

/// The single standalone document handed to the render dispatcher.
#[derive(Debug, Clone)]
pub struct AggregatedDocument {
    /// Complete markup, from doctype to closing `</html>`.
    pub html: String,
    /// Titles of the included chapters, in document order.
    pub titles: Vec<String>,
    /// Sections excluded because their block could not be rendered.
    pub excluded: usize,
}

impl AggregatedDocument {
    /// Number of chapters (and table-of-contents entries).
    pub fn section_count(&self) -> usize {
        self.titles.len()
    }
}

/// Assemble `sections` into one document, preserving their order.
#[instrument(skip_all, fields(sections = sections.len()))]
pub fn aggregate(sections: &[Section], opts: &AssembleOptions) -> AggregatedDocument {
    // Pass 1: render blocks. TOC entries are only created for blocks that rendered.
    let mut entries: Vec<TocEntry> = Vec::with_capacity(sections.len());
    let mut blocks: Vec<String> = Vec::with_capacity(sections.len());
    let mut excluded = 0;

    for section in sections {
        match normalize_body(&section.body) {
            Ok(body) => {
                let anchor = toc::anchor_for(entries.len() + 1);
                blocks.push(render_chapter(&anchor, &section.title, &body));
                entries.push(TocEntry {
                    title: section.title.clone(),
                    anchor,
                });
            }
            Err(e) => {
                warn!(title = %section.title, error = %e, "excluding section from document");
                excluded += 1;
            }
        }
    }

    // Pass 2: emit.
    let capacity = blocks.iter().map(String::len).sum::<usize>() + STYLESHEET.len() + 1024;
    let mut html = String::with_capacity(capacity);
    html.push_str(&preamble(&opts.title));
    html.push_str(&toc::render_toc(&opts.toc_heading, &entries));
    html.push_str(PAGE_BREAK);
    for block in &blocks {
        html.push_str(block);
    }
    html.push_str("</body>\n</html>\n");

    info!(
        chapters = entries.len(),
        excluded,
        bytes = html.len(),
        "aggregated document assembled"
    );

    AggregatedDocument {
        html,
        titles: entries.into_iter().map(|e| e.title).collect(),
        excluded,
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Re-serialize a body fragment so unbalanced markup cannot leak into
/// neighbouring chapters.
fn normalize_body(body: &str) -> Result<String> {
    let fragment = Html::parse_fragment(body);
    let normalized = fragment.root_element().inner_html();
    if normalized.trim().is_empty() {
        return Err(BinderError::parse("section body is empty after normalization"));
    }
    debug!(before = body.len(), after = normalized.len(), "normalized section body");
    Ok(normalized)
}

fn preamble(title: &str) -> String {
    let title = toc::escape_html(title);
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"UTF-8\">\n<title>{title}</title>\n\
         <style>\n{STYLESHEET}</style>\n</head>\n<body>\n<h1>{title}</h1>\n{PAGE_BREAK}"
    )
}

fn render_chapter(anchor: &str, title: &str, body: &str) -> String {
    format!(
        "<div class=\"chapter\" id=\"{anchor}\">\n<h2>{}</h2>\n{body}\n{PAGE_BREAK}</div>\n",
        toc::escape_html(title)
    )
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
