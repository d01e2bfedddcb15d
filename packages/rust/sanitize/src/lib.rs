//! Markup sanitization and body extraction.
//!
//! Strips non-content nodes (scripts, styles, external resource links,
//! metadata, embedded frames, no-script fallbacks), rewrites static-asset
//! template placeholders, and returns the inner markup of the first `<body>`.

mod placeholders;

use std::sync::LazyLock;

use scraper::{Html, Selector};
use tracing::{debug, instrument};

/// Element kinds removed before the body is extracted.
pub const STRIPPED_ELEMENTS: &[&str] = &["script", "style", "link", "meta", "iframe", "noscript"];

static STRIPPED_SEL: LazyLock<Selector> = LazyLock::new(|| {
    Selector::parse(&STRIPPED_ELEMENTS.join(", ")).expect("valid selector")
});

static BODY_SEL: LazyLock<Selector> =
    LazyLock::new(|| Selector::parse("body").expect("valid selector"));

/// Sanitize raw markup and return the inner markup of its first body.
///
/// Returns `None` when the document has no body (e.g. a frameset page) or the
/// body is empty once non-content nodes are gone. Callers skip such
/// documents; it is not an error.
#[instrument(skip_all, fields(len = html.len()))]
pub fn sanitize(html: &str) -> Option<String> {
    let html = placeholders::rewrite_static_placeholders(html);
    let mut doc = Html::parse_document(&html);

    let removed = strip_elements(&mut doc);
    debug!(removed, "stripped non-content elements");

    let body = doc.select(&BODY_SEL).next()?;
    let inner = body.inner_html();
    if inner.trim().is_empty() {
        debug!("body is empty after sanitization");
        return None;
    }
    Some(inner)
}

/// Detach every stripped element from the tree. Returns how many were removed.
fn strip_elements(doc: &mut Html) -> usize {
    let ids: Vec<_> = doc.select(&STRIPPED_SEL).map(|el| el.id()).collect();
    let count = ids.len();

    for id in ids {
        if let Some(mut node) = doc.tree.get_mut(id) {
            node.detach();
        }
    }

    count
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
