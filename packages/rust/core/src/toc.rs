//! Section naming and table-of-contents markup.
//!
//! A section title is derived purely from a document's path relative to the
//! input root: the index document name and content extensions are dropped and
//! the remaining path segments are joined with [`TITLE_DELIMITER`].

use std::path::Path;

use docbinder_discovery::DiscoveryOptions;
use docbinder_shared::DiscoveredDocument;

/// Joins path segments in a derived title.
pub const TITLE_DELIMITER: &str = " → ";

const SEPARATORS: [char; 2] = ['/', '\\'];

/// One table-of-contents row, linking to its chapter anchor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TocEntry {
    pub title: String,
    pub anchor: String,
}

// ---------------------------------------------------------------------------
// Section naming
// ---------------------------------------------------------------------------

/// Title for a discovered document.
pub fn section_title(doc: &DiscoveredDocument, opts: &DiscoveryOptions) -> String {
    derive_title(&doc.relative.to_string_lossy(), opts)
}

/// Title for `path`, relative to `root`. Paths outside `root` are used as-is.
pub fn section_title_from(root: &Path, path: &Path, opts: &DiscoveryOptions) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path);
    derive_title(&relative.to_string_lossy(), opts)
}

/// Derive a display title from a relative path string.
///
/// `a/index.html` becomes `a`, `b/page.html` becomes `b → page`, and a root
/// level `index.html` stays `index`. Applying this to its own output returns
/// the output unchanged.
pub fn derive_title(relative: &str, opts: &DiscoveryOptions) -> String {
    let trimmed = relative.trim_start_matches(SEPARATORS);
    let mut segments: Vec<&str> = trimmed.split(SEPARATORS).filter(|s| !s.is_empty()).collect();

    let Some(last) = segments.pop() else {
        return trimmed.to_string();
    };

    let last = strip_content_extensions(last, opts);
    let is_index = last.eq_ignore_ascii_case(&opts.index_stem);
    if !(is_index && !segments.is_empty()) {
        segments.push(last);
    }

    // The directory now at the tail may itself look like a document name.
    if let Some(tail) = segments.last_mut() {
        *tail = strip_content_extensions(*tail, opts);
    }

    segments.join(TITLE_DELIMITER)
}

/// Strip every trailing content extension (`a.html.htm` -> `a`).
fn strip_content_extensions<'a>(name: &'a str, opts: &DiscoveryOptions) -> &'a str {
    let mut name = name;
    while let Some((stem, ext)) = name.rsplit_once('.') {
        if stem.is_empty() || !opts.extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)) {
            break;
        }
        name = stem;
    }
    name
}

// ---------------------------------------------------------------------------
// TOC markup
// ---------------------------------------------------------------------------

/// Anchor id of the `n`th chapter (1-based).
pub fn anchor_for(n: usize) -> String {
    format!("section-{n}")
}

/// Render the table of contents block.
pub fn render_toc(heading: &str, entries: &[TocEntry]) -> String {
    let mut out = String::with_capacity(64 + entries.len() * 64);
    out.push_str("<h2>");
    out.push_str(&escape_html(heading));
    out.push_str("</h2>\n<ul class=\"toc\">\n");
    for entry in entries {
        out.push_str("<li><a href=\"#");
        out.push_str(&escape_html(&entry.anchor));
        out.push_str("\">");
        out.push_str(&escape_html(&entry.title));
        out.push_str("</a></li>\n");
    }
    out.push_str("</ul>\n");
    out
}

/// Escape text for use in element content or a quoted attribute.
pub fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn title(path: &str) -> String {
        derive_title(path, &DiscoveryOptions::default())
    }

    #[test]
    fn index_document_is_named_after_its_directory() {
        assert_eq!(title("a/index.html"), "a");
        assert_eq!(title("guide/setup/index.htm"), "guide → setup");
    }

    #[test]
    fn plain_page_keeps_its_stem() {
        assert_eq!(title("b/page.html"), "b → page");
        assert_eq!(title("/b/page.html"), "b → page");
        assert_eq!(title("about.html"), "about");
    }

    #[test]
    fn root_index_stays_index() {
        assert_eq!(title("index.html"), "index");
    }

    #[test]
    fn unknown_extensions_are_kept() {
        assert_eq!(title("release/v1.2.html"), "release → v1.2");
        assert_eq!(title("notes.txt"), "notes.txt");
    }

    #[test]
    fn extension_match_is_case_insensitive() {
        assert_eq!(title("Docs/Index.HTML"), "Docs");
        assert_eq!(title("PAGE.Htm"), "PAGE");
    }

    #[test]
    fn windows_separators_are_accepted() {
        assert_eq!(title(r"a\b\page.html"), "a → b → page");
    }

    #[test]
    fn naming_is_idempotent() {
        for path in [
            "a/index.html",
            "b/page.html",
            "index.html",
            "a.html.html",
            "site.html/index.html",
            "x/index/index.html",
            "release/v1.2.html",
            "",
        ] {
            let once = title(path);
            assert_eq!(title(&once), once, "not idempotent for {path:?}");
        }
    }

    #[test]
    fn directory_named_index_is_kept() {
        assert_eq!(title("x/index/index.html"), "x → index");
    }

    #[test]
    fn titles_from_discovered_documents() {
        let root = PathBuf::from("/mirror/example.com");
        let opts = DiscoveryOptions::default();
        let names: Vec<String> = ["a/index.html", "b/page.html", "c/index.html"]
            .iter()
            .map(|p| section_title(&DiscoveredDocument::new(&root, root.join(p)), &opts))
            .collect();
        assert_eq!(names, vec!["a", "b → page", "c"]);

        assert_eq!(
            section_title_from(&root, &root.join("b/page.html"), &opts),
            "b → page"
        );
    }

    #[test]
    fn toc_links_each_entry_and_escapes_titles() {
        let entries = vec![
            TocEntry {
                title: "a".into(),
                anchor: anchor_for(1),
            },
            TocEntry {
                title: "<T&C>".into(),
                anchor: anchor_for(2),
            },
        ];
        let html = render_toc("Table of Contents", &entries);

        assert!(html.starts_with("<h2>Table of Contents</h2>"));
        assert!(html.contains(r##"<li><a href="#section-1">a</a></li>"##));
        assert!(html.contains(r##"<li><a href="#section-2">&lt;T&amp;C&gt;</a></li>"##));
        assert_eq!(html.matches("<li>").count(), 2);
    }
}
