//! Author-side template placeholder rewriting.
//!
//! Mirrored pages sometimes ship unrendered server templates. Image sources of
//! the form `{{ url_for('static', filename='X') }}` are rewritten to the
//! relative path `X` so the asset resolves against the local tree.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, Regex};

/// Rewrite static-asset placeholders inside `<img>` source attributes.
pub(crate) fn rewrite_static_placeholders(html: &str) -> Cow<'_, str> {
    static IMG_TAG_RE: LazyLock<Regex> =
        LazyLock::new(|| Regex::new(r"(?i)<img\b[^>]*>").expect("valid regex"));

    static SRC_PLACEHOLDER_RE: LazyLock<Regex> = LazyLock::new(|| {
        Regex::new(
            r#"(?i)(\bsrc\s*=\s*)(["'])\s*\{\{\s*url_for\(\s*["']static["']\s*,\s*filename\s*=\s*["']([^"']*)["']\s*\)\s*\}\}\s*["']"#,
        )
        .expect("valid regex")
    });

    if !html.contains("url_for") {
        return Cow::Borrowed(html);
    }

    IMG_TAG_RE.replace_all(html, |tag: &Captures| {
        SRC_PLACEHOLDER_RE
            .replace_all(&tag[0], "${1}${2}${3}${2}")
            .into_owned()
    })
}
