// SVG repair for HTML-to-PDF renderers.
//
// Two passes: cheap pattern rewrites over the whole document for local, regular problems
// ("null" paint values, empty images, bracket glyphs, fonts without broad coverage), then
// a real XML parse of every <svg> fragment for the multiline text rewrite. A fragment that
// does not parse is left byte-for-byte as it was.

use std::borrow::Cow;
use std::sync::LazyLock;

use regex::{Captures, NoExpand, Regex};

use crate::debug::DebugLogger;
use crate::multiline::expand_all;
use crate::svg_tree::SvgTree;

/// Family substituted for Helvetica/Arial declarations.
pub const DEFAULT_FALLBACK_FONT_FAMILY: &str = "DejaVu Sans";

const OPEN_BRACKET_GLYPHS: [char; 3] = ['\u{2329}', '\u{3008}', '\u{2039}'];
const CLOSE_BRACKET_GLYPHS: [char; 3] = ['\u{232A}', '\u{3009}', '\u{203A}'];

static DASHARRAY_NULL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)stroke-dasharray\s*=\s*"null""#).expect("dasharray pattern")
});
static OPACITY_NULL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\s(?:fill|stroke)-opacity\s*=\s*"null""#).expect("opacity pattern")
});
static PAINT_NULL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)\s(?:fill|stroke)\s*=\s*"null""#).expect("paint pattern")
});
static EMPTY_IMAGE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<image\b[^>]*[\s:]href\s*=\s*""[^>]*?(?:/>|>\s*</image\s*>)"#)
        .expect("empty image pattern")
});
static LIMITED_FONT_FAMILY: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)font-family\s*=\s*"[^"]*(?:Helvetica|Arial)[^"]*""#)
        .expect("font family pattern")
});
static SVG_FRAGMENT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<svg\b[^>]*>.*?</svg\s*>").expect("svg fragment pattern")
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SanitizeReport {
    pub fragments: usize,
    pub fragments_rewritten: usize,
    pub fragments_passthrough: usize,
    pub text_expanded: usize,
}

#[derive(Debug, Clone)]
pub struct Sanitizer {
    font_family_attr: String,
    debug: Option<DebugLogger>,
}

impl Default for Sanitizer {
    fn default() -> Self {
        Self::new(DEFAULT_FALLBACK_FONT_FAMILY)
    }
}

impl Sanitizer {
    pub fn new(fallback_font_family: &str) -> Self {
        let mut escaped = String::with_capacity(fallback_font_family.len());
        for ch in fallback_font_family.chars() {
            match ch {
                '"' => escaped.push_str("&quot;"),
                '&' => escaped.push_str("&amp;"),
                '<' => escaped.push_str("&lt;"),
                _ => escaped.push(ch),
            }
        }
        Self {
            font_family_attr: format!("font-family=\"{escaped}\""),
            debug: None,
        }
    }

    pub fn with_debug(mut self, debug: Option<DebugLogger>) -> Self {
        self.debug = debug;
        self
    }

    pub fn sanitize(&self, markup: &str) -> String {
        self.sanitize_with_report(markup).0
    }

    pub fn sanitize_with_report(&self, markup: &str) -> (String, SanitizeReport) {
        let html = self.rewrite_patterns(markup);
        let mut report = SanitizeReport::default();

        let out = SVG_FRAGMENT.replace_all(&html, |caps: &Captures<'_>| {
            let fragment = &caps[0];
            report.fragments += 1;
            match repair_fragment(fragment) {
                Ok((xml, expanded)) => {
                    report.fragments_rewritten += 1;
                    report.text_expanded += expanded;
                    tracing::debug!(expanded, bytes = xml.len(), "svg fragment rewritten");
                    xml
                }
                Err(err) => {
                    report.fragments_passthrough += 1;
                    tracing::debug!(error = %err, "svg fragment left unchanged");
                    if let Some(debug) = &self.debug {
                        debug.event("svg.passthrough", &[("reason", &err.to_string())]);
                    }
                    fragment.to_string()
                }
            }
        });
        let out = out.into_owned();

        if let Some(debug) = &self.debug {
            debug.increment("svg.fragments", report.fragments as u64);
            debug.increment("svg.fragments.rewritten", report.fragments_rewritten as u64);
            debug.increment(
                "svg.fragments.passthrough",
                report.fragments_passthrough as u64,
            );
            debug.increment("svg.text.expanded", report.text_expanded as u64);
        }
        (out, report)
    }

    // Fixed rewrites, applied in order to the whole document.
    fn rewrite_patterns(&self, markup: &str) -> String {
        let html = DASHARRAY_NULL.replace_all(markup, NoExpand(r#"stroke-dasharray="none""#));
        let html = chain(html, &OPACITY_NULL, "");
        let html = chain(html, &PAINT_NULL, "");
        let html = chain(html, &EMPTY_IMAGE, "");
        let html = html
            .replace(OPEN_BRACKET_GLYPHS, "&lt;")
            .replace(CLOSE_BRACKET_GLYPHS, "&gt;");
        LIMITED_FONT_FAMILY
            .replace_all(&html, NoExpand(&self.font_family_attr))
            .into_owned()
    }
}

fn chain<'a>(input: Cow<'a, str>, pattern: &Regex, replacement: &str) -> Cow<'a, str> {
    let replaced = match pattern.replace_all(&input, NoExpand(replacement)) {
        Cow::Borrowed(_) => None,
        Cow::Owned(out) => Some(out),
    };
    match replaced {
        Some(out) => Cow::Owned(out),
        None => input,
    }
}

fn repair_fragment(fragment: &str) -> Result<(String, usize), crate::svg_tree::ParseError> {
    let mut tree = SvgTree::parse(fragment)?;
    let expanded = expand_all(&mut tree);
    Ok((tree.to_xml(), expanded))
}

/// Sanitizes `markup` with the default fallback font family.
pub fn sanitize(markup: &str) -> String {
    Sanitizer::default().sanitize(markup)
}
