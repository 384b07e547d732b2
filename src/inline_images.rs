// Rewrites <img src="http(s)://..."> references as data URIs so the PDF renderer never has
// to reach the network (and never does so without the user's session).

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::{Captures, Regex};

use crate::assets::InlinedImages;
use crate::debug::DebugLogger;
use crate::fetch::{ImageFetcher, SessionHandle};

static REMOTE_IMG_SRC: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<img\b[^>]*?\ssrc\s*=\s*"(https?://[^"]+)""#).expect("img src pattern")
});

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct InlineReport {
    /// Distinct remote URLs referenced by the markup.
    pub urls: usize,
    pub inlined: usize,
    pub failed: usize,
}

/// Distinct remote image URLs in first-occurrence order, as written in the markup.
pub fn remote_image_urls(markup: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    REMOTE_IMG_SRC
        .captures_iter(markup)
        .filter_map(|caps| caps.get(1))
        .map(|m| m.as_str().to_string())
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

pub fn inline_remote_images(
    markup: &str,
    session: &mut dyn SessionHandle,
    fetcher: &dyn ImageFetcher,
) -> String {
    inline_remote_images_with_report(markup, session, fetcher, None).0
}

/// Each distinct URL is fetched once. A failed fetch leaves that reference untouched.
pub fn inline_remote_images_with_report(
    markup: &str,
    session: &mut dyn SessionHandle,
    fetcher: &dyn ImageFetcher,
    debug: Option<&DebugLogger>,
) -> (String, InlineReport) {
    let urls = remote_image_urls(markup);
    let mut report = InlineReport {
        urls: urls.len(),
        ..InlineReport::default()
    };
    if urls.is_empty() {
        return (markup.to_string(), report);
    }

    let cookie = session.cookie();
    // Must happen before the first request: the image endpoints block on the session
    // lock held by this request otherwise.
    session.release();

    let mut images = InlinedImages::default();
    for url in &urls {
        // Attribute values are HTML-escaped; the request needs the literal URL.
        let request_url = url.replace("&amp;", "&");
        match fetcher.fetch(&request_url, &cookie) {
            Ok(image) => {
                tracing::debug!(url = %url, bytes = image.bytes_len(), "inlined remote image");
                images.add(url.as_str(), image.to_data_uri());
                report.inlined += 1;
            }
            Err(err) => {
                tracing::warn!(url = %url, error = %err, "remote image left as url");
                if let Some(debug) = debug {
                    debug.event("image.failed", &[("url", url), ("reason", &err.to_string())]);
                }
                report.failed += 1;
            }
        }
    }

    if let Some(debug) = debug {
        debug.increment("images.inlined", report.inlined as u64);
        debug.increment("images.failed", report.failed as u64);
    }

    if images.is_empty() {
        return (markup.to_string(), report);
    }

    let out = REMOTE_IMG_SRC.replace_all(markup, |caps: &Captures<'_>| {
        let whole = &caps[0];
        let (Some(tag), Some(src)) = (caps.get(0), caps.get(1)) else {
            return whole.to_string();
        };
        let Some(data_uri) = images.get(src.as_str()) else {
            return whole.to_string();
        };
        let start = src.start() - tag.start();
        let end = src.end() - tag.start();
        format!("{}{}{}", &whole[..start], data_uri, &whole[end..])
    });
    (out.into_owned(), report)
}
