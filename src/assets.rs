use base64::Engine;

const FALLBACK_MIME: &str = "application/octet-stream";

/// Raw bytes of a remote image as returned by an [`crate::ImageFetcher`].
#[derive(Debug, Clone)]
pub struct FetchedImage {
    pub url: String,
    pub data: Vec<u8>,
    /// `Content-Type` reported by the transport, if any.
    pub content_type: Option<String>,
}

impl FetchedImage {
    pub fn new(url: impl Into<String>, data: Vec<u8>, content_type: Option<String>) -> Self {
        Self {
            url: url.into(),
            data,
            content_type,
        }
    }

    pub fn bytes_len(&self) -> usize {
        self.data.len()
    }

    /// MIME type from content first; the reported header only breaks ties.
    pub fn mime_type(&self) -> String {
        sniff_mime_type(&self.data, self.content_type.as_deref())
    }

    pub fn to_data_uri(&self) -> String {
        let payload = base64::engine::general_purpose::STANDARD.encode(&self.data);
        format!("data:{};base64,{}", self.mime_type(), payload)
    }
}

pub fn sniff_mime_type(data: &[u8], content_type: Option<&str>) -> String {
    if let Ok(format) = image::guess_format(data) {
        return format.to_mime_type().to_string();
    }
    if data.starts_with(b"%PDF-") {
        return "application/pdf".to_string();
    }
    if let Some(mime) = sniff_markup(data) {
        return mime.to_string();
    }
    content_type
        .and_then(|raw| raw.split(';').next())
        .map(|mime| mime.trim().to_ascii_lowercase())
        .filter(|mime| !mime.is_empty())
        .unwrap_or_else(|| FALLBACK_MIME.to_string())
}

fn sniff_markup(data: &[u8]) -> Option<&'static str> {
    let head = &data[..data.len().min(1024)];
    let text = String::from_utf8_lossy(head);
    let text = text.trim_start_matches('\u{feff}').trim_start();
    let lower = text.to_ascii_lowercase();
    if lower.starts_with("<svg") || (lower.starts_with("<?xml") && lower.contains("<svg")) {
        return Some("image/svg+xml");
    }
    if lower.starts_with("<!doctype html") || lower.starts_with("<html") {
        return Some("text/html");
    }
    if lower.starts_with("<?xml") {
        return Some("text/xml");
    }
    None
}

/// Data URIs produced for one document, in first-occurrence order of their URLs.
#[derive(Debug, Clone, Default)]
pub struct InlinedImages {
    entries: Vec<(String, String)>,
}

impl InlinedImages {
    pub fn add(&mut self, url: impl Into<String>, data_uri: String) {
        self.entries.push((url.into(), data_uri));
    }

    pub fn get(&self, url: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(key, _)| key == url)
            .map(|(_, uri)| uri.as_str())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn urls(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(url, _)| url.as_str())
    }
}
