use std::time::Duration;

use crate::assets::FetchedImage;
use crate::error::FetchError;

pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 20 * 1024 * 1024;
pub const DEFAULT_USER_AGENT: &str = concat!("quiz-export/", env!("CARGO_PKG_VERSION"));

/// Session cookie of the user the export runs for. Image requests are made on their
/// behalf so access-controlled files resolve.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionCookie {
    pub name: String,
    pub value: String,
}

impl SessionCookie {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }

    pub fn header_value(&self) -> String {
        format!("{}={}; path=/", self.name, self.value)
    }
}

/// The hosting session. `release` gives up the session's write lock so the image requests
/// (which carry the same cookie) are not serialized behind the export request. It may be
/// called more than once and must be cheap after the first call.
pub trait SessionHandle {
    fn cookie(&self) -> SessionCookie;

    fn release(&mut self);
}

// A bare cookie has no lock to release.
impl SessionHandle for SessionCookie {
    fn cookie(&self) -> SessionCookie {
        self.clone()
    }

    fn release(&mut self) {}
}

pub trait ImageFetcher {
    fn fetch(&self, url: &str, cookie: &SessionCookie) -> Result<FetchedImage, FetchError>;
}

impl<T: ImageFetcher + ?Sized> ImageFetcher for &T {
    fn fetch(&self, url: &str, cookie: &SessionCookie) -> Result<FetchedImage, FetchError> {
        (**self).fetch(url, cookie)
    }
}

/// Blocking HTTP(S) fetcher. One attempt per URL, bounded by a connect timeout and a
/// timeout for the whole exchange.
///
/// ```rust,ignore
/// use quiz_export::HttpImageFetcher;
/// use std::time::Duration;
///
/// let fetcher = HttpImageFetcher::new()
///     .with_connect_timeout(Duration::from_secs(2))
///     .with_timeout(Duration::from_secs(10));
/// ```
#[derive(Debug, Clone)]
pub struct HttpImageFetcher {
    connect_timeout: Duration,
    timeout: Duration,
    max_bytes: u64,
    user_agent: String,
}

impl Default for HttpImageFetcher {
    fn default() -> Self {
        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            timeout: DEFAULT_FETCH_TIMEOUT,
            max_bytes: DEFAULT_MAX_IMAGE_BYTES,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HttpImageFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    fn agent(&self) -> ureq::Agent {
        let config = ureq::Agent::config_builder()
            .timeout_connect(Some(self.connect_timeout))
            .timeout_global(Some(self.timeout))
            .build();
        config.into()
    }
}

impl ImageFetcher for HttpImageFetcher {
    fn fetch(&self, url: &str, cookie: &SessionCookie) -> Result<FetchedImage, FetchError> {
        let parsed = parse_http_url(url)?;
        let agent = self.agent();

        let mut response = agent
            .get(parsed.as_str())
            .header("User-Agent", &self.user_agent)
            .header("Cookie", &cookie.header_value())
            .call()
            .map_err(|err| map_ureq_error(url, err, self.max_bytes))?;

        let content_type = response
            .headers()
            .get("content-type")
            .and_then(|h| h.to_str().ok())
            .map(|s| s.to_string());

        let bytes = response
            .body_mut()
            .with_config()
            .limit(self.max_bytes)
            .read_to_vec()
            .map_err(|err| map_ureq_error(url, err, self.max_bytes))?;

        if bytes.is_empty() {
            return Err(FetchError::EmptyBody {
                url: url.to_string(),
            });
        }
        Ok(FetchedImage::new(url, bytes, content_type))
    }
}

/// Accepts only absolute `http`/`https` URLs with a host.
pub fn parse_http_url(raw: &str) -> Result<url::Url, FetchError> {
    let parsed =
        url::Url::parse(raw.trim()).map_err(|_| FetchError::InvalidUrl(raw.to_string()))?;
    match parsed.scheme() {
        "http" | "https" if parsed.host_str().is_some_and(|host| !host.is_empty()) => Ok(parsed),
        _ => Err(FetchError::InvalidUrl(raw.to_string())),
    }
}

fn map_ureq_error(url: &str, err: ureq::Error, limit: u64) -> FetchError {
    match err {
        ureq::Error::StatusCode(status) => FetchError::Status {
            url: url.to_string(),
            status,
        },
        ureq::Error::Timeout(_) => FetchError::Timeout {
            url: url.to_string(),
        },
        ureq::Error::BodyExceedsLimit(_) => FetchError::TooLarge {
            url: url.to_string(),
            limit,
        },
        other => FetchError::Transport {
            url: url.to_string(),
            reason: other.to_string(),
        },
    }
}
