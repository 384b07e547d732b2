use std::fmt;

#[derive(Debug)]
pub enum QuizExportError {
    InvalidConfiguration(String),
    Source(String),
    Render(String),
    Io(std::io::Error),
}

impl fmt::Display for QuizExportError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            QuizExportError::InvalidConfiguration(message) => {
                write!(f, "invalid configuration: {}", message)
            }
            QuizExportError::Source(message) => write!(f, "attempt source error: {}", message),
            QuizExportError::Render(message) => write!(f, "pdf renderer error: {}", message),
            QuizExportError::Io(err) => write!(f, "io error: {}", err),
        }
    }
}

impl std::error::Error for QuizExportError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            QuizExportError::Io(err) => Some(err),
            _ => None,
        }
    }
}

impl From<std::io::Error> for QuizExportError {
    fn from(value: std::io::Error) -> Self {
        QuizExportError::Io(value)
    }
}

/// Failure of a single remote image fetch. Never escapes the image inliner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    InvalidUrl(String),
    Transport { url: String, reason: String },
    Timeout { url: String },
    Status { url: String, status: u16 },
    EmptyBody { url: String },
    TooLarge { url: String, limit: u64 },
}

impl FetchError {
    pub fn url(&self) -> &str {
        match self {
            FetchError::InvalidUrl(url)
            | FetchError::Transport { url, .. }
            | FetchError::Timeout { url }
            | FetchError::Status { url, .. }
            | FetchError::EmptyBody { url }
            | FetchError::TooLarge { url, .. } => url,
        }
    }
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchError::InvalidUrl(url) => write!(f, "not an absolute http(s) url: {}", url),
            FetchError::Transport { url, reason } => {
                write!(f, "fetch of {} failed: {}", url, reason)
            }
            FetchError::Timeout { url } => write!(f, "fetch of {} timed out", url),
            FetchError::Status { url, status } => {
                write!(f, "fetch of {} returned status {}", url, status)
            }
            FetchError::EmptyBody { url } => write!(f, "fetch of {} returned an empty body", url),
            FetchError::TooLarge { url, limit } => {
                write!(f, "response from {} exceeds {} bytes", url, limit)
            }
        }
    }
}

impl std::error::Error for FetchError {}
