use std::fmt;
use std::path::PathBuf;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedResource {
    pub bytes: Vec<u8>,
    pub metadata: FetchMetadata,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchMetadata {
    pub requested_url: String,
    /// Where redirects ended up.
    pub final_url: String,
    pub content_type: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{kind}: {message}")]
pub struct FetchError {
    pub kind: FailureKind,
    pub message: String,
}

impl FetchError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureKind {
    InvalidUrl,
    HttpStatus(u16),
    Timeout,
    RedirectLimitExceeded,
    TooLarge { max_bytes: u64, actual: Option<u64> },
    UnsupportedContentType { content_type: String },
    Decode,
    Cancelled,
    Network,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureKind::InvalidUrl => write!(f, "invalid url"),
            FailureKind::HttpStatus(code) => write!(f, "http status {code}"),
            FailureKind::Timeout => write!(f, "timeout"),
            FailureKind::RedirectLimitExceeded => write!(f, "redirect limit exceeded"),
            FailureKind::TooLarge { max_bytes, actual } => {
                write!(f, "response too large (max {max_bytes}, actual {actual:?})")
            }
            FailureKind::UnsupportedContentType { content_type } => {
                write!(f, "unsupported content type {content_type}")
            }
            FailureKind::Decode => write!(f, "undecodable body"),
            FailureKind::Cancelled => write!(f, "cancelled"),
            FailureKind::Network => write!(f, "network error"),
        }
    }
}

/// Failures reported by a render session.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RenderError {
    /// The session handle is no longer usable; a new one must be created.
    #[error("render session lost")]
    SessionLost,
    /// No element matched the lookup on the current page.
    #[error("element not found: {0}")]
    ElementNotFound(String),
    /// The page could not be loaded.
    #[error("navigation failed: {0}")]
    Navigation(#[from] FetchError),
    /// Anything else the backend reports; treated as transient.
    #[error("render backend error: {0}")]
    Backend(String),
}

/// An asset reference that could not be embedded; the page keeps the
/// original reference.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssetFailure {
    pub reference: String,
    pub source: String,
    pub reason: String,
}

/// Result of exporting one page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageExport {
    pub index: usize,
    pub url: String,
    pub content_path: PathBuf,
    /// `None` when conversion failed; assembly reports it as missing.
    pub artifact_path: Option<PathBuf>,
    pub links: Vec<String>,
    pub asset_failures: Vec<AssetFailure>,
}
