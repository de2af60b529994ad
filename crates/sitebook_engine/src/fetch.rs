use std::time::Duration;

use engine_logging::engine_trace;
use futures_util::StreamExt;
use reqwest::header::CONTENT_TYPE;

use crate::{FailureKind, FetchError, FetchMetadata, FetchedResource};

#[derive(Debug, Clone)]
pub struct FetchSettings {
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    pub redirect_limit: usize,
    pub max_bytes: u64,
    /// `None` accepts any content type.
    pub allowed_content_types: Option<Vec<String>>,
}

impl FetchSettings {
    /// Page navigation: HTML only.
    pub fn pages() -> Self {
        Self {
            allowed_content_types: Some(vec![
                "text/html".to_string(),
                "application/xhtml+xml".to_string(),
            ]),
            ..Self::default()
        }
    }

    /// Images and stylesheets: anything goes, bodies may be larger.
    pub fn assets() -> Self {
        Self {
            max_bytes: 20 * 1024 * 1024,
            allowed_content_types: None,
            ..Self::default()
        }
    }

    fn accepts(&self, content_type: &str) -> bool {
        let Some(allowed) = &self.allowed_content_types else {
            return true;
        };
        let essence = content_type.split(';').next().unwrap_or(content_type).trim();
        allowed.iter().any(|a| a.eq_ignore_ascii_case(essence))
    }
}

impl Default for FetchSettings {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            request_timeout: Duration::from_secs(30),
            redirect_limit: 5,
            max_bytes: 5 * 1024 * 1024,
            allowed_content_types: None,
        }
    }
}

/// Downloads one URL. Pages and assets go through separate instances so
/// each can carry its own limits.
#[async_trait::async_trait]
pub trait ResourceFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<FetchedResource, FetchError>;
}

/// `reqwest` client shared by every request of one fetcher.
#[derive(Debug, Clone)]
pub struct ReqwestFetcher {
    settings: FetchSettings,
    client: Result<reqwest::Client, String>,
}

impl ReqwestFetcher {
    pub fn new(settings: FetchSettings) -> Self {
        let client = reqwest::Client::builder()
            .connect_timeout(settings.connect_timeout)
            .timeout(settings.request_timeout)
            .redirect(reqwest::redirect::Policy::limited(settings.redirect_limit))
            .build()
            .map_err(|err| err.to_string());
        Self { settings, client }
    }

    fn too_large(&self, actual: u64) -> FetchError {
        FetchError::new(
            FailureKind::TooLarge {
                max_bytes: self.settings.max_bytes,
                actual: Some(actual),
            },
            "response too large",
        )
    }

    async fn read_body(&self, response: reqwest::Response) -> Result<Vec<u8>, FetchError> {
        let mut bytes = Vec::new();
        let mut stream = response.bytes_stream();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(classify)?;
            let len = (bytes.len() + chunk.len()) as u64;
            if len > self.settings.max_bytes {
                return Err(self.too_large(len));
            }
            bytes.extend_from_slice(&chunk);
        }
        Ok(bytes)
    }
}

#[async_trait::async_trait]
impl ResourceFetcher for ReqwestFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedResource, FetchError> {
        let client = self
            .client
            .as_ref()
            .map_err(|message| FetchError::new(FailureKind::Network, message.clone()))?;
        let parsed = reqwest::Url::parse(url)
            .map_err(|err| FetchError::new(FailureKind::InvalidUrl, err.to_string()))?;

        let response = client.get(parsed).send().await.map_err(classify)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::new(
                FailureKind::HttpStatus(status.as_u16()),
                status.to_string(),
            ));
        }
        match response.content_length() {
            Some(declared) if declared > self.settings.max_bytes => {
                return Err(self.too_large(declared));
            }
            _ => {}
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|value| value.to_str().ok())
            .map(str::to_string);
        if let Some(ct) = content_type.as_deref().filter(|ct| !self.settings.accepts(ct)) {
            return Err(FetchError::new(
                FailureKind::UnsupportedContentType {
                    content_type: ct.to_string(),
                },
                "unsupported content type",
            ));
        }

        let metadata = FetchMetadata {
            requested_url: url.to_string(),
            final_url: response.url().to_string(),
            content_type,
        };
        let bytes = self.read_body(response).await?;
        engine_trace!("fetched {} bytes from {}", bytes.len(), metadata.final_url);
        Ok(FetchedResource { bytes, metadata })
    }
}

fn classify(err: reqwest::Error) -> FetchError {
    let kind = if err.is_timeout() {
        FailureKind::Timeout
    } else if err.is_redirect() {
        FailureKind::RedirectLimitExceeded
    } else {
        FailureKind::Network
    };
    FetchError::new(kind, err.to_string())
}
