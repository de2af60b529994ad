use std::collections::{HashMap, HashSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use ego_tree::NodeId;
use engine_logging::{engine_debug, engine_trace, engine_warn};
use futures_util::stream::{self, StreamExt};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::fetch::ResourceFetcher;
use crate::layout::short_hash;
use crate::markup::AssetRef;
use crate::persist::AtomicFileWriter;
use crate::{AssetFailure, FailureKind, FetchError, FetchedResource};

/// Attribute rewrite produced by [`AssetResolver::embed`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Replacement {
    pub node: NodeId,
    pub attr: &'static str,
    pub value: String,
}

#[derive(Debug, Default)]
pub struct EmbedOutcome {
    pub replacements: Vec<Replacement>,
    pub failures: Vec<AssetFailure>,
}

/// Downloads images and stylesheets once per run and inlines them as
/// `data:` URIs.
pub struct AssetResolver {
    fetcher: Arc<dyn ResourceFetcher>,
    asset_dir: PathBuf,
    base: Url,
    concurrency: usize,
    embedded: HashMap<String, String>,
    failed: HashMap<String, String>,
    fetches: usize,
}

impl AssetResolver {
    pub fn new(
        fetcher: Arc<dyn ResourceFetcher>,
        asset_dir: PathBuf,
        url_prefix: &str,
        concurrency: usize,
    ) -> Result<Self, url::ParseError> {
        Ok(Self {
            fetcher,
            asset_dir,
            base: Url::parse(url_prefix)?,
            concurrency: concurrency.max(1),
            embedded: HashMap::new(),
            failed: HashMap::new(),
            fetches: 0,
        })
    }

    /// Network fetches issued so far.
    pub fn fetches(&self) -> usize {
        self.fetches
    }

    pub fn is_embedded(&self, source: &str) -> bool {
        self.embedded.contains_key(source)
    }

    /// Absolute source URL of an asset reference; `None` for `data:` URIs.
    pub fn source_url(&self, reference: &str) -> Option<Result<Url, String>> {
        let reference = reference.trim();
        if reference.starts_with("data:") {
            return None;
        }
        let parsed = if let Some(rest) = reference.strip_prefix("//") {
            Url::parse(&format!("https://{rest}"))
        } else if reference.contains("://") {
            Url::parse(reference)
        } else {
            self.base.join(reference)
        };
        Some(parsed.map_err(|err| format!("invalid asset reference: {err}")))
    }

    /// Deterministic location of `source` under the asset directory,
    /// mirroring its host and path.
    pub fn disk_path(&self, source: &Url) -> PathBuf {
        let mut path = self.asset_dir.join(safe_segment(source.host_str().unwrap_or("local")));
        let segments: Vec<&str> = source
            .path_segments()
            .map(|s| s.filter(|seg| !seg.is_empty()).collect())
            .unwrap_or_default();
        let (file, dirs) = match segments.split_last() {
            Some((file, dirs)) => (safe_segment(file), dirs),
            None => ("index".to_string(), &[][..]),
        };
        for dir in dirs {
            path.push(safe_segment(dir));
        }
        let file = match source.query() {
            Some(query) => with_suffix(&file, &short_hash(query)),
            None => file,
        };
        path.push(file);
        path
    }

    pub async fn embed(&mut self, refs: &[AssetRef], cancel: &CancellationToken) -> EmbedOutcome {
        let mut outcome = EmbedOutcome::default();
        let mut resolved: Vec<(&AssetRef, String)> = Vec::new();
        for asset in refs {
            match self.source_url(&asset.value) {
                None => {}
                Some(Ok(url)) => resolved.push((asset, url.to_string())),
                Some(Err(reason)) => outcome.failures.push(AssetFailure {
                    reference: asset.value.clone(),
                    source: asset.value.clone(),
                    reason,
                }),
            }
        }

        let mut pending = Vec::new();
        let mut seen = HashSet::new();
        for (_, source) in &resolved {
            if self.embedded.contains_key(source) || self.failed.contains_key(source) {
                continue;
            }
            if seen.insert(source.clone()) && !self.reuse_from_disk(source) {
                pending.push(source.clone());
            }
        }

        if !pending.is_empty() {
            engine_debug!("fetching {} assets", pending.len());
            self.fetch_all(pending, cancel).await;
        }

        for (asset, source) in resolved {
            if let Some(uri) = self.embedded.get(&source) {
                outcome.replacements.push(Replacement {
                    node: asset.node,
                    attr: asset.attr,
                    value: uri.clone(),
                });
            } else {
                let reason = self
                    .failed
                    .get(&source)
                    .cloned()
                    .unwrap_or_else(|| FailureKind::Cancelled.to_string());
                outcome.failures.push(AssetFailure {
                    reference: asset.value.clone(),
                    source,
                    reason,
                });
            }
        }
        outcome
    }

    /// Download `references` ahead of the crawl and return the text of
    /// every one that is available, in order, plus the ones that are not.
    pub async fn prefetch_text(
        &mut self,
        references: &[String],
        cancel: &CancellationToken,
    ) -> (Vec<String>, Vec<AssetFailure>) {
        let mut failures = Vec::new();
        let mut sources = Vec::new();
        for reference in references {
            match self.source_url(reference) {
                None => engine_debug!("{} is inline, nothing to prefetch", reference),
                Some(Ok(url)) => sources.push((reference.clone(), url.to_string())),
                Some(Err(reason)) => failures.push(AssetFailure {
                    reference: reference.clone(),
                    source: reference.clone(),
                    reason,
                }),
            }
        }

        let mut pending: Vec<String> = Vec::new();
        for (_, source) in &sources {
            if self.is_embedded(source) || self.failed.contains_key(source) || pending.contains(source) {
                continue;
            }
            if !self.reuse_from_disk(source) {
                pending.push(source.clone());
            }
        }
        if !pending.is_empty() {
            self.fetch_all(pending, cancel).await;
        }

        let mut texts = Vec::new();
        for (reference, source) in sources {
            match self.embedded.get(&source).and_then(|uri| data_uri_bytes(uri)) {
                Some(bytes) => texts.push(String::from_utf8_lossy(&bytes).into_owned()),
                None => {
                    let reason = self
                        .failed
                        .get(&source)
                        .cloned()
                        .unwrap_or_else(|| FailureKind::Cancelled.to_string());
                    failures.push(AssetFailure {
                        reference,
                        source,
                        reason,
                    });
                }
            }
        }
        (texts, failures)
    }

    async fn fetch_all(&mut self, sources: Vec<String>, cancel: &CancellationToken) {
        let fetcher = self.fetcher.clone();
        let results: Vec<(String, Result<FetchedResource, FetchError>)> = stream::iter(sources)
            .map(|source| {
                let fetcher = fetcher.clone();
                let cancel = cancel.clone();
                async move {
                    if cancel.is_cancelled() {
                        let err = FetchError::new(FailureKind::Cancelled, "run cancelled");
                        return (source, Err(err));
                    }
                    let result = fetcher.fetch(&source).await;
                    (source, result)
                }
            })
            .buffered(self.concurrency)
            .collect()
            .await;

        for (source, result) in results {
            match result {
                Ok(resource) => {
                    self.fetches += 1;
                    self.store(&source, resource);
                }
                Err(err) if err.kind == FailureKind::Cancelled => {
                    engine_debug!("asset {} skipped: run cancelled", source);
                }
                Err(err) => {
                    self.fetches += 1;
                    engine_warn!("asset {} failed: {}", source, err);
                    self.failed.insert(source, err.to_string());
                }
            }
        }
    }

    fn store(&mut self, source: &str, resource: FetchedResource) {
        let path = match Url::parse(source) {
            Ok(url) => self.disk_path(&url),
            Err(_) => self.asset_dir.join(short_hash(source)),
        };
        if let Err(err) = AtomicFileWriter::write_bytes(&path, &resource.bytes) {
            engine_warn!("could not write asset {}: {}", path.display(), err);
        } else {
            engine_trace!("asset {} stored at {}", source, path.display());
        }
        let mime = resource
            .metadata
            .content_type
            .as_deref()
            .and_then(|ct| ct.split(';').next())
            .map(str::trim)
            .filter(|ct| !ct.is_empty())
            .map(str::to_string)
            .unwrap_or_else(|| mime_from_extension(&path).to_string());
        self.embedded
            .insert(source.to_string(), data_uri(&mime, &resource.bytes));
    }

    fn reuse_from_disk(&mut self, source: &str) -> bool {
        let Ok(url) = Url::parse(source) else {
            return false;
        };
        let path = self.disk_path(&url);
        match fs::read(&path) {
            Ok(bytes) => {
                engine_trace!("asset {} reused from {}", source, path.display());
                let uri = data_uri(mime_from_extension(&path), &bytes);
                self.embedded.insert(source.to_string(), uri);
                true
            }
            Err(_) => false,
        }
    }
}

fn data_uri(mime: &str, bytes: &[u8]) -> String {
    format!("data:{mime};base64,{}", STANDARD.encode(bytes))
}

fn data_uri_bytes(uri: &str) -> Option<Vec<u8>> {
    let (_, payload) = uri.split_once(";base64,")?;
    STANDARD.decode(payload).ok()
}

fn mime_from_extension(path: &Path) -> &'static str {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    match ext.as_str() {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "webp" => "image/webp",
        "ico" => "image/x-icon",
        "css" => "text/css",
        "woff" => "font/woff",
        "woff2" => "font/woff2",
        "ttf" => "font/ttf",
        _ => "application/octet-stream",
    }
}

fn safe_segment(segment: &str) -> String {
    if segment == "." || segment == ".." {
        return "_".to_string();
    }
    segment
        .chars()
        .map(|c| match c {
            '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}' => '_',
            _ => c,
        })
        .collect()
}

fn with_suffix(file: &str, suffix: &str) -> String {
    match file.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() => format!("{stem}-{suffix}.{ext}"),
        _ => format!("{file}-{suffix}"),
    }
}
