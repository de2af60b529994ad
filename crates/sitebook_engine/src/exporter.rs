use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use engine_logging::{engine_debug, engine_info, engine_trace, engine_warn};
use scraper::Selector;
use tokio_util::sync::CancellationToken;

use crate::assets::AssetResolver;
use crate::config::SiteConfig;
use crate::convert::PageConverter;
use crate::layout::RunLayout;
use crate::markup::{parse_selector, PageDocument, SelectorError};
use crate::persist::{AtomicFileWriter, PersistError};
use crate::render::SessionSlot;
use crate::styles::StyleCache;
use crate::{PageExport, RenderError};

#[derive(Debug, thiserror::Error)]
pub enum ExportError {
    #[error("navigation to {url} failed: {source}")]
    Navigation {
        url: String,
        #[source]
        source: RenderError,
    },
    #[error("cannot read markup of {url}: {source}")]
    Source {
        url: String,
        #[source]
        source: RenderError,
    },
    #[error("no table on {url}")]
    MissingTable { url: String },
    #[error("cannot write {}: {source}", .path.display())]
    Write {
        path: PathBuf,
        #[source]
        source: PersistError,
    },
}

/// Per-run exporter caches that a checkpoint carries over.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExporterState {
    pub activated_controls: Vec<String>,
    pub style_rules: BTreeMap<String, String>,
}

/// Exports one page: fetch, link discovery, normalization, persistence.
#[async_trait::async_trait]
pub trait PageExporter: Send {
    async fn export_page(&mut self, index: usize, url: &str) -> Result<PageExport, ExportError>;

    fn state(&self) -> ExporterState {
        ExporterState::default()
    }

    /// Release the render session and other transient resources.
    async fn shutdown(&mut self) {}
}

/// Normalization and discovery settings of [`DocumentExporter`].
#[derive(Debug, Clone)]
pub struct ExportSettings {
    pub structural_tags: Vec<String>,
    pub strip_scripts: bool,
    pub styled_tags: Vec<String>,
    pub menu_controls: Selector,
    pub menu_links: Selector,
    pub anchors: Selector,
    pub click_offset: (i32, i32),
    pub settle_delay: Duration,
    /// Site stylesheet text written into every page head.
    pub site_styles: Vec<String>,
}

impl ExportSettings {
    pub fn from_config(config: &SiteConfig) -> Result<Self, SelectorError> {
        Ok(Self {
            structural_tags: config.structural_tags_to_strip.clone(),
            strip_scripts: config.strip_scripts,
            styled_tags: config.styled_tags.clone(),
            menu_controls: parse_selector(&config.menu_control_selector)?,
            menu_links: parse_selector(&config.menu_link_selector)?,
            anchors: parse_selector("a[href]")?,
            click_offset: config.click_offset,
            settle_delay: config.settle_delay(),
            site_styles: Vec::new(),
        })
    }
}

pub struct DocumentExporter {
    slot: SessionSlot,
    styles: StyleCache,
    assets: AssetResolver,
    converter: Arc<dyn PageConverter>,
    layout: RunLayout,
    settings: ExportSettings,
    activated: BTreeSet<String>,
    cancel: CancellationToken,
}

impl DocumentExporter {
    pub fn new(
        slot: SessionSlot,
        styles: StyleCache,
        assets: AssetResolver,
        converter: Arc<dyn PageConverter>,
        layout: RunLayout,
        settings: ExportSettings,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            slot,
            styles,
            assets,
            converter,
            layout,
            settings,
            activated: BTreeSet::new(),
            cancel,
        }
    }

    /// Controls already clicked in an earlier, interrupted run.
    pub fn with_activated(mut self, controls: impl IntoIterator<Item = String>) -> Self {
        self.activated.extend(controls);
        self
    }

    pub fn slot(&mut self) -> &mut SessionSlot {
        &mut self.slot
    }

    pub fn styles(&self) -> &StyleCache {
        &self.styles
    }

    pub fn assets(&self) -> &AssetResolver {
        &self.assets
    }

    pub fn activated_controls(&self) -> impl Iterator<Item = &str> {
        self.activated.iter().map(String::as_str)
    }

    /// Click every not-yet-activated menu control once and collect the links
    /// its menu reveals.
    async fn menu_links(&mut self, raw: &str) -> Vec<String> {
        let controls = ids_in(raw, &self.settings.menu_controls);
        let (dx, dy) = self.settings.click_offset;
        let delay = self.settings.settle_delay;
        let mut found = Vec::new();

        for id in controls {
            if self.activated.contains(&id) || self.cancel.is_cancelled() {
                continue;
            }
            let session = self.slot.session();
            match session.click(&id).await {
                Ok(()) => {}
                Err(RenderError::ElementNotFound(_)) => {
                    engine_debug!("menu control #{} not clickable, skipped", id);
                    continue;
                }
                Err(err) => {
                    engine_warn!("clicking menu control #{} failed: {}", id, err);
                    continue;
                }
            }
            session.settle(delay).await;
            match session.page_source().await {
                Ok(live) => found.extend(hrefs_in(&live, &self.settings.menu_links)),
                Err(err) => engine_warn!("cannot read menu of #{}: {}", id, err),
            }
            if let Err(err) = session.click_offset(&id, dx, dy).await {
                engine_debug!("dismissing menu #{} failed: {}", id, err);
            }
            session.settle(delay).await;
            engine_trace!("menu control #{} activated", id);
            self.activated.insert(id);
        }
        found
    }

    fn stripped(&self, raw: &str) -> PageDocument {
        let mut doc = PageDocument::parse(raw);
        for tag in &self.settings.structural_tags {
            if !doc.remove_first(tag) {
                engine_trace!("no <{}> to strip", tag);
            }
        }
        if self.settings.strip_scripts {
            doc.remove_all("script");
        }
        doc
    }

    /// Strip, embed assets and append the page stylesheet. The document is
    /// parsed again for the final rewrite; parsing is deterministic, so node
    /// ids from the first pass address the same elements.
    async fn normalize(&mut self, raw: &str) -> (String, Vec<crate::AssetFailure>) {
        let (refs, classes) = {
            let doc = self.stripped(raw);
            (doc.asset_refs(), doc.class_names())
        };

        let embedded = self.assets.embed(&refs, &self.cancel).await;
        let css = self
            .styles
            .stylesheet(&self.settings.styled_tags, &classes, self.slot.session())
            .await;

        let mut doc = self.stripped(raw);
        for replacement in embedded.replacements {
            doc.set_attr(replacement.node, replacement.attr, replacement.value);
        }
        for style in &self.settings.site_styles {
            doc.append_head_style(style.as_str());
        }
        doc.append_head_style(css);
        (doc.to_html(), embedded.failures)
    }
}

#[async_trait::async_trait]
impl PageExporter for DocumentExporter {
    async fn export_page(&mut self, index: usize, url: &str) -> Result<PageExport, ExportError> {
        engine_info!("exporting #{} {}", index, url);
        self.slot
            .navigate(url)
            .await
            .map_err(|source| ExportError::Navigation {
                url: url.to_string(),
                source,
            })?;
        let raw = self
            .slot
            .session()
            .page_source()
            .await
            .map_err(|source| ExportError::Source {
                url: url.to_string(),
                source,
            })?;

        let mut links = self.menu_links(&raw).await;
        links.extend(hrefs_in(&raw, &self.settings.anchors));
        let mut seen = HashSet::new();
        links.retain(|link| seen.insert(link.clone()));

        let (html, asset_failures) = self.normalize(&raw).await;
        let content_path = self.layout.content_file(url);
        AtomicFileWriter::write_str(&content_path, &html).map_err(|source| ExportError::Write {
            path: content_path.clone(),
            source,
        })?;

        let artifact = self
            .layout
            .artifact_file(index, url, self.converter.format().extension());
        let artifact_path = match self.converter.convert(&content_path, &artifact) {
            Ok(()) => Some(artifact),
            Err(err) => {
                engine_warn!("conversion of {} failed: {}", url, err);
                None
            }
        };

        Ok(PageExport {
            index,
            url: url.to_string(),
            content_path,
            artifact_path,
            links,
            asset_failures,
        })
    }

    fn state(&self) -> ExporterState {
        ExporterState {
            activated_controls: self.activated.iter().cloned().collect(),
            style_rules: self
                .styles
                .rules()
                .iter()
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        }
    }

    async fn shutdown(&mut self) {
        self.slot.close().await;
    }
}

fn hrefs_in(markup: &str, selector: &Selector) -> Vec<String> {
    PageDocument::parse(markup).hrefs(selector)
}

fn ids_in(markup: &str, selector: &Selector) -> Vec<String> {
    PageDocument::parse(markup).ids(selector)
}
