use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use sitebook_core::{IgnoreSet, IgnoreSetError};
use url::Url;

use crate::fetch::FetchSettings;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("cannot read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("cannot parse config: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("seed_url is required")]
    MissingSeed,
    #[error("{field} is not an absolute URL: {value}")]
    InvalidUrl { field: &'static str, value: String },
    #[error("ignore_list: {0}")]
    Ignore(#[from] IgnoreSetError),
    #[error("{field} must not be empty")]
    Empty { field: &'static str },
    #[error("invalid selector in {field}: {message}")]
    Selector { field: &'static str, message: String },
}

/// What the crawl does after a page fails to export.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum PageFailurePolicy {
    /// Record the failure and continue with the next page.
    #[default]
    Skip,
    /// Stop crawling; the frontier is kept for a later resume.
    Abort,
}

/// Which exporter handles each visited page.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum ExporterKind {
    /// Normalized HTML per page, converted and compiled into one document.
    #[default]
    Document,
    /// One CSV file per page, read from the page's first table.
    Table(TableConfig),
}

/// Settings of the table exporter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableConfig {
    pub table_selector: String,
    /// Controls that reveal collapsed rows. All but the first
    /// `expand_skip` matches are clicked before the table is read.
    pub expand_selector: String,
    pub expand_skip: usize,
    /// Names given to the cells of a row, left to right. Empty means the
    /// table's own header cells; extra cells are dropped.
    pub column_order: Vec<String>,
    /// Cells that hold their column's name when set, e.g. `ritual`.
    pub boolean_columns: Vec<String>,
    /// Comma-separated cells whose commas become `;`.
    pub list_columns: Vec<String>,
    /// When set, every data row is followed by a detail row whose markup
    /// lands in this column.
    pub detail_column: Option<String>,
    pub follow_links: bool,
}

impl Default for TableConfig {
    fn default() -> Self {
        Self {
            table_selector: "table".to_string(),
            expand_selector: r#"button[aria-label="Show more"]"#.to_string(),
            expand_skip: 1,
            column_order: Vec::new(),
            boolean_columns: Vec::new(),
            list_columns: Vec::new(),
            detail_column: None,
            follow_links: false,
        }
    }
}

/// Site and run settings, usually loaded from a RON file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub seed_url: String,
    /// Prepended to relative links. Empty means the seed URL's origin.
    pub url_prefix: String,
    pub replacement_token: String,
    pub separator_char: char,
    pub ignore_list: Vec<String>,
    pub external_marker: String,

    pub structural_tags_to_strip: Vec<String>,
    pub strip_scripts: bool,
    pub allowed_style_properties: Vec<String>,
    pub styled_tags: Vec<String>,
    pub style_overrides: BTreeMap<String, Vec<(String, String)>>,
    /// Site stylesheets downloaded once and added to every exported page.
    pub stylesheets: Vec<String>,
    pub exporter: ExporterKind,

    pub menu_control_selector: String,
    pub menu_link_selector: String,
    pub click_offset: (i32, i32),
    pub startup_clicks: Vec<String>,
    pub settle_delay_ms: u64,
    pub page_delay_ms: u64,
    pub retry_on_session_loss: bool,

    pub export_dir: PathBuf,
    pub version: Option<String>,
    pub changelog_url: Option<String>,
    pub version_selector: String,
    pub keep_content: bool,
    pub keep_artifacts: bool,
    pub on_page_failure: PageFailurePolicy,
    pub resume: bool,

    pub connect_timeout_ms: u64,
    pub request_timeout_ms: u64,
    pub redirect_limit: usize,
    pub max_page_bytes: u64,
    pub max_asset_bytes: u64,
    pub asset_concurrency: usize,
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            seed_url: String::new(),
            url_prefix: String::new(),
            replacement_token: "site".to_string(),
            separator_char: '/',
            ignore_list: Vec::new(),
            external_marker: "http".to_string(),
            structural_tags_to_strip: strings(&["header", "footer"]),
            strip_scripts: true,
            allowed_style_properties: strings(&[
                "color",
                "background-color",
                "font-family",
                "font-size",
                "font-style",
                "font-weight",
                "line-height",
                "text-align",
                "text-decoration",
                "text-transform",
                "margin",
                "padding",
                "border",
                "border-collapse",
                "width",
                "display",
            ]),
            styled_tags: strings(&[
                "body", "h1", "h2", "h3", "h4", "h5", "h6", "p", "a", "ul", "ol", "li", "table",
                "thead", "tbody", "tr", "th", "td", "blockquote", "em", "strong",
            ]),
            style_overrides: BTreeMap::new(),
            stylesheets: Vec::new(),
            exporter: ExporterKind::Document,
            menu_control_selector: r#"button[type="button"][id]"#.to_string(),
            menu_link_selector: r#"a[role="menuitem"]"#.to_string(),
            click_offset: (-5, -5),
            startup_clicks: Vec::new(),
            settle_delay_ms: 1500,
            page_delay_ms: 3000,
            retry_on_session_loss: true,
            export_dir: PathBuf::from("."),
            version: None,
            changelog_url: None,
            version_selector: "h1".to_string(),
            keep_content: true,
            keep_artifacts: true,
            on_page_failure: PageFailurePolicy::Skip,
            resume: false,
            connect_timeout_ms: 10_000,
            request_timeout_ms: 30_000,
            redirect_limit: 5,
            max_page_bytes: 5 * 1024 * 1024,
            max_asset_bytes: 20 * 1024 * 1024,
            asset_concurrency: 4,
        }
    }
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}

impl SiteConfig {
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_ron_str(&text)
    }

    pub fn from_ron_str(text: &str) -> Result<Self, ConfigError> {
        Ok(ron::from_str(text)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.seed_url.trim().is_empty() {
            return Err(ConfigError::MissingSeed);
        }
        absolute("seed_url", &self.seed_url)?;
        if !self.url_prefix.is_empty() {
            absolute("url_prefix", &self.url_prefix)?;
        }
        if let Some(changelog) = &self.changelog_url {
            absolute("changelog_url", changelog)?;
        }
        if self.replacement_token.trim().is_empty() {
            return Err(ConfigError::Empty {
                field: "replacement_token",
            });
        }
        if self.external_marker.is_empty() {
            return Err(ConfigError::Empty {
                field: "external_marker",
            });
        }
        self.ignore_set()?;
        for (field, selector) in [
            ("menu_control_selector", &self.menu_control_selector),
            ("menu_link_selector", &self.menu_link_selector),
            ("version_selector", &self.version_selector),
        ] {
            selector_field(field, selector)?;
        }
        if let ExporterKind::Table(table) = &self.exporter {
            selector_field("table_selector", &table.table_selector)?;
            selector_field("expand_selector", &table.expand_selector)?;
            if table.column_order.iter().any(|c| c.trim().is_empty()) {
                return Err(ConfigError::Empty {
                    field: "column_order entry",
                });
            }
        }
        Ok(())
    }

    /// The prefix joined with relative links.
    pub fn effective_prefix(&self) -> String {
        if !self.url_prefix.is_empty() {
            return self.url_prefix.trim_end_matches('/').to_string();
        }
        match Url::parse(&self.seed_url) {
            Ok(url) => url.origin().ascii_serialization(),
            Err(_) => String::new(),
        }
    }

    pub fn ignore_set(&self) -> Result<IgnoreSet, IgnoreSetError> {
        IgnoreSet::parse(self.ignore_list.iter().map(String::as_str))
    }

    pub fn settle_delay(&self) -> Duration {
        Duration::from_millis(self.settle_delay_ms)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn page_fetch(&self) -> FetchSettings {
        FetchSettings {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            redirect_limit: self.redirect_limit,
            max_bytes: self.max_page_bytes,
            ..FetchSettings::pages()
        }
    }

    pub fn asset_fetch(&self) -> FetchSettings {
        FetchSettings {
            connect_timeout: Duration::from_millis(self.connect_timeout_ms),
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            redirect_limit: self.redirect_limit,
            max_bytes: self.max_asset_bytes,
            ..FetchSettings::assets()
        }
    }
}

fn selector_field(field: &'static str, selector: &str) -> Result<(), ConfigError> {
    crate::markup::parse_selector(selector)
        .map(|_| ())
        .map_err(|err| ConfigError::Selector {
            field,
            message: err.message,
        })
}

fn absolute(field: &'static str, value: &str) -> Result<(), ConfigError> {
    match Url::parse(value) {
        Ok(url) if url.has_host() => Ok(()),
        _ => Err(ConfigError::InvalidUrl {
            field,
            value: value.to_string(),
        }),
    }
}
