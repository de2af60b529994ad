#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use scraper::{Html, Selector};
use sitebook_engine::{
    FailureKind, FetchError, FetchMetadata, FetchedResource, RenderError, RenderSession,
    ResourceFetcher, SessionFactory, SiteConfig, StyleTarget,
};

pub const PREFIX: &str = "https://site.test";
pub const SEED: &str = "https://site.test/5e";

pub fn url(path: &str) -> String {
    format!("{PREFIX}{path}")
}

pub fn page(title: &str, body: &str) -> String {
    format!("<html><head><title>{title}</title></head><body>{body}</body></html>")
}

/// Config for a local test site: no pauses, fixed version.
pub fn test_config(export_dir: &Path) -> SiteConfig {
    SiteConfig {
        seed_url: SEED.to_string(),
        url_prefix: PREFIX.to_string(),
        replacement_token: "SITE".to_string(),
        settle_delay_ms: 0,
        page_delay_ms: 0,
        version: Some("1.0".to_string()),
        export_dir: export_dir.to_path_buf(),
        ..SiteConfig::default()
    }
}

/// Serves fixed bodies and counts requests per URL.
#[derive(Default)]
pub struct CountingFetcher {
    bodies: HashMap<String, (Vec<u8>, Option<String>)>,
    counts: Mutex<HashMap<String, usize>>,
}

impl CountingFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, url: impl Into<String>, body: impl Into<Vec<u8>>, content_type: Option<&str>) -> Self {
        self.bodies
            .insert(url.into(), (body.into(), content_type.map(str::to_string)));
        self
    }

    pub fn with_page(self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.with(url, html.into().into_bytes(), Some("text/html; charset=utf-8"))
    }

    pub fn count(&self, url: &str) -> usize {
        self.counts.lock().unwrap().get(url).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.counts.lock().unwrap().values().sum()
    }
}

#[async_trait::async_trait]
impl ResourceFetcher for CountingFetcher {
    async fn fetch(&self, url: &str) -> Result<FetchedResource, FetchError> {
        *self.counts.lock().unwrap().entry(url.to_string()).or_default() += 1;
        let (bytes, content_type) = self
            .bodies
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::new(FailureKind::HttpStatus(404), "404 Not Found"))?;
        Ok(FetchedResource {
            metadata: FetchMetadata {
                requested_url: url.to_string(),
                final_url: url.to_string(),
                content_type,
            },
            bytes,
        })
    }
}

/// What fake sessions were asked to do, shared across recreated sessions.
#[derive(Debug, Default)]
pub struct Journal {
    pub sessions_created: usize,
    pub navigations: Vec<String>,
    pub clicks: Vec<String>,
    pub style_queries: Vec<StyleTarget>,
    /// `selector` of every `click_matching` call that clicked something.
    pub expansions: Vec<String>,
    lost: HashSet<String>,
}

/// Scripted site for [`FakeSession`]: pages, menus revealed by clicking
/// controls, and computed styles per selector.
#[derive(Default)]
pub struct FakeSite {
    pages: HashMap<String, String>,
    menus: HashMap<String, String>,
    styles: HashMap<String, Vec<(String, String)>>,
    expanded: HashMap<String, String>,
    lose_session_on: HashSet<String>,
}

impl FakeSite {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn page(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.pages.insert(url.into(), html.into());
        self
    }

    pub fn menu(mut self, control_id: &str, markup: &str) -> Self {
        self.menus.insert(control_id.to_string(), markup.to_string());
        self
    }

    pub fn style(mut self, selector: &str, declarations: &[(&str, &str)]) -> Self {
        self.styles.insert(
            selector.to_string(),
            declarations
                .iter()
                .map(|(p, v)| (p.to_string(), v.to_string()))
                .collect(),
        );
        self
    }

    /// Markup `url` shows once something on it was clicked by selector.
    pub fn expanded(mut self, url: impl Into<String>, html: impl Into<String>) -> Self {
        self.expanded.insert(url.into(), html.into());
        self
    }

    /// The first navigation to `url` kills the session.
    pub fn lose_session_on(mut self, url: impl Into<String>) -> Self {
        self.lose_session_on.insert(url.into());
        self
    }

    pub fn factory(self) -> (Arc<FakeFactory>, Arc<Mutex<Journal>>) {
        let journal = Arc::new(Mutex::new(Journal::default()));
        let factory = Arc::new(FakeFactory {
            site: Arc::new(self),
            journal: journal.clone(),
        });
        (factory, journal)
    }
}

pub struct FakeFactory {
    site: Arc<FakeSite>,
    journal: Arc<Mutex<Journal>>,
}

#[async_trait::async_trait]
impl SessionFactory for FakeFactory {
    async fn create(&self) -> Result<Box<dyn RenderSession>, RenderError> {
        self.journal.lock().unwrap().sessions_created += 1;
        Ok(Box::new(FakeSession {
            site: self.site.clone(),
            journal: self.journal.clone(),
            current: None,
            open_menu: None,
            expanded: false,
            alive: true,
        }))
    }
}

pub struct FakeSession {
    site: Arc<FakeSite>,
    journal: Arc<Mutex<Journal>>,
    current: Option<String>,
    open_menu: Option<String>,
    expanded: bool,
    alive: bool,
}

impl FakeSession {
    fn markup(&self) -> Result<String, RenderError> {
        if !self.alive {
            return Err(RenderError::SessionLost);
        }
        let url = self
            .current
            .as_ref()
            .ok_or_else(|| RenderError::Backend("no page".into()))?;
        let pages = if self.expanded { &self.site.expanded } else { &self.site.pages };
        let html = pages
            .get(url)
            .or_else(|| self.site.pages.get(url))
            .cloned()
            .unwrap_or_default();
        Ok(match self.open_menu.as_ref().and_then(|id| self.site.menus.get(id)) {
            Some(menu) => html.replace("</body>", &format!("{menu}</body>")),
            None => html,
        })
    }

    fn has_match(&self, selector: &str) -> Result<bool, RenderError> {
        let markup = self.markup()?;
        let selector = Selector::parse(selector).map_err(|e| RenderError::Backend(e.to_string()))?;
        let doc = Html::parse_document(&markup);
        let found = doc.select(&selector).next().is_some();
        Ok(found)
    }
}

#[async_trait::async_trait]
impl RenderSession for FakeSession {
    async fn navigate(&mut self, url: &str) -> Result<(), RenderError> {
        if !self.alive {
            return Err(RenderError::SessionLost);
        }
        {
            let mut journal = self.journal.lock().unwrap();
            journal.navigations.push(url.to_string());
            if self.site.lose_session_on.contains(url) && journal.lost.insert(url.to_string()) {
                self.alive = false;
                return Err(RenderError::SessionLost);
            }
        }
        if !self.site.pages.contains_key(url) {
            return Err(FetchError::new(FailureKind::HttpStatus(404), "404 Not Found").into());
        }
        self.current = Some(url.to_string());
        self.open_menu = None;
        self.expanded = false;
        Ok(())
    }

    async fn page_source(&mut self) -> Result<String, RenderError> {
        self.markup()
    }

    async fn computed_style(
        &mut self,
        target: &StyleTarget,
        properties: &[String],
    ) -> Result<Vec<(String, String)>, RenderError> {
        self.journal.lock().unwrap().style_queries.push(target.clone());
        let selector = target.selector();
        if !self.has_match(&selector)? {
            return Err(RenderError::ElementNotFound(selector));
        }
        Ok(self
            .site
            .styles
            .get(&selector)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|(p, _)| properties.contains(p))
            .collect())
    }

    async fn click(&mut self, element_id: &str) -> Result<(), RenderError> {
        if !self.has_match(&format!("#{element_id}"))? {
            return Err(RenderError::ElementNotFound(format!("#{element_id}")));
        }
        self.journal.lock().unwrap().clicks.push(element_id.to_string());
        self.open_menu = Some(element_id.to_string());
        Ok(())
    }

    async fn click_offset(&mut self, element_id: &str, _dx: i32, _dy: i32) -> Result<(), RenderError> {
        if !self.has_match(&format!("#{element_id}"))? {
            return Err(RenderError::ElementNotFound(format!("#{element_id}")));
        }
        self.open_menu = None;
        Ok(())
    }

    async fn click_matching(&mut self, selector: &str, skip: usize) -> Result<usize, RenderError> {
        let markup = self.markup()?;
        let parsed = Selector::parse(selector).map_err(|e| RenderError::Backend(e.to_string()))?;
        let clicked = Html::parse_document(&markup)
            .select(&parsed)
            .count()
            .saturating_sub(skip);
        if clicked > 0 {
            self.journal.lock().unwrap().expansions.push(selector.to_string());
            self.expanded = true;
        }
        Ok(clicked)
    }

    async fn settle(&mut self, _delay: Duration) {}

    fn is_alive(&self) -> bool {
        self.alive
    }

    async fn close(&mut self) {
        self.alive = false;
    }
}
