use std::sync::Arc;
use std::time::Duration;

use engine_logging::{engine_debug, engine_warn};
use scraper::{ElementRef, Html, Selector};

use crate::decode::decode_markup;
use crate::fetch::{FetchSettings, ReqwestFetcher, ResourceFetcher};
use crate::markup::parse_selector;
use crate::{FailureKind, FetchError, RenderError};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StyleTarget {
    Tag(String),
    Class(String),
}

impl StyleTarget {
    /// CSS selector addressing every element of this target.
    pub fn selector(&self) -> String {
        match self {
            StyleTarget::Tag(tag) => tag.clone(),
            StyleTarget::Class(class) => format!(".{class}"),
        }
    }
}

/// One stateful browsing session. Calls are strictly sequential; the session
/// keeps the current page between calls.
#[async_trait::async_trait]
pub trait RenderSession: Send {
    async fn navigate(&mut self, url: &str) -> Result<(), RenderError>;

    /// Markup of the current page as the session sees it right now.
    async fn page_source(&mut self) -> Result<String, RenderError>;

    /// Computed style of the first element matching `target`, limited to
    /// `properties`, in the order the backend reports them.
    async fn computed_style(
        &mut self,
        target: &StyleTarget,
        properties: &[String],
    ) -> Result<Vec<(String, String)>, RenderError>;

    async fn click(&mut self, element_id: &str) -> Result<(), RenderError>;

    /// Click at an offset from the element's top-left corner.
    async fn click_offset(&mut self, element_id: &str, dx: i32, dy: i32) -> Result<(), RenderError>;

    /// Click every element matching `selector` except the first `skip`, in
    /// document order. Returns how many were clicked.
    async fn click_matching(&mut self, selector: &str, skip: usize) -> Result<usize, RenderError>;

    /// Fixed pause to let asynchronous page updates land.
    async fn settle(&mut self, delay: Duration);

    fn is_alive(&self) -> bool;

    async fn close(&mut self);
}

#[async_trait::async_trait]
pub trait SessionFactory: Send + Sync {
    async fn create(&self) -> Result<Box<dyn RenderSession>, RenderError>;
}

/// Owns the live session and replaces it when the backend reports it lost.
pub struct SessionSlot {
    factory: Arc<dyn SessionFactory>,
    session: Box<dyn RenderSession>,
    recover_on_loss: bool,
    recoveries: usize,
}

impl SessionSlot {
    pub async fn open(factory: Arc<dyn SessionFactory>, recover_on_loss: bool) -> Result<Self, RenderError> {
        let session = factory.create().await?;
        Ok(Self {
            factory,
            session,
            recover_on_loss,
            recoveries: 0,
        })
    }

    pub fn session(&mut self) -> &mut dyn RenderSession {
        self.session.as_mut()
    }

    /// How many times the session was recreated during this run.
    pub fn recoveries(&self) -> usize {
        self.recoveries
    }

    /// Navigate with exactly one retry. A lost session is recreated before
    /// the retry; any other failure is retried on the same session.
    pub async fn navigate(&mut self, url: &str) -> Result<(), RenderError> {
        let first = match self.session.navigate(url).await {
            Ok(()) => return Ok(()),
            Err(err) => err,
        };
        engine_warn!("navigation to {} failed ({}), retrying once", url, first);
        if first == RenderError::SessionLost || !self.session.is_alive() {
            if !self.recover_on_loss {
                return Err(first);
            }
            self.recover().await?;
        }
        self.session.navigate(url).await
    }

    pub async fn recover(&mut self) -> Result<(), RenderError> {
        self.session.close().await;
        self.session = self.factory.create().await?;
        self.recoveries += 1;
        engine_debug!("render session recreated ({} so far)", self.recoveries);
        Ok(())
    }

    pub async fn close(&mut self) {
        self.session.close().await;
    }
}

/// Render session over plain HTTP: no script execution.
///
/// Computed styles come from inline `style` attributes, and clicks only check
/// that the element exists since static markup cannot change.
pub struct HttpSession {
    fetcher: Arc<dyn ResourceFetcher>,
    current: Option<String>,
    closed: bool,
}

impl HttpSession {
    pub fn new(fetcher: Arc<dyn ResourceFetcher>) -> Self {
        Self {
            fetcher,
            current: None,
            closed: false,
        }
    }

    fn document(&self) -> Result<Html, RenderError> {
        self.current
            .as_deref()
            .map(Html::parse_document)
            .ok_or_else(|| RenderError::Backend("no page loaded".into()))
    }

    fn ensure_open(&self) -> Result<(), RenderError> {
        if self.closed {
            Err(RenderError::SessionLost)
        } else {
            Ok(())
        }
    }

    fn require_id(&self, element_id: &str) -> Result<(), RenderError> {
        self.ensure_open()?;
        let doc = self.document()?;
        if find_first(&doc, |el| el.value().id() == Some(element_id)).is_some() {
            Ok(())
        } else {
            Err(RenderError::ElementNotFound(format!("#{element_id}")))
        }
    }
}

#[async_trait::async_trait]
impl RenderSession for HttpSession {
    async fn navigate(&mut self, url: &str) -> Result<(), RenderError> {
        self.ensure_open()?;
        let resource = self.fetcher.fetch(url).await?;
        let decoded = decode_markup(&resource.bytes, resource.metadata.content_type.as_deref())
            .map_err(|err| FetchError::new(FailureKind::Decode, err.to_string()))?;
        self.current = Some(decoded.html);
        Ok(())
    }

    async fn page_source(&mut self) -> Result<String, RenderError> {
        self.ensure_open()?;
        self.current
            .clone()
            .ok_or_else(|| RenderError::Backend("no page loaded".into()))
    }

    async fn computed_style(
        &mut self,
        target: &StyleTarget,
        properties: &[String],
    ) -> Result<Vec<(String, String)>, RenderError> {
        self.ensure_open()?;
        let doc = self.document()?;
        let element = match target {
            StyleTarget::Tag(tag) => find_first(&doc, |el| el.value().name().eq_ignore_ascii_case(tag)),
            StyleTarget::Class(class) => find_first(&doc, |el| el.value().classes().any(|c| c == class)),
        }
        .ok_or_else(|| RenderError::ElementNotFound(target.selector()))?;

        let inline = element.value().attr("style").unwrap_or_default();
        Ok(parse_declarations(inline)
            .into_iter()
            .filter(|(name, _)| properties.iter().any(|p| p.eq_ignore_ascii_case(name)))
            .collect())
    }

    async fn click(&mut self, element_id: &str) -> Result<(), RenderError> {
        self.require_id(element_id)
    }

    async fn click_offset(&mut self, element_id: &str, _dx: i32, _dy: i32) -> Result<(), RenderError> {
        self.require_id(element_id)
    }

    async fn click_matching(&mut self, selector: &str, skip: usize) -> Result<usize, RenderError> {
        self.ensure_open()?;
        let selector = parse_selector(selector).map_err(|err| RenderError::Backend(err.to_string()))?;
        let doc = self.document()?;
        let found = doc.select(&selector).count();
        Ok(found.saturating_sub(skip))
    }

    async fn settle(&mut self, delay: Duration) {
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
    }

    fn is_alive(&self) -> bool {
        !self.closed
    }

    async fn close(&mut self) {
        self.closed = true;
        self.current = None;
    }
}

/// Creates [`HttpSession`]s sharing one page fetcher.
pub struct HttpSessionFactory {
    fetcher: Arc<dyn ResourceFetcher>,
}

impl HttpSessionFactory {
    pub fn new(settings: FetchSettings) -> Self {
        Self {
            fetcher: Arc::new(ReqwestFetcher::new(settings)),
        }
    }

    pub fn with_fetcher(fetcher: Arc<dyn ResourceFetcher>) -> Self {
        Self { fetcher }
    }
}

#[async_trait::async_trait]
impl SessionFactory for HttpSessionFactory {
    async fn create(&self) -> Result<Box<dyn RenderSession>, RenderError> {
        Ok(Box::new(HttpSession::new(self.fetcher.clone())))
    }
}

fn find_first<'a>(doc: &'a Html, predicate: impl Fn(&ElementRef<'a>) -> bool) -> Option<ElementRef<'a>> {
    let all = Selector::parse("*").ok()?;
    doc.select(&all).find(|el| predicate(el))
}

/// Split an inline style attribute into lowercase property names and values.
pub(crate) fn parse_declarations(style: &str) -> Vec<(String, String)> {
    style
        .split(';')
        .filter_map(|decl| {
            let (name, value) = decl.split_once(':')?;
            let name = name.trim().to_ascii_lowercase();
            let value = value.trim();
            (!name.is_empty() && !value.is_empty()).then(|| (name, value.to_string()))
        })
        .collect()
}
