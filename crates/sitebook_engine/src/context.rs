use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::SiteConfig;
use crate::layout::RunLayout;

/// Returns the current time as text for reports and checkpoints.
pub type Clock = Arc<dyn Fn() -> String + Send + Sync>;

/// Everything a run needs besides its collaborators, passed explicitly.
#[derive(Clone)]
pub struct RunContext {
    pub config: SiteConfig,
    pub layout: RunLayout,
    pub cancel: CancellationToken,
    pub clock: Clock,
}

impl RunContext {
    pub fn new(config: SiteConfig, layout: RunLayout, cancel: CancellationToken) -> Self {
        Self {
            config,
            layout,
            cancel,
            clock: Arc::new(String::new),
        }
    }

    pub fn with_clock(mut self, clock: Clock) -> Self {
        self.clock = clock;
        self
    }

    pub fn now(&self) -> String {
        (self.clock)()
    }
}
