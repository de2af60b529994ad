//! Sitebook core: pure traversal state machine and crawl bookkeeping.
mod classify;
mod effect;
mod frontier;
mod history;
mod ignore;
mod msg;
mod state;
mod summary;
mod update;

pub use classify::{resolve_reference, Classifier, Verdict};
pub use effect::Effect;
pub use frontier::Frontier;
pub use history::History;
pub use ignore::{IgnoreSet, IgnoreSetError};
pub use msg::Msg;
pub use state::{CrawlPhase, CrawlSettings, CrawlSnapshot, CrawlState, PageFailure};
pub use summary::CrawlSummary;
pub use update::update;
