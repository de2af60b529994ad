use crate::CrawlPhase;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CrawlSummary {
    pub phase: CrawlPhase,
    pub visited: usize,
    pub queued: usize,
    pub failed: usize,
    pub current: Option<String>,
    pub stopped: Option<String>,
}
