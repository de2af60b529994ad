use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::summary::CrawlSummary;
use crate::{Classifier, Frontier, History, IgnoreSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CrawlPhase {
    #[default]
    Idle,
    Seeding,
    Visiting,
    Draining,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlSettings {
    pub seed_url: String,
    pub url_prefix: String,
    pub ignore: IgnoreSet,
    pub classifier: Classifier,
}

impl CrawlSettings {
    pub fn new(seed_url: impl Into<String>, url_prefix: impl Into<String>) -> Self {
        Self {
            seed_url: seed_url.into(),
            url_prefix: url_prefix.into(),
            ignore: IgnoreSet::empty(),
            classifier: Classifier::default(),
        }
    }

    pub fn with_ignore(mut self, ignore: IgnoreSet) -> Self {
        self.ignore = ignore;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageFailure {
    pub index: usize,
    pub url: String,
    pub reason: String,
}

/// Serializable traversal position, enough to continue an interrupted run.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CrawlSnapshot {
    pub frontier: Vec<String>,
    pub history: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CrawlState {
    settings: CrawlSettings,
    phase: CrawlPhase,
    frontier: Frontier,
    history: History,
    in_flight: Option<String>,
    failures: Vec<PageFailure>,
    skipped: Vec<String>,
    stop_reason: Option<String>,
}

impl CrawlState {
    pub fn new(settings: CrawlSettings) -> Self {
        Self {
            settings,
            phase: CrawlPhase::Idle,
            frontier: Frontier::new(),
            history: History::new(),
            in_flight: None,
            failures: Vec::new(),
            skipped: Vec::new(),
            stop_reason: None,
        }
    }

    /// Rebuild an idle state from a snapshot. `Msg::Start` continues where
    /// the snapshot left off instead of seeding again.
    pub fn resume(settings: CrawlSettings, snapshot: CrawlSnapshot) -> Self {
        let mut state = Self::new(settings);
        state.history = snapshot.history.into_iter().collect();
        state.frontier = snapshot.frontier.into_iter().collect();
        state
    }

    pub fn snapshot(&self) -> CrawlSnapshot {
        CrawlSnapshot {
            frontier: self.frontier.to_vec(),
            history: self.history.as_slice().to_vec(),
        }
    }

    pub fn settings(&self) -> &CrawlSettings {
        &self.settings
    }

    pub fn phase(&self) -> CrawlPhase {
        self.phase
    }

    pub fn frontier(&self) -> &Frontier {
        &self.frontier
    }

    pub fn history(&self) -> &History {
        &self.history
    }

    pub fn failures(&self) -> &[PageFailure] {
        &self.failures
    }

    /// Queued URLs dropped at claim time because the ignore-set excludes them.
    pub fn skipped(&self) -> &[String] {
        &self.skipped
    }

    pub fn in_flight(&self) -> Option<&str> {
        self.in_flight.as_deref()
    }

    pub fn stop_reason(&self) -> Option<&str> {
        self.stop_reason.as_deref()
    }

    pub fn view(&self) -> CrawlSummary {
        CrawlSummary {
            phase: self.phase,
            visited: self.history.len(),
            queued: self.frontier.len(),
            failed: self.failures.len(),
            current: self.in_flight.clone(),
            stopped: self.stop_reason.clone(),
        }
    }

    pub(crate) fn set_phase(&mut self, phase: CrawlPhase) {
        self.phase = phase;
    }

    /// Whether an absolute URL may not be exported. Ignore entries are
    /// matched against the URL itself and, except for the seed, against its
    /// prefix-relative form.
    pub fn is_excluded(&self, url: &str) -> bool {
        let ignore = &self.settings.ignore;
        if ignore.matches(url) {
            return true;
        }
        url != self.settings.seed_url
            && url
                .strip_prefix(self.settings.url_prefix.as_str())
                .is_some_and(|relative| !relative.is_empty() && ignore.matches(relative))
    }

    pub(crate) fn seed(&mut self) {
        let seed = self.settings.seed_url.clone();
        if self.is_excluded(&seed) {
            self.skipped.push(seed);
            return;
        }
        self.frontier.push_front(seed.clone());
        self.history.record(&seed);
    }

    /// Claim the Frontier head: it is recorded as visited right away.
    ///
    /// Queued URLs the ignore-set now excludes (a checkpoint written under
    /// an older ignore list) are dropped unless they already hold an export
    /// index.
    pub(crate) fn claim_head(&mut self) -> Option<(usize, String)> {
        loop {
            let url = self.frontier.head()?.to_string();
            if !self.history.contains(&url) && self.is_excluded(&url) {
                self.frontier.remove(&url);
                self.skipped.push(url);
                continue;
            }
            let index = self.history.record(&url);
            self.in_flight = Some(url.clone());
            return Some((index, url));
        }
    }

    pub(crate) fn take_in_flight(&mut self, url: &str) -> bool {
        if self.in_flight.as_deref() != Some(url) {
            return false;
        }
        self.in_flight = None;
        true
    }

    /// Filter a discovery batch and put the survivors in front of the
    /// Frontier. Returns how many were accepted.
    pub(crate) fn enqueue_discovered(&mut self, links: Vec<String>) -> usize {
        let mut batch: Vec<String> = Vec::new();
        let mut seen = HashSet::new();
        for candidate in links {
            let resolved = crate::resolve_reference(&self.settings.url_prefix, &candidate);
            let verdict = self.settings.classifier.classify(
                &candidate,
                &resolved,
                &self.settings.ignore,
                &self.history,
                &self.frontier,
            );
            if verdict.is_eligible() && seen.insert(resolved.clone()) {
                batch.push(resolved);
            }
        }
        let count = batch.len();
        self.frontier.push_batch_front(batch);
        count
    }

    pub(crate) fn finish_page(&mut self, url: &str) {
        self.frontier.remove(url);
    }

    pub(crate) fn record_failure(&mut self, url: &str, reason: String) {
        let index = self.history.index_of(url).unwrap_or(self.history.len());
        self.failures.push(PageFailure {
            index,
            url: url.to_string(),
            reason,
        });
    }

    pub(crate) fn set_stop_reason(&mut self, reason: String) {
        self.stop_reason = Some(reason);
    }
}
