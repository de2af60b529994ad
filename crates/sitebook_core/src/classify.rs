use crate::{Frontier, History, IgnoreSet};

const FRAGMENT_MARKER: char = '#';

/// Why a discovered reference was accepted or turned away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verdict {
    Eligible,
    Ignored,
    AlreadyVisited,
    AlreadyQueued,
    External,
    Fragment,
}

impl Verdict {
    pub fn is_eligible(self) -> bool {
        self == Verdict::Eligible
    }
}

/// Pure eligibility check for discovered references.
///
/// Must be handed the current History and Frontier on every call; both
/// change between pages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classifier {
    external_marker: String,
}

impl Classifier {
    pub fn new(external_marker: impl Into<String>) -> Self {
        Self {
            external_marker: external_marker.into(),
        }
    }

    pub fn classify(
        &self,
        candidate: &str,
        resolved: &str,
        ignore: &IgnoreSet,
        history: &History,
        frontier: &Frontier,
    ) -> Verdict {
        if ignore.matches(candidate) || ignore.matches(resolved) {
            return Verdict::Ignored;
        }
        if history.contains(candidate) || history.contains(resolved) {
            return Verdict::AlreadyVisited;
        }
        if frontier.contains(candidate) || frontier.contains(resolved) {
            return Verdict::AlreadyQueued;
        }
        if !self.external_marker.is_empty() && candidate.contains(self.external_marker.as_str()) {
            return Verdict::External;
        }
        if candidate.contains(FRAGMENT_MARKER) {
            return Verdict::Fragment;
        }
        Verdict::Eligible
    }

    pub fn is_eligible(
        &self,
        candidate: &str,
        resolved: &str,
        ignore: &IgnoreSet,
        history: &History,
        frontier: &Frontier,
    ) -> bool {
        self.classify(candidate, resolved, ignore, history, frontier)
            .is_eligible()
    }
}

impl Default for Classifier {
    fn default() -> Self {
        Self::new("http")
    }
}

/// Qualify a relative reference with the site prefix.
pub fn resolve_reference(url_prefix: &str, candidate: &str) -> String {
    format!("{url_prefix}{candidate}")
}
