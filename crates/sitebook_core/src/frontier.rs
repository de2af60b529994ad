use std::collections::{HashSet, VecDeque};

/// Pending URLs, depth-first: new discoveries go in front of older work.
///
/// The hash index mirrors the deque so membership checks stay O(1) while the
/// deque keeps the visiting order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Frontier {
    queue: VecDeque<String>,
    index: HashSet<String>,
}

impl Frontier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    pub fn contains(&self, url: &str) -> bool {
        self.index.contains(url)
    }

    pub fn head(&self) -> Option<&str> {
        self.queue.front().map(String::as_str)
    }

    /// Push one URL at the head. Returns false if it was already queued.
    pub fn push_front(&mut self, url: impl Into<String>) -> bool {
        let url = url.into();
        if !self.index.insert(url.clone()) {
            return false;
        }
        self.queue.push_front(url);
        true
    }

    /// Put a discovery batch in front of the queue, keeping the batch order:
    /// the first URL of the batch becomes the new head.
    pub fn push_batch_front(&mut self, batch: Vec<String>) {
        for url in batch.into_iter().rev() {
            self.push_front(url);
        }
    }

    pub fn remove(&mut self, url: &str) -> bool {
        if !self.index.remove(url) {
            return false;
        }
        if let Some(pos) = self.queue.iter().position(|queued| queued == url) {
            self.queue.remove(pos);
        }
        true
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.queue.iter().map(String::as_str)
    }

    pub fn to_vec(&self) -> Vec<String> {
        self.queue.iter().cloned().collect()
    }
}

impl FromIterator<String> for Frontier {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut frontier = Frontier::new();
        for url in iter {
            if frontier.index.insert(url.clone()) {
                frontier.queue.push_back(url);
            }
        }
        frontier
    }
}
