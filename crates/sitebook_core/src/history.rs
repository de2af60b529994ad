use std::collections::HashMap;

/// Append-only visiting order. The position of a URL is its export index.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    order: Vec<String>,
    index: HashMap<String, usize>,
}

impl History {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a visit and return the export index. Recording a URL that is
    /// already present returns its original index and appends nothing.
    pub fn record(&mut self, url: &str) -> usize {
        if let Some(&existing) = self.index.get(url) {
            return existing;
        }
        let position = self.order.len();
        self.order.push(url.to_string());
        self.index.insert(url.to_string(), position);
        position
    }

    pub fn contains(&self, url: &str) -> bool {
        self.index.contains_key(url)
    }

    pub fn index_of(&self, url: &str) -> Option<usize> {
        self.index.get(url).copied()
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }
}

impl FromIterator<String> for History {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut history = History::new();
        for url in iter {
            history.record(&url);
        }
        history
    }
}

#[cfg(test)]
mod tests {
    use super::History;

    #[test]
    fn record_is_idempotent_and_keeps_first_index() {
        let mut history = History::new();
        assert_eq!(history.record("s"), 0);
        assert_eq!(history.record("a"), 1);
        assert_eq!(history.record("s"), 0);
        assert_eq!(history.len(), 2);
        assert_eq!(history.index_of("a"), Some(1));
    }
}
