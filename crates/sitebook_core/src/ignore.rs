use std::collections::HashSet;

#[derive(Debug, Clone, thiserror::Error, PartialEq, Eq)]
pub enum IgnoreSetError {
    #[error("ignore entry {position} is empty")]
    EmptyEntry { position: usize },
    #[error("ignore entry {entry:?} has a wildcard that is not at the end")]
    MisplacedWildcard { entry: String },
}

/// URLs that are never crawled nor exported.
///
/// Plain entries match exactly. An entry ending in `*` matches every URL
/// starting with the text before the star.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IgnoreSet {
    exact: HashSet<String>,
    prefixes: Vec<String>,
}

impl IgnoreSet {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn parse<I, S>(entries: I) -> Result<Self, IgnoreSetError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut set = IgnoreSet::default();
        for (position, entry) in entries.into_iter().enumerate() {
            let entry = entry.as_ref().trim();
            if entry.is_empty() {
                return Err(IgnoreSetError::EmptyEntry { position });
            }
            match entry.find('*') {
                None => {
                    set.exact.insert(entry.to_string());
                }
                Some(star) if star == entry.len() - 1 && star > 0 => {
                    set.prefixes.push(entry[..star].to_string());
                }
                Some(_) => {
                    return Err(IgnoreSetError::MisplacedWildcard {
                        entry: entry.to_string(),
                    })
                }
            }
        }
        Ok(set)
    }

    pub fn matches(&self, url: &str) -> bool {
        self.exact.contains(url) || self.prefixes.iter().any(|p| url.starts_with(p.as_str()))
    }

    pub fn len(&self) -> usize {
        self.exact.len() + self.prefixes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
