use std::collections::{BTreeMap, HashMap};

use engine_logging::{engine_debug, engine_trace, engine_warn};

use crate::render::{RenderSession, StyleTarget};
use crate::RenderError;

/// Memoized presentation rules keyed by tag or class name.
///
/// A key is resolved through the render session at most once per run. Keys
/// whose element is missing on the current page are not cached and are tried
/// again on later pages.
#[derive(Debug, Clone, Default)]
pub struct StyleCache {
    rules: HashMap<String, String>,
    allowed_properties: Vec<String>,
    overrides: BTreeMap<String, Vec<(String, String)>>,
    backend_queries: usize,
}

impl StyleCache {
    pub fn new(allowed_properties: Vec<String>) -> Self {
        Self {
            allowed_properties,
            ..Self::default()
        }
    }

    /// Extra declarations placed before the computed ones of `key`.
    pub fn with_overrides(mut self, overrides: BTreeMap<String, Vec<(String, String)>>) -> Self {
        self.overrides = overrides;
        self
    }

    /// Seed previously resolved rules, e.g. from a checkpoint.
    pub fn with_rules(mut self, rules: impl IntoIterator<Item = (String, String)>) -> Self {
        self.rules.extend(rules);
        self
    }

    pub fn cached(&self, key: &str) -> Option<&str> {
        self.rules.get(key).map(String::as_str)
    }

    pub fn rules(&self) -> &HashMap<String, String> {
        &self.rules
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// How many times the render session was asked for a computed style.
    pub fn backend_queries(&self) -> usize {
        self.backend_queries
    }

    pub async fn resolve(&mut self, key: &str, session: &mut dyn RenderSession) -> Option<String> {
        if let Some(rule) = self.rules.get(key) {
            engine_trace!("style cache hit for {}", key);
            return Some(rule.clone());
        }

        let tag = StyleTarget::Tag(key.to_string());
        let (target, declarations) = match self.query(&tag, session).await {
            Ok(decls) => (tag, decls),
            Err(RenderError::ElementNotFound(_)) => {
                let class = StyleTarget::Class(key.to_string());
                match self.query(&class, session).await {
                    Ok(decls) => (class, decls),
                    Err(RenderError::ElementNotFound(_)) => {
                        engine_debug!("no element for style key {} on this page", key);
                        return None;
                    }
                    Err(err) => {
                        engine_warn!("style lookup for .{} failed: {}", key, err);
                        return None;
                    }
                }
            }
            Err(err) => {
                engine_warn!("style lookup for {} failed: {}", key, err);
                return None;
            }
        };

        let rule = self.synthesize(key, &target, declarations);
        self.rules.insert(key.to_string(), rule.clone());
        Some(rule)
    }

    /// Stylesheet for one page: the styled tags first, then the page's
    /// classes. Keys that cannot be resolved are left out.
    pub async fn stylesheet(
        &mut self,
        styled_tags: &[String],
        classes: &[String],
        session: &mut dyn RenderSession,
    ) -> String {
        let mut css = String::new();
        for key in styled_tags.iter().chain(classes) {
            if let Some(rule) = self.resolve(key, session).await {
                css.push_str(&rule);
            }
        }
        css
    }

    async fn query(
        &mut self,
        target: &StyleTarget,
        session: &mut dyn RenderSession,
    ) -> Result<Vec<(String, String)>, RenderError> {
        self.backend_queries += 1;
        session.computed_style(target, &self.allowed_properties).await
    }

    fn synthesize(&self, key: &str, target: &StyleTarget, computed: Vec<(String, String)>) -> String {
        let mut rule = format!("{} {{ ", target.selector());
        let extra = self.overrides.get(key).into_iter().flatten();
        for (property, value) in extra.chain(computed.iter()) {
            if value.trim().is_empty() {
                continue;
            }
            rule.push_str(property);
            rule.push_str(": ");
            rule.push_str(value.trim());
            rule.push_str("; ");
        }
        rule.push_str("} ");
        rule
    }
}
