use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::Path;

use engine_logging::engine_info;
use serde::{Deserialize, Serialize};
use sitebook_core::CrawlSnapshot;

use crate::persist::{AtomicFileWriter, PersistError};

#[derive(Debug, thiserror::Error)]
pub enum CheckpointError {
    #[error("cannot read checkpoint: {0}")]
    Read(#[from] io::Error),
    #[error("cannot parse checkpoint: {0}")]
    Parse(#[from] ron::error::SpannedError),
    #[error("cannot serialize checkpoint: {0}")]
    Serialize(#[from] ron::Error),
    #[error("cannot write checkpoint: {0}")]
    Write(#[from] PersistError),
}

/// Traversal position plus the per-run caches worth keeping across a
/// restart.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    pub seed_url: String,
    pub saved_at: String,
    pub crawl: CrawlSnapshot,
    pub activated_controls: Vec<String>,
    pub style_rules: BTreeMap<String, String>,
}

impl Checkpoint {
    /// `Ok(None)` when no checkpoint was written yet.
    pub fn load(path: &Path) -> Result<Option<Self>, CheckpointError> {
        let text = match fs::read_to_string(path) {
            Ok(text) => text,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(err) => return Err(err.into()),
        };
        let checkpoint: Checkpoint = ron::from_str(&text)?;
        engine_info!(
            "loaded checkpoint from {}: {} visited, {} queued",
            path.display(),
            checkpoint.crawl.history.len(),
            checkpoint.crawl.frontier.len()
        );
        Ok(Some(checkpoint))
    }

    pub fn save(&self, path: &Path) -> Result<(), CheckpointError> {
        let pretty = ron::ser::PrettyConfig::new();
        let text = ron::ser::to_string_pretty(self, pretty)?;
        AtomicFileWriter::write_str(path, &text)?;
        Ok(())
    }
}
