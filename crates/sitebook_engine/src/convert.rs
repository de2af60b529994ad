use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use crate::persist::{AtomicFileWriter, PersistError};

/// Page separator of the paged text format.
pub const PAGE_BREAK: char = '\u{c}';

#[derive(Debug, thiserror::Error)]
pub enum ConversionError {
    #[error("cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot write artifact: {0}")]
    Write(#[from] PersistError),
    #[error("converter failed: {0}")]
    Backend(String),
}

/// Turns one normalized content document into a page artifact.
pub trait PageConverter: Send + Sync {
    fn convert(&self, content: &Path, artifact: &Path) -> Result<(), ConversionError>;

    fn format(&self) -> &dyn ArtifactFormat;
}

/// How artifacts are split into pages and joined back together.
pub trait ArtifactFormat: Send + Sync {
    fn extension(&self) -> &str;

    fn split_pages(&self, artifact: &str) -> Vec<String>;

    fn join_pages(&self, pages: &[String]) -> String;
}

/// Plain text with form feeds between pages.
#[derive(Debug, Default, Clone, Copy)]
pub struct PagedText {
    extension: &'static str,
}

impl PagedText {
    pub const fn new(extension: &'static str) -> Self {
        Self { extension }
    }
}

impl ArtifactFormat for PagedText {
    fn extension(&self) -> &str {
        if self.extension.is_empty() {
            "txt"
        } else {
            self.extension
        }
    }

    /// Every segment is a page, blank ones included; an empty artifact is
    /// one empty page.
    fn split_pages(&self, artifact: &str) -> Vec<String> {
        artifact
            .strip_suffix('\n')
            .unwrap_or(artifact)
            .split(PAGE_BREAK)
            .map(|page| page.trim_matches('\n').to_string())
            .collect()
    }

    fn join_pages(&self, pages: &[String]) -> String {
        let sep = format!("\n{PAGE_BREAK}\n");
        let mut out = pages.join(&sep);
        if !out.is_empty() {
            out.push('\n');
        }
        out
    }
}

/// Markdown artifacts via `html2md`.
#[derive(Debug, Clone, Copy)]
pub struct MarkdownConverter {
    format: PagedText,
}

impl Default for MarkdownConverter {
    fn default() -> Self {
        Self {
            format: PagedText::new("md"),
        }
    }
}

impl PageConverter for MarkdownConverter {
    fn convert(&self, content: &Path, artifact: &Path) -> Result<(), ConversionError> {
        let html = fs::read_to_string(content).map_err(|source| ConversionError::Read {
            path: content.to_path_buf(),
            source,
        })?;
        let markdown = html2md::parse_html(&html);
        let markdown = markdown.replace(PAGE_BREAK, "");
        AtomicFileWriter::write_str(artifact, markdown.trim())?;
        Ok(())
    }

    fn format(&self) -> &dyn ArtifactFormat {
        &self.format
    }
}
