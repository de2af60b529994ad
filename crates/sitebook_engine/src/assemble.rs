use std::fmt;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use engine_logging::{engine_info, engine_warn};
use serde_json::json;

use crate::convert::ArtifactFormat;
use crate::persist::{AtomicFileWriter, PersistError};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MissingArtifact {
    pub index: usize,
    pub url: String,
    pub expected: PathBuf,
}

impl fmt::Display for MissingArtifact {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{} {} ({})", self.index, self.url, self.expected.display())
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AssemblyError {
    #[error("nothing to assemble")]
    Empty,
    #[error("{} page artifact(s) missing: {}", .0.len(), list(.0))]
    MissingArtifacts(Vec<MissingArtifact>),
    #[error("cannot read artifact {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("cannot write compiled artifact: {0}")]
    Write(#[from] PersistError),
}

fn list(missing: &[MissingArtifact]) -> String {
    missing
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssembledPage {
    pub index: usize,
    pub url: String,
    pub artifact: PathBuf,
    pub pages: usize,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AssemblySummary {
    pub output_path: PathBuf,
    pub manifest_path: Option<PathBuf>,
    pub page_count: usize,
    pub entries: Vec<AssembledPage>,
}

/// Concatenate the artifact of every visited page, in history order, into
/// `output`.
///
/// Every artifact is located before anything is read; if any is missing, all
/// of them are reported and no output is produced. Artifacts are then read
/// one at a time, so the number of pages is not bounded by open handles.
pub fn assemble(
    history: &[String],
    artifact_for: impl Fn(usize, &str) -> PathBuf,
    format: &dyn ArtifactFormat,
    output: &Path,
    manifest: Option<&Path>,
) -> Result<AssemblySummary, AssemblyError> {
    if history.is_empty() {
        return Err(AssemblyError::Empty);
    }

    let mut located: Vec<(usize, &str, PathBuf)> = Vec::with_capacity(history.len());
    let mut missing = Vec::new();
    for (index, url) in history.iter().enumerate() {
        let path = artifact_for(index, url);
        match fs::metadata(&path) {
            Ok(_) => located.push((index, url.as_str(), path)),
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                engine_warn!("artifact for {} not found at {}", url, path.display());
                missing.push(MissingArtifact {
                    index,
                    url: url.clone(),
                    expected: path,
                });
            }
            Err(source) => return Err(AssemblyError::Read { path, source }),
        }
    }
    if !missing.is_empty() {
        return Err(AssemblyError::MissingArtifacts(missing));
    }

    let mut pages = Vec::new();
    let mut entries = Vec::with_capacity(located.len());
    for (index, url, path) in located {
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(source) => return Err(AssemblyError::Read { path, source }),
        };
        let split = format.split_pages(&text);
        entries.push(AssembledPage {
            index,
            url: url.to_string(),
            artifact: path,
            pages: split.len(),
        });
        pages.extend(split);
    }

    AtomicFileWriter::write_str(output, &format.join_pages(&pages))?;
    engine_info!(
        "compiled {} pages from {} documents into {}",
        pages.len(),
        entries.len(),
        output.display()
    );

    let manifest_path = match manifest {
        Some(path) => {
            let doc = json!({
                "compiled": output.file_name().map(|n| n.to_string_lossy().into_owned()),
                "page_count": pages.len(),
                "documents": entries.iter().map(|e| {
                    json!({
                        "index": e.index,
                        "url": e.url,
                        "artifact": e.artifact.file_name().map(|n| n.to_string_lossy().into_owned()),
                        "pages": e.pages,
                    })
                }).collect::<Vec<_>>()
            });
            let body = serde_json::to_string_pretty(&doc).unwrap_or_else(|_| doc.to_string());
            AtomicFileWriter::write_str(path, &body)?;
            Some(path.to_path_buf())
        }
        None => None,
    };

    Ok(AssemblySummary {
        output_path: output.to_path_buf(),
        manifest_path,
        page_count: pages.len(),
        entries,
    })
}
