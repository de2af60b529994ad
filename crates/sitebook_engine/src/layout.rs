use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};

use crate::persist::{ensure_dir, PersistError};

const MAX_SLUG_LEN: usize = 120;

/// File names and directories of one run, rooted at
/// `<export_dir>/<token>_v<version>/`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunLayout {
    root: PathBuf,
    identifier: String,
    token: String,
    seed_url: String,
    separator: char,
}

impl RunLayout {
    pub fn new(export_dir: &Path, token: &str, version: &str, seed_url: &str, separator: char) -> Self {
        let token = sanitize(token);
        let identifier = format!("{token}_v{}", sanitize(version));
        Self {
            root: export_dir.join(&identifier),
            identifier,
            token,
            seed_url: seed_url.to_string(),
            separator,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// `<token>_v<version>`
    pub fn identifier(&self) -> &str {
        &self.identifier
    }

    pub fn content_dir(&self) -> PathBuf {
        self.root.join("html")
    }

    pub fn asset_dir(&self) -> PathBuf {
        self.content_dir().join("static")
    }

    pub fn artifact_dir(&self) -> PathBuf {
        self.root.join("pages")
    }

    /// CSV files of the table exporter.
    pub fn table_dir(&self) -> PathBuf {
        self.root.join("csv")
    }

    pub fn log_file(&self) -> PathBuf {
        self.root.join("sitebook.log")
    }

    pub fn checkpoint_file(&self) -> PathBuf {
        self.root.join("checkpoint.ron")
    }

    pub fn manifest_file(&self) -> PathBuf {
        self.root.join("manifest.json")
    }

    pub fn compiled_file(&self, extension: &str) -> PathBuf {
        self.root.join(format!("{}_compiled.{extension}", self.identifier))
    }

    pub fn content_file(&self, url: &str) -> PathBuf {
        self.content_dir().join(format!("{}.html", self.slug(url)))
    }

    pub fn artifact_file(&self, index: usize, url: &str, extension: &str) -> PathBuf {
        self.artifact_dir()
            .join(format!("page_{index}_{}.{extension}", self.slug(url)))
    }

    pub fn table_file(&self, url: &str) -> PathBuf {
        self.table_dir().join(format!("{}.csv", self.slug(url)))
    }

    /// URL turned into a file stem: the seed URL becomes the token prefix,
    /// path separators become `_`.
    pub fn slug(&self, url: &str) -> String {
        let replaced = url.replace(&self.seed_url, &self.token);
        let replaced: String = replaced
            .chars()
            .map(|c| if c == self.separator { '_' } else { c })
            .collect();
        let slug = sanitize(&replaced);
        if slug.len() > MAX_SLUG_LEN {
            let mut cut = MAX_SLUG_LEN;
            while !slug.is_char_boundary(cut) {
                cut -= 1;
            }
            format!("{}-{}", &slug[..cut], short_hash(url))
        } else {
            slug
        }
    }

    /// Create the root, content, asset and artifact directories.
    pub fn ensure(&self) -> Result<(), PersistError> {
        ensure_dir(&self.root)?;
        ensure_dir(&self.content_dir())?;
        ensure_dir(&self.asset_dir())?;
        ensure_dir(&self.artifact_dir())
    }
}

fn sanitize(input: &str) -> String {
    let cleaned: String = input
        .chars()
        .map(|c| if is_forbidden(c) { '_' } else { c })
        .collect();
    let cleaned = cleaned.trim_matches(&['_', ' ', '.'][..]);

    let mut compacted = String::with_capacity(cleaned.len());
    let mut prev_underscore = false;
    for c in cleaned.chars() {
        if c == '_' && prev_underscore {
            continue;
        }
        prev_underscore = c == '_';
        compacted.push(c);
    }
    if compacted.is_empty() {
        compacted.push_str("index");
    }
    if is_reserved_windows_name(&compacted) {
        compacted.push('_');
    }
    compacted
}

fn is_forbidden(c: char) -> bool {
    matches!(c, '\\' | '/' | ':' | '*' | '?' | '"' | '<' | '>' | '|' | '\0'..='\u{1F}')
}

fn is_reserved_windows_name(name: &str) -> bool {
    const RESERVED: &[&str] = &[
        "CON", "PRN", "AUX", "NUL", "COM1", "COM2", "COM3", "COM4", "COM5", "COM6", "COM7", "COM8",
        "COM9", "LPT1", "LPT2", "LPT3", "LPT4", "LPT5", "LPT6", "LPT7", "LPT8", "LPT9",
    ];
    RESERVED.iter().any(|r| r.eq_ignore_ascii_case(name))
}

/// First four bytes of the SHA-256 digest, hex encoded.
pub fn short_hash(input: &str) -> String {
    let digest = Sha256::digest(input.as_bytes());
    let mut hex = String::with_capacity(8);
    for byte in digest.iter().take(4) {
        use std::fmt::Write;
        let _ = write!(&mut hex, "{byte:02x}");
    }
    hex
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layout() -> RunLayout {
        RunLayout::new(Path::new("/out"), "kryx", "1.4", "https://kryx.test/5e", '/')
    }

    #[test]
    fn slug_replaces_seed_and_separators() {
        let l = layout();
        assert_eq!(l.slug("https://kryx.test/5e"), "kryx");
        assert_eq!(l.slug("https://kryx.test/5e/spells/fireball"), "kryx_spells_fireball");
    }

    #[test]
    fn paths_follow_run_layout() {
        let l = layout();
        assert_eq!(l.root(), Path::new("/out/kryx_v1.4"));
        assert_eq!(
            l.artifact_file(3, "https://kryx.test/5e/a", "md"),
            PathBuf::from("/out/kryx_v1.4/pages/page_3_kryx_a.md")
        );
        assert_eq!(l.compiled_file("md"), PathBuf::from("/out/kryx_v1.4/kryx_v1.4_compiled.md"));
        assert_eq!(l.asset_dir(), PathBuf::from("/out/kryx_v1.4/html/static"));
        assert_eq!(
            l.table_file("https://kryx.test/5e/spells"),
            PathBuf::from("/out/kryx_v1.4/csv/kryx_spells.csv")
        );
    }

    #[test]
    fn foreign_urls_are_sanitized() {
        let l = layout();
        assert_eq!(l.slug("https://other.test/x?y=1"), "https_other.test_x_y=1");
    }

    #[test]
    fn short_hash_is_stable() {
        assert_eq!(short_hash("abc"), "ba7816bf");
    }
}
