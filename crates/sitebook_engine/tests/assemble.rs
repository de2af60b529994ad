use std::fs;
use std::path::{Path, PathBuf};

use pretty_assertions::assert_eq;
use sitebook_engine::{assemble, AssemblyError, PagedText};
use tempfile::TempDir;

fn history() -> Vec<String> {
    vec![
        "https://site.test/a".to_string(),
        "https://site.test/b".to_string(),
        "https://site.test/c".to_string(),
    ]
}

fn artifact(dir: &Path, index: usize) -> PathBuf {
    dir.join(format!("page_{index}.md"))
}

#[test]
fn artifacts_are_concatenated_in_history_order() {
    let temp = TempDir::new().unwrap();
    for (index, body) in ["A", "B", "C"].iter().enumerate() {
        fs::write(artifact(temp.path(), index), body).unwrap();
    }
    let output = temp.path().join("out.md");
    let manifest = temp.path().join("manifest.json");

    let summary = assemble(
        &history(),
        |index, _url| artifact(temp.path(), index),
        &PagedText::new("md"),
        &output,
        Some(&manifest),
    )
    .unwrap();

    assert_eq!(summary.page_count, 3);
    assert_eq!(fs::read_to_string(&output).unwrap(), "A\n\u{c}\nB\n\u{c}\nC\n");

    let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(&manifest).unwrap()).unwrap();
    let urls: Vec<&str> = json["documents"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["url"].as_str().unwrap())
        .collect();
    assert_eq!(urls, history().iter().map(String::as_str).collect::<Vec<_>>());
    assert_eq!(json["page_count"], 3);
}

#[test]
fn multi_page_artifacts_keep_their_pages() {
    let temp = TempDir::new().unwrap();
    fs::write(artifact(temp.path(), 0), "A1\n\u{c}\nA2").unwrap();
    fs::write(artifact(temp.path(), 1), "B").unwrap();
    let output = temp.path().join("out.md");

    let summary = assemble(
        &history()[..2],
        |index, _url| artifact(temp.path(), index),
        &PagedText::new("md"),
        &output,
        None,
    )
    .unwrap();

    assert_eq!(summary.page_count, 3);
    assert_eq!(summary.entries[0].pages, 2);
    assert_eq!(summary.entries[1].pages, 1);
    assert_eq!(summary.manifest_path, None);
}

#[test]
fn every_missing_artifact_is_reported_and_nothing_is_written() {
    let temp = TempDir::new().unwrap();
    fs::write(artifact(temp.path(), 0), "A").unwrap();
    let output = temp.path().join("out.md");

    let err = assemble(
        &history(),
        |index, _url| artifact(temp.path(), index),
        &PagedText::new("md"),
        &output,
        None,
    )
    .unwrap_err();

    match err {
        AssemblyError::MissingArtifacts(missing) => {
            let urls: Vec<&str> = missing.iter().map(|m| m.url.as_str()).collect();
            assert_eq!(urls, vec!["https://site.test/b", "https://site.test/c"]);
            assert_eq!(missing[0].index, 1);
            assert_eq!(missing[0].expected, artifact(temp.path(), 1));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!output.exists());
}

#[test]
fn empty_history_is_an_error() {
    let temp = TempDir::new().unwrap();
    let err = assemble(
        &[],
        |index, _url| artifact(temp.path(), index),
        &PagedText::new("md"),
        &temp.path().join("out.md"),
        None,
    )
    .unwrap_err();
    assert!(matches!(err, AssemblyError::Empty));
}

#[test]
fn blank_artifact_still_counts_as_one_page() {
    let temp = TempDir::new().unwrap();
    for (index, body) in ["A", "", "C"].iter().enumerate() {
        fs::write(artifact(temp.path(), index), body).unwrap();
    }
    let output = temp.path().join("out.md");

    let summary = assemble(
        &history(),
        |index, _url| artifact(temp.path(), index),
        &PagedText::new("md"),
        &output,
        None,
    )
    .unwrap();

    assert_eq!(summary.page_count, 3);
    let pages: Vec<usize> = summary.entries.iter().map(|e| e.pages).collect();
    assert_eq!(pages, vec![1, 1, 1]);
    assert_eq!(fs::read_to_string(&output).unwrap(), "A\n\u{c}\n\n\u{c}\nC\n");
}

#[test]
fn unreadable_artifact_is_a_read_error_not_a_missing_one() {
    let temp = TempDir::new().unwrap();
    fs::write(artifact(temp.path(), 0), "A").unwrap();
    fs::create_dir(artifact(temp.path(), 1)).unwrap();
    fs::write(artifact(temp.path(), 2), "C").unwrap();
    let output = temp.path().join("out.md");

    let err = assemble(
        &history(),
        |index, _url| artifact(temp.path(), index),
        &PagedText::new("md"),
        &output,
        None,
    )
    .unwrap_err();

    match err {
        AssemblyError::Read { path, .. } => assert_eq!(path, artifact(temp.path(), 1)),
        other => panic!("unexpected error: {other}"),
    }
    assert!(!output.exists());
}

#[test]
fn more_artifacts_than_open_file_limit_are_assembled() {
    let temp = TempDir::new().unwrap();
    let history: Vec<String> = (0..2000).map(|i| format!("https://site.test/{i}")).collect();
    for index in 0..history.len() {
        fs::write(artifact(temp.path(), index), format!("page {index}")).unwrap();
    }
    let output = temp.path().join("out.md");

    let summary = assemble(
        &history,
        |index, _url| artifact(temp.path(), index),
        &PagedText::new("md"),
        &output,
        None,
    )
    .unwrap();

    assert_eq!(summary.page_count, 2000);
    assert!(fs::read_to_string(&output).unwrap().ends_with("page 1999\n"));
}
