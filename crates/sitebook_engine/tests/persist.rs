use std::fs;

use sitebook_engine::{ensure_dir, remove_dir_if_present, AtomicFileWriter};
use tempfile::TempDir;

#[test]
fn creates_missing_directories_idempotently() {
    let temp = TempDir::new().unwrap();
    let nested = temp.path().join("out").join("html").join("static");
    assert!(!nested.exists());
    ensure_dir(&nested).unwrap();
    ensure_dir(&nested).unwrap();
    assert!(nested.is_dir());
}

#[test]
fn ensure_dir_rejects_a_file() {
    let temp = TempDir::new().unwrap();
    let file = temp.path().join("plain");
    fs::write(&file, "x").unwrap();
    assert!(ensure_dir(&file).is_err());
}

#[test]
fn atomic_write_replaces_existing_file() {
    let temp = TempDir::new().unwrap();
    let target = temp.path().join("pages").join("doc.md");

    AtomicFileWriter::write_str(&target, "hello").unwrap();
    assert_eq!(fs::read_to_string(&target).unwrap(), "hello");

    AtomicFileWriter::write_bytes(&target, b"world").unwrap();
    assert_eq!(fs::read_to_string(&target).unwrap(), "world");
    assert_eq!(fs::read_dir(target.parent().unwrap()).unwrap().count(), 1);
}

#[test]
fn no_partial_file_on_error() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("not_a_dir");
    fs::write(&file_path, "x").unwrap();

    let result = AtomicFileWriter::write_str(&file_path.join("doc.md"), "data");
    assert!(result.is_err());
    assert_eq!(fs::read_to_string(&file_path).unwrap(), "x");
}

#[test]
fn removing_an_absent_directory_is_fine() {
    let temp = TempDir::new().unwrap();
    let dir = temp.path().join("html");
    assert!(!remove_dir_if_present(&dir).unwrap());
    fs::create_dir_all(dir.join("static")).unwrap();
    assert!(remove_dir_if_present(&dir).unwrap());
    assert!(!dir.exists());
}
