use assert_cmd::cargo::cargo_bin_cmd;
use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::Value;
use std::path::Path;
use tempfile::TempDir;

fn cli(data_dir: &Path) -> Command {
    let mut cmd = cargo_bin_cmd!("smartpdf-cli");
    cmd.arg("--data-dir")
        .arg(data_dir)
        .env_remove("SMARTPDF_DATA_DIR")
        .env_remove("SMARTPDF_RECENT_CAPACITY")
        .env_remove("RUST_LOG");
    cmd
}

fn json_stdout(cmd: &mut Command) -> Value {
    let output = cmd.assert().success().get_output().stdout.clone();
    serde_json::from_slice(&output).expect("stdout should contain valid json")
}

fn pdf(dir: &TempDir, name: &str) -> std::path::PathBuf {
    let path = dir.path().join(name);
    std::fs::write(&path, b"%PDF-1.7\n%%EOF\n").expect("fixture should be written");
    path
}

#[test]
fn version_prints_package_version() {
    cargo_bin_cmd!("smartpdf-cli")
        .arg("version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn recent_list_starts_empty() {
    let data = tempfile::tempdir().expect("temp dir should be created");

    let value = json_stdout(cli(data.path()).args(["recent", "list"]));

    assert_eq!(value, Value::Array(Vec::new()));
}

#[test]
fn recent_add_records_file_metadata() {
    let data = tempfile::tempdir().expect("temp dir should be created");
    let files = tempfile::tempdir().expect("temp dir should be created");
    let path = pdf(&files, "report.pdf");

    let added = json_stdout(cli(data.path()).args(["recent", "add"]).arg(&path));

    assert_eq!(added["name"], "report.pdf");
    assert_eq!(added["size"], 15);
    assert_eq!(added["mimeType"], "application/pdf");
    assert!(added["lastOpened"].is_i64());
    assert!(added["uri"].as_str().expect("uri").starts_with("file://"));

    let listed = json_stdout(cli(data.path()).args(["recent", "list"]));
    assert_eq!(listed.as_array().map(Vec::len), Some(1));
    assert_eq!(listed[0]["id"], added["id"]);
}

#[test]
fn recent_list_is_most_recent_first_and_capped() {
    let data = tempfile::tempdir().expect("temp dir should be created");
    let files = tempfile::tempdir().expect("temp dir should be created");

    for name in ["a.pdf", "b.pdf", "c.pdf"] {
        cli(data.path())
            .env("SMARTPDF_RECENT_CAPACITY", "2")
            .args(["recent", "add"])
            .arg(pdf(&files, name))
            .assert()
            .success();
        // lastOpened has millisecond resolution
        std::thread::sleep(std::time::Duration::from_millis(5));
    }

    let listed = json_stdout(cli(data.path()).args(["recent", "list"]));
    let names: Vec<&str> = listed
        .as_array()
        .expect("array")
        .iter()
        .filter_map(|doc| doc["name"].as_str())
        .collect();
    assert_eq!(names, ["c.pdf", "b.pdf"]);
}

#[test]
fn recent_remove_and_clear() {
    let data = tempfile::tempdir().expect("temp dir should be created");
    let files = tempfile::tempdir().expect("temp dir should be created");
    let first = json_stdout(cli(data.path()).args(["recent", "add"]).arg(pdf(&files, "a.pdf")));
    json_stdout(cli(data.path()).args(["recent", "add"]).arg(pdf(&files, "b.pdf")));

    let id = first["id"].as_str().expect("id");
    let remaining = json_stdout(cli(data.path()).args(["recent", "remove", id]));
    assert_eq!(remaining.as_array().map(Vec::len), Some(1));
    assert_eq!(remaining[0]["name"], "b.pdf");

    let cleared = json_stdout(cli(data.path()).args(["recent", "clear"]));
    assert_eq!(cleared, Value::Array(Vec::new()));
}

#[test]
fn recent_add_fails_for_missing_file() {
    let data = tempfile::tempdir().expect("temp dir should be created");

    cli(data.path())
        .args(["recent", "add"])
        .arg(data.path().join("missing.pdf"))
        .assert()
        .failure()
        .stderr(predicate::str::contains("file does not exist"));
}

#[test]
fn invalid_capacity_is_rejected() {
    let data = tempfile::tempdir().expect("temp dir should be created");

    cli(data.path())
        .env("SMARTPDF_RECENT_CAPACITY", "0")
        .args(["recent", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("SMARTPDF_RECENT_CAPACITY"));
}

#[test]
fn ocr_set_get_show_clear() {
    let data = tempfile::tempdir().expect("temp dir should be created");

    cli(data.path())
        .args(["ocr", "set", "docX", "1", "hello", "--confidence", "0.85"])
        .assert()
        .success();
    cli(data.path()).args(["ocr", "set", "docX", "3", "third"]).assert().success();

    let page = json_stdout(cli(data.path()).args(["ocr", "get", "docX", "1"]));
    assert_eq!(page["text"], "hello");
    assert_eq!(page["source"], "cache");

    let miss = json_stdout(cli(data.path()).args(["ocr", "get", "docX", "2"]));
    assert_eq!(miss, Value::Null);

    let all = json_stdout(cli(data.path()).args(["ocr", "show", "docX"]));
    let pages: Vec<u64> =
        all.as_array().expect("array").iter().filter_map(|r| r["pageNumber"].as_u64()).collect();
    assert_eq!(pages, [1, 3]);

    cli(data.path()).args(["ocr", "clear"]).assert().success();
    let all = json_stdout(cli(data.path()).args(["ocr", "show", "docX"]));
    assert_eq!(all, Value::Array(Vec::new()));
}

#[test]
fn ocr_get_reads_legacy_page_entries() {
    let data = tempfile::tempdir().expect("temp dir should be created");
    std::fs::write(data.path().join("ocr_cache_docX_2.kv"), "legacy text")
        .expect("legacy entry should be written");

    let page = json_stdout(cli(data.path()).args(["ocr", "get", "docX", "2"]));

    assert_eq!(page["text"], "legacy text");
    assert_eq!(page["source"], "legacy");
    assert_eq!(page["confidence"], Value::Null);
}

#[test]
fn ocr_clear_for_one_document_keeps_others() {
    let data = tempfile::tempdir().expect("temp dir should be created");
    cli(data.path()).args(["ocr", "set", "a", "1", "one"]).assert().success();
    cli(data.path()).args(["ocr", "set", "b", "1", "uno"]).assert().success();

    cli(data.path()).args(["ocr", "clear", "--document", "a"]).assert().success();

    let a = json_stdout(cli(data.path()).args(["ocr", "show", "a"]));
    let b = json_stdout(cli(data.path()).args(["ocr", "show", "b"]));
    assert_eq!(a, Value::Array(Vec::new()));
    assert_eq!(b.as_array().map(Vec::len), Some(1));
}

#[test]
fn ocr_rejects_page_zero() {
    let data = tempfile::tempdir().expect("temp dir should be created");

    cli(data.path())
        .args(["ocr", "set", "docX", "0", "text"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("1-based"));
}

#[test]
fn settings_show_defaults() {
    let data = tempfile::tempdir().expect("temp dir should be created");

    let settings = json_stdout(cli(data.path()).args(["settings", "show"]));

    assert_eq!(settings["darkMode"], false);
    assert_eq!(settings["autoOCR"], false);
    assert_eq!(settings["ocrLanguage"], "eng");
    assert_eq!(settings["notifications"], true);
}

#[test]
fn settings_set_merges_and_keeps_types() {
    let data = tempfile::tempdir().expect("temp dir should be created");

    cli(data.path()).args(["settings", "set", "darkMode", "true"]).assert().success();
    cli(data.path()).args(["settings", "set", "ocrLanguage", "fra"]).assert().success();
    let settings = json_stdout(cli(data.path()).args(["settings", "set", "customFlag", "42"]));

    assert_eq!(settings["darkMode"], true);
    assert_eq!(settings["ocrLanguage"], "fra");
    assert_eq!(settings["customFlag"], 42);
    assert_eq!(settings["autoSave"], true);
}

#[test]
fn corrupt_settings_fall_back_to_defaults() {
    let data = tempfile::tempdir().expect("temp dir should be created");
    std::fs::write(data.path().join("settings.kv"), "{not json").expect("entry should be written");

    let settings = json_stdout(cli(data.path()).args(["settings", "show"]));

    assert_eq!(settings["ocrLanguage"], "eng");
}
