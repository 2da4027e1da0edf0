#![allow(missing_docs)]

use std::fs;
use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use flatval::{Value, Writer};
use serde_json::Value as Json;
use tempfile::TempDir;

fn setup_file(name: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join(format!("{name}.flv"));
    let doc = Value::Map(vec![
        (Value::from("id"), Value::U32(17)),
        (
            Value::from("tags"),
            Value::Set(vec![Value::from("red"), Value::from("blue")]),
        ),
        (
            Value::from("rows"),
            Value::Vector(vec![
                Value::Map(vec![(Value::from("x"), Value::I64(-1))]),
                Value::Map(vec![(Value::from("x"), Value::I64(2))]),
            ]),
        ),
    ]);
    Writer::new().write_file(&doc, &path).expect("write buffer");
    (dir, path)
}

#[test]
fn stats_json_reports_header_and_counts() {
    let (_dir, path) = setup_file("stats");
    let output = cargo_bin_cmd!("flatval")
        .args(["--format", "json", "stats"])
        .arg(&path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Json = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json["header"]["version"], 1);
    assert_eq!(json["header"]["checksum_present"], true);
    assert_eq!(json["header"]["root_kind"], "map");
    assert_eq!(json["values"]["n_maps"], 3);
    assert_eq!(json["values"]["n_sets"], 1);
    assert_eq!(json["file"]["mapped"], true);
}

#[test]
fn stats_text_without_mmap() {
    let (_dir, path) = setup_file("stats_text");
    let output = cargo_bin_cmd!("flatval")
        .args(["--no-mmap", "stats"])
        .arg(&path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let text = String::from_utf8(output).expect("utf8");
    assert!(text.contains("mapped=false"), "{text}");
    assert!(text.contains("maps=3"), "{text}");
}

#[test]
fn verify_full_and_fast_succeed() {
    let (_dir, path) = setup_file("verify");
    let output = cargo_bin_cmd!("flatval")
        .args(["--format", "json", "verify"])
        .arg(&path)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let json: Json = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json["success"], true);
    assert_eq!(json["level"], "full");
    assert_eq!(json["counts"]["tables_probed"], 4);
    assert_eq!(json["counts"]["keys_probed"], 7);

    cargo_bin_cmd!("flatval")
        .args(["verify", "--level", "fast"])
        .arg(&path)
        .assert()
        .success();
}

#[test]
fn verify_reports_corruption_with_exit_code_two() {
    let (_dir, path) = setup_file("corrupt");
    let mut bytes = fs::read(&path).expect("read");
    let last = bytes.len() - 1;
    bytes[last] ^= 0xFF;
    fs::write(&path, &bytes).expect("write");

    let output = cargo_bin_cmd!("flatval")
        .args(["--format", "json", "verify"])
        .arg(&path)
        .assert()
        .code(2)
        .get_output()
        .stdout
        .clone();
    let json: Json = serde_json::from_slice(&output).expect("valid json");
    assert_eq!(json["success"], false);
    let message = json["findings"][0]["message"].as_str().unwrap_or_default();
    assert!(message.contains("checksum"), "{message}");

    cargo_bin_cmd!("flatval")
        .args(["verify", "--level", "fast"])
        .arg(&path)
        .assert()
        .code(2);
}

#[test]
fn missing_file_is_an_error() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("absent.flv");
    cargo_bin_cmd!("flatval")
        .arg("stats")
        .arg(&path)
        .assert()
        .code(1);
    cargo_bin_cmd!("flatval")
        .arg("verify")
        .arg(&path)
        .assert()
        .code(1);
}
