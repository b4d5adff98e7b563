use serde_json::{Value, json};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use std::time::{SystemTime, UNIX_EPOCH};

fn make_temp_dir(prefix: &str) -> PathBuf {
    let nanos = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .expect("system clock is before UNIX_EPOCH")
        .as_nanos();
    let pid = std::process::id();
    let dir = std::env::temp_dir().join(format!("patchwork-integ-{prefix}-{pid}-{nanos}"));
    fs::create_dir_all(&dir).expect("failed to create temp dir");
    dir
}

fn patchwork(dir: &Path) -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_patchwork"));
    cmd.current_dir(dir);
    cmd
}

fn assert_success(out: &Output, what: &str) {
    assert!(
        out.status.success(),
        "{what} failed:\nstatus: {}\nstderr:\n{}",
        out.status,
        String::from_utf8_lossy(&out.stderr),
    );
}

fn stdout_json(out: &Output) -> Value {
    serde_json::from_slice(&out.stdout).unwrap_or_else(|e| {
        panic!(
            "stdout is not JSON ({e}):\n{}",
            String::from_utf8_lossy(&out.stdout)
        )
    })
}

#[test]
fn help_works() {
    let dir = make_temp_dir("help");
    let out = patchwork(&dir)
        .arg("--help")
        .output()
        .expect("failed to run patchwork --help");
    assert_success(&out, "patchwork --help");

    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(
        stdout.contains("merge") && stdout.contains("tokenize") && stdout.contains("init"),
        "unexpected help output:\n{stdout}"
    );

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn init_creates_manifest_once() {
    let dir = make_temp_dir("init");

    let out = patchwork(&dir)
        .arg("init")
        .arg(&dir)
        .output()
        .expect("failed to run patchwork init");
    assert_success(&out, "patchwork init");
    assert!(dir.join("patchwork.json").is_file(), "patchwork.json not created");

    let out = patchwork(&dir)
        .arg("init")
        .arg(&dir)
        .output()
        .expect("failed to run patchwork init");
    assert!(!out.status.success(), "second init should fail");
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("already exists"), "stderr:\n{stderr}");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn merge_applies_files_then_set_overrides() {
    let dir = make_temp_dir("merge-files");
    fs::write(
        dir.join("base.json"),
        r#"{"color": "black", "fontSize": 12, "bold": false}"#,
    )
    .unwrap();
    fs::write(dir.join("theme.json"), r#"{"color": "blue", "bold": true}"#).unwrap();

    let out = patchwork(&dir)
        .args(["merge", "base.json", "theme.json", "--set", "color=red", "--compact"])
        .output()
        .expect("failed to run patchwork merge");
    assert_success(&out, "patchwork merge");

    assert_eq!(
        String::from_utf8_lossy(&out.stdout).trim_end(),
        r#"{"color":"red","fontSize":12,"bold":true}"#
    );

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn merge_without_inputs_prints_empty_record() {
    let dir = make_temp_dir("merge-empty");

    let out = patchwork(&dir)
        .arg("merge")
        .output()
        .expect("failed to run patchwork merge");
    assert_success(&out, "patchwork merge");
    assert_eq!(stdout_json(&out), json!({}));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn merge_reads_base_patches_from_manifest() {
    let dir = make_temp_dir("merge-manifest");
    fs::create_dir_all(dir.join("styles")).unwrap();
    fs::write(dir.join("styles/base.json"), r#"{"margin": 4, "color": "black"}"#).unwrap();
    fs::write(dir.join("local.json"), r#"{"color": "green"}"#).unwrap();
    fs::write(
        dir.join("patchwork.json"),
        r#"{"schemaVersion": 1, "merge": {"patches": ["styles/base.json"], "compact": true}}"#,
    )
    .unwrap();

    let out = patchwork(&dir)
        .args(["merge", "local.json", "--explain"])
        .output()
        .expect("failed to run patchwork merge");
    assert_success(&out, "patchwork merge");

    let stdout = String::from_utf8_lossy(&out.stdout);
    assert_eq!(stdout.lines().count(), 1, "expected compact output:\n{stdout}");
    assert_eq!(stdout_json(&out), json!({ "margin": 4, "color": "green" }));

    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("margin <- "), "stderr:\n{stderr}");
    assert!(stderr.contains("color <- local.json"), "stderr:\n{stderr}");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn merge_rejects_non_object_patch() {
    let dir = make_temp_dir("merge-array");
    fs::write(dir.join("bad.json"), "[1, 2, 3]").unwrap();

    let out = patchwork(&dir)
        .args(["merge", "bad.json"])
        .output()
        .expect("failed to run patchwork merge");
    assert!(!out.status.success(), "merge of an array should fail");
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("must be a JSON object"), "stderr:\n{stderr}");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn merge_rejects_malformed_set() {
    let dir = make_temp_dir("merge-set");

    let out = patchwork(&dir)
        .args(["merge", "--set", "novalue"])
        .output()
        .expect("failed to run patchwork merge");
    assert!(!out.status.success(), "--set without '=' should fail");
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("invalid --set override"), "stderr:\n{stderr}");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn merge_with_missing_explicit_manifest_fails() {
    let dir = make_temp_dir("merge-no-manifest");

    let out = patchwork(&dir)
        .args(["merge", "--manifest", "missing.json"])
        .output()
        .expect("failed to run patchwork merge");
    assert!(!out.status.success(), "missing manifest should fail");
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("manifest not found"), "stderr:\n{stderr}");

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn tokenize_prints_options_and_command() {
    let dir = make_temp_dir("tokenize");

    let out = patchwork(&dir)
        .args([
            "tokenize",
            "--",
            "--env=production",
            "--port=8080",
            "--verbose",
            "--key=",
            "start",
        ])
        .output()
        .expect("failed to run patchwork tokenize");
    assert_success(&out, "patchwork tokenize");
    assert_eq!(
        stdout_json(&out),
        json!({
            "env": "production",
            "port": "8080",
            "verbose": true,
            "key": "",
            "command": "start",
        })
    );

    let out = patchwork(&dir)
        .arg("tokenize")
        .output()
        .expect("failed to run patchwork tokenize");
    assert_success(&out, "patchwork tokenize");
    assert_eq!(stdout_json(&out), json!({}));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn tokenize_passes_help_through_after_separator() {
    let dir = make_temp_dir("tokenize-help");

    let out = patchwork(&dir)
        .args(["tokenize", "--help"])
        .output()
        .expect("failed to run patchwork tokenize --help");
    assert_success(&out, "patchwork tokenize --help");
    let stdout = String::from_utf8_lossy(&out.stdout);
    assert!(
        stdout.contains("patchwork tokenize -- --help"),
        "help should explain the `--` separator:\n{stdout}"
    );

    let out = patchwork(&dir)
        .args(["tokenize", "--", "--help", "-h", "x"])
        .output()
        .expect("failed to run patchwork tokenize");
    assert_success(&out, "patchwork tokenize");
    assert_eq!(stdout_json(&out), json!({ "help": true, "command": "x" }));

    let _ = fs::remove_dir_all(&dir);
}

#[test]
fn tokenize_command_entry_follows_last_write() {
    let dir = make_temp_dir("tokenize-command");

    let out = patchwork(&dir)
        .args(["tokenize", "--", "deploy", "--command=build"])
        .output()
        .expect("failed to run patchwork tokenize");
    assert_success(&out, "patchwork tokenize");
    assert_eq!(stdout_json(&out), json!({ "command": "build" }));

    let out = patchwork(&dir)
        .args(["tokenize", "--", "--command=build", "deploy"])
        .output()
        .expect("failed to run patchwork tokenize");
    assert_success(&out, "patchwork tokenize");
    assert_eq!(stdout_json(&out), json!({ "command": "deploy" }));

    let _ = fs::remove_dir_all(&dir);
}
