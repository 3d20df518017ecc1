//! CLI subprocess integration tests.
//!
//! These tests invoke the `tarpull` binary against an in-process
//! `tarpull-server` and verify exit codes, stdout content, and the archive.

use std::io::Read;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tarpull_schema::media::DOCKER_MANIFEST_V2;
use tarpull_server::{Store, TestServer};

fn tarpull_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO_BIN_EXE_tarpull"));
    // Keep a developer's own config out of the picture.
    cmd.env("HOME", std::env::temp_dir().join("tarpull-cli-tests-home"));
    cmd.env_remove("TARPULL_LOG");
    cmd
}

fn push_image(store: &Store, name: &str, tag: &str, layers: &[&[u8]], config: &[u8]) {
    let cd = store.put_blob(config).unwrap();
    let layers: Vec<String> = layers
        .iter()
        .map(|l| {
            let d = store.put_blob(l).unwrap();
            format!(
                r#"{{"mediaType":"application/vnd.docker.image.rootfs.diff.tar.gzip","size":{},"digest":"{d}"}}"#,
                l.len()
            )
        })
        .collect();
    let body = format!(
        r#"{{"schemaVersion":2,"mediaType":"{DOCKER_MANIFEST_V2}","config":{{"mediaType":"application/vnd.docker.container.image.v1+json","size":{},"digest":"{cd}"}},"layers":[{}]}}"#,
        config.len(),
        layers.join(",")
    );
    store.put_manifest(name, tag, body.as_bytes()).unwrap();
}

struct Fixture {
    server: TestServer,
    dir: tempfile::TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let server = TestServer::start(dir.path().join("registry")).unwrap();
        push_image(&server.store, "library/alpine", "3.18", &[b"alpine-layer"], b"alpine-cfg");
        push_image(&server.store, "team/app", "1.0", &[b"alpine-layer", b"app"], b"app-cfg");
        Self { server, dir }
    }

    fn list(&self, content: &str) -> PathBuf {
        let path = self.dir.path().join("images.txt");
        std::fs::write(&path, content).unwrap();
        path
    }

    fn output(&self) -> PathBuf {
        self.dir.path().join("out.tar")
    }

    fn pull(&self, list: &Path, extra: &[&str]) -> Output {
        tarpull_bin()
            .arg(self.server.host())
            .arg(list)
            .arg(self.output())
            .arg("--plain-http")
            .args(extra)
            .output()
            .unwrap()
    }
}

fn member_names(path: &Path) -> Vec<String> {
    let mut archive = tar::Archive::new(std::fs::File::open(path).unwrap());
    archive
        .entries()
        .unwrap()
        .map(|e| {
            let mut e = e.unwrap();
            let mut sink = Vec::new();
            e.read_to_end(&mut sink).unwrap();
            e.path().unwrap().to_string_lossy().into_owned()
        })
        .collect()
}

#[test]
fn cli_version_exits_zero() {
    let output = tarpull_bin().arg("--version").output().unwrap();
    assert!(output.status.success(), "tarpull --version must exit 0");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("tarpull"), "version output: {stdout}");
}

#[test]
fn cli_help_lists_flags() {
    let output = tarpull_bin().arg("--help").output().unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    for flag in ["--platform", "--jobs", "--keep-going", "--no-dedup", "--json"] {
        assert!(stdout.contains(flag), "help must mention {flag}");
    }
}

#[test]
fn cli_missing_arguments_is_usage_error() {
    let output = tarpull_bin().arg("ghcr.io").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn cli_pull_writes_archive() {
    let fx = Fixture::new();
    let list = fx.list("library/alpine:3.18\nteam/app:1.0\n");
    let output = fx.pull(&list, &[]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("library/alpine:3.18"));
    assert!(stdout.contains("team/app:1.0"));

    let names = member_names(&fx.output());
    assert_eq!(names.len(), 5);
    assert_eq!(names.last().unwrap(), "manifest.json");
    assert!(names[..4].iter().all(|n| n.starts_with("blobs/sha256/")));
}

#[test]
fn cli_json_report() {
    let fx = Fixture::new();
    let list = fx.list("library/alpine:3.18\nteam/app:1.0\n");
    let output = fx.pull(&list, &["--json", "--jobs", "2"]);
    assert!(output.status.success());

    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["images"].as_array().unwrap().len(), 2);
    assert_eq!(v["images"][0]["status"], "ok");
    assert_eq!(v["blobs_written"], 4);
    assert_eq!(v["blobs_skipped"], 1);
}

#[test]
fn cli_no_dedup_writes_duplicates() {
    let fx = Fixture::new();
    let list = fx.list("library/alpine:3.18\nteam/app:1.0\n");
    let output = fx.pull(&list, &["--json", "--no-dedup"]);
    assert!(output.status.success());
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["blobs_written"], 5);
    assert_eq!(member_names(&fx.output()).len(), 6);
}

#[test]
fn cli_missing_image_exits_registry_error() {
    let fx = Fixture::new();
    let list = fx.list("library/alpine:3.18\nlibrary/gone:1\n");
    let output = fx.pull(&list, &[]);
    assert_eq!(output.status.code(), Some(3));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("error:"), "stderr: {stderr}");
    assert!(!fx.output().exists());
}

#[test]
fn cli_keep_going_partial_success() {
    let fx = Fixture::new();
    let list = fx.list("library/alpine:3.18\nlibrary/gone:1\n");
    let output = fx.pull(&list, &["--keep-going", "--json"]);
    assert_eq!(output.status.code(), Some(1));
    let v: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(v["images"][1]["status"], "failed");
    assert!(fx.output().exists());
}

#[test]
fn cli_malformed_list_exits_input_error() {
    let fx = Fixture::new();
    let list = fx.list("library/alpine:3.18\nno-tag-here\n");
    let output = fx.pull(&list, &[]);
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("line 2"), "stderr: {stderr}");
}

#[test]
fn cli_unreadable_list_exits_input_error() {
    let fx = Fixture::new();
    let output = fx.pull(&fx.dir.path().join("absent.txt"), &[]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn cli_uncreatable_output_exits_input_error() {
    let fx = Fixture::new();
    let list = fx.list("library/alpine:3.18\n");
    let output = tarpull_bin()
        .arg(fx.server.host())
        .arg(&list)
        .arg(fx.dir.path().join("no/such/dir/out.tar"))
        .arg("--plain-http")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn cli_unreachable_registry_exits_registry_error() {
    let fx = Fixture::new();
    let list = fx.list("library/alpine:3.18\n");
    let output = tarpull_bin()
        .arg("127.0.0.1:1")
        .arg(&list)
        .arg(fx.output())
        .arg("--plain-http")
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3));
}

#[test]
fn cli_invalid_platform_rejected() {
    let fx = Fixture::new();
    let list = fx.list("library/alpine:3.18\n");
    let output = fx.pull(&list, &["--platform", "amd64"]);
    assert_eq!(output.status.code(), Some(2));
    assert!(!fx.output().exists());
}
