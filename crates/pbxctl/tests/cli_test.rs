//! Integration tests for the `pbxctl` binary.
//!
//! Everything runs offline against a temporary config directory and record
//! file, so no switch is needed.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

// ── Helpers ─────────────────────────────────────────────────────────

/// `pbxctl` with HOME/XDG dirs inside `home` and no inherited settings.
fn pbxctl_in(home: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("pbxctl");
    cmd.env("HOME", home)
        .env("XDG_CONFIG_HOME", home.join("config"))
        .env("XDG_DATA_HOME", home.join("data"))
        .env("NO_COLOR", "1")
        .env_remove("RUST_LOG")
        .env_remove("AMI_PASSWORD");
    for var in [
        "PBXCTL_PROFILE",
        "PBXCTL_AMI_HOST",
        "PBXCTL_AMI_PORT",
        "PBXCTL_AMI_USER",
        "PBXCTL_AMI_PASSWORD",
        "PBXCTL_CONFIG_DIR",
        "PBXCTL_DATA_FILE",
        "PBXCTL_OFFLINE",
        "PBXCTL_OUTPUT",
        "PBXCTL_CONNECT_TIMEOUT",
    ] {
        cmd.env_remove(var);
    }
    cmd
}

/// A scratch switch: config dir + record file, driven with `--offline`.
struct Lab {
    home: TempDir,
}

impl Lab {
    fn new() -> Self {
        let home = TempDir::new().unwrap();
        std::fs::create_dir_all(home.path().join("asterisk")).unwrap();
        Self { home }
    }

    fn config_dir(&self) -> PathBuf {
        self.home.path().join("asterisk")
    }

    fn data_file(&self) -> PathBuf {
        self.home.path().join("records.json")
    }

    fn cmd(&self) -> assert_cmd::Command {
        let mut cmd = pbxctl_in(self.home.path());
        cmd.arg("--offline")
            .arg("--config-dir")
            .arg(self.config_dir())
            .arg("--data-file")
            .arg(self.data_file());
        cmd
    }

    fn conf(&self, name: &str) -> String {
        std::fs::read_to_string(self.config_dir().join(name)).unwrap()
    }

    fn create_extension(&self, number: &str, name: &str) {
        self.cmd()
            .args([
                "extensions",
                "create",
                number,
                "--name",
                name,
                "--secret",
                "s3cret",
            ])
            .assert()
            .success();
    }
}

fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn no_args_shows_usage() {
    let home = TempDir::new().unwrap();
    let output = pbxctl_in(home.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("Usage"));
}

#[test]
fn help_lists_command_groups() {
    let home = TempDir::new().unwrap();
    pbxctl_in(home.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("extensions")
                .and(predicate::str::contains("trunks"))
                .and(predicate::str::contains("queues"))
                .and(predicate::str::contains("inbound-routes"))
                .and(predicate::str::contains("cdr")),
        );
}

#[test]
fn version_flag() {
    let home = TempDir::new().unwrap();
    pbxctl_in(home.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pbxctl"));
}

#[test]
fn completions_zsh() {
    let home = TempDir::new().unwrap();
    pbxctl_in(home.path())
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn completions_bash() {
    let home = TempDir::new().unwrap();
    pbxctl_in(home.path())
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn invalid_subcommand_fails() {
    let home = TempDir::new().unwrap();
    let output = pbxctl_in(home.path()).arg("foobar").output().unwrap();
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("foobar"));
}

#[test]
fn config_path_points_into_config_home() {
    let home = TempDir::new().unwrap();
    pbxctl_in(home.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("pbxctl").and(predicate::str::contains("config.toml")));
}

// ── Extensions, offline ─────────────────────────────────────────────

#[test]
fn extension_lifecycle_writes_sip_conf() {
    let lab = Lab::new();
    lab.create_extension("101", "Alice");

    let sip = lab.conf("sip.conf");
    assert!(sip.contains("[101]"), "sip.conf:\n{sip}");
    assert!(sip.contains("secret=s3cret"), "sip.conf:\n{sip}");

    let listed = lab
        .cmd()
        .args(["-o", "json", "extensions", "list"])
        .output()
        .unwrap();
    assert!(listed.status.success());
    let json: serde_json::Value = serde_json::from_slice(&listed.stdout).unwrap();
    assert_eq!(json[0]["extension"], "101");
    assert_eq!(json[0]["context"], "internal");

    lab.cmd()
        .args([
            "extensions",
            "update",
            "101",
            "--name",
            "Alice Smith",
            "--call-limit",
            "2",
        ])
        .assert()
        .success();
    lab.cmd()
        .args(["-o", "json", "extensions", "get", "101"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Alice Smith"));

    lab.cmd()
        .args(["-y", "extensions", "delete", "101"])
        .assert()
        .success();
    assert!(!lab.conf("sip.conf").contains("[101]"));
}

#[test]
fn offline_mutation_warns_about_skipped_reload() {
    let lab = Lab::new();
    lab.cmd()
        .args([
            "extensions",
            "create",
            "102",
            "--name",
            "Bob",
            "--secret",
            "pw",
        ])
        .assert()
        .success()
        .stderr(predicate::str::contains("warning:"));
}

#[test]
fn plain_output_prints_keys() {
    let lab = Lab::new();
    lab.create_extension("101", "Alice");
    lab.create_extension("102", "Bob");
    let output = lab
        .cmd()
        .args(["-o", "plain", "extensions", "list"])
        .output()
        .unwrap();
    let text = String::from_utf8_lossy(&output.stdout);
    let mut lines: Vec<&str> = text.lines().collect();
    lines.sort_unstable();
    assert_eq!(lines, ["101", "102"]);
}

#[test]
fn unknown_extension_is_not_found() {
    let lab = Lab::new();
    lab.cmd()
        .args(["extensions", "get", "999"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("extensions list"));
}

#[test]
fn duplicate_extension_conflicts() {
    let lab = Lab::new();
    lab.create_extension("101", "Alice");
    lab.cmd()
        .args([
            "extensions",
            "create",
            "101",
            "--name",
            "Again",
            "--secret",
            "x",
        ])
        .assert()
        .code(6);
}

#[test]
fn bad_enum_flag_lists_choices() {
    let lab = Lab::new();
    lab.cmd()
        .args([
            "extensions",
            "create",
            "103",
            "--name",
            "Carol",
            "--secret",
            "x",
            "--transport",
            "carrier-pigeon",
        ])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("udp"));
}

#[test]
fn delete_without_yes_needs_a_terminal() {
    let lab = Lab::new();
    lab.create_extension("101", "Alice");
    lab.cmd()
        .args(["extensions", "delete", "101"])
        .assert()
        .code(2);
}

// ── Queues and routes ───────────────────────────────────────────────

#[test]
fn queue_members_render_into_queues_conf() {
    let lab = Lab::new();
    lab.cmd()
        .args([
            "queues",
            "create",
            "support",
            "--strategy",
            "rrmemory",
            "--member",
            "101",
        ])
        .assert()
        .success();
    lab.cmd()
        .args(["queues", "add-member", "support", "102"])
        .assert()
        .success();

    let queues = lab.conf("queues.conf");
    assert!(queues.contains("[support]"), "queues.conf:\n{queues}");
    assert!(
        queues.contains("strategy = rrmemory"),
        "queues.conf:\n{queues}"
    );
    assert!(queues.contains("SIP/102"), "queues.conf:\n{queues}");

    lab.cmd()
        .args(["queues", "add-member", "support", "102"])
        .assert()
        .code(6);
}

#[test]
fn duplicate_did_conflicts() {
    let lab = Lab::new();
    lab.cmd()
        .args([
            "inbound-routes",
            "create",
            "main",
            "--did",
            "5551000",
            "--destination",
            "101",
        ])
        .assert()
        .success();
    lab.cmd()
        .args([
            "inbound-routes",
            "create",
            "other",
            "--did",
            "5551000",
            "--destination",
            "102",
        ])
        .assert()
        .code(6)
        .stderr(predicate::str::contains("5551000"));
}

#[test]
fn trunk_in_use_cannot_be_deleted() {
    let lab = Lab::new();
    lab.cmd()
        .args(["trunks", "create", "carrier", "--host", "sip.example.net"])
        .assert()
        .success();
    lab.cmd()
        .args([
            "outbound-routes",
            "create",
            "national",
            "--pattern",
            "9NXXNXXXXXX",
            "--trunk",
            "carrier",
            "--prefix",
            "9",
        ])
        .assert()
        .success();

    assert!(lab.conf("extensions.conf").contains("carrier"));

    lab.cmd()
        .args(["-y", "trunks", "delete", "carrier"])
        .assert()
        .code(6)
        .stderr(predicate::str::contains("national"));
}

#[test]
fn sync_preview_prints_rendered_file() {
    let lab = Lab::new();
    lab.create_extension("101", "Alice");
    lab.cmd()
        .args(["sync", "--preview", "sip"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[101]"));
}

// ── Call records and traces ─────────────────────────────────────────

#[test]
fn empty_cdr_store_reports_zero_calls() {
    let lab = Lab::new();
    lab.cmd()
        .args(["-o", "json", "cdr", "today"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"total\": 0"));
}

#[test]
fn cdr_rejects_unknown_disposition() {
    let lab = Lab::new();
    lab.cmd()
        .args(["cdr", "list", "--disposition", "hung-up"])
        .assert()
        .code(2);
}

#[test]
fn trace_import_requires_trace_logging() {
    let lab = Lab::new();
    let file = lab.home.path().join("traces.json");
    std::fs::write(
        &file,
        r#"[{"source_ip":"10.0.0.5","destination_ip":"10.0.0.1","method":"INVITE"}]"#,
    )
    .unwrap();
    lab.cmd()
        .args(["traces", "import"])
        .arg(&file)
        .assert()
        .code(2);
}

// ── Switch commands ─────────────────────────────────────────────────

#[test]
fn unreachable_switch_is_a_connection_error() {
    let home = TempDir::new().unwrap();
    pbxctl_in(home.path())
        .args([
            "--ami-host",
            "127.0.0.1",
            "--ami-port",
            "1",
            "--ami-password",
            "x",
            "--connect-timeout",
            "3",
            "status",
        ])
        .assert()
        .code(7)
        .stderr(predicate::str::contains("--offline"));
}

#[test]
fn dashboard_works_offline() {
    let lab = Lab::new();
    lab.create_extension("101", "Alice");
    lab.cmd()
        .args(["-o", "json", "dashboard"])
        .assert()
        .success()
        .stdout(predicate::str::contains("\"extensions\": 1"));
}
