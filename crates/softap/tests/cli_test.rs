//! Integration tests for the `softap` binary.
//!
//! These cover argument parsing, completions, error exit codes and the
//! offline commands (allow-list, leases, config rendering). Nothing here
//! starts hostapd.
#![allow(clippy::unwrap_used)]

use std::path::{Path, PathBuf};

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `softap` binary with env isolation.
fn softap_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("softap");
    cmd.env("HOME", "/tmp/softap-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/softap-cli-test-nonexistent")
        .env_remove("SOFTAP_PROFILE")
        .env_remove("SOFTAP_CONFIG")
        .env_remove("SOFTAP_OUTPUT")
        .env_remove("SOFTAP_LOG_FILE")
        .env_remove("SOFTAP_PSK")
        .env_remove("RUST_LOG");
    cmd
}

/// A config file with one open profile whose state lives in `dir`.
fn write_config(dir: &Path, extra: &str) -> PathBuf {
    let path = dir.join("config.toml");
    let text = format!(
        "default_profile = \"lab\"\n\n\
         [profiles.lab]\n\
         interface = \"wlan9\"\n\
         ssid = \"CliTest\"\n\
         state_dir = \"{state}\"\n\
         lease_file = \"{leases}\"\n\
         {extra}\n",
        state = dir.display(),
        leases = dir.join("dnsmasq.leases").display(),
    );
    std::fs::write(&path, text).unwrap();
    path
}

fn with_config(path: &Path) -> assert_cmd::Command {
    let mut cmd = softap_cmd();
    cmd.arg("--config").arg(path);
    cmd
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn no_args_shows_help() {
    let output = softap_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = format!(
        "{}{}",
        String::from_utf8_lossy(&output.stdout),
        String::from_utf8_lossy(&output.stderr)
    );
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn help_lists_commands() {
    softap_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("run")
            .and(predicate::str::contains("acl"))
            .and(predicate::str::contains("leases"))
            .and(predicate::str::contains("render-conf")),
    );
}

#[test]
fn version_flag() {
    softap_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("softap"));
}

#[test]
fn completions_zsh() {
    softap_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

#[test]
fn acl_subcommands_exist() {
    softap_cmd().args(["acl", "--help"]).assert().success().stdout(
        predicate::str::contains("list")
            .and(predicate::str::contains("allow"))
            .and(predicate::str::contains("disallow"))
            .and(predicate::str::contains("policy")),
    );
}

// ── Error cases ─────────────────────────────────────────────────────

#[test]
fn invalid_output_format() {
    softap_cmd()
        .args(["--output", "xml", "acl", "list"])
        .assert()
        .code(2);
}

#[test]
fn run_without_config_fails() {
    let dir = tempfile::tempdir().unwrap();
    softap_cmd()
        .arg("--config")
        .arg(dir.path().join("missing.toml"))
        .arg("run")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("Configuration file not found"));
}

#[test]
fn unknown_profile_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_config(dir.path(), "");
    with_config(&cfg)
        .args(["--profile", "office", "acl", "list"])
        .assert()
        .code(4)
        .stderr(predicate::str::contains("office"));
}

#[test]
fn secured_profile_without_psk_needs_credentials() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_config(
        dir.path(),
        "security = \"wpa2-psk\"\npsk_env = \"SOFTAP_CLI_TEST_UNSET\"",
    );
    // An unavailable keyring falls through to the missing-passphrase error.
    let output = with_config(&cfg).arg("render-conf").output().unwrap();
    assert_eq!(output.status.code(), Some(3));
}

// ── Allow-list ──────────────────────────────────────────────────────

#[test]
fn allow_list_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_config(dir.path(), "");

    with_config(&cfg)
        .args(["acl", "allow", "AA-BB-CC-DD-EE-01", "--name", "Laptop"])
        .assert()
        .success();
    with_config(&cfg)
        .args(["acl", "allow", "aa:bb:cc:dd:ee:02"])
        .assert()
        .success();

    with_config(&cfg)
        .args(["-o", "plain", "acl", "list"])
        .assert()
        .success()
        .stdout("aa:bb:cc:dd:ee:01\naa:bb:cc:dd:ee:02\n");

    let stored = std::fs::read_to_string(dir.path().join("hostapd.allow.conf")).unwrap();
    assert!(stored.contains("aa:bb:cc:dd:ee:01\t0\tLaptop"));

    with_config(&cfg)
        .args(["acl", "disallow", "aa:bb:cc:dd:ee:01"])
        .assert()
        .success();
    with_config(&cfg)
        .args(["-o", "json-compact", "acl", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("aa:bb:cc:dd:ee:02").and(
            predicate::str::contains("aa:bb:cc:dd:ee:01").not(),
        ));
}

#[test]
fn disallow_unknown_mac_is_not_found() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_config(dir.path(), "");
    with_config(&cfg)
        .args(["acl", "disallow", "aa:bb:cc:dd:ee:09"])
        .assert()
        .code(4);
}

#[test]
fn invalid_mac_is_usage_error() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_config(dir.path(), "");
    with_config(&cfg)
        .args(["acl", "allow", "not-a-mac"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("not-a-mac"));
}

#[test]
fn policy_switches_between_modes() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_config(dir.path(), "");

    with_config(&cfg)
        .args(["-o", "plain", "acl", "policy"])
        .assert()
        .success()
        .stdout("allow-all\n");

    // Restricting with an empty list needs confirmation; stdin is not a tty.
    with_config(&cfg)
        .args(["acl", "policy", "allow-list"])
        .assert()
        .code(2);

    with_config(&cfg)
        .args(["--yes", "acl", "policy", "allow-list"])
        .assert()
        .success();
    with_config(&cfg)
        .args(["-o", "plain", "acl", "policy"])
        .assert()
        .success()
        .stdout("allow-list\n");
}

// ── Leases ──────────────────────────────────────────────────────────

#[test]
fn leases_from_profile_file() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_config(dir.path(), "");
    std::fs::write(
        dir.path().join("dnsmasq.leases"),
        "0 aa:bb:cc:dd:ee:01 192.168.43.10 phone 01:aa:bb:cc:dd:ee:01\n\
         0 aa:bb:cc:dd:ee:02 192.168.43.11 * *\n",
    )
    .unwrap();

    with_config(&cfg)
        .args(["-o", "plain", "leases"])
        .assert()
        .success()
        .stdout("aa:bb:cc:dd:ee:01 192.168.43.10\naa:bb:cc:dd:ee:02 192.168.43.11\n");

    with_config(&cfg)
        .args(["-o", "plain", "leases", "AA:BB:CC:DD:EE:02"])
        .assert()
        .success()
        .stdout("aa:bb:cc:dd:ee:02 192.168.43.11\n");

    with_config(&cfg)
        .args(["leases", "aa:bb:cc:dd:ee:03"])
        .assert()
        .code(4);
}

// ── Config rendering ────────────────────────────────────────────────

#[test]
fn render_conf_for_open_profile() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_config(dir.path(), "allowed_channels_2g = [11]\nmax_stations = 3");
    let accept = dir.path().join("hostapd.accept");

    with_config(&cfg)
        .arg("render-conf")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("interface=wlan9\n")
                .and(predicate::str::contains("ssid=CliTest\n"))
                .and(predicate::str::contains("channel=11\n"))
                .and(predicate::str::contains("max_num_sta=3\n"))
                .and(predicate::str::contains("macaddr_acl=0\n"))
                .and(predicate::str::contains(format!(
                    "accept_mac_file={}",
                    accept.display()
                )))
                .and(predicate::str::contains("wpa=").not()),
        );
}

#[test]
fn render_conf_masks_passphrase() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_config(
        dir.path(),
        "security = \"wpa2-psk\"\npsk = \"correct-horse\"\npsk_env = \"SOFTAP_CLI_TEST_UNSET\"",
    );
    // A keyring entry for this profile name, if any, would win over the
    // plaintext value; only the masking is asserted.
    with_config(&cfg)
        .arg("render-conf")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("wpa_passphrase=********")
                .and(predicate::str::contains("rsn_pairwise=CCMP")),
        );
}

#[test]
fn render_conf_five_ghz_needs_country() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_config(dir.path(), "band = \"5ghz\"");
    with_config(&cfg)
        .arg("render-conf")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("country_code"));

    let cfg = write_config(dir.path(), "band = \"5ghz\"\ncountry_code = \"de\"");
    with_config(&cfg)
        .arg("render-conf")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("channel=36\n")
                .and(predicate::str::contains("country_code=DE\n"))
                .and(predicate::str::contains("hw_mode=a\n")),
        );
}

// ── Config commands ─────────────────────────────────────────────────

#[test]
fn config_path_prints_override() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = dir.path().join("custom.toml");
    with_config(&cfg)
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(format!("{}\n", cfg.display()));
}

#[test]
fn config_show_masks_plaintext_psk() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_config(dir.path(), "psk = \"hunter2hunter2\"");
    with_config(&cfg)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("CliTest")
                .and(predicate::str::contains("hunter2hunter2").not()),
        );
}

#[test]
fn config_profiles_marks_active() {
    let dir = tempfile::tempdir().unwrap();
    let cfg = write_config(dir.path(), "");
    with_config(&cfg)
        .args(["config", "profiles"])
        .assert()
        .success()
        .stdout("lab (active)\n");
}
