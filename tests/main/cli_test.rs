//! CLI contract tests.

use assert_cmd::Command;

fn lowpulse() -> Command {
    match Command::cargo_bin("lowpulse") {
        Ok(cmd) => cmd,
        Err(err) => panic!("binary should build: {err}"),
    }
}

fn stdout_of(args: &[&str]) -> String {
    let output = lowpulse().args(args).output().expect("binary should run");
    assert!(output.status.success(), "{args:?} should succeed");
    String::from_utf8_lossy(&output.stdout).into_owned()
}

#[test]
fn help_lists_subcommands() {
    let help = stdout_of(&["--help"]);
    for subcommand in ["post", "bot", "send", "digest", "whoami"] {
        assert!(help.contains(subcommand), "help should mention {subcommand}");
    }
}

#[test]
fn post_help_lists_generation_options() {
    let help = stdout_of(&["post", "--help"]);
    for flag in ["--schedule", "--theme", "--tone", "--length", "--send-at", "--delay"] {
        assert!(help.contains(flag), "post help should mention {flag}");
    }
}

#[test]
fn post_requires_a_theme_source() {
    lowpulse().arg("post").assert().failure();
}

#[test]
fn image_and_file_are_mutually_exclusive() {
    lowpulse()
        .args(["send", "hi", "--image", "a.jpg", "--file", "b.pdf"])
        .assert()
        .failure();
}

#[test]
fn invalid_send_at_is_rejected() {
    lowpulse()
        .args(["post", "--theme", "x", "--send-at", "tomorrow"])
        .assert()
        .failure();
}

#[test]
fn send_without_telegram_fails_cleanly() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let output = lowpulse()
        .current_dir(tmp.path())
        .env_clear()
        .env("HOME", tmp.path())
        .args(["send", "hello", "--target", "42"])
        .output()
        .expect("binary should run");

    assert!(!output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(
        stderr.contains("Telegram is not configured"),
        "unexpected stderr: {stderr}"
    );
}
