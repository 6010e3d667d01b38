//! Slash command replies.

use std::sync::Arc;

use chrono::NaiveDate;

use lowpulse::bot::commands::{dispatch, handle_help, handle_last, handle_start};

use crate::support::{context, RecordingTransport, ScriptedProvider};

#[test]
fn start_greets_with_the_date() {
    let date = NaiveDate::from_ymd_opt(2025, 6, 1).expect("valid date");
    assert_eq!(handle_start(date), "Welcome! Today is 2025-06-01.");
}

#[test]
fn help_lists_every_command() {
    let help = handle_help();
    for command in ["/start", "/help", "/last"] {
        assert!(help.contains(command), "help should mention {command}");
    }
}

#[test]
fn last_reports_when_nothing_was_posted() {
    assert_eq!(handle_last(None), "Nothing has been posted yet.");
    assert_eq!(handle_last(Some("  ".to_owned())), "Nothing has been posted yet.");
    assert_eq!(handle_last(Some("Hi".to_owned())), "Hi");
}

#[test]
fn dispatch_reads_the_last_post_from_the_store() {
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let ctx = context(
        tmp.path(),
        Arc::new(ScriptedProvider::replying(&[])),
        Arc::new(RecordingTransport::new()),
        None,
    );
    ctx.store.record("Yesterday's set.", chrono::Local::now()).expect("record");

    assert_eq!(dispatch("last", &ctx), "Yesterday's set.");
    assert!(dispatch("start", &ctx).starts_with("Welcome! Today is "));
    assert_eq!(dispatch("dance", &ctx), "Unknown command: /dance");
}
