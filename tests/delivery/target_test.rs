//! Target display and request building.

use std::path::PathBuf;

use lowpulse::delivery::{Attachment, SendRequest, SessionCredentials, Target};

#[test]
fn targets_display_as_they_parse() {
    for raw in ["-1001234567890", "@lowpulse"] {
        match raw.parse::<Target>() {
            Ok(target) => assert_eq!(target.to_string(), raw),
            Err(err) => panic!("{raw} should parse: {err}"),
        }
    }
}

#[test]
fn text_request_has_no_attachment_or_target() {
    let request = SendRequest::text("plain");
    assert_eq!(request.text, "plain");
    assert!(request.target.is_none());
    assert!(request.attachment.is_none());
}

#[test]
fn with_media_prefers_image_then_file() {
    let file_only = SendRequest::text("t").with_media(None, Some(PathBuf::from("a.txt")));
    assert_eq!(file_only.attachment, Some(Attachment::File(PathBuf::from("a.txt"))));

    let neither = SendRequest::text("t").with_media(None, None);
    assert!(neither.attachment.is_none());
}

#[test]
fn bot_token_round_trips_through_credentials() {
    let creds = SessionCredentials::from_bot_token("s", "123456:ABC-def");
    let creds = match creds {
        Some(creds) => creds,
        None => panic!("token should split"),
    };
    assert_eq!(creds.app_id, 123_456);
    assert_eq!(creds.bot_token(), "123456:ABC-def");
    assert!(!format!("{creds:?}").contains("ABC-def"));
}
