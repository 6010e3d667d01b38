//! Telegram transport: recipient mapping, `getMe` handshake, media checks.

use std::path::PathBuf;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use teloxide::types::{ChatId, Recipient};
use url::Url;

use lowpulse::delivery::telegram::{recipient, TelegramTransport};
use lowpulse::delivery::{Attachment, MessagingTransport, Target, TransportError};

use crate::support::credentials;

/// Bot API stand-in that answers one request with `body` and returns its base URL.
async fn serve_api_once(body: String) -> Url {
    let listener = match TcpListener::bind("127.0.0.1:0").await {
        Ok(listener) => listener,
        Err(err) => panic!("listener should bind: {err}"),
    };
    let addr = match listener.local_addr() {
        Ok(addr) => addr,
        Err(err) => panic!("listener should expose local addr: {err}"),
    };
    tokio::spawn(async move {
        if let Ok((mut socket, _)) = listener.accept().await {
            let mut read_buf = [0_u8; 4096];
            let _ = socket.read(&mut read_buf).await;
            let response = format!(
                "HTTP/1.1 200 OK\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            let _ = socket.write_all(response.as_bytes()).await;
        }
    });
    match Url::parse(&format!("http://{addr}/")) {
        Ok(url) => url,
        Err(err) => panic!("server url should parse: {err}"),
    }
}

fn get_me_body(bot_id: u64) -> String {
    format!(
        r#"{{"ok":true,"result":{{"id":{bot_id},"is_bot":true,"first_name":"Low Pulse","username":"lowpulse_bot","can_join_groups":true,"can_read_all_group_messages":false,"supports_inline_queries":false,"can_connect_to_business":false,"has_main_web_app":false}}}}"#
    )
}

#[test]
fn ids_map_to_chat_ids() {
    assert_eq!(recipient(&Target::Id(-100)), Recipient::Id(ChatId(-100)));
}

#[test]
fn usernames_map_to_channel_usernames() {
    assert_eq!(
        recipient(&Target::Username("@chan".to_owned())),
        Recipient::ChannelUsername("@chan".to_owned())
    );
}

#[test]
fn telegram_transport_is_available() {
    let transport = TelegramTransport::new();
    assert_eq!(transport.name(), "telegram");
    assert!(transport.is_available());
}

#[test]
fn bot_client_uses_token_and_api_root() {
    let api = match Url::parse("http://127.0.0.1:8081/") {
        Ok(url) => url,
        Err(err) => panic!("url should parse: {err}"),
    };
    let bot = TelegramTransport::with_api_url(api.clone()).bot(&credentials());

    assert_eq!(bot.token(), "1234:secret");
    assert_eq!(bot.api_url().as_str(), api.as_str());
}

#[tokio::test]
async fn connect_accepts_matching_bot_id() {
    let transport = TelegramTransport::with_api_url(serve_api_once(get_me_body(1234)).await);

    match transport.connect(&credentials()).await {
        Ok(session) => assert_eq!(session.describe(), "test_session (@lowpulse_bot)"),
        Err(err) => panic!("handshake should succeed: {err}"),
    }
}

#[tokio::test]
async fn connect_rejects_token_of_another_bot() {
    let transport = TelegramTransport::with_api_url(serve_api_once(get_me_body(999)).await);

    match transport.connect(&credentials()).await {
        Err(TransportError::Connect(message)) => {
            assert!(message.contains("999"));
            assert!(message.contains("1234"));
        }
        Err(other) => panic!("expected Connect, got: {other:?}"),
        Ok(_) => panic!("mismatched bot id should be rejected"),
    }
}

#[tokio::test]
async fn connect_reports_rejected_token() {
    let body = r#"{"ok":false,"error_code":401,"description":"Unauthorized"}"#.to_owned();
    let transport = TelegramTransport::with_api_url(serve_api_once(body).await);

    assert!(matches!(
        transport.connect(&credentials()).await,
        Err(TransportError::Connect(_))
    ));
}

#[tokio::test]
async fn missing_attachment_is_a_send_error() {
    let transport = TelegramTransport::with_api_url(serve_api_once(get_me_body(1234)).await);
    let session = match transport.connect(&credentials()).await {
        Ok(session) => session,
        Err(err) => panic!("handshake should succeed: {err}"),
    };
    let tmp = tempfile::tempdir().expect("should create temp dir");
    let missing: PathBuf = tmp.path().join("nowhere.jpg");

    let result = session
        .send_media(&Target::Id(42), &Attachment::Image(missing), "caption")
        .await;

    match result {
        Err(TransportError::Send(message)) => assert!(message.contains("nowhere.jpg")),
        other => panic!("expected Send error, got: {other:?}"),
    }
}
