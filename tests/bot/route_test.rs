//! Incoming message routing.

use teloxide::types::ChatId;

use lowpulse::bot::{route, Route};

const PERSONA: Option<ChatId> = Some(ChatId(-100_42));

#[test]
fn slash_commands_are_split_from_arguments() {
    assert_eq!(route("/start", ChatId(1), PERSONA), Route::Command("start", ""));
    assert_eq!(
        route("/help  me please", ChatId(1), PERSONA),
        Route::Command("help", "me please")
    );
}

#[test]
fn bot_suffix_is_stripped_from_commands() {
    assert_eq!(
        route("/start@lowpulse_bot", ChatId(-100_42), PERSONA),
        Route::Command("start", "")
    );
}

#[test]
fn target_chat_gets_persona_replies() {
    assert_eq!(route("how was practice?", ChatId(-100_42), PERSONA), Route::Persona);
}

#[test]
fn other_chats_are_echoed() {
    assert_eq!(route("hello", ChatId(5), PERSONA), Route::Echo);
    assert_eq!(route("hello", ChatId(-100_42), None), Route::Echo);
}
