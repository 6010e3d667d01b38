//! Slash command replies.

use chrono::{Local, NaiveDate};

use crate::app::AppContext;

/// Reply for a slash command.
pub fn dispatch(command: &str, ctx: &AppContext) -> String {
    match command {
        "start" => handle_start(Local::now().date_naive()),
        "help" => handle_help(),
        "last" => handle_last(ctx.store.last_post()),
        _ => format!("Unknown command: /{command}"),
    }
}

/// Greeting with today's date.
pub fn handle_start(today: NaiveDate) -> String {
    format!("Welcome! Today is {}.", today.format("%Y-%m-%d"))
}

/// List available commands.
pub fn handle_help() -> String {
    [
        "Available commands:",
        "/start - greeting",
        "/help - show this message",
        "/last - show the most recent post",
    ]
    .join("\n")
}

/// Show the most recent post, if one was recorded.
pub fn handle_last(last_post: Option<String>) -> String {
    match last_post {
        Some(post) if !post.trim().is_empty() => post,
        _ => "Nothing has been posted yet.".to_owned(),
    }
}
