//! Chat bot: teloxide dispatcher plus the daily scheduled post.
//!
//! Messages from the configured target chat get an in-persona reply from
//! the completion provider; messages from any other chat are echoed back.
//! Every reply goes out through the shared [`SessionManager`], the same
//! session the daily post uses.
//!
//! [`SessionManager`]: crate::delivery::SessionManager

use std::sync::Arc;

use anyhow::Context;
use teloxide::dispatching::UpdateFilterExt;
use teloxide::prelude::*;
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::app::AppContext;
use crate::autopost::{PostOptions, ThemeSource};
use crate::compose::chat_reply_messages;
use crate::config::Settings;
use crate::delivery::{SendRequest, Target};
use crate::providers::CompletionRequest;

pub mod commands;
pub mod scheduler;

// ---------------------------------------------------------------------------
// Routing
// ---------------------------------------------------------------------------

/// What to do with an incoming text message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route<'a> {
    /// Slash command (name without `/` or `@bot` suffix) and its arguments.
    Command(&'a str, &'a str),
    /// Reply in persona via the completion provider.
    Persona,
    /// Send the text back unchanged.
    Echo,
}

/// Decide how to answer `text` arriving in `chat`.
pub fn route<'a>(text: &'a str, chat: ChatId, persona_chat: Option<ChatId>) -> Route<'a> {
    if let Some(without_slash) = text.strip_prefix('/') {
        let (full_command, args) = match without_slash.split_once(char::is_whitespace) {
            Some((cmd, rest)) => (cmd, rest.trim()),
            None => (without_slash, ""),
        };
        let command = full_command.split('@').next().unwrap_or(full_command);
        return Route::Command(command, args);
    }
    if persona_chat == Some(chat) {
        Route::Persona
    } else {
        Route::Echo
    }
}

// ---------------------------------------------------------------------------
// Shared state for handler injection
// ---------------------------------------------------------------------------

/// Dependencies injected into teloxide handlers via `dptree::deps!`.
#[derive(Clone)]
struct BotState {
    ctx: AppContext,
    persona_chat: Option<ChatId>,
    chat_model: Arc<str>,
    chat_temperature: f32,
}

// ---------------------------------------------------------------------------
// Public entry point
// ---------------------------------------------------------------------------

/// Run the chat bot and the daily post until Ctrl+C.
///
/// # Errors
///
/// Returns an error if Telegram credentials are missing, the API URL is
/// invalid, or the daily post cron expression does not parse.
pub async fn run_bot(
    ctx: AppContext,
    settings: &Settings,
    shutdown_tx: watch::Sender<bool>,
) -> anyhow::Result<()> {
    let credentials = settings
        .telegram
        .clone()
        .context(crate::app::TELEGRAM_NOT_CONFIGURED)?;

    let schedule = scheduler::parse_schedule(&settings.config.bot.daily_post_cron)
        .with_context(|| {
            format!(
                "invalid bot.daily_post_cron: {:?}",
                settings.config.bot.daily_post_cron
            )
        })?;

    let bot = crate::app::telegram_transport(settings)?.bot(&credentials);

    // Open the shared session up front so credential problems surface now.
    let session = ctx.delivery.acquire_session().await?;
    info!(session = %session.describe(), "bot session ready");

    let daily = PostOptions::new(
        ThemeSource::Scheduled,
        settings.config.generation.model.clone(),
        settings.config.generation.temperature,
    );
    let scheduler_handle = tokio::spawn(scheduler::run_daily_posts(
        ctx.clone(),
        schedule,
        daily,
        shutdown_tx.subscribe(),
    ));

    let persona_chat = match &settings.default_target {
        Some(Target::Id(id)) => Some(ChatId(*id)),
        _ => None,
    };
    if persona_chat.is_none() {
        warn!("default target is not a numeric chat id; all chats will be echoed");
    }

    let chat_model = settings
        .config
        .bot
        .chat_model
        .clone()
        .unwrap_or_else(|| settings.config.generation.model.clone());

    let state = BotState {
        ctx,
        persona_chat,
        chat_model: Arc::from(chat_model),
        chat_temperature: settings.config.bot.chat_temperature,
    };

    let handler = dptree::entry().branch(Update::filter_message().endpoint(handle_message));

    info!("telegram dispatcher starting");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    info!("telegram dispatcher stopped");
    shutdown_tx.send_replace(true);
    if let Err(e) = scheduler_handle.await {
        warn!(error = %e, "daily post task ended abnormally");
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Message handler
// ---------------------------------------------------------------------------

async fn handle_message(msg: Message, state: BotState) -> ResponseResult<()> {
    let Some(text) = msg.text() else {
        debug!(chat_id = msg.chat.id.0, "non-text message ignored");
        return Ok(());
    };

    let reply = match route(text, msg.chat.id, state.persona_chat) {
        Route::Command(name, _args) => commands::dispatch(name, &state.ctx),
        Route::Echo => text.to_owned(),
        Route::Persona => {
            let user_name = msg
                .from
                .as_ref()
                .map(|user| user.first_name.clone())
                .unwrap_or_else(|| "friend".to_owned());
            match persona_reply(&state, &user_name, text).await {
                Some(reply) => reply,
                None => return Ok(()),
            }
        }
    };

    let request = SendRequest::text(reply).to(Target::Id(msg.chat.id.0));
    if let Err(e) = state.ctx.delivery.send(request).await {
        warn!(chat_id = msg.chat.id.0, error = %e, "failed to send reply");
    }
    Ok(())
}

async fn persona_reply(state: &BotState, user_name: &str, text: &str) -> Option<String> {
    let identity = state.ctx.store.load_identity();
    let request = CompletionRequest {
        messages: chat_reply_messages(&identity, user_name, text),
        model: state.chat_model.to_string(),
        temperature: state.chat_temperature,
    };
    match state.ctx.provider.complete(request).await {
        Ok(reply) => Some(reply),
        Err(e) => {
            warn!(error = %e, "persona reply generation failed");
            None
        }
    }
}
