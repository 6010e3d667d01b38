//! Telegram Bot API transport built on `teloxide`.
//!
//! `connect` performs a `getMe` round-trip so bad tokens fail at acquisition
//! time rather than on the first send.

use std::sync::Arc;

use async_trait::async_trait;
use teloxide::prelude::*;
use teloxide::types::{InputFile, Recipient};
use tracing::debug;
use url::Url;

use super::{
    Attachment, MessagingTransport, SessionCredentials, SessionHandle, Target, TransportError,
};

/// Opens Telegram Bot API sessions.
#[derive(Debug, Clone, Default)]
pub struct TelegramTransport {
    api_url: Option<Url>,
}

impl TelegramTransport {
    /// Transport against the public Bot API.
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport against a self-hosted Bot API server.
    pub fn with_api_url(api_url: Url) -> Self {
        Self {
            api_url: Some(api_url),
        }
    }

    /// Bot client for `credentials`, pointed at this transport's API root.
    ///
    /// The chat bot's dispatcher polls with the same client settings the
    /// session uses for sends.
    pub fn bot(&self, credentials: &SessionCredentials) -> Bot {
        let bot = Bot::new(credentials.bot_token());
        match &self.api_url {
            Some(url) => bot.set_api_url(url.clone()),
            None => bot,
        }
    }
}

#[async_trait]
impl MessagingTransport for TelegramTransport {
    fn name(&self) -> &str {
        "telegram"
    }

    async fn connect(
        &self,
        credentials: &SessionCredentials,
    ) -> Result<Arc<dyn SessionHandle>, TransportError> {
        let bot = self.bot(credentials);
        let me = bot
            .get_me()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let bot_id = me.user.id.0;
        if u64::try_from(credentials.app_id).ok() != Some(bot_id) {
            return Err(TransportError::Connect(format!(
                "token belongs to bot {bot_id}, expected app id {}",
                credentials.app_id
            )));
        }

        debug!(bot_id, username = ?me.user.username, "telegram getMe succeeded");

        Ok(Arc::new(TelegramSession {
            bot,
            session_name: credentials.session_name.clone(),
            username: me.user.username.clone(),
        }))
    }
}

/// A connected bot session.
#[derive(Debug, Clone)]
pub struct TelegramSession {
    bot: Bot,
    session_name: String,
    username: Option<String>,
}

/// Map a [`Target`] to a teloxide recipient.
pub fn recipient(target: &Target) -> Recipient {
    match target {
        Target::Id(id) => Recipient::Id(ChatId(*id)),
        Target::Username(name) => Recipient::ChannelUsername(name.clone()),
    }
}

#[async_trait]
impl SessionHandle for TelegramSession {
    async fn send_text(&self, target: &Target, text: &str) -> Result<(), TransportError> {
        self.bot
            .send_message(recipient(target), text)
            .await
            .map_err(|e| TransportError::Send(e.to_string()))?;
        Ok(())
    }

    async fn send_media(
        &self,
        target: &Target,
        attachment: &Attachment,
        caption: &str,
    ) -> Result<(), TransportError> {
        let path = attachment.path();
        if !tokio::fs::try_exists(path).await.unwrap_or(false) {
            return Err(TransportError::Send(format!(
                "{} not found: {}",
                attachment.kind(),
                path.display()
            )));
        }

        let file = InputFile::file(path);
        let result = match attachment {
            Attachment::Image(_) => {
                let mut req = self.bot.send_photo(recipient(target), file);
                if !caption.is_empty() {
                    req = req.caption(caption);
                }
                req.await.map(|_| ())
            }
            Attachment::File(_) => {
                let mut req = self.bot.send_document(recipient(target), file);
                if !caption.is_empty() {
                    req = req.caption(caption);
                }
                req.await.map(|_| ())
            }
        };

        result.map_err(|e| TransportError::Send(e.to_string()))
    }

    fn describe(&self) -> String {
        match &self.username {
            Some(username) => format!("{} (@{username})", self.session_name),
            None => self.session_name.clone(),
        }
    }
}
