//! Wiring of the long-lived collaborators shared by every workflow.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use url::Url;

use crate::config::Settings;
use crate::delivery::telegram::TelegramTransport;
use crate::delivery::{
    MessagingTransport, SessionCredentials, SessionManager, UnconfiguredTransport,
};
use crate::providers::openai::OpenAiProvider;
use crate::providers::CompletionProvider;
use crate::store::PostStore;

/// Explanation reported when no Telegram credentials are configured.
pub const TELEGRAM_NOT_CONFIGURED: &str =
    "Telegram is not configured: set TELEGRAM_BOT_TOKEN or TELEGRAM_APP_ID and TELEGRAM_APP_SECRET";

/// Collaborators passed into the post, bot, and digest workflows.
///
/// Cheap to clone; all clones share one provider and one messaging session.
#[derive(Clone)]
pub struct AppContext {
    /// Text generation.
    pub provider: Arc<dyn CompletionProvider>,
    /// Shared messaging session.
    pub delivery: Arc<SessionManager>,
    /// Persona, schedule, and history files.
    pub store: PostStore,
}

impl AppContext {
    /// Assemble a context from explicit parts.
    pub fn new(
        provider: Arc<dyn CompletionProvider>,
        delivery: Arc<SessionManager>,
        store: PostStore,
    ) -> Self {
        Self {
            provider,
            delivery,
            store,
        }
    }

    /// Build the production context from resolved settings.
    ///
    /// Nothing connects here; the messaging session opens on first send.
    ///
    /// # Errors
    ///
    /// Returns an error if the configured Telegram API URL is invalid.
    pub fn from_settings(settings: &Settings) -> anyhow::Result<Self> {
        let provider = build_provider(settings);
        let transport = build_transport(settings)?;

        let credentials = settings.telegram.clone().unwrap_or_else(|| {
            SessionCredentials::new(settings.config.telegram.session_name.clone(), 0, "")
        });
        let delivery = Arc::new(SessionManager::new(
            transport,
            credentials,
            settings.default_target.clone(),
        ));

        Ok(Self::new(
            provider,
            delivery,
            PostStore::new(settings.config.paths.clone()),
        ))
    }
}

/// Build the completion provider. A missing key is reported on first use.
pub fn build_provider(settings: &Settings) -> Arc<dyn CompletionProvider> {
    let api_key = settings.openai_api_key.clone().unwrap_or_default();
    if api_key.is_empty() {
        warn!("OPENAI_API_KEY is not set; generation will fail");
    }
    let provider = OpenAiProvider::with_base_url(&settings.config.openai.base_url, api_key);
    info!(
        provider = provider.name(),
        endpoint = provider.endpoint(),
        "completion provider registered"
    );
    Arc::new(provider)
}

/// Pick the messaging transport for these settings.
///
/// # Errors
///
/// Returns an error if `telegram.api_url` is set but not a valid URL.
pub fn build_transport(settings: &Settings) -> anyhow::Result<Arc<dyn MessagingTransport>> {
    if settings.telegram.is_none() {
        warn!("{TELEGRAM_NOT_CONFIGURED}");
        return Ok(Arc::new(UnconfiguredTransport::new(TELEGRAM_NOT_CONFIGURED)));
    }

    Ok(Arc::new(telegram_transport(settings)?))
}

/// Telegram transport for `telegram.api_url`, or the public Bot API.
///
/// # Errors
///
/// Returns an error if `telegram.api_url` is set but not a valid URL.
pub fn telegram_transport(settings: &Settings) -> anyhow::Result<TelegramTransport> {
    match settings.config.telegram.api_url.as_deref() {
        Some(raw) => {
            let url = Url::parse(raw).with_context(|| format!("invalid telegram.api_url: {raw}"))?;
            info!(%url, "using custom Telegram Bot API server");
            Ok(TelegramTransport::with_api_url(url))
        }
        None => Ok(TelegramTransport::new()),
    }
}
