//! One-shot post workflow: theme → generate → dedupe → wait → send → record.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{Datelike, Local, NaiveDateTime};
use tokio::sync::watch;
use tracing::{info, warn};

use crate::app::AppContext;
use crate::compose::{post_messages, Length, PostBrief, Tone};
use crate::delivery::{DeliveryError, SendRequest, Target};
use crate::providers::{CompletionRequest, ProviderError};
use crate::store::StoreError;

/// Accepted `--send-at` formats (local time).
const SEND_AT_FORMATS: [&str; 3] = ["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M", "%Y-%m-%d %H:%M:%S"];

/// Where the theme of a post comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ThemeSource {
    /// Today's entry in the theme schedule file.
    Scheduled,
    /// Given by the caller.
    Explicit(String),
}

/// Everything needed to produce and deliver one post.
#[derive(Debug, Clone)]
pub struct PostOptions {
    /// Theme selection.
    pub theme: ThemeSource,
    /// Voice.
    pub tone: Tone,
    /// Length.
    pub length: Length,
    /// Hashtags to weave in.
    pub hashtags: Option<String>,
    /// Account to mention.
    pub mention: Option<String>,
    /// Image to post with the text as caption.
    pub image: Option<PathBuf>,
    /// File to post with the text as caption (ignored when `image` is set).
    pub file: Option<PathBuf>,
    /// Completion model.
    pub model: String,
    /// Sampling temperature.
    pub temperature: f32,
    /// Local time to send at.
    pub send_at: Option<NaiveDateTime>,
    /// Delay before sending, used when `send_at` is not set.
    pub delay: Option<Duration>,
    /// Destination; the configured default target when `None`.
    pub target: Option<Target>,
}

impl PostOptions {
    /// Options for an immediate text-only post with default tone and length.
    pub fn new(theme: ThemeSource, model: impl Into<String>, temperature: f32) -> Self {
        Self {
            theme,
            tone: Tone::default(),
            length: Length::default(),
            hashtags: None,
            mention: None,
            image: None,
            file: None,
            model: model.into(),
            temperature,
            send_at: None,
            delay: None,
            target: None,
        }
    }
}

/// How a post run ended without error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostOutcome {
    /// Sent and recorded in history.
    Sent {
        /// The delivered text.
        post: String,
    },
    /// The generated text already appears in history; nothing was sent.
    Duplicate {
        /// The rejected text.
        post: String,
    },
    /// Shutdown arrived while waiting to send; nothing was sent.
    Cancelled {
        /// The unsent text.
        post: String,
    },
}

/// Failures that abort a post.
#[derive(Debug, thiserror::Error)]
pub enum WorkflowError {
    /// No theme was given and none is scheduled for today.
    #[error("no theme given and none scheduled for today")]
    MissingTheme,
    /// Completion request failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// Delivery failed.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    /// History could not be read or written.
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Generate, dedupe, optionally wait, send, and record one post.
///
/// The wait (from `send_at` or `delay`) ends early with
/// [`PostOutcome::Cancelled`] when `shutdown` flips to `true`.
///
/// # Errors
///
/// Returns [`WorkflowError::MissingTheme`] or a
/// [`DeliveryError::MissingTarget`] before any remote call or wait when no
/// theme or target resolves; otherwise propagates provider, delivery, and history
/// errors. History is only written after a successful send.
pub async fn run_post(
    ctx: &AppContext,
    options: PostOptions,
    mut shutdown: watch::Receiver<bool>,
) -> Result<PostOutcome, WorkflowError> {
    let theme = match &options.theme {
        ThemeSource::Scheduled => ctx.store.scheduled_theme(Local::now().weekday()),
        ThemeSource::Explicit(theme) => Some(theme.trim().to_owned()).filter(|t| !t.is_empty()),
    }
    .ok_or(WorkflowError::MissingTheme)?;
    let target = ctx.delivery.resolve_target(options.target.clone())?;

    let brief = PostBrief {
        theme,
        tone: options.tone,
        length: options.length,
        hashtags: options.hashtags.clone(),
        mention: options.mention.clone(),
    };
    info!(
        theme = %brief.theme,
        tone = %brief.tone,
        length = %brief.length,
        model = %options.model,
        "generating post"
    );

    let identity = ctx.store.load_identity();
    let post = ctx
        .provider
        .complete(CompletionRequest {
            messages: post_messages(&identity, &brief),
            model: options.model.clone(),
            temperature: options.temperature,
        })
        .await?;

    if !ctx.store.is_unique(&post)? {
        warn!("generated post duplicates history, skipping");
        return Ok(PostOutcome::Duplicate { post });
    }

    let wait = schedule_delay(options.send_at, options.delay, Local::now().naive_local());
    if !wait.is_zero() {
        info!(seconds = wait.as_secs(), "waiting before send");
        if !wait_or_shutdown(wait, &mut shutdown).await {
            warn!("shutdown during wait, post not sent");
            return Ok(PostOutcome::Cancelled { post });
        }
    }

    let request = SendRequest::text(post.clone())
        .with_media(options.image, options.file)
        .to(target);
    ctx.delivery.send(request).await?;

    ctx.store.record(&post, Local::now())?;
    info!("post sent and recorded");
    Ok(PostOutcome::Sent { post })
}

/// How long to wait before sending.
///
/// `send_at` wins over `delay`; instants in the past clamp to zero.
pub fn schedule_delay(
    send_at: Option<NaiveDateTime>,
    delay: Option<Duration>,
    now: NaiveDateTime,
) -> Duration {
    if let Some(at) = send_at {
        return at
            .signed_duration_since(now)
            .to_std()
            .unwrap_or(Duration::ZERO);
    }
    delay.unwrap_or(Duration::ZERO)
}

/// Sleep for `delay` unless shutdown is signalled first.
///
/// Returns `true` when the full delay elapsed, `false` when cancelled. A
/// closed shutdown channel can no longer cancel, so the sleep completes.
pub async fn wait_or_shutdown(delay: Duration, shutdown: &mut watch::Receiver<bool>) -> bool {
    if *shutdown.borrow() {
        return false;
    }
    if delay.is_zero() {
        return true;
    }

    let sleep = tokio::time::sleep(delay);
    tokio::pin!(sleep);

    loop {
        tokio::select! {
            () = &mut sleep => return true,
            changed = shutdown.changed() => match changed {
                Ok(()) if *shutdown.borrow() => return false,
                Ok(()) => {}
                Err(_) => {
                    (&mut sleep).await;
                    return true;
                }
            },
        }
    }
}

/// Parse a `--send-at` value as local time.
///
/// # Errors
///
/// Returns a message listing the accepted formats.
pub fn parse_send_at(raw: &str) -> Result<NaiveDateTime, String> {
    SEND_AT_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw.trim(), fmt).ok())
        .ok_or_else(|| format!("expected YYYY-MM-DDTHH:MM[:SS], got {raw:?}"))
}
