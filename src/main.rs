//! Lowpulse CLI entry point.
//!
//! `post` generates and sends one post, `bot` runs the chat bot with its
//! daily post, `send` delivers text or media as-is, `digest` previews the
//! news digest, and `whoami` checks the Telegram session.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Context;
use clap::{ArgGroup, Args, Parser, Subcommand};
use tokio::sync::watch;
use tracing::{info, warn};

use lowpulse::app::AppContext;
use lowpulse::autopost::{self, PostOptions, PostOutcome, ThemeSource};
use lowpulse::compose::{Length, Tone};
use lowpulse::config::{self, Settings};
use lowpulse::delivery::{SendRequest, Target};
use lowpulse::{bot, digest, logging};

/// Lowpulse: persona-driven Telegram autoposter.
#[derive(Parser)]
#[command(name = "lowpulse", version, about)]
struct Cli {
    /// Config file (default: $LOWPULSE_CONFIG, ./lowpulse.toml, ~/.lowpulse/config.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Command,
}

/// Available CLI subcommands.
#[derive(Subcommand)]
enum Command {
    /// Generate one post and send it.
    Post(PostArgs),
    /// Run the chat bot and the daily scheduled post.
    Bot,
    /// Send text, optionally with an image or file, without generation.
    Send {
        /// Message text (caption when media is attached).
        text: String,
        /// Image to send.
        #[arg(long, conflicts_with = "file")]
        image: Option<PathBuf>,
        /// File to send.
        #[arg(long)]
        file: Option<PathBuf>,
        /// Destination (chat id or @username); defaults to the configured target.
        #[arg(long)]
        target: Option<Target>,
    },
    /// Generate the news digest and send a preview.
    Digest {
        /// Preview destination; overrides `digest.preview_target`.
        #[arg(long)]
        target: Option<Target>,
    },
    /// Open the Telegram session and print the bot identity.
    Whoami,
}

/// Options for `post`.
#[derive(Args)]
#[command(group(ArgGroup::new("theme_source").required(true).args(["schedule", "theme"])))]
struct PostArgs {
    /// Use today's theme from the schedule file.
    #[arg(long)]
    schedule: bool,
    /// Post about this theme.
    #[arg(long)]
    theme: Option<String>,
    /// Voice of the post.
    #[arg(long, value_enum, default_value_t)]
    tone: Tone,
    /// Length of the post.
    #[arg(long, value_enum, default_value_t)]
    length: Length,
    /// Hashtags to include.
    #[arg(long)]
    hashtags: Option<String>,
    /// Account to mention.
    #[arg(long)]
    mention: Option<String>,
    /// Attach an image; the post becomes its caption.
    #[arg(long, conflicts_with = "file")]
    image: Option<PathBuf>,
    /// Attach a file; the post becomes its caption.
    #[arg(long)]
    file: Option<PathBuf>,
    /// Completion model (default from config).
    #[arg(long)]
    model: Option<String>,
    /// Sampling temperature (default from config).
    #[arg(long)]
    temp: Option<f32>,
    /// Local time to send at, e.g. 2025-06-01T09:30.
    #[arg(long, value_parser = autopost::parse_send_at, conflicts_with = "delay")]
    send_at: Option<chrono::NaiveDateTime>,
    /// Seconds to wait before sending.
    #[arg(long)]
    delay: Option<u64>,
    /// Destination (chat id or @username); defaults to the configured target.
    #[arg(long)]
    target: Option<Target>,
}

impl PostArgs {
    fn into_options(self, settings: &Settings) -> PostOptions {
        let theme = match self.theme {
            Some(theme) if !self.schedule => ThemeSource::Explicit(theme),
            _ => ThemeSource::Scheduled,
        };
        let generation = &settings.config.generation;
        let mut options = PostOptions::new(
            theme,
            self.model.unwrap_or_else(|| generation.model.clone()),
            self.temp.unwrap_or(generation.temperature),
        );
        options.tone = self.tone;
        options.length = self.length;
        options.hashtags = self.hashtags;
        options.mention = self.mention;
        options.image = self.image;
        options.file = self.file;
        options.send_at = self.send_at;
        options.delay = self.delay.map(Duration::from_secs);
        options.target = self.target;
        options
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Command::Bot => handle_bot(cli.config).await,
        Command::Post(args) => {
            let (settings, ctx) = cli_context(cli.config)?;
            handle_post(&ctx, &settings, args).await
        }
        Command::Send {
            text,
            image,
            file,
            target,
        } => {
            let (_, ctx) = cli_context(cli.config)?;
            handle_send(&ctx, text, image, file, target).await
        }
        Command::Digest { target } => {
            let (settings, ctx) = cli_context(cli.config)?;
            handle_digest(&ctx, &settings, target).await
        }
        Command::Whoami => {
            let (_, ctx) = cli_context(cli.config)?;
            handle_whoami(&ctx).await
        }
    }
}

/// Console logging, settings, and the shared context for one-shot commands.
fn cli_context(config_path: Option<PathBuf>) -> anyhow::Result<(Settings, AppContext)> {
    logging::init_cli();
    let settings = config::load_settings(config_path.as_deref())?;
    let ctx = AppContext::from_settings(&settings)?;
    Ok((settings, ctx))
}

/// Shutdown channel that flips to `true` on Ctrl+C.
fn shutdown_on_ctrl_c() -> (watch::Sender<bool>, watch::Receiver<bool>) {
    let (tx, rx) = watch::channel(false);
    let signal_tx = tx.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl+c received, shutting down");
            signal_tx.send_replace(true);
        }
    });
    (tx, rx)
}

async fn handle_post(ctx: &AppContext, settings: &Settings, args: PostArgs) -> anyhow::Result<()> {
    let options = args.into_options(settings);
    let (_shutdown_tx, shutdown_rx) = shutdown_on_ctrl_c();

    match autopost::run_post(ctx, options, shutdown_rx).await? {
        PostOutcome::Sent { post } => {
            println!("{post}");
            info!("post delivered");
        }
        PostOutcome::Duplicate { post } => {
            warn!(chars = post.chars().count(), "post already in history, not sent");
        }
        PostOutcome::Cancelled { .. } => warn!("cancelled before sending"),
    }
    Ok(())
}

async fn handle_bot(config_path: Option<PathBuf>) -> anyhow::Result<()> {
    let settings = logging::with_console(|| config::load_settings(config_path.as_deref()))?;
    let _logging_guard = logging::init_bot(&settings.config.logging.dir)?;
    info!(
        version = env!("CARGO_PKG_VERSION"),
        session = %settings.config.telegram.session_name,
        "lowpulse bot starting"
    );

    let ctx = AppContext::from_settings(&settings)?;
    let (shutdown_tx, _shutdown_rx) = shutdown_on_ctrl_c();
    bot::run_bot(ctx, &settings, shutdown_tx).await
}

async fn handle_send(
    ctx: &AppContext,
    text: String,
    image: Option<PathBuf>,
    file: Option<PathBuf>,
    target: Option<Target>,
) -> anyhow::Result<()> {
    let mut request = SendRequest::text(text).with_media(image, file);
    if let Some(target) = target {
        request = request.to(target);
    }
    ctx.delivery.send(request).await?;
    info!("message delivered");
    Ok(())
}

async fn handle_digest(
    ctx: &AppContext,
    settings: &Settings,
    target: Option<Target>,
) -> anyhow::Result<()> {
    let digest_config = &settings.config.digest;
    let target = match target {
        Some(target) => Some(target),
        None => digest_config
            .preview_target
            .as_deref()
            .map(str::parse::<Target>)
            .transpose()
            .context("invalid digest.preview_target")?,
    };

    let digest = digest::run_digest(ctx, digest_config, target).await?;
    println!("{digest}");
    Ok(())
}

async fn handle_whoami(ctx: &AppContext) -> anyhow::Result<()> {
    let session = ctx.delivery.acquire_session().await?;
    println!("{}", session.describe());
    if let Some(target) = ctx.delivery.default_target() {
        println!("default target: {target}");
    }
    Ok(())
}
