//! News digest: fetch an RSS/Atom feed, summarise it in persona, send a
//! preview for review.

use std::path::PathBuf;
use std::time::Duration;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use tracing::{debug, info};

use crate::app::AppContext;
use crate::compose::{digest_messages, digest_preview};
use crate::config::DigestConfig;
use crate::delivery::{DeliveryError, SendRequest, Target};
use crate::providers::{CompletionRequest, ProviderError};
use crate::store::{self, StoreError};

/// Timeout for the feed request.
const FEED_TIMEOUT: Duration = Duration::from_secs(30);

/// One headline from the feed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FeedItem {
    /// Headline.
    pub title: String,
    /// Article URL.
    pub link: String,
}

/// Failures of the digest workflow.
#[derive(Debug, thiserror::Error)]
pub enum DigestError {
    /// The feed could not be downloaded.
    #[error("failed to fetch feed: {0}")]
    Fetch(#[from] reqwest::Error),
    /// The feed body is not well-formed XML.
    #[error("malformed feed: {0}")]
    Feed(String),
    /// The feed has no items.
    #[error("feed has no items")]
    EmptyFeed,
    /// The news prompt file does not exist.
    #[error("news prompt not found: {}", .0.display())]
    MissingPrompt(PathBuf),
    /// Completion request failed.
    #[error(transparent)]
    Provider(#[from] ProviderError),
    /// The preview could not be delivered.
    #[error(transparent)]
    Delivery(#[from] DeliveryError),
    /// The prompt could not be read or the digest could not be saved.
    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Field {
    Title,
    Link,
}

/// Extract up to `limit` items from an RSS 2.0 or Atom document.
///
/// Items without a title are skipped. Atom `<link href="..."/>` is
/// accepted alongside RSS `<link>text</link>`.
///
/// # Errors
///
/// Returns [`DigestError::Feed`] when the XML is malformed.
pub fn parse_feed_items(xml: &str, limit: usize) -> Result<Vec<FeedItem>, DigestError> {
    let mut reader = Reader::from_str(xml);
    reader.config_mut().trim_text(true);

    let mut items = Vec::new();
    let mut current: Option<FeedItem> = None;
    let mut field: Option<Field> = None;

    while items.len() < limit {
        match reader.read_event() {
            Ok(Event::Start(ref e)) => match e.local_name().as_ref() {
                b"item" | b"entry" => current = Some(FeedItem::default()),
                b"title" if current.is_some() => field = Some(Field::Title),
                b"link" => {
                    if let Some(item) = current.as_mut() {
                        take_href(e, item);
                        field = Some(Field::Link);
                    }
                }
                _ => {}
            },
            Ok(Event::Empty(ref e)) => {
                if e.local_name().as_ref() == b"link" {
                    if let Some(item) = current.as_mut() {
                        take_href(e, item);
                    }
                }
            }
            Ok(Event::Text(e)) => {
                if let (Some(item), Some(f)) = (current.as_mut(), field) {
                    let text = e.unescape().map_err(|err| DigestError::Feed(err.to_string()))?;
                    push_text(item, f, &text);
                }
            }
            Ok(Event::CData(e)) => {
                if let (Some(item), Some(f)) = (current.as_mut(), field) {
                    let raw = e.into_inner();
                    push_text(item, f, &String::from_utf8_lossy(&raw));
                }
            }
            Ok(Event::End(ref e)) => match e.local_name().as_ref() {
                b"item" | b"entry" => {
                    if let Some(item) = current.take() {
                        if !item.title.trim().is_empty() {
                            items.push(item);
                        }
                    }
                    field = None;
                }
                b"title" | b"link" => field = None,
                _ => {}
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(DigestError::Feed(e.to_string())),
            _ => {}
        }
    }

    Ok(items)
}

fn take_href(e: &BytesStart<'_>, item: &mut FeedItem) {
    if !item.link.is_empty() {
        return;
    }
    let rel = e
        .try_get_attribute("rel")
        .ok()
        .flatten()
        .and_then(|a| a.unescape_value().ok().map(|v| v.into_owned()));
    if rel.as_deref().is_some_and(|r| r != "alternate") {
        return;
    }
    if let Ok(Some(href)) = e.try_get_attribute("href") {
        if let Ok(value) = href.unescape_value() {
            item.link = value.trim().to_owned();
        }
    }
}

fn push_text(item: &mut FeedItem, field: Field, text: &str) {
    let target = match field {
        Field::Title => &mut item.title,
        Field::Link => &mut item.link,
    };
    target.push_str(text.trim());
}

/// Render items as `- title\nlink` lines for the prompt.
pub fn format_items(items: &[FeedItem]) -> String {
    items
        .iter()
        .map(|item| format!("- {}\n{}", item.title.trim(), item.link.trim()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Download `url` and parse up to `limit` items.
///
/// # Errors
///
/// Returns [`DigestError::Fetch`] on network or HTTP status failure and
/// [`DigestError::Feed`] on malformed XML.
pub async fn fetch_feed(
    client: &reqwest::Client,
    url: &str,
    limit: usize,
) -> Result<Vec<FeedItem>, DigestError> {
    let body = client
        .get(url)
        .timeout(FEED_TIMEOUT)
        .send()
        .await?
        .error_for_status()?
        .text()
        .await?;
    debug!(url, bytes = body.len(), "feed downloaded");
    parse_feed_items(&body, limit)
}

/// Fetch, summarise, save, and preview the news digest.
///
/// The preview goes to `preview_target`, or the default target when that
/// is `None`. Returns the digest text.
///
/// # Errors
///
/// Fails on feed, prompt, provider, storage, or delivery errors. A missing
/// preview target is reported before the feed is fetched; the digest file is
/// written before the preview is sent.
pub async fn run_digest(
    ctx: &AppContext,
    config: &DigestConfig,
    preview_target: Option<Target>,
) -> Result<String, DigestError> {
    let target = ctx.delivery.resolve_target(preview_target)?;
    let client = reqwest::Client::new();
    let items = fetch_feed(&client, &config.feed_url, config.limit).await?;
    if items.is_empty() {
        return Err(DigestError::EmptyFeed);
    }
    info!(feed = %config.feed_url, items = items.len(), "feed parsed");

    let news_prompt = store::read_text(&config.prompt_file)?
        .ok_or_else(|| DigestError::MissingPrompt(config.prompt_file.clone()))?;
    let identity = ctx.store.load_identity();

    let digest = ctx
        .provider
        .complete(CompletionRequest {
            messages: digest_messages(&identity, &news_prompt, &format_items(&items)),
            model: config.model.clone(),
            temperature: config.temperature,
        })
        .await?;

    store::write_text(&config.output_file, &digest)?;
    info!(path = %config.output_file.display(), "digest saved");

    ctx.delivery
        .send(SendRequest::text(digest_preview(&digest)).to(target))
        .await?;
    info!("digest preview sent");

    Ok(digest)
}
