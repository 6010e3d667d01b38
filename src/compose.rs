//! Prompt composition.
//!
//! Every prompt is the persona text as the system message followed by one
//! user message describing what to write.

use std::fmt;

use crate::providers::ChatMessage;

/// Voice of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Tone {
    /// Straight and informative.
    #[default]
    Serious,
    /// Light and playful.
    Funny,
    /// Dry, with a wink.
    Ironical,
}

impl fmt::Display for Tone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Serious => "serious",
            Self::Funny => "funny",
            Self::Ironical => "ironical",
        })
    }
}

/// Target length of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum Length {
    /// A few sentences.
    Short,
    /// A couple of paragraphs.
    #[default]
    Medium,
    /// A full long-read.
    Long,
}

impl fmt::Display for Length {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Short => "short",
            Self::Medium => "medium",
            Self::Long => "long",
        })
    }
}

/// What a single post should be about and how it should read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PostBrief {
    /// Subject of the post.
    pub theme: String,
    /// Voice.
    pub tone: Tone,
    /// Length.
    pub length: Length,
    /// Hashtags to include, e.g. `"#swim,#recovery"`.
    pub hashtags: Option<String>,
    /// Account to mention, e.g. `"@coach"`.
    pub mention: Option<String>,
}

impl PostBrief {
    /// A brief with default tone and length.
    pub fn new(theme: impl Into<String>) -> Self {
        Self {
            theme: theme.into(),
            tone: Tone::default(),
            length: Length::default(),
            hashtags: None,
            mention: None,
        }
    }

    /// The user prompt for this brief.
    pub fn prompt(&self) -> String {
        let mut prompt = format!(
            "Theme: {}\nTone: {}\nLength: {}",
            self.theme, self.tone, self.length
        );
        if let Some(hashtags) = self.hashtags.as_deref().filter(|h| !h.trim().is_empty()) {
            prompt.push_str("\nHashtags: ");
            prompt.push_str(hashtags.trim());
        }
        if let Some(mention) = self.mention.as_deref().filter(|m| !m.trim().is_empty()) {
            prompt.push_str("\nMention: ");
            prompt.push_str(mention.trim());
        }
        prompt
    }
}

/// Messages for a post built from a full brief.
pub fn post_messages(identity: &str, brief: &PostBrief) -> Vec<ChatMessage> {
    vec![ChatMessage::system(identity), ChatMessage::user(brief.prompt())]
}

/// Messages for an in-persona reply to a chat message.
pub fn chat_reply_messages(identity: &str, user_name: &str, text: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(identity),
        ChatMessage::user(format!(
            "A user named '{user_name}' writes in the chat: '{text}'. \
             Reply in your own style, addressing the user directly."
        )),
    ]
}

/// Messages for the news digest.
pub fn digest_messages(identity: &str, news_prompt: &str, news: &str) -> Vec<ChatMessage> {
    vec![
        ChatMessage::system(identity),
        ChatMessage::user(format!("{news_prompt}\n\nHere is the news:\n{news}")),
    ]
}

/// Wrap a digest for manual review before it is published.
pub fn digest_preview(digest: &str) -> String {
    format!(
        "Weekly digest preview:\n\n{digest}\n\nCheck style, facts and delivery before publishing."
    )
}
