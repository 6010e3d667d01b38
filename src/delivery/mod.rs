//! Outbound delivery: targets, attachments, the transport seam, and the
//! shared session manager.
//!
//! Everything that leaves the process as a chat message goes through
//! [`SessionManager::send`]. The manager owns the single authenticated
//! [`SessionHandle`] and creates it lazily through a [`MessagingTransport`].
//!
//! Two transports are provided:
//! - [`telegram::TelegramTransport`]: Telegram Bot API via `teloxide`
//! - [`UnconfiguredTransport`]: stands in when no transport is configured,
//!   so sends fail eagerly with [`DeliveryError::TransportUnavailable`]

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;

pub mod session;
pub mod telegram;

pub use session::{SessionManager, SessionState};

// ---------------------------------------------------------------------------
// Targets and requests
// ---------------------------------------------------------------------------

/// Destination chat or channel for a message.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Target {
    /// Numeric chat id. Channels and supergroups are negative (`-100…`).
    Id(i64),
    /// Public username, always stored with its leading `@`.
    Username(String),
}

/// Returned when a target string is empty or only an `@`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid target: {0:?}")]
pub struct InvalidTarget(pub String);

impl FromStr for Target {
    type Err = InvalidTarget;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let trimmed = raw.trim();
        if let Ok(id) = trimmed.parse::<i64>() {
            return Ok(Self::Id(id));
        }
        let name = trimmed.trim_start_matches('@');
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(InvalidTarget(raw.to_owned()));
        }
        Ok(Self::Username(format!("@{name}")))
    }
}

impl From<i64> for Target {
    fn from(id: i64) -> Self {
        Self::Id(id)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Id(id) => write!(f, "{id}"),
            Self::Username(name) => f.write_str(name),
        }
    }
}

/// A single file sent alongside the message text (used as its caption).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Attachment {
    /// Picture, delivered as a photo.
    Image(PathBuf),
    /// Any other file, delivered as a document.
    File(PathBuf),
}

impl Attachment {
    /// Local path of the attached file.
    pub fn path(&self) -> &Path {
        match self {
            Self::Image(path) | Self::File(path) => path,
        }
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Image(_) => "image",
            Self::File(_) => "file",
        }
    }
}

/// One outbound message.
///
/// Holds at most one attachment, so "image or file, never both" is
/// enforced by the type rather than by convention.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SendRequest {
    /// Explicit destination. `None` falls back to the manager's default target.
    pub target: Option<Target>,
    /// Message body, or the caption when an attachment is present.
    pub text: String,
    /// Optional image or file.
    pub attachment: Option<Attachment>,
}

impl SendRequest {
    /// A text-only request to the default target.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            target: None,
            text: text.into(),
            attachment: None,
        }
    }

    /// Address the request to an explicit target.
    #[must_use]
    pub fn to(mut self, target: impl Into<Target>) -> Self {
        self.target = Some(target.into());
        self
    }

    /// Attach an image.
    #[must_use]
    pub fn with_image(mut self, path: impl Into<PathBuf>) -> Self {
        self.attachment = Some(Attachment::Image(path.into()));
        self
    }

    /// Attach a generic file.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.attachment = Some(Attachment::File(path.into()));
        self
    }

    /// Attach whichever of `image` / `file` is present. The image wins when
    /// both are given.
    #[must_use]
    pub fn with_media(self, image: Option<PathBuf>, file: Option<PathBuf>) -> Self {
        match (image, file) {
            (Some(image), _) => self.with_image(image),
            (None, Some(file)) => self.with_file(file),
            (None, None) => self,
        }
    }
}

// ---------------------------------------------------------------------------
// Credentials
// ---------------------------------------------------------------------------

/// Identity used to open the messaging session. Fixed for the process lifetime.
#[derive(Clone, PartialEq, Eq)]
pub struct SessionCredentials {
    /// Human-readable session label (appears in logs).
    pub session_name: String,
    /// Numeric application id.
    pub app_id: i64,
    app_secret: String,
}

impl fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("session_name", &self.session_name)
            .field("app_id", &self.app_id)
            .field("app_secret", &"[REDACTED]")
            .finish()
    }
}

impl SessionCredentials {
    /// Build credentials from their parts.
    pub fn new(
        session_name: impl Into<String>,
        app_id: i64,
        app_secret: impl Into<String>,
    ) -> Self {
        Self {
            session_name: session_name.into(),
            app_id,
            app_secret: app_secret.into(),
        }
    }

    /// Split a Bot API token (`"{app_id}:{app_secret}"`) into credentials.
    ///
    /// Returns `None` when the token does not have that shape.
    pub fn from_bot_token(session_name: impl Into<String>, token: &str) -> Option<Self> {
        let (id, secret) = token.trim().split_once(':')?;
        let app_id = id.parse::<i64>().ok()?;
        if secret.is_empty() {
            return None;
        }
        Some(Self::new(session_name, app_id, secret))
    }

    /// The application secret.
    pub fn app_secret(&self) -> &str {
        &self.app_secret
    }

    /// Bot API token form of these credentials.
    pub fn bot_token(&self) -> String {
        format!("{}:{}", self.app_id, self.app_secret)
    }
}

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Failures reported by a transport or a session handle.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The transport capability is not present in this deployment.
    #[error("transport unavailable: {0}")]
    Unavailable(String),
    /// The connect handshake was rejected or could not complete.
    #[error("connect failed: {0}")]
    Connect(String),
    /// A send was rejected (rate limit, bad target, oversized file, ...).
    #[error("send failed: {0}")]
    Send(String),
}

/// Errors surfaced to callers of [`SessionManager`].
#[derive(Debug, thiserror::Error)]
pub enum DeliveryError {
    /// No usable transport; raised at acquisition time, before any I/O.
    #[error("messaging transport unavailable: {0}")]
    TransportUnavailable(String),

    /// The transport rejected the connection attempt. Not retried.
    #[error("connecting to {transport} failed: {source}")]
    ConnectionFailed {
        /// Transport name.
        transport: String,
        /// Underlying transport error.
        #[source]
        source: TransportError,
    },

    /// Neither the request nor the configuration names a target.
    #[error("no target given and no default target configured")]
    MissingTarget,

    /// The transport reported a failure while sending.
    #[error("sending to {target} failed: {source}")]
    TransportSend {
        /// Resolved destination.
        target: Target,
        /// Underlying transport error.
        #[source]
        source: TransportError,
    },
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// A connected, authenticated messaging session.
///
/// Handles are created only by [`MessagingTransport::connect`] and shared
/// behind an `Arc` by the [`SessionManager`].
#[async_trait]
pub trait SessionHandle: Send + Sync {
    /// Send a plain text message.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Send`] when the transport rejects the message.
    async fn send_text(&self, target: &Target, text: &str) -> Result<(), TransportError>;

    /// Send an image or file with `caption` as its caption.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Send`] when the file is missing or the
    /// transport rejects the upload.
    async fn send_media(
        &self,
        target: &Target,
        attachment: &Attachment,
        caption: &str,
    ) -> Result<(), TransportError>;

    /// Short description of the session for logs (e.g. the bot username).
    fn describe(&self) -> String;
}

/// Something that can open a [`SessionHandle`].
#[async_trait]
pub trait MessagingTransport: Send + Sync {
    /// Transport name for logs and errors.
    fn name(&self) -> &str;

    /// Whether the transport capability exists in this deployment.
    ///
    /// Probed by the session manager before any connection attempt.
    fn is_available(&self) -> bool {
        true
    }

    /// Explanation used when [`is_available`](Self::is_available) is false.
    fn unavailable_reason(&self) -> String {
        format!("{} transport is not available", self.name())
    }

    /// Perform the connect handshake and return a live handle.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError::Connect`] on rejected credentials or network
    /// failure, [`TransportError::Unavailable`] if the capability is absent.
    async fn connect(
        &self,
        credentials: &SessionCredentials,
    ) -> Result<Arc<dyn SessionHandle>, TransportError>;
}

/// Placeholder transport for deployments without messaging configured.
#[derive(Debug, Clone)]
pub struct UnconfiguredTransport {
    reason: String,
}

impl UnconfiguredTransport {
    /// Create a placeholder that reports `reason` on every acquisition.
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl MessagingTransport for UnconfiguredTransport {
    fn name(&self) -> &str {
        "unconfigured"
    }

    fn is_available(&self) -> bool {
        false
    }

    fn unavailable_reason(&self) -> String {
        self.reason.clone()
    }

    async fn connect(
        &self,
        _credentials: &SessionCredentials,
    ) -> Result<Arc<dyn SessionHandle>, TransportError> {
        Err(TransportError::Unavailable(self.reason.clone()))
    }
}
