//! Lazily-created, process-lifetime messaging session.
//!
//! The [`SessionManager`] opens the session on first use and keeps it for
//! every later send. Creation is double-checked under an async mutex so that
//! concurrent first callers trigger a single connect handshake and all of
//! them receive the same handle. After that, the fast path never touches the
//! lock.

use std::sync::Arc;

use tokio::sync::{watch, Mutex, OnceCell};
use tracing::{debug, error, info, warn};

use super::{
    DeliveryError, MessagingTransport, SendRequest, SessionCredentials, SessionHandle, Target,
};

/// Lifecycle of the managed session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No handle yet (also the state after a failed connect).
    Uninitialized,
    /// A connect handshake is in flight.
    Connecting,
    /// A handle exists and is reused for every send.
    Connected,
}

/// Owns the single shared [`SessionHandle`] for a process.
///
/// Construct one per process (or per test) and share it behind an `Arc`.
/// The handle is never closed or replaced once connected; a dropped remote
/// session surfaces as [`DeliveryError::TransportSend`] on the next send.
pub struct SessionManager {
    transport: Arc<dyn MessagingTransport>,
    credentials: SessionCredentials,
    default_target: Option<Target>,
    handle: OnceCell<Arc<dyn SessionHandle>>,
    init_guard: Mutex<()>,
    state: watch::Sender<SessionState>,
}

impl SessionManager {
    /// Create a manager. No I/O happens until the first acquisition.
    pub fn new(
        transport: Arc<dyn MessagingTransport>,
        credentials: SessionCredentials,
        default_target: Option<Target>,
    ) -> Self {
        let (state, _) = watch::channel(SessionState::Uninitialized);
        Self {
            transport,
            credentials,
            default_target,
            handle: OnceCell::new(),
            init_guard: Mutex::new(()),
            state,
        }
    }

    /// Target used when a request does not name one.
    pub fn default_target(&self) -> Option<&Target> {
        self.default_target.as_ref()
    }

    /// Resolve the destination of a send: `explicit`, else the default.
    ///
    /// Workflows call this before any remote call or file write so a missing
    /// target aborts without side effects.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::MissingTarget`] when neither is set.
    pub fn resolve_target(&self, explicit: Option<Target>) -> Result<Target, DeliveryError> {
        explicit
            .or_else(|| self.default_target.clone())
            .ok_or_else(|| {
                warn!("send requested without a target");
                DeliveryError::MissingTarget
            })
    }

    /// Current session state.
    pub fn state(&self) -> SessionState {
        *self.state.borrow()
    }

    /// Subscribe to session state changes.
    pub fn watch_state(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    /// Return the shared session, connecting it on first use.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::TransportUnavailable`] before any network
    /// call when the transport capability is absent, and
    /// [`DeliveryError::ConnectionFailed`] when the handshake is rejected.
    /// A failed handshake is not retried here; the next call tries again.
    pub async fn acquire_session(&self) -> Result<Arc<dyn SessionHandle>, DeliveryError> {
        if !self.transport.is_available() {
            let reason = self.transport.unavailable_reason();
            warn!(transport = self.transport.name(), %reason, "messaging transport unavailable");
            return Err(DeliveryError::TransportUnavailable(reason));
        }

        if let Some(handle) = self.handle.get() {
            return Ok(Arc::clone(handle));
        }

        let _guard = self.init_guard.lock().await;

        // Another caller may have connected while we waited for the guard.
        if let Some(handle) = self.handle.get() {
            return Ok(Arc::clone(handle));
        }

        self.state.send_replace(SessionState::Connecting);
        let mut pending = PendingConnect::new(&self.state);
        info!(
            transport = self.transport.name(),
            session = %self.credentials.session_name,
            "opening messaging session"
        );

        match self.transport.connect(&self.credentials).await {
            Ok(handle) => {
                if self.handle.set(Arc::clone(&handle)).is_err() {
                    debug!("session handle was already stored");
                }
                self.state.send_replace(SessionState::Connected);
                pending.finish();
                info!(session = %handle.describe(), "messaging session connected");
                Ok(handle)
            }
            Err(source) => {
                drop(pending);
                error!(
                    transport = self.transport.name(),
                    error = %source,
                    "messaging session connect failed"
                );
                Err(DeliveryError::ConnectionFailed {
                    transport: self.transport.name().to_owned(),
                    source,
                })
            }
        }
    }

    /// Deliver one request over the shared session.
    ///
    /// Exactly one transport call is made: `send_media` when the request
    /// carries an attachment, `send_text` otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`DeliveryError::MissingTarget`] (with no transport calls)
    /// when no target can be resolved, any acquisition error from
    /// [`acquire_session`](Self::acquire_session), or
    /// [`DeliveryError::TransportSend`] when the transport rejects the send.
    pub async fn send(&self, request: SendRequest) -> Result<(), DeliveryError> {
        let SendRequest {
            target,
            text,
            attachment,
        } = request;

        let target = self.resolve_target(target)?;

        let handle = self.acquire_session().await?;

        let result = match &attachment {
            Some(attachment) => handle.send_media(&target, attachment, &text).await,
            None => handle.send_text(&target, &text).await,
        };

        match result {
            Ok(()) => {
                debug!(
                    %target,
                    attachment = attachment.as_ref().map(|a| a.kind()),
                    chars = text.chars().count(),
                    "message delivered"
                );
                Ok(())
            }
            Err(source) => {
                error!(%target, error = %source, "message delivery failed");
                Err(DeliveryError::TransportSend { target, source })
            }
        }
    }
}

/// Resets the state to `Uninitialized` when a connect does not finish,
/// whether it failed or the caller's future was dropped mid-handshake.
struct PendingConnect<'a> {
    state: &'a watch::Sender<SessionState>,
    finished: bool,
}

impl<'a> PendingConnect<'a> {
    fn new(state: &'a watch::Sender<SessionState>) -> Self {
        Self {
            state,
            finished: false,
        }
    }

    fn finish(&mut self) {
        self.finished = true;
    }
}

impl Drop for PendingConnect<'_> {
    fn drop(&mut self) {
        if !self.finished {
            self.state.send_replace(SessionState::Uninitialized);
        }
    }
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("transport", &self.transport.name())
            .field("credentials", &self.credentials)
            .field("default_target", &self.default_target)
            .field("state", &self.state())
            .finish()
    }
}
