//! The single TCP session with the fingerprint terminal.
//!
//! [`DeviceLink`] owns at most one live connection. Every request/response
//! pair runs while holding the link's async mutex, so exactly one exchange is
//! outstanding at any time and a relay pulse can never interleave with a log
//! download on the wire.
//!
//! # Connection Lifecycle
//!
//! ```text
//! Disconnected ──connect()──> Connecting ──TCP up + CONNECT sent──> Connected
//!      ^                          │                                     │
//!      └────── timeout / error ───┘                                     │
//!      └────────────────── close / EOF / idle / I/O error ──────────────┘
//! ```
//!
//! A new `connect()` always tears down the previous session first. The
//! current [`LinkState`] is published on a watch channel.
//!
//! # Timeout Handling
//!
//! - connect: the TCP attempt is cancelled after `connect_timeout`
//! - idle: a session that saw no traffic for `idle_timeout` is dropped
//! - exchange: each caller passes its own deadline; hitting it keeps the
//!   session, any late bytes are discarded before the next request

use crate::error::{LinkError, Result};
use biogate_core::{
    DeviceSettings,
    constants::{
        DEFAULT_CONNECT_TIMEOUT_MS, DEFAULT_IDLE_TIMEOUT_MS, DEFAULT_LOG_FETCH_TIMEOUT_MS,
        DEFAULT_RELAY_ACK_TIMEOUT_MS,
    },
};
use biogate_protocol::{CommandCode, Request};
use bytes::BytesMut;
use std::fmt;
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::{Mutex, watch};
use tokio::time::{Instant, timeout};
use tracing::{debug, info, trace, warn};

/// Initial read buffer capacity; a typical log download is a few KB.
const READ_BUFFER_CAPACITY: usize = 4096;

/// Timing parameters for the device link.
///
/// # Example
///
/// ```
/// use biogate_network::LinkConfig;
/// use std::time::Duration;
///
/// let config = LinkConfig {
///     relay_ack_timeout: Duration::from_millis(500),
///     ..LinkConfig::default()
/// };
/// assert_eq!(config.connect_timeout, Duration::from_secs(3));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LinkConfig {
    /// Upper bound for the TCP connect
    pub connect_timeout: Duration,

    /// Session is dropped after this long without traffic
    pub idle_timeout: Duration,

    /// Deadline for a complete attendance-log download
    pub log_fetch_timeout: Duration,

    /// Deadline for the relay acknowledgment
    pub relay_ack_timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            idle_timeout: Duration::from_millis(DEFAULT_IDLE_TIMEOUT_MS),
            log_fetch_timeout: Duration::from_millis(DEFAULT_LOG_FETCH_TIMEOUT_MS),
            relay_ack_timeout: Duration::from_millis(DEFAULT_RELAY_ACK_TIMEOUT_MS),
        }
    }
}

/// Observable connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LinkState {
    Disconnected,
    Connecting,
    Connected,
}

impl fmt::Display for LinkState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LinkState::Disconnected => "disconnected",
            LinkState::Connecting => "connecting",
            LinkState::Connected => "connected",
        };
        f.write_str(name)
    }
}

/// How a request/response exchange ended without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Exchange {
    /// The response handler reported completion
    Completed,

    /// The caller's deadline passed first; the session stays open
    TimedOut,
}

struct Session {
    stream: TcpStream,
    buffer: BytesMut,
    peer: String,
    last_activity: Instant,
}

impl Session {
    async fn open(settings: &DeviceSettings, config: &LinkConfig) -> Result<Self> {
        let peer = settings.address();

        let stream = match timeout(config.connect_timeout, TcpStream::connect(peer.as_str())).await
        {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => return Err(e.into()),
            Err(_) => {
                return Err(LinkError::ConnectionTimeout(millis(config.connect_timeout)));
            }
        };

        // Relay pulses are two-byte payloads; don't let Nagle hold them back.
        if let Err(e) = stream.set_nodelay(true) {
            warn!(device = %peer, error = %e, "Failed to set TCP_NODELAY");
        }

        let mut session = Self {
            stream,
            buffer: BytesMut::with_capacity(READ_BUFFER_CAPACITY),
            peer,
            last_activity: Instant::now(),
        };

        // The terminal answers CONNECT, but nothing waits for it; a late
        // acknowledgment is discarded before the next request.
        let hello = Request::new(CommandCode::Connect, settings.comm_key);
        session.write(&hello, config.idle_timeout).await?;

        Ok(session)
    }

    fn is_idle(&self, idle_timeout: Duration) -> bool {
        self.last_activity.elapsed() >= idle_timeout
    }

    async fn write(&mut self, request: &Request, limit: Duration) -> Result<()> {
        trace!(device = %self.peer, %request, "Sending request");

        match timeout(limit, self.stream.write_all(&request.encode())).await {
            Ok(Ok(())) => {
                self.last_activity = Instant::now();
                Ok(())
            }
            Ok(Err(e)) => Err(e.into()),
            Err(_) => Err(LinkError::WriteTimeout(millis(limit))),
        }
    }

    /// Drop anything already sitting in the socket: acknowledgments nobody
    /// waited for, or the tail of an exchange that hit its deadline.
    fn discard_stale(&mut self) -> Result<usize> {
        self.buffer.clear();
        let mut discarded = 0;

        loop {
            match self.stream.try_read_buf(&mut self.buffer) {
                Ok(0) => {
                    return Err(LinkError::ConnectionLost(
                        "Terminal closed connection".to_string(),
                    ));
                }
                Ok(n) => {
                    discarded += n;
                    self.buffer.clear();
                }
                Err(e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(discarded)
    }

    async fn exchange<F>(
        &mut self,
        request: &Request,
        wait: Duration,
        idle_timeout: Duration,
        mut on_data: F,
    ) -> Result<Exchange>
    where
        F: FnMut(&mut BytesMut) -> biogate_core::Result<bool>,
    {
        let stale = self.discard_stale()?;
        if stale > 0 {
            debug!(device = %self.peer, bytes = stale, "Discarded stale bytes");
        }

        self.write(request, idle_timeout).await?;

        let deadline = Instant::now() + wait;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                return Ok(Exchange::TimedOut);
            }

            let read_limit = remaining.min(idle_timeout);
            match timeout(read_limit, self.stream.read_buf(&mut self.buffer)).await {
                Ok(Ok(0)) => {
                    return Err(LinkError::ConnectionLost(
                        "Terminal closed connection".to_string(),
                    ));
                }
                Ok(Ok(n)) => {
                    self.last_activity = Instant::now();
                    trace!(
                        device = %self.peer,
                        bytes = n,
                        buffered = self.buffer.len(),
                        "Received data"
                    );
                    if on_data(&mut self.buffer)? {
                        return Ok(Exchange::Completed);
                    }
                }
                Ok(Err(e)) => return Err(e.into()),
                Err(_) if read_limit < remaining => {
                    return Err(LinkError::IdleTimeout(millis(idle_timeout)));
                }
                Err(_) => return Ok(Exchange::TimedOut),
            }
        }
    }

    async fn shutdown(mut self) {
        let shutdown_timeout = Duration::from_millis(500);
        match timeout(shutdown_timeout, self.stream.shutdown()).await {
            Ok(Ok(())) => debug!(device = %self.peer, "Shutdown completed"),
            Ok(Err(e)) => debug!(device = %self.peer, error = %e, "Error during shutdown"),
            Err(_) => warn!(
                device = %self.peer,
                timeout_ms = millis(shutdown_timeout),
                "Shutdown timeout during close"
            ),
        }
    }
}

/// Owner of the one connection to the terminal.
///
/// Share it with `Arc`; all methods take `&self`.
///
/// # Example
///
/// ```no_run
/// use biogate_core::DeviceSettings;
/// use biogate_network::{DeviceLink, LinkConfig};
///
/// # async fn example() {
/// let link = DeviceLink::new(LinkConfig::default());
/// let settings = DeviceSettings::new("192.168.1.201");
///
/// if link.connect(&settings).await {
///     let records = link.fetch_scan_logs(&settings).await;
///     println!("{} records", records.len());
/// }
/// # }
/// ```
pub struct DeviceLink {
    config: LinkConfig,
    session: Mutex<Option<Session>>,
    state: watch::Sender<LinkState>,
}

impl DeviceLink {
    /// Create a disconnected link.
    pub fn new(config: LinkConfig) -> Self {
        let (state, _) = watch::channel(LinkState::Disconnected);
        Self {
            config,
            session: Mutex::new(None),
            state,
        }
    }

    pub fn config(&self) -> &LinkConfig {
        &self.config
    }

    /// Current connection state.
    pub fn state(&self) -> LinkState {
        *self.state.borrow()
    }

    /// Receive every future state change.
    pub fn subscribe(&self) -> watch::Receiver<LinkState> {
        self.state.subscribe()
    }

    pub fn is_connected(&self) -> bool {
        self.state() == LinkState::Connected
    }

    /// Open a fresh session, replacing any existing one.
    ///
    /// Resolves `false` on refusal, error or timeout; never returns an error.
    pub async fn connect(&self, settings: &DeviceSettings) -> bool {
        let mut slot = self.session.lock().await;
        self.reconnect(&mut slot, settings).await
    }

    /// Reuse the current session if it is alive and points at `settings`,
    /// otherwise connect.
    pub async fn ensure_connected(&self, settings: &DeviceSettings) -> bool {
        let mut slot = self.session.lock().await;

        if let Some(session) = slot.as_ref()
            && session.peer == settings.address()
            && !session.is_idle(self.config.idle_timeout)
        {
            return true;
        }

        self.reconnect(&mut slot, settings).await
    }

    /// Close the session gracefully. Idempotent.
    pub async fn close(&self) {
        let mut slot = self.session.lock().await;
        if let Some(session) = slot.take() {
            info!(device = %session.peer, "Closing terminal connection");
            session.shutdown().await;
        }
        self.set_state(LinkState::Disconnected);
    }

    async fn reconnect(&self, slot: &mut Option<Session>, settings: &DeviceSettings) -> bool {
        if let Some(previous) = slot.take() {
            debug!(device = %previous.peer, "Tearing down previous connection");
        }

        self.set_state(LinkState::Connecting);
        info!(device = %settings, "Connecting to terminal");

        match Session::open(settings, &self.config).await {
            Ok(session) => {
                info!(device = %session.peer, "Connected to terminal");
                *slot = Some(session);
                self.set_state(LinkState::Connected);
                true
            }
            Err(e) => {
                warn!(device = %settings, error = %e, "Terminal connection failed");
                self.set_state(LinkState::Disconnected);
                false
            }
        }
    }

    /// Run one request/response exchange on the live session.
    ///
    /// `on_data` sees the accumulated receive buffer after every read and
    /// returns `true` once the response is complete. Fatal errors drop the
    /// session; a passed deadline does not.
    pub(crate) async fn exchange<F>(
        &self,
        request: &Request,
        wait: Duration,
        on_data: F,
    ) -> Result<Exchange>
    where
        F: FnMut(&mut BytesMut) -> biogate_core::Result<bool> + Send,
    {
        let mut slot = self.session.lock().await;

        let idle = match slot.as_ref() {
            None => return Err(LinkError::NotConnected),
            Some(session) => session.is_idle(self.config.idle_timeout),
        };

        if idle {
            debug!("Session idle, dropping connection");
            *slot = None;
            self.set_state(LinkState::Disconnected);
            return Err(LinkError::IdleTimeout(millis(self.config.idle_timeout)));
        }

        let Some(session) = slot.as_mut() else {
            return Err(LinkError::NotConnected);
        };

        let result = session
            .exchange(request, wait, self.config.idle_timeout, on_data)
            .await;

        if let Err(e) = &result
            && e.is_fatal()
        {
            warn!(error = %e, command = %request.command, "Dropping terminal connection");
            *slot = None;
            self.set_state(LinkState::Disconnected);
        }

        result
    }

    fn set_state(&self, state: LinkState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = %previous, to = %state, "Link state changed");
        }
    }
}

impl Drop for DeviceLink {
    fn drop(&mut self) {
        if self.is_connected() {
            debug!("DeviceLink dropped while connected - connection will be closed");
        }
    }
}

pub(crate) fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
