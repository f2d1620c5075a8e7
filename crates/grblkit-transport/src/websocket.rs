//! WebSocket transport adapter
//!
//! Network connection to a FluidNC-style controller over `tungstenite`.
//! Owns the full link lifecycle: reconnection at a fixed interval,
//! heartbeat ping with pong timeout, a missed-pong cap that forces a
//! close-and-retry cycle, and a data-staleness timeout that does the
//! same. The policy is an explicit state machine kept separate from the
//! socket so its transitions are testable without a server.
//!
//! Incoming text/binary frames are queued as bytes; the engine drains
//! them through the [`Transport`] capability.

use std::collections::VecDeque;
use std::net::TcpStream;
use std::time::{Duration, Instant};

use grblkit_core::{ConnectionError, Result};
use grblkit_protocol::Transport;
use tungstenite::stream::MaybeTlsStream;
use tungstenite::{Message, WebSocket};

/// Link lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    /// No socket; a connect attempt is scheduled.
    Disconnected,
    /// Connect attempt in progress.
    Connecting,
    /// Socket open, heartbeat idle.
    Connected,
    /// Heartbeat ping sent, waiting for the pong.
    AwaitingPong,
}

/// Reconnection and keepalive policy knobs.
#[derive(Debug, Clone)]
pub struct LinkConfig {
    /// Delay between reconnect attempts.
    pub reconnect_interval: Duration,
    /// Delay between heartbeat pings.
    pub ping_interval: Duration,
    /// How long to wait for a pong before counting a miss.
    pub pong_timeout: Duration,
    /// Consecutive missed pongs before forcing a close-and-retry cycle.
    pub max_missed_pongs: u32,
    /// No received data within this window forces a reconnect.
    pub data_staleness_timeout: Duration,
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            reconnect_interval: Duration::from_secs(5),
            ping_interval: Duration::from_secs(5),
            pong_timeout: Duration::from_secs(1),
            max_missed_pongs: 3,
            data_staleness_timeout: Duration::from_secs(5),
        }
    }
}

/// What the adapter should do next, as decided by the policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LinkAction {
    None,
    Connect,
    SendPing,
    Close,
}

/// Socket-free link state machine.
///
/// The adapter feeds it connection events and timestamps; it answers
/// with the next action. All timing decisions live here.
#[derive(Debug)]
struct LinkPolicy {
    config: LinkConfig,
    state: LinkState,
    last_connect_attempt: Option<Instant>,
    last_ping_at: Option<Instant>,
    ping_sent_at: Option<Instant>,
    last_data_at: Option<Instant>,
    missed_pongs: u32,
}

impl LinkPolicy {
    fn new(config: LinkConfig) -> Self {
        Self {
            config,
            state: LinkState::Disconnected,
            last_connect_attempt: None,
            last_ping_at: None,
            ping_sent_at: None,
            last_data_at: None,
            missed_pongs: 0,
        }
    }

    fn state(&self) -> LinkState {
        self.state
    }

    fn poll(&mut self, now: Instant) -> LinkAction {
        match self.state {
            LinkState::Disconnected => {
                let due = self
                    .last_connect_attempt
                    .map_or(true, |at| now.duration_since(at) >= self.config.reconnect_interval);
                if due {
                    self.state = LinkState::Connecting;
                    self.last_connect_attempt = Some(now);
                    LinkAction::Connect
                } else {
                    LinkAction::None
                }
            }
            LinkState::Connecting => LinkAction::None,
            LinkState::Connected => {
                if self.is_stale(now) {
                    return self.force_close(now);
                }

                let ping_due = self
                    .last_ping_at
                    .map_or(true, |at| now.duration_since(at) >= self.config.ping_interval);
                if ping_due {
                    self.state = LinkState::AwaitingPong;
                    self.last_ping_at = Some(now);
                    self.ping_sent_at = Some(now);
                    LinkAction::SendPing
                } else {
                    LinkAction::None
                }
            }
            LinkState::AwaitingPong => {
                if self.is_stale(now) {
                    return self.force_close(now);
                }

                let timed_out = self
                    .ping_sent_at
                    .is_some_and(|at| now.duration_since(at) >= self.config.pong_timeout);
                if timed_out {
                    self.missed_pongs += 1;
                    if self.missed_pongs >= self.config.max_missed_pongs {
                        return self.force_close(now);
                    }
                    // Miss recorded; the next ping goes out a full
                    // interval after this one.
                    self.state = LinkState::Connected;
                }
                LinkAction::None
            }
        }
    }

    fn is_stale(&self, now: Instant) -> bool {
        self.last_data_at
            .is_some_and(|at| now.duration_since(at) >= self.config.data_staleness_timeout)
    }

    fn force_close(&mut self, now: Instant) -> LinkAction {
        self.state = LinkState::Disconnected;
        self.last_connect_attempt = Some(now);
        self.missed_pongs = 0;
        self.ping_sent_at = None;
        LinkAction::Close
    }

    fn on_connected(&mut self, now: Instant) {
        self.state = LinkState::Connected;
        self.missed_pongs = 0;
        self.ping_sent_at = None;
        self.last_ping_at = Some(now);
        self.last_data_at = Some(now);
    }

    fn on_connect_failed(&mut self) {
        self.state = LinkState::Disconnected;
    }

    fn on_closed(&mut self, now: Instant) {
        self.state = LinkState::Disconnected;
        self.last_connect_attempt = Some(now);
        self.missed_pongs = 0;
        self.ping_sent_at = None;
    }

    fn on_pong(&mut self) {
        if self.state == LinkState::AwaitingPong {
            self.state = LinkState::Connected;
        }
        self.missed_pongs = 0;
        self.ping_sent_at = None;
    }

    fn on_data(&mut self, now: Instant) {
        self.last_data_at = Some(now);
    }
}

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

/// Byte transport over a WebSocket connection.
pub struct WebsocketTransport {
    url: String,
    socket: Option<Socket>,
    queued: VecDeque<u8>,
    policy: LinkPolicy,
}

impl WebsocketTransport {
    /// Create an adapter for the given URL with default policy. No
    /// connection is attempted until [`service`](Self::service) runs.
    pub fn new(url: impl Into<String>) -> Self {
        Self::with_config(url, LinkConfig::default())
    }

    /// Create an adapter with a custom reconnection/keepalive policy.
    pub fn with_config(url: impl Into<String>, config: LinkConfig) -> Self {
        Self {
            url: url.into(),
            socket: None,
            queued: VecDeque::new(),
            policy: LinkPolicy::new(config),
        }
    }

    /// Current link state.
    pub fn link_state(&self) -> LinkState {
        self.policy.state()
    }

    pub fn is_connected(&self) -> bool {
        matches!(
            self.policy.state(),
            LinkState::Connected | LinkState::AwaitingPong
        )
    }

    /// Drive the link: pump incoming frames, then let the policy decide
    /// on reconnects, heartbeats, and forced closes. Call from the host
    /// loop alongside the engine's `update()`.
    pub fn service(&mut self) {
        self.pump_incoming();

        match self.policy.poll(Instant::now()) {
            LinkAction::None => {}
            LinkAction::Connect => self.try_connect(),
            LinkAction::SendPing => {
                if let Err(e) = self.send_message(Message::Ping(Vec::new())) {
                    tracing::warn!("heartbeat ping failed: {}", e);
                    self.drop_socket();
                }
            }
            LinkAction::Close => {
                tracing::warn!(url = %self.url, "link unhealthy, forcing reconnect");
                self.close_socket();
            }
        }
    }

    fn try_connect(&mut self) {
        match tungstenite::connect(self.url.as_str()) {
            Ok((mut socket, _response)) => {
                // The engine polls; reads must never block.
                if let MaybeTlsStream::Plain(stream) = socket.get_mut() {
                    if let Err(e) = stream.set_nonblocking(true) {
                        tracing::error!("failed to set nonblocking: {}", e);
                    }
                }
                tracing::info!(url = %self.url, "websocket connected");
                self.socket = Some(socket);
                self.policy.on_connected(Instant::now());
            }
            Err(e) => {
                tracing::warn!(url = %self.url, "websocket connect failed: {}", e);
                self.policy.on_connect_failed();
            }
        }
    }

    /// Read every frame currently available, queueing payload bytes.
    fn pump_incoming(&mut self) {
        let Some(socket) = self.socket.as_mut() else {
            return;
        };

        loop {
            match socket.read() {
                Ok(Message::Text(text)) => {
                    self.queued.extend(text.as_bytes());
                    self.policy.on_data(Instant::now());
                }
                Ok(Message::Binary(data)) => {
                    self.queued.extend(&data);
                    self.policy.on_data(Instant::now());
                }
                Ok(Message::Pong(_)) => self.policy.on_pong(),
                // tungstenite answers pings internally on the next write.
                Ok(Message::Ping(_)) | Ok(Message::Frame(_)) => {}
                Ok(Message::Close(_)) => {
                    tracing::info!(url = %self.url, "websocket closed by peer");
                    self.drop_socket();
                    return;
                }
                Err(tungstenite::Error::Io(e)) if e.kind() == std::io::ErrorKind::WouldBlock => {
                    return;
                }
                Err(e) => {
                    tracing::warn!(url = %self.url, "websocket read failed: {}", e);
                    self.drop_socket();
                    return;
                }
            }
        }
    }

    fn send_message(&mut self, message: Message) -> Result<()> {
        let socket = self
            .socket
            .as_mut()
            .ok_or(ConnectionError::NotConnected)?;

        socket.send(message).map_err(|e| {
            ConnectionError::WebSocketError {
                reason: e.to_string(),
            }
            .into()
        })
    }

    fn close_socket(&mut self) {
        if let Some(mut socket) = self.socket.take() {
            let _ = socket.close(None);
        }
        self.policy.on_closed(Instant::now());
    }

    fn drop_socket(&mut self) {
        self.socket = None;
        self.policy.on_closed(Instant::now());
    }
}

impl Transport for WebsocketTransport {
    fn available(&mut self) -> usize {
        self.queued.len()
    }

    fn read_byte(&mut self) -> Option<u8> {
        self.queued.pop_front()
    }

    fn write_byte(&mut self, byte: u8) -> Result<()> {
        self.send_message(Message::binary(vec![byte]))
    }

    fn write_all(&mut self, data: &[u8]) -> Result<()> {
        self.send_message(Message::text(String::from_utf8_lossy(data).into_owned()))
    }
}
