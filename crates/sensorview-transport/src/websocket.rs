use std::io::{self, ErrorKind};
use std::net::{SocketAddr, TcpListener, TcpStream, ToSocketAddrs};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, unbounded, Receiver, Sender};
use tracing::{debug, info, trace, warn};
use tungstenite::{Message, WebSocket};

use crate::error::{Result, TransportError};
use crate::http::{is_upgrade_request, StaticFiles};
use crate::netif::{preferred_ipv4, viewer_url};
use crate::traits::{concat, ConnectionState, Transport, TransportEvents};

/// Default port for the viewer page and socket.
pub const DEFAULT_PORT: u16 = 8000;

/// Default viewer page name.
pub const DEFAULT_INDEX_PAGE: &str = "view.html";

const HEAD_PEEK_LIMIT: usize = 4096;
const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(2);
const WRITE_TIMEOUT: Duration = Duration::from_secs(5);
/// Retry interval while the socket refuses buffered outbound bytes.
const FLUSH_RETRY: Duration = Duration::from_millis(2);

/// Configuration for [`WebSocketTransport`].
#[derive(Debug, Clone)]
pub struct WebSocketConfig {
    /// Interface to bind. Default: all interfaces.
    pub host: String,
    /// TCP port. `0` picks a free port (see [`WebSocketTransport::local_addr`]).
    pub port: u16,
    /// Directory with viewer assets. Default: serve the built-in page.
    pub web_root: Option<PathBuf>,
    /// Page advertised to the user and served for `/`.
    pub index_page: String,
    /// How often idle I/O threads check for shutdown and inbound traffic.
    /// Outbound messages wake the peer thread immediately.
    pub poll_interval: Duration,
    /// Upper bound on the wait in [`Transport::connect`]. Default: forever.
    pub connect_timeout: Option<Duration>,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: DEFAULT_PORT,
            web_root: None,
            index_page: DEFAULT_INDEX_PAGE.to_string(),
            poll_interval: Duration::from_millis(20),
            connect_timeout: None,
        }
    }
}

enum Command {
    Send(Message),
    Close,
}

struct PeerHandle {
    id: u64,
    addr: SocketAddr,
    tx: Sender<Command>,
    closing: Arc<AtomicBool>,
    thread: Option<JoinHandle<()>>,
}

impl PeerHandle {
    fn close(mut self) {
        self.closing.store(true, Ordering::Release);
        let _ = self.tx.send(Command::Close);
        if let Some(thread) = self.thread.take() {
            if thread.thread().id() != thread::current().id() && thread.join().is_err() {
                warn!(peer = %self.addr, "peer thread terminated abnormally");
            }
        }
    }
}

struct Shared {
    config: WebSocketConfig,
    files: StaticFiles,
    state: Mutex<ConnectionState>,
    // Doorbell rung on every state change; waiters re-check at least once
    // per poll interval, so one token is enough.
    state_tx: Sender<()>,
    state_rx: Receiver<()>,
    shutdown: AtomicBool,
    next_peer: AtomicU64,
    peer: Mutex<Option<PeerHandle>>,
    events: Mutex<Option<Arc<dyn TransportEvents>>>,
    local_addr: Mutex<Option<SocketAddr>>,
}

impl Shared {
    fn set_state(&self, state: ConnectionState) {
        *lock(&self.state) = state;
        self.ring_state();
    }

    fn ring_state(&self) {
        let _ = self.state_tx.try_send(());
    }

    fn events(&self) -> Option<Arc<dyn TransportEvents>> {
        lock(&self.events).clone()
    }
}

/// WebSocket server that talks to a single browser viewer.
///
/// One port serves both the viewer's static assets (plain HTTP `GET`) and the
/// WebSocket. The most recent WebSocket client is the peer; an older one is
/// closed when a newer one arrives. Blocking I/O throughout: an accept thread
/// polls the listener, and each peer gets its own I/O thread that owns the
/// socket. Sends from any thread are handed to that thread over a channel.
pub struct WebSocketTransport {
    shared: Arc<Shared>,
    server: Mutex<Option<JoinHandle<()>>>,
}

impl WebSocketTransport {
    pub fn new(config: WebSocketConfig) -> Self {
        let files = StaticFiles::new(config.web_root.clone(), config.index_page.clone());
        let (state_tx, state_rx) = bounded(1);
        Self {
            shared: Arc::new(Shared {
                config,
                files,
                state: Mutex::new(ConnectionState::Disconnected),
                state_tx,
                state_rx,
                shutdown: AtomicBool::new(false),
                next_peer: AtomicU64::new(1),
                peer: Mutex::new(None),
                events: Mutex::new(None),
                local_addr: Mutex::new(None),
            }),
            server: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &WebSocketConfig {
        &self.shared.config
    }

    /// Bind the listener and start accepting, without waiting for a viewer.
    ///
    /// Inbound messages are dropped until [`Transport::connect`] installs an
    /// event sink. Calling `bind` on a running transport returns the bound
    /// address.
    pub fn bind(&self) -> Result<SocketAddr> {
        let mut server = lock(&self.server);
        if server.is_some() {
            if let Some(addr) = self.local_addr() {
                return Ok(addr);
            }
        }

        let config = &self.shared.config;
        let display = format!("{}:{}", config.host, config.port);
        let listener = (config.host.as_str(), config.port)
            .to_socket_addrs()
            .and_then(|mut addrs| {
                addrs.next().ok_or_else(|| {
                    io::Error::new(ErrorKind::AddrNotAvailable, "host resolved to no address")
                })
            })
            .and_then(TcpListener::bind)
            .map_err(|source| TransportError::Bind {
                addr: display.clone(),
                source,
            })?;
        listener
            .set_nonblocking(true)
            .map_err(|source| TransportError::Bind {
                addr: display,
                source,
            })?;
        let addr = listener.local_addr()?;

        self.shared.shutdown.store(false, Ordering::Release);
        *lock(&self.shared.local_addr) = Some(addr);
        self.shared.set_state(ConnectionState::Connecting);

        let shared = Arc::clone(&self.shared);
        let handle = thread::Builder::new()
            .name("sensorview-ws-accept".to_string())
            .spawn(move || accept_loop(&shared, listener))?;
        *server = Some(handle);

        info!(
            %addr,
            url = %viewer_url(preferred_ipv4(), addr.port(), &config.index_page),
            "waiting for viewer"
        );
        Ok(addr)
    }

    /// Address the listener is bound to, while serving.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        *lock(&self.shared.local_addr)
    }

    /// Address of the attached viewer.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        lock(&self.shared.peer).as_ref().map(|p| p.addr)
    }

    /// Block until a viewer is attached, the transport shuts down, or
    /// `timeout` elapses. Returns whether a viewer is attached.
    pub fn wait_for_peer(&self, timeout: Option<Duration>) -> bool {
        let deadline = timeout.map(|t| Instant::now() + t);
        let poll = self.shared.config.poll_interval.max(Duration::from_millis(1));
        loop {
            match *lock(&self.shared.state) {
                ConnectionState::Connected => return true,
                ConnectionState::Disconnected => return false,
                ConnectionState::Connecting => {}
            }
            let wait = match deadline {
                Some(deadline) => {
                    let now = Instant::now();
                    if now >= deadline {
                        return false;
                    }
                    (deadline - now).min(poll)
                }
                None => poll,
            };
            let _ = self.shared.state_rx.recv_timeout(wait);
        }
    }

    fn send_message(&self, msg: Message) -> Result<()> {
        let peer = lock(&self.shared.peer);
        match peer.as_ref() {
            Some(peer) => {
                if peer.tx.send(Command::Send(msg)).is_err() {
                    debug!(peer = %peer.addr, "peer closing, message dropped");
                }
            }
            None => trace!("no peer, message dropped"),
        }
        Ok(())
    }
}

impl Transport for WebSocketTransport {
    fn connect(&self, events: Arc<dyn TransportEvents>) -> Result<()> {
        *lock(&self.shared.events) = Some(events);
        self.bind()?;

        let timeout = self.shared.config.connect_timeout;
        if self.wait_for_peer(timeout) {
            return Ok(());
        }
        if self.shared.shutdown.load(Ordering::Acquire) {
            return Err(TransportError::Shutdown);
        }
        self.disconnect();
        Err(TransportError::ConnectTimeout(timeout.unwrap_or_default()))
    }

    fn disconnect(&self) {
        let server = {
            let mut server = lock(&self.server);
            self.shared.shutdown.store(true, Ordering::Release);
            server.take()
        };
        self.shared.ring_state();

        let was_running = server.is_some();
        if let Some(server) = server {
            if server.join().is_err() {
                warn!("accept thread terminated abnormally");
            }
        }

        let peer = lock(&self.shared.peer).take();
        if let Some(peer) = peer {
            peer.close();
        }

        *lock(&self.shared.events) = None;
        *lock(&self.shared.local_addr) = None;
        self.shared.set_state(ConnectionState::Disconnected);
        if was_running {
            info!("websocket transport stopped");
        }
    }

    fn send_vectored(&self, parts: &[&[u8]]) -> Result<()> {
        if lock(&self.shared.peer).is_none() {
            trace!("no peer, binary dropped");
            return Ok(());
        }
        self.send_message(Message::Binary(concat(parts)))
    }

    fn send_text(&self, text: &str) -> Result<()> {
        self.send_message(Message::Text(text.to_string()))
    }

    fn state(&self) -> ConnectionState {
        *lock(&self.shared.state)
    }
}

impl Drop for WebSocketTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}

impl std::fmt::Debug for WebSocketTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebSocketTransport")
            .field("state", &self.state())
            .field("local_addr", &self.local_addr())
            .field("peer", &self.peer_addr())
            .finish()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

fn accept_loop(shared: &Arc<Shared>, listener: TcpListener) {
    debug!("accept loop started");
    while !shared.shutdown.load(Ordering::Acquire) {
        match listener.accept() {
            Ok((stream, addr)) => {
                // Request heads and handshakes can stall for up to
                // HANDSHAKE_TIMEOUT, so each connection gets its own thread.
                let conn = Arc::clone(shared);
                let spawned = thread::Builder::new()
                    .name("sensorview-ws-conn".to_string())
                    .spawn(move || {
                        if let Err(err) = handle_incoming(&conn, stream, addr) {
                            debug!(%addr, error = %err, "incoming connection failed");
                        }
                    });
                if let Err(err) = spawned {
                    warn!(%addr, error = %err, "connection thread spawn failed");
                }
            }
            Err(err) if err.kind() == ErrorKind::WouldBlock => {
                thread::sleep(shared.config.poll_interval);
            }
            Err(err) => {
                warn!(error = %err, "accept failed");
                thread::sleep(shared.config.poll_interval);
            }
        }
    }
    debug!("accept loop exiting");
}

fn handle_incoming(shared: &Arc<Shared>, stream: TcpStream, addr: SocketAddr) -> Result<()> {
    stream.set_nonblocking(false)?;
    stream.set_read_timeout(Some(HANDSHAKE_TIMEOUT))?;
    stream.set_write_timeout(Some(WRITE_TIMEOUT))?;
    stream.set_nodelay(true)?;

    if !is_upgrade_request(&peek_head(&stream)?) {
        shared.files.handle(&stream)?;
        return Ok(());
    }

    let ws = tungstenite::accept(stream).map_err(|err| {
        TransportError::Io(io::Error::new(
            ErrorKind::InvalidData,
            format!("websocket handshake failed: {err}"),
        ))
    })?;
    // The peer thread multiplexes reads with its command channel.
    ws.get_ref().set_nonblocking(true)?;
    attach_peer(shared, ws, addr)
}

/// Peek until the request head is complete, without consuming it.
fn peek_head(stream: &TcpStream) -> io::Result<Vec<u8>> {
    let mut buf = vec![0u8; HEAD_PEEK_LIMIT];
    let deadline = Instant::now() + HANDSHAKE_TIMEOUT;
    loop {
        let n = stream.peek(&mut buf)?;
        let head = &buf[..n];
        if n == 0 || n == buf.len() || head.windows(4).any(|w| w == b"\r\n\r\n") {
            buf.truncate(n);
            return Ok(buf);
        }
        if Instant::now() >= deadline {
            return Err(io::Error::new(ErrorKind::TimedOut, "incomplete request head"));
        }
        thread::sleep(Duration::from_millis(2));
    }
}

fn attach_peer(shared: &Arc<Shared>, ws: WebSocket<TcpStream>, addr: SocketAddr) -> Result<()> {
    let id = shared.next_peer.fetch_add(1, Ordering::Relaxed);
    let (tx, rx) = unbounded();
    let closing = Arc::new(AtomicBool::new(false));

    // Hold the slot while spawning so the new thread cannot observe itself
    // as stale before it is installed.
    let previous = {
        let mut slot = lock(&shared.peer);
        // Checked under the slot lock: `disconnect` raises the flag before
        // it empties the slot.
        if shared.shutdown.load(Ordering::Acquire) {
            debug!(peer = %addr, "transport stopped, handshake discarded");
            return Ok(());
        }
        let thread = {
            let shared = Arc::clone(shared);
            let closing = Arc::clone(&closing);
            thread::Builder::new()
                .name(format!("sensorview-ws-peer-{id}"))
                .spawn(move || peer_loop(&shared, id, addr, ws, &rx, &closing))?
        };
        let previous = slot.replace(PeerHandle {
            id,
            addr,
            tx,
            closing,
            thread: Some(thread),
        });
        shared.set_state(ConnectionState::Connected);
        previous
    };

    if let Some(previous) = previous {
        info!(old = %previous.addr, new = %addr, "viewer replaced");
        previous.close();
    } else {
        info!(peer = %addr, "viewer connected");
    }
    Ok(())
}

#[derive(Debug, PartialEq, Eq)]
enum PeerExit {
    /// Closed by this side (shutdown or replacement).
    Local,
    /// The viewer went away or the socket failed.
    Remote,
}

fn peer_loop(
    shared: &Shared,
    id: u64,
    addr: SocketAddr,
    mut ws: WebSocket<TcpStream>,
    rx: &Receiver<Command>,
    closing: &AtomicBool,
) {
    debug!(peer = %addr, id, "peer thread started");
    let idle = shared.config.poll_interval.max(Duration::from_millis(1));
    let mut flushing = false;
    let exit = loop {
        if closing.load(Ordering::Acquire) {
            break PeerExit::Local;
        }
        if let Some(exit) = read_inbound(shared, &mut ws, addr) {
            break exit;
        }

        let wait = if flushing { FLUSH_RETRY.min(idle) } else { idle };
        let first = select! {
            recv(rx) -> command => Some(command.unwrap_or(Command::Close)),
            default(wait) => None,
        };
        match write_outbound(&mut ws, first, rx, addr) {
            Ok(pending) => flushing = pending,
            Err(exit) => break exit,
        }
    };

    if exit == PeerExit::Local {
        let _ = ws.get_ref().set_nonblocking(false);
        let _ = ws.close(None);
        let _ = ws.flush();
    }

    let still_current = {
        let mut slot = lock(&shared.peer);
        if slot.as_ref().is_some_and(|p| p.id == id) {
            // Dropping our own handle only detaches this thread.
            slot.take();
            true
        } else {
            false
        }
    };

    if still_current && !shared.shutdown.load(Ordering::Acquire) {
        shared.set_state(ConnectionState::Connecting);
        info!(peer = %addr, "viewer disconnected");
        if let Some(events) = shared.events() {
            events.on_disconnect();
        }
    }
    debug!(peer = %addr, id, ?exit, "peer thread exiting");
}

/// Queue `first` and every other waiting command, then flush.
///
/// Returns whether bytes are still buffered because the socket would block.
fn write_outbound(
    ws: &mut WebSocket<TcpStream>,
    first: Option<Command>,
    rx: &Receiver<Command>,
    addr: SocketAddr,
) -> std::result::Result<bool, PeerExit> {
    for command in first.into_iter().chain(rx.try_iter()) {
        let msg = match command {
            Command::Send(msg) => msg,
            Command::Close => return Err(PeerExit::Local),
        };
        match ws.write(msg) {
            Ok(()) => {}
            // The frame stays buffered and goes out with a later flush.
            Err(tungstenite::Error::Io(err)) if err.kind() == ErrorKind::WouldBlock => {}
            Err(tungstenite::Error::WriteBufferFull(_)) => {
                debug!(peer = %addr, "write buffer full, message dropped");
            }
            Err(err) => {
                debug!(peer = %addr, error = %err, "send failed");
                return Err(PeerExit::Remote);
            }
        }
    }

    match ws.flush() {
        Ok(()) => Ok(false),
        Err(tungstenite::Error::Io(err)) if err.kind() == ErrorKind::WouldBlock => Ok(true),
        Err(err) => {
            debug!(peer = %addr, error = %err, "flush failed");
            Err(PeerExit::Remote)
        }
    }
}

/// Dispatch every message the socket has ready.
fn read_inbound(
    shared: &Shared,
    ws: &mut WebSocket<TcpStream>,
    addr: SocketAddr,
) -> Option<PeerExit> {
    loop {
        match ws.read() {
            Ok(Message::Binary(data)) => {
                trace!(peer = %addr, len = data.len(), "binary received");
                if let Some(events) = shared.events() {
                    events.on_binary(&data);
                }
            }
            Ok(Message::Text(text)) => {
                trace!(peer = %addr, len = text.len(), "text received");
                if let Some(events) = shared.events() {
                    events.on_text(&text);
                }
            }
            Ok(Message::Close(_)) => {
                let _ = ws.flush();
                return Some(PeerExit::Remote);
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(err))
                if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
            {
                return None;
            }
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                return Some(PeerExit::Remote);
            }
            Err(err) => {
                debug!(peer = %addr, error = %err, "read failed");
                return Some(PeerExit::Remote);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{Read, Write};
    use std::sync::atomic::AtomicUsize;

    use tungstenite::client::client;

    use super::*;

    #[derive(Default)]
    struct Recorder {
        binary: Mutex<Vec<Vec<u8>>>,
        text: Mutex<Vec<String>>,
        gone: AtomicUsize,
    }

    impl TransportEvents for Recorder {
        fn on_binary(&self, data: &[u8]) {
            self.binary.lock().unwrap().push(data.to_vec());
        }
        fn on_text(&self, text: &str) {
            self.text.lock().unwrap().push(text.to_string());
        }
        fn on_disconnect(&self) {
            self.gone.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn loopback() -> WebSocketConfig {
        WebSocketConfig {
            host: "127.0.0.1".to_string(),
            port: 0,
            connect_timeout: Some(Duration::from_secs(5)),
            ..WebSocketConfig::default()
        }
    }

    fn dial(addr: SocketAddr) -> WebSocket<TcpStream> {
        let stream = TcpStream::connect(addr).unwrap();
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .unwrap();
        let (ws, _) = client(format!("ws://{addr}/"), stream).unwrap();
        ws
    }

    fn wait_until(mut cond: impl FnMut() -> bool) -> bool {
        let end = Instant::now() + Duration::from_secs(5);
        while Instant::now() < end {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(5));
        }
        false
    }

    type Session = (Arc<WebSocketTransport>, Arc<Recorder>, WebSocket<TcpStream>);

    fn connected(config: WebSocketConfig) -> Session {
        let transport = Arc::new(WebSocketTransport::new(config));
        let addr = transport.bind().unwrap();
        let events = Arc::new(Recorder::default());

        let connector = {
            let transport = Arc::clone(&transport);
            let events: Arc<dyn TransportEvents> = events.clone();
            thread::spawn(move || transport.connect(events))
        };
        let client = dial(addr);
        connector.join().unwrap().unwrap();
        (transport, events, client)
    }

    #[test]
    fn send_before_connect_is_noop() {
        let transport = WebSocketTransport::new(loopback());
        transport.send_bytes(b"dropped").unwrap();
        transport.send_text("dropped").unwrap();
        assert_eq!(transport.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn connect_times_out_without_viewer() {
        let transport = WebSocketTransport::new(WebSocketConfig {
            connect_timeout: Some(Duration::from_millis(50)),
            ..loopback()
        });
        let err = transport
            .connect(Arc::new(Recorder::default()))
            .unwrap_err();
        assert!(matches!(err, TransportError::ConnectTimeout(_)));
        assert_eq!(transport.state(), ConnectionState::Disconnected);
    }

    #[test]
    fn duplex_binary_and_text() {
        let (transport, events, mut client) = connected(loopback());
        assert!(transport.is_connected());

        transport.send_vectored(&[&[3, 0][..], &[9, 9, 9][..]]).unwrap();
        transport.send_text(r#"{"type":"fps"}"#).unwrap();

        assert_eq!(client.read().unwrap(), Message::Binary(vec![3, 0, 9, 9, 9]));
        assert_eq!(
            client.read().unwrap(),
            Message::Text(r#"{"type":"fps"}"#.to_string())
        );

        client.send(Message::Binary(vec![0xFF, 2])).unwrap();
        client
            .send(Message::Text(r#"{"type":"control","command":"reset"}"#.into()))
            .unwrap();
        assert!(wait_until(|| events.text.lock().unwrap().len() == 1));
        assert_eq!(events.binary.lock().unwrap()[0], vec![0xFF, 2]);

        transport.disconnect();
        assert_eq!(events.gone.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn viewer_close_fires_disconnect() {
        let (transport, events, mut client) = connected(loopback());
        client.close(None).unwrap();
        let _ = client.flush();

        assert!(wait_until(|| events.gone.load(Ordering::SeqCst) == 1));
        assert_eq!(transport.state(), ConnectionState::Connecting);
        transport.send_text("nobody listening").unwrap();
    }

    #[test]
    fn newer_viewer_replaces_older() {
        let (transport, events, mut first) = connected(loopback());
        let addr = transport.local_addr().unwrap();

        let mut second = dial(addr);
        let second_addr = second.get_ref().local_addr().ok();
        assert!(wait_until(|| transport.peer_addr() == second_addr));

        transport.send_text("hello").unwrap();
        assert_eq!(second.read().unwrap(), Message::Text("hello".into()));

        // The first viewer is closed by the server.
        let closed = loop {
            match first.read() {
                Ok(Message::Close(_)) => continue,
                Ok(_) => continue,
                Err(_) => break true,
            }
        };
        assert!(closed);
        assert_eq!(events.gone.load(Ordering::SeqCst), 0);
        assert!(transport.is_connected());
    }

    #[test]
    fn serves_builtin_page_on_same_port() {
        let transport = WebSocketTransport::new(loopback());
        let addr = transport.bind().unwrap();

        let mut stream = TcpStream::connect(addr).unwrap();
        stream
            .write_all(b"GET /view.html HTTP/1.1\r\nHost: localhost\r\n\r\n")
            .unwrap();
        let mut response = String::new();
        stream.read_to_string(&mut response).unwrap();
        assert!(response.starts_with("HTTP/1.1 200 OK"));
        assert!(response.contains("WebSocket"));

        assert_eq!(transport.state(), ConnectionState::Connecting);
        transport.disconnect();
    }

    #[test]
    fn stalled_client_does_not_hold_up_viewer() {
        let transport = Arc::new(WebSocketTransport::new(loopback()));
        let addr = transport.bind().unwrap();

        // Half a request head, then silence.
        let mut stalled = TcpStream::connect(addr).unwrap();
        stalled.write_all(b"GET / HTTP/1.1\r\n").unwrap();
        thread::sleep(Duration::from_millis(50));

        let started = Instant::now();
        let mut viewer = dial(addr);
        assert!(wait_until(|| transport.is_connected()));
        assert!(
            started.elapsed() < HANDSHAKE_TIMEOUT / 2,
            "viewer waited {:?} behind a stalled client",
            started.elapsed()
        );

        transport.send_text("through").unwrap();
        assert_eq!(viewer.read().unwrap(), Message::Text("through".into()));
        drop(stalled);
        transport.disconnect();
    }

    #[test]
    fn outbound_wakes_idle_peer_thread() {
        let (transport, _events, mut client) = connected(WebSocketConfig {
            poll_interval: Duration::from_millis(500),
            ..loopback()
        });
        // Let the peer thread settle into its idle wait.
        thread::sleep(Duration::from_millis(50));

        let started = Instant::now();
        transport.send_text("now").unwrap();
        assert_eq!(client.read().unwrap(), Message::Text("now".into()));
        assert!(
            started.elapsed() < Duration::from_millis(250),
            "delivery took {:?}",
            started.elapsed()
        );
        transport.disconnect();
    }

    #[test]
    fn disconnect_is_idempotent() {
        let (transport, _events, _client) = connected(loopback());
        transport.disconnect();
        transport.disconnect();
        assert_eq!(transport.state(), ConnectionState::Disconnected);
        assert!(transport.local_addr().is_none());
    }

    #[test]
    fn disconnect_unblocks_connect() {
        let transport = Arc::new(WebSocketTransport::new(WebSocketConfig {
            connect_timeout: None,
            ..loopback()
        }));
        let waiter = {
            let transport = Arc::clone(&transport);
            thread::spawn(move || transport.connect(Arc::new(Recorder::default())))
        };
        assert!(wait_until(|| transport.local_addr().is_some()));
        transport.disconnect();
        assert!(matches!(
            waiter.join().unwrap(),
            Err(TransportError::Shutdown)
        ));
    }
}
