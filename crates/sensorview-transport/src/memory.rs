use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use bytes::Bytes;
use tracing::debug;

use crate::error::{Result, TransportError};
use crate::traits::{concat, ConnectionState, Transport, TransportEvents};

/// A message recorded by [`MemoryTransport`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outbound {
    Binary(Bytes),
    Text(String),
}

impl Outbound {
    pub fn as_binary(&self) -> Option<&[u8]> {
        match self {
            Self::Binary(b) => Some(b.as_ref()),
            Self::Text(_) => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Self::Text(t) => Some(t.as_str()),
            Self::Binary(_) => None,
        }
    }
}

struct Inner {
    state: ConnectionState,
    events: Option<Arc<dyn TransportEvents>>,
    sent: Vec<Outbound>,
}

/// In-process transport with a simulated viewer.
///
/// `connect` attaches the simulated peer immediately. Outbound messages are
/// recorded while the peer is attached and dropped otherwise, exactly like a
/// real transport with no viewer.
pub struct MemoryTransport {
    inner: Mutex<Inner>,
    sent_cv: Condvar,
}

impl Default for MemoryTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryTransport {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                state: ConnectionState::Disconnected,
                events: None,
                sent: Vec::new(),
            }),
            sent_cv: Condvar::new(),
        }
    }

    /// Deliver a binary message as if the viewer had sent it.
    pub fn inject_binary(&self, data: &[u8]) {
        if let Some(events) = self.live_events() {
            events.on_binary(data);
        }
    }

    /// Deliver a text message as if the viewer had sent it.
    pub fn inject_text(&self, text: &str) {
        if let Some(events) = self.live_events() {
            events.on_text(text);
        }
    }

    /// Simulate the viewer going away. Fires `on_disconnect`.
    pub fn drop_peer(&self) {
        let events = {
            let mut inner = self.lock();
            if inner.state != ConnectionState::Connected {
                return;
            }
            inner.state = ConnectionState::Connecting;
            inner.events.clone()
        };
        debug!("memory peer dropped");
        if let Some(events) = events {
            events.on_disconnect();
        }
    }

    /// Simulate a new viewer attaching after [`drop_peer`](Self::drop_peer).
    pub fn attach_peer(&self) {
        let mut inner = self.lock();
        if inner.state == ConnectionState::Connecting {
            inner.state = ConnectionState::Connected;
        }
    }

    /// Remove and return everything sent so far.
    pub fn take_sent(&self) -> Vec<Outbound> {
        std::mem::take(&mut self.lock().sent)
    }

    /// Number of recorded messages not yet taken.
    pub fn sent_len(&self) -> usize {
        self.lock().sent.len()
    }

    /// Block until at least `count` messages are recorded or `timeout` passes.
    pub fn wait_for_sent(&self, count: usize, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut inner = self.lock();
        while inner.sent.len() < count {
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            inner = self
                .sent_cv
                .wait_timeout(inner, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
        true
    }

    fn record(&self, msg: Outbound) {
        let mut inner = self.lock();
        if inner.state != ConnectionState::Connected {
            return;
        }
        inner.sent.push(msg);
        self.sent_cv.notify_all();
    }

    fn live_events(&self) -> Option<Arc<dyn TransportEvents>> {
        let inner = self.lock();
        if inner.state == ConnectionState::Connected {
            inner.events.clone()
        } else {
            None
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Transport for MemoryTransport {
    fn connect(&self, events: Arc<dyn TransportEvents>) -> Result<()> {
        let mut inner = self.lock();
        if inner.state != ConnectionState::Disconnected {
            return Err(TransportError::AlreadyStarted);
        }
        inner.state = ConnectionState::Connected;
        inner.events = Some(events);
        Ok(())
    }

    fn disconnect(&self) {
        let mut inner = self.lock();
        inner.state = ConnectionState::Disconnected;
        inner.events = None;
    }

    fn send_vectored(&self, parts: &[&[u8]]) -> Result<()> {
        self.record(Outbound::Binary(Bytes::from(concat(parts))));
        Ok(())
    }

    fn send_text(&self, text: &str) -> Result<()> {
        self.record(Outbound::Text(text.to_string()));
        Ok(())
    }

    fn state(&self) -> ConnectionState {
        self.lock().state
    }
}

impl std::fmt::Debug for MemoryTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("MemoryTransport")
            .field("state", &inner.state)
            .field("sent", &inner.sent.len())
            .finish()
    }
}
