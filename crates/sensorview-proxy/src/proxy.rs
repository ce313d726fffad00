use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use bytes::BytesMut;
use sensorview_codec::{downscale, JpegCompressor, PixelFormat, Scaled};
use sensorview_queue::{Job, QueueStats, WorkQueue, WorkQueueConfig};
use sensorview_transport::{Transport, TransportEvents, WebSocketConfig, WebSocketTransport};
use sensorview_wire::{
    decode_binary, encode_image_header, encode_map, parse_control, scale_to_mm, ControlCommand,
    Envelope, ImageEncoding, ImageHeader, MsgKind, Tile, ViewerMessage, WireError,
    IMAGE_HEADER_SIZE, MAP_HEADER_SIZE, TILE_SIZE,
};
use serde_json::Value;
use tracing::{debug, error, info, trace, warn};

use crate::config::ProxyConfig;
use crate::control::ControlCallbacks;
use crate::error::{ProxyError, Result};
use crate::flow::FlowControl;
use crate::throttle::FrameThrottle;

const WORKER_THREAD_NAME: &str = "sensorview-frames";

struct ProxyShared {
    config: ProxyConfig,
    transport: Arc<dyn Transport>,
    flow: FlowControl,
    fisheye: FrameThrottle,
    jpeg: Mutex<JpegCompressor>,
    controls: Mutex<Option<Arc<ControlCallbacks>>>,
}

impl ProxyShared {
    fn controls(&self) -> Option<Arc<ControlCallbacks>> {
        lock(&self.controls).clone()
    }

    fn dispatch(&self, command: &ControlCommand) {
        let Some(controls) = self.controls() else {
            debug!(?command, "no control callbacks registered, command dropped");
            return;
        };
        if controls.dispatch(command) {
            debug!(?command, "control command dispatched");
        } else {
            debug!(?command, "no callback for control command");
        }
    }

    fn handle_binary(&self, data: &[u8]) {
        match decode_binary(data) {
            Ok(Envelope::Ack { kind }) => {
                if self.flow.on_ack(kind) {
                    trace!(kind, "ack");
                } else {
                    debug!(kind, "ack for unknown kind ignored");
                }
            }
            Ok(other) => warn!(kind = %other.kind(), len = data.len(), "unhandled binary message"),
            Err(err) => warn!(error = %err, len = data.len(), "malformed binary message"),
        }
    }

    fn handle_text(&self, text: &str) {
        match parse_control(text) {
            Ok(command) => self.dispatch(&command),
            Err(WireError::Unhandled { msg_type, command }) => {
                warn!(msg_type = %msg_type, ?command, "unhandled viewer message");
            }
            Err(err) => warn!(error = %err, "malformed viewer message"),
        }
    }

    fn handle_peer_lost(&self) {
        info!("viewer disconnected");
        // Acks for frames sent to the lost viewer will never arrive.
        self.flow.reset();
        self.fisheye.reset();
        self.dispatch(&ControlCommand::Stop);
    }

    /// Encode (optionally) and send one downscaled frame. Runs on a worker.
    fn send_frame(&self, kind: MsgKind, format: PixelFormat, timestamp: u64, frame: Scaled) {
        let (encoding, payload) = if self.config.use_jpeg {
            let encoded = lock(&self.jpeg).compress(&frame.pixels, format, frame.width, frame.height);
            match encoded {
                Ok(jpeg) => (ImageEncoding::Jpeg, jpeg),
                Err(err) => {
                    error!(%kind, error = %err, "frame encoding failed");
                    self.flow.on_ack(kind.as_u8());
                    return;
                }
            }
        } else {
            (ImageEncoding::Raw, frame.pixels)
        };

        let header = ImageHeader {
            kind,
            encoding,
            width: frame.width,
            height: frame.height,
            timestamp,
        };
        let mut head = BytesMut::with_capacity(IMAGE_HEADER_SIZE);
        encode_image_header(&header, &mut head);

        match self.transport.send_vectored(&[&head[..], &payload[..]]) {
            Ok(()) => trace!(
                %kind,
                width = frame.width,
                height = frame.height,
                size = payload.len(),
                "frame sent"
            ),
            Err(err) => {
                warn!(%kind, error = %err, "frame send failed");
                // No ack can arrive for a frame that never left.
                self.flow.on_ack(kind.as_u8());
            }
        }
    }
}

/// Receives transport events without keeping the proxy alive.
struct EventSink(Weak<ProxyShared>);

impl TransportEvents for EventSink {
    fn on_binary(&self, data: &[u8]) {
        if let Some(shared) = self.0.upgrade() {
            shared.handle_binary(data);
        }
    }

    fn on_text(&self, text: &str) {
        if let Some(shared) = self.0.upgrade() {
            shared.handle_text(text);
        }
    }

    fn on_disconnect(&self) {
        if let Some(shared) = self.0.upgrade() {
            shared.handle_peer_lost();
        }
    }
}

struct FrameJob {
    shared: Arc<ProxyShared>,
    kind: MsgKind,
    format: PixelFormat,
    timestamp: u64,
    frame: Scaled,
}

impl Job for FrameJob {
    fn run(self: Box<Self>) {
        let FrameJob {
            shared,
            kind,
            format,
            timestamp,
            frame,
        } = *self;
        shared.send_frame(kind, format, timestamp, frame);
    }

    /// Evicted or dropped at stop: give the admission back.
    fn discard(self: Box<Self>) {
        trace!(kind = %self.kind, timestamp = self.timestamp, "frame discarded");
        self.shared.flow.on_ack(self.kind.as_u8());
    }

    fn name(&self) -> &'static str {
        match self.kind {
            MsgKind::Rgb => "rgb-frame",
            _ => "fisheye-frame",
        }
    }
}

/// Streams sensor frames, maps and JSON results to a single viewer.
///
/// Producers share one proxy (usually as `Arc<StreamingProxy>`) and call it
/// from any thread. JSON and map updates are sent on the caller's thread;
/// image frames are downscaled on the caller's thread, then compressed and
/// sent by the worker pool so producers are never blocked on encoding.
///
/// Nothing is sent while no viewer is attached.
pub struct StreamingProxy {
    shared: Arc<ProxyShared>,
    queue: WorkQueue,
    stopped: AtomicBool,
}

impl StreamingProxy {
    /// Connect `transport` and start the compression workers.
    ///
    /// Blocks until the transport has a viewer (for the WebSocket transport,
    /// until a browser connects).
    pub fn start(config: ProxyConfig, transport: Arc<dyn Transport>) -> Result<Self> {
        config.validate()?;
        let jpeg = JpegCompressor::with_quality(config.jpeg_quality)?;
        let queue = WorkQueue::with_config(WorkQueueConfig {
            thread_name: WORKER_THREAD_NAME.to_string(),
            capacity: config.queue_capacity,
        });

        let shared = Arc::new(ProxyShared {
            flow: FlowControl::new(config.admission),
            fisheye: FrameThrottle::new(config.fisheye_min_interval_us()),
            jpeg: Mutex::new(jpeg),
            controls: Mutex::new(None),
            transport,
            config,
        });

        shared
            .transport
            .connect(Arc::new(EventSink(Arc::downgrade(&shared))))?;
        if let Err(err) = queue.start(shared.config.workers) {
            shared.transport.disconnect();
            return Err(err.into());
        }

        info!(
            workers = shared.config.workers,
            jpeg = shared.config.use_jpeg,
            quality = shared.config.jpeg_quality,
            admission = ?shared.config.admission,
            "streaming proxy started"
        );
        Ok(Self {
            shared,
            queue,
            stopped: AtomicBool::new(false),
        })
    }

    /// Start on a WebSocket transport built from `ws_config`.
    pub fn serve(config: ProxyConfig, ws_config: WebSocketConfig) -> Result<Self> {
        Self::start(config, Arc::new(WebSocketTransport::new(ws_config)))
    }

    pub fn config(&self) -> &ProxyConfig {
        &self.shared.config
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.shared.transport
    }

    pub fn is_connected(&self) -> bool {
        !self.is_stopped() && self.shared.transport.is_connected()
    }

    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    /// Send a JSON document as a text message.
    pub fn send_json(&self, value: &Value) -> Result<()> {
        self.send_text(&value.to_string())
    }

    /// Send a typed viewer message.
    pub fn send_message(&self, message: &ViewerMessage) -> Result<()> {
        let text = serde_json::to_string(message)?;
        self.send_text(&text)
    }

    fn send_text(&self, text: &str) -> Result<()> {
        if !self.is_connected() {
            trace!("no viewer, text message dropped");
            return Ok(());
        }
        self.shared.transport.send_text(text)?;
        Ok(())
    }

    /// Queue an RGB frame. Frames wider than the full-resolution limit are
    /// downscaled first.
    pub fn on_rgb_frame(&self, timestamp: u64, width: u16, height: u16, rgb: &[u8]) -> Result<()> {
        let factor = self.shared.config.rgb_factor(width);
        self.submit_frame(
            MsgKind::Rgb,
            PixelFormat::Rgb8,
            factor,
            timestamp,
            width,
            height,
            rgb,
        )
    }

    /// Queue a fisheye frame. Frames arriving faster than the configured
    /// rate are dropped.
    pub fn on_fisheye_frame(
        &self,
        timestamp: u64,
        width: u16,
        height: u16,
        gray: &[u8],
    ) -> Result<()> {
        if !self.is_connected() {
            return Ok(());
        }
        check_frame(PixelFormat::Raw8, gray, width, height)?;
        if !self.shared.fisheye.admit(timestamp) {
            debug!(timestamp, "fisheye frame rate too high, frame dropped");
            return Ok(());
        }
        self.submit_frame(
            MsgKind::FishEye,
            PixelFormat::Raw8,
            self.shared.config.downscale_factor,
            timestamp,
            width,
            height,
            gray,
        )
    }

    #[allow(clippy::too_many_arguments)]
    fn submit_frame(
        &self,
        kind: MsgKind,
        format: PixelFormat,
        factor: u16,
        timestamp: u64,
        width: u16,
        height: u16,
        pixels: &[u8],
    ) -> Result<()> {
        if !self.is_connected() {
            trace!(%kind, "no viewer, frame dropped");
            return Ok(());
        }
        check_frame(format, pixels, width, height)?;
        if !self.shared.flow.admit(kind) {
            return Ok(());
        }

        let frame = match downscale(factor, format, pixels, width, height) {
            Ok(frame) => frame,
            Err(err) => {
                error!(%kind, error = %err, "frame downscale failed");
                self.shared.flow.on_ack(kind.as_u8());
                return Err(err.into());
            }
        };
        trace!(%kind, timestamp, factor, "frame queued");
        self.queue.add(FrameJob {
            shared: Arc::clone(&self.shared),
            kind,
            format,
            timestamp,
            frame,
        });
        Ok(())
    }

    /// Send an occupancy map update. `scale_m` is the tile edge in metres.
    pub fn on_occupancy(&self, scale_m: f32, tiles: &[Tile]) -> Result<()> {
        if !self.is_connected() {
            return Ok(());
        }
        let (scale_mm, exact) = scale_to_mm(scale_m).inspect_err(|err| {
            error!(error = %err, "invalid map scale");
        })?;
        if !exact {
            warn!(scale_m, scale_mm, "map scale is not a whole number of millimetres");
        }
        if !self.shared.flow.admit(MsgKind::MapUpdate) {
            return Ok(());
        }

        let mut buf = BytesMut::with_capacity(MAP_HEADER_SIZE + tiles.len() * TILE_SIZE);
        encode_map(scale_mm, tiles, &mut buf);
        if let Err(err) = self.shared.transport.send_bytes(&buf) {
            self.shared.flow.on_ack(MsgKind::MapUpdate.as_u8());
            return Err(err.into());
        }
        trace!(scale_mm, tiles = tiles.len(), "map update sent");
        Ok(())
    }

    /// Install the viewer command handlers, replacing any previous set.
    pub fn set_control_callbacks(&self, callbacks: ControlCallbacks) {
        *lock(&self.shared.controls) = Some(Arc::new(callbacks));
    }

    /// Envelopes of `kind` sent but not yet acked.
    pub fn unacked(&self, kind: MsgKind) -> i32 {
        self.shared.flow.unacked(kind)
    }

    pub fn queue_stats(&self) -> QueueStats {
        self.queue.stats()
    }

    /// Stop the workers and disconnect. Pending frames are discarded.
    pub fn stop(&self) {
        if self.stopped.swap(true, Ordering::AcqRel) {
            return;
        }
        self.queue.stop();
        self.shared.transport.disconnect();
        let stats = self.queue.stats();
        info!(
            executed = stats.executed,
            discarded = stats.discarded,
            evicted = stats.evicted,
            "streaming proxy stopped"
        );
    }
}

impl Drop for StreamingProxy {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for StreamingProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingProxy")
            .field("config", &self.shared.config)
            .field("state", &self.shared.transport.state())
            .field("stopped", &self.is_stopped())
            .finish()
    }
}

fn check_frame(format: PixelFormat, pixels: &[u8], width: u16, height: u16) -> Result<()> {
    if width == 0 || height == 0 {
        error!(%format, width, height, "empty frame");
        return Err(ProxyError::EmptyFrame { width, height });
    }
    format.check_plane(pixels, width, height).map_err(|err| {
        error!(%format, error = %err, "frame buffer too small");
        ProxyError::from(err)
    })
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
