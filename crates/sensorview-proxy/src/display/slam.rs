use std::sync::Arc;

use sensorview_wire::{FpsReport, Tile, ViewerMessage};

use crate::control::ControlCallbacks;
use crate::error::Result;
use crate::proxy::StreamingProxy;

/// Event sent once the tracker has finished a viewer-requested reset.
pub const EVENT_RESET_COMPLETED: &str = "on_reset_completed";

/// Sends SLAM camera tracking, map and frame updates.
pub struct SlamDisplay {
    proxy: Arc<StreamingProxy>,
}

impl SlamDisplay {
    pub fn new(proxy: Arc<StreamingProxy>) -> Self {
        Self { proxy }
    }

    pub fn proxy(&self) -> &Arc<StreamingProxy> {
        &self.proxy
    }

    /// Camera pose as a row-major 3x4 matrix with the tracking accuracy.
    pub fn on_pose(&self, tracking: i32, pose: &[f32; 12]) -> Result<()> {
        self.proxy.send_message(&ViewerMessage::Tracking {
            tracking,
            pose: *pose,
        })
    }

    pub fn on_fps(&self, fps: FpsReport) -> Result<()> {
        self.proxy.send_message(&ViewerMessage::Fps { fps })
    }

    pub fn on_reset_completed(&self) -> Result<()> {
        self.proxy.send_message(&ViewerMessage::Event {
            event: EVENT_RESET_COMPLETED.to_string(),
        })
    }

    pub fn on_occupancy(&self, scale_m: f32, tiles: &[Tile]) -> Result<()> {
        self.proxy.on_occupancy(scale_m, tiles)
    }

    pub fn on_fisheye_frame(&self, timestamp: u64, width: u16, height: u16, gray: &[u8]) -> Result<()> {
        self.proxy.on_fisheye_frame(timestamp, width, height, gray)
    }

    pub fn on_rgb_frame(&self, timestamp: u64, width: u16, height: u16, rgb: &[u8]) -> Result<()> {
        self.proxy.on_rgb_frame(timestamp, width, height, rgb)
    }

    pub fn set_control_callbacks(&self, callbacks: ControlCallbacks) {
        self.proxy.set_control_callbacks(callbacks);
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::display::test_support::{proxy, texts};

    #[test]
    fn pose_fps_and_event() {
        let (proxy, transport) = proxy();
        let display = SlamDisplay::new(proxy);
        let pose = [1.0, 0.0, 0.0, 0.5, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, -2.0];
        display.on_pose(2, &pose).unwrap();
        display
            .on_fps(FpsReport {
                source: "input".into(),
                fisheye: 30.0,
                depth: 30.0,
                accelerometer: 250.0,
                gyroscope: 200.0,
            })
            .unwrap();
        display.on_reset_completed().unwrap();

        let sent = texts(&transport);
        assert_eq!(
            sent[0],
            json!({"type": "tracking", "tracking": 2, "pose": pose})
        );
        assert_eq!(
            sent[1],
            json!({
                "type": "fps",
                "fps": {"type": "input", "fisheye": 30.0, "depth": 30.0, "accelerometer": 250.0, "gyroscope": 200.0},
            })
        );
        assert_eq!(sent[2], json!({"type": "event", "event": "on_reset_completed"}));
    }

    #[test]
    fn occupancy_passes_through() {
        let (proxy, transport) = proxy();
        let display = SlamDisplay::new(proxy);
        display
            .on_occupancy(
                0.05,
                &[Tile {
                    x: 0,
                    z: 0,
                    occupancy: 50,
                }],
            )
            .unwrap();
        assert_eq!(transport.sent_len(), 1);
        assert_eq!(display.proxy().unacked(sensorview_wire::MsgKind::MapUpdate), 1);
    }
}
