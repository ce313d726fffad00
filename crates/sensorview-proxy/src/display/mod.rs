//! Typed front ends that turn vision results into viewer messages.
//!
//! Each display wraps a shared [`StreamingProxy`](crate::StreamingProxy) and
//! knows the JSON shapes its viewer page expects.

mod object;
mod person;
mod slam;

pub use object::{Localization, ObjectDisplay, Recognition, MIN_CONFIDENCE};
pub use person::{PersonDisplay, PersonObservation};
pub use slam::{SlamDisplay, EVENT_RESET_COMPLETED};

use sensorview_wire::Point3;

/// Camera pose as a row-major 4x4 matrix, translation in metres.
pub type Pose = [f32; 16];

/// Positions closer than this on every axis count as the same object.
pub const DEDUPE_RADIUS_M: f32 = 0.5;

/// Transform a camera-space point in millimetres to world metres.
pub fn camera_to_world(pose: &Pose, camera_mm: Point3) -> Point3 {
    let v = [
        camera_mm.x / 1000.0,
        camera_mm.y / 1000.0,
        camera_mm.z / 1000.0,
        1.0,
    ];
    let row = |r: usize| -> f32 { (0..4).map(|c| pose[r * 4 + c] * v[c]).sum() };
    Point3::new(row(0), row(1), row(2))
}

/// World positions that have already been reported.
#[derive(Debug, Default)]
struct SeenPositions {
    positions: Vec<Point3>,
}

impl SeenPositions {
    /// Record `position` unless it is near a known one. Returns `true` if new.
    fn first_sighting(&mut self, position: Point3) -> bool {
        if self
            .positions
            .iter()
            .any(|seen| position.near(seen, DEDUPE_RADIUS_M))
        {
            return false;
        }
        self.positions.push(position);
        true
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Arc;

    use sensorview_transport::{MemoryTransport, Outbound};
    use serde_json::Value;

    use crate::{ProxyConfig, StreamingProxy};

    pub fn proxy() -> (Arc<StreamingProxy>, Arc<MemoryTransport>) {
        let transport = Arc::new(MemoryTransport::new());
        let config = ProxyConfig {
            use_jpeg: false,
            ..Default::default()
        };
        let proxy = StreamingProxy::start(config, transport.clone()).unwrap();
        (Arc::new(proxy), transport)
    }

    pub fn texts(transport: &MemoryTransport) -> Vec<Value> {
        transport
            .take_sent()
            .iter()
            .filter_map(Outbound::as_text)
            .map(|t| serde_json::from_str(t).unwrap())
            .collect()
    }

    pub const IDENTITY: super::Pose = [
        1.0, 0.0, 0.0, 0.0, //
        0.0, 1.0, 0.0, 0.0, //
        0.0, 0.0, 1.0, 0.0, //
        0.0, 0.0, 0.0, 1.0,
    ];
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_converts_millimetres() {
        let p = camera_to_world(&test_support::IDENTITY, Point3::new(1000.0, -500.0, 2000.0));
        assert_eq!(p, Point3::new(1.0, -0.5, 2.0));
    }

    #[test]
    fn pose_translation_and_rotation() {
        // 90 degrees about y, then shifted 1 m along x.
        let pose: Pose = [
            0.0, 0.0, 1.0, 1.0, //
            0.0, 1.0, 0.0, 0.0, //
            -1.0, 0.0, 0.0, 0.0, //
            0.0, 0.0, 0.0, 1.0,
        ];
        let p = camera_to_world(&pose, Point3::new(0.0, 0.0, 2000.0));
        assert_eq!(p, Point3::new(3.0, 0.0, 0.0));
    }

    #[test]
    fn dedupe_within_radius_per_axis() {
        let mut seen = SeenPositions::default();
        assert!(seen.first_sighting(Point3::new(0.0, 0.0, 0.0)));
        assert!(!seen.first_sighting(Point3::new(0.4, -0.4, 0.25)));
        assert!(seen.first_sighting(Point3::new(0.6, 0.0, 0.0)));
        assert!(!seen.first_sighting(Point3::new(0.7, 0.1, 0.0)));
    }
}
