//! Generated sensor output.
//!
//! A camera slowly orbiting the origin: color bars drifting across the RGB
//! plane, a rotating spoke on the fisheye plane, and a ring of occupied tiles
//! that grows and wraps.

use std::f32::consts::TAU;

use sensorview_wire::Tile;

/// Deterministic stand-in for a camera and mapping pipeline.
#[derive(Debug, Clone)]
pub struct SyntheticScene {
    width: u16,
    height: u16,
    frame_interval_us: u64,
    tick: u64,
}

impl SyntheticScene {
    /// A scene producing `width` x `height` planes at `fps` frames per second.
    pub fn new(width: u16, height: u16, fps: u32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
            frame_interval_us: 1_000_000 / u64::from(fps.max(1)),
            tick: 0,
        }
    }

    pub fn width(&self) -> u16 {
        self.width
    }

    pub fn height(&self) -> u16 {
        self.height
    }

    /// Frames produced since the last reset.
    pub fn tick(&self) -> u64 {
        self.tick
    }

    /// Capture time of the current frame in microseconds.
    pub fn timestamp_us(&self) -> u64 {
        self.tick * self.frame_interval_us
    }

    /// Move to the next frame and return its timestamp.
    pub fn advance(&mut self) -> u64 {
        self.tick += 1;
        self.timestamp_us()
    }

    pub fn reset(&mut self) {
        self.tick = 0;
    }

    /// Packed RGB plane of the current frame.
    pub fn rgb(&self) -> Vec<u8> {
        let shift = self.tick as usize;
        let mut out = Vec::with_capacity(usize::from(self.width) * usize::from(self.height) * 3);
        for y in 0..usize::from(self.height) {
            for x in 0..usize::from(self.width) {
                out.push(((x + shift * 4) % 256) as u8);
                out.push(((y + shift * 2) % 256) as u8);
                out.push(((x ^ y) % 256) as u8);
            }
        }
        out
    }

    /// 8-bit fisheye plane of the current frame.
    pub fn fisheye(&self) -> Vec<u8> {
        let (w, h) = (f32::from(self.width), f32::from(self.height));
        let (cx, cy) = (w / 2.0, h / 2.0);
        let radius = cx.min(cy).max(1.0);
        let spoke = self.angle();
        let mut out = Vec::with_capacity(usize::from(self.width) * usize::from(self.height));
        for y in 0..self.height {
            for x in 0..self.width {
                let dx = f32::from(x) - cx;
                let dy = f32::from(y) - cy;
                let r = (dx * dx + dy * dy).sqrt() / radius;
                let value = if r > 1.0 {
                    0
                } else {
                    let off = (dy.atan2(dx) - spoke).rem_euclid(TAU);
                    if off < 0.1 {
                        255
                    } else {
                        (200.0 * (1.0 - r)) as u8
                    }
                };
                out.push(value);
            }
        }
        out
    }

    /// Occupied tiles around the origin, in map grid units.
    pub fn occupancy(&self) -> Vec<Tile> {
        let ring = 5 + (self.tick / 10 % 20) as i32;
        let steps = ring * 8;
        let mut tiles: Vec<Tile> = Vec::with_capacity(steps as usize);
        for i in 0..steps {
            let theta = i as f32 / steps as f32 * TAU;
            let tile = Tile {
                x: (ring as f32 * theta.cos()).round() as i32,
                z: (ring as f32 * theta.sin()).round() as i32,
                occupancy: 100,
            };
            if tiles.last() != Some(&tile) {
                tiles.push(tile);
            }
        }
        tiles
    }

    /// Camera pose as a row-major 3x4 matrix: yaw about y, orbiting at 1 m.
    pub fn pose(&self) -> [f32; 12] {
        let theta = self.angle();
        let (s, c) = theta.sin_cos();
        [
            c, 0.0, s, c, //
            0.0, 1.0, 0.0, 0.0, //
            -s, 0.0, c, s,
        ]
    }

    fn angle(&self) -> f32 {
        (self.tick % 360) as f32 * TAU / 360.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plane_sizes() {
        let scene = SyntheticScene::new(64, 48, 30);
        assert_eq!(scene.rgb().len(), 64 * 48 * 3);
        assert_eq!(scene.fisheye().len(), 64 * 48);
    }

    #[test]
    fn timestamps_follow_rate() {
        let mut scene = SyntheticScene::new(4, 4, 25);
        assert_eq!(scene.timestamp_us(), 0);
        assert_eq!(scene.advance(), 40_000);
        assert_eq!(scene.advance(), 80_000);
        scene.reset();
        assert_eq!(scene.tick(), 0);
    }

    #[test]
    fn frames_change_over_time() {
        let mut scene = SyntheticScene::new(32, 32, 30);
        let first = scene.rgb();
        scene.advance();
        assert_ne!(first, scene.rgb());
    }

    #[test]
    fn occupancy_ring_is_occupied() {
        let scene = SyntheticScene::new(4, 4, 30);
        let tiles = scene.occupancy();
        assert!(!tiles.is_empty());
        assert!(tiles.iter().all(|t| t.occupancy == 100));
        assert!(tiles.iter().all(|t| t.x.abs() <= 5 && t.z.abs() <= 5));
    }

    #[test]
    fn pose_starts_at_identity_rotation() {
        let pose = SyntheticScene::new(4, 4, 30).pose();
        assert_eq!(pose, [1.0, 0.0, 0.0, 1.0, 0.0, 1.0, 0.0, 0.0, 0.0, 0.0, 1.0, 0.0]);
    }
}
