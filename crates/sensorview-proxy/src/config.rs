//! Proxy tuning knobs.
//!
//! Every field has a default, so a config file only needs the values it
//! changes:
//!
//! ```json
//! { "use_jpeg": false, "admission": { "mode": "enforce", "max_unacked": 3 } }
//! ```

use std::path::Path;

use serde::{Deserialize, Serialize};
use sensorview_codec::DEFAULT_QUALITY;

use crate::error::{ProxyError, Result};

/// What to do with a frame whose kind already has unacknowledged envelopes
/// in flight.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AdmissionPolicy {
    /// Count unacked envelopes but always send.
    #[default]
    Diagnostic,
    /// Drop frames of a kind once `max_unacked` of them are in flight.
    Enforce { max_unacked: i32 },
}

/// Streaming proxy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProxyConfig {
    /// JPEG-encode image frames before sending.
    pub use_jpeg: bool,
    /// JPEG quality, 0-100.
    pub jpeg_quality: u8,
    /// Number of compression workers.
    pub workers: usize,
    /// Fisheye frames arriving faster than this are dropped.
    pub fisheye_fps: u32,
    /// RGB frames at most this wide are sent at full resolution.
    pub rgb_full_res_width: u16,
    /// Downscale factor for wide RGB frames and all fisheye frames.
    pub downscale_factor: u16,
    /// Pending frame limit; the oldest pending frame is evicted when full.
    pub queue_capacity: Option<usize>,
    pub admission: AdmissionPolicy,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            use_jpeg: true,
            jpeg_quality: DEFAULT_QUALITY,
            workers: 1,
            fisheye_fps: 30,
            rgb_full_res_width: 320,
            downscale_factor: 2,
            queue_capacity: None,
            admission: AdmissionPolicy::Diagnostic,
        }
    }
}

impl ProxyConfig {
    /// Load a config from a JSON file. Missing fields keep their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ProxyError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self =
            serde_json::from_str(&text).map_err(|source| ProxyError::ConfigParse {
                path: path.to_path_buf(),
                source,
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject values the pipeline cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.jpeg_quality > 100 {
            return Err(ProxyError::InvalidConfig(format!(
                "jpeg_quality {} out of range (0-100)",
                self.jpeg_quality
            )));
        }
        if self.workers == 0 {
            return Err(ProxyError::InvalidConfig(
                "workers must be at least 1".to_string(),
            ));
        }
        if self.fisheye_fps == 0 {
            return Err(ProxyError::InvalidConfig(
                "fisheye_fps must be at least 1".to_string(),
            ));
        }
        if self.downscale_factor == 0 {
            return Err(ProxyError::InvalidConfig(
                "downscale_factor must be at least 1".to_string(),
            ));
        }
        if self.queue_capacity == Some(0) {
            return Err(ProxyError::InvalidConfig(
                "queue_capacity must be at least 1".to_string(),
            ));
        }
        if let AdmissionPolicy::Enforce { max_unacked } = self.admission {
            if max_unacked < 1 {
                return Err(ProxyError::InvalidConfig(format!(
                    "max_unacked {max_unacked} must be at least 1"
                )));
            }
        }
        Ok(())
    }

    /// Minimum spacing between admitted fisheye frames, in microseconds.
    ///
    /// Frames may arrive up to 10% early before they count as too fast.
    pub fn fisheye_min_interval_us(&self) -> u64 {
        (1e6 / f64::from(self.fisheye_fps.max(1)) * 0.9) as u64
    }

    /// Downscale factor applied to an RGB frame of `width` pixels.
    pub fn rgb_factor(&self, width: u16) -> u16 {
        if width <= self.rgb_full_res_width {
            1
        } else {
            self.downscale_factor
        }
    }
}
