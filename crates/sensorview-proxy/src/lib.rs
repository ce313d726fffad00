//! Streaming proxy between sensor producers and a browser viewer.
//!
//! [`StreamingProxy`] accepts RGB and fisheye frames, occupancy maps and JSON
//! results from any number of producer threads and forwards them to the
//! viewer over a [`Transport`](sensorview_transport::Transport):
//!
//! - image frames are downscaled on the caller's thread and compressed on a
//!   worker pool
//! - fisheye frames are rate limited
//! - per-kind unacked counters track how far the viewer lags behind
//! - viewer control commands are dispatched to [`ControlCallbacks`]
//!
//! The [`display`] module wraps the proxy with typed senders for object
//! recognition, person tracking and SLAM results.
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use sensorview_proxy::{ControlCallbacks, ProxyConfig, StreamingProxy};
//! use sensorview_transport::WebSocketConfig;
//!
//! # fn main() -> sensorview_proxy::Result<()> {
//! // Blocks until a browser opens the viewer page.
//! let proxy = Arc::new(StreamingProxy::serve(
//!     ProxyConfig::default(),
//!     WebSocketConfig::default(),
//! )?);
//! proxy.set_control_callbacks(ControlCallbacks::new().on_reset(|| println!("reset")));
//!
//! let rgb = vec![0u8; 640 * 480 * 3];
//! proxy.on_rgb_frame(0, 640, 480, &rgb)?;
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod control;
pub mod display;
pub mod error;
pub mod flow;
mod proxy;
pub mod throttle;

pub use config::{AdmissionPolicy, ProxyConfig};
pub use control::ControlCallbacks;
pub use error::{ProxyError, Result};
pub use flow::FlowControl;
pub use proxy::StreamingProxy;
pub use throttle::FrameThrottle;
