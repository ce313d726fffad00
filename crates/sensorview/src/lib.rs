//! Live sensor streaming to a browser viewer.
//!
//! sensorview sends camera frames, occupancy maps and vision results from a
//! producer process to a single browser over one WebSocket, with the viewer
//! page served from the same port.
//!
//! # Crate Structure
//!
//! - [`codec`]: downscaling and JPEG compression
//! - [`queue`]: blocking queue and worker pool
//! - [`wire`]: binary envelopes, JSON messages and control commands
//! - [`transport`]: WebSocket and in-memory transports, address discovery
//! - [`proxy`]: the streaming proxy and result displays
//! - [`synthetic`]: generated frames for demos and smoke tests

pub mod synthetic;

/// Re-export codec types.
pub mod codec {
    pub use sensorview_codec::*;
}

/// Re-export queue types.
pub mod queue {
    pub use sensorview_queue::*;
}

/// Re-export wire protocol types.
pub mod wire {
    pub use sensorview_wire::*;
}

/// Re-export transport types.
pub mod transport {
    pub use sensorview_transport::*;
}

/// Re-export proxy types.
pub mod proxy {
    pub use sensorview_proxy::*;
}
