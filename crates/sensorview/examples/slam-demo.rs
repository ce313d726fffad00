//! Streams a synthetic SLAM scene to a browser.
//!
//! Run with:
//!   cargo run --example slam-demo
//!
//! Then open the printed URL. The demo exits when the viewer presses stop or
//! closes the page.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use sensorview::proxy::display::SlamDisplay;
use sensorview::proxy::{ControlCallbacks, ProxyConfig, StreamingProxy};
use sensorview::synthetic::SyntheticScene;
use sensorview::transport::{preferred_ipv4, viewer_url, WebSocketConfig, DEFAULT_INDEX_PAGE};

const FPS: u32 = 30;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let ws_config = WebSocketConfig::default();
    eprintln!(
        "Open {} in a browser",
        viewer_url(preferred_ipv4(), ws_config.port, DEFAULT_INDEX_PAGE)
    );

    let proxy = Arc::new(StreamingProxy::serve(ProxyConfig::default(), ws_config)?);
    let display = SlamDisplay::new(Arc::clone(&proxy));

    let running = Arc::new(AtomicBool::new(true));
    let reset = Arc::new(AtomicBool::new(false));
    display.set_control_callbacks({
        let running = running.clone();
        let reset = reset.clone();
        ControlCallbacks::new()
            .on_stop(move || running.store(false, Ordering::SeqCst))
            .on_reset(move || reset.store(true, Ordering::SeqCst))
    });

    let mut scene = SyntheticScene::new(640, 480, FPS);
    while running.load(Ordering::SeqCst) {
        if reset.swap(false, Ordering::SeqCst) {
            scene.reset();
            display.on_reset_completed()?;
        }

        let ts = scene.timestamp_us();
        display.on_rgb_frame(ts, scene.width(), scene.height(), &scene.rgb())?;
        display.on_fisheye_frame(ts, scene.width(), scene.height(), &scene.fisheye())?;
        if scene.tick() % 10 == 0 {
            display.on_occupancy(0.05, &scene.occupancy())?;
            display.on_pose(3, &scene.pose())?;
        }

        scene.advance();
        thread::sleep(Duration::from_secs(1) / FPS);
    }

    eprintln!("Viewer stopped after {} frames", scene.tick());
    proxy.stop();
    Ok(())
}
