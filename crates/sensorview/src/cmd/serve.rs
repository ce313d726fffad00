use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use sensorview::synthetic::SyntheticScene;
use serde::Serialize;
use sensorview_proxy::display::SlamDisplay;
use sensorview_proxy::{
    AdmissionPolicy, ControlCallbacks, ProxyConfig, ProxyError, StreamingProxy,
};
use sensorview_transport::{
    preferred_ipv4, viewer_url, Transport, TransportError, WebSocketConfig, WebSocketTransport,
};
use sensorview_wire::{kind_name, FpsReport, MsgKind};
use tracing::{debug, info};

use crate::cmd::{parse_duration, ServeArgs};
use crate::exit::{proxy_error, transport_error, CliError, CliResult, SUCCESS};
use crate::output::{print_json, print_table, OutputFormat};

const SCENE_WIDTH: u16 = 640;
const SCENE_HEIGHT: u16 = 480;
/// Map, pose and rate reports go out once per this many frames.
const SLOW_UPDATE_EVERY: u64 = 10;
const MAP_SCALE_M: f32 = 0.05;
const DRAIN_TIMEOUT: Duration = Duration::from_secs(1);

#[derive(Serialize)]
struct Listening {
    event: &'static str,
    addr: String,
    port: u16,
    url: String,
}

#[derive(Serialize)]
struct Summary {
    event: &'static str,
    frames: u64,
    executed: u64,
    discarded: u64,
    evicted: u64,
    panicked: u64,
    unacked: BTreeMap<&'static str, i32>,
}

pub fn run(args: ServeArgs, format: OutputFormat) -> CliResult<i32> {
    let config = load_config(&args)?;
    let ws_config = WebSocketConfig {
        host: args.host.clone(),
        port: args.port,
        web_root: args.web_root.clone(),
        connect_timeout: args.wait_timeout.as_deref().map(parse_duration).transpose()?,
        ..WebSocketConfig::default()
    };
    let index_page = ws_config.index_page.clone();

    let transport = Arc::new(WebSocketTransport::new(ws_config));
    let addr = transport
        .bind()
        .map_err(|err| transport_error("bind failed", err))?;
    print_listening(
        &Listening {
            event: "listening",
            addr: addr.to_string(),
            port: addr.port(),
            url: viewer_url(preferred_ipv4(), addr.port(), &index_page),
        },
        format,
    );

    let running = Arc::new(AtomicBool::new(true));
    install_ctrlc_handler(running.clone(), transport.clone())?;

    let proxy = match StreamingProxy::start(config, transport.clone() as Arc<dyn Transport>) {
        Ok(proxy) => Arc::new(proxy),
        Err(ProxyError::Transport(TransportError::Shutdown)) => {
            info!("interrupted before a viewer connected");
            return Ok(SUCCESS);
        }
        Err(err) => return Err(proxy_error("start failed", err)),
    };

    let reset_requested = Arc::new(AtomicBool::new(false));
    let display = SlamDisplay::new(Arc::clone(&proxy));
    display.set_control_callbacks(callbacks(running.clone(), reset_requested.clone()));

    let frames = stream_scene(&display, &args, &running, &reset_requested)?;

    let deadline = Instant::now() + DRAIN_TIMEOUT;
    while proxy.is_connected() && proxy.queue_stats().pending > 0 && Instant::now() < deadline {
        thread::sleep(Duration::from_millis(10));
    }

    let stats = proxy.queue_stats();
    let unacked = [MsgKind::MapUpdate, MsgKind::FishEye, MsgKind::Rgb]
        .into_iter()
        .map(|kind| (kind_name(kind.as_u8()), proxy.unacked(kind)))
        .collect();
    proxy.stop();

    print_summary(
        &Summary {
            event: "summary",
            frames,
            executed: stats.executed,
            discarded: stats.discarded,
            evicted: stats.evicted,
            panicked: stats.panicked,
            unacked,
        },
        format,
    );
    Ok(SUCCESS)
}

/// Config file first, then flag overrides.
fn load_config(args: &ServeArgs) -> CliResult<ProxyConfig> {
    let mut config = match &args.config {
        Some(path) => {
            ProxyConfig::from_json_file(path).map_err(|err| proxy_error("config", err))?
        }
        None => ProxyConfig::default(),
    };
    if args.no_jpeg {
        config.use_jpeg = false;
    }
    if let Some(quality) = args.quality {
        config.jpeg_quality = quality;
    }
    if let Some(workers) = args.workers {
        config.workers = workers;
    }
    if let Some(max_unacked) = args.enforce_acks {
        config.admission = AdmissionPolicy::Enforce { max_unacked };
    }
    config
        .validate()
        .map_err(|err| proxy_error("config", err))?;
    Ok(config)
}

fn callbacks(running: Arc<AtomicBool>, reset_requested: Arc<AtomicBool>) -> ControlCallbacks {
    ControlCallbacks::new()
        .on_stop(move || {
            info!("viewer requested stop");
            running.store(false, Ordering::SeqCst);
        })
        .on_reset(move || reset_requested.store(true, Ordering::SeqCst))
        .on_track(|id| info!(id, "viewer requested tracking"))
        .on_load_database(|| info!("viewer requested database load"))
}

fn stream_scene(
    display: &SlamDisplay,
    args: &ServeArgs,
    running: &AtomicBool,
    reset_requested: &AtomicBool,
) -> CliResult<u64> {
    let interval = Duration::from_secs(1) / args.fps;
    let mut scene = SyntheticScene::new(SCENE_WIDTH, SCENE_HEIGHT, args.fps);
    let (width, height) = (scene.width(), scene.height());
    let mut sent = 0u64;

    while running.load(Ordering::SeqCst) {
        if args.frames.is_some_and(|limit| sent >= limit) {
            break;
        }
        let started = Instant::now();

        if reset_requested.swap(false, Ordering::SeqCst) {
            scene.reset();
            display
                .on_reset_completed()
                .map_err(|err| proxy_error("reset", err))?;
            debug!("scene reset");
        }

        let timestamp = scene.timestamp_us();
        display
            .on_rgb_frame(timestamp, width, height, &scene.rgb())
            .map_err(|err| proxy_error("rgb frame", err))?;
        display
            .on_fisheye_frame(timestamp, width, height, &scene.fisheye())
            .map_err(|err| proxy_error("fisheye frame", err))?;

        if scene.tick() % SLOW_UPDATE_EVERY == 0 {
            display
                .on_occupancy(MAP_SCALE_M, &scene.occupancy())
                .map_err(|err| proxy_error("occupancy", err))?;
            display
                .on_pose(3, &scene.pose())
                .map_err(|err| proxy_error("pose", err))?;
            display
                .on_fps(FpsReport {
                    source: "input".to_string(),
                    fisheye: args.fps as f32,
                    depth: args.fps as f32,
                    accelerometer: 250.0,
                    gyroscope: 200.0,
                })
                .map_err(|err| proxy_error("fps", err))?;
        }

        scene.advance();
        sent += 1;
        thread::sleep(interval.saturating_sub(started.elapsed()));
    }
    Ok(sent)
}

fn print_listening(listening: &Listening, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(listening),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!("Listening on {}", listening.addr);
            println!("  Viewer: {}", listening.url);
        }
    }
}

fn print_summary(summary: &Summary, format: OutputFormat) {
    match format {
        OutputFormat::Json => print_json(summary),
        OutputFormat::Table | OutputFormat::Pretty => {
            let mut rows = vec![
                vec!["frames".to_string(), summary.frames.to_string()],
                vec!["executed".to_string(), summary.executed.to_string()],
                vec!["discarded".to_string(), summary.discarded.to_string()],
                vec!["evicted".to_string(), summary.evicted.to_string()],
                vec!["panicked".to_string(), summary.panicked.to_string()],
            ];
            rows.extend(
                summary
                    .unacked
                    .iter()
                    .map(|(kind, n)| vec![format!("unacked {kind}"), n.to_string()]),
            );
            print_table(&["METRIC", "VALUE"], rows);
        }
    }
}

fn install_ctrlc_handler(
    running: Arc<AtomicBool>,
    transport: Arc<WebSocketTransport>,
) -> CliResult<()> {
    ctrlc::set_handler(move || {
        running.store(false, Ordering::SeqCst);
        transport.disconnect();
    })
    .map_err(|err| {
        CliError::new(
            crate::exit::INTERNAL,
            format!("signal handler setup failed: {err}"),
        )
    })
}
