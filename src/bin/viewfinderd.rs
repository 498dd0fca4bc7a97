//! viewfinderd - live detection overlay demo daemon
//!
//! Wires the full pipeline together:
//! 1. Connects a camera source (synthetic by default)
//! 2. Loads a detector backend from the registry (fatal on load failure)
//! 3. Spawns the detection scheduler on its fixed cadence
//! 4. Maps published detections into overlay rects against live geometry
//! 5. Steps the gesture sheet spring and composes overlay scenes
//! 6. Emits changed scenes as JSON log lines (the presentation boundary)

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;
use clap::Parser;

use viewfinder::frame::FrameSource;
use viewfinder::schedule::SystemClock;
use viewfinder::sheet::DragSample;
use viewfinder::{
    compose, map_detections, BackendRegistry, CameraSource, DetectionScheduler, GestureSheet,
    MotionBackend, SceneGate, StubBackend, ViewfinderConfig,
};

#[derive(Parser, Debug)]
#[command(name = "viewfinderd", about = "Live detection overlay pipeline demo")]
struct Args {
    /// Run duration in seconds (0 = run until Ctrl-C).
    #[arg(long, default_value_t = 0)]
    duration_secs: u64,

    /// Perform one scripted expand flick once detections arrive.
    #[arg(long)]
    demo_gesture: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let args = Args::parse();

    let cfg = ViewfinderConfig::load()?;
    log::info!(
        "viewfinderd starting: camera={} backend={} interval={}ms",
        cfg.camera.url,
        cfg.backend,
        cfg.interval.as_millis()
    );

    let source = Arc::new(CameraSource::new(cfg.camera_config())?);
    source.connect()?;

    let mut registry = BackendRegistry::new();
    registry.register(StubBackend::new());
    registry.register(MotionBackend::new());
    // Load failure is fatal: no detection is possible, so no overlay ever
    // appears and we surface the error instead of retrying.
    let backend = registry.load(Some(cfg.backend.as_str()))?;

    let scheduler = DetectionScheduler::new(
        source.clone(),
        backend,
        cfg.interval,
        Arc::new(SystemClock),
    );
    let feed = scheduler.feed();
    let handle = scheduler.spawn();

    let shutdown = Arc::new(AtomicBool::new(false));
    let shutdown_signal = shutdown.clone();
    ctrlc::set_handler(move || {
        shutdown_signal.store(true, Ordering::SeqCst);
    })?;

    let sheet_config = cfg.sheet_config();
    let mut sheet = GestureSheet::new(sheet_config);
    let mut watcher = feed.subscribe();
    let mut gate = SceneGate::new();
    let mut rects = Vec::new();
    let mut gesture_pending = args.demo_gesture;

    let started = Instant::now();
    let deadline = (args.duration_secs > 0).then(|| started + Duration::from_secs(args.duration_secs));
    let frame_step = Duration::from_millis(16);

    while !shutdown.load(Ordering::SeqCst) {
        if deadline.is_some_and(|deadline| Instant::now() >= deadline) {
            break;
        }

        let mut dirty = false;
        if let Some(detections) = watcher.poll() {
            // Geometry is re-read every pass; it can change under us.
            rects = map_detections(&detections, source.geometry());
            dirty = true;

            if gesture_pending && !rects.is_empty() {
                gesture_pending = false;
                sheet.drag_start();
                sheet.drag_move(-40.0);
                sheet.drag_end(DragSample {
                    delta_y: -40.0,
                    velocity_y: -0.6,
                    elapsed: Duration::from_millis(80),
                });
                log::info!("demo gesture: upward flick, committed {:?}", sheet.phase());
            }
        }

        if !sheet.is_settled() {
            sheet.step(frame_step);
            dirty = true;
        }
        let state = sheet.state();

        if dirty {
            let scene = compose(&rects, &state, &sheet_config);
            if let Some(scene) = gate.push(scene) {
                match serde_json::to_string(scene) {
                    Ok(json) => log::info!("scene: {}", json),
                    Err(err) => log::error!("scene serialization failed: {}", err),
                }
            }
        }

        std::thread::sleep(frame_step);
    }

    log::info!(
        "viewfinderd stopping (ran {:?}, {} frames served)",
        started.elapsed(),
        source.frames_served()
    );
    handle.stop()?;
    Ok(())
}
