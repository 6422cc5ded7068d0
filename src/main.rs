//! Hand stream: captures the camera, runs the hand landmark detector and
//! streams one JSON message per frame to a WebSocket client.

use anyhow::{Context, Result};
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::mpsc;

use hand_stream::camera::OpenCvCamera;
use hand_stream::config::Config;
use hand_stream::hand::SubprocessDetector;
use hand_stream::logging;
use hand_stream::pipeline::FrameSourceLoop;
use hand_stream::server;

const CONFIG_PATH: &str = "hand_stream.toml";

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load_or_default(CONFIG_PATH);
    logging::init(&config.log, config.verbose)?;
    log::info!("Hand Stream ({})", env!("GIT_VERSION"));
    log::info!(
        "[config] listen_addr={}, camera={}, detector={}, verbose={}",
        config.listen_addr, config.camera.index, config.detector.command, config.verbose
    );

    // Startup failures are fatal before any client connects
    let camera = OpenCvCamera::open(&config.camera)?;
    let detector = SubprocessDetector::spawn(&config.detector)?;
    let listener = TcpListener::bind(&config.listen_addr)
        .await
        .with_context(|| format!("failed to listen on {}", config.listen_addr))?;

    let stop = Arc::new(AtomicBool::new(false));
    signal_hook::flag::register(signal_hook::consts::SIGINT, Arc::clone(&stop))?;
    signal_hook::flag::register(signal_hook::consts::SIGTERM, Arc::clone(&stop))?;

    let (tx, rx) = mpsc::channel(1);
    let frame_loop = FrameSourceLoop::new(camera, detector, stop, config.max_consecutive_detector_errors);
    let producer = std::thread::Builder::new()
        .name("frame-loop".to_string())
        .spawn(move || frame_loop.run(tx))?;

    server::serve(listener, rx).await?;

    match producer.join() {
        Ok(Ok(exit)) => log::info!("stopped ({:?})", exit),
        Ok(Err(e)) => {
            log::error!("frame loop failed: {:#}", e);
            return Err(e);
        }
        Err(_) => anyhow::bail!("frame loop panicked"),
    }
    log::logger().flush();
    Ok(())
}
