//! curtaind - IR light-curtain daemon
//!
//! This daemon:
//! 1. Opens the configured capture device (V4L2, or `stub://` when built without it)
//! 2. Runs the six-zone motion classifier on every frame it can keep up with
//! 3. Accepts external zone commands over UDP
//! 4. Logs each zone transition and optionally forwards it as a JSON datagram

use anyhow::{anyhow, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::{mpsc, Arc};
use std::time::{Duration, Instant};

use ir_curtain::{
    CurtainConfig, CurtainService, DatagramSink, DeviceCatalog, EventSink, ExternalInputListener,
    FanoutSink, FrameProcessor, LogSink, SharedZoneState, SyntheticCatalog,
};

const STATS_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Config file (TOML or JSON). Overrides CURTAIN_CONFIG.
    #[arg(long, env = "CURTAIN_CONFIG")]
    config: Option<PathBuf>,
    /// List capture devices and exit.
    #[arg(long)]
    list_devices: bool,
    /// Capture device index (overrides config).
    #[arg(long)]
    device_index: Option<usize>,
    /// Use synthetic `stub://` devices even when V4L2 support is built in.
    #[arg(long)]
    synthetic: bool,
    /// Do not listen for external zone input.
    #[arg(long)]
    no_external: bool,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    let mut config = CurtainConfig::load_from(args.config.as_deref())?;
    if let Some(index) = args.device_index {
        config.device_index = index;
    }
    if args.no_external {
        config.external.enabled = false;
    }

    let catalog = device_catalog(args.synthetic);
    if args.list_devices {
        let devices = catalog.devices();
        if devices.is_empty() {
            println!("no capture devices found");
        }
        for device in devices {
            println!("{}: {} ({})", device.index, device.name, device.id);
        }
        return Ok(());
    }

    let mut fanout = FanoutSink::new().with(Arc::new(LogSink));
    if let Some(addr) = &config.forward_addr {
        let sink = DatagramSink::connect(addr)?;
        log::info!("forwarding zone events to udp {}", sink.target());
        fanout = fanout.with(Arc::new(sink));
    }
    let sink: Arc<dyn EventSink> = Arc::new(fanout);
    let zones = SharedZoneState::new(sink);

    let processor = Arc::new(FrameProcessor::new(config.detection.clone(), zones.clone()));
    let mut service = CurtainService::new(
        catalog,
        config.device_index,
        config.capture.clone(),
        processor.clone(),
    );
    // Either source alone is enough to keep running.
    let camera_started = match service.start() {
        Ok(_) => true,
        Err(err) => {
            log::error!("camera unavailable: {}", err);
            false
        }
    };

    let mut listener = ExternalInputListener::new(zones);
    let external_started = if config.external.enabled {
        match listener.start(&format!("0.0.0.0:{}", config.external.port)) {
            Ok(_) => true,
            Err(err) => {
                log::error!(
                    "external input unavailable on port {}: {}",
                    config.external.port,
                    err
                );
                false
            }
        }
    } else {
        false
    };

    if !camera_started && !external_started {
        return Err(anyhow!("no event source could be started"));
    }

    let (tx, rx) = mpsc::channel();
    ctrlc::set_handler(move || {
        let _ = tx.send(());
    })
    .map_err(|e| anyhow!("error setting Ctrl-C handler: {}", e))?;

    log::info!(
        "curtaind running (policy {}, threshold {}, deadzone {}%)",
        config.detection.policy,
        config.detection.motion_threshold,
        config.detection.deadzone_percent
    );

    let mut last_stats = Instant::now();
    loop {
        match rx.recv_timeout(STATS_INTERVAL) {
            Ok(()) | Err(mpsc::RecvTimeoutError::Disconnected) => break,
            Err(mpsc::RecvTimeoutError::Timeout) => {}
        }
        if camera_started && last_stats.elapsed() >= STATS_INTERVAL {
            let stats = processor.stats();
            log::info!(
                "frames: {} classified, {} dropped, {} skipped; {} events",
                stats.classified,
                stats.dropped,
                stats.skipped,
                stats.events
            );
            last_stats = Instant::now();
        }
    }

    log::info!("shutdown signal received, stopping...");
    listener.stop();
    service.stop();
    Ok(())
}

#[cfg(feature = "ingest-v4l2")]
fn device_catalog(synthetic: bool) -> Arc<dyn DeviceCatalog> {
    if synthetic {
        Arc::new(SyntheticCatalog::new().paced(true))
    } else {
        Arc::new(ir_curtain::V4l2Catalog::new())
    }
}

#[cfg(not(feature = "ingest-v4l2"))]
fn device_catalog(synthetic: bool) -> Arc<dyn DeviceCatalog> {
    if !synthetic {
        log::warn!("built without ingest-v4l2; using synthetic devices");
    }
    Arc::new(SyntheticCatalog::new().paced(true))
}
