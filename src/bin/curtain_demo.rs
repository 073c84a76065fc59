//! curtain_demo - synthetic end-to-end run of the light curtain
//!
//! Feeds a scripted hand sweep through the frame processor and prints every
//! zone transition, then a frame summary.

use anyhow::Result;
use clap::Parser;
use std::sync::{mpsc, Arc};

use ir_curtain::{
    ChannelSink, ClassifierPolicy, DetectionConfig, FrameOutcome, FrameProcessor, FrameSource,
    SharedZoneState, SyntheticSource,
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    /// Number of synthetic frames to process.
    #[arg(long, default_value_t = 120)]
    frames: u64,
    /// Classifier policy: column-majority or pixel-ratio.
    #[arg(long, default_value_t = ClassifierPolicy::ColumnMajority)]
    policy: ClassifierPolicy,
    /// Frames the hand dwells on each zone.
    #[arg(long, default_value_t = 10)]
    dwell: u64,
    /// Frame width in pixels.
    #[arg(long, default_value_t = 320)]
    width: u32,
    /// Frame height in pixels.
    #[arg(long, default_value_t = 240)]
    height: u32,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();
    let args = Args::parse();

    let detection = DetectionConfig {
        policy: args.policy,
        ..DetectionConfig::default()
    };
    detection.validate()?;

    let (tx, rx) = mpsc::channel();
    let zones = SharedZoneState::new(Arc::new(ChannelSink::new(tx)));
    let processor = FrameProcessor::new(detection, zones);
    processor.begin();

    let mut source = SyntheticSource::new(args.width, args.height)?.with_dwell(args.dwell);
    println!(
        "processing {} synthetic {}x{} frames with {}",
        args.frames,
        args.width,
        args.height,
        processor.classifier_name()
    );

    for index in 0..args.frames {
        let frame = source.next_frame()?;
        if let FrameOutcome::Classified { events } = processor.submit(frame) {
            for event in rx.try_iter().take(events) {
                println!(
                    "frame {:>4}: IR {} {}",
                    index,
                    event.zone,
                    if event.blocked { "BLOCKED" } else { "UNBLOCKED" }
                );
            }
        }
    }

    let stats = processor.stats();
    processor.end();
    println!(
        "done: {} frames classified, {} skipped, {} events",
        stats.classified, stats.skipped, stats.events
    );
    Ok(())
}
