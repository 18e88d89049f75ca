//! Heron probe - drive the engine with a test tone and dump the overlays
//!
//! Runs the audio callback in real time against a synthetic sine, then
//! prints a JSON summary of the response curve and spectral paths.

use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use clap::Parser;
use serde::Serialize;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use heron_core::{ChainSettings, EngineConfig, EngineError, EqEngine, Event, Path, PRESETS};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Engine configuration JSON file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Built-in preset to load
    #[arg(short, long)]
    preset: Option<String>,

    /// Test tone frequency in Hz
    #[arg(long, default_value_t = 1000.0)]
    tone: f32,

    /// Seconds of audio to run
    #[arg(long, default_value_t = 1.0)]
    seconds: f32,

    /// List the built-in presets and exit
    #[arg(long)]
    list_presets: bool,

    /// Pretty-print the JSON summary
    #[arg(long)]
    pretty: bool,
}

#[derive(Serialize)]
struct PathSummary {
    points: usize,
    /// Frequency under the highest point (smallest y)
    peak_hz: f64,
    peak_y: f32,
}

#[derive(Serialize)]
struct Summary {
    sample_rate: u32,
    settings: ChainSettings,
    events: usize,
    overruns: u64,
    response: Option<PathSummary>,
    left: Option<PathSummary>,
    right: Option<PathSummary>,
}

fn summarize(path: &Path, config: &EngineConfig) -> Option<PathSummary> {
    let area = config.display.area().ok()?;
    let (pixel, point) = path.highest_point()?;
    Some(PathSummary {
        points: path.len(),
        peak_hz: area.frequency_at(pixel),
        peak_y: point.y,
    })
}

fn main() -> Result<(), EngineError> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("heron_core=info")))
        .init();

    let args = Args::parse();

    if args.list_presets {
        for preset in PRESETS {
            println!("{}", preset.name);
        }
        return Ok(());
    }

    let config = match &args.config {
        Some(path) => EngineConfig::from_json_file(path)?,
        None => EngineConfig::default(),
    };

    let (engine, mut callback) = EqEngine::with_config(config.clone())?;
    if let Some(name) = &args.preset {
        engine.load_preset(name)?;
        info!(preset = %name, "Preset loaded");
    }

    let sample_rate = config.stream.sample_rate as f32;
    let block_size = config.stream.block_size as usize;
    let channels = config.stream.channels as usize;
    callback.prepare(sample_rate, block_size)?;

    let total_frames = (args.seconds.max(0.0) * sample_rate) as usize;
    let block_time = Duration::from_secs_f32(block_size as f32 / sample_rate);
    let phase_step = 2.0 * std::f32::consts::PI * args.tone / sample_rate;
    let mut buffer = vec![0.0_f32; block_size * channels];

    info!(tone = args.tone, seconds = args.seconds, "Running test tone");

    let mut frame = 0;
    while frame < total_frames {
        for (i, chunk) in buffer.chunks_exact_mut(channels).enumerate() {
            let sample = ((frame + i) as f32 * phase_step).sin() * 0.5;
            chunk.fill(sample);
        }
        callback.process_interleaved(&mut buffer, channels);
        frame += block_size;
        thread::sleep(block_time);
    }

    // Let the control thread catch up with the last blocks
    thread::sleep(config.analyzer.refresh_interval() * 3);
    engine.request_overlays()?;

    let mut events = 0;
    let mut overruns = 0;
    let mut overlays = None;
    while let Some(event) = engine.wait_event_timeout(Duration::from_secs(1)) {
        events += 1;
        match event {
            Event::FifoOverrun { left, right } => overruns = left.max(right),
            Event::Error { message } => warn!("Engine error: {}", message),
            Event::Overlays(snapshot) => {
                overlays = Some(snapshot);
                break;
            }
            _ => {}
        }
    }
    let overlays = overlays.unwrap_or_else(|| engine.latest_overlays());

    let summary = Summary {
        sample_rate: config.stream.sample_rate,
        settings: engine.settings(),
        events,
        overruns,
        response: summarize(&overlays.response, &config),
        left: overlays.left.as_ref().and_then(|p| summarize(p, &config)),
        right: overlays.right.as_ref().and_then(|p| summarize(p, &config)),
    };

    let json = if args.pretty {
        serde_json::to_string_pretty(&summary)?
    } else {
        serde_json::to_string(&summary)?
    };
    println!("{}", json);
    Ok(())
}
