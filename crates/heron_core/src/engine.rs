//! EQ Engine - Main Entry Point
//!
//! The engine wires the real-time core together and runs the control
//! thread that keeps it fed.
//!
//! # Architecture
//!
//! ```text
//!  UI / host ──params──▶ SharedParameters
//!      │                      │ version
//!      │ commands             ▼
//!      └──────────▶  control thread ("heron-analyzer")
//!                     │  design coefficients ──rtrb──▶ AudioCallback
//!                     │                                   │ process
//!                     │  FifoConsumer ◀──sample FIFO──────┘ (post-filter taps)
//!                     │  SpectralPathGenerator x2
//!                     │  ResponseCurveEngine ──▶ latest overlays / events
//! ```
//!
//! The [`AudioCallback`] half is handed to whatever drives audio. It only
//! touches lock-free structures; all design, FFT and logging work happens
//! on the control thread.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, unbounded, Receiver, RecvTimeoutError, Sender};
use parking_lot::Mutex;
use tracing::{debug, error, info, warn};

use crate::config::EngineConfig;
use crate::error::{EngineError, EngineResult};
use crate::message::{Command, Event};
use crate::params::{Parameter, SharedParameters};
use heron_dsp::{
    coefficient_mailbox, find_preset, sample_fifo, AnalysisArea, AnalyzerTaps, AudioProcessor, ChainSettings,
    ChainUpdate, CoefficientSender, DualChannelProcessor, FifoConsumer, Overlays, ProcessContext,
    ResponseCurveEngine, SettingsSource, SpectralPathGenerator,
};

/// Stream format published by the audio side on `prepare`
struct StreamState {
    sample_rate_bits: AtomicU32,
    block_size: AtomicUsize,
    /// Bumped on every `prepare`
    generation: AtomicU64,
}

impl StreamState {
    fn new(sample_rate: f32, block_size: usize) -> Self {
        Self {
            sample_rate_bits: AtomicU32::new(sample_rate.to_bits()),
            block_size: AtomicUsize::new(block_size),
            generation: AtomicU64::new(0),
        }
    }

    fn publish(&self, sample_rate: f32, block_size: usize) {
        self.sample_rate_bits.store(sample_rate.to_bits(), Ordering::Relaxed);
        self.block_size.store(block_size, Ordering::Relaxed);
        self.generation.fetch_add(1, Ordering::Release);
    }

    fn sample_rate(&self) -> f32 {
        f32::from_bits(self.sample_rate_bits.load(Ordering::Relaxed))
    }

    fn block_size(&self) -> usize {
        self.block_size.load(Ordering::Relaxed)
    }

    fn generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }
}

/// Audio-thread half of the engine
///
/// Owns the [`DualChannelProcessor`]. Call `prepare` before the first block
/// and whenever the stream format changes.
pub struct AudioCallback {
    processor: DualChannelProcessor,
    stream: Arc<StreamState>,
}

impl AudioCallback {
    /// Host lifecycle: new sample rate / block size
    ///
    /// Not real-time safe; call it outside the audio callback.
    pub fn prepare(&mut self, sample_rate: f32, block_size: usize) -> EngineResult<()> {
        self.processor.prepare(sample_rate, block_size)?;
        self.stream.publish(sample_rate, block_size);
        Ok(())
    }

    /// Clear filter state without changing the format
    pub fn reset(&mut self) {
        self.processor.reset();
    }

    #[inline]
    pub fn process_planar(&mut self, left: &mut [f32], right: &mut [f32]) {
        self.processor.process_planar(left, right);
    }

    #[inline]
    pub fn process_interleaved(&mut self, buffer: &mut [f32], channels: usize) {
        self.processor.process_interleaved(buffer, channels);
    }

    pub fn sample_rate(&self) -> f32 {
        self.processor.sample_rate()
    }

    /// Settings behind the coefficients the audio thread is running
    pub fn settings(&self) -> &ChainSettings {
        self.processor.settings()
    }

    pub fn processor(&self) -> &DualChannelProcessor {
        &self.processor
    }
}

impl AudioProcessor for AudioCallback {
    fn process(&mut self, buffer: &mut [f32], context: &ProcessContext) {
        self.processor.process_interleaved(buffer, context.channels);
    }

    fn reset(&mut self) {
        self.processor.reset();
    }

    fn name(&self) -> &'static str {
        "Heron EQ"
    }

    fn is_enabled(&self) -> bool {
        AudioProcessor::is_enabled(&self.processor)
    }
}

/// The main engine controller
///
/// This struct lives on the UI/main thread and communicates with the
/// control thread via channels and the shared parameter store.
pub struct EqEngine {
    /// Channel for sending commands to the control thread
    command_sender: Sender<Command>,

    /// Channel for receiving events from the control thread
    event_receiver: Receiver<Event>,

    /// Handle to the control thread
    control_thread: Option<JoinHandle<()>>,

    /// Flag to signal shutdown
    shutdown_flag: Arc<AtomicBool>,

    params: Arc<SharedParameters>,

    overlays: Arc<Mutex<Overlays>>,

    config: EngineConfig,
}

impl EqEngine {
    /// Create an engine with default configuration
    pub fn new() -> EngineResult<(Self, AudioCallback)> {
        Self::with_config(EngineConfig::default())
    }

    /// Create an engine and the audio callback it controls
    pub fn with_config(config: EngineConfig) -> EngineResult<(Self, AudioCallback)> {
        config.validate().map_err(EngineError::ConfigError)?;

        let sample_rate = config.stream.sample_rate as f32;
        let block_size = config.stream.block_size as usize;
        let analyzer = &config.analyzer;

        let params = Arc::new(SharedParameters::default());
        let stream = Arc::new(StreamState::new(sample_rate, block_size));
        let overlays = Arc::new(Mutex::new(Overlays::default()));

        // Audio side
        let (coefficient_sender, coefficient_receiver) = coefficient_mailbox(config.mailbox_capacity);
        let (left_tx, left_rx) = sample_fifo(analyzer.fifo_capacity, analyzer.fifo_block_size)?;
        let (right_tx, right_rx) = sample_fifo(analyzer.fifo_capacity, analyzer.fifo_block_size)?;

        let mut processor = DualChannelProcessor::new(sample_rate)?;
        processor.prepare(sample_rate, block_size)?;
        processor.update(&params.chain_settings());
        processor.attach_mailbox(coefficient_receiver);
        processor.attach_analyzer(AnalyzerTaps::new(left_tx, right_tx, params.analyzer_flag()));

        // Control side
        let left = SpectralPathGenerator::new(analyzer.fft_order, analyzer.floor_db, analyzer.path_queue_capacity)?;
        let right = SpectralPathGenerator::new(analyzer.fft_order, analyzer.floor_db, analyzer.path_queue_capacity)?;
        let mut response = ResponseCurveEngine::new(sample_rate)?;
        response.attach_spectra(left.path_queue(), right.path_queue());

        let (command_sender, command_receiver) = bounded::<Command>(32);
        let (event_sender, event_receiver) = unbounded::<Event>();
        let shutdown_flag = Arc::new(AtomicBool::new(false));

        let mut control = ControlLoop {
            params: Arc::clone(&params),
            stream: Arc::clone(&stream),
            overlays: Arc::clone(&overlays),
            events: event_sender,
            coefficients: coefficient_sender,
            left_fifo: left_rx,
            right_fifo: right_rx,
            left,
            right,
            response,
            area: config.display.area()?,
            sample_rate,
            seen_version: None,
            seen_generation: stream.generation(),
            analyzer_enabled: params.chain_settings().analyzer_enabled,
            overruns: (0, 0),
            frame: 0,
        };

        let shutdown_clone = Arc::clone(&shutdown_flag);
        let interval = config.analyzer.refresh_interval();

        let control_thread = thread::Builder::new()
            .name("heron-analyzer".into())
            .spawn(move || control.run(command_receiver, shutdown_clone, interval))
            .map_err(|e| EngineError::ThreadSpawn(e.to_string()))?;

        info!(
            sample_rate,
            block_size,
            fft_size = config.analyzer.fft_order.size(),
            "EQ engine created"
        );

        let engine = Self {
            command_sender,
            event_receiver,
            control_thread: Some(control_thread),
            shutdown_flag,
            params,
            overlays,
            config,
        };
        Ok((engine, AudioCallback { processor, stream }))
    }

    /// Shared parameter store (for hosts that automate parameters directly)
    pub fn parameters(&self) -> Arc<SharedParameters> {
        Arc::clone(&self.params)
    }

    pub fn set_parameter(&self, param: Parameter, value: f32) {
        self.params.set(param, value);
    }

    pub fn settings(&self) -> ChainSettings {
        self.params.chain_settings()
    }

    pub fn apply_settings(&self, settings: &ChainSettings) {
        self.params.store(settings);
    }

    /// Apply a built-in preset by name (case-insensitive)
    ///
    /// The analyzer switch is left as it is.
    pub fn load_preset(&self, name: &str) -> EngineResult<()> {
        let preset = find_preset(name).ok_or_else(|| EngineError::UnknownPreset(name.to_string()))?;
        let settings = ChainSettings {
            analyzer_enabled: self.params.chain_settings().analyzer_enabled,
            ..preset.settings
        };
        self.params.store(&settings);
        Ok(())
    }

    pub fn set_analyzer_enabled(&self, enabled: bool) {
        self.params
            .set(Parameter::AnalyzerEnabled, if enabled { 1.0 } else { 0.0 });
    }

    /// Change the analysis area size
    pub fn resize(&self, width: usize, height: f32) -> EngineResult<()> {
        self.send_command(Command::Resize { width, height })
    }

    /// Request an `Event::Overlays` snapshot
    pub fn request_overlays(&self) -> EngineResult<()> {
        self.send_command(Command::RequestOverlays)
    }

    /// Newest response curve and spectral paths (pull accessor for renderers)
    pub fn latest_overlays(&self) -> Overlays {
        self.overlays.lock().clone()
    }

    /// Get next event (non-blocking)
    pub fn poll_event(&self) -> Option<Event> {
        self.event_receiver.try_recv().ok()
    }

    /// Get next event (blocking)
    pub fn wait_event(&self) -> Option<Event> {
        self.event_receiver.recv().ok()
    }

    /// Get next event, giving up after `timeout`
    pub fn wait_event_timeout(&self, timeout: Duration) -> Option<Event> {
        self.event_receiver.recv_timeout(timeout).ok()
    }

    /// Get current configuration
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Send command to the control thread
    fn send_command(&self, command: Command) -> EngineResult<()> {
        self.command_sender
            .send(command)
            .map_err(|_| EngineError::ChannelSendError)
    }
}

impl Drop for EqEngine {
    fn drop(&mut self) {
        // Signal shutdown
        self.shutdown_flag.store(true, Ordering::SeqCst);

        // Send shutdown command
        let _ = self.command_sender.send(Command::Shutdown);

        // Wait for control thread to finish
        if let Some(handle) = self.control_thread.take() {
            let _ = handle.join();
        }
    }
}

/// State owned by the control thread
struct ControlLoop {
    params: Arc<SharedParameters>,
    stream: Arc<StreamState>,
    overlays: Arc<Mutex<Overlays>>,
    events: Sender<Event>,
    coefficients: CoefficientSender,
    left_fifo: FifoConsumer,
    right_fifo: FifoConsumer,
    left: SpectralPathGenerator,
    right: SpectralPathGenerator,
    response: ResponseCurveEngine,
    area: AnalysisArea,
    sample_rate: f32,
    /// Parameter version of the last design; `None` forces a redesign
    seen_version: Option<u64>,
    seen_generation: u64,
    analyzer_enabled: bool,
    overruns: (u64, u64),
    frame: u64,
}

impl ControlLoop {
    fn run(&mut self, commands: Receiver<Command>, shutdown_flag: Arc<AtomicBool>, interval: Duration) {
        info!("Control thread started");

        let mut last_tick = Instant::now();
        self.tick();

        while !shutdown_flag.load(Ordering::SeqCst) {
            let timeout = interval.saturating_sub(last_tick.elapsed());
            match commands.recv_timeout(timeout) {
                Ok(Command::Shutdown) => {
                    info!("Shutdown command received");
                    shutdown_flag.store(true, Ordering::SeqCst);
                    break;
                }
                Ok(command) => self.handle(command),
                Err(RecvTimeoutError::Timeout) => {}
                Err(RecvTimeoutError::Disconnected) => {
                    warn!("Command channel disconnected");
                    break;
                }
            }

            if last_tick.elapsed() >= interval {
                last_tick = Instant::now();
                self.tick();
            }
        }

        info!("Control thread shutting down");
    }

    fn emit(&self, event: Event) {
        // Unbounded: only fails once the engine handle is gone
        let _ = self.events.try_send(event);
    }

    fn handle(&mut self, command: Command) {
        match command {
            Command::Resize { width, height } => match AnalysisArea::new(width, height) {
                Ok(area) => {
                    debug!(width, height, "Analysis area resized");
                    self.area = area;
                    // Paths built for the old area must not be served again
                    self.response.clear_spectra();
                    if self.analyzer_enabled {
                        self.left.republish(&self.area, self.sample_rate);
                        self.right.republish(&self.area, self.sample_rate);
                    }
                    self.publish_overlays();
                }
                Err(e) => {
                    warn!("Rejected resize: {}", e);
                    self.emit(Event::error(e));
                }
            },
            Command::RequestOverlays => {
                let overlays = self.overlays.lock().clone();
                self.emit(Event::Overlays(overlays));
            }
            Command::Shutdown => {}
        }
    }

    /// One refresh: follow format and parameter changes, drain the
    /// analyzer FIFOs, and republish the overlays if anything moved
    fn tick(&mut self) {
        let mut changed = self.follow_stream_format();
        changed |= self.follow_parameters();

        if self.analyzer_enabled {
            let drained = self.left.drain(&mut self.left_fifo, &self.area, self.sample_rate)
                + self.right.drain(&mut self.right_fifo, &self.area, self.sample_rate);
            changed |= drained > 0;
        }

        self.report_overruns();

        if changed {
            self.publish_overlays();
        }
    }

    fn follow_stream_format(&mut self) -> bool {
        let generation = self.stream.generation();
        if generation == self.seen_generation {
            return false;
        }
        self.seen_generation = generation;

        let sample_rate = self.stream.sample_rate();
        let block_size = self.stream.block_size();
        info!(sample_rate, block_size, "Stream prepared");

        self.sample_rate = sample_rate;
        // Audio captured at the old rate is meaningless at the new one
        self.clear_analyzer();
        self.seen_version = None;
        self.emit(Event::Prepared { sample_rate, block_size });
        true
    }

    fn follow_parameters(&mut self) -> bool {
        let version = self.params.version();
        if self.seen_version == Some(version) {
            if self.coefficients.has_pending() && self.coefficients.flush() {
                debug!("Parked coefficient update delivered");
            }
            return false;
        }
        self.seen_version = Some(version);

        let settings = self.params.chain_settings();
        let update = ChainUpdate::from_settings(&settings, self.sample_rate);

        if self.coefficients.is_abandoned() {
            error!("Audio callback dropped; coefficient update not delivered");
            self.emit(Event::error("audio callback dropped"));
        } else if !self.coefficients.send(update) {
            debug!("Coefficient mailbox full, update parked");
        }
        self.response.update(&update);
        debug!(version, "Coefficients updated");
        self.emit(Event::CoefficientsUpdated { version });

        if settings.analyzer_enabled != self.analyzer_enabled {
            self.analyzer_enabled = settings.analyzer_enabled;
            info!(enabled = self.analyzer_enabled, "Analyzer toggled");
            if !self.analyzer_enabled {
                self.clear_analyzer();
            }
            self.emit(Event::AnalyzerToggled {
                enabled: self.analyzer_enabled,
            });
        }
        true
    }

    fn clear_analyzer(&mut self) {
        self.left_fifo.clear();
        self.right_fifo.clear();
        self.left.reset();
        self.right.reset();
        self.response.clear_spectra();
    }

    fn report_overruns(&mut self) {
        let totals = (self.left_fifo.overruns(), self.right_fifo.overruns());
        if totals != self.overruns {
            warn!(left = totals.0, right = totals.1, "Analyzer FIFO overrun");
            self.overruns = totals;
            self.emit(Event::FifoOverrun {
                left: totals.0,
                right: totals.1,
            });
        }
    }

    fn publish_overlays(&mut self) {
        let overlays = self.response.refresh(&self.area, self.analyzer_enabled);
        *self.overlays.lock() = overlays;
        self.frame += 1;
        self.emit(Event::OverlaysUpdated { frame: self.frame });
    }
}
