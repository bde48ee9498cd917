use blockseq::command::{
    CommandManager, EditorState, InsertBlockCommand, JoinBlocksCommand, MoveBlockCommand,
    SetBlockLengthCommand,
};
use blockseq::transport::{
    ClockControl, ClockEvent, CollaboratorUnavailable, SamplerSink, TransportAck, TransportError,
};
use blockseq::{EngineConfig, Event, EventList, Tempo, Tick, create_session};
use std::path::PathBuf;
use std::process::ExitCode;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Frames the simulated clock advances per period
const PERIOD_FRAMES: u64 = 1024;

/// Sampler stand-in that logs what it receives
struct LoggingSampler;

impl SamplerSink for LoggingSampler {
    fn note_on(&mut self, pitch: u8, velocity: u8, at: Tick) -> Result<(), CollaboratorUnavailable> {
        info!(pitch, velocity, at = %at, "note on");
        Ok(())
    }

    fn note_off(&mut self, pitch: u8, at: Tick) -> Result<(), CollaboratorUnavailable> {
        info!(pitch, at = %at, "note off");
        Ok(())
    }

    fn bend(&mut self, value: i16, at: Tick) -> Result<(), CollaboratorUnavailable> {
        info!(value, at = %at, "bend");
        Ok(())
    }
}

/// Frame-counting clock standing in for the audio server
struct SimulatedClock {
    tempo: Tempo,
    sample_rate: f64,
    frames: u64,
    running: bool,
    acks: Vec<TransportAck>,
}

impl SimulatedClock {
    fn new(tempo: Tempo, sample_rate: f64) -> Self {
        Self {
            tempo,
            sample_rate,
            frames: 0,
            running: false,
            acks: Vec::new(),
        }
    }

    /// Events produced by one audio period
    fn period(&mut self) -> Vec<ClockEvent> {
        let mut events: Vec<ClockEvent> = self.acks.drain(..).map(ClockEvent::Ack).collect();
        if self.running {
            self.frames += PERIOD_FRAMES;
            events.push(ClockEvent::from_frames(self.frames, &self.tempo, self.sample_rate));
        }
        events
    }
}

impl ClockControl for SimulatedClock {
    fn start(&mut self) -> Result<(), TransportError> {
        self.running = true;
        self.acks.push(TransportAck::Started);
        Ok(())
    }

    fn stop(&mut self) -> Result<(), TransportError> {
        self.running = false;
        self.acks.push(TransportAck::Stopped);
        Ok(())
    }

    fn locate(&mut self, position: Tick) -> Result<(), TransportError> {
        self.frames = self.tempo.frames_from_ticks(position, self.sample_rate);
        self.acks.push(TransportAck::Located(position));
        Ok(())
    }
}

fn phrase(pitches: &[u8], step: u64) -> EventList {
    let mut builder = EventList::builder();
    for (i, pitch) in pitches.iter().enumerate() {
        let at = step * i as u64;
        builder
            .push(Event::note_on(at, *pitch, 100))
            .push(Event::note_off(at + step / 2, *pitch));
    }
    builder.with_length(Tick(step * pitches.len() as u64));
    builder.finish().unwrap_or_default()
}

fn load_config() -> EngineConfig {
    match std::env::args().nth(1).map(PathBuf::from) {
        Some(path) => EngineConfig::load(&path).unwrap_or_else(|e| {
            error!(path = %path.display(), error = %e, "config not loaded, using defaults");
            EngineConfig::default()
        }),
        None => EngineConfig::load_or_default(),
    }
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = load_config();
    let tempo = config.transport.tempo().unwrap_or_default();
    info!(tempo = %tempo, sample_rate = config.transport.sample_rate, "blockseq starting");

    // Arrangement: two phrases on lane 0, a bass line on lane 1
    let mut state = EditorState::new(&config);
    let mut history = CommandManager::from_config(&config.history);
    let quarter = Tick::PER_QUARTER;
    let edits: Vec<Box<dyn blockseq::UndoableCommand>> = vec![
        Box::new(InsertBlockCommand::new(0, Tick::ZERO, phrase(&[60, 64, 67, 72], quarter))),
        Box::new(InsertBlockCommand::new(0, Tick::quarters(4), phrase(&[71, 67, 64, 62], quarter))),
        Box::new(InsertBlockCommand::new(1, Tick::quarters(1), phrase(&[36, 43], quarter * 2))),
    ];
    for edit in edits {
        if let Err(e) = history.execute(edit, &mut state) {
            error!(error = %e, "edit failed");
            return ExitCode::FAILURE;
        }
    }

    let lane0: Vec<_> = state.timeline.lane_blocks(0).map(|b| b.id()).collect();
    if let Err(e) = history.execute(Box::new(JoinBlocksCommand::new(lane0)), &mut state) {
        error!(error = %e, "join failed");
        return ExitCode::FAILURE;
    }

    // The bass line loops twice
    let bass = state.timeline.lane_blocks(1).next().map(|b| (b.id(), b.duration()));
    if let Some((bass, length)) = bass {
        let edit = SetBlockLengthCommand::new(bass, Some(length + length));
        if let Err(e) = history.execute(Box::new(edit), &mut state) {
            error!(error = %e, "resize failed");
            return ExitCode::FAILURE;
        }
    }

    let laid_out = state.layout.flush(&state.timeline);
    info!(laid_out, blocks = state.timeline.block_count(), "arrangement ready");
    let ids: Vec<_> = state.timeline.blocks().map(|b| b.id()).collect();
    for id in ids {
        if let Ok(rect) = state.layout.bounds(&state.timeline, id) {
            println!(
                "block {id}: x={:.1} y={:.1} w={:.1} h={:.1}",
                rect.x, rect.y, rect.width, rect.height
            );
        }
    }

    // Playback on its own thread, fed by the simulated clock
    let clock = SimulatedClock::new(tempo, config.transport.sample_rate);
    let (mut sync, mut controller) =
        create_session(state.timeline.reader(), LoggingSampler, clock, &config.transport);
    let session_end = state.timeline.duration();

    let player = thread::spawn(move || {
        loop {
            for event in sync.clock_mut().period() {
                sync.on_clock_event(event);
            }
            sync.process_commands();
            if sync.state().status.is_stopped() && sync.dispatched_count() > 0 {
                break;
            }
            thread::sleep(Duration::from_millis(1));
        }
        sync.dispatched_count()
    });

    if let Err(e) = controller.play() {
        error!(error = %e, "play failed");
        return ExitCode::FAILURE;
    }

    // Edits while playing reach the player through the next snapshot
    let bass = state.timeline.lane_blocks(1).next().map(|b| b.id());
    if let Some(bass) = bass {
        let edit = MoveBlockCommand::snapped(bass, Tick::quarters(2), config.editing.snap_window());
        if let Err(e) = history.execute(Box::new(edit), &mut state) {
            error!(error = %e, "move failed");
        }
        state.frame(Instant::now() + config.layout.frame_interval());
    }

    while controller.position() < session_end {
        thread::sleep(Duration::from_millis(1));
    }
    if let Err(e) = controller.stop() {
        error!(error = %e, "stop failed");
    }

    let dispatched = match player.join() {
        Ok(count) => count,
        Err(_) => {
            error!("playback thread panicked");
            return ExitCode::FAILURE;
        }
    };
    for notification in controller.drain_notifications() {
        println!("{notification}");
    }
    info!(dispatched, undo = ?history.undo_description(), "blockseq finished");
    ExitCode::SUCCESS
}
