// TransportSync - Playback actor bridging the audio clock to the sampler
//
// Runs on the real-time side. It reads the Timeline only through published
// snapshots, never blocks, and turns collaborator failures into a clean stop
// plus a notification instead of an error crossing the dispatch path.

use crate::connection::status::{CollaboratorLinks, CollaboratorStatus};
use crate::messaging::channels::{CommandConsumer, NotificationProducer};
use crate::messaging::command::TransportCommand;
use crate::messaging::notification::{Notification, NotificationCategory};
use crate::sequencer::block::{BlockId, LaneId};
use crate::sequencer::event::{EventKind, MIDI_DATA_MAX};
use crate::sequencer::time::{Tick, TimeRange};
use crate::sequencer::timeline::TimelineReader;
use crate::transport::contracts::{ClockControl, ClockEvent, SamplerSink, TransportAck};
use crate::transport::error::{CollaboratorUnavailable, TransportError};
use crate::transport::state::{SharedTransportState, TransportState, TransportStatus};
use std::fmt::Display;
use std::sync::Arc;
use tracing::{debug, trace, warn};

/// An event resolved for dispatch, with its sort keys
#[derive(Debug, Clone, Copy)]
struct DueEvent {
    time: Tick,
    lane: LaneId,
    block_start: Tick,
    block: BlockId,
    index: usize,
    kind: EventKind,
}

pub struct TransportSync<S: SamplerSink, C: ClockControl> {
    reader: TimelineReader,
    sampler: S,
    clock: C,
    state: TransportState,
    /// Start of the next dispatch range; everything before it has been
    /// dispatched or given up on
    last_position: Tick,
    /// NoteOn count per pitch not yet matched by a NoteOff
    sounding: [u16; MIDI_DATA_MAX as usize + 1],
    /// Locate requested from the clock and not yet acknowledged
    awaiting_locate: Option<Tick>,
    shared: Arc<SharedTransportState>,
    links: CollaboratorLinks,
    commands: Option<CommandConsumer>,
    notifications: Option<NotificationProducer>,
    /// Reused between ticks
    due: Vec<DueEvent>,
    dispatched: u64,
}

impl<S: SamplerSink, C: ClockControl> TransportSync<S, C> {
    pub fn new(reader: TimelineReader, sampler: S, clock: C) -> Self {
        Self {
            reader,
            sampler,
            clock,
            state: TransportState::default(),
            last_position: Tick::ZERO,
            sounding: [0; MIDI_DATA_MAX as usize + 1],
            awaiting_locate: None,
            shared: SharedTransportState::new(),
            links: CollaboratorLinks::default(),
            commands: None,
            notifications: None,
            due: Vec::with_capacity(256),
            dispatched: 0,
        }
    }

    /// Attach the command and notification channels
    pub fn with_channels(
        mut self,
        commands: CommandConsumer,
        notifications: NotificationProducer,
    ) -> Self {
        self.commands = Some(commands);
        self.notifications = Some(notifications);
        self
    }

    /// Share state and link status with the editing side
    pub fn with_shared(mut self, shared: Arc<SharedTransportState>, links: CollaboratorLinks) -> Self {
        self.shared = shared;
        self.links = links;
        self.shared.publish(&self.state);
        self
    }

    pub fn state(&self) -> &TransportState {
        &self.state
    }

    pub fn last_position(&self) -> Tick {
        self.last_position
    }

    pub fn is_awaiting_locate(&self) -> bool {
        self.awaiting_locate.is_some()
    }

    /// Pitches with an unmatched NoteOn
    pub fn sounding_notes(&self) -> impl Iterator<Item = u8> + '_ {
        self.sounding
            .iter()
            .enumerate()
            .filter(|(_, count)| **count > 0)
            .map(|(pitch, _)| pitch as u8)
    }

    /// Events handed to the sampler since creation
    pub fn dispatched_count(&self) -> u64 {
        self.dispatched
    }

    pub fn sampler(&self) -> &S {
        &self.sampler
    }

    pub fn sampler_mut(&mut self) -> &mut S {
        &mut self.sampler
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    pub fn clock_mut(&mut self) -> &mut C {
        &mut self.clock
    }

    /// Start or resume playback from the current position
    pub fn play(&mut self) {
        if self.state.is_playing() {
            return;
        }
        if let Err(e) = self.clock.start() {
            self.clock_lost(e);
            return;
        }
        if self.links.clock.update(CollaboratorStatus::Connected) != CollaboratorStatus::Connected {
            debug!("audio clock available");
        }

        self.last_position = self.state.position;
        self.state.status = TransportStatus::Playing;
        self.shared.publish(&self.state);
        debug!(position = %self.state.position, "transport playing");
    }

    /// Hold the playhead; sounding notes are released
    pub fn pause(&mut self) {
        if !self.state.is_playing() {
            return;
        }
        self.flush_notes();
        self.state.status = TransportStatus::Paused;
        self.shared.publish(&self.state);
        if let Err(e) = self.clock.stop() {
            self.clock_lost(e);
            return;
        }
        debug!(position = %self.state.position, "transport paused");
    }

    /// Stop and rewind to the session start. The loop region is kept.
    pub fn stop(&mut self) {
        self.flush_notes();
        self.state.reset();
        self.last_position = Tick::ZERO;
        self.awaiting_locate = None;
        self.shared.publish(&self.state);

        let rewind = self.clock.stop().and_then(|_| self.clock.locate(Tick::ZERO));
        match rewind {
            Ok(()) => self.awaiting_locate = Some(Tick::ZERO),
            Err(e) => self.clock_lost(e),
        }
        debug!("transport stopped");
    }

    /// Jump to `position` without dispatching the skipped range
    pub fn seek(&mut self, position: Tick) {
        self.flush_notes();
        self.state.position = position;
        self.last_position = position;
        self.shared.publish(&self.state);

        match self.clock.locate(position) {
            Ok(()) => self.awaiting_locate = Some(position),
            Err(e) => self.clock_lost(e),
        }
        debug!(position = %position, "transport seek");
    }

    /// Set or clear the loop region. Empty regions clear it.
    pub fn set_loop(&mut self, region: Option<TimeRange>) {
        self.state.loop_region = region.filter(|r| !r.is_empty());
        self.shared.publish(&self.state);
        debug!(region = ?self.state.loop_region, "loop region set");
    }

    /// Apply every queued command
    pub fn process_commands(&mut self) {
        let Some(mut commands) = self.commands.take() else {
            return;
        };
        while let Some(command) = ringbuf::traits::Consumer::try_pop(&mut commands) {
            self.apply(command);
        }
        self.commands = Some(commands);
    }

    pub fn apply(&mut self, command: TransportCommand) {
        match command {
            TransportCommand::Play => self.play(),
            TransportCommand::Pause => self.pause(),
            TransportCommand::Stop => self.stop(),
            TransportCommand::Seek(position) => self.seek(position),
            TransportCommand::SetLoop(region) => self.set_loop(region),
        }
    }

    /// Entry point for everything the audio server sends.
    /// Pending commands are applied before the event.
    pub fn on_clock_event(&mut self, event: ClockEvent) {
        self.process_commands();
        match event {
            ClockEvent::Tick(position) => self.on_tick(position),
            ClockEvent::Ack(ack) => self.on_ack(ack),
            ClockEvent::Disconnected => self.clock_lost(TransportError::ClockDisconnected),
        }
    }

    /// Release every sounding note. Returns the number of pitches released.
    pub fn flush_notes(&mut self) -> usize {
        let at = self.state.position;
        let mut released = 0;
        for pitch in 0..=MIDI_DATA_MAX {
            let count = &mut self.sounding[pitch as usize];
            if *count == 0 {
                continue;
            }
            *count = 0;
            released += 1;
            if let Err(e) = self.sampler.note_off(pitch, at) {
                trace!(pitch, error = %e, "note off flush not delivered");
            }
        }
        if released > 0 {
            debug!(notes = released, "all notes off");
        }
        released
    }

    fn on_tick(&mut self, position: Tick) {
        if !self.state.is_playing() {
            return;
        }
        if let Some(target) = self.awaiting_locate {
            trace!(position = %position, target = %target, "tick ignored until locate is acknowledged");
            return;
        }
        // Jitter or a stale tick; that range is already dispatched
        if position <= self.last_position {
            return;
        }

        match self.state.loop_region {
            Some(region) if self.last_position < region.end && position >= region.end => {
                self.wrap(region, position)
            }
            _ => {
                // Advance even when the sampler fails partway, so a later
                // play never resends the events already delivered
                self.dispatch(TimeRange::new(self.last_position, position));
                self.advance_to(position);
            }
        }
    }

    /// Finish the pass up to the loop end, then continue from the loop start
    fn wrap(&mut self, region: TimeRange, position: Tick) {
        let delivered = self.dispatch(TimeRange::new(self.last_position, region.end));
        self.advance_to(region.end);
        if !delivered {
            return;
        }
        self.flush_notes();

        let overshoot = (position - region.end).0 % region.length().0.max(1);
        let target = region.start + Tick(overshoot);
        let delivered = self.dispatch(TimeRange::new(region.start, target));
        self.advance_to(target);
        if !delivered {
            return;
        }

        match self.clock.locate(target) {
            Ok(()) => self.awaiting_locate = Some(target),
            Err(e) => self.clock_lost(e),
        }
        trace!(target = %target, "loop wrapped");
    }

    fn advance_to(&mut self, position: Tick) {
        self.last_position = position;
        self.state.position = position;
        self.shared.set_position(position);
    }

    fn on_ack(&mut self, ack: TransportAck) {
        match ack {
            TransportAck::Located(position) => {
                let Some(target) = self.awaiting_locate.take() else {
                    return;
                };
                // The clock is authoritative if it landed elsewhere
                if position != target {
                    self.advance_to(position);
                }
                trace!(position = %position, "locate acknowledged");
            }
            TransportAck::Started | TransportAck::Stopped => {
                trace!(ack = ?ack, "clock acknowledged");
            }
        }
    }

    /// Send every event in `range` in timestamp order.
    /// Returns false when the sampler failed and playback was halted; the
    /// rest of the range is then dropped, never retried.
    fn dispatch(&mut self, range: TimeRange) -> bool {
        if range.is_empty() {
            return true;
        }

        let snapshot = self.reader.snapshot();
        let mut due = std::mem::take(&mut self.due);
        due.clear();

        // A block's last event sits on its end boundary, so also look at
        // blocks ending exactly at range.start
        let query = TimeRange::new(range.start.saturating_sub(Tick(1)), range.end);
        for lane in snapshot.lanes() {
            for block in snapshot.blocks_overlapping(lane, query) {
                let local = TimeRange::new(
                    range.start.saturating_sub(block.start()),
                    range.end.saturating_sub(block.start()),
                );
                for (index, event) in block.rendered().events_in(local).iter().enumerate() {
                    due.push(DueEvent {
                        time: block.start() + event.time,
                        lane,
                        block_start: block.start(),
                        block: block.id(),
                        index,
                        kind: event.kind,
                    });
                }
            }
        }
        due.sort_unstable_by_key(|e| (e.time, e.lane, e.block_start, e.block, e.index));

        let mut delivered = true;
        for event in &due {
            if let Err(e) = self.send(event) {
                self.sampler_lost(e);
                delivered = false;
                break;
            }
        }
        if delivered
            && !due.is_empty()
            && self.links.sampler.update(CollaboratorStatus::Connected) != CollaboratorStatus::Connected
        {
            debug!("sampler available");
        }

        self.due = due;
        delivered
    }

    fn send(&mut self, event: &DueEvent) -> Result<(), CollaboratorUnavailable> {
        match event.kind {
            EventKind::NoteOn { pitch, velocity } => {
                self.sampler.note_on(pitch, velocity, event.time)?;
                if let Some(count) = self.sounding.get_mut(pitch as usize) {
                    *count = count.saturating_add(1);
                }
            }
            EventKind::NoteOff { pitch } => {
                self.sampler.note_off(pitch, event.time)?;
                if let Some(count) = self.sounding.get_mut(pitch as usize) {
                    *count = count.saturating_sub(1);
                }
            }
            EventKind::Bend { value } => self.sampler.bend(value, event.time)?,
            EventKind::Pressure { value } => self.sampler.pressure(value, event.time)?,
        }
        self.dispatched += 1;
        Ok(())
    }

    fn clock_lost(&mut self, error: TransportError) {
        let status = match error {
            TransportError::ClockDisconnected => CollaboratorStatus::Disconnected,
            TransportError::CommandQueueFull => CollaboratorStatus::Error,
        };
        self.links.clock.set(status);
        self.halt(NotificationCategory::Clock, &error);
    }

    fn sampler_lost(&mut self, error: CollaboratorUnavailable) {
        self.links.sampler.set(CollaboratorStatus::Error);
        self.halt(NotificationCategory::Sampler, &error);
    }

    /// Stop after a collaborator failure: flush, report, never panic
    fn halt(&mut self, category: NotificationCategory, reason: &impl Display) {
        self.flush_notes();
        self.state.status = TransportStatus::Stopped;
        self.awaiting_locate = None;
        self.shared.publish(&self.state);
        warn!(reason = %reason, position = %self.state.position, "playback stopped");

        if let Some(notifications) = self.notifications.as_mut() {
            let notification =
                Notification::playback_stopped(category, self.state.position, reason);
            if ringbuf::traits::Producer::try_push(notifications, notification).is_err() {
                trace!("notification queue full");
            }
        }
    }
}
