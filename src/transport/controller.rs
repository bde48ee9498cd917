// Transport controller - Editing-side handle on the playback actor
// Sends commands over the SPSC queue, reads the mirrored state back, and
// owns the navigation helpers (marks, skip, cycling).

use crate::connection::status::CollaboratorLinks;
use crate::messaging::channels::{CommandProducer, NotificationConsumer};
use crate::messaging::command::TransportCommand;
use crate::messaging::notification::Notification;
use crate::sequencer::markers::MarkerList;
use crate::sequencer::time::{Tick, TimeRange};
use crate::transport::error::TransportError;
use crate::transport::state::{SharedTransportState, TransportState, TransportStatus};
use std::sync::Arc;
use tracing::debug;

pub struct TransportController {
    commands: CommandProducer,
    notifications: NotificationConsumer,
    shared: Arc<SharedTransportState>,
    links: CollaboratorLinks,
    markers: MarkerList,
    skip_delta: Tick,
    cycling: bool,
    /// Loop set explicitly; otherwise cycling loops between marks
    explicit_loop: Option<TimeRange>,
}

impl TransportController {
    pub fn new(
        commands: CommandProducer,
        notifications: NotificationConsumer,
        shared: Arc<SharedTransportState>,
        links: CollaboratorLinks,
        skip_delta: Tick,
    ) -> Self {
        Self {
            commands,
            notifications,
            shared,
            links,
            markers: MarkerList::new(),
            skip_delta,
            cycling: false,
            explicit_loop: None,
        }
    }

    pub fn play(&mut self) -> Result<(), TransportError> {
        if self.cycling {
            self.send(TransportCommand::SetLoop(self.cycle_region(self.position())))?;
        }
        self.send(TransportCommand::Play)
    }

    pub fn pause(&mut self) -> Result<(), TransportError> {
        self.send(TransportCommand::Pause)
    }

    pub fn stop(&mut self) -> Result<(), TransportError> {
        self.send(TransportCommand::Stop)
    }

    pub fn toggle_play(&mut self) -> Result<(), TransportError> {
        if self.status().is_playing() {
            self.pause()
        } else {
            self.play()
        }
    }

    pub fn seek(&mut self, position: Tick) -> Result<(), TransportError> {
        self.send(TransportCommand::Seek(position))?;
        if self.cycling && self.explicit_loop.is_none() {
            // Loop follows the marks around the new position
            self.send(TransportCommand::SetLoop(self.cycle_region(position)))?;
        }
        Ok(())
    }

    pub fn skip_back(&mut self) -> Result<(), TransportError> {
        self.seek(self.position().saturating_sub(self.skip_delta))
    }

    pub fn skip_forward(&mut self) -> Result<(), TransportError> {
        self.seek(self.position() + self.skip_delta)
    }

    pub fn set_skip_delta(&mut self, delta: Tick) {
        self.skip_delta = delta;
    }

    /// Add or remove a mark at the playhead. Returns true when added.
    pub fn toggle_mark(&mut self) -> bool {
        self.markers.toggle(self.position())
    }

    /// Seek to the previous mark, or the start
    pub fn previous_mark(&mut self) -> Result<(), TransportError> {
        self.seek(self.markers.previous(self.position()))
    }

    /// Seek to the next mark if there is one
    pub fn next_mark(&mut self) -> Result<(), TransportError> {
        match self.markers.next(self.position()) {
            Some(mark) => self.seek(mark),
            None => Ok(()),
        }
    }

    pub fn markers(&self) -> &MarkerList {
        &self.markers
    }

    pub fn markers_mut(&mut self) -> &mut MarkerList {
        &mut self.markers
    }

    /// Turn cycle mode on or off. Without an explicit region the loop runs
    /// between the marks around the playhead.
    pub fn set_cycling(&mut self, cycling: bool) -> Result<(), TransportError> {
        self.cycling = cycling;
        let region = if cycling {
            self.cycle_region(self.position())
        } else {
            None
        };
        debug!(cycling, region = ?region, "cycle mode");
        self.send(TransportCommand::SetLoop(region))
    }

    pub fn is_cycling(&self) -> bool {
        self.cycling
    }

    /// Explicit loop bounds, `None` to fall back to marks
    pub fn set_loop_region(&mut self, region: Option<TimeRange>) -> Result<(), TransportError> {
        self.explicit_loop = region;
        if self.cycling {
            self.send(TransportCommand::SetLoop(self.cycle_region(self.position())))?;
        }
        Ok(())
    }

    pub fn status(&self) -> TransportStatus {
        self.shared.status()
    }

    pub fn position(&self) -> Tick {
        self.shared.position()
    }

    pub fn state(&self) -> TransportState {
        self.shared.snapshot()
    }

    pub fn links(&self) -> &CollaboratorLinks {
        &self.links
    }

    /// Notifications posted by the playback actor since the last call
    pub fn drain_notifications(&mut self) -> Vec<Notification> {
        let mut drained = Vec::new();
        while let Some(notification) = ringbuf::traits::Consumer::try_pop(&mut self.notifications) {
            drained.push(notification);
        }
        drained
    }

    fn cycle_region(&self, at: Tick) -> Option<TimeRange> {
        self.explicit_loop.or_else(|| self.markers.bounds_around(at))
    }

    fn send(&mut self, command: TransportCommand) -> Result<(), TransportError> {
        ringbuf::traits::Producer::try_push(&mut self.commands, command)
            .map_err(|_| TransportError::CommandQueueFull)
    }
}
