// EditorState - Arrangement state owned by the editing thread
//
// Commands mutate the Timeline; commit() hands the resulting change records
// to the layout engine so only the touched blocks get relaid out.

use crate::config::EngineConfig;
use crate::layout::engine::LayoutEngine;
use crate::sequencer::timeline::Timeline;
use std::time::Instant;

pub struct EditorState {
    pub timeline: Timeline,
    pub layout: LayoutEngine,
}

impl EditorState {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            timeline: Timeline::new(),
            layout: LayoutEngine::new(config.layout.view(), config.layout.frame_interval()),
        }
    }

    pub fn with_parts(timeline: Timeline, layout: LayoutEngine) -> Self {
        Self { timeline, layout }
    }

    /// Forward pending Timeline changes to the layout dirty set.
    /// Returns the number of change records forwarded.
    pub fn commit(&mut self, now: Instant) -> usize {
        let changes = self.timeline.take_changes();
        self.layout.on_changes(&self.timeline, &changes, now);
        changes.len()
    }

    /// Run the layout pass if the frame interval has elapsed
    pub fn frame(&mut self, now: Instant) -> usize {
        self.commit(now);
        self.layout.poll(&self.timeline, now)
    }
}
