// Transport module
// Play/pause/stop state machine synchronized to an external audio clock

pub mod contracts;
pub mod controller;
pub mod error;
pub mod state;
pub mod sync;

pub use contracts::{ClockControl, ClockEvent, SamplerSink, TransportAck};
pub use controller::TransportController;
pub use error::{CollaboratorUnavailable, TransportError};
pub use state::{SharedTransportState, TransportState, TransportStatus};
pub use sync::TransportSync;

use crate::config::TransportConfig;
use crate::connection::status::CollaboratorLinks;
use crate::messaging::channels::{create_command_channel, create_notification_channel};
use crate::sequencer::timeline::TimelineReader;

/// Wire a playback actor and its editing-side controller together
pub fn create_session<S: SamplerSink, C: ClockControl>(
    reader: TimelineReader,
    sampler: S,
    clock: C,
    config: &TransportConfig,
) -> (TransportSync<S, C>, TransportController) {
    let (commands_tx, commands_rx) = create_command_channel(config.command_capacity);
    let (notifications_tx, notifications_rx) =
        create_notification_channel(config.notification_capacity);
    let shared = SharedTransportState::new();
    let links = CollaboratorLinks::default();

    let sync = TransportSync::new(reader, sampler, clock)
        .with_channels(commands_rx, notifications_tx)
        .with_shared(shared.clone(), links.clone());
    let controller = TransportController::new(
        commands_tx,
        notifications_rx,
        shared,
        links,
        config.skip_delta(),
    );
    (sync, controller)
}
