// Commandes de transport - Communication édition → lecture

use crate::sequencer::time::{Tick, TimeRange};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportCommand {
    Play,
    Pause,
    Stop,
    /// Saut sans jouer les événements intermédiaires
    Seek(Tick),
    /// `None` désactive la boucle
    SetLoop(Option<TimeRange>),
}
