// Canaux de communication lock-free (SPSC)

use crate::messaging::command::TransportCommand;
use crate::messaging::notification::Notification;
use ringbuf::{HeapRb, traits::Split};

pub type CommandProducer = ringbuf::HeapProd<TransportCommand>;
pub type CommandConsumer = ringbuf::HeapCons<TransportCommand>;

/// Édition → lecture
pub fn create_command_channel(capacity: usize) -> (CommandProducer, CommandConsumer) {
    let rb = HeapRb::<TransportCommand>::new(capacity);
    rb.split()
}

pub type NotificationProducer = ringbuf::HeapProd<Notification>;
pub type NotificationConsumer = ringbuf::HeapCons<Notification>;

/// Lecture → édition
pub fn create_notification_channel(
    capacity: usize,
) -> (NotificationProducer, NotificationConsumer) {
    let rb = HeapRb::<Notification>::new(capacity);
    rb.split()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sequencer::time::Tick;
    use ringbuf::traits::{Consumer, Producer};

    #[test]
    fn test_command_channel_is_bounded() {
        let (mut tx, mut rx) = create_command_channel(2);
        assert!(tx.try_push(TransportCommand::Play).is_ok());
        assert!(tx.try_push(TransportCommand::Seek(Tick(480))).is_ok());
        assert!(tx.try_push(TransportCommand::Stop).is_err());

        assert_eq!(rx.try_pop(), Some(TransportCommand::Play));
        assert_eq!(rx.try_pop(), Some(TransportCommand::Seek(Tick(480))));
        assert_eq!(rx.try_pop(), None);
    }
}
