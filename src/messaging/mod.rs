// Messaging - Lock-free channels between the editing and playback threads

pub mod channels;
pub mod command;
pub mod notification;

pub use channels::{
    CommandConsumer, CommandProducer, NotificationConsumer, NotificationProducer,
    create_command_channel, create_notification_channel,
};
pub use command::TransportCommand;
pub use notification::{Notification, NotificationCategory};
