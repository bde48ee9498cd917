// Connection module - Link state of external collaborators

pub mod status;

pub use status::{AtomicCollaboratorStatus, CollaboratorLinks, CollaboratorStatus};
