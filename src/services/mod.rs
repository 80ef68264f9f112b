// Shelfsync services
// Services drive the replica: sequencing, events, the remote seam, the wire format, sync and settings.

pub mod event_bus;
pub mod remote;
pub mod sequencer;
pub mod settings_engine;
pub mod sync_engine;
pub mod wire;
