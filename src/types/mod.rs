// Shelfsync shared type definitions
// Each submodule defines types used by the store, the sync engine and remote adapters.

pub mod bookmark;
pub mod edits;
pub mod errors;
pub mod events;
pub mod folder;
pub mod remote;
pub mod settings;
