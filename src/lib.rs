//! Shelfsync: an offline replica of a read-it-later account and the engine
//! that reconciles it with the remote service.
//!
//! The library exposes all modules for use by host applications and the
//! integration tests.

pub mod database;
pub mod managers;
pub mod services;
pub mod types;
