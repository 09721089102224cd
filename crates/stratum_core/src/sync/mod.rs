//! # Cross-thread World Access
//!
//! The simulation thread owns the frame; background threads (network
//! receive, asset streaming) must not reshape component storage while a
//! system is iterating it.
//!
//! ```text
//! Thread 1 (simulation):  apply_commands ─► systems update ─► render
//! Thread 2 (network):     decode packet ─► CommandSender::insert(..)
//! ```
//!
//! Structural changes from thread 2 are queued and land at the next frame
//! boundary, all under one exclusive lock.

mod commands;

pub use commands::{
    ApplyReport, Command, CommandQueue, CommandSender, EntityTarget, DEFAULT_COMMAND_CAPACITY,
};
