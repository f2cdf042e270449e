//! Magic Stories App Library Crate
//!
//! Everything the terminal app needs around the core state machine:
//! configuration, input parsing, text views, the cpal audio output and the
//! event loop. The `magic-stories` binary is a thin wrapper around this library.

pub mod config;
pub mod input;
pub mod output;
pub mod runtime;
pub mod ui;
