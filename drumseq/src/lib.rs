//! A real-time drum sequencing engine: a song of patterns and sampled
//! instruments, a sample-accurate transport, an audio callback that plays
//! it, and an undoable edit log in front of all of it.
//!
//! [`middle::Middle`] is the entry point. It hands back the real-time
//! [`audio::Engine`] for a driver to run and the [`events::EventReceiver`]
//! a front-end polls.

pub mod audio;
pub mod audio_api;
pub mod config;
pub mod edit;
pub mod events;
pub mod export;
pub mod loader;
pub mod middle;
pub mod shared;
pub mod song;
pub mod transport;
pub mod tui;
