// The song and the transport live behind one lock. The control thread takes
// it to edit; the audio thread only ever try-locks it, so an edit in
// progress costs one silent buffer instead of a blocked callback.

use std::sync::Arc;

use parking_lot::Mutex;

use super::Song;
use crate::transport::Transport;

#[derive(Clone, Debug, Default)]
pub struct EngineState {
    pub song: Song,
    pub transport: Transport,
}

pub type SharedState = Arc<Mutex<EngineState>>;

impl EngineState {
    pub fn new(song: Song) -> Self {
        Self { song, transport: Transport::new() }
    }

    pub fn new_shared(song: Song) -> SharedState {
        Arc::new(Mutex::new(Self::new(song)))
    }
}
