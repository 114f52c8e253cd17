use crate::song::InstrumentId;

pub use crate::audio::Hit;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct TriggerParams {
    pub instrument: InstrumentId,
    pub hit: Hit,
}

// Sent from the control thread, applied by the engine at the start of the
// next buffer. Everything here is Copy so the channel never carries heap data.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum AudioCommand {
    // play an instrument right now, outside the sequencer (live pads, preview)
    Trigger(TriggerParams),

    // silence every voice, sequenced or not
    AllNotesOff,

    SetMetronome(bool),
}
