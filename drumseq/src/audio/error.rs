//! Audio driver failures.

use thiserror::Error;

/// Driver-level failures. The discriminants are stable numeric codes that
/// front-ends may show or log.
#[derive(Error, Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum DriverError {
    #[error("Unknown audio driver")]
    UnknownDriver = 0,

    #[error("Error starting audio driver")]
    ErrorStartingDriver = 1,

    /// The device or sound server went away while running
    #[error("Audio driver: server shutdown")]
    ServerShutdown = 2,

    #[error("Audio driver: cannot activate client")]
    CannotActivateClient = 3,

    #[error("Audio driver: cannot connect output port")]
    CannotConnectOutputPort = 4,

    #[error("Audio driver: error in port register")]
    ErrorInPortRegister = 5,
}

impl DriverError {
    pub fn code(self) -> u8 {
        self as u8
    }
}
