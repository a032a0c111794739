use derive_more::derive::{Display, Error};

/// A specialized `Result` where the error is this crate's `Error` type.
pub type Result<T, E = Error> = core::result::Result<T, E>;

/// Define a unified error type for this crate.
#[expect(missing_docs, reason = "The variants are self-explanatory.")]
#[derive(Debug, Display, Error)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    // `#[error(not(source))]` below tells `derive_more` that the wrapped
    // type does not implement Rust's `core::error::Error` trait.
    #[cfg(feature = "pico")]
    #[display("{_0:?}")]
    TaskSpawn(#[error(not(source))] embassy_executor::SpawnError),

    #[display("Digit value out of range (expected 0-9)")]
    DigitOutOfRange,

    #[cfg(feature = "wifi")]
    #[display("Flash operation failed: {_0:?}")]
    Flash(#[error(not(source))] embassy_rp::flash::Error),

    #[display("Stored WiFi credentials are invalid")]
    CredentialStorageCorrupted,

    #[display("Serialized data does not fit the flash block")]
    CredentialsTooLarge,

    #[display("Ambient light sensor did not respond")]
    LightSensorUnavailable,
}

#[cfg(feature = "pico")]
impl From<embassy_executor::SpawnError> for Error {
    fn from(err: embassy_executor::SpawnError) -> Self {
        Self::TaskSpawn(err)
    }
}

#[cfg(feature = "wifi")]
impl From<embassy_rp::flash::Error> for Error {
    fn from(err: embassy_rp::flash::Error) -> Self {
        Self::Flash(err)
    }
}
