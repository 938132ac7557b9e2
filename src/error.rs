//! Error related data structures.

use std::fmt::{self, Display, Formatter};

/// Top level enum for error handling within Boytacean.
///
/// Most of the time, you will want to use the `CustomError` variant
/// to provide a more detailed error message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    RomSize,
    InvalidSaveData,
    InvalidRtcData,
    UnsupportedMbc(String),
    CustomError(String),
}

impl Error {
    pub fn description(&self) -> &str {
        match self {
            Error::RomSize => "Invalid ROM size",
            Error::InvalidSaveData => "Save data does not match the cartridge's RAM size",
            Error::InvalidRtcData => "RTC data must be exactly 5 bytes (S, M, H, DL, DH)",
            Error::UnsupportedMbc(message) => message,
            Error::CustomError(message) => message,
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.description())
    }
}

impl std::error::Error for Error {}

impl From<lr35902_common::error::Error> for Error {
    fn from(value: lr35902_common::error::Error) -> Self {
        Error::CustomError(value.to_string())
    }
}
