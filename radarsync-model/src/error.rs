use std::fmt::{self, Display};

/// Errors produced by model constructors and validation routines.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// A `YYYYMMDDHHMM` style stamp that does not name a real instant.
    InvalidStamp(String),
    /// A run document name that is not an hour-aligned stamp.
    InvalidRunKey(String),
    /// A frame minute outside `0..60`.
    InvalidMinute(u32),
}

impl Display for ModelError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModelError::InvalidStamp(raw) => {
                write!(f, "invalid timestamp stamp: {raw}")
            }
            ModelError::InvalidRunKey(raw) => {
                write!(f, "invalid run key: {raw}")
            }
            ModelError::InvalidMinute(minute) => {
                write!(f, "minute {minute} is outside of the run hour")
            }
        }
    }
}

impl std::error::Error for ModelError {}

pub type Result<T> = std::result::Result<T, ModelError>;
