//! # Error Types
//!
//! This module defines the error type shared by every stage of a conversion.
//!
//! Only file-level and structural failures are errors. A chord annotation that
//! cannot be recognized (unknown XF byte key, text that is not a chord) is a
//! normal "no chord" outcome and never reaches this type.
//!
//! ## Error Types
//! - `FileNotFound` - Check-mode target does not exist
//! - `FileParse` - MIDI bytes could not be decoded
//! - `UnsupportedTiming` - Melody file has no ticks-per-quarter timebase (SMPTE timing or zero)
//! - `MissingMelodyChannel` - No melody part on the required channel
//! - `Config` - YAML configuration is unreadable or invalid
//! - `Io` - Any other file system failure
//!
//! ## Exit Codes
//! The CLI maps each error to a process exit code with [`LeadSheetError::exit_code`]:
//!
//! | Code | Meaning |
//! |------|---------|
//! | 0 | Success |
//! | 1 | Usage error (missing arguments) |
//! | 2 | Melody file unusable (parse failure, timing, missing channel) |
//! | 3 | Any other failure during generation or checking |
//! | 4 | Check-mode file not found |

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Exit code for a completed run.
pub const EXIT_SUCCESS: i32 = 0;
/// Exit code when the command line does not select a mode.
pub const EXIT_USAGE: i32 = 1;
/// Exit code when the melody file cannot provide a melody part.
pub const EXIT_MELODY: i32 = 2;
/// Exit code for every other failure.
pub const EXIT_FAILURE: i32 = 3;
/// Exit code when the check-mode target is missing.
pub const EXIT_NOT_FOUND: i32 = 4;

/// Which input a MIDI file plays in a conversion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileRole {
    /// The file carrying chord annotations (XF meta events or text).
    Chords,
    /// The file carrying the melody and the governing time resolution.
    Melody,
}

impl fmt::Display for FileRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FileRole::Chords => write!(f, "chord"),
            FileRole::Melody => write!(f, "melody"),
        }
    }
}

#[derive(Error, Debug)]
pub enum LeadSheetError {
    /// The file to check does not exist.
    ///
    /// # Example
    /// ```
    /// # use leadsheet::LeadSheetError;
    /// let err = LeadSheetError::FileNotFound { path: "song.mid".into() };
    /// assert_eq!(err.to_string(), "File not found at song.mid");
    /// ```
    #[error("File not found at {}", path.display())]
    FileNotFound { path: PathBuf },

    /// MIDI bytes could not be decoded.
    ///
    /// # Example
    /// ```
    /// # use leadsheet::{FileRole, LeadSheetError};
    /// let err = LeadSheetError::FileParse {
    ///     path: "melody.mid".into(),
    ///     role: FileRole::Melody,
    ///     message: "invalid header".to_string(),
    /// };
    /// assert_eq!(err.to_string(), "Could not parse melody file melody.mid: invalid header");
    /// ```
    #[error("Could not parse {role} file {}: {message}", path.display())]
    FileParse {
        path: PathBuf,
        role: FileRole,
        message: String,
    },

    /// The melody file has SMPTE timing or declares zero ticks per quarter.
    #[error("Melody file {} has no ticks-per-quarter resolution (timecode timing or zero)", path.display())]
    UnsupportedTiming { path: PathBuf },

    /// No melody part was found on the required MIDI channel.
    #[error("Could not find a melody part on MIDI channel {channel} in the melody file")]
    MissingMelodyChannel { channel: u8 },

    /// Configuration file could not be read or contains invalid values.
    #[error("Invalid configuration {}: {message}", path.display())]
    Config { path: PathBuf, message: String },

    /// File system failure while reading inputs or writing output.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl LeadSheetError {
    /// Process exit code for this failure.
    ///
    /// ```
    /// # use leadsheet::LeadSheetError;
    /// let err = LeadSheetError::MissingMelodyChannel { channel: 1 };
    /// assert_eq!(err.exit_code(), leadsheet::error::EXIT_MELODY);
    /// ```
    pub fn exit_code(&self) -> i32 {
        match self {
            LeadSheetError::FileNotFound { .. } => EXIT_NOT_FOUND,
            LeadSheetError::FileParse {
                role: FileRole::Melody,
                ..
            }
            | LeadSheetError::UnsupportedTiming { .. }
            | LeadSheetError::MissingMelodyChannel { .. } => EXIT_MELODY,
            _ => EXIT_FAILURE,
        }
    }

    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        LeadSheetError::Io {
            path: path.into(),
            source,
        }
    }
}
