//! Exit codes for the CLI tool.

use archslip::Error;

/// Exit code constants
pub const SUCCESS: i32 = 0;
/// Unclassified failure
pub const FAILURE: i32 = 1;
/// Invalid or incomplete command line
pub const USAGE: i32 = 2;
/// The clone source is not a usable archive
pub const BAD_CLONE_SOURCE: i32 = 3;
/// I/O error
pub const IO_ERROR: i32 = 4;

/// Exit code enum for structured handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitCode {
    Success,
    Failure,
    Usage,
    BadCloneSource,
    IoError,
}

impl ExitCode {
    /// Returns the numeric exit code
    pub fn code(self) -> i32 {
        match self {
            Self::Success => SUCCESS,
            Self::Failure => FAILURE,
            Self::Usage => USAGE,
            Self::BadCloneSource => BAD_CLONE_SOURCE,
            Self::IoError => IO_ERROR,
        }
    }
}

/// Converts a library error to an exit code
pub fn error_to_exit_code(error: &Error) -> ExitCode {
    match error {
        Error::Validation(_) => ExitCode::Usage,
        Error::CloneSourceInvalid { .. } => ExitCode::BadCloneSource,
        Error::Io(_) => ExitCode::IoError,
        Error::Encoding { .. }
        | Error::UnsupportedFeature { .. }
        | Error::CodecUnavailable { .. }
        | Error::WriterAborted => ExitCode::Failure,
        // Future error variants - required by #[non_exhaustive]
        _ => ExitCode::Failure,
    }
}
