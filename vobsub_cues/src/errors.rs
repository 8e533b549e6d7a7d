//! Error handling.

use std::io;
use std::path::PathBuf;
use std::result;
use thiserror::Error;

/// Our standard result type.
pub type Result<T, E = Error> = result::Result<T, E>;

/// Errors which can be returned by this crate.
///
/// Errors from `*.idx` parsing and from the Program Stream container are
/// structural and abort the whole decode.  The remaining kinds only affect a
/// single subtitle, which is logged and dropped.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    /// The `*.idx` file was missing a required directive, or contained a
    /// value we could not parse.
    #[error("malformed index (line {line}): {message}")]
    #[non_exhaustive]
    MalformedIndex {
        /// The 1-based line number, or 0 if the problem is not tied to a
        /// single line.
        line: usize,
        /// What went wrong.
        message: String,
    },

    /// Our input data ended before a declared field or skip.
    #[error("input ended unexpectedly while reading {what}")]
    #[non_exhaustive]
    TruncatedStream {
        /// The field we were trying to read.
        what: &'static str,
    },

    /// We found a control command that is not part of the format.
    #[error("unknown control opcode 0x{opcode:02x} at offset 0x{offset:x}")]
    #[non_exhaustive]
    UnknownOpcode {
        /// The opcode byte.
        opcode: u8,
        /// Offset of the opcode within the subtitle packet.
        offset: usize,
    },

    /// The control sequences never supplied a required value.
    #[error("no {missing} for subtitle")]
    #[non_exhaustive]
    IncompleteControlState {
        /// Name of the value that was never set.
        missing: &'static str,
    },

    /// The subtitle bounding box had its corners reversed.
    #[error("invalid bounding box ({x1},{y1})-({x2},{y2})")]
    #[non_exhaustive]
    InvalidCoordinates {
        /// Left edge.
        x1: u16,
        /// Right edge, inclusive.
        x2: u16,
        /// Top edge.
        y1: u16,
        /// Bottom edge, inclusive.
        y2: u16,
    },

    /// The scan line offsets do not fit inside the bitmap data.
    #[error("invalid scan line offsets 0x{even:x}, 0x{odd:x} (bitmap ends at 0x{end:x})")]
    #[non_exhaustive]
    InvalidRleOffsets {
        /// Start of the even scan lines.
        even: u16,
        /// Start of the odd scan lines.
        odd: u16,
        /// End of the bitmap data.
        end: usize,
    },

    /// A control sequence pointed somewhere it should not.
    #[error("control sequence at 0x{offset:x} points back to 0x{next:x}")]
    #[non_exhaustive]
    InvalidControlOffset {
        /// Offset of the control sequence.
        offset: usize,
        /// Offset of the sequence it claims follows it.
        next: usize,
    },

    /// The reassembled subtitle is shorter than its declared size.
    #[error("subtitle declares 0x{declared:x} bytes but only 0x{actual:x} were found")]
    #[non_exhaustive]
    SizeMismatch {
        /// The size found in the subtitle header.
        declared: usize,
        /// The number of bytes we reassembled.
        actual: usize,
    },

    /// We could not read a file.
    #[error("could not read {}", path.display())]
    #[non_exhaustive]
    Io {
        /// The file we were reading.
        path: PathBuf,
        /// The underlying error.
        #[source]
        source: io::Error,
    },
}

impl Error {
    /// A problem with the `*.idx` file.
    pub(crate) fn malformed_index<S: Into<String>>(line: usize, message: S) -> Self {
        Error::MalformedIndex {
            line,
            message: message.into(),
        }
    }

    /// Ran out of input while reading `what`.
    pub(crate) fn truncated(what: &'static str) -> Self {
        Error::TruncatedStream { what }
    }

    /// Could not read `path`.
    pub(crate) fn io<P: Into<PathBuf>>(path: P, source: io::Error) -> Self {
        Error::Io {
            path: path.into(),
            source,
        }
    }
}
