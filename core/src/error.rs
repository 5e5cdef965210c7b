//! The error types produced by the program codec and comment parser.

use std::io;

/// An error produced while loading a microprogram file (native or legacy).
///
/// Loading is all-or-nothing: on any of these, the caller's previous program
/// store must be left untouched (see `SPEC_FULL.md` §7).
#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    /// The leading 4-byte signature didn't match either supported format.
    #[error("unrecognized file signature")]
    BadSignature,
    /// The stream ended before a complete row (or trailer) could be read.
    #[error("truncated file: expected at least {expected} more byte(s)")]
    Truncated {
        /// How many more bytes were needed to complete the current field.
        expected: usize,
    },
    /// A legacy `.prj` row didn't have the expected two header lines.
    #[error("missing or malformed .prj header")]
    BadHeader,
    /// A legacy `.prj` row held a non-numeric value where a fixed-offset
    /// integer field was expected.
    #[error("illegal integer in row {row}: {text:?}")]
    IllegalInteger {
        /// The 0-based row index within the legacy text file (header lines excluded).
        row: usize,
        /// The offending text.
        text: String,
    },
    /// A legacy `.prj` row's opcode index had no entry in the compatibility table.
    #[error("legacy opcode index {0} is not in the compatibility table")]
    UnknownLegacyOpcode(u16),
    /// A legacy `.prj` row was shorter than the fixed character offsets require.
    #[error("row {0} is too short to hold the fixed-offset fields")]
    ShortRow(usize),
    /// Underlying filesystem failure.
    #[error(transparent)]
    Io(#[from] io::Error),
}

/// An error produced when a control annotation fails grammar validation on
/// edit commit. `Ok(None)` from [`crate::comment::parse`] is not this error --
/// it means the text simply isn't directive-shaped (an ordinary comment).
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ControlError {
    /// The text started with a recognized keyword but didn't complete the
    /// grammar for it (missing address, unknown flag name, trailing tokens,
    /// out-of-range address, etc).
    #[error("malformed {keyword} directive: {reason}")]
    Malformed {
        /// Which directive keyword was being parsed (`"if"`, `"goto"`, `"input"`).
        keyword: &'static str,
        /// A short human-readable reason.
        reason: &'static str,
    },
}
