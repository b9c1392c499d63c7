// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Error types for the SPEAD codec and transports.
//!
//! Mirrors the hand-rolled `Display`/`std::error::Error` idiom used
//! throughout this crate's reference middleware rather than pulling in
//! an error-derive dependency: every variant is matched explicitly in
//! `Display`, and `source()` hands back the wrapped cause where there
//! is one.

use std::fmt;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, Error>;

/// Top-level crate error.
#[derive(Debug)]
pub enum Error {
    /// A bit- or byte-level codec failure (format/value out of range).
    Codec(CodecError),
    /// A packet failed to parse as a well-formed SPEAD packet.
    PacketMalformed(&'static str),
    /// A continuation packet's heap_cnt did not match the heap currently
    /// being assembled for that slot.
    HeapCntMismatch { expected: u64, found: u64 },
    /// Two fragments disagreed about the bytes at an overlapping offset.
    HeapInconsistent { offset: usize },
    /// A value was rejected by validation (shape/count/format mismatch).
    ValueError(String),
    /// An item was read before any value was ever set for it.
    UninitializedItem(u16),
    /// The underlying transport is closed; no further packets will arrive.
    TransportClosed,
    /// An I/O error from an underlying transport.
    Io(std::io::Error),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Codec(e) => write!(f, "codec error: {e}"),
            Error::PacketMalformed(msg) => write!(f, "packet malformed: {msg}"),
            Error::HeapCntMismatch { expected, found } => write!(
                f,
                "heap_cnt mismatch: expected {expected}, found {found}"
            ),
            Error::HeapInconsistent { offset } => {
                write!(f, "heap inconsistent: overlapping bytes differ at offset {offset}")
            }
            Error::ValueError(msg) => write!(f, "value error: {msg}"),
            Error::UninitializedItem(id) => write!(f, "item 0x{id:04x} has no value"),
            Error::TransportClosed => write!(f, "transport closed"),
            Error::Io(e) => write!(f, "i/o error: {e}"),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::Codec(e) => Some(e),
            Error::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Io(e)
    }
}

impl From<CodecError> for Error {
    fn from(e: CodecError) -> Self {
        Error::Codec(e)
    }
}

/// Errors from the bit-level pack/unpack kernel.
#[derive(Debug)]
pub enum CodecError {
    /// A format tuple was invalid (bad kind/width combination).
    FormatError(String),
    /// A value did not fit in the number of bits its format declares.
    EncodingOverflow { bits: u8 },
    /// A decode start offset or length ran past the end of the buffer.
    OutOfRange { start_bit_offset: u8 },
}

impl fmt::Display for CodecError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CodecError::FormatError(msg) => write!(f, "invalid format: {msg}"),
            CodecError::EncodingOverflow { bits } => {
                write!(f, "value does not fit in {bits} bits")
            }
            CodecError::OutOfRange { start_bit_offset } => {
                write!(f, "decode ran out of bytes at bit offset {start_bit_offset}")
            }
        }
    }
}

impl std::error::Error for CodecError {}
