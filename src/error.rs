//! Error types.
//!
//! Receive-side problems never surface as errors: the receiver resets, bumps
//! a counter and records a [`FrameFault`]. Only configuration mistakes and
//! oversize outgoing payloads are reported to the caller.

use core::fmt;

/// Invalid link configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// `max_packet` is zero, so every frame would be rejected.
    ZeroMaxPacket,
    /// `max_idle_ms` is zero, so every byte after the first would time out.
    ZeroIdleTimeout,
    /// `max_packet` does not fit the two-byte length field.
    MaxPacketTooLarge {
        /// Requested limit.
        max_packet: u16,
    },
    /// The receiver's buffer capacity is smaller than `max_packet`.
    CapacityTooSmall {
        /// Requested limit.
        max_packet: u16,
        /// Buffer capacity of the receiver type.
        capacity: usize,
    },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroMaxPacket => write!(f, "max_packet must be at least 1"),
            Self::ZeroIdleTimeout => write!(f, "max_idle_ms must be at least 1"),
            Self::MaxPacketTooLarge { max_packet } => {
                write!(f, "max_packet {max_packet} exceeds 32767")
            }
            Self::CapacityTooSmall {
                max_packet,
                capacity,
            } => write!(
                f,
                "max_packet {max_packet} exceeds receiver capacity {capacity}"
            ),
        }
    }
}

/// Error building an outgoing frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum EncodeError {
    /// The payload is longer than `max_packet`.
    TooLong {
        /// Payload length.
        len: usize,
        /// Configured limit.
        max: u16,
    },
    /// The output buffer cannot hold the whole frame.
    BufferTooSmall {
        /// Bytes required.
        needed: usize,
        /// Bytes available.
        available: usize,
    },
}

impl fmt::Display for EncodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooLong { len, max } => write!(f, "payload of {len} bytes exceeds max len {max}"),
            Self::BufferTooSmall { needed, available } => {
                write!(f, "buffer too small ({available} bytes, need {needed})")
            }
        }
    }
}

/// Error writing a frame to an I/O sink.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WriteError<E> {
    /// The frame could not be built.
    Encode(EncodeError),
    /// The sink failed.
    Io(E),
    /// More payload bytes were offered than the header announced. Nothing
    /// from the offending chunk was written.
    Overrun {
        /// Bytes beyond the announced length.
        excess: usize,
    },
    /// The frame was closed before all announced bytes were written. It was
    /// padded and sent with an invalid CRC, so receivers drop it.
    Incomplete {
        /// Bytes that were missing.
        missing: usize,
    },
}

impl<E> From<EncodeError> for WriteError<E> {
    fn from(err: EncodeError) -> Self {
        Self::Encode(err)
    }
}

impl<E: fmt::Debug> fmt::Display for WriteError<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Encode(err) => write!(f, "{err}"),
            Self::Io(err) => write!(f, "write error: {err:?}"),
            Self::Overrun { excess } => write!(f, "{excess} bytes beyond announced frame length"),
            Self::Incomplete { missing } => write!(f, "frame closed {missing} bytes short"),
        }
    }
}

/// Why the receiver dropped a frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FrameFault {
    /// A zero length field, usually a BREAK on the line.
    ZeroLength,
    /// The length field exceeds `max_packet`.
    TooLong {
        /// Announced payload length.
        len: u16,
    },
    /// The line went quiet for `max_idle_ms` in the middle of a frame.
    Timeout,
    /// The trailer does not match the payload.
    Crc {
        /// CRC computed over the received payload.
        expected: u16,
        /// CRC carried by the trailer.
        received: u16,
    },
}

impl FrameFault {
    /// Whether this fault is counted as a CRC error rather than a framing
    /// error.
    #[inline]
    #[must_use]
    pub const fn is_crc(&self) -> bool {
        matches!(self, Self::Crc { .. })
    }
}

impl fmt::Display for FrameFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroLength => write!(f, "zero length"),
            Self::TooLong { len } => write!(f, "length {len} too long"),
            Self::Timeout => write!(f, "idle timeout"),
            Self::Crc { expected, received } => {
                write!(f, "CRC mismatch (local {expected:04X}, remote {received:04X})")
            }
        }
    }
}
