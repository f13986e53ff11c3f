//! Packet framing for byte-oriented serial links.
//!
//! Frames carry a binary payload over a UART or similar link that may also
//! carry plain text, and may drop or corrupt bytes:
//!
//! - **Encoding**: [`Encoder`] builds headers and CRC trailers
//!   - [`Encoder::frame()`] - header and trailer for a payload
//!   - [`Encoder::encode_into()`] - a whole frame into a byte slice
//!   - [`Encoder::write_frame()`] / [`Encoder::start_frame()`] - frames
//!     written to an [`embedded_io::Write`] sink, at once or in chunks
//!
//! - **Receiving**: [`Receiver`] is fed one byte at a time
//!   - [`Feed`] - a packet, a passthrough byte, or nothing
//!   - [`BufferedReceiver`] - collects passthrough text for later reading
//!   - [`ErrorCounters`] / [`FrameFault`] - dropped-frame diagnostics
//!
//! - **CRC**: [`Crc16`] engines, cloned fresh for every frame
//!   - [`BaadCrc`] - polynomial 0xBAAD, the link default
//!   - [`CatalogCrc`] - any `u16` algorithm from the `crc` crate
//!
//! # Frame Format
//!
//! ```text
//! [start] len1 [len2] payload... crc_hi crc_lo
//! ```
//!
//! - `start` - optional start byte, `0x85` by default
//! - `len1` - payload length; when `max_packet` exceeds 255 and the length
//!   exceeds 127, the low 7 bits with the top bit set
//! - `len2` - the remaining length bits (`len >> 7`), two-byte form only
//! - `crc` - CRC-16 of the payload, big-endian
//!
//! A receiver gives up on a frame when the gap between two of its bytes
//! reaches `max_idle_ms`, so a sender only needs to pause to resynchronize.
//!
//! # Example
//!
//! ```
//! use serial_packer::{Config, Feed, ManualClock, Receiver};
//!
//! let clock = ManualClock::new(0);
//! let mut rx = Receiver::new(Config::default(), &clock).unwrap();
//! let encoder = rx.encoder();
//!
//! let mut wire = [0u8; 32];
//! let len = encoder.encode_into(&[1, 2, 3], &mut wire).unwrap();
//!
//! let packets: Vec<_> = wire[..len]
//!     .iter()
//!     .filter_map(|&b| rx.feed(b).packet().map(<[u8]>::to_vec))
//!     .collect();
//! assert_eq!(packets, [vec![1, 2, 3]]);
//! ```
//!
//! # Features
//!
//! - **`std`**: Enable standard library support and [`StdClock`]
//! - **`defmt`**: Log through defmt and derive `defmt::Format` on public types
//! - **`log`**: Log through the `log` facade (ignored when `defmt` is enabled)
//! - **`embassy-time`**: Enable [`EmbassyClock`]
//!
//! # No-std Support
//!
//! This crate is `#![no_std]` by default and uses no heap allocations.

#![cfg_attr(not(feature = "std"), no_std)]

#[cfg(feature = "std")]
extern crate std;

mod fmt;

pub mod buffered;
pub mod clock;
pub mod config;
pub mod crc;
pub mod encoder;
pub mod error;
pub mod receiver;

// Re-export types at crate root for convenience
pub use buffered::{BufferedReceiver, DEFAULT_TEXT_CAPACITY};
#[cfg(feature = "embassy-time")]
pub use clock::EmbassyClock;
#[cfg(feature = "std")]
pub use clock::StdClock;
pub use clock::{ticks_diff, Clock, ManualClock, Wrap16};
pub use config::{Config, DEFAULT_MAX_IDLE_MS, DEFAULT_MAX_PACKET, FRAME_START};
pub use crc::{crc16_baad, BaadCrc, CatalogCrc, Crc16};
pub use encoder::{Encoder, FrameWriter, Header, Trailer};
pub use error::{ConfigError, EncodeError, FrameFault, WriteError};
pub use receiver::{ErrorCounters, Feed, Receiver, RxState};
