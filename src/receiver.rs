//! Byte-at-a-time frame receiver.
//!
//! The receiver is fed every byte arriving from the link, in order, from one
//! control flow (interrupt handler, polling loop or async task). Each call
//! yields a verified payload, a passthrough byte that is not part of any
//! frame, or nothing.
//!
//! Line errors never stop reception. A bad length, a CRC mismatch or a gap of
//! `max_idle_ms` in the middle of a frame resets the receiver and bumps one of
//! the [`ErrorCounters`]; the next byte is processed as the possible start of
//! a new frame.
//!
//! # Stray text
//!
//! With a start byte configured, the line may be shared with plain text such
//! as debug output. Bytes seen between frames are handed back as
//! [`Feed::Passthrough`]. When such a byte is a UTF-8 lead byte, its
//! continuation bytes are passed through unconditionally so that one of them
//! cannot be mistaken for the start byte.
//!
//! # Example
//!
//! ```
//! use serial_packer::{Config, Encoder, Feed, ManualClock, Receiver};
//!
//! let config = Config::default();
//! let clock = ManualClock::new(0);
//! let mut rx = Receiver::new(config, &clock).unwrap();
//!
//! let mut wire = [0u8; 16];
//! let len = Encoder::new(config).unwrap().encode_into(b"ping", &mut wire).unwrap();
//!
//! let mut received = None;
//! for &byte in b"hi".iter().chain(&wire[..len]) {
//!     match rx.feed(byte) {
//!         Feed::Packet(packet) => received = Some(packet.to_vec()),
//!         Feed::Passthrough(text) => assert!(text == b'h' || text == b'i'),
//!         Feed::Pending => {}
//!     }
//! }
//! assert_eq!(received.as_deref(), Some(&b"ping"[..]));
//! ```

use crate::clock::Clock;
use crate::config::{Config, DEFAULT_MAX_PACKET};
use crate::crc::{BaadCrc, Crc16, CRC_LEN};
use crate::encoder::Encoder;
use crate::error::{ConfigError, FrameFault};

/// Outcome of feeding one byte.
///
/// A completed payload is lent from the receiver's buffer and stays valid
/// until the receiver is fed again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[must_use]
pub enum Feed<'a> {
    /// The byte was consumed; no frame completed.
    Pending,
    /// The byte is not part of a frame.
    Passthrough(u8),
    /// The byte completed a frame with a valid CRC.
    Packet(&'a [u8]),
}

impl<'a> Feed<'a> {
    /// The completed payload, if any.
    #[inline]
    #[must_use]
    pub fn packet(self) -> Option<&'a [u8]> {
        match self {
            Self::Packet(packet) => Some(packet),
            _ => None,
        }
    }

    /// The passthrough byte, if any.
    #[inline]
    #[must_use]
    pub fn passthrough(&self) -> Option<u8> {
        match self {
            Self::Passthrough(byte) => Some(*byte),
            _ => None,
        }
    }

    /// Whether nothing was produced.
    #[inline]
    #[must_use]
    pub fn is_pending(&self) -> bool {
        matches!(self, Self::Pending)
    }
}

/// Counts of dropped frames. Never reset by [`Receiver::reset`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ErrorCounters {
    /// Frames whose trailer did not match the payload.
    pub crc: u32,
    /// Frames with a bad length field or an idle timeout.
    pub frame: u32,
}

/// Receiver state, without its per-state data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RxState {
    /// Waiting for the start byte.
    Idle,
    /// Waiting for the first length byte.
    Len1,
    /// Waiting for the second length byte.
    Len2,
    /// Collecting payload bytes.
    Data,
    /// Collecting the CRC trailer.
    CrcWait,
}

enum State<C> {
    Idle {
        /// UTF-8 continuation bytes still to pass through.
        skip: u8,
    },
    Len1,
    Len2 {
        low: u16,
    },
    Data {
        len: usize,
        crc: C,
    },
    CrcWait {
        len: usize,
        expected: u16,
        received: u16,
        remaining: u8,
    },
}

impl<C> State<C> {
    fn kind(&self) -> RxState {
        match self {
            Self::Idle { .. } => RxState::Idle,
            Self::Len1 => RxState::Len1,
            Self::Len2 { .. } => RxState::Len2,
            Self::Data { .. } => RxState::Data,
            Self::CrcWait { .. } => RxState::CrcWait,
        }
    }
}

/// Frame receiver for one link.
///
/// `N` is the capacity of the payload buffer and must be at least the
/// configured `max_packet`. `K` supplies timestamps for the idle timeout; `C`
/// is the CRC engine, cloned fresh for every frame.
///
/// The buffer is the only packet-sized storage: bytes are written into it in
/// place and completed payloads are lent out of it, so feeding a byte uses
/// the same small amount of stack whatever `N` is.
pub struct Receiver<K, C = BaadCrc, const N: usize = DEFAULT_MAX_PACKET> {
    config: Config,
    clock: K,
    crc: C,
    state: State<C>,
    buffer: [u8; N],
    pos: usize,
    last_byte_ms: u32,
    errors: ErrorCounters,
    last_fault: Option<FrameFault>,
}

impl<K: Clock> Receiver<K, BaadCrc, DEFAULT_MAX_PACKET> {
    /// Create a receiver with the 0xBAAD CRC and a 127-byte buffer.
    ///
    /// Use [`Receiver::with_crc`] for larger payloads or another CRC.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration is invalid or
    /// `max_packet` exceeds 127.
    pub fn new(config: Config, clock: K) -> Result<Self, ConfigError> {
        Self::with_crc(config, clock, BaadCrc::new())
    }
}

impl<K: Clock, C: Crc16, const N: usize> Receiver<K, C, N> {
    /// Create a receiver with a custom CRC engine and buffer capacity.
    ///
    /// ```
    /// use serial_packer::{BaadCrc, Config, ManualClock, Receiver};
    ///
    /// let config = Config::new().max_packet(500);
    /// let rx: Receiver<_, _, 500> =
    ///     Receiver::with_crc(config, ManualClock::new(0), BaadCrc::new()).unwrap();
    /// assert!(rx.is_resting());
    /// ```
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration is invalid or
    /// `max_packet` exceeds `N`.
    pub fn with_crc(config: Config, clock: K, crc: C) -> Result<Self, ConfigError> {
        config.validate()?;
        if usize::from(config.packet_limit()) > N {
            return Err(ConfigError::CapacityTooSmall {
                max_packet: config.packet_limit(),
                capacity: N,
            });
        }
        let last_byte_ms = clock.now_ms();
        Ok(Self {
            state: Self::initial_state(&config),
            config,
            clock,
            crc,
            buffer: [0u8; N],
            pos: 0,
            last_byte_ms,
            errors: ErrorCounters::default(),
            last_fault: None,
        })
    }

    /// An encoder with the same configuration and CRC engine.
    #[must_use]
    pub fn encoder(&self) -> Encoder<C> {
        Encoder::from_parts(self.config, self.crc.clone())
    }

    /// The link configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// The time source.
    #[inline]
    #[must_use]
    pub fn clock(&self) -> &K {
        &self.clock
    }

    /// Current state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> RxState {
        self.state.kind()
    }

    /// Error counters.
    #[inline]
    #[must_use]
    pub fn errors(&self) -> ErrorCounters {
        self.errors
    }

    /// Number of frames dropped for a CRC mismatch.
    #[inline]
    #[must_use]
    pub fn err_crc(&self) -> u32 {
        self.errors.crc
    }

    /// Number of frames dropped for a bad length or an idle timeout.
    #[inline]
    #[must_use]
    pub fn err_frame(&self) -> u32 {
        self.errors.frame
    }

    /// The reason the most recent frame was dropped.
    #[inline]
    #[must_use]
    pub fn last_fault(&self) -> Option<FrameFault> {
        self.last_fault
    }

    /// Whether the receiver is between frames.
    ///
    /// This is the state after [`Receiver::reset`]: waiting for the start
    /// byte, or for the first length byte when no start byte is configured.
    /// A resting receiver never times out.
    #[must_use]
    pub fn is_resting(&self) -> bool {
        match self.state {
            State::Idle { .. } => true,
            State::Len1 => self.config.start_byte().is_none(),
            _ => false,
        }
    }

    /// Whether continuation bytes of a UTF-8 character are still expected.
    #[inline]
    #[must_use]
    pub fn in_text_sequence(&self) -> bool {
        matches!(self.state, State::Idle { skip } if skip > 0)
    }

    /// Milliseconds since the last byte, as of `now_ms`.
    #[inline]
    #[must_use]
    pub fn quiet_for(&self, now_ms: u32) -> u32 {
        self.clock.ticks_diff(now_ms, self.last_byte_ms)
    }

    /// Abandon any frame in progress. Error counters are kept.
    pub fn reset(&mut self) {
        self.state = Self::initial_state(&self.config);
        self.pos = 0;
    }

    /// Start a frame without a start byte.
    ///
    /// Used when the first byte of a transmission only wakes the receiving
    /// device and cannot be matched against the start byte. The next byte is
    /// taken as the first length byte.
    pub fn wakeup(&mut self) {
        let now = self.clock.now_ms();
        self.wakeup_at(now);
    }

    /// [`Receiver::wakeup`] with an explicit timestamp.
    pub fn wakeup_at(&mut self, now_ms: u32) {
        debug!("wakeup");
        self.reset();
        self.state = State::Len1;
        self.last_byte_ms = now_ms;
    }

    /// Whether no frame is in progress.
    ///
    /// A frame that has stalled for `max_idle_ms` is abandoned and counted as
    /// a framing error, after which the receiver reports idle.
    pub fn is_idle(&mut self) -> bool {
        let now = self.clock.now_ms();
        self.is_idle_at(now)
    }

    /// [`Receiver::is_idle`] with an explicit timestamp.
    pub fn is_idle_at(&mut self, now_ms: u32) -> bool {
        if self.is_resting() {
            return true;
        }
        if self.quiet_for(now_ms) < self.config.idle_timeout_ms() {
            return false;
        }
        self.fault(FrameFault::Timeout);
        true
    }

    /// Process one byte received now.
    pub fn feed(&mut self, byte: u8) -> Feed<'_> {
        let now = self.clock.now_ms();
        self.feed_at(byte, now)
    }

    /// Process one byte received at `now_ms`.
    pub fn feed_at(&mut self, byte: u8, now_ms: u32) -> Feed<'_> {
        if self.quiet_for(now_ms) >= self.config.idle_timeout_ms() {
            if !self.is_resting() {
                self.fault(FrameFault::Timeout);
            } else if self.in_text_sequence() {
                // The rest of that character is not coming
                self.reset();
            }
        }
        self.last_byte_ms = now_ms;
        self.step(byte)
    }

    /// Feed a slice of bytes received now, returning the first packet.
    ///
    /// Passthrough bytes are discarded. Bytes after a completed packet are
    /// not consumed; the number of bytes consumed is returned with the packet.
    pub fn feed_slice(&mut self, data: &[u8]) -> (usize, Option<&[u8]>) {
        for (i, &byte) in data.iter().enumerate() {
            if let Some(len) = self.feed(byte).packet().map(<[u8]>::len) {
                return (i + 1, Some(&self.buffer[..len]));
            }
        }
        (data.len(), None)
    }

    fn step(&mut self, byte: u8) -> Feed<'_> {
        match &mut self.state {
            State::Idle { skip } if *skip > 0 => {
                *skip -= 1;
                Feed::Passthrough(byte)
            }
            State::Idle { skip } => {
                if Some(byte) == self.config.start_byte() {
                    self.state = State::Len1;
                    return Feed::Pending;
                }
                *skip = utf8_continuations(byte);
                Feed::Passthrough(byte)
            }
            State::Len1 => {
                if byte == 0 {
                    self.fault(FrameFault::ZeroLength);
                } else if self.config.two_byte_length() && byte & 0x80 != 0 {
                    self.state = State::Len2 {
                        low: u16::from(byte & 0x7F),
                    };
                } else {
                    self.start_data(u16::from(byte));
                }
                Feed::Pending
            }
            State::Len2 { low } => {
                let len = *low | u16::from(byte) << 7;
                self.start_data(len);
                Feed::Pending
            }
            State::Data { len, crc } => {
                crc.feed(byte);
                self.buffer[self.pos] = byte;
                self.pos += 1;
                if self.pos == *len {
                    let (len, expected) = (*len, crc.value());
                    self.state = State::CrcWait {
                        len,
                        expected,
                        received: 0,
                        remaining: CRC_LEN as u8,
                    };
                }
                Feed::Pending
            }
            State::CrcWait {
                len,
                expected,
                received,
                remaining,
            } => {
                *received = *received << 8 | u16::from(byte);
                *remaining -= 1;
                if *remaining > 0 {
                    return Feed::Pending;
                }
                let (len, expected, received) = (*len, *expected, *received);
                if received != expected {
                    self.fault(FrameFault::Crc { expected, received });
                    return Feed::Pending;
                }
                trace!("packet received, {} bytes", len);
                self.reset();
                Feed::Packet(&self.buffer[..len])
            }
        }
    }

    /// Enter DATA for a payload of `len` bytes, or reject the length.
    fn start_data(&mut self, len: u16) {
        if len == 0 {
            return self.fault(FrameFault::ZeroLength);
        }
        if len > self.config.packet_limit() {
            return self.fault(FrameFault::TooLong { len });
        }
        // len <= max_packet <= N keeps every DATA write inside the buffer
        self.pos = 0;
        self.state = State::Data {
            len: usize::from(len),
            crc: self.crc.clone(),
        };
    }

    /// Count a dropped frame and return to the initial state.
    fn fault(&mut self, fault: FrameFault) {
        warn!("frame dropped: {}", fault);
        if fault.is_crc() {
            self.errors.crc = self.errors.crc.saturating_add(1);
        } else {
            self.errors.frame = self.errors.frame.saturating_add(1);
        }
        self.last_fault = Some(fault);
        self.reset();
    }

    fn initial_state(config: &Config) -> State<C> {
        if config.start_byte().is_some() {
            State::Idle { skip: 0 }
        } else {
            State::Len1
        }
    }
}

/// Number of continuation bytes announced by a UTF-8 lead byte.
///
/// Lead bytes start with two or more one-bits (`0xC0..`); the count of
/// leading ones minus one gives the continuation bytes. Capped at three, the
/// longest sequence UTF-8 allows.
fn utf8_continuations(byte: u8) -> u8 {
    if byte < 0xC0 {
        return 0;
    }
    (byte.leading_ones() as u8 - 1).min(3)
}
