//! Receiver that collects stray text instead of returning it byte by byte.

use core::mem;

use heapless::Vec;

use crate::clock::Clock;
use crate::config::DEFAULT_MAX_PACKET;
use crate::crc::{BaadCrc, Crc16};
use crate::receiver::{Feed, Receiver};

/// Default capacity of the text buffer.
pub const DEFAULT_TEXT_CAPACITY: usize = 64;

/// A [`Receiver`] that accumulates passthrough bytes for [`read`].
///
/// Up to `M` bytes are held between reads. Bytes arriving while the buffer
/// is full are discarded and counted.
///
/// ```
/// use serial_packer::{BufferedReceiver, Config, Encoder, ManualClock, Receiver};
///
/// let clock = ManualClock::new(0);
/// let rx = Receiver::new(Config::default(), &clock).unwrap();
/// let mut rx: BufferedReceiver<_> = BufferedReceiver::new(rx);
///
/// let mut wire = [0u8; 16];
/// let len = Encoder::new(Config::default()).unwrap().encode_into(b"data", &mut wire).unwrap();
///
/// let mut packets = 0;
/// for &byte in b"ok\n".iter().chain(&wire[..len]) {
///     packets += rx.feed(byte).is_some() as usize;
/// }
/// assert_eq!(packets, 1);
/// assert_eq!(rx.read().as_slice(), b"ok\n");
/// ```
///
/// [`read`]: BufferedReceiver::read
pub struct BufferedReceiver<
    K,
    C = BaadCrc,
    const N: usize = DEFAULT_MAX_PACKET,
    const M: usize = DEFAULT_TEXT_CAPACITY,
> {
    receiver: Receiver<K, C, N>,
    text: Vec<u8, M>,
    dropped: u32,
}

impl<K: Clock, C: Crc16, const N: usize, const M: usize> BufferedReceiver<K, C, N, M> {
    /// Wrap a receiver.
    pub fn new(receiver: Receiver<K, C, N>) -> Self {
        Self {
            receiver,
            text: Vec::new(),
            dropped: 0,
        }
    }

    /// Process one byte received now, returning a packet if it completed one.
    ///
    /// The packet is lent from the receiver until the next call.
    pub fn feed(&mut self, byte: u8) -> Option<&[u8]> {
        let now = self.receiver.clock().now_ms();
        self.feed_at(byte, now)
    }

    /// Process one byte received at `now_ms`.
    pub fn feed_at(&mut self, byte: u8, now_ms: u32) -> Option<&[u8]> {
        match self.receiver.feed_at(byte, now_ms) {
            Feed::Packet(packet) => Some(packet),
            Feed::Passthrough(text) => {
                if self.text.push(text).is_err() {
                    self.dropped = self.dropped.saturating_add(1);
                }
                None
            }
            Feed::Pending => None,
        }
    }

    /// Take the collected text.
    ///
    /// Returns nothing while a UTF-8 character is only partly received,
    /// unless the line has been quiet for `max_idle_ms`.
    pub fn read(&mut self) -> Vec<u8, M> {
        let now = self.receiver.clock().now_ms();
        self.read_at(now)
    }

    /// [`BufferedReceiver::read`] with an explicit timestamp.
    pub fn read_at(&mut self, now_ms: u32) -> Vec<u8, M> {
        if self.receiver.in_text_sequence()
            && self.receiver.quiet_for(now_ms) < self.receiver.config().idle_timeout_ms()
        {
            return Vec::new();
        }
        mem::take(&mut self.text)
    }

    /// Number of collected bytes not yet read.
    #[inline]
    #[must_use]
    pub fn pending_text(&self) -> usize {
        self.text.len()
    }

    /// Number of passthrough bytes discarded because the buffer was full.
    #[inline]
    #[must_use]
    pub fn dropped(&self) -> u32 {
        self.dropped
    }

    /// The wrapped receiver.
    #[inline]
    pub fn receiver(&self) -> &Receiver<K, C, N> {
        &self.receiver
    }

    /// The wrapped receiver, mutably.
    #[inline]
    pub fn receiver_mut(&mut self) -> &mut Receiver<K, C, N> {
        &mut self.receiver
    }

    /// Unwrap, discarding any unread text.
    pub fn into_inner(self) -> Receiver<K, C, N> {
        self.receiver
    }
}
