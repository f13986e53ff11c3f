//! CRC-16 engines for frame trailers.
//!
//! The default engine uses polynomial 0xBAAD, which performs well for short
//! frames with many bit errors. It is driven by a 16-entry nibble table
//! instead of the usual 256-entry byte table to keep the footprint small.
//!
//! Any 16-bit CRC from the [`crc`] catalogue can be plugged in through
//! [`CatalogCrc`].

use core::fmt;

use crc::{Crc, Digest, NoTable};

/// Generator polynomial of the default engine.
pub const POLYNOMIAL: u16 = 0xBAAD;

/// Number of CRC bytes in a frame trailer.
pub const CRC_LEN: usize = 2;

/// Nibble lookup table for polynomial 0xBAAD.
///
/// Entry `i` is the register value after shifting `i` through four steps of
/// the right-shifting CRC. These values cross the wire; they must not change.
pub const NIBBLE_TABLE: [u16; 16] = [
    0x0000, 0x64a8, 0xc950, 0xadf8, //
    0xe7fb, 0x8353, 0x2eab, 0x4a03, //
    0xbaad, 0xde05, 0x73fd, 0x1755, //
    0x5d56, 0x39fe, 0x9406, 0xf0ae,
];

/// A running 16-bit CRC.
///
/// Engines are used as prototypes: the encoder and receiver keep one pristine
/// instance and clone it whenever a frame starts, so `Clone` must produce an
/// engine in the same state as the original.
pub trait Crc16: Clone {
    /// Mix one byte into the running value.
    fn feed(&mut self, byte: u8);

    /// Current CRC value.
    fn value(&self) -> u16;

    /// Mix a byte slice into the running value.
    #[inline]
    fn feed_slice(&mut self, data: &[u8]) {
        for &b in data {
            self.feed(b);
        }
    }
}

/// CRC-16 with polynomial 0xBAAD, zero seed, no final XOR.
///
/// Each byte is processed as two nibble lookups, high nibble first.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BaadCrc {
    crc: u16,
}

impl BaadCrc {
    /// Create an engine with a zero register.
    #[inline]
    #[must_use]
    pub const fn new() -> Self {
        Self { crc: 0 }
    }
}

impl Crc16 for BaadCrc {
    #[inline]
    fn feed(&mut self, byte: u8) {
        let mut crc = self.crc;
        crc = NIBBLE_TABLE[((u16::from(byte >> 4) ^ crc) & 0xF) as usize] ^ (crc >> 4);
        crc = NIBBLE_TABLE[((u16::from(byte) ^ crc) & 0xF) as usize] ^ (crc >> 4);
        self.crc = crc;
    }

    #[inline]
    fn value(&self) -> u16 {
        self.crc
    }
}

/// Calculate the 0xBAAD CRC of a byte slice.
#[inline]
#[must_use]
pub fn crc16_baad(data: &[u8]) -> u16 {
    let mut crc = BaadCrc::new();
    crc.feed_slice(data);
    crc.value()
}

/// Adapter for any algorithm of the [`crc`] catalogue with a `u16` register.
///
/// Wraps a [`crc::Digest`] of a table-less [`crc::Crc`] instance, so no
/// lookup table is kept in flash.
///
/// ```
/// use crc::{Crc, NoTable, CRC_16_KERMIT};
/// use serial_packer::{CatalogCrc, Crc16};
///
/// static KERMIT: Crc<u16, NoTable> = Crc::<u16, NoTable>::new(&CRC_16_KERMIT);
///
/// let mut engine = CatalogCrc::new(&KERMIT);
/// engine.feed_slice(b"123456789");
/// assert_eq!(engine.value(), 0x2189);
/// ```
#[derive(Clone)]
pub struct CatalogCrc {
    digest: Digest<'static, u16, NoTable>,
}

impl CatalogCrc {
    /// Create an engine for the given CRC instance.
    #[must_use]
    pub fn new(crc: &'static Crc<u16, NoTable>) -> Self {
        Self {
            digest: crc.digest(),
        }
    }
}

impl Crc16 for CatalogCrc {
    #[inline]
    fn feed(&mut self, byte: u8) {
        self.digest.update(&[byte]);
    }

    #[inline]
    fn feed_slice(&mut self, data: &[u8]) {
        self.digest.update(data);
    }

    fn value(&self) -> u16 {
        self.digest.clone().finalize()
    }
}

impl fmt::Debug for CatalogCrc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CatalogCrc")
            .field("value", &self.value())
            .finish()
    }
}
