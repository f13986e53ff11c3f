//! Frame encoder.
//!
//! # Wire format
//!
//! ```text
//! [start?] [len1] [len2?] [payload: len bytes] [crc hi] [crc lo]
//! ```
//!
//! - `start` - the configured start byte, omitted when disabled
//! - `len1` - payload length, or its low 7 bits with bit 7 set when a second
//!   length byte follows (only if `max_packet > 255` and `len > 127`)
//! - `len2` - `len >> 7`
//! - CRC over the payload only, big-endian
//!
//! # Example
//!
//! ```
//! use serial_packer::{Config, Encoder};
//!
//! let encoder = Encoder::new(Config::default()).unwrap();
//! let (header, trailer) = encoder.frame(&[0x01]).unwrap();
//! assert_eq!(header.as_slice(), &[0x85, 0x01]);
//! assert_eq!(trailer, [0x64, 0xA8]);
//! ```

use core::ops::Deref;

use embedded_io::Write;

use crate::config::Config;
use crate::crc::{BaadCrc, Crc16, CRC_LEN};
use crate::error::{ConfigError, EncodeError, WriteError};

/// Longest possible header: start byte plus two length bytes.
pub const MAX_HEADER_LEN: usize = 3;

/// Frame trailer: the payload CRC, high byte first.
pub type Trailer = [u8; CRC_LEN];

/// Frame header: optional start byte and the length field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Header {
    bytes: [u8; MAX_HEADER_LEN],
    len: u8,
}

impl Header {
    #[inline]
    fn push(&mut self, byte: u8) {
        self.bytes[self.len as usize] = byte;
        self.len += 1;
    }

    /// Header bytes in transmission order.
    #[inline]
    #[must_use]
    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len as usize]
    }
}

impl Deref for Header {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        self.as_slice()
    }
}

impl AsRef<[u8]> for Header {
    fn as_ref(&self) -> &[u8] {
        self.as_slice()
    }
}

/// Builds frames for one link configuration.
///
/// Holds a pristine CRC engine that is cloned for every frame.
#[derive(Debug, Clone)]
pub struct Encoder<C = BaadCrc> {
    config: Config,
    crc: C,
}

impl Encoder<BaadCrc> {
    /// Create an encoder using the 0xBAAD CRC.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration is invalid.
    pub fn new(config: Config) -> Result<Self, ConfigError> {
        Self::with_crc(config, BaadCrc::new())
    }
}

impl<C: Crc16> Encoder<C> {
    /// Create an encoder with a custom CRC engine.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the configuration is invalid.
    pub fn with_crc(config: Config, crc: C) -> Result<Self, ConfigError> {
        config.validate()?;
        Ok(Self::from_parts(config, crc))
    }

    /// Config must already be validated.
    pub(crate) fn from_parts(config: Config, crc: C) -> Self {
        Self { config, crc }
    }

    /// The link configuration.
    #[inline]
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Build the header announcing a payload of `len` bytes.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::TooLong`] if `len` exceeds `max_packet`.
    pub fn header(&self, len: usize) -> Result<Header, EncodeError> {
        let max = self.config.packet_limit();
        if len > usize::from(max) {
            return Err(EncodeError::TooLong { len, max });
        }

        let mut header = Header {
            bytes: [0; MAX_HEADER_LEN],
            len: 0,
        };
        if let Some(start) = self.config.start_byte() {
            header.push(start);
        }
        if self.config.two_byte_length() && len > 0x7F {
            header.push((len & 0x7F) as u8 | 0x80);
            header.push((len >> 7) as u8);
        } else {
            header.push(len as u8);
        }
        Ok(header)
    }

    /// Build the header and trailer framing `payload`.
    ///
    /// The caller transmits header, payload and trailer in that order. An
    /// empty payload encodes a zero length field, which every receiver drops;
    /// it can be sent on purpose to force resynchronization.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::TooLong`] if the payload exceeds `max_packet`.
    pub fn frame(&self, payload: &[u8]) -> Result<(Header, Trailer), EncodeError> {
        let header = self.header(payload.len())?;
        let mut crc = self.crc.clone();
        crc.feed_slice(payload);
        Ok((header, crc.value().to_be_bytes()))
    }

    /// Number of bytes a frame carrying `payload_len` bytes takes on the wire.
    #[must_use]
    pub fn wire_len(&self, payload_len: usize) -> usize {
        let start = usize::from(self.config.start_byte().is_some());
        let length = if self.config.two_byte_length() && payload_len > 0x7F {
            2
        } else {
            1
        };
        start + length + payload_len + CRC_LEN
    }

    /// Write a complete frame into `buf`.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::TooLong`] if the payload exceeds `max_packet`,
    /// or [`EncodeError::BufferTooSmall`] if `buf` cannot hold the frame.
    pub fn encode_into(&self, payload: &[u8], buf: &mut [u8]) -> Result<usize, EncodeError> {
        let (header, trailer) = self.frame(payload)?;
        let needed = header.len() + payload.len() + trailer.len();
        if buf.len() < needed {
            return Err(EncodeError::BufferTooSmall {
                needed,
                available: buf.len(),
            });
        }

        let (head, rest) = buf.split_at_mut(header.len());
        head.copy_from_slice(&header);
        let (body, rest) = rest.split_at_mut(payload.len());
        body.copy_from_slice(payload);
        rest[..trailer.len()].copy_from_slice(&trailer);
        Ok(needed)
    }

    /// Write a complete frame to an I/O sink.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::Encode`] if the payload is too long, or
    /// [`WriteError::Io`] if the sink fails.
    pub fn write_frame<W: Write>(
        &self,
        io: &mut W,
        payload: &[u8],
    ) -> Result<(), WriteError<W::Error>> {
        let mut frame = self.start_frame(io, payload.len())?;
        frame.write(payload)?;
        frame.finish()
    }

    /// Start a frame of `len` bytes whose payload is written piecewise.
    ///
    /// The header is written immediately. Payload chunks go through
    /// [`FrameWriter::write`]; [`FrameWriter::finish`] appends the CRC.
    ///
    /// Dropping the writer without finishing leaves the frame open; the peer
    /// discards it once its idle timeout expires.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::Encode`] if `len` is too long, or
    /// [`WriteError::Io`] if the header cannot be written.
    pub fn start_frame<'w, W: Write>(
        &self,
        io: &'w mut W,
        len: usize,
    ) -> Result<FrameWriter<'w, W, C>, WriteError<W::Error>> {
        let header = self.header(len)?;
        io.write_all(&header).map_err(WriteError::Io)?;
        trace!("frame start, {} bytes", len);
        Ok(FrameWriter {
            io,
            crc: self.crc.clone(),
            remaining: len,
        })
    }
}

/// A frame whose header has been sent and whose payload is being written.
///
/// Created by [`Encoder::start_frame`].
pub struct FrameWriter<'w, W: Write, C> {
    io: &'w mut W,
    crc: C,
    remaining: usize,
}

impl<W: Write, C: Crc16> FrameWriter<'_, W, C> {
    /// Payload bytes still to be written.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.remaining
    }

    /// Write a chunk of payload.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::Overrun`] without writing anything if the chunk
    /// is longer than the remaining payload, or [`WriteError::Io`] if the
    /// sink fails.
    pub fn write(&mut self, data: &[u8]) -> Result<(), WriteError<W::Error>> {
        if data.len() > self.remaining {
            return Err(WriteError::Overrun {
                excess: data.len() - self.remaining,
            });
        }
        self.io.write_all(data).map_err(WriteError::Io)?;
        self.crc.feed_slice(data);
        self.remaining -= data.len();
        Ok(())
    }

    /// Write a single payload byte.
    ///
    /// # Errors
    ///
    /// Same as [`FrameWriter::write`].
    #[inline]
    pub fn write_byte(&mut self, byte: u8) -> Result<(), WriteError<W::Error>> {
        self.write(&[byte])
    }

    /// Close the frame by writing the CRC trailer.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::Incomplete`] if payload bytes are missing. The
    /// frame is then padded with zeros and closed with an invalid CRC so that
    /// receivers drop it. Returns [`WriteError::Io`] if the sink fails.
    pub fn finish(mut self) -> Result<(), WriteError<W::Error>> {
        if self.remaining > 0 {
            let missing = self.remaining;
            warn!("frame closed {} bytes short", missing);
            self.pad()?;
            self.write_trailer(true)?;
            return Err(WriteError::Incomplete { missing });
        }
        self.write_trailer(false)
    }

    /// Abandon the frame.
    ///
    /// Pads any missing payload with zeros and writes an invalid CRC, so the
    /// link is immediately ready for the next frame and receivers drop this
    /// one.
    ///
    /// # Errors
    ///
    /// Returns [`WriteError::Io`] if the sink fails.
    pub fn abort(mut self) -> Result<(), WriteError<W::Error>> {
        self.pad()?;
        self.write_trailer(true)
    }

    fn pad(&mut self) -> Result<(), WriteError<W::Error>> {
        const ZEROS: [u8; 16] = [0; 16];
        while self.remaining > 0 {
            let n = self.remaining.min(ZEROS.len());
            self.write(&ZEROS[..n])?;
        }
        Ok(())
    }

    fn write_trailer(&mut self, broken: bool) -> Result<(), WriteError<W::Error>> {
        let mut crc = self.crc.value();
        if broken {
            crc ^= 1;
        }
        self.io
            .write_all(&crc.to_be_bytes())
            .map_err(WriteError::Io)
    }
}

#[cfg(test)]
mod tests {
    extern crate std;

    use super::*;
    use crate::crc::crc16_baad;
    use core::convert::Infallible;
    use std::vec;
    use std::vec::Vec;

    /// In-memory sink.
    #[derive(Default)]
    struct Wire {
        bytes: Vec<u8>,
    }

    impl embedded_io::ErrorType for Wire {
        type Error = Infallible;
    }

    impl embedded_io::Write for Wire {
        fn write(&mut self, buf: &[u8]) -> Result<usize, Infallible> {
            self.bytes.extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> Result<(), Infallible> {
            Ok(())
        }
    }

    /// Sink that refuses everything.
    struct Broken;

    impl embedded_io::ErrorType for Broken {
        type Error = embedded_io::ErrorKind;
    }

    impl embedded_io::Write for Broken {
        fn write(&mut self, _buf: &[u8]) -> Result<usize, embedded_io::ErrorKind> {
            Err(embedded_io::ErrorKind::BrokenPipe)
        }

        fn flush(&mut self) -> Result<(), embedded_io::ErrorKind> {
            Ok(())
        }
    }

    fn long_encoder() -> Encoder {
        Encoder::new(Config::new().max_packet(500)).unwrap()
    }

    #[test]
    fn test_header_with_start_byte() {
        let encoder = Encoder::new(Config::default()).unwrap();
        let header = encoder.header(5).unwrap();
        assert_eq!(header.as_slice(), &[0x85, 0x05]);
    }

    #[test]
    fn test_header_without_start_byte() {
        let encoder = Encoder::new(Config::new().frame_start(None)).unwrap();
        assert_eq!(encoder.header(5).unwrap().as_slice(), &[0x05]);
    }

    #[test]
    fn test_one_byte_mode_uses_full_byte() {
        let encoder = Encoder::new(Config::new().max_packet(255)).unwrap();
        assert_eq!(encoder.header(200).unwrap().as_slice(), &[0x85, 200]);
    }

    #[test]
    fn test_adaptive_length_boundary() {
        let encoder = long_encoder();
        assert_eq!(encoder.header(127).unwrap().as_slice(), &[0x85, 0x7F]);
        assert_eq!(encoder.header(128).unwrap().as_slice(), &[0x85, 0x80, 0x01]);
        assert_eq!(encoder.header(500).unwrap().as_slice(), &[0x85, 0xF4, 0x03]);
    }

    #[test]
    fn test_largest_two_byte_length() {
        let encoder = Encoder::new(Config::new().max_packet(0x7FFF)).unwrap();
        assert_eq!(encoder.header(0x7FFF).unwrap().as_slice(), &[0x85, 0xFF, 0xFF]);
    }

    #[test]
    fn test_too_long_rejected() {
        let encoder = Encoder::new(Config::default()).unwrap();
        assert_eq!(
            encoder.frame(&[0u8; 128]),
            Err(EncodeError::TooLong { len: 128, max: 127 })
        );
    }

    #[test]
    fn test_trailer_is_big_endian_crc() {
        let encoder = Encoder::new(Config::default()).unwrap();
        let payload = b"hello";
        let (_, trailer) = encoder.frame(payload).unwrap();
        let crc = crc16_baad(payload);
        assert_eq!(trailer, [(crc >> 8) as u8, (crc & 0xFF) as u8]);
    }

    #[test]
    fn test_invalid_config_rejected() {
        assert_eq!(
            Encoder::new(Config::new().max_packet(0)).unwrap_err(),
            ConfigError::ZeroMaxPacket
        );
    }

    #[test]
    fn test_encode_into() {
        let encoder = Encoder::new(Config::default()).unwrap();
        let mut buf = [0u8; 16];
        let len = encoder.encode_into(&[0x01], &mut buf).unwrap();
        assert_eq!(&buf[..len], &[0x85, 0x01, 0x01, 0x64, 0xA8]);
        assert_eq!(len, encoder.wire_len(1));
    }

    #[test]
    fn test_encode_into_buffer_too_small() {
        let encoder = Encoder::new(Config::default()).unwrap();
        let mut buf = [0u8; 4];
        assert_eq!(
            encoder.encode_into(&[0x01], &mut buf),
            Err(EncodeError::BufferTooSmall {
                needed: 5,
                available: 4
            })
        );
    }

    #[test]
    fn test_wire_len_two_byte_mode() {
        let encoder = long_encoder();
        assert_eq!(encoder.wire_len(127), 1 + 1 + 127 + 2);
        assert_eq!(encoder.wire_len(128), 1 + 2 + 128 + 2);
    }

    #[test]
    fn test_write_frame_matches_encode_into() {
        let encoder = Encoder::new(Config::default()).unwrap();
        let payload = b"\x00\x85\xC3payload";

        let mut wire = Wire::default();
        encoder.write_frame(&mut wire, payload).unwrap();

        let mut buf = [0u8; 32];
        let len = encoder.encode_into(payload, &mut buf).unwrap();
        assert_eq!(wire.bytes.as_slice(), &buf[..len]);
    }

    #[test]
    fn test_streaming_writer_in_chunks() {
        let encoder = long_encoder();
        let payload: Vec<u8> = (0..300u16).map(|i| i as u8).collect();

        let mut wire = Wire::default();
        let mut frame = encoder.start_frame(&mut wire, payload.len()).unwrap();
        for chunk in payload.chunks(7) {
            frame.write(chunk).unwrap();
        }
        assert_eq!(frame.remaining(), 0);
        frame.finish().unwrap();

        let mut expected = vec![0u8; encoder.wire_len(payload.len())];
        encoder.encode_into(&payload, &mut expected).unwrap();
        assert_eq!(wire.bytes, expected);
    }

    #[test]
    fn test_streaming_writer_overrun() {
        let encoder = Encoder::new(Config::default()).unwrap();
        let mut wire = Wire::default();
        let mut frame = encoder.start_frame(&mut wire, 3).unwrap();
        frame.write(b"ab").unwrap();
        assert_eq!(frame.write(b"cd"), Err(WriteError::Overrun { excess: 1 }));
        assert_eq!(frame.remaining(), 1);
        frame.write_byte(b'c').unwrap();
        frame.finish().unwrap();

        let mut expected = [0u8; 8];
        let len = encoder.encode_into(b"abc", &mut expected).unwrap();
        assert_eq!(wire.bytes.as_slice(), &expected[..len]);
    }

    #[test]
    fn test_streaming_writer_short_frame_is_padded_and_broken() {
        let encoder = Encoder::new(Config::default()).unwrap();
        let mut wire = Wire::default();
        let mut frame = encoder.start_frame(&mut wire, 4).unwrap();
        frame.write(b"ab").unwrap();
        assert_eq!(frame.finish(), Err(WriteError::Incomplete { missing: 2 }));

        let good = crc16_baad(b"ab\x00\x00");
        let broken = (good ^ 1).to_be_bytes();
        assert_eq!(
            wire.bytes.as_slice(),
            &[0x85, 0x04, b'a', b'b', 0x00, 0x00, broken[0], broken[1]]
        );
    }

    #[test]
    fn test_abort_writes_broken_trailer() {
        let encoder = Encoder::new(Config::default()).unwrap();
        let mut wire = Wire::default();
        let mut frame = encoder.start_frame(&mut wire, 2).unwrap();
        frame.write(b"ok").unwrap();
        frame.abort().unwrap();

        let broken = (crc16_baad(b"ok") ^ 1).to_be_bytes();
        assert_eq!(wire.bytes.as_slice(), &[0x85, 0x02, b'o', b'k', broken[0], broken[1]]);
    }

    #[test]
    fn test_io_error_propagates() {
        let encoder = Encoder::new(Config::default()).unwrap();
        let mut sink = Broken;
        assert_eq!(
            encoder.write_frame(&mut sink, b"x"),
            Err(WriteError::Io(embedded_io::ErrorKind::BrokenPipe))
        );
    }

    #[test]
    fn test_write_frame_too_long() {
        let encoder = Encoder::new(Config::new().max_packet(4)).unwrap();
        let mut wire = Wire::default();
        assert_eq!(
            encoder.write_frame(&mut wire, b"12345"),
            Err(WriteError::Encode(EncodeError::TooLong { len: 5, max: 4 }))
        );
        assert!(wire.bytes.is_empty());
    }
}
