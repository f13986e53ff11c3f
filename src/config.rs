//! Link configuration shared by the encoder and the receiver.

use crate::error::ConfigError;

/// Default start byte.
pub const FRAME_START: u8 = 0x85;

/// Default maximum gap between two bytes of one frame, in milliseconds.
pub const DEFAULT_MAX_IDLE_MS: u32 = 10;

/// Default maximum payload length. Fits the one-byte length field.
pub const DEFAULT_MAX_PACKET: usize = 127;

/// Largest payload length a one-byte length field can carry.
pub const MAX_ONE_BYTE_PACKET: u16 = 255;

/// Largest payload length the two-byte length field can carry.
pub const MAX_TWO_BYTE_PACKET: u16 = 0x7FFF;

/// Framing parameters.
///
/// Both ends of a link must agree on `max_packet` (it selects the length
/// encoding) and `frame_start`. `max_idle_ms` only affects the receiver.
///
/// ```
/// use serial_packer::Config;
///
/// let config = Config::new().max_packet(500).frame_start(None).max_idle_ms(50);
/// assert!(config.two_byte_length());
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    max_idle_ms: u32,
    max_packet: u16,
    frame_start: Option<u8>,
}

impl Config {
    /// Default configuration: 10 ms idle timeout, 127-byte payloads, start
    /// byte `0x85`.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            max_idle_ms: DEFAULT_MAX_IDLE_MS,
            max_packet: DEFAULT_MAX_PACKET as u16,
            frame_start: Some(FRAME_START),
        }
    }

    /// Set the maximum gap between two bytes of one frame.
    #[must_use]
    pub const fn max_idle_ms(mut self, ms: u32) -> Self {
        self.max_idle_ms = ms;
        self
    }

    /// Set the maximum payload length.
    ///
    /// Up to 255 the length is always sent as one byte. Above 255, lengths
    /// over 127 take two bytes.
    #[must_use]
    pub const fn max_packet(mut self, len: u16) -> Self {
        self.max_packet = len;
        self
    }

    /// Set the start byte, or `None` to rely solely on the idle timeout.
    #[must_use]
    pub const fn frame_start(mut self, start: Option<u8>) -> Self {
        self.frame_start = start;
        self
    }

    /// Maximum gap between two bytes of one frame, in milliseconds.
    #[inline]
    #[must_use]
    pub const fn idle_timeout_ms(&self) -> u32 {
        self.max_idle_ms
    }

    /// Maximum payload length.
    #[inline]
    #[must_use]
    pub const fn packet_limit(&self) -> u16 {
        self.max_packet
    }

    /// Configured start byte.
    #[inline]
    #[must_use]
    pub const fn start_byte(&self) -> Option<u8> {
        self.frame_start
    }

    /// Whether long payloads use the two-byte length field.
    #[inline]
    #[must_use]
    pub const fn two_byte_length(&self) -> bool {
        self.max_packet > MAX_ONE_BYTE_PACKET
    }

    /// Check the parameters.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::ZeroMaxPacket`] if no payload would fit,
    /// [`ConfigError::ZeroIdleTimeout`] if no frame could complete, or
    /// [`ConfigError::MaxPacketTooLarge`] if `max_packet` exceeds what the
    /// two-byte length field can express.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.max_packet == 0 {
            return Err(ConfigError::ZeroMaxPacket);
        }
        if self.max_idle_ms == 0 {
            return Err(ConfigError::ZeroIdleTimeout);
        }
        if self.max_packet > MAX_TWO_BYTE_PACKET {
            return Err(ConfigError::MaxPacketTooLarge {
                max_packet: self.max_packet,
            });
        }
        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.idle_timeout_ms(), 10);
        assert_eq!(config.packet_limit(), 127);
        assert_eq!(config.start_byte(), Some(0x85));
        assert!(!config.two_byte_length());
        assert_eq!(config.validate(), Ok(()));
    }

    #[test]
    fn test_length_mode_boundary() {
        assert!(!Config::new().max_packet(255).two_byte_length());
        assert!(Config::new().max_packet(256).two_byte_length());
    }

    #[test]
    fn test_validate_rejects_zero() {
        assert_eq!(
            Config::new().max_packet(0).validate(),
            Err(ConfigError::ZeroMaxPacket)
        );
    }

    #[test]
    fn test_validate_rejects_zero_idle_timeout() {
        assert_eq!(
            Config::new().max_idle_ms(0).validate(),
            Err(ConfigError::ZeroIdleTimeout)
        );
        assert_eq!(Config::new().max_idle_ms(1).validate(), Ok(()));
    }

    #[test]
    fn test_validate_rejects_oversize() {
        assert_eq!(Config::new().max_packet(0x7FFF).validate(), Ok(()));
        assert_eq!(
            Config::new().max_packet(0x8000).validate(),
            Err(ConfigError::MaxPacketTooLarge { max_packet: 0x8000 })
        );
    }
}
