//! Bit-exact codec for the packed port byte exchanged with the device.
//!
//! The digital port carries three fields in a single byte, MSB first:
//!
//! | bits  | field     | range |
//! |-------|-----------|-------|
//! | 7     | enable    | 0-1   |
//! | 6-5   | level     | 0-3   |
//! | 4-0   | frequency | 0-31  |
//!
//! This layout is the wire contract with the device and must be preserved
//! exactly. [`PortPacket::encode`] and [`PortPacket::decode`] form a
//! round-trip pair.

pub const ENABLE_BIT: u8 = 0b1000_0000;
pub const LEVEL_MASK: u8 = 0b0110_0000;
pub const FREQ_MASK: u8 = 0b0001_1111;

pub const LEVEL_SHIFT: u8 = 5;

/// Largest value the 2-bit level field can carry.
pub const LEVEL_MAX: u8 = 3;
/// Largest value the 5-bit frequency field can carry.
pub const FREQ_MAX: u8 = 31;

/// Decoded view of the packed port byte.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PortPacket {
    pub enable: bool,
    pub level: u8,
    pub frequency: u8,
}

impl PortPacket {
    /// Constructs a packet from its fields.
    ///
    /// Field widths are fixed by the wire format; out-of-range values are a
    /// programmer error and panic.
    pub fn new(enable: bool, level: u8, frequency: u8) -> Self {
        assert!(
            level <= LEVEL_MAX,
            "level {} does not fit the 2-bit field (max {})",
            level,
            LEVEL_MAX
        );
        assert!(
            frequency <= FREQ_MAX,
            "frequency {} does not fit the 5-bit field (max {})",
            frequency,
            FREQ_MAX
        );
        Self {
            enable,
            level,
            frequency,
        }
    }

    /// Packs the fields into the wire byte.
    pub fn encode(&self) -> u8 {
        let enable = if self.enable { ENABLE_BIT } else { 0 };
        enable | ((self.level << LEVEL_SHIFT) & LEVEL_MASK) | (self.frequency & FREQ_MASK)
    }

    /// Unpacks a wire byte into its fields. Total: every byte decodes.
    pub fn decode(byte: u8) -> Self {
        Self {
            enable: byte & ENABLE_BIT != 0,
            level: (byte & LEVEL_MASK) >> LEVEL_SHIFT,
            frequency: byte & FREQ_MASK,
        }
    }
}
