//! Bluetooth UUID handling
use std::fmt;
use std::hash::{Hash, Hasher};

/// Represents a 128-bit Bluetooth UUID.
///
/// Handles conversions between 16-bit, 32-bit, and 128-bit Bluetooth UUID
/// formats. Internally the UUID is always stored as a 128-bit value in
/// little-endian byte order, so equality across widths comes for free:
/// `Uuid::from_u16(0x2800)` equals its expanded 128-bit form.
#[derive(Clone, Copy, Eq, PartialEq, Ord, PartialOrd)]
pub struct Uuid {
    bytes: [u8; 16],
}

/// The base UUID used for constructing 128-bit UUIDs from 16-bit and 32-bit values.
/// Defined as "00000000-0000-1000-8000-00805F9B34FB" (little-endian representation).
const BASE_UUID_BYTES: [u8; 16] = [
    0xFB, 0x34, 0x9B, 0x5F, 0x80, 0x00, 0x00, 0x80, 0x00, 0x10, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00,
];

/// Offset within the base UUID where the 16/32-bit value is inserted.
const BASE_OFFSET: usize = 12;

impl Uuid {
    /// Creates a new 128-bit UUID directly from 16 bytes (little-endian).
    pub const fn from_bytes_le(bytes: [u8; 16]) -> Self {
        Uuid { bytes }
    }

    /// Creates a 128-bit UUID from a 16-bit SIG-assigned value.
    /// Formula: `value * 2^96 + BASE_UUID`
    pub const fn from_u16(uuid16: u16) -> Self {
        let mut bytes = BASE_UUID_BYTES;
        bytes[BASE_OFFSET] = uuid16 as u8;
        bytes[BASE_OFFSET + 1] = (uuid16 >> 8) as u8;
        Uuid { bytes }
    }

    /// Creates a 128-bit UUID from a 32-bit SIG-assigned value.
    /// Formula: `value * 2^96 + BASE_UUID`
    pub const fn from_u32(uuid32: u32) -> Self {
        let mut bytes = BASE_UUID_BYTES;
        bytes[BASE_OFFSET] = uuid32 as u8;
        bytes[BASE_OFFSET + 1] = (uuid32 >> 8) as u8;
        bytes[BASE_OFFSET + 2] = (uuid32 >> 16) as u8;
        bytes[BASE_OFFSET + 3] = (uuid32 >> 24) as u8;
        Uuid { bytes }
    }

    /// Tries to create a UUID from a byte slice.
    ///
    /// Accepts slices of length 2 (16-bit), 4 (32-bit), or 16 (128-bit).
    /// Bytes are assumed to be in little-endian order.
    /// Returns `None` if the slice length is invalid.
    pub fn try_from_slice_le(slice: &[u8]) -> Option<Self> {
        match slice.len() {
            2 => {
                let uuid16 = u16::from_le_bytes([slice[0], slice[1]]);
                Some(Uuid::from_u16(uuid16))
            }
            4 => {
                let uuid32 = u32::from_le_bytes([slice[0], slice[1], slice[2], slice[3]]);
                Some(Uuid::from_u32(uuid32))
            }
            16 => {
                let mut bytes = [0u8; 16];
                bytes.copy_from_slice(slice);
                Some(Uuid::from_bytes_le(bytes))
            }
            _ => None,
        }
    }

    /// Returns the underlying 16 bytes in little-endian order.
    pub const fn as_bytes_le(&self) -> &[u8; 16] {
        &self.bytes
    }

    /// Checks if the UUID is derived from the standard Bluetooth base UUID.
    fn is_sig_assigned(&self) -> bool {
        self.bytes[0..BASE_OFFSET] == BASE_UUID_BYTES[0..BASE_OFFSET]
    }

    /// Tries to represent the UUID as a 16-bit value.
    ///
    /// Returns `Some(u16)` if the UUID is a standard SIG-assigned 16-bit UUID,
    /// otherwise returns `None`.
    pub fn as_u16(&self) -> Option<u16> {
        if self.is_sig_assigned()
            && self.bytes[BASE_OFFSET + 2] == 0
            && self.bytes[BASE_OFFSET + 3] == 0
        {
            Some(u16::from_le_bytes([
                self.bytes[BASE_OFFSET],
                self.bytes[BASE_OFFSET + 1],
            ]))
        } else {
            None
        }
    }

    /// Tries to represent the UUID as a 32-bit value.
    ///
    /// Returns `Some(u32)` if the UUID is a standard SIG-assigned 32-bit UUID,
    /// otherwise returns `None`.
    pub fn as_u32(&self) -> Option<u32> {
        if self.is_sig_assigned() {
            Some(u32::from_le_bytes([
                self.bytes[BASE_OFFSET],
                self.bytes[BASE_OFFSET + 1],
                self.bytes[BASE_OFFSET + 2],
                self.bytes[BASE_OFFSET + 3],
            ]))
        } else {
            None
        }
    }

    /// Returns the size in octets of the smallest wire encoding of this UUID.
    ///
    /// ATT only understands 16-bit and 128-bit UUIDs; pass
    /// `allow_32bit = false` there so a 32-bit-only value widens to 16 octets.
    pub fn compact_size(&self, allow_32bit: bool) -> usize {
        if self.as_u16().is_some() {
            2
        } else if allow_32bit && self.as_u32().is_some() {
            4
        } else {
            16
        }
    }

    /// Serializes the smallest wire encoding, little-endian.
    pub fn to_compact_bytes(&self, allow_32bit: bool) -> Vec<u8> {
        match self.compact_size(allow_32bit) {
            2 => self.bytes[BASE_OFFSET..BASE_OFFSET + 2].to_vec(),
            4 => self.bytes[BASE_OFFSET..BASE_OFFSET + 4].to_vec(),
            _ => self.bytes.to_vec(),
        }
    }
}

// --- From Implementations ---

impl From<u16> for Uuid {
    fn from(uuid16: u16) -> Self {
        Uuid::from_u16(uuid16)
    }
}

impl From<u32> for Uuid {
    fn from(uuid32: u32) -> Self {
        Uuid::from_u32(uuid32)
    }
}

impl From<[u8; 16]> for Uuid {
    /// Assumes bytes are in little-endian order.
    fn from(bytes: [u8; 16]) -> Self {
        Uuid::from_bytes_le(bytes)
    }
}

// --- PartialEq Implementations ---

impl PartialEq<u16> for Uuid {
    fn eq(&self, other: &u16) -> bool {
        self.as_u16() == Some(*other)
    }
}

impl PartialEq<Uuid> for u16 {
    fn eq(&self, other: &Uuid) -> bool {
        other.as_u16() == Some(*self)
    }
}

// --- Hashing ---

impl Hash for Uuid {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.bytes.hash(state);
    }
}

impl fmt::Display for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Standard hyphenated format (big-endian)
        let mut b = self.bytes;
        b.reverse();
        write!(f, "{:02x}{:02x}{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}-{:02x}{:02x}{:02x}{:02x}{:02x}{:02x}",
            b[0], b[1], b[2], b[3], b[4], b[5], b[6], b[7],
            b[8], b[9], b[10], b[11], b[12], b[13], b[14], b[15]
        )
    }
}

impl fmt::Debug for Uuid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // Show short form if possible, otherwise full hyphenated form
        if let Some(u16_val) = self.as_u16() {
            write!(f, "Uuid(0x{:04X})", u16_val)
        } else if let Some(u32_val) = self.as_u32() {
            write!(f, "Uuid(0x{:08X})", u32_val)
        } else {
            fmt::Display::fmt(self, f)
        }
    }
}
