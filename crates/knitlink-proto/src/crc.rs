//! CRC-8 after Maxim/Dallas (reflected polynomial 0x8C, LSB first).

const POLY: u8 = 0x8C;

/// Compute the Maxim/Dallas CRC-8 of `data`, starting from `initial`.
///
/// Seeding with a previous result continues the computation, so
/// `crc8(crc8(0, a), b) == crc8(0, ab)`.
pub fn crc8(initial: u8, data: &[u8]) -> u8 {
    let mut crc = initial;
    for &byte in data {
        let mut bits = byte;
        for _ in 0..8 {
            let feedback = (crc ^ bits) & 0x01;
            crc >>= 1;
            if feedback != 0 {
                crc ^= POLY;
            }
            bits >>= 1;
        }
    }
    crc
}

/// Incremental CRC-8 digest.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Crc8 {
    value: u8,
}

impl Crc8 {
    /// Start a digest from zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Start a digest from an explicit seed.
    pub fn with_initial(initial: u8) -> Self {
        Self { value: initial }
    }

    /// Feed more bytes.
    pub fn update(&mut self, data: &[u8]) {
        self.value = crc8(self.value, data);
    }

    /// The checksum of everything fed so far.
    pub fn finish(&self) -> u8 {
        self.value
    }
}
