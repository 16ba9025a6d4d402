//! Enumerated and fixed-width field types carried inside messages.
//!
//! Enumerations decode leniently: a value outside the known set is kept as
//! `Other(byte)` so the enclosing message is still delivered.

/// Carriage detected on the needle bed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Carriage {
    None,
    K,
    L,
    G,
    Other(u8),
}

impl Carriage {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => Carriage::None,
            1 => Carriage::K,
            2 => Carriage::L,
            3 => Carriage::G,
            other => Carriage::Other(other),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Carriage::None => 0,
            Carriage::K => 1,
            Carriage::L => 2,
            Carriage::G => 3,
            Carriage::Other(byte) => byte,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Carriage::None => "None",
            Carriage::K => "K",
            Carriage::L => "L",
            Carriage::G => "G",
            Carriage::Other(_) => "?",
        }
    }
}

/// Carriage travel direction, also used for the active hall sensor side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum Direction {
    Unknown,
    Left,
    Right,
    Other(u8),
}

impl Direction {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => Direction::Unknown,
            1 => Direction::Left,
            2 => Direction::Right,
            other => Direction::Other(other),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            Direction::Unknown => 0,
            Direction::Left => 1,
            Direction::Right => 2,
            Direction::Other(byte) => byte,
        }
    }

    /// Display label. `"Left "` is padded to the width of `"Right"`.
    pub fn label(self) -> &'static str {
        match self {
            Direction::Left => "Left ",
            Direction::Right => "Right",
            Direction::Unknown | Direction::Other(_) => "?",
        }
    }
}

/// Belt phase relative to the carriage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum BeltShift {
    Unknown,
    Regular,
    Shifted,
    RegularLeft,
    ShiftedLeft,
    Other(u8),
}

impl BeltShift {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => BeltShift::Unknown,
            1 => BeltShift::Regular,
            2 => BeltShift::Shifted,
            3 => BeltShift::RegularLeft,
            4 => BeltShift::ShiftedLeft,
            other => BeltShift::Other(other),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            BeltShift::Unknown => 0,
            BeltShift::Regular => 1,
            BeltShift::Shifted => 2,
            BeltShift::RegularLeft => 3,
            BeltShift::ShiftedLeft => 4,
            BeltShift::Other(byte) => byte,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            BeltShift::Regular => "Regular",
            BeltShift::Shifted => "Shifted",
            BeltShift::RegularLeft => "Regular (L)",
            BeltShift::ShiftedLeft => "Shifted (L)",
            BeltShift::Unknown | BeltShift::Other(_) => "?",
        }
    }
}

/// Knitting machine model, as numbered by the firmware.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub enum MachineType {
    Kh910,
    Kh930,
    Kh270,
    Other(u8),
}

impl MachineType {
    pub fn from_byte(byte: u8) -> Self {
        match byte {
            0 => MachineType::Kh910,
            1 => MachineType::Kh930,
            2 => MachineType::Kh270,
            other => MachineType::Other(other),
        }
    }

    pub fn to_byte(self) -> u8 {
        match self {
            MachineType::Kh910 => 0,
            MachineType::Kh930 => 1,
            MachineType::Kh270 => 2,
            MachineType::Other(byte) => byte,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            MachineType::Kh910 => "KH910",
            MachineType::Kh930 => "KH930",
            MachineType::Kh270 => "KH270",
            MachineType::Other(_) => "?",
        }
    }
}

/// Flag byte of a `confirm-line` message.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
pub struct LineFlags(pub u8);

impl LineFlags {
    /// Bit 0: this is the final line of the pattern.
    pub const LAST_LINE: LineFlags = LineFlags(0x01);
    pub const NONE: LineFlags = LineFlags(0x00);

    pub fn is_last_line(self) -> bool {
        self.0 & Self::LAST_LINE.0 != 0
    }

    pub fn bits(self) -> u8 {
        self.0
    }
}

/// Fixed-size byte array interpreted as ASCII text, NUL padded.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct FixedString<const N: usize>([u8; N]);

impl<const N: usize> FixedString<N> {
    /// Wrap raw bytes as received.
    pub fn from_bytes(bytes: [u8; N]) -> Self {
        Self(bytes)
    }

    /// Build from text, truncating to `N` bytes and padding with NULs.
    pub fn from_text(text: &str) -> Self {
        let mut bytes = [0u8; N];
        let src = text.as_bytes();
        let n = src.len().min(N);
        bytes[..n].copy_from_slice(&src[..n]);
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; N] {
        &self.0
    }

    /// Text up to the first NUL; non-ASCII bytes render as U+FFFD.
    pub fn as_str(&self) -> String {
        let end = self.0.iter().position(|&b| b == 0).unwrap_or(N);
        self.0[..end]
            .iter()
            .map(|&b| if b.is_ascii() { b as char } else { '\u{FFFD}' })
            .collect()
    }
}

impl<const N: usize> Default for FixedString<N> {
    fn default() -> Self {
        Self([0u8; N])
    }
}

impl<const N: usize> std::fmt::Debug for FixedString<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self.as_str())
    }
}

impl<const N: usize> std::fmt::Display for FixedString<N> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.as_str())
    }
}

#[cfg(feature = "serde")]
impl<const N: usize> serde::Serialize for FixedString<N> {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn enum_bytes_roundtrip() {
        for byte in 0..=255u8 {
            assert_eq!(Carriage::from_byte(byte).to_byte(), byte);
            assert_eq!(Direction::from_byte(byte).to_byte(), byte);
            assert_eq!(BeltShift::from_byte(byte).to_byte(), byte);
            assert_eq!(MachineType::from_byte(byte).to_byte(), byte);
        }
    }

    #[test]
    fn labels() {
        assert_eq!(Carriage::from_byte(0).label(), "None");
        assert_eq!(Carriage::from_byte(1).label(), "K");
        assert_eq!(Carriage::from_byte(3).label(), "G");
        assert_eq!(Direction::from_byte(0).label(), "?");
        assert_eq!(Direction::from_byte(1).label(), "Left ");
        assert_eq!(Direction::from_byte(2).label(), "Right");
        assert_eq!(BeltShift::from_byte(3).label(), "Regular (L)");
        assert_eq!(BeltShift::from_byte(4).label(), "Shifted (L)");
        assert_eq!(BeltShift::from_byte(9), BeltShift::Other(9));
        assert_eq!(MachineType::from_byte(1).label(), "KH930");
    }

    #[test]
    fn line_flags() {
        assert!(LineFlags::LAST_LINE.is_last_line());
        assert!(!LineFlags::NONE.is_last_line());
        assert!(LineFlags(0x81).is_last_line());
        assert_eq!(LineFlags(0x80).bits(), 0x80);
    }

    #[test]
    fn fixed_string_trims_padding() {
        let text = FixedString::<16>::from_text("1.0.0-rc1");
        assert_eq!(text.as_str(), "1.0.0-rc1");
        assert_eq!(&text.as_bytes()[9..], &[0u8; 7]);
    }

    #[test]
    fn fixed_string_stops_at_first_nul() {
        let text = FixedString::<8>::from_bytes([b'1', b'.', b'0', 0, b'x', b'y', 0, 0]);
        assert_eq!(text.as_str(), "1.0");
    }

    #[test]
    fn fixed_string_truncates_and_replaces_non_ascii() {
        let text = FixedString::<4>::from_text("abcdef");
        assert_eq!(text.as_str(), "abcd");

        let raw = FixedString::<4>::from_bytes([b'v', 0xFF, b'1', 0]);
        assert_eq!(raw.as_str(), "v\u{FFFD}1");
        assert_eq!(FixedString::<4>::default().as_str(), "");
    }
}
