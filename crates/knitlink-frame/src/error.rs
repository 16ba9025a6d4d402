/// Non-fatal problems found while decoding a SLIP stream.
///
/// Each anomaly discards the frame in progress; decoding resumes with the
/// next frame after an end marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FrameAnomaly {
    /// An escape byte was followed by something other than `0xDC`/`0xDD`.
    #[error("invalid escape sequence (0xDB followed by 0x{0:02X})")]
    InvalidEscape(u8),

    /// The frame grew past the configured maximum length.
    #[error("frame exceeds {max} bytes")]
    Oversized { max: usize },
}
