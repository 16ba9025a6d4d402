use knitlink_transport::TransportError;

/// Errors that can occur in session operations.
///
/// Frame anomalies, rejected payloads and checksum mismatches are not
/// errors; they are counted in [`SessionStats`](crate::SessionStats) and
/// the link stays usable.
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The port could not be opened or configured.
    #[error("failed to open {port}: {source}")]
    Open {
        port: String,
        source: TransportError,
    },

    /// No transport is bound to the session.
    #[error("session is not open")]
    NotOpen,

    /// Writing a frame to the transport failed.
    #[error("write failed: {0}")]
    Write(std::io::Error),

    /// Reading from the transport failed.
    #[error("read failed: {0}")]
    Read(std::io::Error),
}

impl SessionError {
    /// Whether this error belongs to the write category (closed session or
    /// failed write).
    pub fn is_write_error(&self) -> bool {
        matches!(self, SessionError::NotOpen | SessionError::Write(_))
    }
}

pub type Result<T> = std::result::Result<T, SessionError>;
