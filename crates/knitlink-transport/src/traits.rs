use std::io::{ErrorKind, Read, Write};

/// A bidirectional byte stream to the knitting machine controller.
///
/// This is the injection seam used by the session layer. Reads are bounded
/// and must return promptly: an idle link yields `Ok(0)`, never an error.
/// Implementations normalize `WouldBlock` and `TimedOut` to `Ok(0)`.
pub trait ByteTransport {
    /// Read whatever is available, up to `buf.len()` bytes.
    fn read_available(&mut self, buf: &mut [u8]) -> std::io::Result<usize>;

    /// Write all bytes to the stream.
    fn write_all_bytes(&mut self, bytes: &[u8]) -> std::io::Result<()>;

    /// Release the underlying resource. Calling `close` twice is allowed.
    fn close(&mut self) -> std::io::Result<()>;

    /// Human-readable identifier for logs and errors.
    fn describe(&self) -> String;
}

/// Owned, type-erased transport handle.
pub type BoxedTransport = Box<dyn ByteTransport + Send>;

impl<T: ByteTransport + ?Sized> ByteTransport for Box<T> {
    fn read_available(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        (**self).read_available(buf)
    }

    fn write_all_bytes(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        (**self).write_all_bytes(bytes)
    }

    fn close(&mut self) -> std::io::Result<()> {
        (**self).close()
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

/// Adapts any `Read + Write` stream (a socket to a serial bridge, a pipe)
/// into a [`ByteTransport`].
///
/// The stream should already be configured with a short read timeout or
/// non-blocking mode; otherwise `read_available` blocks until data arrives.
pub struct IoTransport<T> {
    inner: Option<T>,
    label: String,
}

impl<T: Read + Write> IoTransport<T> {
    /// Wrap a stream with a label used in diagnostics.
    pub fn new(inner: T, label: impl Into<String>) -> Self {
        Self {
            inner: Some(inner),
            label: label.into(),
        }
    }

    /// Borrow the underlying stream, if still open.
    pub fn get_ref(&self) -> Option<&T> {
        self.inner.as_ref()
    }

    /// Consume the transport and return the inner stream, if still open.
    pub fn into_inner(self) -> Option<T> {
        self.inner
    }
}

impl<T: Read + Write> ByteTransport for IoTransport<T> {
    fn read_available(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let Some(inner) = self.inner.as_mut() else {
            return Err(std::io::Error::from(ErrorKind::NotConnected));
        };
        loop {
            match inner.read(buf) {
                Ok(n) => return Ok(n),
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err)
                    if matches!(err.kind(), ErrorKind::WouldBlock | ErrorKind::TimedOut) =>
                {
                    return Ok(0)
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn write_all_bytes(&mut self, bytes: &[u8]) -> std::io::Result<()> {
        let Some(inner) = self.inner.as_mut() else {
            return Err(std::io::Error::from(ErrorKind::NotConnected));
        };
        inner.write_all(bytes)?;
        inner.flush()
    }

    fn close(&mut self) -> std::io::Result<()> {
        self.inner = None;
        Ok(())
    }

    fn describe(&self) -> String {
        self.label.clone()
    }
}

impl<T> std::fmt::Debug for IoTransport<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoTransport")
            .field("label", &self.label)
            .field("open", &self.inner.is_some())
            .finish()
    }
}
