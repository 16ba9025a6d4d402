use std::fs::{File, OpenOptions};
use std::io::{ErrorKind, Read, Write};
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::{Result, TransportError};
use crate::traits::ByteTransport;

/// Baud rate used by the AYAB firmware.
pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Serial line settings applied when a device is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SerialConfig {
    /// Line speed. Must be one of the standard termios rates.
    pub baud_rate: u32,
    /// How long a read waits for the first byte before reporting an idle
    /// link. Rounded up to whole deciseconds (the termios `VTIME` unit).
    pub read_timeout: Duration,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: Duration::from_millis(10),
        }
    }
}

/// A serial TTY (USB CDC-ACM device, UART, or pseudo-terminal) in raw 8N1 mode.
///
/// The file descriptor is released on [`ByteTransport::close`] or on drop,
/// whichever comes first.
pub struct SerialDevice {
    file: Option<File>,
    path: PathBuf,
    config: SerialConfig,
}

impl SerialDevice {
    /// Open a serial device with default settings (115200 baud, 8N1).
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        Self::open_with_config(path, SerialConfig::default())
    }

    /// Open a serial device with explicit settings.
    pub fn open_with_config(path: impl AsRef<Path>, config: SerialConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let speed = baud_to_speed(config.baud_rate)?;

        // O_NONBLOCK keeps open() from waiting on carrier detect; it is
        // cleared again once the line is configured.
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(&path)
            .map_err(|e| TransportError::Open {
                path: path.clone(),
                source: e,
            })?;

        configure_raw(&file, speed, config.read_timeout).map_err(|e| {
            TransportError::Configure {
                path: path.clone(),
                source: e,
            }
        })?;

        info!(?path, baud = config.baud_rate, "opened serial device");

        Ok(Self {
            file: Some(file),
            path,
            config,
        })
    }

    /// The device path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The settings the device was opened with.
    pub fn config(&self) -> &SerialConfig {
        &self.config
    }
}

impl ByteTransport for SerialDevice {
    fn read_available(&mut self, buf: &mut [u8]) -> std::io::Result<usize> {
        let Some(file) = self.file.as_mut() else {
            return Err(std::io::Error::from(ErrorKind::NotConnected));
        };
        loop {
            match file.read(buf) {
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
        let Some(file) = self.file.as_mut() else {
            return Err(std::io::Error::from(ErrorKind::NotConnected));
        };
        file.write_all(bytes)?;
        file.flush()
    }

    fn close(&mut self) -> std::io::Result<()> {
        if self.file.take().is_some() {
            info!(path = ?self.path, "closed serial device");
        }
        Ok(())
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }
}

impl Drop for SerialDevice {
    fn drop(&mut self) {
        if self.file.is_some() {
            debug!(path = ?self.path, "releasing serial device on drop");
        }
    }
}

impl std::fmt::Debug for SerialDevice {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SerialDevice")
            .field("path", &self.path)
            .field("baud_rate", &self.config.baud_rate)
            .field("open", &self.file.is_some())
            .finish()
    }
}

fn baud_to_speed(baud: u32) -> Result<libc::speed_t> {
    let speed = match baud {
        1200 => libc::B1200,
        2400 => libc::B2400,
        4800 => libc::B4800,
        9600 => libc::B9600,
        19_200 => libc::B19200,
        38_400 => libc::B38400,
        57_600 => libc::B57600,
        115_200 => libc::B115200,
        230_400 => libc::B230400,
        other => return Err(TransportError::UnsupportedBaud(other)),
    };
    Ok(speed)
}

fn timeout_deciseconds(timeout: Duration) -> libc::cc_t {
    let millis = timeout.as_millis();
    let tenths = millis.div_ceil(100).clamp(1, u128::from(libc::cc_t::MAX));
    tenths as libc::cc_t
}

fn configure_raw(file: &File, speed: libc::speed_t, read_timeout: Duration) -> std::io::Result<()> {
    let fd = file.as_raw_fd();

    // SAFETY: `termios` is a plain C struct; an all-zero value is a valid
    // destination for `tcgetattr`, which fully initializes it.
    let mut tio: libc::termios = unsafe { std::mem::zeroed() };

    // SAFETY: `fd` is an open descriptor owned by `file` for the duration of
    // this call and `tio` is a valid writable pointer.
    if unsafe { libc::tcgetattr(fd, &mut tio) } != 0 {
        return Err(std::io::Error::last_os_error());
    }

    // SAFETY: `tio` was initialized by `tcgetattr` above.
    unsafe {
        libc::cfmakeraw(&mut tio);
        if libc::cfsetispeed(&mut tio, speed) != 0 || libc::cfsetospeed(&mut tio, speed) != 0 {
            return Err(std::io::Error::last_os_error());
        }
    }
    tio.c_cflag |= libc::CLOCAL | libc::CREAD;
    tio.c_cflag &= !(libc::CSTOPB | libc::PARENB);
    tio.c_cc[libc::VMIN] = 0;
    tio.c_cc[libc::VTIME] = timeout_deciseconds(read_timeout);

    // SAFETY: `fd` is open and `tio` is a fully initialized termios struct.
    if unsafe { libc::tcsetattr(fd, libc::TCSANOW, &tio) } != 0 {
        return Err(std::io::Error::last_os_error());
    }

    // Drop whatever the device sent before we were listening.
    // SAFETY: `fd` is an open terminal descriptor.
    unsafe {
        libc::tcflush(fd, libc::TCIOFLUSH);
    }

    // SAFETY: plain fcntl flag manipulation on an open descriptor.
    let flags = unsafe { libc::fcntl(fd, libc::F_GETFL) };
    if flags < 0 {
        return Err(std::io::Error::last_os_error());
    }
    // SAFETY: as above.
    if unsafe { libc::fcntl(fd, libc::F_SETFL, flags & !libc::O_NONBLOCK) } < 0 {
        return Err(std::io::Error::last_os_error());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn open_missing_device() {
        let path = format!("/dev/knitlink-missing-{}", std::process::id());
        let result = SerialDevice::open(&path);
        assert!(matches!(result, Err(TransportError::Open { .. })));
    }

    #[test]
    fn unsupported_baud_rejected_before_open() {
        let config = SerialConfig {
            baud_rate: 12_345,
            ..SerialConfig::default()
        };
        let result = SerialDevice::open_with_config("/dev/null", config);
        assert!(matches!(result, Err(TransportError::UnsupportedBaud(12_345))));
    }

    #[test]
    fn non_tty_fails_configuration() {
        let result = SerialDevice::open("/dev/null");
        assert!(matches!(result, Err(TransportError::Configure { .. })));
    }

    #[test]
    fn timeout_rounds_up_to_deciseconds() {
        assert_eq!(timeout_deciseconds(Duration::from_millis(10)), 1);
        assert_eq!(timeout_deciseconds(Duration::from_millis(100)), 1);
        assert_eq!(timeout_deciseconds(Duration::from_millis(250)), 3);
        assert_eq!(timeout_deciseconds(Duration::ZERO), 1);
        assert_eq!(timeout_deciseconds(Duration::from_secs(3600)), 255);
    }

    #[test]
    #[cfg(target_os = "linux")]
    fn pty_roundtrip() {
        use std::os::fd::FromRawFd;

        // SAFETY: posix_openpt returns a new descriptor or -1.
        let master_fd = unsafe { libc::posix_openpt(libc::O_RDWR | libc::O_NOCTTY) };
        if master_fd < 0 {
            // No pty support in this environment.
            return;
        }
        // SAFETY: `master_fd` is a freshly opened descriptor we own.
        let mut master = unsafe { File::from_raw_fd(master_fd) };

        let mut name = [0 as libc::c_char; 128];
        // SAFETY: `master_fd` is a pty master and `name` is writable for its length.
        let ok = unsafe {
            libc::grantpt(master_fd) == 0
                && libc::unlockpt(master_fd) == 0
                && libc::ptsname_r(master_fd, name.as_mut_ptr(), name.len()) == 0
        };
        assert!(ok, "pty setup should succeed");
        // SAFETY: ptsname_r wrote a NUL-terminated string into `name`.
        let slave_path = unsafe { std::ffi::CStr::from_ptr(name.as_ptr()) }
            .to_string_lossy()
            .into_owned();

        let mut device = SerialDevice::open(&slave_path).unwrap();
        assert_eq!(device.describe(), slave_path);

        master.write_all(&[0xC0, 0x03, 0x00, 0xC0]).unwrap();
        let mut buf = [0u8; 16];
        let mut got = Vec::new();
        for _ in 0..20 {
            let n = device.read_available(&mut buf).unwrap();
            got.extend_from_slice(&buf[..n]);
            if got.len() >= 4 {
                break;
            }
        }
        assert_eq!(got, vec![0xC0, 0x03, 0x00, 0xC0]);

        // Idle link reads as zero bytes once VTIME expires.
        assert_eq!(device.read_available(&mut buf).unwrap(), 0);

        device.close().unwrap();
        device.close().unwrap();
        assert!(device.read_available(&mut buf).is_err());
    }
}
