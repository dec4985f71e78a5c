use std::fs::{File, OpenOptions};
use std::io::{Read, Write};
use std::os::fd::AsRawFd;
use std::os::unix::fs::OpenOptionsExt;
use std::path::Path;
use std::pin::Pin;
use std::task::{ready, Context, Poll};

use tokio::io::unix::AsyncFd;
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tracing::debug;

use crate::error::{Result, TransportError};

/// A serial line opened in raw mode and driven by the tokio reactor.
pub struct SerialPort {
    fd: AsyncFd<File>,
}

impl SerialPort {
    /// Open `path` as a raw 8N1 serial line at `baud_rate`.
    pub fn open(path: &Path, baud_rate: u32) -> Result<Self> {
        let speed = speed_for(baud_rate)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .custom_flags(libc::O_NOCTTY | libc::O_NONBLOCK)
            .open(path)
            .map_err(|source| TransportError::Open {
                path: path.to_path_buf(),
                source,
            })?;

        configure_raw(&file, speed).map_err(|source| TransportError::Configure {
            path: path.to_path_buf(),
            source,
        })?;

        let fd = AsyncFd::new(file)?;
        debug!(?path, baud_rate, "serial line configured");
        Ok(Self { fd })
    }
}

fn speed_for(baud_rate: u32) -> Result<libc::speed_t> {
    let speed = match baud_rate {
        1200 => libc::B1200,
        2400 => libc::B2400,
        4800 => libc::B4800,
        9600 => libc::B9600,
        19200 => libc::B19200,
        38400 => libc::B38400,
        57600 => libc::B57600,
        115200 => libc::B115200,
        230400 => libc::B230400,
        other => return Err(TransportError::UnsupportedBaudRate(other)),
    };
    Ok(speed)
}

fn configure_raw(file: &File, speed: libc::speed_t) -> std::io::Result<()> {
    let fd = file.as_raw_fd();

    // SAFETY: `termios` is plain old data; zeroed is a valid starting value and
    // is fully overwritten by `tcgetattr` before use.
    let mut termios: libc::termios = unsafe { std::mem::zeroed() };

    // SAFETY: `fd` is an open descriptor owned by `file` for the duration of
    // these calls and `termios` is a valid, writable termios struct.
    unsafe {
        if libc::tcgetattr(fd, &mut termios) != 0 {
            return Err(std::io::Error::last_os_error());
        }
        libc::cfmakeraw(&mut termios);
        termios.c_cflag |= libc::CLOCAL | libc::CREAD;
        if libc::cfsetispeed(&mut termios, speed) != 0
            || libc::cfsetospeed(&mut termios, speed) != 0
        {
            return Err(std::io::Error::last_os_error());
        }
        if libc::tcsetattr(fd, libc::TCSANOW, &termios) != 0 {
            return Err(std::io::Error::last_os_error());
        }
    }
    Ok(())
}

impl AsyncRead for SerialPort {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        loop {
            let mut guard = ready!(self.fd.poll_read_ready(cx))?;
            let unfilled = buf.initialize_unfilled();
            match guard.try_io(|inner| inner.get_ref().read(unfilled)) {
                Ok(Ok(read)) => {
                    buf.advance(read);
                    return Poll::Ready(Ok(()));
                }
                Ok(Err(err)) => return Poll::Ready(Err(err)),
                Err(_would_block) => continue,
            }
        }
    }
}

impl AsyncWrite for SerialPort {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        loop {
            let mut guard = ready!(self.fd.poll_write_ready(cx))?;
            match guard.try_io(|inner| inner.get_ref().write(buf)) {
                Ok(result) => return Poll::Ready(result),
                Err(_would_block) => continue,
            }
        }
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn common_baud_rates_are_supported() {
        for baud in [9600, 57600, 115200] {
            assert!(speed_for(baud).is_ok(), "{baud} should map to a termios speed");
        }
    }

    #[test]
    fn odd_baud_rate_is_rejected() {
        let err = speed_for(12345).unwrap_err();
        assert!(matches!(err, TransportError::UnsupportedBaudRate(12345)));
    }

    #[test]
    fn regular_file_cannot_be_configured() {
        let dir = std::env::temp_dir().join(format!("loa-tty-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("not-a-tty");
        std::fs::write(&path, b"").unwrap();

        let err = SerialPort::open(&path, 9600).err().unwrap();
        assert!(matches!(err, TransportError::Configure { .. }));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
