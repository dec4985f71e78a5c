use std::os::unix::fs::FileTypeExt;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tracing::debug;

use crate::config::TransportConfig;
use crate::error::{Result, TransportError};
use crate::tty::SerialPort;

/// A connected device byte stream, implements `AsyncRead + AsyncWrite`.
///
/// This is the type returned by [`DeviceStream::open`]. Serial devices are
/// driven through a non-blocking tty descriptor, sockets through tokio's
/// `UnixStream`.
pub struct DeviceStream {
    inner: DeviceStreamInner,
}

enum DeviceStreamInner {
    Serial(SerialPort),
    Unix(tokio::net::UnixStream),
}

impl DeviceStream {
    /// Open the transport described by `config`.
    ///
    /// Character devices are opened as serial lines at `config.baud_rate`;
    /// sockets are connected to. Anything else is rejected.
    pub async fn open(config: &TransportConfig) -> Result<Self> {
        let metadata =
            std::fs::metadata(&config.path).map_err(|source| TransportError::Open {
                path: config.path.clone(),
                source,
            })?;
        let file_type = metadata.file_type();

        let inner = if file_type.is_char_device() {
            DeviceStreamInner::Serial(SerialPort::open(&config.path, config.baud_rate)?)
        } else if file_type.is_socket() {
            DeviceStreamInner::Unix(crate::uds::connect(&config.path).await?)
        } else {
            return Err(TransportError::UnsupportedDevice {
                path: config.path.clone(),
            });
        };

        let stream = Self { inner };
        debug!(path = ?config.path, kind = stream.kind(), "device stream open");
        Ok(stream)
    }

    /// Transport name for diagnostics.
    pub fn kind(&self) -> &'static str {
        match &self.inner {
            DeviceStreamInner::Serial(_) => "serial",
            DeviceStreamInner::Unix(_) => "unix-socket",
        }
    }
}

impl AsyncRead for DeviceStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match &mut self.get_mut().inner {
            DeviceStreamInner::Serial(port) => Pin::new(port).poll_read(cx, buf),
            DeviceStreamInner::Unix(stream) => Pin::new(stream).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for DeviceStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match &mut self.get_mut().inner {
            DeviceStreamInner::Serial(port) => Pin::new(port).poll_write(cx, buf),
            DeviceStreamInner::Unix(stream) => Pin::new(stream).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match &mut self.get_mut().inner {
            DeviceStreamInner::Serial(port) => Pin::new(port).poll_flush(cx),
            DeviceStreamInner::Unix(stream) => Pin::new(stream).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match &mut self.get_mut().inner {
            DeviceStreamInner::Serial(port) => Pin::new(port).poll_shutdown(cx),
            DeviceStreamInner::Unix(stream) => Pin::new(stream).poll_shutdown(cx),
        }
    }
}

impl std::fmt::Debug for DeviceStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeviceStream")
            .field("type", &self.kind())
            .finish()
    }
}
