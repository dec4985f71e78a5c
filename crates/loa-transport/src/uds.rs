use std::path::Path;

use tokio::net::UnixStream;
use tracing::debug;

use crate::error::{Result, TransportError};

/// Maximum socket path length.
/// Unix `sockaddr_un.sun_path` is typically 108 bytes on Linux, 104 on macOS.
#[cfg(target_os = "linux")]
pub const MAX_PATH_LEN: usize = 108;
#[cfg(not(target_os = "linux"))]
pub const MAX_PATH_LEN: usize = 104;

/// Connect to a device exposed on a Unix domain socket.
///
/// Used for firmware simulators and serial relays (`socat`), which present
/// the same byte stream as the real serial line.
pub async fn connect(path: impl AsRef<Path>) -> Result<UnixStream> {
    let path = path.as_ref();

    let path_bytes = path.as_os_str().len();
    if path_bytes >= MAX_PATH_LEN {
        return Err(TransportError::PathTooLong {
            path: path.to_path_buf(),
            len: path_bytes,
            max: MAX_PATH_LEN,
        });
    }

    let stream = UnixStream::connect(path)
        .await
        .map_err(|source| TransportError::Open {
            path: path.to_path_buf(),
            source,
        })?;
    debug!(?path, "connected to unix domain socket");
    Ok(stream)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn path_too_long() {
        let long_path = "/tmp/".to_string() + &"a".repeat(200) + ".sock";
        let result = connect(&long_path).await;
        assert!(matches!(result, Err(TransportError::PathTooLong { .. })));
    }

    #[tokio::test]
    async fn refused_connection_is_open_error() {
        let dir = std::env::temp_dir().join(format!("loa-uds-refused-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let sock_path = dir.join("gone.sock");

        let listener = std::os::unix::net::UnixListener::bind(&sock_path).unwrap();
        drop(listener);

        let result = connect(&sock_path).await;
        assert!(matches!(result, Err(TransportError::Open { .. })));

        let _ = std::fs::remove_dir_all(&dir);
    }
}
