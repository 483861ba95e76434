//! Cross-platform local transport
//!
//! Unix domain sockets (Unix/macOS) and named pipes (Windows) through the
//! interprocess crate, carrying length-prefixed JSON frames.

use std::io;

use serde::de::DeserializeOwned;
use serde::Serialize;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

use crate::common::paths;

/// Maximum frame size (1 MB); connector messages are tiny
const MAX_FRAME_SIZE: u32 = 1024 * 1024;

#[cfg(unix)]
pub mod platform {
    pub use interprocess::local_socket::tokio::{prelude::*, Listener, Stream};
    pub use interprocess::local_socket::{GenericFilePath, ListenerOptions};
}

#[cfg(windows)]
pub mod platform {
    pub use interprocess::local_socket::tokio::{prelude::*, Listener, Stream};
    pub use interprocess::local_socket::{GenericNamespaced, ListenerOptions};
}

use platform::*;

pub use platform::{Listener, Stream};

/// Listen on `endpoint` (target side)
///
/// Stale socket files from earlier runs are removed first.
pub async fn create_listener(endpoint: &str) -> io::Result<Listener> {
    paths::ensure_endpoint_dir(endpoint)?;
    paths::remove_endpoint(endpoint)?;

    #[cfg(unix)]
    let listener = {
        let name = endpoint.to_fs_name::<GenericFilePath>()?;
        ListenerOptions::new().name(name).create_tokio()?
    };

    #[cfg(windows)]
    let listener = {
        let name = endpoint.to_ns_name::<GenericNamespaced>()?;
        ListenerOptions::new().name(name).create_tokio()?
    };

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        std::fs::set_permissions(endpoint, std::fs::Permissions::from_mode(0o600))?;
    }

    Ok(listener)
}

/// Connect to the target listening on `endpoint` (harness side)
pub async fn connect(endpoint: &str) -> io::Result<Stream> {
    #[cfg(unix)]
    let stream = {
        let name = endpoint.to_fs_name::<GenericFilePath>()?;
        Stream::connect(name).await?
    };

    #[cfg(windows)]
    let stream = {
        let name = endpoint.to_ns_name::<GenericNamespaced>()?;
        Stream::connect(name).await?
    };

    Ok(stream)
}

/// Write one length-prefixed frame
pub async fn send_frame<W: AsyncWriteExt + Unpin>(writer: &mut W, data: &[u8]) -> io::Result<()> {
    let len = u32::try_from(data.len())
        .ok()
        .filter(|len| *len <= MAX_FRAME_SIZE)
        .ok_or_else(|| io::Error::new(io::ErrorKind::InvalidInput, "Frame too large"))?;

    writer.write_all(&len.to_le_bytes()).await?;
    writer.write_all(data).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed frame
pub async fn recv_frame<R: AsyncReadExt + Unpin>(reader: &mut R) -> io::Result<Vec<u8>> {
    let mut len_buf = [0u8; 4];
    reader.read_exact(&mut len_buf).await?;
    let len = u32::from_le_bytes(len_buf);

    if len > MAX_FRAME_SIZE {
        return Err(io::Error::new(
            io::ErrorKind::InvalidData,
            format!("Frame too large: {} bytes", len),
        ));
    }

    let mut data = vec![0u8; len as usize];
    reader.read_exact(&mut data).await?;
    Ok(data)
}

/// Serialize and send a message
pub async fn send_message<W, T>(writer: &mut W, message: &T) -> io::Result<()>
where
    W: AsyncWriteExt + Unpin,
    T: Serialize,
{
    let data = serde_json::to_vec(message)?;
    send_frame(writer, &data).await
}

/// Receive and deserialize a message
///
/// I/O failures come back as the outer error; a frame that arrived intact
/// but doesn't parse comes back as the inner error.
pub async fn recv_message<R, T>(reader: &mut R) -> io::Result<Result<T, serde_json::Error>>
where
    R: AsyncReadExt + Unpin,
    T: DeserializeOwned,
{
    let data = recv_frame(reader).await?;
    Ok(serde_json::from_slice(&data))
}
