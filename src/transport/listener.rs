//! Stream sockets for the frame transport.
//!
//! - TCP on every platform
//! - Unix Domain Sockets on Unix
//!
//! # Example
//!
//! ```ignore
//! use xrpc::endpoint::Endpoint;
//! use xrpc::transport::{Listener, Stream};
//!
//! let listener = Listener::bind(&Endpoint::parse("tcp://127.0.0.1:0")).await?;
//! let addr = listener.local_endpoint()?;
//! let stream = Stream::connect(&addr).await?;
//! ```

use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::{TcpListener, TcpStream};

use crate::endpoint::{Endpoint, Network};
use crate::error::{Result, XrpcError};

#[cfg(unix)]
use tokio::net::{UnixListener, UnixStream};

/// Bound server socket.
pub enum Listener {
    /// TCP listener.
    Tcp(TcpListener),
    /// Unix socket listener; the socket file is removed on drop.
    #[cfg(unix)]
    Unix {
        /// Underlying listener.
        listener: UnixListener,
        /// Socket path.
        path: String,
    },
}

impl Listener {
    /// Bind to `endpoint`.
    ///
    /// For Unix sockets a stale socket file at the path is removed first. A
    /// socket something still answers on, or any other kind of file, fails
    /// with an `AddrInUse` I/O error and is left in place.
    ///
    /// # Errors
    ///
    /// [`XrpcError::UnsupportedNetwork`] for schemes other than TCP and Unix
    /// (Unix only on Unix platforms), or the bind I/O error.
    pub async fn bind(endpoint: &Endpoint) -> Result<Self> {
        match endpoint.network() {
            Network::Tcp => Ok(Listener::Tcp(TcpListener::bind(endpoint.address()).await?)),
            #[cfg(unix)]
            Network::Unix => {
                let path = endpoint.address();
                remove_stale_socket(path).await?;
                Ok(Listener::Unix {
                    listener: UnixListener::bind(path)?,
                    path: path.to_string(),
                })
            }
            other => Err(XrpcError::UnsupportedNetwork(other.scheme().to_string())),
        }
    }

    /// Accept one connection. Returns the stream and a printable peer name.
    pub async fn accept(&self) -> Result<(Stream, String)> {
        match self {
            Listener::Tcp(listener) => {
                let (stream, addr) = listener.accept().await?;
                let _ = stream.set_nodelay(true);
                Ok((Stream::Tcp(stream), addr.to_string()))
            }
            #[cfg(unix)]
            Listener::Unix { listener, path } => {
                let (stream, _addr) = listener.accept().await?;
                Ok((Stream::Unix(stream), path.clone()))
            }
        }
    }

    /// The endpoint clients should dial, with the actual port for TCP.
    pub fn local_endpoint(&self) -> Result<Endpoint> {
        match self {
            Listener::Tcp(listener) => Ok(Endpoint::tcp(listener.local_addr()?.to_string())),
            #[cfg(unix)]
            Listener::Unix { path, .. } => Ok(Endpoint::unix(path.clone())),
        }
    }
}

/// Remove `path` if it is a socket nobody listens on any more.
#[cfg(unix)]
async fn remove_stale_socket(path: &str) -> Result<()> {
    use std::os::unix::fs::FileTypeExt;

    let metadata = match std::fs::symlink_metadata(path) {
        Ok(metadata) => metadata,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e.into()),
    };
    if !metadata.file_type().is_socket() {
        return Err(addr_in_use(format!("{} exists and is not a socket", path)));
    }

    match UnixStream::connect(path).await {
        Ok(_) => Err(addr_in_use(format!("{} is in use", path))),
        Err(e) if e.kind() == io::ErrorKind::ConnectionRefused => {
            tracing::debug!("Removing stale socket {}", path);
            std::fs::remove_file(path)?;
            Ok(())
        }
        Err(e) => Err(e.into()),
    }
}

#[cfg(unix)]
fn addr_in_use(message: String) -> XrpcError {
    io::Error::new(io::ErrorKind::AddrInUse, message).into()
}

#[cfg(unix)]
impl Drop for Listener {
    fn drop(&mut self) {
        if let Listener::Unix { path, .. } = self {
            let _ = std::fs::remove_file(path.as_str());
        }
    }
}

/// Connected stream socket.
pub enum Stream {
    /// TCP stream.
    Tcp(TcpStream),
    /// Unix socket stream.
    #[cfg(unix)]
    Unix(UnixStream),
}

impl Stream {
    /// Dial `endpoint`.
    ///
    /// # Errors
    ///
    /// [`XrpcError::UnsupportedNetwork`] for schemes that cannot be dialled,
    /// or the connect I/O error.
    pub async fn connect(endpoint: &Endpoint) -> Result<Self> {
        match endpoint.network() {
            Network::Tcp => {
                let stream = TcpStream::connect(endpoint.address()).await?;
                let _ = stream.set_nodelay(true);
                Ok(Stream::Tcp(stream))
            }
            #[cfg(unix)]
            Network::Unix => Ok(Stream::Unix(UnixStream::connect(endpoint.address()).await?)),
            other => Err(XrpcError::UnsupportedNetwork(other.scheme().to_string())),
        }
    }

    /// Split into owned read and write halves.
    pub fn into_split(
        self,
    ) -> (
        Box<dyn AsyncRead + Unpin + Send>,
        Box<dyn AsyncWrite + Unpin + Send>,
    ) {
        match self {
            Stream::Tcp(stream) => {
                let (r, w) = stream.into_split();
                (Box::new(r), Box::new(w))
            }
            #[cfg(unix)]
            Stream::Unix(stream) => {
                let (r, w) = stream.into_split();
                (Box::new(r), Box::new(w))
            }
        }
    }
}

impl AsyncRead for Stream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            #[cfg(unix)]
            Stream::Unix(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Stream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            #[cfg(unix)]
            Stream::Unix(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_write_vectored(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        bufs: &[io::IoSlice<'_>],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s).poll_write_vectored(cx, bufs),
            #[cfg(unix)]
            Stream::Unix(s) => Pin::new(s).poll_write_vectored(cx, bufs),
        }
    }

    fn is_write_vectored(&self) -> bool {
        true
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s).poll_flush(cx),
            #[cfg(unix)]
            Stream::Unix(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            Stream::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            #[cfg(unix)]
            Stream::Unix(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_tcp_bind_accept_connect() {
        let listener = Listener::bind(&Endpoint::parse("tcp://127.0.0.1:0")).await.unwrap();
        let endpoint = listener.local_endpoint().unwrap();
        assert!(!endpoint.address().ends_with(":0"));

        let accept = tokio::spawn(async move {
            let (mut stream, _peer) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4];
            stream.read_exact(&mut buf).await.unwrap();
            buf
        });

        let mut client = Stream::connect(&endpoint).await.unwrap();
        client.write_all(b"ping").await.unwrap();

        assert_eq!(&accept.await.unwrap(), b"ping");
    }

    #[tokio::test]
    async fn test_unsupported_scheme() {
        let err = Listener::bind(&Endpoint::parse("udp://127.0.0.1:0"))
            .await
            .err()
            .unwrap();
        assert_eq!(err.to_string(), "connection type [udp] not supported");

        let err = Stream::connect(&Endpoint::parse("udp://127.0.0.1:9"))
            .await
            .err()
            .unwrap();
        assert!(matches!(err, XrpcError::UnsupportedNetwork(_)));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_unix_socket_file_removed_on_drop() {
        let path = std::env::temp_dir().join(format!("xrpc-listener-{}.sock", std::process::id()));
        let path = path.to_string_lossy().into_owned();

        let listener = Listener::bind(&Endpoint::unix(path.clone())).await.unwrap();
        assert!(std::path::Path::new(&path).exists());

        let _client = Stream::connect(&listener.local_endpoint().unwrap()).await.unwrap();
        let (_server, peer) = listener.accept().await.unwrap();
        assert_eq!(peer, path);

        drop(listener);
        assert!(!std::path::Path::new(&path).exists());
    }

    #[cfg(unix)]
    fn unix_path(tag: &str) -> String {
        std::env::temp_dir()
            .join(format!("xrpc-{}-{}.sock", tag, std::process::id()))
            .to_string_lossy()
            .into_owned()
    }

    #[cfg(unix)]
    fn is_addr_in_use(err: &XrpcError) -> bool {
        matches!(err, XrpcError::Io(e) if e.kind() == io::ErrorKind::AddrInUse)
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_bind_over_live_socket_fails() {
        let path = unix_path("live");
        let first = Listener::bind(&Endpoint::unix(path.clone())).await.unwrap();

        let err = Listener::bind(&Endpoint::unix(path.clone())).await.err().unwrap();
        assert!(is_addr_in_use(&err));

        // The first listener still owns the path.
        let _client = Stream::connect(&first.local_endpoint().unwrap()).await.unwrap();
        let (_server, _) = first.accept().await.unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_bind_keeps_regular_file() {
        let path = unix_path("regular");
        std::fs::write(&path, b"keep me").unwrap();

        let err = Listener::bind(&Endpoint::unix(path.clone())).await.err().unwrap();
        assert!(is_addr_in_use(&err));
        assert_eq!(std::fs::read(&path).unwrap(), b"keep me");

        std::fs::remove_file(&path).unwrap();
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_bind_replaces_stale_socket() {
        let path = unix_path("stale");
        // A std listener leaves its socket file behind when dropped.
        drop(std::os::unix::net::UnixListener::bind(&path).unwrap());
        assert!(std::path::Path::new(&path).exists());

        let listener = Listener::bind(&Endpoint::unix(path.clone())).await.unwrap();
        let _client = Stream::connect(&listener.local_endpoint().unwrap()).await.unwrap();
    }
}
