//! Origin resolution, connection, request forwarding, and response
//! draining.
//!
//! The drain loop does not parse HTTP framing. It reads with a 1-second
//! idle timeout and treats silence as "response complete" — origins are
//! not required to close persistent connections, so idle-gap termination
//! is the only signal available without speaking chunked/Content-Length
//! framing. This is a known heuristic, not an oversight.

use bytes::{Bytes, BytesMut};
use std::io;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;

/// Upper bound on a drained response, regardless of how the read loop
/// terminates.
pub const MAX_CONTENT_LEN: usize = 2_000_000;
pub const READ_TIMEOUT: Duration = Duration::from_secs(1);
const READ_CHUNK: usize = 8192;

/// The canonical `http` service port. Every production call into
/// `connect_upstream` resolves against this port — the `Host` header's
/// value is never parsed for a port override (§4.C, §6).
pub const HTTP_PORT: u16 = 80;

/// Resolves `host` against `port` and connects to the first candidate that
/// accepts, trying candidates in resolver order. Callers on the production
/// session path always pass [`HTTP_PORT`]; a non-default `port` is a
/// test-only seam for routing against loopback fixture origins, which
/// cannot bind the privileged port 80.
pub async fn connect_upstream(host: &str, port: u16) -> io::Result<TcpStream> {
    let mut candidates = tokio::net::lookup_host((host, port)).await?;
    let mut last_err = None;

    while let Some(addr) = candidates.next() {
        match TcpStream::connect(addr).await {
            Ok(stream) => return Ok(stream),
            Err(e) => last_err = Some(e),
        }
    }

    Err(last_err.unwrap_or_else(|| {
        io::Error::new(io::ErrorKind::NotFound, "resolver returned no candidates")
    }))
}

/// Writes `request` verbatim to `upstream`, then drains the response.
/// A short/failed write is session-fatal, same as a failed drain.
pub async fn fetch(upstream: &mut TcpStream, request: &[u8]) -> io::Result<Bytes> {
    upstream.write_all(request).await?;
    drain(upstream).await
}

async fn drain(upstream: &mut TcpStream) -> io::Result<Bytes> {
    let mut buf = BytesMut::with_capacity(READ_CHUNK);
    let mut chunk = [0u8; READ_CHUNK];
    let mut total = 0usize;

    loop {
        if total >= MAX_CONTENT_LEN {
            break;
        }
        let want = (MAX_CONTENT_LEN - total).min(chunk.len());

        match timeout(READ_TIMEOUT, upstream.read(&mut chunk[..want])).await {
            Ok(Ok(0)) => {
                if total > 0 {
                    break;
                }
                return Err(io::Error::new(
                    io::ErrorKind::UnexpectedEof,
                    "origin closed before sending any bytes",
                ));
            }
            Ok(Ok(n)) => {
                buf.extend_from_slice(&chunk[..n]);
                total += n;
            }
            Ok(Err(e)) => return Err(e),
            Err(_elapsed) => {
                if total > 0 {
                    break;
                }
                return Err(io::Error::new(
                    io::ErrorKind::TimedOut,
                    "origin idle timeout before sending any bytes",
                ));
            }
        }
    }

    Ok(buf.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::net::TcpListener;

    async fn fixture_origin(
        respond_with: &'static [u8],
        close_after: bool,
    ) -> std::net::SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut sock, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 1024];
            let _ = sock.read(&mut buf).await;
            let _ = sock.write_all(respond_with).await;
            if close_after {
                drop(sock);
            } else {
                tokio::time::sleep(Duration::from_millis(1200)).await;
            }
        });
        addr
    }

    #[tokio::test]
    async fn drains_until_peer_closes() {
        let addr = fixture_origin(b"HTTP/1.1 200 OK\r\n\r\nbody", true).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let body = fetch(&mut stream, b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
        assert_eq!(&body[..], b"HTTP/1.1 200 OK\r\n\r\nbody");
    }

    #[tokio::test]
    async fn drains_until_idle_timeout_when_peer_keeps_connection_open() {
        let addr = fixture_origin(b"HTTP/1.1 200 OK\r\n\r\nidle", false).await;
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let body = fetch(&mut stream, b"GET / HTTP/1.1\r\n\r\n").await.unwrap();
        assert_eq!(&body[..], b"HTTP/1.1 200 OK\r\n\r\nidle");
    }

    #[tokio::test]
    async fn fails_when_origin_is_silent_from_the_start() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (_sock, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_millis(1200)).await;
        });
        let mut stream = TcpStream::connect(addr).await.unwrap();
        let result = fetch(&mut stream, b"GET / HTTP/1.1\r\n\r\n").await;
        assert!(result.is_err());
    }
}
