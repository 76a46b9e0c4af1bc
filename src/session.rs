//! Per-client session handler: the state machine in §4.D of the
//! specification.
//!
//! ```text
//! START -> AWAIT_FIRST_REQUEST -> CONNECTED -> SERVING -> (loop) -> CLOSED
//! ```
//!
//! All requests in a session are routed to the upstream host resolved
//! from the *first* request; a client that switches `Host` mid-session is
//! mis-routed on later requests. This matches the proxy this crate is
//! modeled on and is a documented limitation, not a design goal.

use crate::cache::Cache;
use crate::fetch::{connect_upstream, fetch, HTTP_PORT};
use crate::parser::{extract_host, is_get_shaped, request_key};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::{debug, warn};

const CLIENT_READ_TIMEOUT: Duration = Duration::from_secs(1);
const MAX_REQUEST_LEN: usize = 5000;

/// Transient per-client state: the client socket, the lazily-created
/// upstream socket (reused for every request in the session), the
/// request buffer, and whether the first request has been handled.
pub struct Session {
    client: TcpStream,
    upstream: Option<TcpStream>,
    cache: Cache,
    first_request_seen: bool,
    /// Test-only seam: overrides the port `establish_upstream` connects to,
    /// so tests can route at a loopback fixture origin bound to an
    /// ephemeral port instead of the privileged port 80 the production path
    /// always uses. Only compiled in under the `test-util` feature, which
    /// is enabled for `cargo test` via the self-dependency in `Cargo.toml`
    /// and never for a plain `cargo build`/`cargo run`.
    #[cfg(feature = "test-util")]
    upstream_port_override: Option<u16>,
}

impl Session {
    pub fn new(client: TcpStream, cache: Cache) -> Self {
        Self {
            client,
            upstream: None,
            cache,
            first_request_seen: false,
            #[cfg(feature = "test-util")]
            upstream_port_override: None,
        }
    }

    /// Test-only seam — see [`Session::upstream_port_override`].
    #[cfg(feature = "test-util")]
    pub fn with_upstream_port_override(mut self, port: u16) -> Self {
        self.upstream_port_override = Some(port);
        self
    }

    /// Applies `port` via [`Session::with_upstream_port_override`] when the
    /// `test-util` feature is enabled and `port` is `Some`; a no-op
    /// otherwise, since the override has no field to set in a production
    /// build. Lets callers like `listener::serve` stay feature-agnostic.
    #[cfg(feature = "test-util")]
    pub fn maybe_with_upstream_port_override(self, port: Option<u16>) -> Self {
        match port {
            Some(port) => self.with_upstream_port_override(port),
            None => self,
        }
    }

    #[cfg(not(feature = "test-util"))]
    pub fn maybe_with_upstream_port_override(self, _port: Option<u16>) -> Self {
        self
    }

    /// Drives the session to completion (CLOSED). Never returns an error:
    /// every failure path in §7 of the specification ends the session
    /// without surfacing anything to the caller.
    pub async fn run(mut self) {
        let mut buf = vec![0u8; MAX_REQUEST_LEN];

        loop {
            let raw = match self.read_request(&mut buf).await {
                Some(raw) => raw,
                None => break,
            };

            if !is_get_shaped(raw) {
                debug!("non-GET-shaped request, closing session");
                break;
            }

            let Some(key) = request_key(raw) else {
                debug!("request line missing CR, closing session");
                break;
            };

            if !self.first_request_seen {
                if !self.establish_upstream(raw).await {
                    break;
                }
                self.first_request_seen = true;
            }

            if !self.serve(key, raw).await {
                break;
            }
        }
    }

    async fn read_request<'a>(&mut self, buf: &'a mut [u8]) -> Option<&'a [u8]> {
        match timeout(CLIENT_READ_TIMEOUT, self.client.read(buf)).await {
            Ok(Ok(n)) if n > 0 => Some(&buf[..n]),
            Ok(Ok(_)) => None,      // EOF
            Ok(Err(_)) => None,     // read error
            Err(_elapsed) => None,  // idle timeout
        }
    }

    /// AWAIT_FIRST_REQUEST -> CONNECTED: extract Host, resolve, connect.
    /// Runs unconditionally on the first valid GET-shaped request, whether
    /// or not it turns out to be a cache hit, since the upstream socket is
    /// shared by the whole session. Always resolves against the canonical
    /// `http` service port (80) — a `:port` suffix in the `Host` value is
    /// never parsed or honored (§4.C, §6).
    async fn establish_upstream(&mut self, raw: &[u8]) -> bool {
        let Some(host) = extract_host(raw) else {
            debug!("missing Host header, closing session");
            return false;
        };

        #[cfg(feature = "test-util")]
        let port = self.upstream_port_override.unwrap_or(HTTP_PORT);
        #[cfg(not(feature = "test-util"))]
        let port = HTTP_PORT;

        match connect_upstream(&host, port).await {
            Ok(stream) => {
                self.upstream = Some(stream);
                true
            }
            Err(e) => {
                warn!("failed to connect upstream {host}:{port}: {e}");
                false
            }
        }
    }

    /// CONNECTED/SERVING -> SERVING: consult the cache, fetch on miss,
    /// reply. Returns `false` when the session must close.
    async fn serve(&mut self, key: Vec<u8>, raw: &[u8]) -> bool {
        if let Some(payload) = self.cache.lookup(&key) {
            debug!("cache hit");
            return self.client.write_all(&payload).await.is_ok();
        }

        debug!("cache miss");
        let upstream = self
            .upstream
            .as_mut()
            .expect("upstream established before first serve");

        let payload = match fetch(upstream, raw).await {
            Ok(payload) => payload,
            Err(e) => {
                warn!("origin fetch failed: {e}");
                return false;
            }
        };

        self.cache.insert(key, payload.clone());
        self.client.write_all(&payload).await.is_ok()
    }
}
