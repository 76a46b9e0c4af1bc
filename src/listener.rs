//! Listener harness: bind, accept, hand off to the admission gate and
//! session handler. Single-threaded in the sense that it never itself
//! blocks on a session — each accepted connection is handed to its own
//! spawned task immediately.

use crate::cache::Cache;
use crate::config::ProxyConfig;
use crate::gate::{AdmissionGate, MAX_CONCURRENT_SESSIONS};
use crate::session::Session;
use socket2::{Domain, Protocol, Socket, Type};
use std::io;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tracing::{debug, info, warn};

/// OS accept-queue depth. Excess connections beyond the admission gate's
/// capacity queue here; they are accepted promptly but their session
/// handlers block at the gate until a slot frees up.
pub const MAX_BACK_LOG: i32 = 30;

pub async fn run(config: ProxyConfig) -> io::Result<()> {
    serve(config, None).await
}

/// Test-only seam: identical to [`run`], except every spawned session's
/// upstream connect is routed to `upstream_port_override` instead of the
/// production path's fixed port 80 — lets a stress test exercise the real
/// bind/accept/admission-gate/session pipeline against a loopback fixture
/// origin bound to an ephemeral port. Only compiled in under the
/// `test-util` feature (see `Cargo.toml`); never reachable from a
/// production build.
#[cfg(feature = "test-util")]
pub async fn run_with_upstream_port_override(
    config: ProxyConfig,
    upstream_port_override: u16,
) -> io::Result<()> {
    serve(config, Some(upstream_port_override)).await
}

async fn serve(config: ProxyConfig, upstream_port_override: Option<u16>) -> io::Result<()> {
    let listener = bind(config.port)?;
    let cache = Cache::new(config.capacity_bytes as usize);
    let gate = AdmissionGate::new(MAX_CONCURRENT_SESSIONS);

    info!(
        port = config.port,
        capacity_bytes = config.capacity_bytes,
        "listening"
    );

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                info!("received SIGINT, shutting down");
                return Ok(());
            }
            accepted = listener.accept() => {
                match accepted {
                    Ok((stream, addr)) => {
                        debug!(%addr, "accepted connection");
                        spawn_session(stream, cache.clone(), gate.clone(), upstream_port_override);
                    }
                    Err(e) => {
                        warn!("accept failed: {e}");
                    }
                }
            }
        }
    }
}

fn spawn_session(
    stream: tokio::net::TcpStream,
    cache: Cache,
    gate: AdmissionGate,
    upstream_port_override: Option<u16>,
) {
    tokio::spawn(async move {
        let _permit = gate.acquire().await;
        Session::new(stream, cache)
            .maybe_with_upstream_port_override(upstream_port_override)
            .run()
            .await;
    });
}

/// Binds `0.0.0.0:<port>` with an explicit `listen()` backlog — plain
/// `TcpListener::bind` does not expose backlog control, so the socket is
/// built with `socket2` and handed to tokio afterward.
fn bind(port: u16) -> io::Result<TcpListener> {
    let addr: SocketAddr = ([0, 0, 0, 0], port).into();
    let socket = Socket::new(Domain::IPV4, Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(MAX_BACK_LOG)?;
    TcpListener::from_std(socket.into())
}
