//! Per-server accept loop (spec.md §4.7).
//!
//! One `Listener` per `servers[]` entry, each owning its own bound socket,
//! router, and connection semaphore. Mirrors the source's module-level
//! accept loop, but admission control (spec.md §5: "guard the connection
//! count with a mutex or equivalent") is a [`tokio::sync::Semaphore`]
//! sized to `max_connections` rather than a shared counter behind a lock —
//! the natural async analogue of the same guarantee.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tokio::io::AsyncWriteExt;
use tokio::net::TcpListener;
use tokio::sync::{Notify, Semaphore};

use crate::config::Configuration;
use crate::router::Router;

/// A single bound server, driving its own accept loop until told to stop.
#[derive(Clone)]
pub struct Listener {
    config: Arc<Configuration>,
    router: Arc<Router>,
    stopping: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl Listener {
    pub fn new(config: Configuration) -> Self {
        let config = Arc::new(config);
        let router = Arc::new(Router::from_config(config.clone()));
        Self { config, router, stopping: Arc::new(AtomicBool::new(false)), notify: Arc::new(Notify::new()) }
    }

    /// Tells the accept loop to stop once it next wakes. Mirrors the
    /// source's module-level `SHUTDOWN: AtomicBool`, scoped per listener
    /// instead of per process.
    pub fn request_shutdown(&self) {
        self.stopping.store(true, Ordering::Relaxed);
        self.notify.notify_waiters();
    }

    /// Binds the configured address and accepts connections until told to
    /// stop. Split into [`Listener::bind`] + [`BoundListener::serve`] so
    /// callers (tests, chiefly) can learn the real bound address first —
    /// useful when `config.port` is `0` for an ephemeral port.
    pub async fn run(self) -> std::io::Result<()> {
        self.bind().await?.serve().await
    }

    pub async fn bind(self) -> std::io::Result<BoundListener> {
        let bind_addr = format!("{}:{}", self.config.host, self.config.port);
        let tcp = TcpListener::bind(&bind_addr).await?;
        Ok(BoundListener { tcp, listener: self })
    }
}

/// A [`Listener`] whose socket is already bound, ready to serve.
pub struct BoundListener {
    tcp: TcpListener,
    listener: Listener,
}

impl BoundListener {
    pub fn local_addr(&self) -> std::io::Result<std::net::SocketAddr> {
        self.tcp.local_addr()
    }

    pub async fn serve(self) -> std::io::Result<()> {
        let Self { tcp, listener } = self;
        let local_addr = tcp.local_addr()?;
        println!("originhttpd listening on http://{local_addr}");

        let admission = Arc::new(Semaphore::new(listener.config.max_connections));

        loop {
            if listener.stopping.load(Ordering::Relaxed) {
                break;
            }

            tokio::select! {
                accepted = tcp.accept() => {
                    let (stream, peer) = match accepted {
                        Ok(pair) => pair,
                        Err(e) => {
                            eprintln!("accept failed on {local_addr}: {e}");
                            continue;
                        }
                    };
                    let _ = stream.set_nodelay(true);

                    let host_for_request = match local_addr.ip() {
                        std::net::IpAddr::V4(ip) if ip.is_unspecified() => "localhost".to_string(),
                        ip => ip.to_string(),
                    };
                    let request_local_addr = (host_for_request, local_addr.port());
                    let config = listener.config.clone();
                    let router = listener.router.clone();

                    match admission.clone().try_acquire_owned() {
                        Ok(permit) => {
                            tokio::spawn(async move {
                                let _permit = permit;
                                crate::connection::handle(stream, peer, request_local_addr, config, router).await;
                            });
                        }
                        Err(_) => {
                            tokio::spawn(reject_overloaded(stream, peer));
                        }
                    }
                }
                _ = listener.notify.notified() => {
                    break;
                }
            }
        }

        println!("originhttpd on {local_addr} shut down");
        Ok(())
    }
}

async fn reject_overloaded(mut stream: tokio::net::TcpStream, peer: std::net::SocketAddr) {
    eprintln!("{peer}: rejected, connection limit reached");
    // Status line + blank line only, no headers or body: a broken pipe or
    // timeout writing this is swallowed, same as any other transport error
    // on a connection we're about to drop anyway.
    let _ = stream.write_all(b"HTTP/1.1 503 Service Unavailable\r\n\r\n").await;
}
