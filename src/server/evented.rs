//! Engine V2: one boss thread accepting connections, a worker pool serving them.

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use axum::Router;
use socket2::SockRef;
use tokio::net::{TcpListener, TcpStream};
use tokio::runtime::{Builder, Handle, Runtime};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use crate::net::ip_filter::IpFilter;
use crate::server::connection::serve_connection;
use crate::server::{Engine, EngineKind};

/// Per-connection socket buffer size.
pub const SOCKET_BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Clone)]
pub struct EventedOptions {
    pub worker_threads: usize,
    pub max_request_body: usize,
    pub shutdown_grace: Duration,
}

pub struct EventedEngine {
    local_addr: SocketAddr,
    token: CancellationToken,
    tracker: TaskTracker,
    boss: Option<JoinHandle<()>>,
    workers: Option<Runtime>,
    grace: Duration,
}

impl EventedEngine {
    pub fn start(
        listener: std::net::TcpListener,
        filter: Arc<IpFilter>,
        app: Router,
        options: EventedOptions,
    ) -> io::Result<Self> {
        let local_addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let workers = Builder::new_multi_thread()
            .worker_threads(options.worker_threads.max(1))
            .thread_name("http-worker")
            .enable_all()
            .build()?;
        let boss_rt = Builder::new_current_thread().enable_all().build()?;

        let token = CancellationToken::new();
        let tracker = TaskTracker::new();
        let boss = {
            let acceptor = Acceptor {
                token: token.clone(),
                tracker: tracker.clone(),
                workers: workers.handle().clone(),
                filter,
                app,
                max_request_body: options.max_request_body,
            };
            thread::Builder::new()
                .name("http-boss".into())
                .spawn(move || boss_rt.block_on(acceptor.run(listener)))?
        };

        Ok(Self {
            local_addr,
            token,
            tracker,
            boss: Some(boss),
            workers: Some(workers),
            grace: options.shutdown_grace,
        })
    }
}

struct Acceptor {
    token: CancellationToken,
    tracker: TaskTracker,
    workers: Handle,
    filter: Arc<IpFilter>,
    app: Router,
    max_request_body: usize,
}

impl Acceptor {
    async fn run(self, listener: std::net::TcpListener) {
        let listener = match TcpListener::from_std(listener) {
            Ok(l) => l,
            Err(e) => {
                tracing::error!("Cannot register HTTP listener: {}", e);
                return;
            }
        };
        let bound = listener.local_addr().map(|a| a.to_string()).unwrap_or_default();
        tracing::info!("Starting HTTP engine V2 on {}", bound);

        loop {
            tokio::select! {
                _ = self.token.cancelled() => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer)) => self.admit(stream, peer),
                    Err(e) => tracing::debug!("Caught exception: {}", e),
                },
            }
        }
        tracing::debug!("HTTP engine V2 boss loop finished");
    }

    fn admit(&self, stream: TcpStream, peer: SocketAddr) {
        if !self.filter.allowed(peer.ip()) {
            tracing::trace!("Ignoring request from: {}", peer.ip());
            return;
        }
        tracing::trace!("Receiving a request from: {}", peer.ip());
        configure_socket(&stream);

        // Re-register the socket with the worker runtime so it outlives the boss.
        let stream = match stream.into_std() {
            Ok(s) => s,
            Err(e) => {
                tracing::debug!("Cannot hand off connection from {}: {}", peer, e);
                return;
            }
        };
        let app = self.app.clone();
        let limit = self.max_request_body;
        let token = self.token.clone();
        self.tracker.spawn_on(
            async move {
                match TcpStream::from_std(stream) {
                    Ok(stream) => serve_connection(stream, peer, app, limit, token).await,
                    Err(e) => tracing::debug!("Cannot register connection from {}: {}", peer, e),
                }
            },
            &self.workers,
        );
    }
}

/// Child socket options: no-delay, keep-alive, address reuse, fixed buffers.
fn configure_socket(stream: &TcpStream) {
    let sock = SockRef::from(stream);
    let applied = sock
        .set_nodelay(true)
        .and_then(|_| sock.set_keepalive(true))
        .and_then(|_| sock.set_reuse_address(true))
        .and_then(|_| sock.set_send_buffer_size(SOCKET_BUFFER_SIZE))
        .and_then(|_| sock.set_recv_buffer_size(SOCKET_BUFFER_SIZE));
    if let Err(e) = applied {
        tracing::debug!("Cannot apply socket options: {}", e);
    }
}

impl Engine for EventedEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Evented
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn shutdown(&mut self) {
        let Some(workers) = self.workers.take() else {
            return;
        };
        self.token.cancel();
        if let Some(boss) = self.boss.take() {
            if boss.join().is_err() {
                tracing::debug!("HTTP engine V2 boss thread panicked");
            }
        }

        self.tracker.close();
        let tracker = self.tracker.clone();
        let grace = self.grace;
        let drained = workers.block_on(async move {
            tokio::time::timeout(grace, tracker.wait()).await.is_ok()
        });
        if !drained {
            tracing::warn!(
                "{} connections still open after {:?}, closing them",
                self.tracker.len(),
                grace
            );
        }
        workers.shutdown_timeout(Duration::from_millis(500));
    }
}

impl Drop for EventedEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}
