//! HTTP listener lifecycle: one server, one of two interchangeable engines.

pub mod blocking;
pub mod connection;
pub mod evented;

use std::io;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::Router;
use socket2::{Domain, Protocol, Socket, Type};

use crate::config::ServerConfig;
use crate::net::interfaces::{InterfaceAssociation, NetworkConfiguration};
use crate::net::resolve::{self, ResolvedAddress};
use crate::server::blocking::BlockingEngine;
use crate::server::connection::{Dispatch, HttpDispatch};
use crate::server::evented::{EventedEngine, EventedOptions};

const LISTEN_BACKLOG: i32 = 1024;

/// Which connection engine serves the listener.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineKind {
    /// V1: blocking accept loop, one thread per connection.
    Blocking,
    /// V2: boss thread plus worker pool.
    Evented,
}

/// A running connection engine. Dropping it must release everything it owns.
pub trait Engine: Send {
    fn kind(&self) -> EngineKind;

    fn local_addr(&self) -> SocketAddr;

    /// Stop accepting and release sockets and threads. Safe to call repeatedly.
    fn shutdown(&mut self);
}

#[derive(Debug, thiserror::Error)]
pub enum BindError {
    #[error("another program is using port {port}")]
    AddrInUse {
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("insufficient privilege to bind port {port}")]
    PermissionDenied {
        port: u16,
        #[source]
        source: io::Error,
    },
    #[error("cannot listen on port {port}: {source}")]
    Io {
        port: u16,
        #[source]
        source: io::Error,
    },
}

impl BindError {
    fn from_io(port: u16, source: io::Error) -> Self {
        match source.kind() {
            io::ErrorKind::AddrInUse => BindError::AddrInUse { port, source },
            io::ErrorKind::PermissionDenied => BindError::PermissionDenied { port, source },
            _ => BindError::Io { port, source },
        }
    }
}

/// Operator-visible listener state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServerStatus {
    Stopped,
    Running(SocketAddr),
    BindFailed(String),
}

/// The HTTP front door.
///
/// Owns at most one engine at a time. `start` and `stop` block and must be
/// called outside of an async context.
pub struct HttpServer {
    config: ServerConfig,
    network: Arc<NetworkConfiguration>,
    app: Router,
    dispatch: Arc<dyn Dispatch>,
    resolved: Option<ResolvedAddress>,
    last_interface: Option<InterfaceAssociation>,
    engine: Option<Box<dyn Engine>>,
    status: ServerStatus,
}

impl HttpServer {
    pub fn new(config: ServerConfig, network: Arc<NetworkConfiguration>, app: Router) -> Self {
        let dispatch = Arc::new(HttpDispatch::new(app.clone(), config.max_request_body));
        Self {
            config,
            network,
            app,
            dispatch,
            resolved: None,
            last_interface: None,
            engine: None,
            status: ServerStatus::Stopped,
        }
    }

    /// Replace how Engine V1 answers admitted connections.
    pub fn with_dispatch(mut self, dispatch: Arc<dyn Dispatch>) -> Self {
        self.dispatch = dispatch;
        self
    }

    /// Resolve the bind address and start the configured engine.
    ///
    /// On bind failure the server stays unbound, the error is logged and
    /// reflected in [`status`](Self::status), and a later `start` may retry.
    pub fn start(&mut self) -> Result<(), BindError> {
        if let Some(engine) = &self.engine {
            tracing::warn!("Server already running on {}", engine.local_addr());
            return Ok(());
        }
        let port = self.config.port;

        let resolved = resolve::resolve(&self.config, &self.network, self.last_interface.as_ref())
            .unwrap_or_else(|e| {
                tracing::warn!("{}; falling back to the wildcard address", e);
                ResolvedAddress::wildcard(port)
            });
        tracing::info!("Created socket: {}", resolved.target);

        let started = resolved
            .target
            .socket_addrs()
            .map_err(|e| BindError::from_io(port, e))
            .and_then(|addrs| bind_listener(&addrs, port))
            .and_then(|listener| {
                self.launch(listener)
                    .map_err(|e| BindError::from_io(port, e))
            });
        match started {
            Ok(engine) => {
                self.last_interface = resolved.interface.clone();
                self.resolved = Some(resolved);
                let addr = engine.local_addr();
                tracing::info!(
                    "Starting {:?} HTTP server on host {} and port {}",
                    engine.kind(),
                    self.host().unwrap_or_default(),
                    addr.port()
                );
                self.status = ServerStatus::Running(addr);
                self.engine = Some(engine);
                Ok(())
            }
            Err(e) => {
                match &e {
                    BindError::AddrInUse { .. } => tracing::error!(
                        "Another program is using port {}, which this server needs.",
                        port
                    ),
                    other => tracing::error!("Cannot start the HTTP server: {}", other),
                }
                tracing::error!(
                    "You can change the port in the configuration file or with --port."
                );
                tracing::trace!("The error was: {:?}", e);
                self.resolved = None;
                self.status = ServerStatus::BindFailed(e.to_string());
                Err(e)
            }
        }
    }

    fn launch(&self, listener: std::net::TcpListener) -> io::Result<Box<dyn Engine>> {
        let filter = Arc::clone(&self.config.ip_filter);
        Ok(match self.config.engine {
            EngineKind::Blocking => Box::new(BlockingEngine::start(
                listener,
                filter,
                Arc::clone(&self.dispatch),
                self.config.shutdown_grace,
            )?),
            EngineKind::Evented => Box::new(EventedEngine::start(
                listener,
                filter,
                self.app.clone(),
                EventedOptions {
                    worker_threads: self.config.worker_threads,
                    max_request_body: self.config.max_request_body,
                    shutdown_grace: self.config.shutdown_grace,
                },
            )?),
        })
    }

    /// Release whichever engine is live and forget the network snapshot.
    /// Calling it again, or after a failed start, is a no-op apart from logging.
    pub fn stop(&mut self) {
        match self.engine.take() {
            Some(mut engine) => {
                tracing::info!(
                    "Stopping server on host {} and port {}...",
                    self.host().unwrap_or_default(),
                    engine.local_addr().port()
                );
                engine.shutdown();
            }
            None => tracing::debug!("Stop requested with no running engine"),
        }
        self.resolved = None;
        self.status = ServerStatus::Stopped;
        self.network.forget();
    }

    pub fn is_running(&self) -> bool {
        self.engine.is_some()
    }

    pub fn status(&self) -> &ServerStatus {
        &self.status
    }

    pub fn engine_kind(&self) -> Option<EngineKind> {
        self.engine.as_ref().map(|e| e.kind())
    }

    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.engine.as_ref().map(|e| e.local_addr())
    }

    /// Bound port while running, configured port otherwise.
    pub fn port(&self) -> u16 {
        self.local_addr().map(|a| a.port()).unwrap_or(self.config.port)
    }

    pub fn host(&self) -> Option<&str> {
        self.resolved.as_ref().map(|r| r.host.as_str())
    }

    pub fn url(&self) -> Option<String> {
        self.resolved.as_ref().map(|r| r.url(self.port()))
    }

    pub fn network_interface(&self) -> Option<&InterfaceAssociation> {
        self.resolved.as_ref().and_then(|r| r.interface.as_ref())
    }
}

impl Drop for HttpServer {
    fn drop(&mut self) {
        if self.engine.is_some() {
            self.stop();
        }
    }
}

/// Open a listening socket with address reuse on the first of `addrs` that binds.
fn bind_listener(addrs: &[SocketAddr], port: u16) -> Result<std::net::TcpListener, BindError> {
    let mut last_err = io::Error::new(io::ErrorKind::AddrNotAvailable, "no address to bind");
    for addr in addrs {
        match bind_one(*addr) {
            Ok(listener) => return Ok(listener),
            Err(e) => {
                tracing::debug!("Cannot bind {}: {}", addr, e);
                last_err = e;
            }
        }
    }
    Err(BindError::from_io(port, last_err))
}

fn bind_one(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = Socket::new(Domain::for_address(addr), Type::STREAM, Some(Protocol::TCP))?;
    socket.set_reuse_address(true)?;
    if addr.is_ipv6() {
        socket.set_only_v6(true)?;
    }
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;
    Ok(socket.into())
}
