//! Engine V1: a blocking accept loop with one thread per admitted connection.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::net::ip_filter::IpFilter;
use crate::server::connection::Dispatch;
use crate::server::{Engine, EngineKind};

const WAKE_TIMEOUT: Duration = Duration::from_secs(1);
const DRAIN_POLL: Duration = Duration::from_millis(10);

type Handlers = Arc<Mutex<Vec<JoinHandle<()>>>>;

pub struct BlockingEngine {
    local_addr: SocketAddr,
    stop: Arc<AtomicBool>,
    connections: CancellationToken,
    handlers: Handlers,
    accept_thread: Option<JoinHandle<()>>,
    grace: Duration,
}

impl BlockingEngine {
    /// Start accepting on `listener` in a dedicated "HTTP Server" thread.
    ///
    /// On shutdown, open connections get `grace` to finish their current request.
    pub fn start(
        listener: TcpListener,
        filter: Arc<IpFilter>,
        dispatch: Arc<dyn Dispatch>,
        grace: Duration,
    ) -> io::Result<Self> {
        let local_addr = listener.local_addr()?;
        let stop = Arc::new(AtomicBool::new(false));
        let connections = CancellationToken::new();
        let handlers: Handlers = Arc::default();
        let acceptor = Acceptor {
            stop: Arc::clone(&stop),
            connections: connections.clone(),
            handlers: Arc::clone(&handlers),
            filter,
            dispatch,
        };
        let accept_thread = thread::Builder::new()
            .name("HTTP Server".into())
            .spawn(move || acceptor.run(listener))?;
        Ok(Self {
            local_addr,
            stop,
            connections,
            handlers,
            accept_thread: Some(accept_thread),
            grace,
        })
    }

    /// Wait up to the grace period for request handlers to finish.
    fn drain(&self) {
        let deadline = Instant::now() + self.grace;
        let mut handlers = std::mem::take(&mut *lock(&self.handlers));
        loop {
            let (finished, running): (Vec<_>, Vec<_>) =
                handlers.into_iter().partition(|h| h.is_finished());
            for handle in finished {
                if handle.join().is_err() {
                    tracing::debug!("HTTP engine V1 request handler panicked");
                }
            }
            handlers = running;
            if handlers.is_empty() {
                return;
            }
            if Instant::now() >= deadline {
                tracing::warn!(
                    "{} connections still open after {:?}, detaching them",
                    handlers.len(),
                    self.grace
                );
                return;
            }
            thread::sleep(DRAIN_POLL);
        }
    }
}

fn lock(handlers: &Handlers) -> std::sync::MutexGuard<'_, Vec<JoinHandle<()>>> {
    handlers.lock().unwrap_or_else(PoisonError::into_inner)
}

struct Acceptor {
    stop: Arc<AtomicBool>,
    connections: CancellationToken,
    handlers: Handlers,
    filter: Arc<IpFilter>,
    dispatch: Arc<dyn Dispatch>,
}

impl Acceptor {
    fn run(self, listener: TcpListener) {
        let bound = listener.local_addr().map(|a| a.to_string()).unwrap_or_default();
        tracing::info!("Starting HTTP engine V1 on {}", bound);

        while !self.stop.load(Ordering::SeqCst) {
            match listener.accept() {
                Ok((socket, peer)) => {
                    if self.stop.load(Ordering::SeqCst) {
                        break;
                    }
                    self.admit(socket, peer);
                }
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    tracing::debug!("Caught exception: {}", e);
                    // Avoid spinning on persistent errors such as descriptor exhaustion.
                    thread::sleep(Duration::from_millis(10));
                }
            }
        }

        drop(listener);
        tracing::debug!("HTTP engine V1 accept loop finished");
    }

    fn admit(&self, socket: TcpStream, peer: SocketAddr) {
        if !self.filter.allowed(peer.ip()) {
            tracing::trace!("Ignoring request from: {}", peer.ip());
            drop(socket);
            return;
        }
        tracing::trace!("Receiving a request from: {}", peer.ip());
        let dispatch = Arc::clone(&self.dispatch);
        let shutdown = self.connections.clone();
        let spawned = thread::Builder::new()
            .name("Request Handler".into())
            .spawn(move || dispatch.dispatch(socket, peer, shutdown));
        match spawned {
            Ok(handle) => {
                let mut handlers = lock(&self.handlers);
                handlers.retain(|h| !h.is_finished());
                handlers.push(handle);
            }
            Err(e) => tracing::debug!("Cannot spawn request handler for {}: {}", peer, e),
        }
    }
}

/// Where to connect to unblock an `accept` on `addr`.
fn wake_address(addr: SocketAddr) -> SocketAddr {
    let ip = match addr.ip() {
        IpAddr::V4(v4) if v4.is_unspecified() => IpAddr::V4(Ipv4Addr::LOCALHOST),
        IpAddr::V6(v6) if v6.is_unspecified() => IpAddr::V6(Ipv6Addr::LOCALHOST),
        ip => ip,
    };
    SocketAddr::new(ip, addr.port())
}

impl Engine for BlockingEngine {
    fn kind(&self) -> EngineKind {
        EngineKind::Blocking
    }

    fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    fn shutdown(&mut self) {
        if self.stop.swap(true, Ordering::SeqCst) {
            return;
        }
        // The accept loop observes the flag once accept() returns.
        match TcpStream::connect_timeout(&wake_address(self.local_addr), WAKE_TIMEOUT) {
            Ok(_) => {
                if let Some(handle) = self.accept_thread.take() {
                    if handle.join().is_err() {
                        tracing::debug!("HTTP engine V1 accept thread panicked");
                    }
                }
            }
            Err(e) => {
                // Without the wake-up connection the join could block forever.
                tracing::debug!("Caught exception while waking accept loop, detaching it: {}", e);
                self.accept_thread.take();
            }
        }

        self.connections.cancel();
        self.drain();
    }
}

impl Drop for BlockingEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wake_address_replaces_wildcard_with_loopback() {
        let addr: SocketAddr = "0.0.0.0:5001".parse().unwrap();
        assert_eq!(wake_address(addr), "127.0.0.1:5001".parse::<SocketAddr>().unwrap());
    }

    #[test]
    fn wake_address_keeps_concrete_ip() {
        let addr: SocketAddr = "192.168.1.10:5001".parse().unwrap();
        assert_eq!(wake_address(addr), addr);
    }
}
