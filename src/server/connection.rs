//! One HTTP/1.1 connection served through the router, shared by both engines.

use std::convert::Infallible;
use std::net::SocketAddr;

use axum::body::Body;
use axum::extract::ConnectInfo;
use axum::http::{header, HeaderValue, Request, Response, StatusCode};
use axum::Router;
use http_body_util::{BodyExt, LengthLimitError, Limited};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use tokio::net::TcpStream;
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Hands an admitted connection to whatever answers it.
///
/// Engine V1 calls this on a dedicated worker thread; the call may block for
/// as long as the connection is open. Once `shutdown` is cancelled the
/// connection must be wound down promptly.
pub trait Dispatch: Send + Sync + 'static {
    fn dispatch(
        &self,
        stream: std::net::TcpStream,
        peer: SocketAddr,
        shutdown: CancellationToken,
    );
}

/// Serves a blocking-engine connection through the axum router on a
/// single-threaded runtime owned by the worker thread.
#[derive(Clone)]
pub struct HttpDispatch {
    app: Router,
    max_request_body: usize,
}

impl HttpDispatch {
    pub fn new(app: Router, max_request_body: usize) -> Self {
        Self { app, max_request_body }
    }
}

impl Dispatch for HttpDispatch {
    fn dispatch(
        &self,
        stream: std::net::TcpStream,
        peer: SocketAddr,
        shutdown: CancellationToken,
    ) {
        let runtime = match tokio::runtime::Builder::new_current_thread().enable_all().build() {
            Ok(rt) => rt,
            Err(e) => {
                tracing::error!("Cannot start request runtime for {}: {}", peer, e);
                return;
            }
        };
        if let Err(e) = stream.set_nonblocking(true) {
            tracing::debug!("Cannot switch connection from {} to non-blocking: {}", peer, e);
            return;
        }
        let app = self.app.clone();
        let limit = self.max_request_body;
        runtime.block_on(async move {
            match TcpStream::from_std(stream) {
                Ok(stream) => serve_connection(stream, peer, app, limit, shutdown).await,
                Err(e) => tracing::debug!("Cannot register connection from {}: {}", peer, e),
            }
        });
    }
}

/// Serve HTTP/1.1 on one connection until the peer closes it.
///
/// Every request body is aggregated in memory before the router sees it;
/// bodies over `max_request_body` get a 413 and the connection is closed.
/// Responses without a known length are written chunked. When `shutdown`
/// fires, the in-flight request finishes and the connection closes.
pub async fn serve_connection(
    stream: TcpStream,
    peer: SocketAddr,
    app: Router,
    max_request_body: usize,
    shutdown: CancellationToken,
) {
    let service = service_fn(move |req: Request<Incoming>| {
        let app = app.clone();
        async move { Ok::<_, Infallible>(handle(app, peer, req, max_request_body).await) }
    });
    let conn = http1::Builder::new()
        .keep_alive(true)
        .serve_connection(TokioIo::new(stream), service);
    let mut conn = std::pin::pin!(conn);

    let result = tokio::select! {
        res = conn.as_mut() => res,
        _ = shutdown.cancelled() => {
            conn.as_mut().graceful_shutdown();
            conn.as_mut().await
        }
    };
    if let Err(e) = result {
        tracing::debug!("Connection from {} ended with error: {}", peer, e);
    }
}

async fn handle(
    app: Router,
    peer: SocketAddr,
    req: Request<Incoming>,
    limit: usize,
) -> Response<Body> {
    let (mut parts, body) = req.into_parts();
    parts.extensions.insert(ConnectInfo(peer));

    let bytes = match Limited::new(body, limit).collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(err) => return reject_body(peer, err),
    };
    let req = Request::from_parts(parts, Body::from(bytes));
    match app.oneshot(req).await {
        Ok(response) => response,
        Err(never) => match never {},
    }
}

fn reject_body(peer: SocketAddr, err: BoxError) -> Response<Body> {
    let status = if err.downcast_ref::<LengthLimitError>().is_some() {
        StatusCode::PAYLOAD_TOO_LARGE
    } else {
        StatusCode::BAD_REQUEST
    };
    tracing::debug!("Rejecting request body from {}: {} ({})", peer, err, status);
    let mut response = Response::new(Body::empty());
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(header::CONNECTION, HeaderValue::from_static("close"));
    response
}
