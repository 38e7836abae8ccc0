// Copyright 2026, Jeroen van Erp <jeroen@geeko.me>
// SPDX-License-Identifier: Apache-2.0

//! Plain HTTP listeners for the liveness/readiness probes and the metrics scrape.

use crate::metrics::render_metrics;
use anyhow::{Context, Result};
use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::{Request, Response, StatusCode};
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::{TokioExecutor, TokioIo};
use hyper_util::server::conn::auto;
use std::convert::Infallible;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What a listener answers besides 404
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Endpoints {
    /// `/healthz` and `/readyz`
    Probes,
    /// `/metrics`
    Metrics,
}

fn text(status: StatusCode, body: impl Into<Bytes>) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(body.into()));
    *response.status_mut() = status;
    response.headers_mut().insert(
        CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    response
}

pub fn route(endpoints: Endpoints, path: &str) -> Response<Full<Bytes>> {
    match (endpoints, path) {
        (Endpoints::Probes, "/healthz" | "/readyz") => text(StatusCode::OK, "ok"),
        (Endpoints::Metrics, "/metrics") => match render_metrics() {
            Some(body) => text(StatusCode::OK, body),
            None => text(StatusCode::SERVICE_UNAVAILABLE, "metrics not initialized"),
        },
        _ => text(StatusCode::NOT_FOUND, "not found"),
    }
}

pub async fn bind(addr: SocketAddr) -> Result<TcpListener> {
    TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {}", addr))
}

/// Accept connections until `cancel` fires. HTTP/2 is only negotiated when
/// `enable_http2` is set; otherwise connections are served as HTTP/1.1.
pub async fn serve(
    listener: TcpListener,
    endpoints: Endpoints,
    enable_http2: bool,
    cancel: CancellationToken,
) {
    if let Ok(addr) = listener.local_addr() {
        info!("Serving {:?} endpoints on {}", endpoints, addr);
    }

    loop {
        let accepted = tokio::select! {
            _ = cancel.cancelled() => break,
            accepted = listener.accept() => accepted,
        };

        let stream = match accepted {
            Ok((stream, _)) => stream,
            Err(e) => {
                warn!("Failed to accept connection: {}", e);
                continue;
            }
        };

        let io = TokioIo::new(stream);
        let service = service_fn(move |req: Request<Incoming>| async move {
            Ok::<_, Infallible>(route(endpoints, req.uri().path()))
        });

        tokio::spawn(async move {
            if enable_http2 {
                let builder = auto::Builder::new(TokioExecutor::new());
                if let Err(e) = builder.serve_connection(io, service).await {
                    debug!("Connection error: {}", e);
                }
            } else if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                debug!("Connection error: {}", e);
            }
        });
    }

    debug!("{:?} listener stopped", endpoints);
}
