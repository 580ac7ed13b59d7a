//! Metrics and health endpoint
//!
//! Serves `/metrics` (Prometheus text format) and `/healthz` over HTTP/1.

use crate::apis::metrics::gather_controller_metrics;
use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::convert::Infallible;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

/// HTTP server exposing controller metrics
pub struct MetricsServer {
    listener: TcpListener,
}

impl MetricsServer {
    /// Bind immediately so address conflicts surface at startup
    pub async fn bind(bind_addr: &str) -> Result<Self, String> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| format!("Failed to bind to {}: {}", bind_addr, e))?;
        Ok(Self { listener })
    }

    pub fn local_addr(&self) -> Result<std::net::SocketAddr, String> {
        self.listener
            .local_addr()
            .map_err(|e| format!("Failed to read local address: {}", e))
    }

    /// Accept connections until the task is dropped
    pub async fn serve(self) {
        match self.local_addr() {
            Ok(addr) => info!("Metrics server listening on {}", addr),
            Err(e) => error!("{}", e),
        }

        loop {
            match self.listener.accept().await {
                Ok((stream, peer_addr)) => {
                    debug!("Accepted metrics connection from {}", peer_addr);
                    tokio::spawn(async move {
                        let io = TokioIo::new(stream);
                        let service = service_fn(|req: Request<hyper::body::Incoming>| async move {
                            Ok::<_, Infallible>(respond(req.method(), req.uri().path()))
                        });
                        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                            debug!("Metrics connection error: {}", e);
                        }
                    });
                }
                Err(e) => {
                    error!("Metrics accept error: {}", e);
                }
            }
        }
    }
}

fn respond(method: &Method, path: &str) -> Response<Full<Bytes>> {
    match (method, path) {
        (&Method::GET, "/metrics") => match gather_controller_metrics() {
            Ok(body) => text_response(StatusCode::OK, body),
            Err(e) => {
                error!("Failed to encode metrics: {}", e);
                text_response(StatusCode::INTERNAL_SERVER_ERROR, e)
            }
        },
        (&Method::GET, "/healthz") => text_response(StatusCode::OK, "ok".to_string()),
        _ => text_response(StatusCode::NOT_FOUND, "not found".to_string()),
    }
}

fn text_response(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    let mut response = Response::new(Full::new(Bytes::from(body)));
    *response.status_mut() = status;
    response.headers_mut().insert(
        hyper::header::CONTENT_TYPE,
        hyper::header::HeaderValue::from_static("text/plain; version=0.0.4"),
    );
    response
}
