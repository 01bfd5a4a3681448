//! Local HTTP servers for tests.
//!
//! Available to other crates with the `test-util` feature.

use std::convert::Infallible;
use std::io;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use http_body_util::Full;
use hyper::body::Bytes;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use tokio::net::TcpListener;

/// Serve every request on a loopback port with `handler(path_and_query)`.
pub async fn serve<F>(handler: F) -> io::Result<SocketAddr>
where
    F: Fn(&str) -> (StatusCode, String) + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let handler = Arc::new(handler);

    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            let handler = handler.clone();
            tokio::spawn(async move {
                let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                    let handler = handler.clone();
                    async move {
                        let target = req
                            .uri()
                            .path_and_query()
                            .map(|p| p.as_str().to_string())
                            .unwrap_or_default();
                        let (status, body) = handler(&target);
                        let mut response = Response::new(Full::new(Bytes::from(body)));
                        *response.status_mut() = status;
                        Ok::<_, Infallible>(response)
                    }
                });
                let _ = http1::Builder::new()
                    .serve_connection(TokioIo::new(stream), service)
                    .await;
            });
        }
    });

    Ok(addr)
}

/// An echo server that can be switched between healthy and unavailable.
#[derive(Clone)]
pub struct Toggle {
    up: Arc<AtomicBool>,
}

impl Toggle {
    pub fn new(up: bool) -> Self {
        Self {
            up: Arc::new(AtomicBool::new(up)),
        }
    }

    pub fn set(&self, up: bool) {
        self.up.store(up, Ordering::SeqCst);
    }

    /// Start serving: 200 "Hello" while up, 503 while down.
    pub async fn serve(&self) -> io::Result<SocketAddr> {
        let up = self.up.clone();
        serve(move |_| {
            if up.load(Ordering::SeqCst) {
                (StatusCode::OK, "Hello".to_string())
            } else {
                (StatusCode::SERVICE_UNAVAILABLE, "unavailable".to_string())
            }
        })
        .await
    }
}
