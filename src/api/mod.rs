//! Snapshot HTTP API.
//!
//! - `GET /healthz`: liveness, never touches the store
//! - `GET /faces`: latest snapshot with `ETag`/`If-None-Match` revalidation
//! - anything else: static files from the configured directory
//!
//! The server runs a tokio runtime on its own thread so the detector thread
//! and the rest of the daemon stay synchronous. It stops accepting when the
//! shared `Shutdown` fires and force-closes whatever is still in flight once
//! the grace period has elapsed. A client that does not finish its request
//! headers within the header read timeout is disconnected.

use std::net::{SocketAddr, TcpListener};
use std::path::PathBuf;
use std::thread::JoinHandle;
use std::time::{Duration, Instant};

use anyhow::{anyhow, Context, Result};
use axum::extract::{Request, State};
use axum::handler::HandlerWithoutStateExt;
use axum::http::{header, HeaderMap, StatusCode};
use axum::middleware::{self, Next};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto::Builder;
use hyper_util::service::TowerToHyperService;
use tokio::sync::watch;
use tower_http::services::ServeDir;

use crate::etag;
use crate::shutdown::Shutdown;
use crate::store::SnapshotStore;

const JSON_CONTENT_TYPE: &str = "application/json; charset=utf-8";

#[derive(Clone, Debug)]
pub struct ApiConfig {
    pub addr: String,
    pub static_dir: Option<PathBuf>,
    pub shutdown_grace: Duration,
    pub header_read_timeout: Duration,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            addr: "127.0.0.1:8080".to_string(),
            static_dir: None,
            shutdown_grace: Duration::from_secs(5),
            header_read_timeout: Duration::from_secs(5),
        }
    }
}

impl From<&crate::config::ApiSettings> for ApiConfig {
    fn from(settings: &crate::config::ApiSettings) -> Self {
        Self {
            addr: settings.addr.clone(),
            static_dir: settings.static_dir.clone(),
            shutdown_grace: settings.shutdown_grace,
            header_read_timeout: settings.header_read_timeout,
        }
    }
}

#[derive(Clone)]
struct ApiState {
    store: SnapshotStore,
}

/// Handle to a running API server thread.
#[derive(Debug)]
pub struct ApiHandle {
    pub addr: SocketAddr,
    join: Option<JoinHandle<Result<()>>>,
}

impl ApiHandle {
    /// Wait for the server to finish. It finishes after shutdown is triggered.
    pub fn wait(mut self) -> Result<()> {
        match self.join.take() {
            Some(join) => join
                .join()
                .map_err(|_| anyhow!("api server thread panicked"))?,
            None => Ok(()),
        }
    }
}

pub struct ApiServer {
    cfg: ApiConfig,
    store: SnapshotStore,
    shutdown: Shutdown,
}

impl ApiServer {
    pub fn new(cfg: ApiConfig, store: SnapshotStore, shutdown: Shutdown) -> Self {
        Self {
            cfg,
            store,
            shutdown,
        }
    }

    /// Bind the listener and start serving on a dedicated thread.
    ///
    /// Bind errors are returned here rather than from the thread.
    pub fn spawn(self) -> Result<ApiHandle> {
        let listener = TcpListener::bind(&self.cfg.addr)
            .with_context(|| format!("failed to bind api listener on {}", self.cfg.addr))?;
        let addr = listener.local_addr()?;
        listener.set_nonblocking(true)?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .thread_name("facecast-http")
            .enable_all()
            .build()
            .context("failed to build http runtime")?;

        let app = router(self.store, self.cfg.static_dir.as_deref());
        let shutdown = self.shutdown;
        let limits = ConnectionLimits {
            grace: self.cfg.shutdown_grace,
            header_read_timeout: self.cfg.header_read_timeout,
        };
        let join = std::thread::Builder::new()
            .name("facecast-api".into())
            .spawn(move || {
                let result = runtime.block_on(async move {
                    let listener = tokio::net::TcpListener::from_std(listener)?;
                    serve(listener, app, shutdown, limits).await
                });
                // drops any connection tasks still running past the grace period
                runtime.shutdown_timeout(Duration::from_millis(100));
                if let Err(err) = &result {
                    log::error!("http server stopped: {:#}", err);
                }
                result
            })
            .context("failed to spawn api server thread")?;

        Ok(ApiHandle {
            addr,
            join: Some(join),
        })
    }
}

/// Build the API router. Paths other than the API routes go to `static_dir`
/// when one is given, and to a plain 404 otherwise.
pub fn router(store: SnapshotStore, static_dir: Option<&std::path::Path>) -> Router {
    async fn handle_404() -> impl IntoResponse {
        (StatusCode::NOT_FOUND, "Not found")
    }

    let app = Router::new()
        .route("/healthz", get(healthz))
        .route("/faces", get(faces));

    let app = match static_dir {
        Some(dir) => {
            log::info!("[http] serving static from {}", dir.display());
            app.fallback_service(ServeDir::new(dir).not_found_service(handle_404.into_service()))
        }
        None => app.fallback_service(handle_404.into_service()),
    };

    app.layer(middleware::from_fn(log_requests))
        .with_state(ApiState { store })
}

#[derive(Clone, Copy, Debug)]
struct ConnectionLimits {
    grace: Duration,
    header_read_timeout: Duration,
}

async fn serve(
    listener: tokio::net::TcpListener,
    app: Router,
    shutdown: Shutdown,
    limits: ConnectionLimits,
) -> Result<()> {
    log::info!("[http] listening on {}", listener.local_addr()?);
    // every connection task holds a receiver; `closed` resolves once all are gone
    let (open_tx, open_rx) = watch::channel(());

    loop {
        let (stream, peer) = tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok(conn) => conn,
                Err(err) => {
                    log::warn!("[http] accept failed: {}", err);
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    continue;
                }
            },
            _ = shutdown.wait() => break,
        };
        tokio::spawn(serve_connection(
            stream,
            peer,
            app.clone(),
            shutdown.clone(),
            limits,
            open_rx.clone(),
        ));
    }

    drop(listener);
    drop(open_rx);
    tokio::select! {
        _ = open_tx.closed() => {}
        _ = tokio::time::sleep(limits.grace) => {
            log::warn!(
                "[http] requests still in flight after {:?}; forcing close",
                limits.grace
            );
        }
    }
    log::info!("[http] stopped");
    Ok(())
}

async fn serve_connection(
    stream: tokio::net::TcpStream,
    peer: SocketAddr,
    app: Router,
    shutdown: Shutdown,
    limits: ConnectionLimits,
    _open: watch::Receiver<()>,
) {
    let mut builder = Builder::new(TokioExecutor::new());
    builder
        .http1()
        .timer(TokioTimer::new())
        .header_read_timeout(limits.header_read_timeout);

    let conn = builder.serve_connection(TokioIo::new(stream), TowerToHyperService::new(app));
    tokio::pin!(conn);

    let mut draining = false;
    loop {
        tokio::select! {
            result = conn.as_mut() => {
                if let Err(err) = result {
                    log::debug!("[http] connection from {} closed: {}", peer, err);
                }
                break;
            }
            _ = shutdown.wait(), if !draining => {
                draining = true;
                conn.as_mut().graceful_shutdown();
            }
        }
    }
}

async fn healthz() -> &'static str {
    "ok"
}

async fn faces(State(state): State<ApiState>, headers: HeaderMap) -> Response {
    let (snapshot, version) = state.store.get();
    let tag = etag::validation_token(version, snapshot.frame);
    let cache_headers = [
        (header::CACHE_CONTROL, "no-store".to_string()),
        (header::ACCESS_CONTROL_ALLOW_ORIGIN, "*".to_string()),
    ];

    let revalidated = headers
        .get(header::IF_NONE_MATCH)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| etag::if_none_match(value, &tag));
    if revalidated {
        return (StatusCode::NOT_MODIFIED, cache_headers, [(header::ETAG, tag)]).into_response();
    }

    match snapshot.to_json_body() {
        Ok(body) => (
            StatusCode::OK,
            cache_headers,
            [
                (header::CONTENT_TYPE, JSON_CONTENT_TYPE.to_string()),
                (header::ETAG, tag),
            ],
            body,
        )
            .into_response(),
        Err(err) => {
            log::error!("[http] failed to serialize snapshot frame={}: {}", snapshot.frame, err);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                cache_headers,
                "snapshot serialization failed",
            )
                .into_response()
        }
    }
}

async fn log_requests(req: Request, next: Next) -> Response {
    let method = req.method().clone();
    let path = req.uri().path().to_string();
    let started = Instant::now();
    let response = next.run(req).await;
    log::info!(
        "[http] {} {} {} {:?}",
        method,
        path,
        response.status().as_u16(),
        started.elapsed()
    );
    response
}
