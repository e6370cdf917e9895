//! HTTP API Module
//!
//! Provides the HTTP server with the WebSocket endpoint and the
//! health/liveness/stats endpoints, plus the graceful shutdown wiring.

pub mod dto;
pub mod error;
pub mod handlers;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

use axum::{routing::get, Extension, Router};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tracing::{info, warn};

use crate::config::HttpConfig;
use crate::protocol::error::ServerError;
use crate::protocol::{Handler, WS_PATH};

use self::handlers::{admin, ws};

/// Creates the Axum router
pub fn create_router(handler: Arc<Handler>, config: &HttpConfig) -> Router {
    let cors = if !config.cors_origins.is_empty() {
        // Explicit origins configured: restrict to those
        let origins: Vec<_> = config
            .cors_origins
            .iter()
            .filter_map(|s| {
                let parsed = s.parse();
                if parsed.is_err() {
                    warn!(origin = %s, "cors_origin_invalid");
                }
                parsed.ok()
            })
            .collect();
        Some(
            CorsLayer::new()
                .allow_origin(origins)
                .allow_methods(Any)
                .allow_headers(Any),
        )
    } else if config.cors_allow_all {
        Some(CorsLayer::permissive())
    } else {
        // Same-origin only
        None
    };

    let mut app = Router::new()
        .route("/health", get(admin::health))
        .route("/live", get(admin::liveness))
        .route("/stats", get(admin::stats))
        .route(WS_PATH, get(ws::ws_upgrade))
        .layer(Extension(handler));

    if let Some(cors) = cors {
        app = app.layer(cors);
    }

    app
}

/// Bind the configured address with `SO_REUSEADDR`.
pub fn bind(config: &HttpConfig) -> Result<TcpListener, ServerError> {
    let address = format!("{}:{}", config.host, config.port);
    let addr: SocketAddr = address
        .parse()
        .map_err(|e: std::net::AddrParseError| ServerError::InvalidAddress {
            address: address.clone(),
            reason: e.to_string(),
        })?;

    let socket = if addr.is_ipv4() {
        tokio::net::TcpSocket::new_v4()?
    } else {
        tokio::net::TcpSocket::new_v6()?
    };
    socket.set_reuseaddr(true)?;
    socket.bind(addr)?;
    Ok(socket.listen(1024)?)
}

/// Serve `app` on `listener` until `signal` resolves, then run the shutdown
/// sequence before the HTTP listener stops.
///
/// Upgraded WebSocket connections are not tracked by the HTTP server, so
/// they are swept through [`Handler::shutdown`] first.
pub async fn serve<F>(
    listener: TcpListener,
    app: Router,
    handler: Arc<Handler>,
    signal: F,
) -> Result<(), ServerError>
where
    F: Future<Output = ()> + Send + 'static,
{
    let graceful = {
        let handler = Arc::clone(&handler);
        async move {
            signal.await;
            let report = handler.shutdown().await;
            for (id, reason) in &report.failed {
                warn!(connection_id = %id, reason = %reason, "shutdown_close_failed");
            }
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(graceful)
        .await?;

    info!("http_server_stopped");
    Ok(())
}

/// Starts the HTTP server with graceful shutdown support.
///
/// Listens for SIGINT (ctrl-c) and SIGTERM to trigger graceful shutdown.
pub async fn start_http_server(
    handler: Arc<Handler>,
    config: &HttpConfig,
) -> Result<(), ServerError> {
    let listener = bind(config)?;
    let addr = listener.local_addr()?;
    info!(%addr, ws = %format!("ws://{addr}{WS_PATH}"), "http_server_listening");

    let app = create_router(Arc::clone(&handler), config);
    serve(listener, app, handler, shutdown_signal()).await
}

/// Wait for a shutdown signal (SIGINT or SIGTERM).
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "ctrl_c_handler_failed");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                tokio::select! {
                    () = ctrl_c => info!(signal = "SIGINT", "shutdown_signal"),
                    _ = sigterm.recv() => info!(signal = "SIGTERM", "shutdown_signal"),
                }
            }
            Err(e) => {
                warn!(error = %e, "sigterm_handler_failed");
                ctrl_c.await;
                info!(signal = "SIGINT", "shutdown_signal");
            }
        }
    }

    #[cfg(not(unix))]
    {
        ctrl_c.await;
        info!(signal = "SIGINT", "shutdown_signal");
    }
}
