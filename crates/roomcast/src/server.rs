//! `RoomcastServer` builder and server loop.
//!
//! This is the entry point for running a roomcast relay. It ties together
//! all the layers: HTTP routing → session → room → protocol → transport.

use std::future::Future;
use std::net::SocketAddr;

use axum::Router;
use axum::http::Method;
use axum::http::header::CONTENT_TYPE;
use axum::routing::{get, post};
use roomcast_room::RoomConfig;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::handler::{create_room, preflight, room_health_check, subscribe};
use crate::{ChatRelay, RoomcastError};

/// Default listen address.
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

/// Shared state passed to every handler.
#[derive(Debug, Clone)]
pub(crate) struct AppState {
    pub(crate) relay: ChatRelay,
    /// Every session's cancellation token is a child of this one.
    pub(crate) shutdown: CancellationToken,
}

/// Builds the application router.
pub(crate) fn router(state: AppState) -> Router {
    Router::new()
        .route("/createRoom", post(create_room).options(preflight))
        .route("/roomHealthCheck", get(room_health_check).options(preflight))
        .route("/subscribe", get(subscribe).options(preflight))
        .layer(cors_layer())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([Method::POST, Method::GET, Method::OPTIONS])
        .allow_headers([CONTENT_TYPE])
}

/// Builder for configuring and starting a roomcast server.
///
/// # Example
///
/// ```rust,no_run
/// use roomcast::prelude::*;
///
/// # async fn example() -> Result<(), RoomcastError> {
/// let server = RoomcastServer::builder()
///     .bind("0.0.0.0:3000")
///     .room_config(RoomConfig::default())
///     .build()
///     .await?;
/// server.run().await
/// # }
/// ```
#[derive(Debug)]
pub struct RoomcastServerBuilder {
    bind_addr: String,
    room_config: RoomConfig,
}

impl RoomcastServerBuilder {
    /// Creates a new builder with default settings.
    pub fn new() -> Self {
        Self {
            bind_addr: DEFAULT_BIND.to_string(),
            room_config: RoomConfig::default(),
        }
    }

    /// Sets the address to bind the server to.
    pub fn bind(mut self, addr: &str) -> Self {
        self.bind_addr = addr.to_string();
        self
    }

    /// Sets reaper timing and inbox settings for every room.
    pub fn room_config(mut self, config: RoomConfig) -> Self {
        self.room_config = config;
        self
    }

    /// Binds the listener. The server does not accept connections until
    /// [`RoomcastServer::run`] is called.
    pub async fn build(self) -> Result<RoomcastServer, RoomcastError> {
        let listener = TcpListener::bind(&self.bind_addr).await?;
        Ok(RoomcastServer {
            listener,
            relay: ChatRelay::new(self.room_config),
            shutdown: CancellationToken::new(),
        })
    }
}

impl Default for RoomcastServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// A bound roomcast server.
#[derive(Debug)]
pub struct RoomcastServer {
    listener: TcpListener,
    relay: ChatRelay,
    shutdown: CancellationToken,
}

impl RoomcastServer {
    /// Creates a new builder.
    pub fn builder() -> RoomcastServerBuilder {
        RoomcastServerBuilder::new()
    }

    /// Returns the local address the server is bound to.
    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// The relay this server serves. Clones share its rooms.
    pub fn relay(&self) -> &ChatRelay {
        &self.relay
    }

    /// Cancelling this token shuts the server down and ends every
    /// session.
    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Serves requests until the shutdown token is cancelled.
    pub async fn run(self) -> Result<(), RoomcastError> {
        let addr = self.local_addr()?;
        tracing::info!(%addr, "roomcast server listening");

        let stopped = self.shutdown.clone().cancelled_owned();
        let app = router(AppState {
            relay: self.relay,
            shutdown: self.shutdown,
        });
        axum::serve(self.listener, app)
            .with_graceful_shutdown(stopped)
            .await?;

        tracing::info!("roomcast server stopped");
        Ok(())
    }

    /// Serves requests until `signal` completes, then shuts down.
    pub async fn run_until<F>(self, signal: F) -> Result<(), RoomcastError>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let token = self.shutdown.clone();
        tokio::spawn(async move {
            signal.await;
            tracing::info!("shutdown requested");
            token.cancel();
        });
        self.run().await
    }
}
