use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use axum::extract::{DefaultBodyLimit, FromRef};
use axum::routing::{get, post};
use grantflow::oauth::TokenGenerator;
use grantflow::{AuthorizationServer, ConfigError, http};
use grantflow_memory::MemoryStore;
use tokio::task::JoinHandle;
use uuid::Uuid;
use tower_http::{compression::CompressionLayer, cors::CorsLayer, trace::TraceLayer};

use crate::config::AppConfig;
use crate::fixtures::FixtureError;
use crate::handlers;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("invalid authorization server configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("fixture seeding failed: {0}")]
    Fixtures(#[from] FixtureError),
}

/// Shared state for all routes.
#[derive(Clone)]
pub struct AppState {
    pub server: Arc<AuthorizationServer>,
    pub store: Arc<MemoryStore>,
}

impl FromRef<AppState> for Arc<AuthorizationServer> {
    fn from_ref(state: &AppState) -> Self {
        state.server.clone()
    }
}

/// Seeds a fresh in-memory store and builds the authorization server on it.
pub fn build_state(
    cfg: &AppConfig,
    generator: Option<Arc<dyn TokenGenerator>>,
) -> Result<AppState, ServerError> {
    let store = Arc::new(MemoryStore::new());
    cfg.fixtures.load()?.seed(&store)?;

    let mut builder = AuthorizationServer::builder()
        .config(cfg.oauth.clone())
        .clients(store.clone())
        .tokens(store.clone())
        .codes(store.clone())
        .users(store.clone())
        .devices(store.clone())
        .with_default_grants();
    if let Some(generator) = generator {
        builder = builder.token_generator(generator);
    }

    Ok(AppState {
        server: Arc::new(builder.build()?),
        store,
    })
}

pub fn build_app(state: AppState, cfg: &AppConfig) -> Router {
    let body_limit = cfg.server.body_limit_bytes;
    Router::new()
        .route("/healthz", get(handlers::healthz))
        .route(
            "/oauth/authorize",
            get(handlers::authorize_get).post(handlers::authorize_post),
        )
        .route(
            "/oauth/token",
            get(http::token_handler).post(http::token_handler),
        )
        .route("/oauth/revoke", post(http::revoke_handler))
        .route("/oauth/introspect", post(http::introspect_handler))
        .route(
            "/oauth/device_authorization",
            post(http::device_authorization_handler),
        )
        .route("/oauth/device", post(handlers::device_decision))
        .layer(CorsLayer::permissive())
        .layer(CompressionLayer::new())
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(|req: &axum::http::Request<_>| {
                    tracing::info_span!(
                        "http.request",
                        http.method = %req.method(),
                        http.target = %req.uri().path(),
                        http.status_code = tracing::field::Empty,
                        request_id = %Uuid::new_v4(),
                    )
                })
                .on_response(
                    |res: &axum::http::Response<_>, latency: Duration, span: &tracing::Span| {
                        span.record(
                            "http.status_code",
                            tracing::field::display(res.status().as_u16()),
                        );
                        tracing::info!(
                            http.status = %res.status().as_u16(),
                            elapsed_ms = %latency.as_millis(),
                            "request handled"
                        );
                    },
                ),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .with_state(state)
}

/// Drops expired tokens, codes and device authorizations on a fixed interval.
pub fn spawn_purge_task(store: Arc<MemoryStore>, every: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        // The first tick completes immediately.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            let stats = store.purge_expired();
            tracing::debug!(
                tokens = stats.tokens,
                codes = stats.codes,
                devices = stats.devices,
                "Purged expired entries"
            );
        }
    })
}

pub struct GrantflowServer {
    addr: SocketAddr,
    app: Router,
    store: Arc<MemoryStore>,
    purge_interval: Duration,
}

#[derive(Default)]
pub struct ServerBuilder {
    config: AppConfig,
    generator: Option<Arc<dyn TokenGenerator>>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(mut self, cfg: AppConfig) -> Self {
        self.config = cfg;
        self
    }

    /// Replaces the access token generator.
    pub fn with_token_generator(mut self, generator: Arc<dyn TokenGenerator>) -> Self {
        self.generator = Some(generator);
        self
    }

    pub fn build(self) -> Result<GrantflowServer, ServerError> {
        self.config.validate().map_err(ServerError::InvalidConfig)?;
        let state = build_state(&self.config, self.generator)?;
        let store = state.store.clone();
        let app = build_app(state, &self.config);

        Ok(GrantflowServer {
            addr: self.config.addr(),
            app,
            store,
            purge_interval: self.config.storage.purge_interval,
        })
    }
}

impl GrantflowServer {
    pub async fn run(self) -> anyhow::Result<()> {
        let purge = spawn_purge_task(self.store, self.purge_interval);
        let listener = tokio::net::TcpListener::bind(self.addr).await?;
        tracing::info!("listening on {}", self.addr);
        let served = axum::serve(listener, self.app)
            .with_graceful_shutdown(shutdown_signal())
            .await;
        purge.abort();
        served?;
        Ok(())
    }
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
