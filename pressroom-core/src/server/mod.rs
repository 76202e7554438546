//! Server initialization and routing

use crate::api;
use crate::config::Config;
use crate::identity::{AuthProvider, StaticAuthProvider, SupabaseAuthClient};
use crate::middleware::rate_limit::{
    api_rate_limit, login_rate_limit, public_rate_limit, view_rate_limit,
};
use crate::middleware::{
    csrf_middleware, normalize_error_response, panic_response, rate_limit_middleware,
    security_headers_middleware, ObservabilityLayer, SanitizedMakeSpan,
};
use crate::repository::{ArticleRepository, InMemoryArticleRepository, RestArticleRepository};
use crate::security::SecurityServices;
use crate::service::{ArticleService, ViewCounter};
use anyhow::{Context, Result};
use axum::{
    middleware::from_fn_with_state,
    routing::{get, post, put},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower_http::{catch_panic::CatchPanicLayer, trace::TraceLayer};
use tracing::{info, warn};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<Config>,
    pub security: SecurityServices,
    pub articles: ArticleService,
    pub auth: Arc<dyn AuthProvider>,
    pub views: Arc<ViewCounter>,
    pub prometheus: Option<PrometheusHandle>,
}

impl AppState {
    /// Starts the view counter's drain task, so it needs a running runtime.
    pub fn new(
        config: Config,
        repo: Arc<dyn ArticleRepository>,
        auth: Arc<dyn AuthProvider>,
        prometheus: Option<PrometheusHandle>,
    ) -> Self {
        let security = SecurityServices::from_config(&config);
        let articles = ArticleService::new(repo.clone(), security.sanitizer.clone());
        let views = Arc::new(ViewCounter::start(repo, config.view_queue_capacity));
        Self {
            config: Arc::new(config),
            security,
            articles,
            auth,
            views,
            prometheus,
        }
    }
}

/// Hosted stores when configured, else process-local ones.
fn build_backends(config: &Config) -> Result<(Arc<dyn ArticleRepository>, Arc<dyn AuthProvider>)> {
    match &config.store {
        Some(store) => {
            let http_client = reqwest::Client::builder()
                .timeout(Duration::from_secs(30))
                .build()
                .context("Failed to create HTTP client")?;
            info!(url = %store.url, "Using hosted article store and auth service");
            let repo = RestArticleRepository::new(http_client.clone(), &store.url, store.data_key());
            let auth = SupabaseAuthClient::new(http_client, &store.url, &store.anon_key);
            Ok((Arc::new(repo), Arc::new(auth)))
        }
        None => {
            if config.is_production() {
                warn!("No store configured in production; articles will not persist");
            }
            if config.dev_admin.is_none() {
                warn!("No DEV_ADMIN_EMAIL/DEV_ADMIN_PASSWORD set; editor sign-in is disabled");
            }
            Ok((
                Arc::new(InMemoryArticleRepository::new()),
                Arc::new(StaticAuthProvider::new(config.dev_admin.clone())),
            ))
        }
    }
}

/// Run the server
pub async fn run(config: Config, prometheus: Option<PrometheusHandle>) -> Result<()> {
    let (repo, auth) = build_backends(&config)?;
    let state = AppState::new(config, repo, auth, prometheus);
    state.security.rate_limiter.init();

    let http_addr = state.config.http_addr();
    let app = build_router(state.clone());

    let listener = TcpListener::bind(&http_addr)
        .await
        .with_context(|| format!("Failed to bind {}", http_addr))?;
    info!(
        environment = ?state.config.environment,
        "HTTP server started on {}", http_addr
    );

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    state.security.rate_limiter.shutdown().await;
    state.views.shutdown().await;
    info!("HTTP server stopped");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    info!("Shutdown signal received");
}

/// Build the HTTP router.
///
/// Every API route sits in exactly one endpoint class. Within a class the
/// rate limit runs first, then the CSRF/origin check, then the handler.
pub fn build_router(state: AppState) -> Router {
    let limiter = &state.security.rate_limiter;

    let public = Router::new()
        .route("/api/csrf-token", get(api::csrf::csrf_token))
        .route("/api/articles/{article}", get(api::article::get_article))
        .route_layer(from_fn_with_state(
            public_rate_limit(limiter),
            rate_limit_middleware,
        ));

    let editor = Router::new()
        .route("/api/articles", post(api::article::create_article))
        .route(
            "/api/articles/{article}",
            put(api::article::update_article).delete(api::article::delete_article),
        )
        .route("/api/auth/sign-out", post(api::auth::sign_out))
        .route_layer(from_fn_with_state(
            state.security.csrf.clone(),
            csrf_middleware,
        ))
        .route_layer(from_fn_with_state(
            api_rate_limit(limiter),
            rate_limit_middleware,
        ));

    // Sign-in checks CSRF itself so the token may come in the body.
    let login = Router::new()
        .route("/api/auth/sign-in", post(api::auth::sign_in))
        .route_layer(from_fn_with_state(
            login_rate_limit(limiter),
            rate_limit_middleware,
        ));

    let views = Router::new()
        .route(
            "/api/articles/{article}/view",
            get(api::article::record_view).post(api::article::record_view),
        )
        .route_layer(from_fn_with_state(
            view_rate_limit(limiter),
            rate_limit_middleware,
        ));

    let mut router = Router::new()
        .route("/health", get(api::health::health))
        .route("/ready", get(api::health::ready));
    if state.prometheus.is_some() {
        router = router.route("/metrics", get(api::metrics::metrics_handler));
    }

    router
        .merge(public)
        .merge(editor)
        .merge(login)
        .merge(views)
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(from_fn_with_state(
            state.security.redactor.clone(),
            normalize_error_response,
        ))
        .layer(from_fn_with_state(
            state.config.security_headers.clone(),
            security_headers_middleware,
        ))
        .layer(TraceLayer::new_for_http().make_span_with(SanitizedMakeSpan))
        .layer(ObservabilityLayer)
        .with_state(state)
}
