use crate::api::handlers::{
    auth::{AuthConfig, AuthState},
    health,
};
use anyhow::{bail, Context, Result};
use axum::{
    body::Body,
    extract::MatchedPath,
    http::{
        header::{AUTHORIZATION, CONTENT_TYPE},
        HeaderName, HeaderValue, Method, Request,
    },
    routing::options,
    Extension, Router,
};
use sqlx::{postgres::PgPoolOptions, PgPool};
use std::{net::SocketAddr, sync::Arc, time::Duration};
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{error, info, info_span, Span};
use ulid::Ulid;
use url::{Origin, Url};
use utoipa_axum::router::OpenApiRouter;
use utoipa_swagger_ui::SwaggerUi;

pub mod email;
pub mod handlers;
mod openapi;

pub use openapi::openapi;

const REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// Documented routes, without layers or shared state.
#[must_use]
pub fn router() -> OpenApiRouter {
    openapi::api_router()
}

/// Assemble the service around the documented routes.
///
/// # Errors
/// Returns an error if the frontend base URL has no usable origin.
pub fn app(pool: PgPool, auth_state: Arc<AuthState>) -> Result<Router> {
    let cors = cors_layer(auth_state.config().frontend_base_url())?;

    let (routes, openapi) = router().split_for_parts();
    let app = routes
        .route("/health", options(health::health))
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", openapi))
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(REQUEST_ID, UlidRequestId))
                .layer(PropagateRequestIdLayer::new(REQUEST_ID))
                .layer(TraceLayer::new_for_http().make_span_with(make_span))
                .layer(cors)
                .layer(Extension(auth_state))
                .layer(Extension(pool)),
        );

    Ok(app)
}

/// Connect, start the outbox worker, and serve until SIGINT or SIGTERM.
///
/// # Errors
/// Returns an error if the database is unreachable or the port cannot be bound.
pub async fn new(
    port: u16,
    dsn: String,
    auth_config: AuthConfig,
    email_config: email::EmailWorkerConfig,
) -> Result<()> {
    let pool = PgPoolOptions::new()
        .min_connections(1)
        .max_connections(10)
        .acquire_timeout(Duration::from_secs(5))
        .idle_timeout(Duration::from_secs(300))
        .connect(&dsn)
        .await
        .context("Failed to connect to database")?;

    let outbox = email::spawn_outbox_worker(
        pool.clone(),
        Arc::new(email::LogEmailSender),
        email_config,
    );

    let app = app(pool, Arc::new(AuthState::new(auth_config)))?;

    let addr = SocketAddr::from(([0u16; 8], port));
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!(%addr, "carelink listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    outbox.abort();
    info!("carelink stopped");

    Ok(())
}

async fn shutdown_signal() {
    let interrupt = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {err}");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        match signal(SignalKind::terminate()) {
            Ok(mut stream) => {
                stream.recv().await;
            }
            Err(err) => {
                error!("Failed to listen for SIGTERM: {err}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = interrupt => info!("received ctrl-c, draining connections"),
        () = terminate => info!("received SIGTERM, draining connections"),
    }
}

#[derive(Clone, Copy, Debug)]
struct UlidRequestId;

impl MakeRequestId for UlidRequestId {
    fn make_request_id<B>(&mut self, _request: &Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Ulid::new().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Credentialed CORS for the single frontend origin.
fn cors_layer(frontend_base_url: &str) -> Result<CorsLayer> {
    Ok(CorsLayer::new()
        .allow_origin(AllowOrigin::exact(frontend_origin(frontend_base_url)?))
        .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE])
        .allow_headers([CONTENT_TYPE, AUTHORIZATION])
        .allow_credentials(true))
}

fn make_span(request: &Request<Body>) -> Span {
    let route = request
        .extensions()
        .get::<MatchedPath>()
        .map_or_else(|| request.uri().path(), MatchedPath::as_str);
    let request_id = request
        .headers()
        .get(&REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("none");

    info_span!(
        "http.request",
        http.method = %request.method(),
        http.route = route,
        request_id
    )
}

/// The frontend origin as browsers send it in `Origin`.
fn frontend_origin(frontend_base_url: &str) -> Result<HeaderValue> {
    let url = Url::parse(frontend_base_url)
        .with_context(|| format!("Invalid frontend base URL: {frontend_base_url}"))?;
    let origin = url.origin();
    if let Origin::Opaque(_) = origin {
        bail!("Frontend base URL has no origin: {frontend_base_url}");
    }
    HeaderValue::from_str(&origin.ascii_serialization())
        .context("Failed to build frontend origin header")
}
