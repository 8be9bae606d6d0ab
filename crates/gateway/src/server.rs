use std::{net::SocketAddr, sync::Arc};

use {
    axum::{
        Router,
        extract::{State, rejection::JsonRejection},
        http::StatusCode,
        middleware,
        response::{Html, IntoResponse, Json},
        routing::{get, post},
    },
    serde::Deserialize,
    serde_json::json,
    tower_http::{
        cors::{Any, CorsLayer},
        trace::TraceLayer,
    },
    tracing::{info, warn},
};

use {
    zahra_channels::ProtocolClient,
    zahra_config::{WhatsAppBackend, WhatsAppConfig, ZahraConfig},
    zahra_whatsapp::{BridgeClient, OutboundRequest},
};

use crate::{
    auth::{self, require_token},
    error::ApiError,
    qr,
    state::GatewayState,
};

// ── Shared app state ─────────────────────────────────────────────────────────

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) gateway: Arc<GatewayState>,
}

// ── Server startup ───────────────────────────────────────────────────────────

/// Build the gateway router (shared between production startup and tests).
pub fn build_gateway_app(state: Arc<GatewayState>) -> Router {
    let app_state = AppState { gateway: state };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let control = Router::new()
        .route("/send", post(send_handler))
        .route("/session/start", post(session_start_handler))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            require_token,
        ));

    Router::new()
        .route("/", get(root_handler))
        .route("/qr", get(qr_handler))
        .route("/status", get(status_handler))
        .route("/health", get(health_handler))
        .merge(control)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(app_state)
}

/// Protocol client selected by `whatsapp.backend`.
pub fn protocol_client(cfg: &WhatsAppConfig) -> anyhow::Result<Arc<dyn ProtocolClient>> {
    match cfg.backend {
        WhatsAppBackend::Bridge => Ok(Arc::new(BridgeClient::from_config(cfg))),
        #[cfg(feature = "native")]
        WhatsAppBackend::Native => Ok(Arc::new(zahra_whatsapp::NativeClient::from_config(cfg))),
        #[cfg(not(feature = "native"))]
        WhatsAppBackend::Native => anyhow::bail!(
            "whatsapp.backend = \"native\" needs a build with the `native` feature"
        ),
    }
}

/// Start the HTTP gateway and the WhatsApp session behind it.
pub async fn start_gateway(config: ZahraConfig) -> anyhow::Result<()> {
    let resolved_auth = auth::resolve_auth(
        config.gateway.api_token.clone(),
        std::env::var("ZAHRA_API_TOKEN").ok(),
    );
    let auth_enabled = resolved_auth.is_enabled();

    let client = protocol_client(&config.whatsapp)?;
    let backend = client.id().to_string();
    let state = GatewayState::spawn(client, &config, resolved_auth);
    let app = build_gateway_app(Arc::clone(&state));

    let addr: SocketAddr = format!("{}:{}", config.gateway.bind, config.gateway.port).parse()?;
    let listener = tokio::net::TcpListener::bind(addr).await?;

    // Startup banner.
    let lines = [
        format!("{} gateway v{}", config.gateway.bot_name, state.version),
        format!("listening on http://{addr}"),
        match config.whatsapp.backend {
            WhatsAppBackend::Bridge => format!("backend: {backend} ({})", config.whatsapp.bridge_url),
            WhatsAppBackend::Native => format!("backend: {backend} ({})", config.whatsapp.auth_dir),
        },
        format!(
            "control auth: {}",
            if auth_enabled { "bearer token" } else { "open" }
        ),
    ];
    let width = lines.iter().map(|l| l.chars().count()).max().unwrap_or(0) + 4;
    info!("┌{}┐", "─".repeat(width));
    for line in &lines {
        info!("│  {:<w$}│", line, w = width - 2);
    }
    info!("└{}┘", "─".repeat(width));

    state.session.start();

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!(uptime_secs = state.uptime_secs(), "gateway stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "failed to listen for ctrl-c");
        std::future::pending::<()>().await;
    }
    info!("shutdown requested");
}

// ── Handlers ─────────────────────────────────────────────────────────────────

async fn root_handler(State(state): State<AppState>) -> Html<String> {
    Html(format!(
        "{} is running. Scan QR at <a href='/qr'>/qr</a>",
        state.gateway.bot_name
    ))
}

async fn qr_handler(State(state): State<AppState>) -> Html<String> {
    let session = state.gateway.session.current_state();
    match session.pairing_token {
        Some(token) => Html(qr::qr_page(&token, state.gateway.qr_renderer)),
        None => Html(qr::NO_QR_MESSAGE.to_string()),
    }
}

async fn status_handler(State(state): State<AppState>) -> impl IntoResponse {
    Json(session_snapshot(&state.gateway))
}

async fn health_handler(State(state): State<AppState>) -> impl IntoResponse {
    let session = state.gateway.session.current_state();
    Json(json!({
        "status": "ok",
        "version": state.gateway.version,
        "session": session.state.as_str(),
        "uptime_secs": state.gateway.uptime_secs(),
    }))
}

#[derive(Debug, Deserialize)]
struct SendBody {
    number: String,
    message: String,
}

async fn send_handler(
    State(state): State<AppState>,
    body: Result<Json<SendBody>, JsonRejection>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let Json(body) = body?;
    let req = OutboundRequest::new(body.number.clone(), body.message);
    let ack = state.gateway.relay.send(&req).await?;
    info!(to = %ack.to, id = %ack.id, "message sent via http");
    Ok(Json(json!({ "success": true, "to": body.number })))
}

async fn session_start_handler(State(state): State<AppState>) -> impl IntoResponse {
    state.gateway.session.start();
    (StatusCode::ACCEPTED, Json(session_snapshot(&state.gateway)))
}

fn session_snapshot(gateway: &GatewayState) -> serde_json::Value {
    let session = gateway.session.current_state();
    json!({
        "status": session.state.status_label(),
        "state": session.state.as_str(),
        "last_error": session.last_error.as_ref().map(ToString::to_string),
    })
}
