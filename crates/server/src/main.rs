use std::{net::SocketAddr, sync::Arc};

use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    routing::{get, post},
    Json, Router,
};
use sheets_integration::SheetsClient;
use shared::protocol::{healthz_route, register_route, RegisterResponse};
use tower_http::limit::RequestBodyLimitLayer;
use tracing::{error, info, warn};

mod api;
mod app_state;
mod config;

use app_state::AppState;
use config::load_settings;

const MAX_REGISTRATION_BYTES: usize = 64 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt().with_env_filter("info").init();

    let settings = load_settings();
    if !settings.sheets_ready() {
        warn!(
            client_email = settings.google_client_email.is_some(),
            private_key = settings.google_private_key.is_some(),
            sheet_id = settings.google_sheet_id.is_some(),
            "Google Sheets credentials incomplete; registrations will be answered with a configuration error"
        );
    }

    let state = AppState {
        sheets: Arc::new(SheetsClient::new(settings.sheets_config())),
    };
    let app = build_router(Arc::new(state));

    let addr: SocketAddr = settings.server_bind.parse()?;
    info!(%addr, "server listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}

fn build_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route(healthz_route(), get(healthz))
        .route(register_route(), post(register))
        .layer(RequestBodyLimitLayer::new(MAX_REGISTRATION_BYTES))
        .with_state(state)
}

async fn healthz() -> &'static str {
    "ok"
}

async fn register(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<RegisterResponse>, (StatusCode, Json<RegisterResponse>)> {
    match api::register(state.sheets.as_ref(), &body).await {
        Ok(record) => {
            info!(
                interests = record.interests.len(),
                "registration appended to sheet"
            );
            Ok(Json(RegisterResponse::ok()))
        }
        Err(err) => {
            error!(error = %err, "Google Sheets API error");
            Err((
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(RegisterResponse::failed(err.public_message())),
            ))
        }
    }
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
