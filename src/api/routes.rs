use crate::api::api_error::APIError;
use crate::api::model::{CleanupRequest, PresentRequest, PresentResult};
use crate::api::server::AppState;
use crate::error::Error;
use axum::extract::{ConnectInfo, State};
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::WithRejection;
use serde_json::json;
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use trust_dns_client::rr::Name;

pub(super) fn new(state: AppState) -> Router {
    Router::new()
        .route("/healthcheck", get(health_check))
        .route("/present", post(present))
        .route("/cleanup", post(cleanup))
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(state.config.api_timeout))
        .with_state(state)
}

#[allow(clippy::unused_async)]
async fn health_check() -> impl IntoResponse {
    Json(json!({"ok":"healthy"}))
}

async fn present(
    State(state): State<AppState>,
    ConnectInfo(client_addr): ConnectInfo<SocketAddr>,
    WithRejection(Json(payload), _): WithRejection<Json<PresentRequest>, APIError>,
) -> Result<Json<PresentResult>, APIError> {
    let client_addr = client_addr.ip();
    authorize(&state, client_addr, &payload.domain)?;

    if let Err(err) = payload.valid_dns01() {
        tracing::debug!("rejected challenge from {client_addr} for \"{}\": {err}", payload.domain);
        return Err(Error::InvalidDNS01.into());
    }

    tracing::info!("accepted challenge from {client_addr} for \"{}\"", payload.domain);
    let challenge_path = state
        .adapter
        .present_challenge(&payload.domain, &payload.txt)
        .await?;
    Ok(Json(PresentResult {
        txt: payload.txt,
        challenge_path,
    }))
}

async fn cleanup(
    State(state): State<AppState>,
    ConnectInfo(client_addr): ConnectInfo<SocketAddr>,
    WithRejection(Json(payload), _): WithRejection<Json<CleanupRequest>, APIError>,
) -> Result<impl IntoResponse, APIError> {
    let client_addr = client_addr.ip();
    authorize(&state, client_addr, &payload.domain)?;

    state.adapter.resolve(&payload.domain)?;
    tracing::info!("accepted cleanup from {client_addr} for \"{}\"", payload.domain);
    state
        .adapter
        .withdraw_challenge(&payload.domain, &payload.txt)
        .await;
    Ok(Json(json!({"ok":"removed"})))
}

fn authorize(state: &AppState, client_addr: IpAddr, domain: &str) -> Result<(), Error> {
    let domain = Name::from_str(domain)?;
    if !state.config.update_permitted(client_addr, &domain) {
        tracing::debug!("rejected request from {client_addr} for \"{domain}\"");
        return Err(Error::AuthForbidden(client_addr, domain.into()));
    }
    Ok(())
}
