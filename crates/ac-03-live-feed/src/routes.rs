//! HTTP surface of the live feed: search and the WebSocket endpoint.

use crate::errors::FeedError;
use crate::hub::HubHandle;
use crate::pump::PumpConfig;
use crate::search::{FlightSearch, SearchParams, SearchResponse};
use crate::ws::serve_listener;
use axum::extract::ws::WebSocketUpgrade;
use axum::extract::{Query, State};
use axum::response::Response;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::Arc;

pub const SEARCH_PATH: &str = "/api/flights";
pub const WS_PATH: &str = "/wsapi/ws";

/// State shared by the feed handlers.
#[derive(Clone)]
pub struct FeedState {
    pub hub: HubHandle,
    pub search: Arc<FlightSearch>,
    pub listener_buffer: usize,
    pub pump: PumpConfig,
}

pub fn router(state: FeedState) -> Router {
    Router::new()
        .route(SEARCH_PATH, get(search_flights))
        .route(WS_PATH, get(open_listener))
        .with_state(state)
}

async fn search_flights(
    State(state): State<FeedState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, FeedError> {
    let query = params.to_query();
    let response = state.search.search(&query).await?;
    Ok(Json(response))
}

async fn open_listener(State(state): State<FeedState>, upgrade: WebSocketUpgrade) -> Response {
    upgrade.on_upgrade(move |socket| {
        serve_listener(socket, state.hub, state.listener_buffer, state.pump)
    })
}
