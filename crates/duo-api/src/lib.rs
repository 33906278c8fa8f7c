pub mod couples;
pub mod error;
pub mod extract;
pub mod middleware;
pub mod rows;
pub mod state;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    middleware::from_fn_with_state,
    response::IntoResponse,
    routing::{get, patch, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use duo_feed::connection;

use crate::middleware::{require_api_key, require_session};
pub use crate::state::{AppState, AppStateInner};

/// The full HTTP surface: couple identity, couple-scoped rows, and the
/// change feed socket.
pub fn router(state: AppState) -> Router {
    let couple_routes = Router::new()
        .route("/rpc/generate_couple_code", post(couples::generate_code))
        .route("/couples", post(couples::create_couple))
        .route("/couples/lookup", get(couples::lookup_couple))
        .route("/couples/{couple_id}", get(couples::verify_couple));

    let session_routes = Router::new()
        .route("/couples/{couple_id}/partner", post(couples::claim_partner))
        .route(
            "/couples/{couple_id}/{table}",
            get(rows::list_rows).post(rows::insert_row),
        )
        .route(
            "/couples/{couple_id}/{table}/{row_id}",
            patch(rows::update_row).delete(rows::delete_row),
        )
        .layer(from_fn_with_state(state.clone(), require_session));

    let keyed_routes = couple_routes
        .merge(session_routes)
        .layer(from_fn_with_state(state.clone(), require_api_key));

    // Browsers can't put headers on a WebSocket upgrade; the feed checks the
    // session token carried in its Subscribe command instead.
    let feed_routes = Router::new().route("/realtime", get(realtime));

    Router::new()
        .route("/health", get(health))
        .merge(keyed_routes)
        .merge(feed_routes)
        .with_state(state)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

async fn health() -> &'static str {
    "ok"
}

async fn realtime(State(state): State<AppState>, ws: WebSocketUpgrade) -> impl IntoResponse {
    let feed = state.feed.clone();
    let jwt_secret = state.jwt_secret.clone();
    ws.on_upgrade(move |socket| connection::handle_connection(socket, feed, jwt_secret))
}
