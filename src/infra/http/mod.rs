//! HTTP surface: the public site and the authenticated admin API.

mod api;
mod middleware;
mod public;
mod state;

pub use middleware::client_ip;
pub use state::AppState;

use axum::Router;

/// Compose the full application router.
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(public::public_router())
        .merge(api::api_router(state.clone()))
        .with_state(state)
}
