//! The axum HTTP surface (§6.1): a thin routing layer over [`Engine`]. No
//! business logic lives here beyond query/path parsing and status-code
//! mapping — everything else is the Engine's job.

mod dto;
mod handlers;

use axum::routing::{get, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::engine::Engine;
use crate::store::Store;

/// Shared state handed to every handler: the engine plus the few
/// configuration values a handler needs to fill in query-param defaults.
pub struct AppState<S: Store> {
    pub engine: Engine<S>,
    pub default_ttl_s: u32,
    pub default_tries: u16,
    pub max_body_bytes: u32,
}

impl<S: Store> Clone for AppState<S> {
    fn clone(&self) -> Self {
        AppState {
            engine: self.engine.clone(),
            default_ttl_s: self.default_ttl_s,
            default_tries: self.default_tries,
            max_body_bytes: self.max_body_bytes,
        }
    }
}

/// Builds the full router for a given [`Store`] backend.
pub fn router<S: Store>(
    engine: Engine<S>,
    default_ttl_s: u32,
    default_tries: u16,
    max_body_bytes: u32,
) -> Router {
    let state = AppState {
        engine,
        default_ttl_s,
        default_tries,
        max_body_bytes,
    };

    Router::new()
        .route(
            "/{ns}/{queue}",
            put(handlers::publish::<S>)
                .get(handlers::consume::<S>)
                .delete(handlers::destroy::<S>),
        )
        .route("/{ns}/{queue}/peek", get(handlers::peek_queue::<S>))
        .route("/{ns}/{queue}/size", get(handlers::size::<S>))
        .route(
            "/{ns}/{queue}/job/{id}",
            get(handlers::peek_job::<S>).delete(handlers::delete_job::<S>),
        )
        .route(
            "/{ns}/{queue}/deadletter",
            get(handlers::peek_dead_letter::<S>)
                .put(handlers::respawn_dead_letter::<S>)
                .delete(handlers::delete_dead_letter::<S>),
        )
        .route("/healthz", get(handlers::healthz))
        .route("/metrics", get(handlers::metrics))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
