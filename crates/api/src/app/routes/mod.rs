use axum::{Router, routing::get};

pub mod batches;
pub mod imports;
pub mod providers;
pub mod system;

pub fn router() -> Router {
    Router::new()
        .route("/health", get(system::health))
        .route("/notifications", get(system::notifications))
        .route("/notifications/stream", get(system::stream))
        .nest("/imports", imports::router())
        .nest("/providers", providers::router())
        .nest("/batches", batches::router())
}
