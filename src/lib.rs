//! HTTP relay between point coordinates and the Earth Engine REST API.
//! Each request is handled independently: credentials are re-extracted, a
//! fresh bearer token is minted, and every registry dataset is queried in
//! sequence before the combined response goes out.

use std::sync::Arc;

use axum::{routing::post, Extension, Router};
use tower_http::cors::{Any, CorsLayer};

pub mod auth;
pub mod config;
pub mod credentials;
pub mod datasets;
pub mod error;
pub mod handlers;
pub mod query;
pub mod scene;

pub use config::Config;
pub use error::RelayError;

use handlers::AppState;

pub fn build_router(config: Config) -> Router {
    let state = AppState {
        http: reqwest::Client::new(),
        config: Arc::new(config),
    };

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/", post(handlers::sensor))
        .route("/sensor", post(handlers::sensor))
        .route("/sensor-data", post(handlers::sensor))
        .route("/image", post(handlers::image))
        .fallback(handlers::fallback)
        .layer(cors)
        .layer(Extension(state))
}
