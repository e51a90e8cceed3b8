use axum::{
    response::IntoResponse,
    routing::{get, on},
    Json, Router,
};
use serde_json::json;

pub mod v1;

use crate::{
    common::{route_not_found, METHOD_FILTER_ALL},
    middleware::base_url::base_url_middleware,
    WebState,
};

macro_rules! resource {
    ($($arg:tt)*) => {
        format!("/api{}", format_args!($($arg)*))
    };
}
pub(crate) use resource;

pub fn routes(state: WebState) -> Router {
    Router::new()
        .route("/ping", get(ping))
        // paths of the first controller, kept for existing clients
        .route(
            "/dc",
            get(v1::simulators::start_simulators).post(v1::simulators::start_simulators),
        )
        .route("/status", get(v1::simulators::simulator_status))
        .route("/cancel", get(v1::simulators::cancel_simulators))
        .with_state(state.clone())
        .nest_service("/v1", v1::routes(state))
        .layer(axum::middleware::from_fn(base_url_middleware))
        .fallback_service(on(METHOD_FILTER_ALL, route_not_found))
}

async fn ping() -> impl IntoResponse {
    Json(json!({
        "message": "pong!"
    }))
}
