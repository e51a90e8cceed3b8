use axum::{
    routing::{get, on},
    Json, Router,
};
use serde_json::{json, Value};

use crate::{
    common::{route_not_found, METHOD_FILTER_ALL},
    WebState,
};

pub(crate) mod realtime;
pub(crate) mod simulators;

macro_rules! resource {
    ($($arg:tt)*) => {
        crate::api::resource!("/v1{}", format_args!($($arg)*))
    };
}
pub(crate) use resource;

pub(crate) fn routes(state: WebState) -> Router {
    Router::new()
        .route("/", get(index))
        .nest_service("/simulators", simulators::routes(state.clone()))
        .nest_service("/realtime", realtime::routes(state))
        .fallback_service(on(METHOD_FILTER_ALL, route_not_found))
}

async fn index() -> Json<Value> {
    Json(json!({
        "simulators": simulators::resource!(""),
        "realtime": realtime::resource!("/simulators"),
    }))
}
