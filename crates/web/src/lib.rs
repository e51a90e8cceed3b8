pub use crate::common::RouteResult;

use std::{sync::Arc, time::Duration};

use axum::Router;
use fixture::FixtureLoader;
use simulation::registry::RegistryRef;
use tokio::net::TcpListener;

pub mod api;
pub mod common;
pub mod config;
pub mod hateoas;
pub mod middleware;

#[derive(Clone)]
pub struct WebState {
    pub registry: RegistryRef,
    pub fixtures: Arc<dyn FixtureLoader>,
    /// Time between two status events of the realtime stream.
    pub stream_interval: Duration,
}

pub fn router(state: WebState) -> Router {
    Router::new().nest_service("/api", api::routes(state))
}

pub async fn start_web_server(bind_address: &str, state: WebState) -> std::io::Result<()> {
    let listener = TcpListener::bind(bind_address).await?;
    log::info!("listening on {}", listener.local_addr()?);
    axum::serve(listener, router(state).into_make_service()).await?;

    Ok(())
}
