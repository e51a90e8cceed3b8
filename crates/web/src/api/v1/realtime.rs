use std::{convert::Infallible, time::Duration};

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    routing::{get, on},
    Router,
};
use axum_extra::TypedHeader;
use chrono::{DateTime, Local};
use futures::stream::{self, Stream};
use model::{simulator::SimulatorState, WithId};
use serde::Serialize;
use simulation::registry::RegistryRef;
use tokio_stream::StreamExt as _;
use tower_http::trace::TraceLayer;

use crate::{
    common::{route_not_found, METHOD_FILTER_ALL},
    WebState,
};

macro_rules! resource {
    ($($arg:tt)*) => {
        crate::api::v1::resource!("/realtime{}", format_args!($($arg)*))
    };
}
pub(crate) use resource;

pub(crate) fn routes(state: WebState) -> Router {
    Router::new()
        .route("/simulators", get(sse_handler))
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .fallback_service(on(METHOD_FILTER_ALL, route_not_found))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusEvent {
    sent_at: DateTime<Local>,
    simulators: Vec<WithId<SimulatorState>>,
}

async fn sse_handler(
    user_agent: Option<TypedHeader<headers::UserAgent>>,
    State(WebState {
        registry,
        stream_interval,
        ..
    }): State<WebState>,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    match user_agent {
        Some(TypedHeader(user_agent)) => {
            log::info!("`{}` subscribed to simulator status", user_agent.as_str())
        }
        None => log::info!("anonymous client subscribed to simulator status"),
    }

    Sse::new(status_events(registry, stream_interval)).keep_alive(KeepAlive::default())
}

/// Publishes the status of every tracked simulator once per `interval`, the
/// first right away. Ends once the registry is gone.
fn status_events(
    registry: RegistryRef,
    interval: Duration,
) -> impl Stream<Item = Result<Event, Infallible>> {
    stream::unfold(Some(registry), |registry| async move {
        let Some(registry) = registry else {
            return None;
        };
        let event = match registry.status_all().await {
            Ok(simulators) => Event::default().event("status").json_data(StatusEvent {
                sent_at: Local::now(),
                simulators,
            }),
            Err(why) => {
                log::warn!("closing simulator status stream: {}", why);
                return Some((Event::default().event("error").data(why.to_string()), None));
            }
        };
        match event {
            Ok(event) => Some((event, Some(registry))),
            Err(why) => {
                log::error!("can not encode simulator status: {}", why);
                None
            }
        }
    })
    .map(Ok)
    .throttle(interval)
}

#[cfg(test)]
mod tests {
    use model::{
        pace::Pace,
        point::Point,
        request::{Fixture, SimulationRequest},
    };
    use simulation::{
        factory::SimulatorFactory,
        pool::WorkerPool,
        registry::{self, Registry, DEFAULT_MAILBOX_CAPACITY},
    };
    use tokio::time::Instant;
    use tokio_stream::StreamExt;

    use super::*;

    #[tokio::test(start_paused = true)]
    async fn emits_status_once_per_interval() {
        let registry = registry::run(
            Registry::new(SimulatorFactory::new(), WorkerPool::unbounded()),
            DEFAULT_MAILBOX_CAPACITY,
        );
        let fixture: Fixture = [SimulationRequest::new(
            vec![Point::new(0.0, 0.0)].into(),
            Pace::SpeedKph(5.0),
        )]
        .into_iter()
        .collect();
        registry.start_all(fixture).await.unwrap();

        let begin = Instant::now();
        let events = status_events(registry, Duration::from_millis(500));
        tokio::pin!(events);

        assert!(events.next().await.is_some());
        assert!(events.next().await.is_some());
        assert!(events.next().await.is_some());
        assert!(begin.elapsed() >= Duration::from_millis(1000));
    }
}
