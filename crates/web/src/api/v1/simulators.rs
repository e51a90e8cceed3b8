use std::sync::Arc;

use axum::{
    extract::{OriginalUri, State},
    http::Method,
    routing::{get, on},
    Extension, Json, Router,
};
use itertools::Itertools;
use model::{simulator::SimulatorState, WithId};
use schemars::JsonSchema;
use serde::Serialize;
use simulation::registry::{Rejection, StartReport};
use utility::let_also::LetAlso;

use crate::{
    common::{
        route_not_found, schema, HateoasResult, RouteErrorResponse, VecResponse,
        METHOD_FILTER_ALL,
    },
    hateoas,
    middleware::base_url::BaseUrl,
    WebState,
};

macro_rules! resource {
    ($($arg:tt)*) => {
        crate::api::v1::resource!("/simulators{}", format_args!($($arg)*))
    };
}
pub(crate) use resource;

pub(crate) fn routes(state: WebState) -> Router {
    Router::new()
        .route("/schema", get(schema::<SimulatorState>))
        .route("/start", get(start_simulators).post(start_simulators))
        .route("/status", get(simulator_status))
        .route("/cancel", get(cancel_simulators).post(cancel_simulators))
        .with_state(state)
        .fallback_service(on(METHOD_FILTER_ALL, route_not_found))
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct RejectionDto {
    index: usize,
    name: Option<String>,
    reason: String,
}

impl From<Rejection> for RejectionDto {
    fn from(value: Rejection) -> Self {
        Self {
            index: value.index,
            name: value.name,
            reason: value.error.to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct StartDto {
    started: Vec<WithId<SimulatorState>>,
    rejected: Vec<RejectionDto>,
}

impl From<StartReport> for StartDto {
    fn from(value: StartReport) -> Self {
        Self {
            started: value.started,
            rejected: value.rejected.into_iter().map_into().collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub(crate) struct CancelDto {
    cancelled: usize,
}

/// Loads the fixture and starts a simulator for each of its requests.
pub(crate) async fn start_simulators(
    method: Method,
    OriginalUri(original_uri): OriginalUri,
    State(WebState {
        registry, fixtures, ..
    }): State<WebState>,
    Extension(base_url): Extension<Arc<BaseUrl>>,
) -> HateoasResult<StartDto> {
    let error_context = |why: RouteErrorResponse| {
        why.with_method(&method).with_uri(original_uri.path())
    };

    let fixture = fixtures
        .load()
        .await
        .map_err(|why| error_context(why.into()))?;
    let requested = fixture.len();
    let report = registry
        .start_all(fixture)
        .await
        .map_err(|why| error_context(why.into()))?;

    hateoas::Response::builder(StartDto::from(report), base_url)
        .debug_info("requested", requested)
        .link("status", resource!("/status"))
        .link("cancel", resource!("/cancel"))
        .link("realtime", super::realtime::resource!("/simulators"))
        .build()
        .let_owned(|response| Ok(response.json()))
}

/// Every tracked simulator, finished ones included.
pub(crate) async fn simulator_status(
    method: Method,
    OriginalUri(original_uri): OriginalUri,
    State(WebState { registry, .. }): State<WebState>,
    Extension(base_url): Extension<Arc<BaseUrl>>,
) -> HateoasResult<VecResponse<WithId<SimulatorState>>> {
    let snapshots = registry.status_all().await.map_err(|why| {
        RouteErrorResponse::from(why)
            .with_method(&method)
            .with_uri(original_uri.path())
    })?;
    let counts = snapshots
        .iter()
        .counts_by(|snapshot| snapshot.content.status);

    Ok(hateoas::Response::builder(VecResponse::new(snapshots), base_url)
        .debug_info("statusCounts", counts)
        .link("self", resource!("/status"))
        .link("cancel", resource!("/cancel"))
        .link("schema", resource!("/schema"))
        .build()
        .json())
}

/// Cancels and forgets every tracked simulator.
pub(crate) async fn cancel_simulators(
    method: Method,
    OriginalUri(original_uri): OriginalUri,
    State(WebState { registry, .. }): State<WebState>,
    Extension(base_url): Extension<Arc<BaseUrl>>,
) -> HateoasResult<CancelDto> {
    let cancelled = registry.cancel_all().await.map_err(|why| {
        RouteErrorResponse::from(why)
            .with_method(&method)
            .with_uri(original_uri.path())
    })?;

    Ok(
        hateoas::Response::builder(CancelDto { cancelled }, base_url)
            .link("start", resource!("/start"))
            .build()
            .json(),
    )
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::http::{HeaderMap, StatusCode, Uri};
    use fixture::{FixtureLoader, FixtureResult};
    use model::{
        pace::Pace,
        point::{GeographicPath, Point},
        request::{Fixture, SimulationRequest},
        simulator::SimulatorStatus,
    };
    use simulation::{
        factory::SimulatorFactory,
        pool::WorkerPool,
        registry::{self, Registry, DEFAULT_MAILBOX_CAPACITY},
    };

    use super::*;

    struct StaticFixture(Fixture);

    #[async_trait]
    impl FixtureLoader for StaticFixture {
        async fn load(&self) -> FixtureResult<Fixture> {
            Ok(self.0.clone())
        }
    }

    fn state(fixture: Fixture) -> WebState {
        WebState {
            registry: registry::run(
                Registry::new(SimulatorFactory::new(), WorkerPool::unbounded()),
                DEFAULT_MAILBOX_CAPACITY,
            ),
            fixtures: Arc::new(StaticFixture(fixture)),
            stream_interval: Duration::from_millis(100),
        }
    }

    fn base_url() -> Extension<Arc<BaseUrl>> {
        Extension(Arc::new(BaseUrl::from_headers(&HeaderMap::new())))
    }

    fn uri(path: &'static str) -> OriginalUri {
        OriginalUri(Uri::from_static(path))
    }

    fn sample_fixture() -> Fixture {
        let moving: GeographicPath = vec![Point::new(0.0, 0.0), Point::new(0.0, 1.0)].into();
        let parked: GeographicPath = vec![Point::new(1.0, 1.0)].into();
        [
            SimulationRequest::new(moving, Pace::SegmentDuration(Duration::from_millis(100)))
                .with_name("moving"),
            SimulationRequest::new(parked.clone(), Pace::SpeedKph(0.0)).with_name("broken"),
            SimulationRequest::new(parked, Pace::SpeedKph(5.0)).with_name("parked"),
        ]
        .into_iter()
        .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn start_status_and_cancel() {
        let state = state(sample_fixture());

        let Json(started) = start_simulators(
            Method::POST,
            uri("/api/v1/simulators/start"),
            State(state.clone()),
            base_url(),
        )
        .await
        .unwrap();
        assert_eq!(started.content.started.len(), 2);
        assert_eq!(started.content.rejected.len(), 1);
        assert_eq!(started.content.rejected[0].index, 1);
        assert_eq!(started.content.rejected[0].name.as_deref(), Some("broken"));
        assert!(started
            .links
            .iter()
            .any(|link| link.hypertext_reference
                == "http://localhost/api/v1/simulators/status"));

        let Json(status) = simulator_status(
            Method::GET,
            uri("/api/v1/simulators/status"),
            State(state.clone()),
            base_url(),
        )
        .await
        .unwrap();
        assert_eq!(status.content.data.len(), 2);
        assert_eq!(
            status.debug_info["statusCounts"],
            serde_json::json!({ "RUNNING": 1, "COMPLETED": 1 })
        );

        let Json(cancelled) = cancel_simulators(
            Method::GET,
            uri("/api/v1/simulators/cancel"),
            State(state.clone()),
            base_url(),
        )
        .await
        .unwrap();
        assert_eq!(cancelled.content.cancelled, 1);

        let Json(status) = simulator_status(
            Method::GET,
            uri("/api/status"),
            State(state),
            base_url(),
        )
        .await
        .unwrap();
        assert!(status.content.data.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn status_lists_finished_simulators_until_cancelled() {
        let state = state(sample_fixture());
        let _ = start_simulators(
            Method::GET,
            uri("/api/dc"),
            State(state.clone()),
            base_url(),
        )
        .await
        .unwrap();

        tokio::time::sleep(Duration::from_millis(150)).await;

        let Json(status) = simulator_status(
            Method::GET,
            uri("/api/status"),
            State(state.clone()),
            base_url(),
        )
        .await
        .unwrap();
        assert!(status
            .content
            .data
            .iter()
            .all(|snapshot| snapshot.content.status == SimulatorStatus::Completed));

        let Json(cancelled) = cancel_simulators(
            Method::GET,
            uri("/api/cancel"),
            State(state),
            base_url(),
        )
        .await
        .unwrap();
        assert_eq!(cancelled.content.cancelled, 0);
    }

    #[tokio::test]
    async fn fixture_errors_become_error_responses() {
        struct BrokenFixture;

        #[async_trait]
        impl FixtureLoader for BrokenFixture {
            async fn load(&self) -> FixtureResult<Fixture> {
                fixture::parse_fixture("{ \"simulations\": 3 }")
            }
        }

        let mut state = state(Fixture::default());
        state.fixtures = Arc::new(BrokenFixture);

        let why = start_simulators(
            Method::POST,
            uri("/api/dc"),
            State(state),
            base_url(),
        )
        .await
        .unwrap_err();
        assert_eq!(why.status_code, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(why.requested_uri.as_deref(), Some("/api/dc"));
        assert_eq!(why.http_method.as_deref(), Some("POST"));
    }
}
