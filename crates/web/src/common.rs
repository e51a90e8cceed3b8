use axum::{
    extract::{OriginalUri, Query, Request},
    http::{Method, StatusCode},
    response::IntoResponse,
    routing::MethodFilter,
    Json,
};
use fixture::FixtureError;
use model::ExampleData;
use schemars::{schema_for, schema_for_value, JsonSchema};
use serde::{Deserialize, Serialize};
use simulation::SimulationError;

use crate::hateoas;

pub type RouteResult<O> = Result<O, RouteErrorResponse>;
pub type HateoasResult<O> = RouteResult<Json<hateoas::Response<O>>>;

/// A `MethodFilter` that matches all http methods.
pub(crate) const METHOD_FILTER_ALL: MethodFilter = MethodFilter::GET
    .or(MethodFilter::POST)
    .or(MethodFilter::PATCH)
    .or(MethodFilter::PUT)
    .or(MethodFilter::DELETE);

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VecResponse<T> {
    pub data: Vec<T>,
}

impl<T> VecResponse<T> {
    pub fn new(data: Vec<T>) -> Self {
        Self { data }
    }
}

// - Services returning commonly used responses -

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct SchemaParams {
    #[serde(default)]
    example_data: bool,
}

pub(crate) async fn schema<T: ExampleData + JsonSchema + Serialize>(
    Query(params): Query<SchemaParams>,
) -> impl IntoResponse {
    if params.example_data {
        Json(schema_for_value!(T::example_data()))
    } else {
        Json(schema_for!(T))
    }
}

pub(crate) async fn route_not_found(
    OriginalUri(original_uri): OriginalUri,
    req: Request,
) -> impl IntoResponse {
    RouteErrorResponse::not_found(req.method(), original_uri.path())
}

// - Commonly used responses -

#[serde_with::skip_serializing_none]
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RouteErrorResponse {
    #[serde(skip)]
    pub status_code: StatusCode,
    pub http_method: Option<String>,
    pub requested_uri: Option<String>,
    pub message: Option<String>,
    pub detailed_information: Option<String>,
}

impl RouteErrorResponse {
    pub fn new(status_code: StatusCode) -> Self {
        Self {
            status_code,
            http_method: None,
            requested_uri: None,
            message: None,
            detailed_information: None,
        }
    }

    pub fn not_found(method: &Method, uri: impl Into<String>) -> Self {
        Self::new(StatusCode::NOT_FOUND)
            .with_method(method)
            .with_uri(uri)
            .with_default_message()
    }

    pub fn with_method(mut self, method: &Method) -> Self {
        self.http_method = Some(method.to_string());
        self
    }

    pub fn with_uri(mut self, uri: impl Into<String>) -> Self {
        self.requested_uri = Some(uri.into());
        self
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_default_message(self) -> Self {
        let message = self
            .status_code
            .canonical_reason()
            .unwrap_or("unknown error");
        self.with_message(message)
    }

    pub fn with_detailed_information(mut self, message: impl Into<String>) -> Self {
        self.detailed_information = Some(message.into());
        self
    }
}

impl From<SimulationError> for RouteErrorResponse {
    fn from(value: SimulationError) -> Self {
        match value {
            SimulationError::InvalidRequest(_)
            | SimulationError::DuplicateActiveId(_)
            | SimulationError::IdAlreadyAssigned(_) => {
                Self::new(StatusCode::BAD_REQUEST).with_message(value.to_string())
            }
            SimulationError::MailboxClosed | SimulationError::ResponseError(_) => {
                Self::new(StatusCode::SERVICE_UNAVAILABLE)
                    .with_message("The simulation registry is not available.")
                    .with_detailed_information(value.to_string())
            }
            _ => Self::new(StatusCode::INTERNAL_SERVER_ERROR)
                .with_default_message()
                .with_detailed_information(value.to_string()),
        }
    }
}

impl From<FixtureError> for RouteErrorResponse {
    fn from(value: FixtureError) -> Self {
        match value {
            FixtureError::Io { .. } => Self::new(StatusCode::INTERNAL_SERVER_ERROR)
                .with_message("The fixture could not be read.")
                .with_detailed_information(value.to_string()),
            FixtureError::Parse(_) | FixtureError::InvalidRoute { .. } => {
                Self::new(StatusCode::UNPROCESSABLE_ENTITY)
                    .with_message("The fixture is malformed.")
                    .with_detailed_information(value.to_string())
            }
        }
    }
}

impl IntoResponse for RouteErrorResponse {
    fn into_response(self) -> axum::response::Response {
        (self.status_code, Json(self)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use model::{pace::PaceError, simulator::SimulatorId};
    use simulation::InvalidRequest;

    use super::*;

    #[test]
    fn rejected_requests_are_bad_requests() {
        let response: RouteErrorResponse =
            SimulationError::DuplicateActiveId(SimulatorId::new(3)).into();
        assert_eq!(response.status_code, StatusCode::BAD_REQUEST);

        let response: RouteErrorResponse = SimulationError::InvalidRequest(
            InvalidRequest::Pace(PaceError::ZeroSegmentDuration),
        )
        .into();
        assert_eq!(response.status_code, StatusCode::BAD_REQUEST);
    }

    #[test]
    fn closed_mailbox_is_unavailable() {
        let response: RouteErrorResponse = SimulationError::MailboxClosed.into();
        assert_eq!(response.status_code, StatusCode::SERVICE_UNAVAILABLE);
        assert!(response.detailed_information.is_some());
    }

    #[test]
    fn error_body_omits_missing_fields() {
        let response = RouteErrorResponse::not_found(&Method::GET, "/api/nope");
        let body = serde_json::to_value(&response).unwrap();
        assert_eq!(
            body,
            serde_json::json!({
                "httpMethod": "GET",
                "requestedUri": "/api/nope",
                "message": "Not Found",
            })
        );
    }
}
