//! HTTP surface for the request lifecycle.
//!
//! Handlers translate paths and bodies into service calls and map
//! [`ApplicationError`] onto status codes. Every error body carries the
//! correlation id of the call, taken from `x-correlation-id` when the client
//! sends one.

use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, FromRequestParts, Path, State},
    http::{request::Parts, StatusCode},
    response::Json,
    routing::{get, post},
    Router,
};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};
use uuid::Uuid;

use estatedesk_core::domain::advisor::AdvisorId;
use estatedesk_core::domain::customer::CustomerId;
use estatedesk_core::domain::property::PropertyId;
use estatedesk_core::domain::request::{Request, RequestDraft, RequestId, RequestTypeId};
use estatedesk_core::errors::{ApplicationError, InterfaceError};
use estatedesk_core::projection::{self, RequestDetail, RequestSummary};
use estatedesk_core::service::{ReassignmentOutcome, RequestService};
use estatedesk_core::store::RequestReadModel;

pub const CORRELATION_ID_HEADER: &str = "x-correlation-id";

#[derive(Clone)]
pub struct ApiState {
    service: Arc<RequestService>,
    read_model: Arc<dyn RequestReadModel>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CorrelationId(pub String);

impl<S> FromRequestParts<S> for CorrelationId
where
    S: Send + Sync,
{
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let supplied = parts
            .headers
            .get(CORRELATION_ID_HEADER)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty() && value.len() <= 128)
            .map(str::to_owned);
        Ok(Self(supplied.unwrap_or_else(|| Uuid::new_v4().to_string())))
    }
}

#[derive(Clone, Debug, Deserialize)]
pub struct CreateRequestBody {
    pub property_id: i64,
    pub request_type_id: i64,
}

#[derive(Clone, Debug, Deserialize)]
pub struct ReassignAdvisorBody {
    pub advisor_id: i64,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiError {
    pub error: String,
    pub message: String,
    pub correlation_id: String,
}

type ApiResult<T> = Result<T, (StatusCode, Json<ApiError>)>;

pub fn router(service: Arc<RequestService>, read_model: Arc<dyn RequestReadModel>) -> Router {
    Router::new()
        .route("/api/v1/customers/{customer_id}/requests", get(list_requests).post(create_request))
        .route("/api/v1/customers/{customer_id}/requests/{request_id}", get(request_detail))
        .route("/api/v1/customers/{customer_id}/requests/{request_id}/cancel", post(cancel_request))
        .route("/api/v1/requests/{request_id}/advisor", post(reassign_advisor))
        .with_state(ApiState { service, read_model })
}

async fn list_requests(
    State(state): State<ApiState>,
    correlation_id: CorrelationId,
    Path(customer_id): Path<i64>,
) -> ApiResult<Json<Vec<RequestSummary>>> {
    require_positive("customer_id", customer_id, &correlation_id)?;

    projection::list_requests(state.read_model.as_ref(), CustomerId(customer_id))
        .await
        .map(Json)
        .map_err(|error| reject(error, &correlation_id, "request.list"))
}

async fn request_detail(
    State(state): State<ApiState>,
    correlation_id: CorrelationId,
    Path((customer_id, request_id)): Path<(i64, i64)>,
) -> ApiResult<Json<RequestDetail>> {
    require_positive("customer_id", customer_id, &correlation_id)?;
    require_positive("request_id", request_id, &correlation_id)?;

    projection::request_detail(
        state.read_model.as_ref(),
        CustomerId(customer_id),
        RequestId(request_id),
    )
    .await
    .map(Json)
    .map_err(|error| reject(error, &correlation_id, "request.detail"))
}

async fn create_request(
    State(state): State<ApiState>,
    correlation_id: CorrelationId,
    Path(customer_id): Path<i64>,
    payload: Result<Json<CreateRequestBody>, JsonRejection>,
) -> ApiResult<(StatusCode, Json<Request>)> {
    let Json(body) = payload.map_err(|rejection| malformed_body(rejection, &correlation_id))?;
    let draft = RequestDraft {
        customer_id: CustomerId(customer_id),
        property_id: PropertyId(body.property_id),
        request_type_id: RequestTypeId(body.request_type_id),
    };

    let created = state
        .service
        .create_request(draft)
        .await
        .map_err(|error| reject(error, &correlation_id, "request.create"))?;

    info!(
        event_name = "api.request.created",
        correlation_id = %correlation_id.0,
        request_id = %created.id,
        "request created via api"
    );
    Ok((StatusCode::CREATED, Json(created)))
}

async fn cancel_request(
    State(state): State<ApiState>,
    correlation_id: CorrelationId,
    Path((customer_id, request_id)): Path<(i64, i64)>,
) -> ApiResult<Json<Request>> {
    state
        .service
        .cancel_request(CustomerId(customer_id), RequestId(request_id))
        .await
        .map(Json)
        .map_err(|error| reject(error, &correlation_id, "request.cancel"))
}

async fn reassign_advisor(
    State(state): State<ApiState>,
    correlation_id: CorrelationId,
    Path(request_id): Path<i64>,
    payload: Result<Json<ReassignAdvisorBody>, JsonRejection>,
) -> ApiResult<Json<ReassignmentOutcome>> {
    let Json(body) = payload.map_err(|rejection| malformed_body(rejection, &correlation_id))?;

    state
        .service
        .reassign_advisor(RequestId(request_id), AdvisorId(body.advisor_id))
        .await
        .map(Json)
        .map_err(|error| reject(error, &correlation_id, "request.reassign"))
}

fn require_positive(
    field: &str,
    value: i64,
    correlation_id: &CorrelationId,
) -> Result<(), (StatusCode, Json<ApiError>)> {
    if value > 0 {
        return Ok(());
    }
    Err(reject(
        ApplicationError::Validation(format!("{field} must be a positive id")),
        correlation_id,
        "request.validate",
    ))
}

fn malformed_body(
    rejection: JsonRejection,
    correlation_id: &CorrelationId,
) -> (StatusCode, Json<ApiError>) {
    reject(ApplicationError::Validation(rejection.body_text()), correlation_id, "request.decode")
}

fn reject(
    error: ApplicationError,
    correlation_id: &CorrelationId,
    operation: &'static str,
) -> (StatusCode, Json<ApiError>) {
    let detail = error.to_string();
    let interface = error.into_interface(correlation_id.0.clone());
    let status = status_for(&interface);

    if status.is_server_error() {
        error!(
            event_name = "api.request.failed",
            correlation_id = %correlation_id.0,
            operation,
            status = status.as_u16(),
            error = %detail,
            "request failed"
        );
    } else {
        warn!(
            event_name = "api.request.rejected",
            correlation_id = %correlation_id.0,
            operation,
            status = status.as_u16(),
            error = %detail,
            "request rejected"
        );
    }

    (
        status,
        Json(ApiError {
            error: interface.user_message().to_string(),
            message: interface.message().to_string(),
            correlation_id: interface.correlation_id().to_string(),
        }),
    )
}

fn status_for(error: &InterfaceError) -> StatusCode {
    match error {
        InterfaceError::NotFound { .. } => StatusCode::NOT_FOUND,
        InterfaceError::Conflict { .. } => StatusCode::CONFLICT,
        InterfaceError::BadRequest { .. } => StatusCode::BAD_REQUEST,
        InterfaceError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
    }
}
