use axum::{
	Json, Router,
	body::Bytes,
	extract::State,
	http::StatusCode,
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Serialize, de::DeserializeOwned};

use crate::state::AppState;
use courier_service::{
	BulkFeedbackRequest, BulkFeedbackResponse, Error, FilterPreviewRequest, FilterPreviewResponse,
	SearchRequest, SearchResponse,
};

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/search", post(search))
		.route("/v1/feedback/bulk", post(bulk_feedback))
		.route("/v1/filters/preview", post(filter_preview))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn search(
	State(state): State<AppState>,
	body: Bytes,
) -> Result<Json<SearchResponse>, ApiError> {
	let request: SearchRequest = decode(&body)?;
	let response = state.service.search(request).await?;

	Ok(Json(response))
}

async fn bulk_feedback(
	State(state): State<AppState>,
	body: Bytes,
) -> Result<Json<BulkFeedbackResponse>, ApiError> {
	let request: BulkFeedbackRequest = decode(&body)?;
	let response = state.service.submit_bulk_feedback(request).await?;

	Ok(Json(response))
}

async fn filter_preview(
	State(state): State<AppState>,
	body: Bytes,
) -> Result<Json<FilterPreviewResponse>, ApiError> {
	let request: FilterPreviewRequest = decode(&body)?;
	let response = state.service.get_filter_preview(request).await?;

	Ok(Json(response))
}

/// Shape errors, unknown filter actions included, are validation failures.
fn decode<T>(body: &[u8]) -> Result<T, ApiError>
where
	T: DeserializeOwned,
{
	serde_json::from_slice(body).map_err(|err| {
		ApiError::new(StatusCode::BAD_REQUEST, "invalid_request", format!("Invalid body: {err}."))
	})
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into() }
	}
}
impl From<Error> for ApiError {
	fn from(err: Error) -> Self {
		match err {
			Error::InvalidRequest { message } =>
				Self::new(StatusCode::BAD_REQUEST, "invalid_request", message),
			other => {
				tracing::error!(error = %other, "Request failed.");

				Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal_error", other.to_string())
			},
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body = ErrorBody { error_code: self.error_code, message: self.message };

		(self.status, Json(body)).into_response()
	}
}
