pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failure classes of the engine. Only `InvalidRequest` reaches callers of the public operations;
/// the rest are handled inside the pipeline and degrade to fewer results.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Backend unavailable: {message}")]
	BackendUnavailable { message: String },
	#[error("Embedding decode failed: {message}")]
	EmbeddingDecode { message: String },
	#[error("Explanation parse failed: {message}")]
	ExplainParse { message: String },
	#[error("Feedback write failed: {message}")]
	FeedbackWrite { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
}
impl From<courier_storage::Error> for Error {
	fn from(err: courier_storage::Error) -> Self {
		match err {
			courier_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			other => Self::Storage { message: other.to_string() },
		}
	}
}
