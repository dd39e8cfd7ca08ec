pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Service failures. Cloneable so one coalesced failure reaches every waiter unchanged.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	#[error("Provider error: {message}")]
	Provider { message: String },
	#[error("Storage error: {message}")]
	Storage { message: String },
	#[error("Embedding dimension mismatch: expected {expected}, got {actual}.")]
	DimensionMismatch { expected: usize, actual: usize },
	#[error("Coalesced request failed: {message}")]
	Coalesce { message: String },
	#[error("Internal error: {message}")]
	Internal { message: String },
}
impl From<kindred_providers::Error> for Error {
	fn from(err: kindred_providers::Error) -> Self {
		Self::Provider { message: err.to_string() }
	}
}
impl From<kindred_storage::Error> for Error {
	fn from(err: kindred_storage::Error) -> Self {
		match err {
			kindred_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			err => Self::Storage { message: err.to_string() },
		}
	}
}
