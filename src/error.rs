//! Client-level error types shared across the authority, streams, and batches.

// self
use crate::_prelude::*;

/// Crate-wide result type alias returning [`Error`] by default.
pub type Result<T, E = Error> = std::result::Result<T, E>;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Canonical error exposed by public APIs.
#[derive(Debug, ThisError)]
pub enum Error {
	/// Local configuration problem, raised before any network call.
	#[error(transparent)]
	Config(#[from] ConfigError),
	/// Transport failure (DNS, TCP, TLS, timeouts).
	#[error(transparent)]
	Transport(#[from] TransportError),

	/// Remote endpoint answered with a non-success status.
	#[error("Remote endpoint responded with status {status}.")]
	Remote {
		/// HTTP status code.
		status: u16,
		/// Response body, decoded as JSON when possible.
		body: Value,
	},
	/// Request was still rejected as unauthorized after a token refresh.
	#[error("Request is unauthorized: {reason}.")]
	Auth {
		/// Human-readable reason.
		reason: String,
	},
	/// Batch endpoint answered with a status other than 200.
	#[error("Batch endpoint responded with status {status}.")]
	Batch {
		/// HTTP status code of the outer batch response.
		status: u16,
	},
	/// Outer batch response could not be demultiplexed.
	#[error("Batch response is malformed: {reason}.")]
	BatchFormat {
		/// Human-readable reason.
		reason: String,
	},
	/// One batch part was missing or undecodable.
	#[error("Batch part {index} is unusable: {reason}.")]
	BatchPart {
		/// Zero-based index of the query the part belongs to.
		index: usize,
		/// Human-readable reason.
		reason: String,
	},
	/// Typed payload did not match the expected schema.
	#[error("Response payload could not be decoded.")]
	Decode(#[from] serde_path_to_error::Error<serde_json::Error>),
	/// Response shape carries no items to stream.
	#[error("Response of kind `{kind}` cannot be streamed.")]
	Unstreamable {
		/// Resource kind, or a label describing the shape.
		kind: String,
	},
	/// Operation was cancelled through the authority's cancellation token.
	#[error("Operation was cancelled.")]
	Cancelled,
	/// Failure of a coalesced operation observed by one of its waiters.
	#[error(transparent)]
	Shared(Arc<Error>),
}
impl Error {
	/// Returns the HTTP status attached to the error, if any.
	pub fn status(&self) -> Option<u16> {
		match self {
			Self::Remote { status, .. } | Self::Batch { status } => Some(*status),
			Self::Shared(inner) => inner.status(),
			_ => None,
		}
	}

	/// Returns `true` when the error is a remote `404`.
	pub fn is_not_found(&self) -> bool {
		self.status() == Some(404)
	}
}
impl From<crate::auth::CredentialsError> for Error {
	fn from(e: crate::auth::CredentialsError) -> Self {
		Self::Config(e.into())
	}
}

/// Configuration and validation failures.
#[derive(Debug, ThisError)]
pub enum ConfigError {
	/// HTTP client could not be constructed.
	#[error("HTTP client could not be constructed.")]
	HttpClientBuild {
		/// Underlying transport builder failure.
		#[source]
		source: BoxError,
	},
	/// HTTP request construction failed.
	#[error(transparent)]
	HttpRequest(#[from] oauth2::http::Error),
	/// Provider descriptor contains an invalid URL.
	#[error("Descriptor contains an invalid URL.")]
	InvalidDescriptor {
		/// Underlying parsing failure.
		#[source]
		source: url::ParseError,
	},
	/// Provider descriptor failed validation.
	#[error(transparent)]
	Descriptor(#[from] crate::provider::ProviderDescriptorError),
	/// Credentials failed validation.
	#[error(transparent)]
	Credentials(#[from] crate::auth::CredentialsError),

	/// Required parameter is absent or empty.
	#[error("Missing required parameter `{name}`.")]
	MissingParameter {
		/// Parameter name, dotted for nested fields.
		name: &'static str,
	},
	/// Parameter is present but unusable.
	#[error("Parameter `{name}` is invalid: {reason}.")]
	InvalidParameter {
		/// Parameter name, dotted for nested fields.
		name: &'static str,
		/// Human-readable reason.
		reason: String,
	},
	/// Credentials hold no refresh token, so no new access token can be minted.
	#[error("Credentials are missing a refresh token.")]
	MissingRefreshToken,
	/// Credentials hold no client id and secret for the token endpoint.
	#[error("Credentials are missing client credentials.")]
	MissingClientCredentials,
	/// Request body could not be serialized.
	#[error("Request body could not be serialized.")]
	Serialize(#[from] serde_json::Error),
}
impl ConfigError {
	/// Wraps a transport's builder failure inside [`ConfigError`].
	pub fn http_client_build(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::HttpClientBuild { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for ConfigError {
	fn from(e: ReqwestError) -> Self {
		Self::http_client_build(e)
	}
}

/// Transport-level failures (network, IO).
#[derive(Debug, ThisError)]
pub enum TransportError {
	/// Underlying HTTP client reported a network failure.
	#[error("Network error occurred while calling the directory API.")]
	Network {
		/// Transport-specific network error.
		#[source]
		source: BoxError,
	},
	/// Underlying IO failure surfaced during transport.
	#[error("I/O error occurred while calling the directory API.")]
	Io(#[from] std::io::Error),
	/// Transport failed without a structured source.
	#[error("Transport failed: {message}.")]
	Other {
		/// Transport-supplied message.
		message: String,
	},
}
impl TransportError {
	/// Wraps a transport-specific network error.
	pub fn network(src: impl 'static + Send + Sync + std::error::Error) -> Self {
		Self::Network { source: Box::new(src) }
	}
}
#[cfg(feature = "reqwest")]
impl From<ReqwestError> for TransportError {
	fn from(e: ReqwestError) -> Self {
		Self::network(e)
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn status_is_visible_through_shared_errors() {
		let remote = Error::Remote { status: 404, body: Value::Null };
		let shared = Error::Shared(Arc::new(remote));

		assert_eq!(shared.status(), Some(404));
		assert!(shared.is_not_found());
		assert!(!Error::Cancelled.is_not_found());
		assert_eq!(Error::Batch { status: 500 }.status(), Some(500));
	}

	#[test]
	fn messages_end_with_periods() {
		let err = ConfigError::MissingParameter { name: "client.id" };

		assert_eq!(err.to_string(), "Missing required parameter `client.id`.");
		assert_eq!(
			Error::BatchPart { index: 2, reason: "missing from response".into() }.to_string(),
			"Batch part 2 is unusable: missing from response."
		);
	}
}
