//! Optional observability helpers for directory calls.
//!
//! # Feature Flags
//!
//! - Enable `tracing` to emit structured spans named `admin_directory.call` with the `call`
//!   (operation) and `stage` (call site) fields, plus `warn` events for recoverable anomalies.
//! - Enable `metrics` to increment the `admin_directory_call_total` counter for every
//!   attempt/retry/success/failure, labeled by `call` + `outcome`.

mod metrics;
mod tracing;

pub use metrics::*;
pub use tracing::*;

// self
use crate::_prelude::*;

/// Operations observed by the client.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallKind {
	/// Authorization code exchange.
	AuthorizationCode,
	/// Refresh token exchange.
	Refresh,
	/// Access token introspection.
	TokenInfo,
	/// Authorized resource request.
	Request,
	/// Multipart batch request.
	Batch,
}
impl CallKind {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallKind::AuthorizationCode => "authorization_code",
			CallKind::Refresh => "refresh",
			CallKind::TokenInfo => "token_info",
			CallKind::Request => "request",
			CallKind::Batch => "batch",
		}
	}
}
impl Display for CallKind {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}

/// Outcome labels recorded for each call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CallOutcome {
	/// Entry to a public operation.
	Attempt,
	/// Transient failure followed by another attempt.
	Retry,
	/// Successful completion.
	Success,
	/// Failure propagated back to the caller.
	Failure,
}
impl CallOutcome {
	/// Returns a stable label suitable for span or metric fields.
	pub const fn as_str(self) -> &'static str {
		match self {
			CallOutcome::Attempt => "attempt",
			CallOutcome::Retry => "retry",
			CallOutcome::Success => "success",
			CallOutcome::Failure => "failure",
		}
	}
}
impl Display for CallOutcome {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.write_str(self.as_str())
	}
}
