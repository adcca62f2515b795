//! Multipart batch execution: N independent queries in one HTTP exchange.

mod codec;

// crates.io
use oauth2::http::Method;
// self
use crate::{
	_prelude::*,
	authority::TokenAuthority,
	http::{DirectoryHttpClient, OutboundRequest},
	obs::{self, CallKind, CallOutcome, CallSpan},
	query::Query,
	retry::RetryPolicy,
};

/// One embedded response from a batched reply.
#[derive(Clone, Debug, PartialEq)]
pub struct BatchResponse {
	/// Embedded HTTP status.
	pub status: u16,
	/// Embedded headers, names lowercased.
	pub headers: BTreeMap<String, String>,
	/// Embedded JSON body; [`Value::Null`] when empty.
	pub body: Value,
}

/// Packs queries into one `multipart/mixed` request and splits the reply back into
/// per-query results.
pub struct BatchExecutor<C>
where
	C: DirectoryHttpClient,
{
	authority: TokenAuthority<C>,
	retry_policy: RetryPolicy,
}
impl<C> BatchExecutor<C>
where
	C: DirectoryHttpClient,
{
	/// Creates an executor using [`RetryPolicy::batch`].
	pub fn new(authority: TokenAuthority<C>) -> Self {
		Self { authority, retry_policy: RetryPolicy::batch() }
	}

	/// Replaces the policy applied to the outer batch request.
	pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
		self.retry_policy = policy;

		self
	}

	/// Policy applied to the outer batch request.
	pub fn retry_policy(&self) -> &RetryPolicy {
		&self.retry_policy
	}

	/// Executes `queries` as one batch.
	///
	/// The result has the same length and order as `queries`; per-item failures stay inside
	/// their slot. Outer failures (HTTP status, missing boundary) fail the whole call. An empty
	/// input returns an empty result without touching the network.
	pub async fn execute(&self, queries: &[Query]) -> Result<Vec<Result<BatchResponse>>> {
		const KIND: CallKind = CallKind::Batch;

		if queries.is_empty() {
			return Ok(Vec::new());
		}

		let span = CallSpan::new(KIND, "execute_batch");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span
			.instrument(async {
				self.ensure_access_token().await?;

				let descriptor = &self.authority.descriptor;
				let boundary = &descriptor.quirks.batch_boundary;
				let request = OutboundRequest::new(Method::POST, descriptor.endpoints.batch.clone())
					.with_body(
						format!("multipart/mixed; boundary=\"{boundary}\""),
						codec::encode(queries, boundary)?,
					);
				let response =
					match self.authority.send_authorized(&request, &self.retry_policy, KIND).await {
						Ok(response) => response,
						Err(Error::Remote { status, .. }) => return Err(Error::Batch { status }),
						Err(err) => return Err(err),
					};

				if response.status != 200 {
					return Err(Error::Batch { status: response.status });
				}

				codec::decode(response.content_type.as_deref(), &response.body, queries.len())
			})
			.await;

		match &result {
			Ok(_) => obs::record_call_outcome(KIND, CallOutcome::Success),
			Err(_) => obs::record_call_outcome(KIND, CallOutcome::Failure),
		}

		result
	}

	/// Validates the held token; any failure other than cancellation triggers a refresh.
	async fn ensure_access_token(&self) -> Result<()> {
		match self.authority.token_info().await {
			Ok(_) => Ok(()),
			Err(Error::Cancelled) => Err(Error::Cancelled),
			Err(_) => self.authority.renew(self.authority.access_token()).await.map(drop),
		}
	}
}
impl<C> Clone for BatchExecutor<C>
where
	C: DirectoryHttpClient,
{
	fn clone(&self) -> Self {
		Self { authority: self.authority.clone(), retry_policy: self.retry_policy.clone() }
	}
}
impl<C> Debug for BatchExecutor<C>
where
	C: DirectoryHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("BatchExecutor")
			.field("authority", &self.authority)
			.field("retry_policy", &self.retry_policy)
			.finish()
	}
}
