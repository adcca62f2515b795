//! Authorized resource requests: bearer injection, one refresh-and-replay on `401`, retry.

// self
use crate::{
	_prelude::*,
	auth::TokenSecret,
	authority::TokenAuthority,
	http::{self, DirectoryHttpClient, OutboundRequest, RawResponse},
	normalize::{self, Normalized},
	obs::{self, CallKind, CallOutcome, CallSpan},
	query::Query,
	retry::{self, RetryPolicy, Verdict},
};

const UNAUTHORIZED: u16 = 401;

impl<C> TokenAuthority<C>
where
	C: DirectoryHttpClient,
{
	/// Executes `query` with bearer auth and normalizes the response.
	///
	/// Refreshes first when no access token is held. A `401` on a request that has not been
	/// refreshed yet triggers exactly one refresh and one replay; any later `401` becomes
	/// [`Error::Auth`].
	pub async fn authorized_request(&self, query: &Query) -> Result<Normalized> {
		const KIND: CallKind = CallKind::Request;

		let span = CallSpan::new(KIND, "authorized_request");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span
			.instrument(async {
				let request = query.to_outbound()?;
				let response = self.send_authorized(&request, &self.retry_policy, KIND).await?;

				normalize::normalize(&response, &self.descriptor.quirks)
			})
			.await;

		match &result {
			Ok(_) => obs::record_call_outcome(KIND, CallOutcome::Success),
			Err(_) => obs::record_call_outcome(KIND, CallOutcome::Failure),
		}

		result
	}

	/// Sends `request` with the current bearer token, refreshing at most once.
	pub(crate) async fn send_authorized(
		&self,
		request: &OutboundRequest,
		policy: &RetryPolicy,
		kind: CallKind,
	) -> Result<RawResponse> {
		let mut refreshed = false;
		let mut bearer = match self.access_token() {
			Some(token) => token,
			None => {
				refreshed = true;

				self.renew(None).await?
			},
		};

		loop {
			let response = self.dispatch(request, Some(&bearer), policy, kind).await?;

			if response.status != UNAUTHORIZED {
				return Ok(response);
			}
			if refreshed || !self.can_refresh() {
				return Err(Error::Auth {
					reason: format!(
						"The provider rejected the access token with status {UNAUTHORIZED}."
					),
				});
			}

			refreshed = true;
			bearer = self.renew(Some(bearer)).await?;
		}
	}

	/// Sends `request` under `policy`, turning transient statuses into retries.
	pub(crate) async fn dispatch(
		&self,
		request: &OutboundRequest,
		bearer: Option<&TokenSecret>,
		policy: &RetryPolicy,
		kind: CallKind,
	) -> Result<RawResponse> {
		let bearer = bearer.map(TokenSecret::expose);

		retry::run(policy, &self.cancel, kind, || async move {
			let outgoing = match request.to_http(bearer) {
				Ok(outgoing) => outgoing,
				Err(err) => return Verdict::Done(Err(err.into())),
			};

			match http::send(self.http_client.as_ref(), outgoing).await {
				Ok(response) if policy.is_retryable_status(response.status) => Verdict::Transient {
					last: Error::Remote { status: response.status, body: response.json_body() },
					retry_after: response.retry_after,
				},
				other => policy.judge(other, None),
			}
		})
		.await
	}
}
