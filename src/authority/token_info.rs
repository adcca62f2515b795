//! Access-token introspection.

// crates.io
use oauth2::http::Method;
// self
use crate::{
	_prelude::*,
	auth::TokenInfo,
	authority::TokenAuthority,
	error::ConfigError,
	http::{DirectoryHttpClient, OutboundRequest},
	obs::{self, CallKind, CallOutcome, CallSpan},
};

impl<C> TokenAuthority<C>
where
	C: DirectoryHttpClient,
{
	/// Validates the held access token against the token info endpoint.
	pub async fn token_info(&self) -> Result<TokenInfo> {
		const KIND: CallKind = CallKind::TokenInfo;

		let span = CallSpan::new(KIND, "token_info");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span
			.instrument(async {
				let token = self
					.access_token()
					.ok_or(ConfigError::MissingParameter { name: "access_token" })?;
				let mut url = self.descriptor.endpoints.token_info.clone();

				url.query_pairs_mut().append_pair("access_token", token.expose());

				let request = OutboundRequest::new(Method::GET, url).accept_json(true);
				let response = self.dispatch(&request, None, &self.retry_policy, KIND).await?;

				if !response.is_success() {
					let body = response.json_body();

					return Err(Error::Remote { status: response.status, body });
				}

				TokenInfo::from_value(response.json_body())
			})
			.await;

		match &result {
			Ok(_) => obs::record_call_outcome(KIND, CallOutcome::Success),
			Err(_) => obs::record_call_outcome(KIND, CallOutcome::Failure),
		}

		result
	}
}
