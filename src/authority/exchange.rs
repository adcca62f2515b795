//! Authorization-code exchange.

// self
use crate::{
	_prelude::*,
	auth::{CodeExchange, Credentials},
	authority::TokenAuthority,
	http::DirectoryHttpClient,
	oauth::OAuthFacade,
	obs::{self, CallKind, CallOutcome, CallSpan},
	provider::ProviderDescriptor,
	retry::{self, RetryPolicy},
};

impl<C> TokenAuthority<C>
where
	C: DirectoryHttpClient,
{
	/// Redeems an authorization code at the token endpoint and returns the resulting
	/// credentials, client pair included.
	///
	/// Every input is validated before any network call; transient failures are retried per
	/// `retry_policy`. Cancelling `cancel` aborts the in-flight attempt and any backoff sleep
	/// with [`Error::Cancelled`].
	pub async fn exchange_authorization_code(
		descriptor: &ProviderDescriptor,
		http_client: Arc<C>,
		retry_policy: &RetryPolicy,
		cancel: &CancellationToken,
		exchange: &CodeExchange,
	) -> Result<Credentials> {
		const KIND: CallKind = CallKind::AuthorizationCode;

		let span = CallSpan::new(KIND, "exchange_authorization_code");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span
			.instrument(async move {
				let redirect_uri = exchange.validate()?;
				let facade =
					OAuthFacade::from_descriptor(descriptor, &exchange.client, http_client)?;
				let grant = retry::run(retry_policy, cancel, KIND, || {
					facade.exchange_code(retry_policy, &exchange.code, &redirect_uri)
				})
				.await?;

				Ok(Credentials {
					access_token: Some(grant.access_token.into()),
					refresh_token: grant.refresh_token.map(Into::into),
					id_token: grant.id_token.map(Into::into),
					client: Some(exchange.client.clone()),
				})
			})
			.await;

		match &result {
			Ok(_) => obs::record_call_outcome(KIND, CallOutcome::Success),
			Err(_) => obs::record_call_outcome(KIND, CallOutcome::Failure),
		}

		result
	}
}
