//! Refresh-token exchange serialized behind the authority's async guard.
//!
//! Callers that observed a stale access token pass it along; once they acquire the guard
//! they reuse whatever token a concurrent refresh stored instead of hitting the token
//! endpoint again. Explicit refreshes always reach the endpoint.

mod metrics;

pub use metrics::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{Credentials, TokenSecret},
	authority::TokenAuthority,
	error::ConfigError,
	http::DirectoryHttpClient,
	oauth::OAuthFacade,
	obs::{self, CallKind, CallOutcome, CallSpan},
	retry,
};

/// Why a refresh was requested.
#[derive(Clone, Debug)]
pub(crate) enum RefreshTrigger {
	/// Caller asked for a refresh explicitly.
	Explicit,
	/// Caller held this token (or none) when it decided a refresh was needed.
	Stale(Option<TokenSecret>),
}

impl<C> TokenAuthority<C>
where
	C: DirectoryHttpClient,
{
	/// Redeems the stored refresh token and updates the credentials in place.
	///
	/// The provider's new access token always replaces the old one; the identity token and
	/// the refresh token are replaced only when the provider returns them.
	pub async fn refresh_access_token(&self) -> Result<Credentials> {
		self.refresh_with(RefreshTrigger::Explicit).await
	}

	/// Refreshes and returns the access token to use next.
	pub(crate) async fn renew(&self, stale: Option<TokenSecret>) -> Result<TokenSecret> {
		let credentials = self.refresh_with(RefreshTrigger::Stale(stale)).await?;

		credentials.access_token.filter(|token| !token.is_blank()).ok_or_else(|| Error::Auth {
			reason: "The token endpoint did not provide an access token.".into(),
		})
	}

	pub(crate) async fn refresh_with(&self, trigger: RefreshTrigger) -> Result<Credentials> {
		const KIND: CallKind = CallKind::Refresh;

		let span = CallSpan::new(KIND, "refresh_access_token");

		obs::record_call_outcome(KIND, CallOutcome::Attempt);

		let result = span.instrument(self.refresh_guarded(trigger)).await;

		match &result {
			Ok(_) => obs::record_call_outcome(KIND, CallOutcome::Success),
			Err(err) => {
				obs::warn_event(KIND, &format!("Token refresh failed: {err}"));
				obs::record_call_outcome(KIND, CallOutcome::Failure);
			},
		}

		result
	}

	async fn refresh_guarded(&self, trigger: RefreshTrigger) -> Result<Credentials> {
		let _singleflight = self.refresh_guard.lock().await;

		if let RefreshTrigger::Stale(stale) = trigger {
			let current = self.access_token();

			if current.is_some() && current != stale {
				self.refresh_metrics.record_reuse();

				return Ok(self.credentials());
			}
		}

		let (refresh_token, client) = {
			let credentials = self.credentials.read();
			let refresh_token = credentials
				.refresh_token
				.clone()
				.filter(|token| !token.is_blank())
				.ok_or(ConfigError::MissingRefreshToken)?;
			let client = credentials.client.clone().ok_or(ConfigError::MissingClientCredentials)?;

			(refresh_token, client)
		};

		self.refresh_metrics.record_attempt();

		let grant = async {
			let facade =
				OAuthFacade::from_descriptor(&self.descriptor, &client, self.http_client.clone())?;

			retry::run(&self.retry_policy, &self.cancel, CallKind::Refresh, || {
				facade.refresh(&self.retry_policy, refresh_token.expose())
			})
			.await
		}
		.await
		.inspect_err(|_| self.refresh_metrics.record_failure())?;
		let mut credentials = self.credentials.write();

		credentials.access_token = Some(grant.access_token.into());

		if let Some(id_token) = grant.id_token {
			credentials.id_token = Some(id_token.into());
		}
		if let Some(rotated) = grant.refresh_token.filter(|token| !token.trim().is_empty()) {
			credentials.refresh_token = Some(rotated.into());
		}

		self.refresh_metrics.record_success();

		Ok(credentials.clone())
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::_preludet::*;

	const TOKEN_PATH: &str = "/o/oauth2/token";

	#[tokio::test]
	async fn refresh_updates_tokens_and_keeps_unrotated_refresh_token() {
		let (authority, transport) = build_scripted_authority(Some("stale"));

		transport.push(
			TOKEN_PATH,
			ScriptedReply::json(
				200,
				json!({ "access_token": "fresh", "token_type": "Bearer", "id_token": "id-1" }),
			),
		);

		let credentials =
			authority.refresh_access_token().await.expect("Refresh should succeed.");

		assert_eq!(credentials.access_token(), Some("fresh"));
		assert_eq!(credentials.id_token.as_ref().map(TokenSecret::expose), Some("id-1"));
		assert_eq!(
			credentials.refresh_token.as_ref().map(TokenSecret::expose),
			Some("refresh-seed")
		);
		assert_eq!(authority.credentials(), credentials);
		assert_eq!(authority.refresh_metrics.successes(), 1);

		let request = &transport.requests()[0];

		assert!(request.body.contains("grant_type=refresh_token"));
		assert!(request.body.contains("refresh_token=refresh-seed"));
		assert!(request.body.contains("client_id=client-id"));
		assert!(request.body.contains("client_secret=client-secret"));
	}

	#[tokio::test]
	async fn rotated_refresh_token_replaces_the_stored_one() {
		let (authority, transport) = build_scripted_authority(None);

		transport.push(
			TOKEN_PATH,
			ScriptedReply::json(
				200,
				json!({ "access_token": "fresh", "token_type": "Bearer", "refresh_token": "next" }),
			),
		);

		let credentials =
			authority.refresh_access_token().await.expect("Refresh should succeed.");

		assert_eq!(credentials.refresh_token.as_ref().map(TokenSecret::expose), Some("next"));
	}

	#[tokio::test]
	async fn refresh_failure_is_returned_and_counted() {
		let (authority, transport) = build_scripted_authority(Some("stale"));

		transport.push(TOKEN_PATH, ScriptedReply::json(400, json!({ "error": "invalid_grant" })));

		let err = authority.refresh_access_token().await.expect_err("Refresh should fail.");

		assert_eq!(err.status(), Some(400));
		assert_eq!(authority.refresh_metrics.failures(), 1);
		assert_eq!(authority.credentials().access_token(), Some("stale"));
	}

	#[tokio::test]
	async fn transient_token_failures_are_retried() {
		let (authority, transport) = build_scripted_authority(None);

		transport
			.push(TOKEN_PATH, ScriptedReply::json(503, json!({ "error": "unavailable" })))
			.push(TOKEN_PATH, ScriptedReply::Transport("connection reset".into()))
			.push(TOKEN_PATH, token_reply("fresh"));

		let credentials =
			authority.refresh_access_token().await.expect("Third attempt should succeed.");

		assert_eq!(credentials.access_token(), Some("fresh"));
		assert_eq!(transport.calls_to(TOKEN_PATH), 3);
		assert_eq!(authority.refresh_metrics.attempts(), 1);
	}

	#[tokio::test]
	async fn concurrent_stale_callers_share_one_refresh() {
		let (authority, transport) = build_scripted_authority(Some("stale"));

		transport.push(TOKEN_PATH, token_reply("fresh"));

		let stale = Some(TokenSecret::from("stale"));
		let (first, second) =
			tokio::join!(authority.renew(stale.clone()), authority.renew(stale.clone()));

		assert_eq!(first.expect("First renew should succeed.").expose(), "fresh");
		assert_eq!(second.expect("Second renew should succeed.").expose(), "fresh");
		assert_eq!(transport.calls_to(TOKEN_PATH), 1);
		assert_eq!(authority.refresh_metrics.reused(), 1);
	}

	#[tokio::test]
	async fn missing_refresh_token_fails_before_network() {
		let transport = ScriptedHttpClient::default();
		let credentials =
			Credentials::builder().access_token("only").build().expect("Credentials should build.");
		let authority =
			ScriptedAuthority::with_http_client(test_descriptor(), credentials, transport.clone())
				.expect("Authority should build.");
		let err = authority.refresh_access_token().await.expect_err("Refresh should fail.");

		assert!(matches!(err, Error::Config(ConfigError::MissingRefreshToken)));
		assert!(transport.requests().is_empty());
	}

	#[tokio::test]
	async fn cancelled_authority_refuses_to_refresh() {
		let (authority, transport) = build_scripted_authority(None);

		transport.fallback(TOKEN_PATH, token_reply("fresh"));
		authority.cancel();

		let err = authority.refresh_access_token().await.expect_err("Refresh should abort.");

		assert!(matches!(err, Error::Cancelled));
	}
}
