//! Internal facade over the `oauth2` crate for the token endpoint.

// std
use std::borrow::Cow;
// crates.io
use oauth2::{
	AuthType, AuthorizationCode, ClientId, ClientSecret, EndpointNotSet, EndpointSet,
	ExtraTokenFields, HttpClientError, RedirectUrl, RefreshToken, RequestTokenError,
	StandardRevocableToken, StandardTokenResponse, TokenResponse, TokenUrl,
	basic::{
		BasicErrorResponse, BasicRequestTokenError, BasicRevocationErrorResponse,
		BasicTokenIntrospectionResponse, BasicTokenType,
	},
};
// self
use crate::{
	_prelude::*,
	auth::ClientCredentials,
	error::{ConfigError, TransportError},
	http::{self, DirectoryHttpClient, ResponseMetadata, ResponseMetadataSlot},
	provider::ProviderDescriptor,
	retry::{RetryPolicy, Verdict},
};

/// Extra token fields carried by the directory provider's token responses.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub(crate) struct IdTokenFields {
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub(crate) id_token: Option<String>,
}
impl ExtraTokenFields for IdTokenFields {}

type DirectoryTokenResponse = StandardTokenResponse<IdTokenFields, BasicTokenType>;
type TokenClient = oauth2::Client<
	BasicErrorResponse,
	DirectoryTokenResponse,
	BasicTokenIntrospectionResponse,
	StandardRevocableToken,
	BasicRevocationErrorResponse,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointNotSet,
	EndpointSet,
>;

/// Tokens returned by a successful grant.
#[derive(Clone, Debug)]
pub(crate) struct TokenGrant {
	pub(crate) access_token: String,
	pub(crate) refresh_token: Option<String>,
	pub(crate) id_token: Option<String>,
}
impl From<DirectoryTokenResponse> for TokenGrant {
	fn from(response: DirectoryTokenResponse) -> Self {
		Self {
			access_token: response.access_token().secret().to_owned(),
			refresh_token: response.refresh_token().map(|token| token.secret().to_owned()),
			id_token: response.extra_fields().id_token.clone(),
		}
	}
}

/// Token endpoint client bound to one transport.
///
/// Client credentials travel in the form body, matching the provider's expectations.
pub(crate) struct OAuthFacade<C>
where
	C: ?Sized + DirectoryHttpClient,
{
	oauth_client: TokenClient,
	http_client: Arc<C>,
}
impl<C> OAuthFacade<C>
where
	C: ?Sized + DirectoryHttpClient,
{
	pub(crate) fn from_descriptor(
		descriptor: &ProviderDescriptor,
		client: &ClientCredentials,
		http_client: Arc<C>,
	) -> Result<Self> {
		let token_url = TokenUrl::new(descriptor.endpoints.token.to_string())
			.map_err(|source| ConfigError::InvalidDescriptor { source })?;
		let oauth_client: TokenClient = oauth2::Client::new(ClientId::new(client.id.clone()))
			.set_client_secret(ClientSecret::new(client.secret.expose().to_owned()))
			.set_auth_type(AuthType::RequestBody)
			.set_token_uri(token_url);

		Ok(Self { oauth_client, http_client })
	}

	/// Redeems an authorization code in a single attempt.
	pub(crate) async fn exchange_code(
		&self,
		policy: &RetryPolicy,
		code: &str,
		redirect_uri: &Url,
	) -> Verdict<TokenGrant> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let redirect_url = match RedirectUrl::new(redirect_uri.to_string()) {
			Ok(url) => url,
			Err(source) =>
				return Verdict::Done(Err(ConfigError::InvalidDescriptor { source }.into())),
		};
		let result = self
			.oauth_client
			.exchange_code(AuthorizationCode::new(code.to_owned()))
			.set_redirect_uri(Cow::Owned(redirect_url))
			.request_async(&instrumented)
			.await;

		classify(policy, &meta, result)
	}

	/// Redeems a refresh token in a single attempt.
	pub(crate) async fn refresh(
		&self,
		policy: &RetryPolicy,
		refresh_token: &str,
	) -> Verdict<TokenGrant> {
		let meta = ResponseMetadataSlot::default();
		let instrumented = self.http_client.with_metadata(meta.clone());
		let refresh_secret = RefreshToken::new(refresh_token.to_owned());
		let result = self
			.oauth_client
			.exchange_refresh_token(&refresh_secret)
			.request_async(&instrumented)
			.await;

		classify(policy, &meta, result)
	}
}

fn classify<E>(
	policy: &RetryPolicy,
	meta: &ResponseMetadataSlot,
	result: Result<DirectoryTokenResponse, BasicRequestTokenError<HttpClientError<E>>>,
) -> Verdict<TokenGrant>
where
	E: 'static + Send + Sync + StdError,
{
	let meta = meta.take().unwrap_or_default();
	let retry_after = meta.retry_after;
	let result = result.map(TokenGrant::from).map_err(|err| map_request_error(&meta, err));

	policy.judge(result, retry_after)
}

fn map_request_error<E>(
	meta: &ResponseMetadata,
	err: BasicRequestTokenError<HttpClientError<E>>,
) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	let failed_status = meta.status.filter(|status| !(200..300).contains(status));

	match err {
		RequestTokenError::ServerResponse(response) => Error::Remote {
			status: failed_status.unwrap_or(400),
			body: serde_json::to_value(&response).unwrap_or(Value::Null),
		},
		RequestTokenError::Request(error) => http::map_client_error(error),
		RequestTokenError::Parse(source, body) => match failed_status {
			Some(status) => Error::Remote {
				status,
				body: serde_json::from_slice(&body)
					.unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&body).into_owned())),
			},
			None => Error::Decode(source),
		},
		RequestTokenError::Other(message) => match failed_status {
			Some(status) => Error::Remote { status, body: Value::String(message) },
			None => TransportError::Other { message }.into(),
		},
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn server_errors_keep_status_and_body() {
		let meta = ResponseMetadata { status: Some(400), retry_after: None };
		let response: BasicErrorResponse =
			serde_json::from_value(serde_json::json!({ "error": "invalid_grant" }))
				.expect("Error response should deserialize.");
		let err = map_request_error::<std::io::Error>(
			&meta,
			RequestTokenError::ServerResponse(response),
		);

		match err {
			Error::Remote { status, body } => {
				assert_eq!(status, 400);
				assert_eq!(body["error"], "invalid_grant");
			},
			other => panic!("Expected a remote error, got {other:?}."),
		}
	}

	#[test]
	fn unparseable_failure_bodies_become_remote_errors() {
		let meta = ResponseMetadata { status: Some(503), retry_after: None };
		let source = serde_path_to_error::deserialize::<_, BasicErrorResponse>(
			&mut serde_json::Deserializer::from_slice(b"<html>"),
		)
		.expect_err("HTML should not parse.");
		let err = map_request_error::<std::io::Error>(
			&meta,
			RequestTokenError::Parse(source, b"<html>".to_vec()),
		);

		assert_eq!(err.status(), Some(503));
		assert!(matches!(
			RetryPolicy::default().judge::<()>(Err(err), None),
			Verdict::Transient { .. }
		));
	}
}
