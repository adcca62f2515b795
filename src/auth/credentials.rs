//! OAuth credentials held by a token authority, plus the authorization-code exchange input.

// self
use crate::{_prelude::*, auth::TokenSecret, error::ConfigError};

/// Errors raised while validating [`Credentials`].
#[derive(Clone, Debug, PartialEq, Eq, ThisError)]
pub enum CredentialsError {
	/// Neither an access token nor a refresh token was supplied.
	#[error("Credentials need an access token or a refresh token.")]
	MissingToken,
	/// A refresh token was supplied without the client pair needed to redeem it.
	#[error("A refresh token requires a client id and client secret.")]
	MissingClient,
	/// A client field is blank.
	#[error("Client field `{field}` must not be blank.")]
	BlankClientField {
		/// Field name.
		field: &'static str,
	},
}

/// OAuth client identifier and secret.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientCredentials {
	/// Client identifier.
	pub id: String,
	/// Client secret; redacted in logs.
	pub secret: TokenSecret,
}
impl ClientCredentials {
	/// Pairs a client identifier with its secret.
	pub fn new(id: impl Into<String>, secret: impl Into<TokenSecret>) -> Self {
		Self { id: id.into(), secret: secret.into() }
	}
}

/// Tokens and client configuration owned by one
/// [`TokenAuthority`](crate::authority::TokenAuthority).
///
/// At least one of the access and refresh tokens is present, and a refresh token always comes
/// with client credentials. The authority updates the tokens in place after every refresh.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
	/// Bearer token attached to resource requests.
	pub access_token: Option<TokenSecret>,
	/// Long-lived token used to mint new access tokens.
	pub refresh_token: Option<TokenSecret>,
	/// Identity token returned by the provider, if any.
	pub id_token: Option<TokenSecret>,
	/// Client pair used at the token endpoint.
	pub client: Option<ClientCredentials>,
}
impl Credentials {
	/// Returns a builder for validated credentials.
	pub fn builder() -> CredentialsBuilder {
		CredentialsBuilder::default()
	}

	/// Checks the construction invariants.
	pub fn validate(&self) -> Result<(), CredentialsError> {
		let present = |token: &Option<TokenSecret>| token.as_ref().is_some_and(|t| !t.is_blank());

		if !present(&self.access_token) && !present(&self.refresh_token) {
			return Err(CredentialsError::MissingToken);
		}
		if present(&self.refresh_token) {
			let client = self.client.as_ref().ok_or(CredentialsError::MissingClient)?;

			if client.id.trim().is_empty() {
				return Err(CredentialsError::BlankClientField { field: "client.id" });
			}
			if client.secret.is_blank() {
				return Err(CredentialsError::BlankClientField { field: "client.secret" });
			}
		}

		Ok(())
	}

	/// Returns the exposed access token, if one is held.
	pub fn access_token(&self) -> Option<&str> {
		self.access_token.as_ref().map(TokenSecret::expose).filter(|token| !token.is_empty())
	}
}

/// Builder for [`Credentials`].
#[derive(Debug, Default)]
pub struct CredentialsBuilder {
	access_token: Option<TokenSecret>,
	refresh_token: Option<TokenSecret>,
	id_token: Option<TokenSecret>,
	client: Option<ClientCredentials>,
}
impl CredentialsBuilder {
	/// Sets the access token.
	pub fn access_token(mut self, token: impl Into<TokenSecret>) -> Self {
		self.access_token = Some(token.into());

		self
	}

	/// Sets the refresh token.
	pub fn refresh_token(mut self, token: impl Into<TokenSecret>) -> Self {
		self.refresh_token = Some(token.into());

		self
	}

	/// Sets the identity token.
	pub fn id_token(mut self, token: impl Into<TokenSecret>) -> Self {
		self.id_token = Some(token.into());

		self
	}

	/// Sets the client pair.
	pub fn client(mut self, id: impl Into<String>, secret: impl Into<TokenSecret>) -> Self {
		self.client = Some(ClientCredentials::new(id, secret));

		self
	}

	/// Validates and builds the credentials.
	pub fn build(self) -> Result<Credentials, CredentialsError> {
		let credentials = Credentials {
			access_token: self.access_token,
			refresh_token: self.refresh_token,
			id_token: self.id_token,
			client: self.client,
		};

		credentials.validate()?;

		Ok(credentials)
	}
}

/// Input for the authorization-code exchange.
#[derive(Clone, Debug)]
pub struct CodeExchange {
	/// Authorization code returned to the redirect URI.
	pub code: String,
	/// Redirect URI registered for the client.
	pub redirect_uri: String,
	/// Client pair.
	pub client: ClientCredentials,
}
impl CodeExchange {
	/// Bundles the exchange inputs.
	pub fn new(
		code: impl Into<String>,
		redirect_uri: impl Into<String>,
		client: ClientCredentials,
	) -> Self {
		Self { code: code.into(), redirect_uri: redirect_uri.into(), client }
	}

	/// Names the first absent field among code, redirect URI, client id, and client secret,
	/// then checks the redirect URI parses.
	pub fn validate(&self) -> Result<Url, ConfigError> {
		if self.code.trim().is_empty() {
			return Err(ConfigError::MissingParameter { name: "code" });
		}
		if self.redirect_uri.trim().is_empty() {
			return Err(ConfigError::MissingParameter { name: "redirect_uri" });
		}
		if self.client.id.trim().is_empty() {
			return Err(ConfigError::MissingParameter { name: "client.id" });
		}
		if self.client.secret.is_blank() {
			return Err(ConfigError::MissingParameter { name: "client.secret" });
		}

		Url::parse(&self.redirect_uri).map_err(|e| ConfigError::InvalidParameter {
			name: "redirect_uri",
			reason: e.to_string(),
		})
	}
}
