// self
use crate::{
	_prelude::*,
	provider::{ProviderDescriptor, ProviderEndpoints, ProviderQuirks},
};

/// Errors raised while constructing or validating descriptors.
#[derive(Debug, PartialEq, Eq, ThisError)]
pub enum ProviderDescriptorError {
	/// A required endpoint was not supplied.
	#[error("Missing {endpoint} endpoint.")]
	MissingEndpoint {
		/// Which endpoint is missing.
		endpoint: &'static str,
	},
	/// Endpoints must use HTTPS unless they point at a loopback host.
	#[error("The {endpoint} endpoint must use HTTPS: {url}.")]
	InsecureEndpoint {
		/// Which endpoint failed validation.
		endpoint: &'static str,
		/// Endpoint URL that failed validation.
		url: String,
	},
	/// A quirk value that must be non-empty is blank.
	#[error("Quirk `{quirk}` must not be empty.")]
	EmptyQuirk {
		/// Quirk field name.
		quirk: &'static str,
	},
	/// The batch boundary contains characters outside RFC 2046's allowed set.
	#[error("Batch boundary contains invalid characters.")]
	InvalidBoundary,
}

/// Builder for [`ProviderDescriptor`] values.
#[derive(Clone, Debug, Default)]
pub struct ProviderDescriptorBuilder {
	/// Token endpoint used for exchanges and refreshes.
	pub token_endpoint: Option<Url>,
	/// Access-token introspection endpoint.
	pub token_info_endpoint: Option<Url>,
	/// Base URL for resource paths.
	pub api_base: Option<Url>,
	/// Multipart batch endpoint.
	pub batch_endpoint: Option<Url>,
	/// Provider-specific quirks.
	pub quirks: ProviderQuirks,
}
impl ProviderDescriptorBuilder {
	/// Sets the token endpoint.
	pub fn token_endpoint(mut self, url: Url) -> Self {
		self.token_endpoint = Some(url);

		self
	}

	/// Sets the token introspection endpoint.
	pub fn token_info_endpoint(mut self, url: Url) -> Self {
		self.token_info_endpoint = Some(url);

		self
	}

	/// Sets the resource base URL; a trailing `/` is added when missing.
	pub fn api_base(mut self, mut url: Url) -> Self {
		if !url.path().ends_with('/') {
			let path = format!("{}/", url.path());

			url.set_path(&path);
		}

		self.api_base = Some(url);

		self
	}

	/// Sets the batch endpoint.
	pub fn batch_endpoint(mut self, url: Url) -> Self {
		self.batch_endpoint = Some(url);

		self
	}

	/// Overrides the provider quirks.
	pub fn quirks(mut self, quirks: ProviderQuirks) -> Self {
		self.quirks = quirks;

		self
	}

	/// Consumes the builder and validates the resulting descriptor.
	pub fn build(self) -> Result<ProviderDescriptor, ProviderDescriptorError> {
		let missing = |endpoint| ProviderDescriptorError::MissingEndpoint { endpoint };
		let endpoints = ProviderEndpoints {
			token: self.token_endpoint.ok_or_else(|| missing("token"))?,
			token_info: self.token_info_endpoint.ok_or_else(|| missing("token_info"))?,
			api_base: self.api_base.ok_or_else(|| missing("api_base"))?,
			batch: self.batch_endpoint.ok_or_else(|| missing("batch"))?,
		};
		let descriptor = ProviderDescriptor { endpoints, quirks: self.quirks };

		descriptor.validate()?;

		Ok(descriptor)
	}
}

impl ProviderDescriptor {
	/// Validates invariants for the descriptor.
	fn validate(&self) -> Result<(), ProviderDescriptorError> {
		validate_endpoint("token", &self.endpoints.token)?;
		validate_endpoint("token_info", &self.endpoints.token_info)?;
		validate_endpoint("api_base", &self.endpoints.api_base)?;
		validate_endpoint("batch", &self.endpoints.batch)?;

		let quirks = &self.quirks;

		for (quirk, value) in [
			("resource_kind_prefix", &quirks.resource_kind_prefix),
			("page_token_param", &quirks.page_token_param),
			("next_page_token_field", &quirks.next_page_token_field),
			("batch_boundary", &quirks.batch_boundary),
		] {
			if value.is_empty() {
				return Err(ProviderDescriptorError::EmptyQuirk { quirk });
			}
		}

		validate_boundary(&quirks.batch_boundary)
	}
}

fn validate_endpoint(name: &'static str, url: &Url) -> Result<(), ProviderDescriptorError> {
	let loopback = match url.host() {
		Some(url::Host::Domain(domain)) => domain == "localhost",
		Some(url::Host::Ipv4(ip)) => ip.is_loopback(),
		Some(url::Host::Ipv6(ip)) => ip.is_loopback(),
		None => false,
	};

	if url.scheme() == "https" || (url.scheme() == "http" && loopback) {
		Ok(())
	} else {
		Err(ProviderDescriptorError::InsecureEndpoint { endpoint: name, url: url.to_string() })
	}
}

// RFC 2046 bchars, at most 70 characters, no trailing space.
fn validate_boundary(boundary: &str) -> Result<(), ProviderDescriptorError> {
	let allowed = |c: char| c.is_ascii_alphanumeric() || "'()+_,-./:=? ".contains(c);

	if boundary.len() > 70 || boundary.ends_with(' ') || !boundary.chars().all(allowed) {
		Err(ProviderDescriptorError::InvalidBoundary)
	} else {
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	fn url(raw: &str) -> Url {
		Url::parse(raw).expect("Test URL should parse.")
	}

	fn complete(base: &str) -> ProviderDescriptorBuilder {
		ProviderDescriptor::builder()
			.token_endpoint(url(&format!("{base}/token")))
			.token_info_endpoint(url(&format!("{base}/tokeninfo")))
			.api_base(url(&format!("{base}/api")))
			.batch_endpoint(url(&format!("{base}/batch")))
	}

	#[test]
	fn missing_endpoint_is_named() {
		let err = ProviderDescriptor::builder()
			.token_endpoint(url("https://auth.test/token"))
			.build()
			.expect_err("Incomplete builder should fail.");

		assert_eq!(err, ProviderDescriptorError::MissingEndpoint { endpoint: "token_info" });
	}

	#[test]
	fn plain_http_is_only_allowed_on_loopback() {
		assert!(complete("http://127.0.0.1:9000").build().is_ok());
		assert!(complete("http://localhost").build().is_ok());
		assert!(matches!(
			complete("http://directory.test").build(),
			Err(ProviderDescriptorError::InsecureEndpoint { endpoint: "token", .. })
		));
	}

	#[test]
	fn api_base_gains_trailing_slash() {
		let descriptor =
			complete("https://directory.test").build().expect("Descriptor should build.");

		assert_eq!(descriptor.endpoints.api_base.as_str(), "https://directory.test/api/");
	}

	#[test]
	fn quirks_are_validated() {
		let quirks =
			ProviderQuirks { batch_boundary: "bad\"boundary".into(), ..Default::default() };

		assert_eq!(
			complete("https://directory.test").quirks(quirks).build(),
			Err(ProviderDescriptorError::InvalidBoundary)
		);

		let quirks = ProviderQuirks { page_token_param: String::new(), ..Default::default() };

		assert_eq!(
			complete("https://directory.test").quirks(quirks).build(),
			Err(ProviderDescriptorError::EmptyQuirk { quirk: "page_token_param" })
		);
	}
}
