//! Provider descriptor data structures and helpers shared by every call.

/// Builder API for assembling provider descriptors.
pub mod builder;
/// Response-shape conventions of the directory API.
pub mod quirks;

pub use builder::*;
pub use quirks::*;

// self
use crate::{_prelude::*, error::ConfigError};

const GOOGLE_ROOT: &str = "https://www.googleapis.com/";
const GOOGLE_ACCOUNTS_ROOT: &str = "https://accounts.google.com/";

/// Endpoint set declared by a provider descriptor.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderEndpoints {
	/// Token endpoint used for code exchanges and refreshes.
	pub token: Url,
	/// Access-token introspection endpoint.
	pub token_info: Url,
	/// Base URL that resource paths are appended to; always ends with `/`.
	pub api_base: Url,
	/// Multipart batch endpoint.
	pub batch: Url,
}

/// Immutable provider descriptor consumed by the authority, streams, and batches.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProviderDescriptor {
	/// Endpoint definitions exposed by the provider.
	pub endpoints: ProviderEndpoints,
	/// Response-shape conventions.
	pub quirks: ProviderQuirks,
}
impl ProviderDescriptor {
	/// Creates a new builder.
	pub fn builder() -> ProviderDescriptorBuilder {
		ProviderDescriptorBuilder::default()
	}

	/// Production endpoints of the Google Admin SDK directory API.
	pub fn google() -> Result<Self> {
		let api = parse(GOOGLE_ROOT)?;
		let accounts = parse(GOOGLE_ACCOUNTS_ROOT)?;

		Ok(Self::builder()
			.token_endpoint(join(&accounts, "o/oauth2/token")?)
			.token_info_endpoint(join(&api, "oauth2/v1/tokeninfo")?)
			.api_base(join(&api, "admin/directory/v1/")?)
			.batch_endpoint(join(&api, "batch/admin/directory_v1")?)
			.build()
			.map_err(ConfigError::from)?)
	}

	/// Mirrors the production layout under `base`, for proxies and test servers.
	pub fn rooted_at(base: &Url) -> Result<Self> {
		let mut base = base.clone();

		if !base.path().ends_with('/') {
			let path = format!("{}/", base.path());

			base.set_path(&path);
		}

		Ok(Self::builder()
			.token_endpoint(join(&base, "o/oauth2/token")?)
			.token_info_endpoint(join(&base, "oauth2/v1/tokeninfo")?)
			.api_base(join(&base, "admin/directory/v1/")?)
			.batch_endpoint(join(&base, "batch/admin/directory_v1")?)
			.build()
			.map_err(ConfigError::from)?)
	}

	/// Resolves a resource URL by appending path segments to the API base.
	///
	/// Each segment is percent-encoded, so callers split hierarchical values (org-unit paths)
	/// before passing them in.
	pub fn resource_url<I, S>(&self, segments: I) -> Result<Url>
	where
		I: IntoIterator<Item = S>,
		S: AsRef<str>,
	{
		let mut url = self.endpoints.api_base.clone();

		url.path_segments_mut()
			.map_err(|_| ConfigError::InvalidParameter {
				name: "api_base",
				reason: "URL cannot carry path segments".into(),
			})?
			.pop_if_empty()
			.extend(segments);

		Ok(url)
	}
}

fn parse(raw: &str) -> Result<Url, ConfigError> {
	Url::parse(raw).map_err(|source| ConfigError::InvalidDescriptor { source })
}

fn join(base: &Url, path: &str) -> Result<Url, ConfigError> {
	base.join(path).map_err(|source| ConfigError::InvalidDescriptor { source })
}
