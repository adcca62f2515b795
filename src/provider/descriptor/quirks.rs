// self
use crate::_prelude::*;

/// Multipart boundary used for outgoing batch requests.
pub const DEFAULT_BATCH_BOUNDARY: &str = "===============7330845974216740156==";

/// Provider-specific conventions that shape responses and requests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderQuirks {
	/// Prefix of `kind` values that mark directory resources.
	pub resource_kind_prefix: String,
	/// Prefix of extension-namespaced entry fields promoted onto decoded entries.
	pub extension_prefix: String,
	/// Extension field (after the prefix) holding a `name`/`value` property list.
	pub property_list_field: String,
	/// Query parameter carrying the continuation token.
	pub page_token_param: String,
	/// Response field carrying the continuation token.
	pub next_page_token_field: String,
	/// Boundary for outgoing multipart batch requests.
	pub batch_boundary: String,
}
impl Default for ProviderQuirks {
	fn default() -> Self {
		Self {
			resource_kind_prefix: "admin#directory".into(),
			extension_prefix: "apps$".into(),
			property_list_field: "property".into(),
			page_token_param: "pageToken".into(),
			next_page_token_field: "nextPageToken".into(),
			batch_boundary: DEFAULT_BATCH_BOUNDARY.into(),
		}
	}
}
