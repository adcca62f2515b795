//! Access-token introspection payload.

// self
use crate::_prelude::*;

/// Token introspection result returned by the provider's token info endpoint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenInfo {
	/// Client the token was issued to.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub issued_to: Option<String>,
	/// Intended audience.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub audience: Option<String>,
	/// Subject identifier.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub user_id: Option<String>,
	/// Space-delimited granted scopes.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub scope: Option<String>,
	/// Remaining lifetime in seconds.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expires_in: Option<i64>,
	/// Account email, when the email scope was granted.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub email: Option<String>,
	/// Whether the account email is verified.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub verified_email: Option<bool>,
	/// `online` or `offline`.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub access_type: Option<String>,
	/// Fields not modeled above.
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}
impl TokenInfo {
	/// Decodes a payload, reporting the JSON path of any mismatch.
	pub fn from_value(value: Value) -> Result<Self> {
		Ok(serde_path_to_error::deserialize(value)?)
	}

	/// Returns the remaining lifetime, if reported.
	pub fn expires_in(&self) -> Option<Duration> {
		self.expires_in.map(Duration::seconds)
	}

	/// Iterates over the granted scopes.
	pub fn scopes(&self) -> impl Iterator<Item = &str> {
		self.scope.as_deref().unwrap_or_default().split_whitespace()
	}
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn decode_keeps_unknown_fields_and_splits_scopes() {
		let info = TokenInfo::from_value(serde_json::json!({
			"issued_to": "client",
			"scope": "a b",
			"expires_in": 120,
			"custom": 1
		}))
		.expect("Token info should decode.");

		assert_eq!(info.scopes().collect::<Vec<_>>(), ["a", "b"]);
		assert_eq!(info.expires_in(), Some(Duration::seconds(120)));
		assert_eq!(info.extra.get("custom"), Some(&Value::from(1)));
	}

	#[test]
	fn decode_failure_reports_path() {
		let err = TokenInfo::from_value(serde_json::json!({ "expires_in": "soon" }))
			.expect_err("String lifetime should fail.");

		assert!(matches!(err, Error::Decode(_)), "Expected a decode error, got {err:?}.");
	}
}
