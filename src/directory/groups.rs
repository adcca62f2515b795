//! Group resource queries.

// crates.io
use oauth2::http::Method;
// self
use crate::{
	_prelude::*,
	directory::{body_of, params_of, require, with_fields},
	error::ConfigError,
	provider::ProviderDescriptor,
	query::Query,
};

/// Parameters of a group listing; unknown parameters are rejected on deserialization.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields, rename_all = "camelCase")]
pub struct GroupListOptions {
	/// Customer ID, or `my_customer`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub customer: Option<String>,
	/// Domain to list groups from.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub domain: Option<String>,
	/// Page size.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub max_results: Option<u32>,
	/// Continuation token of the page to fetch.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub page_token: Option<String>,
	/// Restricts the listing to groups this member belongs to.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub user_key: Option<String>,
	/// Partial-response selector.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub fields: Option<String>,
}

/// Body of a group insert.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewGroup {
	/// Group email address.
	pub email: String,
	/// Display name.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub name: Option<String>,
	/// Description.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
}

/// Builds group resource queries.
#[derive(Clone, Copy, Debug)]
pub struct Groups<'a> {
	descriptor: &'a ProviderDescriptor,
}
impl<'a> Groups<'a> {
	/// Builds queries against `descriptor`'s API base.
	pub fn new(descriptor: &'a ProviderDescriptor) -> Self {
		Self { descriptor }
	}

	/// `GET groups` with listing parameters.
	pub fn list(&self, options: &GroupListOptions) -> Result<Query> {
		let url = self.descriptor.resource_url(["groups"])?;

		Ok(Query::get(url).with_params(params_of(options)?))
	}

	/// `GET groups/{group_key}`.
	pub fn get(&self, group_key: &str) -> Result<Query> {
		Ok(Query::get(self.group_url(group_key)?))
	}

	/// `POST groups`.
	pub fn insert(&self, group: &NewGroup, fields: Option<&str>) -> Result<Query> {
		require("email", &group.email)?;

		let url = self.descriptor.resource_url(["groups"])?;

		Ok(with_fields(Query::new(Method::POST, url).with_body(body_of(group)?), fields))
	}

	/// `DELETE groups/{group_key}`.
	pub fn delete(&self, group_key: &str) -> Result<Query> {
		Ok(Query::new(Method::DELETE, self.group_url(group_key)?))
	}

	/// `PATCH groups/{group_key}`; the key must be a group ID, not an email address.
	pub fn patch(
		&self,
		group_key: &str,
		body: Option<Value>,
		fields: Option<&str>,
	) -> Result<Query> {
		if is_email(group_key.trim()) {
			return Err(ConfigError::InvalidParameter {
				name: "group_key",
				reason: "a group key cannot be an email address".into(),
			}
			.into());
		}

		let query = Query::new(Method::PATCH, self.group_url(group_key)?);
		let query = match body {
			Some(body) => query.with_body(body),
			None => query,
		};

		Ok(with_fields(query, fields))
	}

	fn group_url(&self, group_key: &str) -> Result<Url> {
		let group_key = require("group_key", group_key)?;

		self.descriptor.resource_url(["groups", group_key])
	}
}

/// Matches `local@domain.tld` where the local part and domain use word characters, dots, or
/// dashes and the final label is 2 to 6 letters or dots.
fn is_email(value: &str) -> bool {
	let word = |c: char| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-');
	let Some((local, domain)) = value.split_once('@') else {
		return false;
	};

	if local.is_empty() || !local.chars().all(word) || !domain.chars().all(word) {
		return false;
	}

	domain.char_indices().filter(|(_, c)| *c == '.').any(|(at, _)| {
		let tld = &domain[at + 1..];

		at > 0
			&& (2..=6).contains(&tld.len())
			&& tld.chars().all(|c| c.is_ascii_alphabetic() || c == '.')
	})
}
