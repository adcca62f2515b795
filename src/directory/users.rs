//! User resource queries.

// crates.io
use oauth2::http::Method;
use sha1::{Digest, Sha1};
// self
use crate::{
	_prelude::*,
	directory::{body_of, params_of, require, with_fields},
	error::ConfigError,
	provider::ProviderDescriptor,
	query::Query,
};

/// Name of a new user.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserName {
	/// Given name.
	pub given_name: String,
	/// Family name.
	pub family_name: String,
}

/// Body of a user insert.
///
/// The plaintext password is hashed with SHA-1 before it leaves the process.
#[derive(Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewUser {
	/// Primary email address.
	pub primary_email: String,
	/// Given and family name.
	pub name: UserName,
	/// Plaintext password.
	pub password: String,
	/// Any other user fields, sent verbatim.
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}
impl NewUser {
	/// Creates a user body with the required fields.
	pub fn new(
		primary_email: impl Into<String>,
		given_name: impl Into<String>,
		family_name: impl Into<String>,
		password: impl Into<String>,
	) -> Self {
		Self {
			primary_email: primary_email.into(),
			name: UserName { given_name: given_name.into(), family_name: family_name.into() },
			password: password.into(),
			extra: Map::new(),
		}
	}

	/// Names the first missing required field.
	pub fn validate(&self) -> Result<(), ConfigError> {
		require("primaryEmail", &self.primary_email)?;
		require("name.givenName", &self.name.given_name)?;
		require("name.familyName", &self.name.family_name)?;

		if self.password.is_empty() {
			return Err(ConfigError::MissingParameter { name: "password" });
		}

		Ok(())
	}

	fn to_body(&self) -> Result<Value, ConfigError> {
		let mut body = body_of(self)?;

		body["password"] = Value::String(format!("{:x}", Sha1::digest(self.password.as_bytes())));
		body["hashFunction"] = Value::String("SHA-1".into());

		Ok(body)
	}
}
impl Debug for NewUser {
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("NewUser")
			.field("primary_email", &self.primary_email)
			.field("name", &self.name)
			.field("password", &"<redacted>")
			.field("extra", &self.extra)
			.finish()
	}
}

/// Parameters of a user listing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UserListOptions {
	/// Customer ID, or `my_customer`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub customer: Option<String>,
	/// Domain to list users from.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub domain: Option<String>,
	/// Page size.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub max_results: Option<u32>,
	/// Continuation token of the page to fetch.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub page_token: Option<String>,
	/// Search query.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub query: Option<String>,
	/// Sort field.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub order_by: Option<String>,
	/// `ASCENDING` or `DESCENDING`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub sort_order: Option<String>,
	/// List deleted users instead.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub show_deleted: Option<bool>,
	/// Partial-response selector; `nextPageToken` is added when missing.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub fields: Option<String>,
	/// `basic`, `custom`, or `full`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub projection: Option<String>,
	/// `admin_view` or `domain_public`.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub view_type: Option<String>,
	/// Custom schemas returned with the `custom` projection.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub custom_field_mask: Option<String>,
	/// Event type for watch listings.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub event: Option<String>,
	/// Further parameters forwarded as-is.
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}

/// Builds user resource queries.
#[derive(Clone, Copy, Debug)]
pub struct Users<'a> {
	descriptor: &'a ProviderDescriptor,
}
impl<'a> Users<'a> {
	/// Builds queries against `descriptor`'s API base.
	pub fn new(descriptor: &'a ProviderDescriptor) -> Self {
		Self { descriptor }
	}

	/// `GET users/{user_key}`.
	pub fn get(&self, user_key: &str) -> Result<Query> {
		Ok(Query::get(self.user_url(user_key)?))
	}

	/// `DELETE users/{user_key}`.
	pub fn delete(&self, user_key: &str) -> Result<Query> {
		Ok(Query::new(Method::DELETE, self.user_url(user_key)?))
	}

	/// `POST users` with a hashed password.
	pub fn insert(&self, user: &NewUser, fields: Option<&str>) -> Result<Query> {
		user.validate()?;

		let url = self.descriptor.resource_url(["users"])?;

		Ok(with_fields(Query::new(Method::POST, url).with_body(user.to_body()?), fields))
	}

	/// `GET users` with listing parameters.
	pub fn list(&self, options: &UserListOptions) -> Result<Query> {
		let mut options = options.clone();
		let fields = options.fields.as_mut().filter(|fields| !fields.contains("nextPageToken"));

		if let Some(fields) = fields {
			*fields = format!("nextPageToken,{fields}");
		}

		let url = self.descriptor.resource_url(["users"])?;

		Ok(Query::get(url).with_params(params_of(&options)?))
	}

	/// `PATCH users/{user_key}`.
	pub fn patch(
		&self,
		user_key: &str,
		body: Option<Value>,
		fields: Option<&str>,
	) -> Result<Query> {
		self.write(Method::PATCH, user_key, body, fields)
	}

	/// `PUT users/{user_key}`.
	pub fn update(
		&self,
		user_key: &str,
		body: Option<Value>,
		fields: Option<&str>,
	) -> Result<Query> {
		self.write(Method::PUT, user_key, body, fields)
	}

	fn write(
		&self,
		method: Method,
		user_key: &str,
		body: Option<Value>,
		fields: Option<&str>,
	) -> Result<Query> {
		let query = Query::new(method, self.user_url(user_key)?);
		let query = match body {
			Some(body) => query.with_body(body),
			None => query,
		};

		Ok(with_fields(query, fields))
	}

	fn user_url(&self, user_key: &str) -> Result<Url> {
		let user_key = require("user_key", user_key)?;

		self.descriptor.resource_url(["users", user_key])
	}
}
