//! High-level client: query construction, single execution, streaming, batching, and the
//! typed provisioning builders.

pub mod domains;
pub mod groups;
pub mod org_units;
pub mod users;

pub use domains::*;
pub use groups::*;
pub use org_units::*;
pub use users::*;

// self
use crate::{
	_prelude::*,
	authority::TokenAuthority,
	batch::{BatchExecutor, BatchResponse},
	error::ConfigError,
	http::DirectoryHttpClient,
	normalize::Normalized,
	query::{Query, QueryStream},
	retry::RetryPolicy,
	singleflight::SingleFlight,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

#[cfg(feature = "reqwest")]
/// Client specialized for the crate's default reqwest transport.
pub type ReqwestDirectoryClient = DirectoryClient<ReqwestHttpClient>;

/// Entry point for directory calls.
///
/// Clones share the authority (credentials, refresh guard, cancellation) and the org-unit
/// coalescing registry.
pub struct DirectoryClient<C>
where
	C: DirectoryHttpClient,
{
	authority: TokenAuthority<C>,
	batch: BatchExecutor<C>,
	org_unit_flights: SingleFlight<(String, String), Value>,
}
impl<C> DirectoryClient<C>
where
	C: DirectoryHttpClient,
{
	/// Wraps an authority; batches use [`RetryPolicy::batch`].
	pub fn new(authority: TokenAuthority<C>) -> Self {
		Self {
			batch: BatchExecutor::new(authority.clone()),
			authority,
			org_unit_flights: SingleFlight::new(),
		}
	}

	/// Replaces the policy applied to outer batch requests.
	pub fn with_batch_retry_policy(mut self, policy: RetryPolicy) -> Self {
		self.batch = self.batch.with_retry_policy(policy);

		self
	}

	/// Underlying token authority.
	pub fn authority(&self) -> &TokenAuthority<C> {
		&self.authority
	}

	/// Parses a method name, absolute URL, and optional JSON body into a [`Query`].
	pub fn build_query(&self, method: &str, url: &str, body: Option<Value>) -> Result<Query> {
		Ok(Query::build(method, url, body)?)
	}

	/// Executes one query through the authority.
	pub async fn execute_query(&self, query: &Query) -> Result<Normalized> {
		self.authority.authorized_request(query).await
	}

	/// Streams every item of `query`, following continuation tokens.
	pub fn stream_query(&self, query: Query) -> QueryStream<C> {
		QueryStream::new(self.authority.clone(), query)
	}

	/// Executes `queries` as one multipart batch.
	pub async fn execute_batch(&self, queries: &[Query]) -> Result<Vec<Result<BatchResponse>>> {
		self.batch.execute(queries).await
	}

	/// User query builders.
	pub fn users(&self) -> Users<'_> {
		Users::new(&self.authority.descriptor)
	}

	/// Group query builders.
	pub fn groups(&self) -> Groups<'_> {
		Groups::new(&self.authority.descriptor)
	}

	/// Org-unit query builders and find-or-create.
	pub fn org_units(&self) -> OrgUnits<'_, C> {
		OrgUnits::new(self)
	}

	/// Domain query builders.
	pub fn domains(&self) -> Domains<'_> {
		Domains::new(&self.authority.descriptor)
	}
}
impl<C> Clone for DirectoryClient<C>
where
	C: DirectoryHttpClient,
{
	fn clone(&self) -> Self {
		Self {
			authority: self.authority.clone(),
			batch: self.batch.clone(),
			org_unit_flights: self.org_unit_flights.clone(),
		}
	}
}
impl<C> Debug for DirectoryClient<C>
where
	C: DirectoryHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("DirectoryClient")
			.field("authority", &self.authority)
			.field("batch", &self.batch)
			.field("org_unit_flights", &self.org_unit_flights)
			.finish()
	}
}

/// Rejects blank identifiers.
fn require<'a>(name: &'static str, value: &'a str) -> Result<&'a str, ConfigError> {
	let value = value.trim();

	if value.is_empty() {
		return Err(ConfigError::MissingParameter { name });
	}

	Ok(value)
}

/// Appends a partial-response `fields` selector when one is given.
fn with_fields(query: Query, fields: Option<&str>) -> Query {
	match fields.map(str::trim).filter(|fields| !fields.is_empty()) {
		Some(fields) => query.with_param("fields", fields),
		None => query,
	}
}

/// Flattens a serializable options struct into query parameters, in field-name order.
fn params_of<T>(options: &T) -> Result<Vec<(String, String)>, ConfigError>
where
	T: Serialize,
{
	let Value::Object(map) = serde_json::to_value(options)? else {
		return Ok(Vec::new());
	};

	Ok(map
		.into_iter()
		.filter_map(|(name, value)| match value {
			Value::Null => None,
			Value::String(value) => Some((name, value)),
			other => Some((name, other.to_string())),
		})
		.collect())
}

/// Serializes a typed request body.
fn body_of<T>(body: &T) -> Result<Value, ConfigError>
where
	T: Serialize,
{
	Ok(serde_json::to_value(body)?)
}

#[cfg(test)]
mod tests {
	// crates.io
	use futures::TryStreamExt;
	use serde_json::json;
	// self
	use super::*;
	use crate::_preludet::*;

	fn client() -> (DirectoryClient<ScriptedHttpClient>, ScriptedHttpClient) {
		let (authority, transport) = build_scripted_authority(Some("access-1"));

		(DirectoryClient::new(authority), transport)
	}

	#[tokio::test]
	async fn build_and_execute_query() {
		let (client, transport) = client();

		transport.push(
			"/admin/directory/v1/users/a",
			ScriptedReply::json(200, json!({ "kind": "admin#directory#user", "id": "a" })),
		);

		let query = client
			.build_query("get", "https://directory.test/admin/directory/v1/users/a", None)
			.expect("Query should build.");
		let normalized = client.execute_query(&query).await.expect("Query should succeed.");

		assert_eq!(normalized.into_value()["id"], "a");
		assert!(matches!(
			client.build_query("get", "", None),
			Err(Error::Config(ConfigError::MissingParameter { name: "url" }))
		));
	}

	#[tokio::test]
	async fn stream_and_batch_share_the_authority() {
		let (client, transport) = client();

		transport
			.push(
				"/admin/directory/v1/groups",
				ScriptedReply::json(
					200,
					json!({ "kind": "admin#directory#groups", "groups": [{ "id": "g1" }] }),
				),
			)
			.push("/oauth2/v1/tokeninfo", ScriptedReply::json(200, json!({})));

		let query = client
			.groups()
			.list(&GroupListOptions { customer: Some("c1".into()), ..Default::default() })
			.expect("Query should build.");
		let items: Vec<_> =
			client.stream_query(query).try_collect().await.expect("Stream should succeed.");

		assert_eq!(items.len(), 1);
		assert!(client.execute_batch(&[]).await.expect("Empty batch should succeed.").is_empty());
		assert_eq!(transport.calls_to("/batch/admin/directory_v1"), 0);
	}

	#[test]
	fn params_skip_nulls_and_render_scalars() {
		#[derive(Serialize)]
		#[serde(rename_all = "camelCase")]
		struct Options {
			max_results: Option<u32>,
			show_deleted: Option<bool>,
			page_token: Option<String>,
		}

		let params = params_of(&Options {
			max_results: Some(5),
			show_deleted: Some(true),
			page_token: None,
		})
		.expect("Options should serialize.");

		let expected = [("maxResults", "5"), ("showDeleted", "true")]
			.map(|(name, value)| (name.to_owned(), value.to_owned()));

		assert_eq!(params, expected);
	}
}
