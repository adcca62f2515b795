//! Org-unit resource queries and hierarchical find-or-create.

// crates.io
use oauth2::http::Method;
// self
use crate::{
	_prelude::*,
	directory::{DirectoryClient, body_of, params_of, require, with_fields},
	error::ConfigError,
	http::DirectoryHttpClient,
	provider::ProviderDescriptor,
	query::Query,
};

/// Scope of an org-unit listing.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum OrgUnitListType {
	/// Every descendant.
	All,
	/// Direct children only.
	Children,
	/// Every descendant plus the unit itself.
	AllIncludingParent,
}

/// Parameters of an org-unit listing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct OrgUnitListOptions {
	/// Unit whose descendants are listed.
	#[serde(skip_serializing_if = "Option::is_none")]
	pub org_unit_path: Option<String>,
	/// Listing scope.
	#[serde(rename = "type", skip_serializing_if = "Option::is_none")]
	pub list_type: Option<OrgUnitListType>,
}

/// Body of an org-unit insert.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewOrgUnit {
	/// Unit name, without slashes.
	pub name: String,
	/// Parent path, starting with `/`.
	pub parent_org_unit_path: String,
	/// Description.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub description: Option<String>,
	/// Whether the unit blocks policy inheritance.
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub block_inheritance: Option<bool>,
}
impl NewOrgUnit {
	/// Creates a unit named `name` under `parent_org_unit_path`.
	pub fn new(name: impl Into<String>, parent_org_unit_path: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			parent_org_unit_path: parent_org_unit_path.into(),
			..Default::default()
		}
	}
}

/// Result of [`OrgUnits::find_or_create`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct OrgUnitTrail {
	/// Full path of the deepest unit, e.g. `/Students/Springfield`; `/` for no levels.
	pub path: String,
	/// Every visited unit keyed by its full path.
	pub units: BTreeMap<String, Value>,
}

/// Builds org-unit queries and walks org-unit hierarchies.
pub struct OrgUnits<'a, C>
where
	C: DirectoryHttpClient,
{
	client: &'a DirectoryClient<C>,
}
impl<'a, C> OrgUnits<'a, C>
where
	C: DirectoryHttpClient,
{
	/// Builds queries (and runs find-or-create) through `client`.
	pub fn new(client: &'a DirectoryClient<C>) -> Self {
		Self { client }
	}

	/// `GET customer/{customer}/orgunits/{path}`.
	pub fn get(&self, customer: &str, org_unit_path: &str, fields: Option<&str>) -> Result<Query> {
		Ok(with_fields(Query::get(self.unit_url(customer, org_unit_path)?), fields))
	}

	/// `GET customer/{customer}/orgunits` with listing parameters.
	pub fn list(&self, customer: &str, options: &OrgUnitListOptions) -> Result<Query> {
		Ok(Query::get(self.collection_url(customer)?).with_params(params_of(options)?))
	}

	/// Lists the direct children of `org_unit_path`.
	pub fn children(&self, customer: &str, org_unit_path: &str) -> Result<Query> {
		let org_unit_path = require("org_unit_path", org_unit_path)?;

		self.list(
			customer,
			&OrgUnitListOptions {
				org_unit_path: Some(org_unit_path.into()),
				list_type: Some(OrgUnitListType::Children),
			},
		)
	}

	/// `POST customer/{customer}/orgunits`.
	pub fn insert(&self, customer: &str, unit: &NewOrgUnit, fields: Option<&str>) -> Result<Query> {
		require("name", &unit.name)?;
		require("parentOrgUnitPath", &unit.parent_org_unit_path)?;

		let query = Query::new(Method::POST, self.collection_url(customer)?);

		Ok(with_fields(query.with_body(body_of(unit)?), fields))
	}

	/// `PATCH customer/{customer}/orgunits/{path}`.
	pub fn patch(
		&self,
		customer: &str,
		org_unit_path: &str,
		body: Option<Value>,
		fields: Option<&str>,
	) -> Result<Query> {
		let query = Query::new(Method::PATCH, self.unit_url(customer, org_unit_path)?);
		let query = match body {
			Some(body) => query.with_body(body),
			None => query,
		};

		Ok(with_fields(query, fields))
	}

	/// `DELETE customer/{customer}/orgunits/{path}`.
	pub fn delete(&self, customer: &str, org_unit_path: &str) -> Result<Query> {
		Ok(Query::new(Method::DELETE, self.unit_url(customer, org_unit_path)?))
	}

	/// Ensures every level of a hierarchy exists, top down.
	///
	/// Each level is looked up by its full path and created under its parent when the lookup
	/// answers `404`. Concurrent calls for the same `(customer, full path)` share one lookup
	/// and at most one creation.
	pub async fn find_or_create<S>(&self, customer: &str, levels: &[S]) -> Result<OrgUnitTrail>
	where
		S: AsRef<str> + Sync,
	{
		self.find_or_create_cached(customer, levels, &mut BTreeMap::new()).await
	}

	/// [`find_or_create`](Self::find_or_create) backed by a caller-owned cache keyed by full
	/// path.
	///
	/// Levels already in `cache` are neither looked up nor created; every unit resolved over
	/// the network is added to it, so the cache can be carried across calls.
	pub async fn find_or_create_cached<S>(
		&self,
		customer: &str,
		levels: &[S],
		cache: &mut BTreeMap<String, Value>,
	) -> Result<OrgUnitTrail>
	where
		S: AsRef<str> + Sync,
	{
		let customer = require("customer", customer)?.to_owned();
		let levels = levels.iter().map(|level| level.as_ref().trim()).collect::<Vec<_>>();

		if let Some(level) = levels.iter().find(|level| level.is_empty() || level.contains('/')) {
			return Err(ConfigError::InvalidParameter {
				name: "levels",
				reason: format!("`{level}` is not a single org-unit name"),
			}
			.into());
		}

		let mut parent = String::from("/");
		let mut units = BTreeMap::new();

		for level in levels {
			let full_path =
				if parent == "/" { format!("/{level}") } else { format!("{parent}/{level}") };

			if let Some(unit) = cache.get(&full_path) {
				units.insert(full_path.clone(), unit.clone());

				parent = full_path;

				continue;
			}

			let lookup = self.get(&customer, &full_path, None)?;
			let create = self.insert(&customer, &NewOrgUnit::new(level, parent.as_str()), None)?;
			let authority = self.client.authority.clone();
			let unit = self
				.client
				.org_unit_flights
				.run((customer.clone(), full_path.clone()), move || async move {
					match authority.authorized_request(&lookup).await {
						Ok(found) => Ok(found.into_value()),
						Err(err) if err.is_not_found() =>
							Ok(authority.authorized_request(&create).await?.into_value()),
						Err(err) => Err(err),
					}
				})
				.await?;

			cache.insert(full_path.clone(), unit.clone());
			units.insert(full_path.clone(), unit);

			parent = full_path;
		}

		Ok(OrgUnitTrail { path: parent, units })
	}

	fn descriptor(&self) -> &ProviderDescriptor {
		&self.client.authority.descriptor
	}

	fn collection_url(&self, customer: &str) -> Result<Url> {
		let customer = require("customer", customer)?;

		self.descriptor().resource_url(["customer", customer, "orgunits"])
	}

	fn unit_url(&self, customer: &str, org_unit_path: &str) -> Result<Url> {
		let customer = require("customer", customer)?;
		let segments = org_unit_path.split('/').filter(|segment| !segment.is_empty());
		let mut segments = segments.peekable();

		if segments.peek().is_none() {
			return Err(ConfigError::MissingParameter { name: "org_unit_path" }.into());
		}

		let segments = ["customer", customer, "orgunits"].into_iter().chain(segments);

		self.descriptor().resource_url(segments)
	}
}
impl<C> Debug for OrgUnits<'_, C>
where
	C: DirectoryHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("OrgUnits").finish_non_exhaustive()
	}
}

#[cfg(test)]
mod tests {
	// crates.io
	use serde_json::json;
	// self
	use super::*;
	use crate::_preludet::*;

	const UNITS_PATH: &str = "/admin/directory/v1/customer/c1/orgunits";

	fn client() -> (DirectoryClient<ScriptedHttpClient>, ScriptedHttpClient) {
		let (authority, transport) = build_scripted_authority(Some("access-1"));

		(DirectoryClient::new(authority), transport)
	}

	fn unit(path: &str) -> ScriptedReply {
		ScriptedReply::json(200, json!({ "kind": "admin#directory#orgUnit", "orgUnitPath": path }))
	}

	fn not_found() -> ScriptedReply {
		ScriptedReply::json(
			404,
			json!({ "error": { "code": 404, "message": "Org unit not found" } }),
		)
	}

	#[test]
	fn hierarchical_paths_become_path_segments() {
		let (client, _) = client();
		let units = client.org_units();
		let get = units.get("c1", "/Students/School 1", Some("name")).expect("Get should build.");

		assert_eq!(get.url().path(), format!("{UNITS_PATH}/Students/School%201"));
		assert_eq!(get.param("fields").as_deref(), Some("name"));
		assert!(matches!(
			units.delete("c1", "/"),
			Err(Error::Config(ConfigError::MissingParameter { name: "org_unit_path" }))
		));
		assert!(matches!(
			units.get("", "/A", None),
			Err(Error::Config(ConfigError::MissingParameter { name: "customer" }))
		));
	}

	#[test]
	fn children_lists_with_type_parameter() {
		let (client, _) = client();
		let query = client.org_units().children("c1", "/Students").expect("Query should build.");

		assert_eq!(query.url().path(), UNITS_PATH);
		assert_eq!(query.param("orgUnitPath").as_deref(), Some("/Students"));
		assert_eq!(query.param("type").as_deref(), Some("children"));
	}

	#[tokio::test]
	async fn find_or_create_walks_levels_and_creates_missing_units() {
		let (client, transport) = client();

		transport
			.push(&format!("{UNITS_PATH}/Students"), unit("/Students"))
			.push(&format!("{UNITS_PATH}/Students/Springfield"), not_found())
			.push(UNITS_PATH, unit("/Students/Springfield"));

		let trail = client
			.org_units()
			.find_or_create("c1", &["Students", "Springfield"])
			.await
			.expect("Find-or-create should succeed.");

		assert_eq!(trail.path, "/Students/Springfield");
		assert_eq!(
			trail.units.keys().collect::<Vec<_>>(),
			["/Students", "/Students/Springfield"]
		);
		assert_eq!(trail.units["/Students/Springfield"]["orgUnitPath"], "/Students/Springfield");

		let create = transport
			.requests()
			.into_iter()
			.find(|request| request.method == "POST")
			.expect("Create request should be recorded.");

		assert_eq!(
			serde_json::from_str::<Value>(&create.body).expect("Create body should be JSON."),
			json!({ "name": "Springfield", "parentOrgUnitPath": "/Students" })
		);
	}

	#[tokio::test]
	async fn concurrent_find_or_create_creates_once() {
		let (client, transport) = client();

		transport
			.push(&format!("{UNITS_PATH}/Staff"), not_found())
			.push(UNITS_PATH, unit("/Staff"));

		let org_units = client.org_units();
		let (first, second) = tokio::join!(
			org_units.find_or_create("c1", &["Staff"]),
			org_units.find_or_create("c1", &["Staff"])
		);
		let first = first.expect("First caller should succeed.");
		let second = second.expect("Second caller should succeed.");

		assert_eq!(first, second);
		assert_eq!(transport.calls_to(UNITS_PATH), 1);
		assert_eq!(transport.calls_to(&format!("{UNITS_PATH}/Staff")), 1);
	}

	#[tokio::test]
	async fn lookup_failures_other_than_not_found_skip_creation() {
		let (client, transport) = client();

		transport
			.push(&format!("{UNITS_PATH}/Staff"), ScriptedReply::json(400, json!({ "error": {} })));

		let err = client
			.org_units()
			.find_or_create("c1", &["Staff"])
			.await
			.expect_err("Lookup failure should propagate.");

		assert_eq!(err.status(), Some(400));
		assert_eq!(transport.calls_to(UNITS_PATH), 0);
	}

	#[tokio::test]
	async fn invalid_levels_fail_before_any_request() {
		let (client, transport) = client();
		let err = client
			.org_units()
			.find_or_create("c1", &["Students", "a/b"])
			.await
			.expect_err("Nested level should fail.");

		assert!(matches!(err, Error::Config(ConfigError::InvalidParameter { name: "levels", .. })));
		assert!(transport.requests().is_empty());

		let trail = client
			.org_units()
			.find_or_create::<&str>("c1", &[])
			.await
			.expect("No levels should succeed.");

		assert_eq!(trail.path, "/");
		assert!(trail.units.is_empty());
	}

	#[tokio::test]
	async fn cached_levels_skip_lookup_and_creation() {
		let (client, transport) = client();

		transport
			.push(&format!("{UNITS_PATH}/Students"), unit("/Students"))
			.push(&format!("{UNITS_PATH}/Students/Springfield"), unit("/Students/Springfield"))
			.push(&format!("{UNITS_PATH}/Students/Shelbyville"), unit("/Students/Shelbyville"));

		let org_units = client.org_units();
		let mut cache = BTreeMap::new();

		org_units
			.find_or_create_cached("c1", &["Students", "Springfield"], &mut cache)
			.await
			.expect("First sync should succeed.");

		assert_eq!(cache.len(), 2);

		let trail = org_units
			.find_or_create_cached("c1", &["Students", "Shelbyville"], &mut cache)
			.await
			.expect("Second sync should succeed.");

		assert_eq!(trail.path, "/Students/Shelbyville");
		assert_eq!(trail.units["/Students"]["orgUnitPath"], "/Students");
		assert_eq!(transport.calls_to(&format!("{UNITS_PATH}/Students")), 1);
		assert_eq!(transport.calls_to(&format!("{UNITS_PATH}/Students/Shelbyville")), 1);
		assert_eq!(cache.len(), 3);
	}
}
