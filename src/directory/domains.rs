//! Domain resource queries.

// crates.io
use oauth2::http::Method;
// self
use crate::{
	_prelude::*,
	directory::{body_of, require, with_fields},
	provider::ProviderDescriptor,
	query::Query,
};

/// Body of a domain insert.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewDomain {
	/// Domain name to register.
	pub domain_name: String,
	/// Further domain properties sent as-is.
	#[serde(flatten)]
	pub extra: Map<String, Value>,
}
impl NewDomain {
	/// Creates a domain body for `domain_name`.
	pub fn new(domain_name: impl Into<String>) -> Self {
		Self { domain_name: domain_name.into(), extra: Map::new() }
	}
}

/// Builds domain resource queries.
#[derive(Clone, Copy, Debug)]
pub struct Domains<'a> {
	descriptor: &'a ProviderDescriptor,
}
impl<'a> Domains<'a> {
	/// Builds queries against `descriptor`'s API base.
	pub fn new(descriptor: &'a ProviderDescriptor) -> Self {
		Self { descriptor }
	}

	/// `GET customer/{customer}/domains/{domain_name}`.
	pub fn get(&self, customer: &str, domain_name: &str, fields: Option<&str>) -> Result<Query> {
		Ok(with_fields(Query::get(self.domain_url(customer, domain_name)?), fields))
	}

	/// `GET customer/{customer}/domains` with arbitrary listing parameters.
	pub fn list<I, K, V>(&self, customer: &str, params: I) -> Result<Query>
	where
		I: IntoIterator<Item = (K, V)>,
		K: AsRef<str>,
		V: AsRef<str>,
	{
		Ok(Query::get(self.collection_url(customer)?).with_params(params))
	}

	/// `POST customer/{customer}/domains`.
	pub fn insert(
		&self,
		customer: &str,
		domain: &NewDomain,
		fields: Option<&str>,
	) -> Result<Query> {
		require("domain_name", &domain.domain_name)?;

		let query = Query::new(Method::POST, self.collection_url(customer)?);

		Ok(with_fields(query.with_body(body_of(domain)?), fields))
	}

	/// `DELETE customer/{customer}/domains/{domain_name}`.
	pub fn delete(&self, customer: &str, domain_name: &str) -> Result<Query> {
		Ok(Query::new(Method::DELETE, self.domain_url(customer, domain_name)?))
	}

	fn collection_url(&self, customer: &str) -> Result<Url> {
		let customer = require("customer", customer)?;

		self.descriptor.resource_url(["customer", customer, "domains"])
	}

	fn domain_url(&self, customer: &str, domain_name: &str) -> Result<Url> {
		let customer = require("customer", customer)?;
		let domain_name = require("domain_name", domain_name)?;

		self.descriptor.resource_url(["customer", customer, "domains", domain_name])
	}
}
