//! Immutable request descriptions and the auto-paginating stream built on them.

pub mod stream;

pub use stream::*;

// std
use std::str::FromStr;
// crates.io
use oauth2::http::Method;
// self
use crate::{_prelude::*, error::ConfigError, http::OutboundRequest};

/// One directory API call: method, target URL, and optional JSON body.
///
/// Queries are immutable; pagination derives a new query per page with
/// [`Query::with_page_token`].
#[derive(Clone, Debug, PartialEq)]
pub struct Query {
	method: Method,
	url: Url,
	body: Option<Value>,
	expects_json: bool,
}
impl Query {
	/// Creates a query expecting a JSON response.
	pub fn new(method: Method, url: Url) -> Self {
		Self { method, url, body: None, expects_json: true }
	}

	/// Shorthand for a `GET` query.
	pub fn get(url: Url) -> Self {
		Self::new(Method::GET, url)
	}

	/// Parses a method name and URL into a query.
	///
	/// The method is case-insensitive; an empty method means `GET`.
	pub fn build(method: &str, url: &str, body: Option<Value>) -> Result<Self, ConfigError> {
		let method = if method.trim().is_empty() {
			Method::GET
		} else {
			Method::from_str(&method.trim().to_ascii_uppercase()).map_err(|e| {
				ConfigError::InvalidParameter { name: "method", reason: e.to_string() }
			})?
		};

		if url.trim().is_empty() {
			return Err(ConfigError::MissingParameter { name: "url" });
		}

		let url = Url::parse(url.trim())
			.map_err(|e| ConfigError::InvalidParameter { name: "url", reason: e.to_string() })?;
		let query = Self::new(method, url);

		Ok(match body {
			Some(body) => query.with_body(body),
			None => query,
		})
	}

	/// Attaches a JSON body.
	pub fn with_body(mut self, body: Value) -> Self {
		self.body = Some(body);

		self
	}

	/// Appends one query parameter.
	pub fn with_param(mut self, name: &str, value: &str) -> Self {
		self.url.query_pairs_mut().append_pair(name, value);

		self
	}

	/// Appends every `(name, value)` pair.
	pub fn with_params<I, K, V>(mut self, params: I) -> Self
	where
		I: IntoIterator<Item = (K, V)>,
		K: AsRef<str>,
		V: AsRef<str>,
	{
		let mut pairs = params.into_iter().peekable();

		if pairs.peek().is_some() {
			self.url.query_pairs_mut().extend_pairs(pairs);
		}

		self
	}

	/// Sets whether a JSON response is expected.
	pub fn expecting_json(mut self, expects_json: bool) -> Self {
		self.expects_json = expects_json;

		self
	}

	/// HTTP method.
	pub fn method(&self) -> &Method {
		&self.method
	}

	/// Target URL.
	pub fn url(&self) -> &Url {
		&self.url
	}

	/// JSON body, if any.
	pub fn body(&self) -> Option<&Value> {
		self.body.as_ref()
	}

	/// Whether a JSON response is expected.
	pub fn expects_json(&self) -> bool {
		self.expects_json
	}

	/// Returns the first value of a query parameter.
	pub fn param(&self, name: &str) -> Option<String> {
		self.url.query_pairs().find(|(key, _)| key == name).map(|(_, value)| value.into_owned())
	}

	/// Derives the query for the next page.
	///
	/// The first existing `param` is replaced in place and any duplicates are dropped;
	/// otherwise the parameter is appended. Every other parameter keeps its position.
	pub fn with_page_token(&self, param: &str, token: &str) -> Self {
		let mut next = self.clone();
		let mut replaced = false;
		let pairs = self
			.url
			.query_pairs()
			.filter_map(|(key, value)| {
				if key != param {
					return Some((key.into_owned(), value.into_owned()));
				}
				if replaced {
					return None;
				}

				replaced = true;

				Some((key.into_owned(), token.to_owned()))
			})
			.collect::<Vec<_>>();

		{
			let mut serializer = next.url.query_pairs_mut();

			serializer.clear().extend_pairs(pairs);

			if !replaced {
				serializer.append_pair(param, token);
			}
		}

		next
	}

	/// Request target as it appears on an HTTP/1.1 request line: path plus query.
	pub fn request_target(&self) -> String {
		match self.url.query() {
			Some(query) if !query.is_empty() => format!("{}?{query}", self.url.path()),
			_ => self.url.path().to_owned(),
		}
	}

	pub(crate) fn to_outbound(&self) -> Result<OutboundRequest, ConfigError> {
		let request = OutboundRequest::new(self.method.clone(), self.url.clone())
			.accept_json(self.expects_json);

		match &self.body {
			Some(body) if !body.is_null() => request.json(body),
			_ => Ok(request),
		}
	}
}
