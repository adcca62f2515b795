//! Response normalization for the directory API's feed, entry, and `kind` conventions.
//!
//! [`normalize`] turns a buffered [`RawResponse`] into one [`Normalized`] shape. Error statuses
//! become [`Error::Remote`]; successful bodies are unwrapped from the legacy feed/entry
//! envelopes or recognized by their resource `kind`. Successful bodies that match no known
//! shape are kept as [`Normalized::Passthrough`] so callers can decide whether to accept them.

// self
use crate::{
	_prelude::*,
	http::RawResponse,
	obs::{self, CallKind},
	provider::ProviderQuirks,
};

/// Uniform view of a successful response.
#[derive(Clone, Debug, PartialEq)]
pub enum Normalized {
	/// `204 No Content`.
	NoContent,
	/// Legacy feed envelope holding decoded entries.
	Feed(Feed),
	/// Legacy single-entry envelope.
	Entry(Entry),
	/// Directory resource tagged with a recognized `kind`.
	Resource(Resource),
	/// Successful body that matched no known shape.
	Passthrough(Value),
}
impl Normalized {
	/// Returns the continuation token carried by the response, if any.
	pub fn next_page_token(&self, quirks: &ProviderQuirks) -> Option<&str> {
		match self {
			Self::Feed(feed) => feed.next_page_token.as_deref(),
			Self::Resource(resource) => resource.field_str(&quirks.next_page_token_field),
			Self::Passthrough(value) => value.get(&quirks.next_page_token_field)?.as_str(),
			Self::NoContent | Self::Entry(_) => None,
		}
	}

	/// Renders the normalized shape back into JSON.
	pub fn into_value(self) -> Value {
		match self {
			Self::NoContent => Value::Null,
			Self::Feed(feed) => feed.into_value(),
			Self::Entry(entry) => entry.into_value(),
			Self::Resource(resource) => resource.body,
			Self::Passthrough(value) => value,
		}
	}
}

/// Decoded feed envelope.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Feed {
	/// Feed identifier.
	pub id: Option<Value>,
	/// Feed links.
	pub links: Vec<Value>,
	/// Decoded entries in received order.
	pub entries: Vec<Entry>,
	/// Continuation token.
	pub next_page_token: Option<String>,
}
impl Feed {
	fn decode(feed: &Value, body: &Value, quirks: &ProviderQuirks) -> Self {
		let entries = match feed.get("entry") {
			Some(Value::Array(entries)) =>
				entries.iter().map(|entry| Entry::decode(entry, quirks)).collect(),
			Some(entry @ Value::Object(_)) => vec![Entry::decode(entry, quirks)],
			_ => Vec::new(),
		};
		let next_page_token = [feed, body]
			.into_iter()
			.find_map(|scope| scope.get(&quirks.next_page_token_field)?.as_str())
			.map(String::from);

		Self { id: feed.get("id").cloned(), links: links(feed), entries, next_page_token }
	}

	fn into_value(self) -> Value {
		let mut map = Map::new();

		map.insert("id".into(), self.id.unwrap_or(Value::Null));
		map.insert("link".into(), Value::Array(self.links));
		map.insert("data".into(), self.entries.into_iter().map(Entry::into_value).collect());

		if let Some(token) = self.next_page_token {
			map.insert("nextPageToken".into(), Value::String(token));
		}

		Value::Object(map)
	}
}

/// Decoded legacy entry.
///
/// Extension-namespaced fields (`apps$<name>`) are promoted into `properties` under `<name>`,
/// and the `apps$property` list is flattened into `name → value` pairs.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Entry {
	/// Entry identifier (`id.$t`).
	pub id: Option<String>,
	/// Last update timestamp (`updated.$t`).
	pub updated: Option<String>,
	/// Entry links.
	pub links: Vec<Value>,
	/// Entry title (`title.$t`).
	pub title: Option<String>,
	/// Feed link (`gd$feedLink`).
	pub feed_link: Option<Value>,
	/// Participant reference (`gd$who`).
	pub who: Option<Value>,
	/// Promoted extension fields.
	pub properties: Map<String, Value>,
}
impl Entry {
	/// Decodes one raw entry object.
	pub fn decode(entry: &Value, quirks: &ProviderQuirks) -> Self {
		let mut properties = Map::new();

		if let Some(object) = entry.as_object() {
			for (key, value) in object {
				let Some(name) = key.strip_prefix(quirks.extension_prefix.as_str()) else {
					continue;
				};

				if name == quirks.property_list_field {
					flatten_properties(value, &mut properties);
				} else {
					properties.insert(name.to_owned(), value.clone());
				}
			}
		}

		Self {
			id: text(entry.get("id")),
			updated: text(entry.get("updated")),
			links: links(entry),
			title: text(entry.get("title")),
			feed_link: entry.get("gd$feedLink").cloned(),
			who: entry.get("gd$who").cloned(),
			properties,
		}
	}

	/// Returns a promoted property by name.
	pub fn property(&self, name: &str) -> Option<&Value> {
		self.properties.get(name)
	}

	/// Renders the entry as a flat JSON object.
	pub fn into_value(self) -> Value {
		let mut map = Map::new();
		let optional = |value: Option<String>| value.map(Value::String).unwrap_or(Value::Null);

		map.insert("id".into(), optional(self.id));
		map.insert("updated".into(), optional(self.updated));
		map.insert("link".into(), Value::Array(self.links));

		if let Some(title) = self.title {
			map.insert("title".into(), Value::String(title));
		}
		if let Some(feed_link) = self.feed_link {
			map.insert("feedLink".into(), feed_link);
		}
		if let Some(who) = self.who {
			map.insert("who".into(), who);
		}

		map.extend(self.properties);

		Value::Object(map)
	}
}

/// Directory resource recognized by its `kind`.
#[derive(Clone, Debug, PartialEq)]
pub struct Resource {
	/// Resource kind, e.g. `admin#directory#users`.
	pub kind: String,
	/// Full response body.
	pub body: Value,
}
impl Resource {
	/// Returns the kind segment after the last `#`, e.g. `users`.
	pub fn kind_suffix(&self) -> &str {
		self.kind.rsplit('#').next().unwrap_or(&self.kind)
	}

	fn field_str(&self, name: &str) -> Option<&str> {
		self.body.get(name)?.as_str()
	}
}

/// Interprets a buffered response.
pub fn normalize(response: &RawResponse, quirks: &ProviderQuirks) -> Result<Normalized> {
	if response.status == 204 {
		return Ok(Normalized::NoContent);
	}

	let body = response.json_body();

	if response.status >= 400 {
		return Err(Error::Remote { status: response.status, body });
	}
	if let Some(feed) = body.get("feed").filter(|feed| !feed.is_null()) {
		return Ok(Normalized::Feed(Feed::decode(feed, &body, quirks)));
	}
	if let Some(entry) = body.get("entry").filter(|entry| is_truthy(entry)) {
		return Ok(Normalized::Entry(Entry::decode(entry, quirks)));
	}

	let kind = body
		.get("kind")
		.and_then(Value::as_str)
		.filter(|kind| kind.contains(quirks.resource_kind_prefix.as_str()))
		.map(String::from);

	if let Some(kind) = kind {
		return Ok(Normalized::Resource(Resource { kind, body }));
	}
	if warns_on_passthrough(response) {
		obs::warn_event(
			CallKind::Request,
			&format!("Unhandled response body with status {}.", response.status),
		);
	}

	Ok(Normalized::Passthrough(body))
}

// Unrecognized 2xx bodies pass through silently; other statuses are unexpected here.
fn warns_on_passthrough(response: &RawResponse) -> bool {
	!response.is_success()
}

fn text(value: Option<&Value>) -> Option<String> {
	match value? {
		Value::String(text) => Some(text.clone()),
		Value::Object(object) => object.get("$t").and_then(Value::as_str).map(String::from),
		_ => None,
	}
}

fn links(value: &Value) -> Vec<Value> {
	match value.get("link") {
		Some(Value::Array(links)) => links.clone(),
		Some(Value::Null) | None => Vec::new(),
		Some(link) => vec![link.clone()],
	}
}

fn flatten_properties(list: &Value, properties: &mut Map<String, Value>) {
	let items = match list {
		Value::Array(items) => items.as_slice(),
		single @ Value::Object(_) => std::slice::from_ref(single),
		_ => return,
	};

	for item in items {
		if let Some(name) = item.get("name").and_then(Value::as_str) {
			properties.insert(name.to_owned(), item.get("value").cloned().unwrap_or(Value::Null));
		}
	}
}

fn is_truthy(value: &Value) -> bool {
	match value {
		Value::Null => false,
		Value::Bool(flag) => *flag,
		Value::String(text) => !text.is_empty(),
		Value::Number(number) => number.as_f64().is_some_and(|n| n != 0.0),
		Value::Array(_) | Value::Object(_) => true,
	}
}
