//! Pull-based pagination over one [`Query`].
//!
//! A [`QueryStream`] fetches one page per pull cycle, yields the page's items in received
//! order, and derives the next page's query from the continuation token. Nothing is
//! fetched until the consumer polls, and a pull while a page is in flight keeps polling that
//! same fetch.

// std
use std::{
	collections::VecDeque,
	task::{Context, Poll, ready},
};
// crates.io
use futures::{Stream, future::BoxFuture, stream::FusedStream};
// self
use crate::{
	_prelude::*,
	authority::TokenAuthority,
	http::DirectoryHttpClient,
	normalize::{Entry, Normalized},
	provider::ProviderQuirks,
	query::Query,
};

/// One streamed item.
#[derive(Clone, Debug, PartialEq)]
pub enum StreamItem {
	/// Decoded legacy entry.
	Entry(Entry),
	/// Element of a `kind`-tagged collection, or a single resource.
	Resource(Value),
}
impl StreamItem {
	/// Renders the item as JSON.
	pub fn into_value(self) -> Value {
		match self {
			Self::Entry(entry) => entry.into_value(),
			Self::Resource(value) => value,
		}
	}
}

enum State {
	Idle,
	Fetching(BoxFuture<'static, Result<Normalized>>),
	Exhausted,
	Failed,
}

/// Lazy, auto-paginating stream of [`StreamItem`]s.
///
/// The first error ends the stream after being yielded once. Responses without items
/// (`204`, untyped bodies) fail with [`Error::Unstreamable`].
pub struct QueryStream<C>
where
	C: DirectoryHttpClient,
{
	authority: TokenAuthority<C>,
	query: Query,
	buffer: VecDeque<StreamItem>,
	state: State,
	pages: usize,
}
impl<C> QueryStream<C>
where
	C: DirectoryHttpClient,
{
	/// Creates an idle stream; the first page is fetched on the first poll.
	pub fn new(authority: TokenAuthority<C>, query: Query) -> Self {
		Self { authority, query, buffer: VecDeque::new(), state: State::Idle, pages: 0 }
	}

	/// Query for the page that will be fetched next (or was fetched last, once exhausted).
	pub fn query(&self) -> &Query {
		&self.query
	}

	/// Number of pages received so far.
	pub fn pages(&self) -> usize {
		self.pages
	}

	fn start_fetch(&mut self) {
		let authority = self.authority.clone();
		let query = self.query.clone();

		self.state =
			State::Fetching(Box::pin(async move { authority.authorized_request(&query).await }));
	}
}
impl<C> Stream for QueryStream<C>
where
	C: DirectoryHttpClient,
{
	type Item = Result<StreamItem>;

	fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
		let this = self.get_mut();

		loop {
			if let Some(item) = this.buffer.pop_front() {
				return Poll::Ready(Some(Ok(item)));
			}

			let fetch = match &mut this.state {
				State::Exhausted | State::Failed => return Poll::Ready(None),
				State::Idle => {
					this.start_fetch();

					continue;
				},
				State::Fetching(fetch) => fetch,
			};
			let result = ready!(fetch.as_mut().poll(cx));
			let quirks = &this.authority.descriptor.quirks;
			let (items, next) = match result.and_then(|normalized| page(normalized, quirks)) {
				Ok(page) => page,
				Err(err) => {
					this.state = State::Failed;

					return Poll::Ready(Some(Err(err)));
				},
			};

			this.pages += 1;
			this.buffer.extend(items);

			let Some(token) = next else {
				this.state = State::Exhausted;

				continue;
			};

			this.query = this.query.with_page_token(&quirks.page_token_param, &token);
			this.state = State::Idle;

			if this.buffer.is_empty() {
				cx.waker().wake_by_ref();

				return Poll::Pending;
			}
		}
	}
}
impl<C> FusedStream for QueryStream<C>
where
	C: DirectoryHttpClient,
{
	fn is_terminated(&self) -> bool {
		self.buffer.is_empty() && matches!(self.state, State::Exhausted | State::Failed)
	}
}
impl<C> Debug for QueryStream<C>
where
	C: DirectoryHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		let state = match self.state {
			State::Idle => "idle",
			State::Fetching(_) => "fetching",
			State::Exhausted => "exhausted",
			State::Failed => "failed",
		};

		f.debug_struct("QueryStream")
			.field("query", &self.query)
			.field("state", &state)
			.field("buffered", &self.buffer.len())
			.field("pages", &self.pages)
			.finish()
	}
}

/// Splits a normalized page into items and the continuation token.
fn page(
	normalized: Normalized,
	quirks: &ProviderQuirks,
) -> Result<(Vec<StreamItem>, Option<String>)> {
	let next = normalized.next_page_token(quirks).map(String::from);
	let items = match normalized {
		Normalized::NoContent => return Err(Error::Unstreamable { kind: "no content".into() }),
		Normalized::Feed(feed) => feed.entries.into_iter().map(StreamItem::Entry).collect(),
		Normalized::Entry(entry) => vec![StreamItem::Entry(entry)],
		Normalized::Resource(resource) => {
			let suffix = resource.kind_suffix().to_owned();

			collection_items(&suffix, resource.body)
		},
		Normalized::Passthrough(body) => {
			let Some(kind) = body.get("kind").and_then(Value::as_str).map(String::from) else {
				return Err(Error::Unstreamable { kind: "untyped response".into() });
			};
			let suffix = kind.rsplit('#').next().unwrap_or(&kind).to_owned();

			collection_items(&suffix, body)
		},
	};

	Ok((items, next))
}

/// Extracts the items of a `kind`-tagged body.
///
/// A collection keeps its items under the kind's name (`users`, or `domains` for
/// `domainsList`). Plural kinds without an `id` that store items elsewhere
/// (`orgUnits` → `organizationUnits`) fall back to the first array field; an empty
/// collection omits the field entirely. Anything else is a single resource.
fn collection_items(suffix: &str, body: Value) -> Vec<StreamItem> {
	let field = suffix.strip_suffix("List").unwrap_or(suffix);
	let is_collection =
		suffix.ends_with("List") || (suffix.ends_with('s') && body.get("id").is_none());
	let Value::Object(mut map) = body else {
		return vec![StreamItem::Resource(body)];
	};
	let has_named_array = map.get(field).is_some_and(Value::is_array);

	if has_named_array || is_collection {
		let key = if has_named_array {
			Some(field.to_owned())
		} else {
			map.iter().find(|(_, value)| value.is_array()).map(|(key, _)| key.clone())
		};

		return match key.and_then(|key| map.remove(&key)) {
			Some(Value::Array(items)) => items.into_iter().map(StreamItem::Resource).collect(),
			_ => Vec::new(),
		};
	}

	vec![StreamItem::Resource(Value::Object(map))]
}
