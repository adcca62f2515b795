//! Transport primitives for directory API calls.
//!
//! The module exposes [`DirectoryHttpClient`] alongside [`ResponseMetadata`] and
//! [`ResponseMetadataSlot`] so downstream crates can integrate custom HTTP clients
//! without losing the client's retry hints. Implementations call
//! [`ResponseMetadataSlot::take`] before dispatching a request and
//! [`ResponseMetadataSlot::store`] once an HTTP status or retry hint is known.

// std
use std::ops::Deref;
// crates.io
use oauth2::{
	AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
	http::{
		HeaderValue, Method, Request,
		header::{ACCEPT, AUTHORIZATION, CONTENT_TYPE, HeaderMap, RETRY_AFTER},
	},
};
use time::format_description::well_known::Rfc2822;
// self
use crate::{
	_prelude::*,
	error::{ConfigError, TransportError},
};

/// Abstraction over HTTP transports capable of executing directory API calls while
/// publishing response metadata to the retry layer.
///
/// The trait acts as the crate's only dependency on an HTTP stack. Both the token
/// endpoint (through `oauth2`) and resource calls go through the handles it produces,
/// so a single implementation covers every network call. Implementations must be
/// `Send + Sync + 'static`, and the handles they return must own whatever state is
/// required so their request futures remain `Send`.
pub trait DirectoryHttpClient
where
	Self: 'static + Send + Sync,
{
	/// Concrete error emitted by the underlying transport.
	type TransportError: 'static + Send + Sync + StdError;

	/// [`AsyncHttpClient`] handle tied to a [`ResponseMetadataSlot`].
	type Handle: for<'c> AsyncHttpClient<
			'c,
			Error = HttpClientError<Self::TransportError>,
			Future: 'c + Send,
		>
		+ 'static
		+ Send
		+ Sync;

	/// Builds an [`AsyncHttpClient`] handle that records outcomes in `slot`.
	///
	/// # Metadata Contract
	///
	/// - Call [`ResponseMetadataSlot::take`] before submitting the HTTP request so stale
	///   information never leaks across retries.
	/// - Once an HTTP response provides status headers, save them with
	///   [`ResponseMetadataSlot::store`].
	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle;
}

/// Captures metadata from the most recent HTTP response.
///
/// Additional metadata fields may be added in future releases, so downstream code
/// should construct values using field names instead of struct update syntax.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadata {
	/// HTTP status code, if available.
	pub status: Option<u16>,
	/// Retry-After hint expressed as a relative duration.
	pub retry_after: Option<Duration>,
}

/// Thread-safe slot for sharing [`ResponseMetadata`] between transport and retry layers.
#[derive(Clone, Debug, Default)]
pub struct ResponseMetadataSlot(Arc<Mutex<Option<ResponseMetadata>>>);
impl ResponseMetadataSlot {
	/// Stores new metadata for the current request.
	pub fn store(&self, meta: ResponseMetadata) {
		*self.0.lock() = Some(meta);
	}

	/// Returns the captured metadata, if any, consuming it from the slot.
	pub fn take(&self) -> Option<ResponseMetadata> {
		self.0.lock().take()
	}
}

/// Buffered HTTP response handed to the normalizer and the batch decoder.
#[derive(Clone, Debug)]
pub struct RawResponse {
	/// HTTP status code.
	pub status: u16,
	/// `Content-Type` header value, if present.
	pub content_type: Option<String>,
	/// Retry-After hint, if present.
	pub retry_after: Option<Duration>,
	/// Raw response body.
	pub body: Vec<u8>,
}
impl RawResponse {
	/// Returns `true` for 2xx statuses.
	pub fn is_success(&self) -> bool {
		(200..300).contains(&self.status)
	}

	/// Parses the body as JSON.
	///
	/// Empty bodies become [`Value::Null`]; bodies that are not JSON are preserved as a
	/// [`Value::String`] so error payloads are never lost.
	pub fn json_body(&self) -> Value {
		if self.body.iter().all(u8::is_ascii_whitespace) {
			return Value::Null;
		}

		serde_json::from_slice(&self.body)
			.unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&self.body).into_owned()))
	}
}

/// Request description that can be replayed on every retry attempt.
#[derive(Clone, Debug)]
pub(crate) struct OutboundRequest {
	pub(crate) method: Method,
	pub(crate) url: Url,
	pub(crate) content_type: Option<String>,
	pub(crate) accept_json: bool,
	pub(crate) body: Vec<u8>,
}
impl OutboundRequest {
	pub(crate) fn new(method: Method, url: Url) -> Self {
		Self { method, url, content_type: None, accept_json: false, body: Vec::new() }
	}

	pub(crate) fn accept_json(mut self, accept_json: bool) -> Self {
		self.accept_json = accept_json;

		self
	}

	pub(crate) fn json(mut self, body: &Value) -> Result<Self, ConfigError> {
		self.body = serde_json::to_vec(body)?;
		self.content_type = Some("application/json".into());

		Ok(self)
	}

	pub(crate) fn with_body(mut self, content_type: impl Into<String>, body: Vec<u8>) -> Self {
		self.content_type = Some(content_type.into());
		self.body = body;

		self
	}

	pub(crate) fn to_http(&self, bearer: Option<&str>) -> Result<HttpRequest, ConfigError> {
		let mut builder = Request::builder().method(self.method.clone()).uri(self.url.as_str());

		if let Some(token) = bearer {
			builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
		}
		if let Some(content_type) = &self.content_type {
			builder = builder.header(CONTENT_TYPE, content_type.as_str());
		}
		if self.accept_json {
			builder = builder.header(ACCEPT, "application/json");
		}

		Ok(builder.body(self.body.clone())?)
	}
}

/// Executes one request through `client` and buffers the response.
pub(crate) async fn send<C>(client: &C, request: HttpRequest) -> Result<RawResponse>
where
	C: ?Sized + DirectoryHttpClient,
{
	let slot = ResponseMetadataSlot::default();
	let handle = client.with_metadata(slot.clone());
	let response = handle.call(request).await.map_err(map_client_error)?;
	let meta = slot.take().unwrap_or_default();

	Ok(RawResponse {
		status: response.status().as_u16(),
		content_type: header_string(response.headers(), CONTENT_TYPE.as_str()),
		retry_after: meta.retry_after.or_else(|| parse_retry_after(response.headers())),
		body: response.into_body(),
	})
}

pub(crate) fn map_client_error<E>(e: HttpClientError<E>) -> Error
where
	E: 'static + Send + Sync + StdError,
{
	match e {
		HttpClientError::Reqwest(inner) => TransportError::network(*inner).into(),
		HttpClientError::Io(inner) => TransportError::Io(inner).into(),
		HttpClientError::Http(inner) => ConfigError::HttpRequest(inner).into(),
		HttpClientError::Other(message) => TransportError::Other { message }.into(),
		other => TransportError::Other { message: other.to_string() }.into(),
	}
}

/// Thin wrapper around [`ReqwestClient`] so shared HTTP behavior lives in one place.
/// Token requests should not follow redirects; configure any custom [`ReqwestClient`]
/// accordingly, because the client hands it to `oauth2` for token exchanges.
#[cfg(feature = "reqwest")]
#[derive(Clone, Default)]
pub struct ReqwestHttpClient(pub ReqwestClient);
#[cfg(feature = "reqwest")]
impl ReqwestHttpClient {
	/// Wraps an existing reqwest [`ReqwestClient`].
	pub fn with_client(client: ReqwestClient) -> Self {
		Self(client)
	}

	/// Builds a client whose requests fail after `timeout`.
	pub fn with_timeout(timeout: StdDuration) -> Result<Self, ConfigError> {
		let client = ReqwestClient::builder()
			.timeout(timeout)
			.redirect(reqwest::redirect::Policy::none())
			.build()?;

		Ok(Self(client))
	}

	pub(crate) fn instrumented(&self, slot: ResponseMetadataSlot) -> InstrumentedHandle {
		InstrumentedHandle::new(self.0.clone(), slot)
	}
}
#[cfg(feature = "reqwest")]
impl AsRef<ReqwestClient> for ReqwestHttpClient {
	fn as_ref(&self) -> &ReqwestClient {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl Deref for ReqwestHttpClient {
	type Target = ReqwestClient;

	fn deref(&self) -> &Self::Target {
		&self.0
	}
}
#[cfg(feature = "reqwest")]
impl DirectoryHttpClient for ReqwestHttpClient {
	type Handle = InstrumentedHandle;
	type TransportError = ReqwestError;

	fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
		self.instrumented(slot)
	}
}

#[cfg(feature = "reqwest")]
struct InstrumentedHttpClient {
	client: ReqwestClient,
	slot: ResponseMetadataSlot,
}

/// Handle returned by [`ReqwestHttpClient`] that satisfies [`DirectoryHttpClient`].
#[cfg(feature = "reqwest")]
#[derive(Clone)]
pub struct InstrumentedHandle(Arc<InstrumentedHttpClient>);
#[cfg(feature = "reqwest")]
impl InstrumentedHandle {
	fn new(client: ReqwestClient, slot: ResponseMetadataSlot) -> Self {
		Self(Arc::new(InstrumentedHttpClient { client, slot }))
	}
}
#[cfg(feature = "reqwest")]
impl<'c> AsyncHttpClient<'c> for InstrumentedHandle {
	type Error = HttpClientError<ReqwestError>;
	type Future =
		Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

	fn call(&'c self, request: HttpRequest) -> Self::Future {
		let client = Arc::clone(&self.0);

		Box::pin(async move {
			client.slot.take();

			let response = client
				.client
				.execute(request.try_into().map_err(Box::new)?)
				.await
				.map_err(Box::new)?;
			let status = response.status();
			let headers = response.headers().to_owned();
			let retry_after = parse_retry_after(&headers);

			client.slot.store(ResponseMetadata { status: Some(status.as_u16()), retry_after });

			let mut response_new =
				HttpResponse::new(response.bytes().await.map_err(Box::new)?.to_vec());

			*response_new.status_mut() = status;
			*response_new.headers_mut() = headers;

			Ok(response_new)
		})
	}
}

pub(crate) fn header_string(headers: &HeaderMap, name: &str) -> Option<String> {
	headers.get(name).and_then(|value: &HeaderValue| value.to_str().ok()).map(String::from)
}

/// Parses a `Retry-After` header given either as delta-seconds or an HTTP date.
pub fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
	let value = headers.get(RETRY_AFTER)?;

	parse_retry_after_value(value.to_str().ok()?)
}

pub(crate) fn parse_retry_after_value(raw: &str) -> Option<Duration> {
	let raw = raw.trim();

	if let Ok(secs) = raw.parse::<u64>() {
		return Some(Duration::seconds(secs as i64));
	}
	if let Ok(moment) = OffsetDateTime::parse(raw, &Rfc2822) {
		let delta = moment - OffsetDateTime::now_utc();

		if delta.is_positive() {
			return Some(delta);
		}
	}

	None
}

#[cfg(test)]
mod tests {
	// self
	use super::*;

	#[test]
	fn json_body_handles_empty_and_non_json_payloads() {
		let mut raw =
			RawResponse { status: 200, content_type: None, retry_after: None, body: Vec::new() };

		assert_eq!(raw.json_body(), Value::Null);

		raw.body = b"<html>nope</html>".to_vec();

		assert_eq!(raw.json_body(), Value::String("<html>nope</html>".into()));

		raw.body = br#"{"ok":true}"#.to_vec();

		assert_eq!(raw.json_body(), serde_json::json!({ "ok": true }));
	}

	#[test]
	fn retry_after_accepts_seconds_and_ignores_past_dates() {
		assert_eq!(parse_retry_after_value(" 7 "), Some(Duration::seconds(7)));
		assert_eq!(parse_retry_after_value("Wed, 21 Oct 2015 07:28:00 GMT"), None);
		assert_eq!(parse_retry_after_value("soon"), None);
	}

	#[test]
	fn outbound_request_attaches_bearer_and_content_type() {
		let url = Url::parse("https://directory.test/users?maxResults=5")
			.expect("Test URL should parse.");
		let request = OutboundRequest::new(Method::POST, url)
			.json(&serde_json::json!({ "name": "x" }))
			.expect("JSON body should serialize.");
		let http = request.to_http(Some("tok")).expect("HTTP request should build.");

		assert_eq!(http.method(), &Method::POST);
		assert_eq!(http.uri().to_string(), "https://directory.test/users?maxResults=5");
		assert_eq!(
			http.headers().get(AUTHORIZATION).and_then(|v| v.to_str().ok()),
			Some("Bearer tok")
		);
		assert_eq!(
			http.headers().get(CONTENT_TYPE).and_then(|v| v.to_str().ok()),
			Some("application/json")
		);
		assert_eq!(http.body().as_slice(), br#"{"name":"x"}"#);
	}
}
