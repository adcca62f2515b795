//! Async client for directory admin APIs: OAuth 2.0 token lifecycle, retrying transport,
//! auto-paginating streams, and multipart batch requests in one crate built for production.

#![deny(clippy::all, missing_docs, unused_crate_dependencies)]

pub mod auth;
pub mod authority;
pub mod batch;
pub mod directory;
pub mod error;
pub mod http;
pub mod normalize;
pub mod obs;
pub mod provider;
pub mod query;
pub mod retry;
pub mod singleflight;

mod oauth;

#[cfg(any(test, feature = "test"))]
pub mod _preludet {
	//! Convenience re-exports and helpers for tests; enabled via `cfg(test)` or the `test`
	//! crate feature.

	pub use crate::_prelude::*;

	// std
	use std::collections::VecDeque;
	// crates.io
	use oauth2::{
		AsyncHttpClient, HttpClientError, HttpRequest, HttpResponse,
		http::{StatusCode, header::CONTENT_TYPE},
	};
	// self
	use crate::{
		auth::Credentials,
		authority::TokenAuthority,
		http::{DirectoryHttpClient, ResponseMetadata, ResponseMetadataSlot},
		provider::ProviderDescriptor,
		retry::RetryPolicy,
	};

	/// Authority type alias used by tests that drive the scripted transport.
	pub type ScriptedAuthority = TokenAuthority<ScriptedHttpClient>;

	/// Transport failure emitted by [`ScriptedHttpClient`] when a script asks for one.
	#[derive(Debug)]
	pub struct ScriptedTransportError(pub String);
	impl Display for ScriptedTransportError {
		fn fmt(&self, f: &mut Formatter) -> FmtResult {
			write!(f, "Scripted transport failure: {}.", self.0)
		}
	}
	impl StdError for ScriptedTransportError {}

	/// Canned reply served by [`ScriptedHttpClient`].
	#[derive(Clone, Debug)]
	pub enum ScriptedReply {
		/// HTTP response with a status, content type, and body.
		Response {
			/// Status code.
			status: u16,
			/// `Content-Type` header value.
			content_type: String,
			/// Raw body.
			body: Vec<u8>,
		},
		/// Transport-level failure.
		Transport(String),
	}
	impl ScriptedReply {
		/// JSON response helper.
		pub fn json(status: u16, body: Value) -> Self {
			Self::Response {
				status,
				content_type: "application/json".into(),
				body: body.to_string().into_bytes(),
			}
		}

		/// Raw response helper for non-JSON payloads.
		pub fn raw(status: u16, content_type: &str, body: impl Into<Vec<u8>>) -> Self {
			Self::Response { status, content_type: content_type.into(), body: body.into() }
		}
	}

	/// Request captured by [`ScriptedHttpClient`].
	#[derive(Clone, Debug)]
	pub struct RecordedRequest {
		/// HTTP method.
		pub method: String,
		/// Full request URL.
		pub url: Url,
		/// `Authorization` header, if any.
		pub authorization: Option<String>,
		/// `Content-Type` header, if any.
		pub content_type: Option<String>,
		/// Request body decoded as UTF-8.
		pub body: String,
	}

	type Route = (String, VecDeque<ScriptedReply>, Option<ScriptedReply>);

	#[derive(Default)]
	struct Script {
		routes: Vec<Route>,
		requests: Vec<RecordedRequest>,
	}

	/// In-memory transport that replays scripted replies per URL path and records every
	/// request it sees.
	///
	/// Replies registered with [`ScriptedHttpClient::push`] are served once, in order; the
	/// reply registered with [`ScriptedHttpClient::fallback`] is served after the queue for
	/// that path drains. Each call yields to the scheduler once so concurrent callers can
	/// interleave.
	#[derive(Clone, Default)]
	pub struct ScriptedHttpClient(Arc<Mutex<Script>>);
	impl ScriptedHttpClient {
		/// Queues a one-shot reply for requests whose path equals `path`.
		pub fn push(&self, path: &str, reply: ScriptedReply) -> &Self {
			let mut script = self.0.lock();

			match script.routes.iter_mut().find(|(route, _, _)| route == path) {
				Some((_, queue, _)) => queue.push_back(reply),
				None => script.routes.push((path.into(), VecDeque::from([reply]), None)),
			}

			self
		}

		/// Sets the reply served for `path` once its queue is empty.
		pub fn fallback(&self, path: &str, reply: ScriptedReply) -> &Self {
			let mut script = self.0.lock();

			match script.routes.iter_mut().find(|(route, _, _)| route == path) {
				Some((_, _, fallback)) => *fallback = Some(reply),
				None => script.routes.push((path.into(), VecDeque::new(), Some(reply))),
			}

			self
		}

		/// Returns every request observed so far.
		pub fn requests(&self) -> Vec<RecordedRequest> {
			self.0.lock().requests.clone()
		}

		/// Counts requests sent to `path`.
		pub fn calls_to(&self, path: &str) -> usize {
			self.0.lock().requests.iter().filter(|request| request.url.path() == path).count()
		}

		fn next_reply(&self, request: RecordedRequest) -> ScriptedReply {
			let mut script = self.0.lock();
			let path = request.url.path().to_owned();

			script.requests.push(request);

			script
				.routes
				.iter_mut()
				.find(|(route, _, _)| *route == path)
				.and_then(|(_, queue, fallback)| queue.pop_front().or_else(|| fallback.clone()))
				.unwrap_or_else(|| {
					ScriptedReply::json(404, serde_json::json!({ "error": "unscripted path" }))
				})
		}
	}
	impl DirectoryHttpClient for ScriptedHttpClient {
		type Handle = ScriptedHandle;
		type TransportError = ScriptedTransportError;

		fn with_metadata(&self, slot: ResponseMetadataSlot) -> Self::Handle {
			ScriptedHandle { client: self.clone(), slot }
		}
	}

	/// Handle returned by [`ScriptedHttpClient::with_metadata`].
	pub struct ScriptedHandle {
		client: ScriptedHttpClient,
		slot: ResponseMetadataSlot,
	}
	impl<'c> AsyncHttpClient<'c> for ScriptedHandle {
		type Error = HttpClientError<ScriptedTransportError>;
		type Future =
			Pin<Box<dyn Future<Output = Result<HttpResponse, Self::Error>> + 'c + Send + Sync>>;

		fn call(&'c self, request: HttpRequest) -> Self::Future {
			Box::pin(async move {
				self.slot.take();

				let header = |name| {
					request
						.headers()
						.get(name)
						.and_then(|value| value.to_str().ok())
						.map(String::from)
				};
				let recorded = RecordedRequest {
					method: request.method().to_string(),
					url: Url::parse(&request.uri().to_string())
						.map_err(|e| HttpClientError::Other(e.to_string()))?,
					authorization: header("authorization"),
					content_type: header("content-type"),
					body: String::from_utf8_lossy(request.body()).into_owned(),
				};

				tokio::task::yield_now().await;

				match self.client.next_reply(recorded) {
					ScriptedReply::Response { status, content_type, body } => {
						self.slot
							.store(ResponseMetadata { status: Some(status), retry_after: None });

						let mut response = HttpResponse::new(body);

						*response.status_mut() = StatusCode::from_u16(status)
							.map_err(|e| HttpClientError::Other(e.to_string()))?;

						if let Ok(value) = content_type.parse() {
							response.headers_mut().insert(CONTENT_TYPE, value);
						}

						Ok(response)
					},
					ScriptedReply::Transport(message) =>
						Err(HttpClientError::Reqwest(Box::new(ScriptedTransportError(message)))),
				}
			})
		}
	}

	/// Retry policy without backoff delays so retry tests finish instantly.
	pub fn instant_retry_policy(max_retries: u32) -> RetryPolicy {
		RetryPolicy::default().with_max_retries(max_retries).with_backoff_ms(0, 0)
	}

	/// Provider descriptor rooted at a fake HTTPS host.
	pub fn test_descriptor() -> ProviderDescriptor {
		let base = Url::parse("https://directory.test/").expect("Test base URL should parse.");

		ProviderDescriptor::rooted_at(&base).expect("Test descriptor should build.")
	}

	/// Credentials holding both tokens plus client credentials.
	pub fn test_credentials(access: Option<&str>) -> Credentials {
		let mut builder = Credentials::builder()
			.refresh_token("refresh-seed")
			.client("client-id", "client-secret");

		if let Some(access) = access {
			builder = builder.access_token(access);
		}

		builder.build().expect("Test credentials should build.")
	}

	/// Builds an authority over a fresh scripted transport with instant retries.
	pub fn build_scripted_authority(
		access: Option<&str>,
	) -> (ScriptedAuthority, ScriptedHttpClient) {
		let transport = ScriptedHttpClient::default();
		let authority = TokenAuthority::with_http_client(
			test_descriptor(),
			test_credentials(access),
			transport.clone(),
		)
		.expect("Scripted authority should build.")
		.with_retry_policy(instant_retry_policy(3));

		(authority, transport)
	}

	/// Token endpoint reply carrying a fresh access token.
	pub fn token_reply(access: &str) -> ScriptedReply {
		ScriptedReply::json(
			200,
			serde_json::json!({
				"access_token": access,
				"token_type": "Bearer",
				"expires_in": 3600
			}),
		)
	}
}

mod _prelude {
	pub use std::{
		collections::{BTreeMap, HashMap},
		error::Error as StdError,
		fmt::{Debug, Display, Formatter, Result as FmtResult},
		future::Future,
		hash::Hash,
		pin::Pin,
		sync::Arc,
		time::Duration as StdDuration,
	};

	pub use async_lock::Mutex as AsyncMutex;
	pub use parking_lot::{Mutex, RwLock};
	#[cfg(feature = "reqwest")]
	pub use reqwest::{Client as ReqwestClient, Error as ReqwestError};
	pub use serde::{Deserialize, Serialize};
	pub use serde_json::{Map, Value};
	pub use thiserror::Error as ThisError;
	pub use time::{Duration, OffsetDateTime};
	pub use tokio_util::sync::CancellationToken;
	pub use url::Url;

	pub use crate::error::{Error, Result};
}

pub use oauth2::http::Method;
#[cfg(feature = "reqwest")] pub use reqwest;
pub use tokio_util::sync::CancellationToken;
pub use url;
#[cfg(test)] use {color_eyre as _, httpmock as _};
