//! Token authority: owns credentials and wraps every outbound call with bearer auth,
//! refresh, and retry.

pub mod refresh;

mod exchange;
mod request;
mod token_info;

pub use refresh::RefreshMetrics;

// self
use crate::{
	_prelude::*,
	auth::{Credentials, TokenSecret},
	http::DirectoryHttpClient,
	provider::ProviderDescriptor,
	retry::RetryPolicy,
};
#[cfg(feature = "reqwest")] use crate::http::ReqwestHttpClient;

#[cfg(feature = "reqwest")]
/// Authority specialized for the crate's default reqwest transport.
pub type ReqwestAuthority = TokenAuthority<ReqwestHttpClient>;

/// Owns one set of OAuth credentials and issues authorized calls against the directory API.
///
/// Clones share credentials, the refresh guard, metrics, and the cancellation token, so a
/// refresh performed through one clone is visible to every other clone.
pub struct TokenAuthority<C>
where
	C: DirectoryHttpClient,
{
	/// HTTP client wrapper used for every outbound request.
	pub http_client: Arc<C>,
	/// Provider descriptor that defines endpoints and response conventions.
	pub descriptor: ProviderDescriptor,
	/// Retry policy for token, token-info, and resource calls.
	pub retry_policy: RetryPolicy,
	/// Shared counters for refresh outcomes.
	pub refresh_metrics: Arc<RefreshMetrics>,
	credentials: Arc<RwLock<Credentials>>,
	refresh_guard: Arc<AsyncMutex<()>>,
	cancel: CancellationToken,
}
impl<C> TokenAuthority<C>
where
	C: DirectoryHttpClient,
{
	/// Creates an authority over a caller-provided transport.
	///
	/// Fails when `credentials` hold no token, or a refresh token without a client pair.
	pub fn with_http_client(
		descriptor: ProviderDescriptor,
		credentials: Credentials,
		http_client: impl Into<Arc<C>>,
	) -> Result<Self> {
		credentials.validate()?;

		Ok(Self {
			http_client: http_client.into(),
			descriptor,
			retry_policy: RetryPolicy::default(),
			refresh_metrics: Default::default(),
			credentials: Arc::new(RwLock::new(credentials)),
			refresh_guard: Default::default(),
			cancel: CancellationToken::new(),
		})
	}

	/// Replaces the retry policy.
	pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
		self.retry_policy = policy;

		self
	}

	/// Ties the authority to an external cancellation token.
	pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
		self.cancel = cancel;

		self
	}

	/// Returns a snapshot of the current credentials.
	pub fn credentials(&self) -> Credentials {
		self.credentials.read().clone()
	}

	/// Returns the cancellation token shared by every clone.
	pub fn cancellation_token(&self) -> &CancellationToken {
		&self.cancel
	}

	/// Aborts outstanding attempts and backoff sleeps; later calls fail with
	/// [`Error::Cancelled`].
	pub fn cancel(&self) {
		self.cancel.cancel();
	}

	pub(crate) fn access_token(&self) -> Option<TokenSecret> {
		self.credentials.read().access_token.clone().filter(|token| !token.is_blank())
	}

	pub(crate) fn can_refresh(&self) -> bool {
		self.credentials.read().refresh_token.as_ref().is_some_and(|token| !token.is_blank())
	}
}
#[cfg(feature = "reqwest")]
impl TokenAuthority<ReqwestHttpClient> {
	/// Creates an authority that provisions its own reqwest transport.
	pub fn new(descriptor: ProviderDescriptor, credentials: Credentials) -> Result<Self> {
		Self::with_http_client(descriptor, credentials, ReqwestHttpClient::default())
	}
}
impl<C> Clone for TokenAuthority<C>
where
	C: DirectoryHttpClient,
{
	fn clone(&self) -> Self {
		Self {
			http_client: self.http_client.clone(),
			descriptor: self.descriptor.clone(),
			retry_policy: self.retry_policy.clone(),
			refresh_metrics: self.refresh_metrics.clone(),
			credentials: self.credentials.clone(),
			refresh_guard: self.refresh_guard.clone(),
			cancel: self.cancel.clone(),
		}
	}
}
impl<C> Debug for TokenAuthority<C>
where
	C: DirectoryHttpClient,
{
	fn fmt(&self, f: &mut Formatter) -> FmtResult {
		f.debug_struct("TokenAuthority")
			.field("descriptor", &self.descriptor)
			.field("retry_policy", &self.retry_policy)
			.field("credentials", &*self.credentials.read())
			.field("cancelled", &self.cancel.is_cancelled())
			.finish()
	}
}
