//! Retry policy and the cancellable backoff loop shared by every network call.

// crates.io
use rand::Rng;
// self
use crate::{
	_prelude::*,
	obs::{self, CallKind, CallOutcome},
};

/// Exponential backoff settings applied to transient failures.
///
/// `max_retries` counts retries after the first attempt, so a policy with three retries
/// sends at most four requests.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
	/// Retries allowed after the first attempt.
	pub max_retries: u32,
	/// Delay before the first retry, in milliseconds.
	pub min_backoff_ms: u64,
	/// Upper bound for any single delay, in milliseconds.
	pub max_backoff_ms: u64,
	/// Multiplier applied per retry.
	pub factor: u32,
	/// Multiplies each delay by a random factor in `[1, 2)`.
	pub randomize: bool,
	/// HTTP statuses treated as transient.
	pub retryable_statuses: Vec<u16>,
}
impl RetryPolicy {
	/// Policy used for batch requests: 15 retries on `503` without jitter.
	pub fn batch() -> Self {
		Self { max_retries: 15, randomize: false, retryable_statuses: vec![503], ..Self::default() }
	}

	/// Overrides the retry ceiling.
	pub fn with_max_retries(mut self, max_retries: u32) -> Self {
		self.max_retries = max_retries;

		self
	}

	/// Overrides the backoff bounds, in milliseconds.
	pub fn with_backoff_ms(mut self, min: u64, max: u64) -> Self {
		self.min_backoff_ms = min;
		self.max_backoff_ms = max.max(min);

		self
	}

	/// Overrides the exponential factor.
	pub fn with_factor(mut self, factor: u32) -> Self {
		self.factor = factor;

		self
	}

	/// Enables or disables jitter.
	pub fn with_randomize(mut self, randomize: bool) -> Self {
		self.randomize = randomize;

		self
	}

	/// Replaces the transient status set.
	pub fn with_retryable_statuses(mut self, statuses: impl IntoIterator<Item = u16>) -> Self {
		self.retryable_statuses = statuses.into_iter().collect();

		self
	}

	/// Returns `true` when `status` belongs to the transient set.
	pub fn is_retryable_status(&self, status: u16) -> bool {
		self.retryable_statuses.contains(&status)
	}

	/// Computes the delay before retry number `retry` (zero-based), ignoring server hints.
	pub fn backoff(&self, retry: u32) -> StdDuration {
		let growth = u64::from(self.factor.max(1)).saturating_pow(retry);
		let mut millis = self.min_backoff_ms.saturating_mul(growth) as f64;

		if self.randomize {
			millis *= rand::rng().random_range(1.0..2.0);
		}

		StdDuration::from_millis((millis as u64).min(self.max_backoff_ms))
	}

	/// Computes the delay before retry number `retry`, raised to any `Retry-After` hint and
	/// capped at `max_backoff_ms`.
	pub fn delay_for(&self, retry: u32, retry_after: Option<Duration>) -> StdDuration {
		let backoff = self.backoff(retry);
		let hinted = retry_after
			.map(|hint| StdDuration::from_millis(hint.whole_milliseconds().max(0) as u64))
			.unwrap_or_default();

		backoff.max(hinted).min(StdDuration::from_millis(self.max_backoff_ms))
	}

	/// Classifies a finished attempt: transport failures and transient statuses retry.
	pub(crate) fn judge<T>(&self, result: Result<T>, retry_after: Option<Duration>) -> Verdict<T> {
		match result {
			Err(err @ Error::Transport(_)) => Verdict::Transient { last: err, retry_after },
			Err(Error::Remote { status, body }) if self.is_retryable_status(status) =>
				Verdict::Transient { last: Error::Remote { status, body }, retry_after },
			other => Verdict::Done(other),
		}
	}
}
impl Default for RetryPolicy {
	fn default() -> Self {
		Self {
			max_retries: 5,
			min_backoff_ms: 1_000,
			max_backoff_ms: 180_000,
			factor: 2,
			randomize: true,
			retryable_statuses: vec![403, 412, 429, 500, 502, 503, 504],
		}
	}
}

/// Outcome of a single attempt.
pub(crate) enum Verdict<T> {
	Done(Result<T>),
	Transient { last: Error, retry_after: Option<Duration> },
}

/// Runs `attempt` until it settles, retrying transient verdicts per `policy`.
///
/// Cancellation aborts both the in-flight attempt and any backoff sleep. Once retries are
/// exhausted the last transient error is returned.
pub(crate) async fn run<T, F, Fut>(
	policy: &RetryPolicy,
	cancel: &CancellationToken,
	kind: CallKind,
	mut attempt: F,
) -> Result<T>
where
	F: FnMut() -> Fut,
	Fut: Future<Output = Verdict<T>>,
{
	let mut retries = 0;

	loop {
		let verdict = tokio::select! {
			biased;
			_ = cancel.cancelled() => return Err(Error::Cancelled),
			verdict = attempt() => verdict,
		};
		let (last, retry_after) = match verdict {
			Verdict::Done(result) => return result,
			Verdict::Transient { last, retry_after } => (last, retry_after),
		};

		if retries >= policy.max_retries {
			return Err(last);
		}

		let delay = policy.delay_for(retries, retry_after);

		obs::record_call_outcome(kind, CallOutcome::Retry);

		retries += 1;

		if !delay.is_zero() {
			tokio::select! {
				biased;
				_ = cancel.cancelled() => return Err(Error::Cancelled),
				_ = tokio::time::sleep(delay) => {},
			}
		}
	}
}
