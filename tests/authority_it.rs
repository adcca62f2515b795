#![cfg(feature = "reqwest")]

// std
use std::sync::Arc;
// crates.io
use httpmock::prelude::*;
use serde_json::json;
// self
use admin_directory::{
	CancellationToken,
	auth::{ClientCredentials, CodeExchange, Credentials},
	authority::{ReqwestAuthority, TokenAuthority},
	error::{ConfigError, Error},
	http::ReqwestHttpClient,
	normalize::Normalized,
	provider::ProviderDescriptor,
	query::Query,
	retry::RetryPolicy,
	url::Url,
};

fn descriptor(server: &MockServer) -> ProviderDescriptor {
	let base = Url::parse(&server.base_url()).expect("Mock server URL should parse.");

	ProviderDescriptor::rooted_at(&base).expect("Mock descriptor should build.")
}

fn authority(server: &MockServer, access: Option<&str>) -> ReqwestAuthority {
	let mut builder =
		Credentials::builder().refresh_token("refresh-seed").client("client-id", "client-secret");

	if let Some(access) = access {
		builder = builder.access_token(access);
	}

	let credentials = builder.build().expect("Credentials should build.");

	TokenAuthority::new(descriptor(server), credentials)
		.expect("Authority should build.")
		.with_retry_policy(RetryPolicy::default().with_max_retries(2).with_backoff_ms(0, 0))
}

fn user_query(authority: &ReqwestAuthority) -> Query {
	Query::get(
		authority.descriptor.resource_url(["users", "a@example.com"]).expect("URL should build."),
	)
}

#[tokio::test]
async fn bearer_token_reaches_the_api() {
	let server = MockServer::start_async().await;
	let authority = authority(&server, Some("access-1"));
	let mock = server
		.mock_async(|when, then| {
			when.method(GET)
				.path_includes("/admin/directory/v1/users/a")
				.header("authorization", "Bearer access-1");
			then.status(200).json_body(json!({ "kind": "admin#directory#user", "id": "42" }));
		})
		.await;
	let normalized = authority
		.authorized_request(&user_query(&authority))
		.await
		.expect("Authorized request should succeed.");

	mock.assert_async().await;

	assert!(matches!(&normalized, Normalized::Resource(_)));
	assert_eq!(normalized.into_value()["id"], "42");
}

#[tokio::test]
async fn unauthorized_response_refreshes_and_replays_once() {
	let server = MockServer::start_async().await;
	let authority = authority(&server, Some("stale"));
	let rejected = server
		.mock_async(|when, then| {
			when.method(GET).path_includes("/users/").header("authorization", "Bearer stale");
			then.status(401).json_body(json!({ "error": { "code": 401 } }));
		})
		.await;
	let accepted = server
		.mock_async(|when, then| {
			when.method(GET).path_includes("/users/").header("authorization", "Bearer fresh");
			then.status(200).json_body(json!({ "kind": "admin#directory#user", "id": "42" }));
		})
		.await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/o/oauth2/token")
				.body_includes("grant_type=refresh_token")
				.body_includes("refresh_token=refresh-seed");
			then.status(200).json_body(json!({
				"access_token": "fresh",
				"token_type": "Bearer",
				"expires_in": 3600
			}));
		})
		.await;

	authority
		.authorized_request(&user_query(&authority))
		.await
		.expect("Replayed request should succeed.");

	rejected.assert_calls_async(1).await;
	accepted.assert_calls_async(1).await;
	token.assert_calls_async(1).await;

	assert_eq!(authority.credentials().access_token(), Some("fresh"));
	assert_eq!(authority.refresh_metrics.successes(), 1);
}

#[tokio::test]
async fn persistent_unauthorized_surfaces_auth_error() {
	let server = MockServer::start_async().await;
	let authority = authority(&server, Some("stale"));
	let rejected = server
		.mock_async(|when, then| {
			when.method(GET).path_includes("/users/");
			then.status(401).json_body(json!({ "error": { "code": 401 } }));
		})
		.await;
	let token = server
		.mock_async(|when, then| {
			when.method(POST).path("/o/oauth2/token");
			then.status(200).json_body(json!({ "access_token": "fresh", "token_type": "Bearer" }));
		})
		.await;
	let err = authority
		.authorized_request(&user_query(&authority))
		.await
		.expect_err("Second 401 should fail.");

	assert!(matches!(err, Error::Auth { .. }));

	rejected.assert_calls_async(2).await;
	token.assert_calls_async(1).await;
}

#[tokio::test]
async fn transient_statuses_exhaust_the_retry_policy() {
	let server = MockServer::start_async().await;
	let authority = authority(&server, Some("access-1"));
	let unavailable = server
		.mock_async(|when, then| {
			when.method(GET).path_includes("/users/");
			then.status(503).body("Service Unavailable");
		})
		.await;
	let err = authority
		.authorized_request(&user_query(&authority))
		.await
		.expect_err("Retries should exhaust.");

	assert_eq!(err.status(), Some(503));

	unavailable.assert_calls_async(3).await;
}

#[tokio::test]
async fn token_info_reports_the_current_token() {
	let server = MockServer::start_async().await;
	let authority = authority(&server, Some("access-1"));
	let mock = server
		.mock_async(|when, then| {
			when.method(GET).path("/oauth2/v1/tokeninfo").query_param("access_token", "access-1");
			then.status(200).json_body(json!({
				"issued_to": "client-id",
				"scope": "https://www.googleapis.com/auth/admin.directory.user",
				"expires_in": 3599
			}));
		})
		.await;
	let info = authority.token_info().await.expect("Token info should succeed.");

	mock.assert_async().await;

	assert_eq!(info.issued_to.as_deref(), Some("client-id"));
	assert_eq!(info.expires_in, Some(3599));
}

#[tokio::test]
async fn authorization_code_exchange_returns_credentials() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.method(POST)
				.path("/o/oauth2/token")
				.body_includes("grant_type=authorization_code")
				.body_includes("code=code-123")
				.body_includes("client_id=client-id");
			then.status(200).json_body(json!({
				"access_token": "access-new",
				"refresh_token": "refresh-new",
				"token_type": "Bearer",
				"expires_in": 3600
			}));
		})
		.await;
	let exchange = CodeExchange::new(
		"code-123",
		"https://app.example.com/callback",
		ClientCredentials::new("client-id", "client-secret"),
	);
	let credentials = ReqwestAuthority::exchange_authorization_code(
		&descriptor(&server),
		Arc::new(ReqwestHttpClient::default()),
		&RetryPolicy::default().with_backoff_ms(0, 0),
		&CancellationToken::new(),
		&exchange,
	)
	.await
	.expect("Code exchange should succeed.");

	mock.assert_async().await;

	assert_eq!(credentials.access_token(), Some("access-new"));
	assert_eq!(
		credentials.refresh_token.as_ref().map(|token| token.expose().to_owned()).as_deref(),
		Some("refresh-new")
	);
	assert!(credentials.client.is_some());
}

#[tokio::test]
async fn code_exchange_validates_before_any_request() {
	let server = MockServer::start_async().await;
	let mock = server
		.mock_async(|when, then| {
			when.any_request();
			then.status(500);
		})
		.await;
	let exchange =
		CodeExchange::new("", "https://app.example.com/callback", ClientCredentials::new("a", "b"));
	let err = ReqwestAuthority::exchange_authorization_code(
		&descriptor(&server),
		Arc::new(ReqwestHttpClient::default()),
		&RetryPolicy::default(),
		&CancellationToken::new(),
		&exchange,
	)
	.await
	.expect_err("Blank code should fail.");

	assert!(matches!(err, Error::Config(ConfigError::MissingParameter { name: "code" })));

	mock.assert_calls_async(0).await;
}
