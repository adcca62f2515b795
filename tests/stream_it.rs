#![cfg(feature = "reqwest")]

// crates.io
use futures::{StreamExt, TryStreamExt};
use httpmock::prelude::*;
use serde_json::json;
// self
use admin_directory::{
	auth::Credentials,
	authority::TokenAuthority,
	directory::{DirectoryClient, ReqwestDirectoryClient, UserListOptions},
	error::Error,
	provider::ProviderDescriptor,
	query::StreamItem,
	retry::RetryPolicy,
	url::Url,
};

fn client(server: &MockServer) -> ReqwestDirectoryClient {
	let base = Url::parse(&server.base_url()).expect("Mock server URL should parse.");
	let descriptor = ProviderDescriptor::rooted_at(&base).expect("Mock descriptor should build.");
	let credentials =
		Credentials::builder().access_token("access-1").build().expect("Credentials should build.");
	let authority = TokenAuthority::new(descriptor, credentials)
		.expect("Authority should build.")
		.with_retry_policy(RetryPolicy::default().with_max_retries(1).with_backoff_ms(0, 0));

	DirectoryClient::new(authority)
}

#[tokio::test]
async fn stream_follows_page_tokens_in_order() {
	let server = MockServer::start_async().await;
	let client = client(&server);
	let first = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/admin/directory/v1/users")
				.query_param("customer", "my_customer")
				.query_param("pageToken", "start");
			then.status(200).json_body(json!({
				"kind": "admin#directory#users",
				"users": [{ "id": "1" }, { "id": "2" }],
				"nextPageToken": "p2"
			}));
		})
		.await;
	let second = server
		.mock_async(|when, then| {
			when.method(GET)
				.path("/admin/directory/v1/users")
				.query_param("customer", "my_customer")
				.query_param("pageToken", "p2");
			then.status(200)
				.json_body(json!({ "kind": "admin#directory#users", "users": [{ "id": "3" }] }));
		})
		.await;
	let query = client
		.users()
		.list(&UserListOptions {
			customer: Some("my_customer".into()),
			page_token: Some("start".into()),
			..Default::default()
		})
		.expect("List should build.");
	let ids = client
		.stream_query(query)
		.map_ok(|item| item.into_value()["id"].as_str().unwrap_or_default().to_owned())
		.try_collect::<Vec<_>>()
		.await
		.expect("Stream should succeed.");

	assert_eq!(ids, ["1", "2", "3"]);

	first.assert_calls_async(1).await;
	second.assert_calls_async(1).await;
}

#[tokio::test]
async fn legacy_feeds_stream_decoded_entries() {
	let server = MockServer::start_async().await;
	let client = client(&server);

	server
		.mock_async(|when, then| {
			when.method(GET).path("/admin/directory/v1/legacy");
			then.status(200).json_body(json!({
				"feed": {
					"id": { "$t": "feed-1" },
					"entry": [
						{
							"id": { "$t": "e1" },
							"apps$property": [{ "name": "groupId", "value": "ops@example.com" }]
						},
						{ "id": { "$t": "e2" }, "apps$login": { "userName": "jdoe" } }
					]
				}
			}));
		})
		.await;

	let url = client.authority().descriptor.resource_url(["legacy"]).expect("URL should build.");
	let query = client.build_query("GET", url.as_str(), None).expect("Query should build.");
	let items = client
		.stream_query(query)
		.try_collect::<Vec<_>>()
		.await
		.expect("Feed stream should succeed.");

	assert_eq!(items.len(), 2);

	let StreamItem::Entry(first) = &items[0] else {
		panic!("Expected a decoded entry, got {:?}.", items[0]);
	};

	assert_eq!(first.id.as_deref(), Some("e1"));
	assert_eq!(first.property("groupId"), Some(&json!("ops@example.com")));
}

#[tokio::test]
async fn page_failure_ends_the_stream_after_one_error() {
	let server = MockServer::start_async().await;
	let client = client(&server);

	server
		.mock_async(|when, then| {
			when.method(GET).path("/admin/directory/v1/groups");
			then.status(400).json_body(json!({ "error": { "message": "Bad Request" } }));
		})
		.await;

	let query = client.groups().list(&Default::default()).expect("List should build.");
	let mut stream = client.stream_query(query);
	let first = stream.next().await.expect("Stream should yield the failure.");

	assert!(matches!(first, Err(Error::Remote { status: 400, .. })));
	assert!(stream.next().await.is_none());
}
