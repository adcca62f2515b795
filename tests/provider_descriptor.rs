// crates.io
use serde_json::json;
// self
use admin_directory::{
	provider::{ProviderDescriptor, ProviderDescriptorError, ProviderQuirks},
	retry::RetryPolicy,
	url::Url,
};

fn url(raw: &str) -> Url {
	Url::parse(raw).expect("Fixture URL should parse.")
}

#[test]
fn descriptor_loads_from_json_configuration() {
	let descriptor: ProviderDescriptor = serde_json::from_value(json!({
		"endpoints": {
			"token": "https://auth.example.com/token",
			"token_info": "https://auth.example.com/tokeninfo",
			"api_base": "https://api.example.com/directory/v1/",
			"batch": "https://api.example.com/batch"
		},
		"quirks": { "page_token_param": "cursor" }
	}))
	.expect("Descriptor configuration should deserialize.");

	assert_eq!(descriptor.quirks.page_token_param, "cursor");
	assert_eq!(
		descriptor.quirks,
		ProviderQuirks { page_token_param: "cursor".into(), ..Default::default() }
	);
	assert_eq!(
		descriptor.resource_url(["users", "a b"]).expect("Resource URL should build.").as_str(),
		"https://api.example.com/directory/v1/users/a%20b"
	);
}

#[test]
fn builder_rejects_insecure_remote_endpoints() {
	let err = ProviderDescriptor::builder()
		.token_endpoint(url("http://auth.example.com/token"))
		.token_info_endpoint(url("https://auth.example.com/tokeninfo"))
		.api_base(url("https://api.example.com/directory/v1"))
		.batch_endpoint(url("https://api.example.com/batch"))
		.build()
		.expect_err("Plain HTTP on a remote host should fail.");

	assert!(matches!(err, ProviderDescriptorError::InsecureEndpoint { endpoint: "token", .. }));
}

#[test]
fn builder_normalizes_api_base_and_checks_quirks() {
	let builder = ProviderDescriptor::builder()
		.token_endpoint(url("https://auth.example.com/token"))
		.token_info_endpoint(url("https://auth.example.com/tokeninfo"))
		.api_base(url("https://api.example.com/directory/v1"))
		.batch_endpoint(url("https://api.example.com/batch"));
	let descriptor = builder.clone().build().expect("Descriptor should build.");

	assert!(descriptor.endpoints.api_base.path().ends_with('/'));

	let err = builder
		.quirks(ProviderQuirks { batch_boundary: "bad\"boundary".into(), ..Default::default() })
		.build()
		.expect_err("Quoted boundary should fail.");

	assert_eq!(err, ProviderDescriptorError::InvalidBoundary);
}

#[test]
fn retry_policy_loads_from_json_configuration() {
	let policy: RetryPolicy = serde_json::from_value(json!({
		"max_retries": 2,
		"min_backoff_ms": 50,
		"randomize": false
	}))
	.expect("Retry configuration should deserialize.");

	assert_eq!(policy.max_retries, 2);
	assert_eq!(policy.backoff(1).as_millis(), 100);
	assert!(policy.is_retryable_status(503));
	assert!(!policy.is_retryable_status(404));
}
