use seda_rs::config::{Config, DEFAULT_QUEUE_SIZE, DEFAULT_TIMEOUT_MS, EndpointConfig};
use seda_rs::model::WaitForTaskToComplete;

#[test]
fn config_from_env_reads_endpoint_uri() {
    // Env vars are process-wide; keep everything env-related in this one test.
    unsafe {
        std::env::set_var("SEDA_ENDPOINT", "seda:env?size=7&timeout=250");
        std::env::remove_var("LOG_LEVEL");
    }

    let config = Config::from_env().unwrap();
    assert_eq!(config.endpoint.name, "env");
    assert_eq!(config.endpoint.size, 7);
    assert_eq!(config.endpoint.timeout_ms, 250);
    assert_eq!(config.log_level, "info");

    unsafe {
        std::env::set_var("SEDA_ENDPOINT", "http://not-seda");
    }
    assert!(Config::from_env().is_err());

    unsafe {
        std::env::remove_var("SEDA_ENDPOINT");
    }
    let config = Config::from_env().unwrap();
    assert_eq!(config.endpoint, EndpointConfig::default());
}

#[test]
fn endpoint_uri_defaults() {
    let config = EndpointConfig::from_uri("seda:orders").unwrap();
    assert_eq!(config.name, "orders");
    assert_eq!(config.size, DEFAULT_QUEUE_SIZE);
    assert_eq!(config.concurrent_consumers, 1);
    assert_eq!(
        config.wait_for_task_to_complete,
        WaitForTaskToComplete::IfReplyExpected
    );
    assert_eq!(config.timeout_ms, DEFAULT_TIMEOUT_MS);
    assert_eq!(config.uri(), "seda:orders");
}

#[test]
fn endpoint_uri_with_options() {
    let config = EndpointConfig::from_uri(
        "seda://orders?size=50&concurrentConsumers=3&waitForTaskToComplete=Always&timeout=-1",
    )
    .unwrap();
    assert_eq!(config.name, "orders");
    assert_eq!(config.size, 50);
    assert_eq!(config.concurrent_consumers, 3);
    assert_eq!(config.wait_for_task_to_complete, WaitForTaskToComplete::Always);
    assert_eq!(config.timeout_ms, -1);
}

#[test]
fn endpoint_uri_rejects_bad_input() {
    assert!(EndpointConfig::from_uri("direct:orders").is_err());
    assert!(EndpointConfig::from_uri("seda:").is_err());
    assert!(EndpointConfig::from_uri("seda:a?size=0").is_err());
    assert!(EndpointConfig::from_uri("seda:a?size=lots").is_err());
    assert!(EndpointConfig::from_uri("seda:a?concurrentConsumers=0").is_err());
    assert!(EndpointConfig::from_uri("seda:a?waitForTaskToComplete=Sometimes").is_err());
    assert!(EndpointConfig::from_uri("seda:a?bogus=1").is_err());
    assert!(EndpointConfig::from_uri("seda:a?size").is_err());
}

#[test]
fn wait_policy_parses_loosely() {
    for (input, expected) in [
        ("Never", WaitForTaskToComplete::Never),
        ("never", WaitForTaskToComplete::Never),
        ("IfReplyExpected", WaitForTaskToComplete::IfReplyExpected),
        ("if-reply-expected", WaitForTaskToComplete::IfReplyExpected),
        ("if_reply_expected", WaitForTaskToComplete::IfReplyExpected),
        ("ALWAYS", WaitForTaskToComplete::Always),
    ] {
        assert_eq!(input.parse::<WaitForTaskToComplete>().unwrap(), expected);
    }
}

#[test]
fn endpoints_load_from_toml() {
    let toml = r#"
        [[endpoint]]
        name = "orders"
        size = 100
        concurrent_consumers = 4
        wait_for_task_to_complete = "always"
        timeout_ms = 5000

        [[endpoint]]
        name = "audit"
        wait_for_task_to_complete = "never"
    "#;

    let endpoints = EndpointConfig::parse_toml(toml).unwrap();
    assert_eq!(endpoints.len(), 2);
    assert_eq!(endpoints[0].uri(), "seda:orders");
    assert_eq!(endpoints[0].concurrent_consumers, 4);
    assert_eq!(endpoints[0].wait_for_task_to_complete, WaitForTaskToComplete::Always);
    assert_eq!(endpoints[1].size, DEFAULT_QUEUE_SIZE);
    assert_eq!(endpoints[1].timeout_ms, DEFAULT_TIMEOUT_MS);
}

#[test]
fn endpoints_toml_file_round_trip_through_disk() {
    let path = std::env::temp_dir().join(format!("seda-endpoints-{}.toml", uuid::Uuid::new_v4()));
    std::fs::write(&path, "[[endpoint]]\nname = \"disk\"\nsize = 3\n").unwrap();

    let endpoints = EndpointConfig::load_toml(&path).unwrap();
    assert_eq!(endpoints.len(), 1);
    assert_eq!(endpoints[0].size, 3);

    std::fs::remove_file(&path).unwrap();
    assert!(EndpointConfig::load_toml(&path).is_err());
}

#[test]
fn invalid_toml_endpoint_is_rejected() {
    assert!(EndpointConfig::parse_toml("[[endpoint]]\nname = \"x\"\nsize = 0\n").is_err());
    assert!(EndpointConfig::parse_toml("[[endpoint]]\nname = 3\n").is_err());
}
