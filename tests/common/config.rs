//! Test configuration helpers pointing a client at a mock server

use icecat_dl::config::RetryConfig;
use icecat_dl::{AuthConfig, Config};
use std::path::Path;
use std::time::Duration;

/// Username the mock server expects
pub const TEST_USERNAME: &str = "catalog-user";
/// Password the mock server expects
pub const TEST_PASSWORD: &str = "catalog-pass";

/// Configuration with every endpoint on `server_uri` and all files under `dir`
///
/// Retries are fast and few so failure tests finish quickly.
pub fn mock_config(server_uri: &str, dir: &Path) -> Config {
    let mut config = Config::default();
    config.auth = Some(AuthConfig {
        username: TEST_USERNAME.to_string(),
        password: Some(TEST_PASSWORD.to_string()),
    });
    config.endpoints.index_base_url = format!("{}/export/freexml/EN/", server_uri);
    config.endpoints.categories_url =
        format!("{}/export/freexml/refs/CategoriesList.xml.gz", server_uri);
    config.endpoints.suppliers_url = format!("{}/export/freeurls/supplier_mapping.xml", server_uri);
    config.endpoints.detail_base_url = format!("{}/", server_uri);

    config.download.data_dir = dir.join("_data");
    config.download.concurrency = 4;
    config.download.request_timeout = Duration::from_secs(5);

    config.output.output_file = dir.join("catalog.json");
    config.output.categories_file = dir.join("categories.json");

    config.retry = RetryConfig {
        max_attempts: 1,
        initial_delay: Duration::from_millis(10),
        max_delay: Duration::from_millis(20),
        backoff_multiplier: 2.0,
        jitter: false,
    };
    config
}

/// Basic-auth header value for the test credentials
pub fn basic_auth_header() -> String {
    // base64("catalog-user:catalog-pass")
    "Basic Y2F0YWxvZy11c2VyOmNhdGFsb2ctcGFzcw==".to_string()
}
