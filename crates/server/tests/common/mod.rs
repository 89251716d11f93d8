//! Common test utilities for in-process API testing.
//!
//! Builds the real router around a mock archive and a temporary SQLite
//! catalog, so the HTTP surface can be exercised without network access.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use http_body_util::BodyExt;
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;

use vodingest_core::{
    config::{DatabaseConfig, ImportConfig, ServerConfig, SourceConfig},
    create_authenticator,
    testing::MockSourceClient,
    AuthConfig, AuthMethod, Authenticator, Config, JobStore, SourceClient, SqliteCatalog,
    VideoCatalog,
};
use vodingest_server::{api::create_router, state::AppState};

/// Re-export fixtures for test convenience
pub use vodingest_core::testing::fixtures;

/// Test fixture with a mock archive.
///
/// # Example
///
/// ```rust,ignore
/// #[tokio::test]
/// async fn test_single_import() {
///     let fixture = TestFixture::new().await;
///     fixture.source.add_item(fixtures::movie("detour_1945", "Detour")).await;
///
///     let response = fixture.post("/api/v1/vod/import/single", json!({
///         "identifier": "detour_1945"
///     })).await;
///
///     assert_eq!(response.status, 200);
/// }
/// ```
pub struct TestFixture {
    /// The Axum router for testing
    pub router: Router,
    /// Mock archive - configure items, collections and failures
    pub source: Arc<MockSourceClient>,
    /// The catalog behind the router
    pub catalog: Arc<SqliteCatalog>,
    /// Temporary directory for the test database
    pub temp_dir: TempDir,
}

/// Response from a test request
#[derive(Debug)]
pub struct TestResponse {
    pub status: StatusCode,
    pub body: Value,
}

/// Configuration for test fixture.
#[derive(Debug, Clone)]
pub struct TestConfig {
    /// Require this API key when set
    pub api_key: Option<String>,
    pub workers: usize,
    pub page_size: u32,
    pub max_batch_size: usize,
}

impl Default for TestConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            workers: 4,
            page_size: 10,
            max_batch_size: 200,
        }
    }
}

impl TestConfig {
    pub fn with_api_key(key: &str) -> Self {
        Self {
            api_key: Some(key.to_string()),
            ..Default::default()
        }
    }
}

impl TestFixture {
    /// Create a new test fixture with default settings.
    pub async fn new() -> Self {
        Self::with_config(TestConfig::default()).await
    }

    /// Create a test fixture with custom configuration.
    pub async fn with_config(test_config: TestConfig) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");

        let auth = AuthConfig {
            method: if test_config.api_key.is_some() {
                AuthMethod::ApiKey
            } else {
                AuthMethod::None
            },
            api_key: test_config.api_key.clone(),
        };

        let config = Config {
            auth: auth.clone(),
            server: ServerConfig {
                host: std::net::IpAddr::V4(std::net::Ipv4Addr::LOCALHOST),
                port: 0, // Not used for in-process testing
            },
            database: DatabaseConfig {
                path: db_path.clone(),
            },
            source: SourceConfig::default(),
            import: ImportConfig {
                workers: test_config.workers,
                page_size: test_config.page_size,
                max_batch_size: test_config.max_batch_size,
                ..Default::default()
            },
            collections: Vec::new(),
        };

        let authenticator: Arc<dyn Authenticator> =
            Arc::from(create_authenticator(&auth).expect("Failed to create authenticator"));
        let source = Arc::new(MockSourceClient::new());
        let catalog = Arc::new(SqliteCatalog::new(&db_path).expect("Failed to create catalog"));

        let state = Arc::new(AppState::new(
            config,
            authenticator,
            Arc::clone(&source) as Arc<dyn SourceClient>,
            Arc::clone(&catalog) as Arc<dyn VideoCatalog>,
            Arc::new(JobStore::new()),
        ));

        Self {
            router: create_router(state),
            source,
            catalog,
            temp_dir,
        }
    }

    /// Send a GET request to the test server.
    pub async fn get(&self, path: &str) -> TestResponse {
        self.request("GET", path, None, &[]).await
    }

    /// Send a GET request with extra headers.
    pub async fn get_with_headers(&self, path: &str, headers: &[(&str, &str)]) -> TestResponse {
        self.request("GET", path, None, headers).await
    }

    /// Send a POST request with JSON body.
    pub async fn post(&self, path: &str, body: Value) -> TestResponse {
        self.request("POST", path, Some(body), &[]).await
    }

    /// Send a PUT request without a body.
    pub async fn put(&self, path: &str) -> TestResponse {
        self.request("PUT", path, None, &[]).await
    }

    /// Send a DELETE request.
    pub async fn delete(&self, path: &str) -> TestResponse {
        self.request("DELETE", path, None, &[]).await
    }

    /// Fetch the raw text body of a GET request.
    pub async fn get_text(&self, path: &str) -> (StatusCode, String) {
        let request = Request::builder()
            .method("GET")
            .uri(path)
            .body(Body::empty())
            .unwrap();
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();
        (status, String::from_utf8_lossy(&bytes).to_string())
    }

    /// Poll a job until it completes or fails.
    pub async fn wait_for_job(&self, job_id: &str) -> TestResponse {
        let path = format!("/api/v1/vod/import/jobs/{}", job_id);
        for _ in 0..500 {
            let response = self.get(&path).await;
            let status = response.body["status"].as_str().unwrap_or_default();
            if status == "completed" || status == "failed" {
                return response;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("Job {} did not finish in time", job_id);
    }

    /// Send a request to the test server.
    async fn request(
        &self,
        method: &str,
        path: &str,
        body: Option<Value>,
        headers: &[(&str, &str)],
    ) -> TestResponse {
        let mut request_builder = Request::builder().method(method).uri(path);
        for (name, value) in headers {
            request_builder = request_builder.header(*name, *value);
        }

        let body = if let Some(json_body) = body {
            request_builder = request_builder.header("Content-Type", "application/json");
            Body::from(serde_json::to_vec(&json_body).unwrap())
        } else {
            Body::empty()
        };

        let request = request_builder.body(body).unwrap();

        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("Failed to send request");

        let status = response.status();
        let body_bytes = response
            .into_body()
            .collect()
            .await
            .expect("Failed to collect body")
            .to_bytes();

        let body: Value = if body_bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body_bytes).unwrap_or(Value::Null)
        };

        TestResponse { status, body }
    }
}

/// Helper to assert a response has expected status.
#[macro_export]
macro_rules! assert_status {
    ($response:expr, $status:expr) => {
        assert_eq!(
            $response.status, $status,
            "Expected status {:?}, got {:?}. Body: {}",
            $status,
            $response.status,
            serde_json::to_string_pretty(&$response.body).unwrap_or_default()
        );
    };
}

/// Helper to assert a JSON path equals expected value.
#[macro_export]
macro_rules! assert_json_path {
    ($json:expr, $path:expr, $expected:expr) => {
        let actual = &$json[$path];
        assert_eq!(
            actual, &$expected,
            "Path '{}' expected {:?}, got {:?}",
            $path, $expected, actual
        );
    };
}
