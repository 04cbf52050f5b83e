//! Test application factory for integration tests.

use axum::{
    body::Body,
    http::{HeaderMap, Request, StatusCode},
    Router,
};
use http_body_util::BodyExt;
use std::sync::Arc;
use tower::ServiceExt;

use inkframe::config::ServerConfig;
use inkframe::pipeline::ImagePipeline;
use inkframe::server::{build_router, AppState};
use inkframe::services::{
    CommandQueue, CurrentImageService, DeviceRegistry, FirmwareService, Notifier, SearchFederator,
};
use inkframe::sources::ArtSource;
use inkframe::store::JsonStore;

pub struct TestAppBuilder {
    api_key: Option<String>,
    sources: Vec<Arc<dyn ArtSource>>,
    firmware: Option<Vec<u8>>,
}

impl TestAppBuilder {
    pub fn api_key(mut self, key: &str) -> Self {
        self.api_key = Some(key.to_string());
        self
    }

    pub fn sources(mut self, sources: Vec<Arc<dyn ArtSource>>) -> Self {
        self.sources = sources;
        self
    }

    pub fn firmware(mut self, bytes: &[u8]) -> Self {
        self.firmware = Some(bytes.to_vec());
        self
    }

    pub async fn build(self) -> TestApp {
        let dir = tempfile::tempdir().expect("tempdir");
        let mut config = ServerConfig::for_data_dir(dir.path().join("data"));
        config.api_key = self.api_key;
        config.firmware_path = dir.path().join("firmware.bin");
        if let Some(bytes) = &self.firmware {
            std::fs::write(&config.firmware_path, bytes).expect("write firmware");
        }

        let config = Arc::new(config);
        let store = Arc::new(JsonStore::open(&config.data_dir).expect("open store"));
        let http = reqwest::Client::new();
        let current = Arc::new(CurrentImageService::new(store.clone()));
        let notifier = Arc::new(Notifier::new(http.clone(), None));
        let devices = Arc::new(DeviceRegistry::new(store.clone(), notifier));
        let commands = Arc::new(CommandQueue::new(store.clone()));
        let federator = Arc::new(SearchFederator::new(self.sources, 50));
        let pipeline = Arc::new(ImagePipeline::new(2));
        let firmware = Arc::new(
            FirmwareService::new(
                store.clone(),
                config.firmware_path.clone(),
                Some("v9".into()),
                Some("2025-06-01".into()),
            )
            .await
            .expect("firmware service"),
        );

        let state = AppState {
            config,
            store,
            current,
            devices,
            commands,
            federator,
            pipeline,
            firmware,
            http,
        };
        TestApp {
            router: build_router(state.clone()),
            state,
            _data_dir: dir,
        }
    }
}

pub struct TestApp {
    router: Router,
    pub state: AppState,
    _data_dir: tempfile::TempDir,
}

impl TestApp {
    pub fn builder() -> TestAppBuilder {
        TestAppBuilder {
            api_key: None,
            sources: Vec::new(),
            firmware: None,
        }
    }

    pub async fn new() -> Self {
        Self::builder().build().await
    }

    pub async fn get(&self, path: &str) -> TestResponse {
        self.request(Request::get(path).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_json(&self, path: &str, headers: &[(&str, &str)], body: &str) -> TestResponse {
        self.json_request("POST", path, headers, body).await
    }

    pub async fn put_json(&self, path: &str, headers: &[(&str, &str)], body: &str) -> TestResponse {
        self.json_request("PUT", path, headers, body).await
    }

    pub async fn patch_json(
        &self,
        path: &str,
        headers: &[(&str, &str)],
        body: &str,
    ) -> TestResponse {
        self.json_request("PATCH", path, headers, body).await
    }

    pub async fn delete(&self, path: &str, headers: &[(&str, &str)]) -> TestResponse {
        let mut builder = Request::delete(path);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.request(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_empty(&self, path: &str, headers: &[(&str, &str)]) -> TestResponse {
        let mut builder = Request::post(path);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.request(builder.body(Body::empty()).unwrap()).await
    }

    pub async fn post_body(
        &self,
        path: &str,
        headers: &[(&str, &str)],
        content_type: &str,
        body: Vec<u8>,
    ) -> TestResponse {
        let mut builder = Request::post(path).header("Content-Type", content_type);
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.request(builder.body(Body::from(body)).unwrap()).await
    }

    async fn json_request(
        &self,
        method: &str,
        path: &str,
        headers: &[(&str, &str)],
        body: &str,
    ) -> TestResponse {
        let mut builder = Request::builder()
            .method(method)
            .uri(path)
            .header("Content-Type", "application/json");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        self.request(builder.body(Body::from(body.to_string())).unwrap())
            .await
    }

    async fn request(&self, request: Request<Body>) -> TestResponse {
        let response = self
            .router
            .clone()
            .oneshot(request)
            .await
            .expect("request failed");
        let status = response.status();
        let headers = response.headers().clone();
        let body = response
            .into_body()
            .collect()
            .await
            .expect("read body")
            .to_bytes()
            .to_vec();
        TestResponse {
            status,
            headers,
            body,
        }
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl TestResponse {
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_slice(&self.body).unwrap_or_else(|e| {
            panic!(
                "response was not JSON ({e}): {}",
                String::from_utf8_lossy(&self.body)
            )
        })
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}
