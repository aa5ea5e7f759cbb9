//! HTTP trigger API.
//!
//! Exposes:
//! - `POST /api/orchestrators/process_blob` to start an instance
//! - `GET /api/instances/:id` for its status
//! - `POST /api/events/blob` for Event Grid deliveries
//! - `GET /api/health`

mod handlers;
mod routes;

pub use routes::create_router;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::info;

use crate::config::Settings;
use crate::orchestrator::Orchestrator;
use crate::trigger::{InstanceRegistry, Launcher, LocalWatcher};

/// Shared state for the web server.
#[derive(Clone)]
pub struct AppState {
    pub launcher: Launcher,
}

impl AppState {
    pub fn new(launcher: Launcher) -> Self {
        Self { launcher }
    }
}

/// Start the web server, and the local watcher when `watch_local` is set.
///
/// Ctrl-C stops accepting requests and cancels in-flight polling.
pub async fn serve(settings: &Settings, host: &str, port: u16, watch_local: bool) -> anyhow::Result<()> {
    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let orchestrator =
        Orchestrator::from_settings(settings)?.with_shutdown(shutdown_rx.clone());
    let launcher = Launcher::new(Arc::new(orchestrator), settings.storage.clone()).with_instances(
        Arc::new(InstanceRegistry::with_capacity(settings.pipeline.retained_instances)),
    );

    if watch_local {
        let watcher = LocalWatcher::new(
            &settings.storage,
            Duration::from_secs(settings.pipeline.watch_interval_secs),
        );
        tokio::spawn(watcher.run(launcher.clone(), shutdown_rx));
    }

    let app = create_router(AppState::new(launcher));

    let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown requested");
            let _ = shutdown_tx.send(true);
        })
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use axum::body::Body;
    use axum::http::{header, Request, StatusCode};
    use tower::ServiceExt;

    use crate::config::{FeatureToggles, StorageConfig};
    use crate::enrichment::EnrichmentAdapter;
    use crate::error::Result;
    use crate::extraction::ExtractorRegistry;
    use crate::models::FileDescriptor;
    use crate::retry::RetryPolicy;
    use crate::storage::{EnrichmentRecord, ResultSink};
    use crate::trigger::RuntimeStatus;

    struct EchoEnricher;

    #[async_trait]
    impl EnrichmentAdapter for EchoEnricher {
        async fn enrich(&self, text: &str, _correlation_id: &str) -> Result<String> {
            Ok(format!("Summary: {}", text))
        }
    }

    struct NullSink;

    #[async_trait]
    impl ResultSink for NullSink {
        async fn persist(&self, file: &FileDescriptor, _record: &EnrichmentRecord) -> Result<String> {
            Ok(format!("final/{}.json", file.stem()))
        }
    }

    fn setup_test_app() -> (axum::Router, Launcher) {
        let orchestrator = Orchestrator::new(
            FeatureToggles::default(),
            RetryPolicy::fixed(1, Duration::from_millis(1)),
            ExtractorRegistry::new(),
            Arc::new(EchoEnricher),
            Arc::new(NullSink),
        );
        let storage = StorageConfig {
            account_url: Some("https://acct.blob.core.windows.net".into()),
            ..StorageConfig::default()
        };
        let launcher = Launcher::new(Arc::new(orchestrator), storage);
        (create_router(AppState::new(launcher.clone())), launcher)
    }

    async fn wait_terminal(launcher: &Launcher, id: &str) {
        for _ in 0..200 {
            if let Some(record) = launcher.instances().get(id).await {
                if record.runtime_status.is_terminal() {
                    return;
                }
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        panic!("instance {} never finished", id);
    }

    async fn body_json(response: axum::response::Response) -> serde_json::Value {
        let body = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&body).unwrap()
    }

    fn post(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::HOST, "localhost:7071")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (app, _) = setup_test_app();
        let response = app
            .oneshot(Request::builder().uri("/api/health").body(Body::empty()).unwrap())
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_start_rejects_invalid_json() {
        let (app, launcher) = setup_test_app();

        for body in ["{not json", r#"{"uri": "https://acct/bronze/a.wav"}"#, r#"{"name": ""}"#] {
            let response = app
                .clone()
                .oneshot(post("/api/orchestrators/process_blob", body))
                .await
                .unwrap();
            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{}", body);
            let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
                .await
                .unwrap();
            assert_eq!(&bytes[..], b"Invalid JSON.");
        }
        assert_eq!(launcher.instances().len().await, 0);
    }

    #[tokio::test]
    async fn test_start_returns_status_handle() {
        let (app, launcher) = setup_test_app();
        let response = app
            .clone()
            .oneshot(post("/api/orchestrators/process_blob", r#"{"name": "report.xyz"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let location = response
            .headers()
            .get(header::LOCATION)
            .unwrap()
            .to_str()
            .unwrap()
            .to_string();
        let json = body_json(response).await;
        let id = json["id"].as_str().unwrap().to_string();
        assert_eq!(
            json["statusQueryGetUri"],
            format!("http://localhost:7071/api/instances/{}", id)
        );
        assert_eq!(location, json["statusQueryGetUri"].as_str().unwrap());

        wait_terminal(&launcher, &id).await;
        let record = launcher.instances().get(&id).await.unwrap();
        assert_eq!(
            record.input.source_uri,
            "https://acct.blob.core.windows.net/bronze/report.xyz"
        );

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/api/instances/{}", id))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let json = body_json(response).await;
        assert_eq!(json["runtimeStatus"], "Completed");
        assert_eq!(json["output"]["status"], "skipped");
        assert_eq!(json["output"]["error"], "Unsupported file type: xyz");
    }

    #[tokio::test]
    async fn test_status_uri_uses_forwarded_scheme() {
        let (app, launcher) = setup_test_app();
        let mut request = post("/api/orchestrators/process_blob", r#"{"name": "report.xyz"}"#);
        request
            .headers_mut()
            .insert("x-forwarded-proto", "https, http".parse().unwrap());

        let response = app.oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let json = body_json(response).await;
        let id = json["id"].as_str().unwrap().to_string();
        assert_eq!(
            json["statusQueryGetUri"],
            format!("https://localhost:7071/api/instances/{}", id)
        );
        wait_terminal(&launcher, &id).await;
    }

    #[tokio::test]
    async fn test_failed_instance_reports_failed() {
        // No speech adapter registered: the extract step fails on configuration.
        let (_, launcher) = setup_test_app();
        let id = launcher
            .start(launcher.descriptor("call_42.wav", None))
            .await;
        wait_terminal(&launcher, &id).await;
        let record = launcher.instances().get(&id).await.unwrap();
        assert_eq!(record.runtime_status, RuntimeStatus::Failed);
        let output = record.output.unwrap();
        assert_eq!(output.failure.unwrap().step, "extract");
    }

    #[tokio::test]
    async fn test_unknown_instance_is_404() {
        let (app, _) = setup_test_app();
        let response = app
            .oneshot(
                Request::builder()
                    .uri("/api/instances/does-not-exist")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_event_grid_validation() {
        let (app, _) = setup_test_app();
        let body = r#"[{
            "id": "1",
            "eventType": "Microsoft.EventGrid.SubscriptionValidationEvent",
            "subject": "",
            "data": {"validationCode": "abc-123"}
        }]"#;
        let response = app.oneshot(post("/api/events/blob", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_json(response).await["validationResponse"], "abc-123");
    }

    #[tokio::test]
    async fn test_event_grid_blob_created_starts_instance() {
        let (app, launcher) = setup_test_app();
        let body = r#"[{
            "id": "1",
            "eventType": "Microsoft.Storage.BlobCreated",
            "subject": "/blobServices/default/containers/bronze/blobs/notes.txt",
            "data": {"url": "https://acct.blob.core.windows.net/bronze/notes.txt"}
        }]"#;
        let response = app.oneshot(post("/api/events/blob", body)).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let json = body_json(response).await;
        let id = json["started"][0].as_str().unwrap().to_string();
        wait_terminal(&launcher, &id).await;
        assert_eq!(launcher.instances().len().await, 1);
    }
}
