//! Router configuration and server setup.

use std::future::Future;

use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use tower_http::cors::{Any, CorsLayer};
use tracing::info;

use crate::config::ApiConfig;
use crate::handlers;
use crate::state::AppState;

/// Creates the API router with all routes configured.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let admin = Router::new()
        .route("/admin/memory-stats", get(handlers::memory_stats))
        .route("/admin/memory-detailed", get(handlers::memory_detailed))
        .route("/admin/disk-usage", get(handlers::disk_usage))
        .route("/admin/memory-cleanup", post(handlers::memory_cleanup))
        .route("/admin/force-gc", post(handlers::force_gc))
        .route("/admin/file-cleanup", post(handlers::file_cleanup))
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            handlers::require_admin_token,
        ));

    Router::new()
        .route("/", get(handlers::root))
        .route("/health", get(handlers::health))
        // Parser
        .route("/api/parser/parse", post(handlers::parse))
        .route("/api/parser/parse-and-save", post(handlers::parse_and_save))
        .route("/api/parser/list-files", get(handlers::list_files))
        // Reports
        .route("/api/reports/generate", post(handlers::generate))
        .route(
            "/api/reports/generate-from-file",
            post(handlers::generate_from_file),
        )
        .route(
            "/api/reports/parse-and-generate",
            post(handlers::parse_and_generate),
        )
        .route("/api/reports/types", get(handlers::report_types))
        // Jobs
        .route("/api/jobs/:id", get(handlers::get_job))
        .merge(admin)
        .layer(cors)
        .with_state(state)
}

/// Starts the API server and runs until `shutdown` resolves.
pub async fn serve<F>(config: ApiConfig, state: AppState, shutdown: F) -> Result<(), std::io::Error>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = config.bind_address();
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("API server listening on {}", addr);
    axum::serve(listener, create_router(state))
        .with_graceful_shutdown(shutdown)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::test_support::make_test_state;
    use axum::http::{header, HeaderName, HeaderValue, StatusCode};
    use axum_test::TestServer;
    use digest_models::JobStatus;
    use digest_persistence::ArtifactStore;
    use serde_json::{json, Value};

    fn admin_header() -> HeaderName {
        HeaderName::from_static(handlers::ADMIN_TOKEN_HEADER)
    }

    fn server(config: ApiConfig, scraped: usize) -> (tempfile::TempDir, AppState, TestServer) {
        let (dir, state) = make_test_state(config, scraped);
        let server = TestServer::new(create_router(state.clone())).unwrap();
        (dir, state, server)
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let (_dir, _state, server) = server(ApiConfig::default(), 0);

        let response = server.get("/health").await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["status"], "ok");
        assert!(!body["version"].as_str().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_root_lists_endpoints() {
        let (_dir, _state, server) = server(ApiConfig::default(), 0);
        let body: Value = server.get("/").await.json();
        assert!(body["endpoints"]
            .as_array()
            .unwrap()
            .contains(&json!("/api/reports/parse-and-generate")));
    }

    #[tokio::test]
    async fn test_report_types() {
        let (_dir, _state, server) = server(ApiConfig::default(), 0);

        let response = server.get("/api/reports/types").await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["report_types"].as_array().unwrap().len(), 4);
        assert_eq!(body["models"][0]["id"], "flash_2_5");
        assert_eq!(body["channel_sources"].as_array().unwrap().len(), 6);
    }

    #[tokio::test]
    async fn test_parse_requires_window() {
        let (_dir, _state, server) = server(ApiConfig::default(), 2);

        let response = server.post("/api/parser/parse").json(&json!({})).await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = server.post("/api/parser/parse").json(&json!({"days": 45})).await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_parse_returns_messages() {
        let (_dir, _state, server) = server(ApiConfig::default(), 2);

        let response = server
            .post("/api/parser/parse")
            .json(&json!({"period": "yesterday"}))
            .await;
        response.assert_status_ok();

        let body: Value = response.json();
        assert_eq!(body["total_messages"], 2);
        assert_eq!(body["start_date"], "2025-03-09T00:00:00+03:00");
    }

    #[tokio::test]
    async fn test_parse_and_save_then_list() {
        let (_dir, _state, server) = server(ApiConfig::default(), 3);

        let first: Value = server
            .post("/api/parser/parse-and-save")
            .json(&json!({"days": 3, "channel_source": "source_2"}))
            .await
            .json();
        assert_eq!(first["output_file"], "raw_parses/2025-03-07_to_2025-03-10_source_2.json");
        assert_eq!(first["from_cache"], false);

        let second: Value = server
            .post("/api/parser/parse-and-save")
            .json(&json!({"days": 3, "channel_source": "source_2"}))
            .await
            .json();
        assert_eq!(second["from_cache"], true);

        let listing: Value = server.get("/api/parser/list-files").await.json();
        assert_eq!(listing["raw_parses_files"].as_array().unwrap().len(), 1);
        assert!(listing["temp_files"].as_array().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_parse_and_generate_validation() {
        let (_dir, _state, server) = server(ApiConfig::default(), 2);

        let response = server
            .post("/api/reports/parse-and-generate")
            .json(&json!({"days": 2}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = server
            .post("/api/reports/parse-and-generate")
            .json(&json!({"days": 2, "report_type": "weather"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
        let body: Value = response.json();
        assert!(body["error"].as_str().unwrap().contains("custom_task_2"));

        let response = server
            .post("/api/reports/parse-and-generate")
            .json(&json!({"report_type": "news"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_parse_and_generate_document_and_job() {
        let (_dir, state, server) = server(ApiConfig::default(), 4);

        let response = server
            .post("/api/reports/parse-and-generate")
            .json(&json!({"period": "yesterday", "report_type": "news", "model_alias": "unknown"}))
            .await;
        response.assert_status_ok();

        let disposition = response.header("content-disposition");
        assert!(disposition
            .to_str()
            .unwrap()
            .contains("report_news_2025-03-10.md"));
        assert!(response.text().contains("4 cards"));

        let job_id = response.header("x-job-id").to_str().unwrap().to_string();
        assert_eq!(state.registry().status(&job_id).await, Some(JobStatus::Completed));

        let job: Value = server.get(&format!("/api/jobs/{}", job_id)).await.json();
        assert_eq!(job["status"], "completed");
        assert_eq!(job["details"]["message_count"], 4);
        assert!(job["details"].get("report_data").is_none());
    }

    #[tokio::test]
    async fn test_parse_and_generate_empty_window() {
        let (_dir, _state, server) = server(ApiConfig::default(), 0);

        let response = server
            .post("/api/reports/parse-and-generate")
            .json(&json!({"period": "yesterday", "report_type": "events"}))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);
        let body: Value = response.json();
        assert!(body["error"].as_str().unwrap().contains("no messages in period"));
    }

    #[tokio::test]
    async fn test_paid_mode_without_key_is_unavailable() {
        let (_dir, _state, server) = server(ApiConfig::default(), 1);

        let response = server
            .post("/api/reports/parse-and-generate")
            .json(&json!({"days": 1, "report_type": "news", "provider_mode": "paid"}))
            .await;
        response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_generate_from_messages() {
        let (_dir, _state, server) = server(ApiConfig::default(), 0);

        let response = server
            .post("/api/reports/generate")
            .json(&json!({"report_type": "news", "messages": []}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);

        let response = server
            .post("/api/reports/generate")
            .json(&json!({
                "report_type": "custom_task_1",
                "messages": [{
                    "channel_name": "@a",
                    "message_id": 1,
                    "publication_date": "2025-03-09T12:00:00+03:00",
                    "text": "hello"
                }]
            }))
            .await;
        response.assert_status_ok();
        assert!(response.text().contains("1 cards"));
    }

    #[tokio::test]
    async fn test_generate_from_file() {
        let (_dir, _state, server) = server(ApiConfig::default(), 2);

        let saved: Value = server
            .post("/api/parser/parse-and-save")
            .json(&json!({"period": "yesterday"}))
            .await
            .json();
        let key = saved["output_file"].as_str().unwrap();

        let response = server
            .post("/api/reports/generate-from-file")
            .json(&json!({"source_file": key, "report_type": "news"}))
            .await;
        response.assert_status_ok();

        let response = server
            .post("/api/reports/generate-from-file")
            .json(&json!({"source_file": "raw_parses/missing.json", "report_type": "news"}))
            .await;
        response.assert_status(StatusCode::NOT_FOUND);

        let response = server
            .post("/api/reports/generate-from-file")
            .json(&json!({"source_file": "../../etc/passwd", "report_type": "news"}))
            .await;
        response.assert_status(StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_unknown_job_not_found() {
        let (_dir, _state, server) = server(ApiConfig::default(), 0);
        let response = server.get("/api/jobs/u1_123").await;
        response.assert_status(StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_admin_open_without_token() {
        let (_dir, _state, server) = server(ApiConfig::default(), 0);

        let stats: Value = server.get("/admin/memory-stats").await.json();
        assert_eq!(stats["active_jobs"], 0);
        assert!(stats["last_cycle"].is_null());
        let report: Value = server.post("/admin/memory-cleanup").await.json();
        assert_eq!(report["evicted"], 0);
        server.post("/admin/force-gc").await.assert_status_ok();
        server.post("/admin/file-cleanup").await.assert_status_ok();
    }

    #[tokio::test]
    async fn test_admin_token_required() {
        let config = ApiConfig::default().with_admin_token(Some("s3cret".into()));
        let (_dir, state, server) = server(config, 0);
        state
            .registry()
            .put("u1_123", Some(json!({"stage": "fetching"})), JobStatus::Processing)
            .await;

        server
            .get("/admin/memory-stats")
            .await
            .assert_status(StatusCode::UNAUTHORIZED);
        server
            .get("/admin/memory-stats")
            .add_header(admin_header(), HeaderValue::from_static("wrong"))
            .await
            .assert_status(StatusCode::UNAUTHORIZED);

        let response = server
            .get("/admin/memory-stats")
            .add_header(admin_header(), HeaderValue::from_static("s3cret"))
            .await;
        response.assert_status_ok();
        let stats: Value = response.json();
        assert_eq!(stats["active_jobs"], 1);
        assert_eq!(stats["ttl_tracked"], 0);

        server.get("/health").await.assert_status_ok();
    }

    #[tokio::test]
    async fn test_memory_detailed() {
        let (_dir, _state, server) = server(ApiConfig::default(), 0);

        let response = server.get("/admin/memory-detailed").await;
        response.assert_status_ok();
        let body: Value = response.json();
        for key in ["process", "system", "working_set_estimate"] {
            assert!(body.get(key).is_some(), "{key}");
        }
        if cfg!(target_os = "linux") {
            assert!(body["system"]["total_bytes"].as_u64().unwrap() > 0);
            assert!(body["working_set_estimate"]["total_mb"].as_f64().unwrap() > 0.0);
        }
    }

    #[tokio::test]
    async fn test_disk_usage() {
        let (_dir, state, server) = server(ApiConfig::default(), 0);
        let store = state.pipeline.fetcher().store();
        for i in 0..12 {
            store
                .write(&format!("raw_parses/window_{:02}.json", i), &vec![b'x'; 100 * (i + 1)])
                .unwrap();
        }
        store.write("temp/today_cache.json", b"[]").unwrap();

        let body: Value = server.get("/admin/disk-usage").await.json();

        assert_eq!(body["raw_parses"]["file_count"], 12);
        assert_eq!(body["raw_parses"]["total_bytes"], 7800);
        let largest = body["raw_parses"]["largest"].as_array().unwrap();
        assert_eq!(largest.len(), 10);
        assert_eq!(largest[0]["key"], "raw_parses/window_11.json");
        assert_eq!(body["temp"]["file_count"], 1);
        assert_eq!(body["total_files"], 13);
    }

    #[tokio::test]
    async fn test_diagnostics_behind_admin_token() {
        let config = ApiConfig::default().with_admin_token(Some("s3cret".into()));
        let (_dir, _state, server) = server(config, 0);

        for path in ["/admin/memory-detailed", "/admin/disk-usage"] {
            server.get(path).await.assert_status(StatusCode::UNAUTHORIZED);
            server
                .get(path)
                .add_header(admin_header(), HeaderValue::from_static("s3cret"))
                .await
                .assert_status_ok();
        }
    }

    #[tokio::test]
    async fn test_memory_stats_reports_last_cycle() {
        let (_dir, state, _) = server(ApiConfig::default(), 0);
        let (tx, rx) = tokio::sync::watch::channel(None);
        let server = TestServer::new(create_router(state.with_reclaim_cycles(rx))).unwrap();

        tx.send_replace(Some(digest_core::CycleReport {
            cycle: 5,
            deep: true,
            report: digest_core::ReclaimReport {
                evicted: 0,
                released_bytes: 0,
                pass: digest_core::PassKind::Full,
                heap_trimmed: false,
                rss_before_mb: None,
                rss_after_mb: None,
            },
        }));

        let stats: Value = server.get("/admin/memory-stats").await.json();
        assert_eq!(stats["last_cycle"]["cycle"], 5);
        assert_eq!(stats["last_cycle"]["deep"], true);
        assert_eq!(stats["last_cycle"]["pass"], "full");
    }

    #[tokio::test]
    async fn test_cors_headers() {
        let (_dir, _state, server) = server(ApiConfig::default(), 0);
        let response = server
            .get("/health")
            .add_header(header::ORIGIN, HeaderValue::from_static("http://example.com"))
            .await;
        assert!(response.headers().contains_key("access-control-allow-origin"));
    }
}
