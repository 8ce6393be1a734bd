use std::sync::Arc;

use axum::Router;
use tempfile::TempDir;
use tokio::sync::broadcast;

use blink_health_backend::config::{Config, DetectionEnvConfig, WorkerConfig};
use blink_health_backend::detection::DetectionConfig;
use blink_health_backend::routes::build_router;
use blink_health_backend::runtime::SessionRegistry;
use blink_health_backend::state::AppState;
use blink_health_backend::store::Store;

pub struct TestApp {
    pub app: Router,
    pub state: AppState,
    pub config: Config,
    pub shutdown_tx: broadcast::Sender<()>,
    _temp_dir: TempDir,
}

pub fn test_config(sled_path: &str, detection: DetectionEnvConfig) -> Config {
    // 直接构造 Config，避免 set_var 在并行测试间串扰
    Config {
        host: std::net::IpAddr::V4(std::net::Ipv4Addr::new(127, 0, 0, 1)),
        port: 3000,
        log_level: "info".to_string(),
        enable_file_logs: false,
        log_dir: "./logs".to_string(),
        sled_path: sled_path.to_string(),
        jwt_secret: format!("integration-test-jwt-secret-{}", uuid::Uuid::new_v4()),
        jwt_expires_in_hours: 24,
        cors_origin: "http://localhost:5173".to_string(),
        worker: WorkerConfig { is_leader: false },
        detection,
    }
}

pub async fn spawn_with_detection(detection: DetectionEnvConfig) -> TestApp {
    let temp_dir = tempfile::tempdir().expect("tempdir");
    let sled_path = temp_dir.path().join("blink-test.sled");
    let config = test_config(&sled_path.to_string_lossy(), detection);

    let store = Arc::new(Store::open(&config.sled_path).expect("open store"));
    store.run_migrations().expect("run migrations");

    let registry = Arc::new(SessionRegistry::new(
        store.clone(),
        config.detection.clone(),
    ));
    let (shutdown_tx, _) = broadcast::channel::<()>(8);
    let state = AppState::new(store, registry, &config, shutdown_tx.clone());
    let app = build_router(state.clone());

    TestApp {
        app,
        state,
        config,
        shutdown_tx,
        _temp_dir: temp_dir,
    }
}

pub async fn spawn_test_app() -> TestApp {
    spawn_with_detection(DetectionEnvConfig::default()).await
}

/// 1 秒窗口，便于在测试里等到结论
pub async fn spawn_fast_window_app() -> TestApp {
    spawn_with_detection(DetectionEnvConfig {
        defaults: DetectionConfig {
            window_duration_seconds: 1,
            ..DetectionConfig::default()
        },
        ..DetectionEnvConfig::default()
    })
    .await
}
