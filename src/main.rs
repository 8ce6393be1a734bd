use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use blink_health_backend::config::Config;
use blink_health_backend::logging::{init_tracing, LogConfig};
use blink_health_backend::routes::build_router;
use blink_health_backend::runtime::SessionRegistry;
use blink_health_backend::state::AppState;
use blink_health_backend::store::{migrate, Store};
use blink_health_backend::workers::WorkerManager;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tower::ServiceBuilder;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any, CorsLayer};
use tower_http::set_header::SetResponseHeaderLayer;
use tower_http::trace::TraceLayer;

/// 纯 JSON / SSE 接口，不返回任何可执行内容
const CSP_HEADER: &str = "default-src 'none'; frame-ancestors 'none'";

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let config = Config::from_env();
    init_tracing(&LogConfig::from(&config));
    tracing::info!(version = env!("CARGO_PKG_VERSION"), config = ?config, "Starting blink-health-backend");

    // 环境变量里的默认检测参数越界时拒绝启动
    if let Err(e) = config.detection.defaults.validate() {
        tracing::error!(error = %e, "Invalid detection defaults");
        std::process::exit(1);
    }

    let store = match open_store(&config) {
        Ok(store) => store,
        Err(e) => {
            tracing::error!(error = %e, path = %config.sled_path, "Failed to prepare store");
            std::process::exit(1);
        }
    };

    let (shutdown_tx, _) = broadcast::channel::<()>(8);
    let registry = Arc::new(SessionRegistry::new(store.clone(), config.detection.clone()));
    let state = AppState::new(store.clone(), registry.clone(), &config, shutdown_tx.clone());

    let workers = config
        .worker
        .is_leader
        .then(|| spawn_workers(&config, store.clone(), registry.clone(), &shutdown_tx));

    let app = with_http_layers(build_router(state), &config);
    let addr = SocketAddr::new(config.host, config.port);
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(listener) => listener,
        Err(e) => {
            tracing::error!(%addr, error = %e, "Failed to bind");
            std::process::exit(1);
        }
    };
    tracing::info!(%addr, "Listening");

    if let Err(e) = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_tx.clone()))
        .await
    {
        tracing::error!(error = %e, "HTTP server crashed");
    }

    // 先停检测会话，让每个会话的最终计数落库
    registry.shutdown_all().await;
    if let Some(handle) = workers {
        if tokio::time::timeout(Duration::from_secs(10), handle).await.is_err() {
            tracing::warn!("Workers did not drain in time");
        }
    }
    if let Err(e) = store.flush() {
        tracing::error!(error = %e, "Failed to flush store before exit");
    }
    tracing::info!("Shutdown complete");
}

/// 打开数据库、执行迁移，并把上次进程遗留的运行中会话标记为停止
fn open_store(config: &Config) -> Result<Arc<Store>, blink_health_backend::store::StoreError> {
    let store = Store::open(&config.sled_path)?;
    store.run_migrations()?;
    let closed = migrate::close_interrupted_sessions(&store)?;
    if closed > 0 {
        tracing::warn!(closed, "Closed detection sessions left running by previous process");
    }
    Ok(Arc::new(store))
}

fn spawn_workers(
    config: &Config,
    store: Arc<Store>,
    registry: Arc<SessionRegistry>,
    shutdown_tx: &broadcast::Sender<()>,
) -> JoinHandle<()> {
    let manager = WorkerManager::new(
        store,
        registry,
        shutdown_tx.subscribe(),
        &config.worker,
        Duration::from_secs(config.detection.idle_timeout_secs),
    );
    // worker 出错只记日志，不影响 HTTP 服务
    tokio::spawn(async move {
        if let Err(e) = manager.start().await {
            tracing::error!(error = %e, "Worker manager failed");
        }
    })
}

fn with_http_layers(router: Router, config: &Config) -> Router {
    router.layer(
        ServiceBuilder::new()
            .layer(CatchPanicLayer::new())
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer(config))
            .layer(SetResponseHeaderLayer::overriding(
                header::X_CONTENT_TYPE_OPTIONS,
                HeaderValue::from_static("nosniff"),
            ))
            .layer(SetResponseHeaderLayer::overriding(
                header::CONTENT_SECURITY_POLICY,
                HeaderValue::from_static(CSP_HEADER),
            )),
    )
}

/// `*` 仅用于本地开发，此时不允许携带 cookie
fn cors_layer(config: &Config) -> CorsLayer {
    let base = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT]);

    if config.cors_origin.trim() == "*" {
        return base.allow_origin(Any);
    }
    match config.cors_origin.parse::<HeaderValue>() {
        Ok(origin) => base.allow_origin(origin).allow_credentials(true),
        Err(e) => {
            tracing::error!(origin = %config.cors_origin, error = %e, "Invalid CORS_ORIGIN, cross-origin requests disabled");
            base
        }
    }
}

async fn shutdown_signal(shutdown_tx: broadcast::Sender<()>) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };
    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("Shutdown signal received");
    let _ = shutdown_tx.send(());
}
