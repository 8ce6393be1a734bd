use std::sync::Arc;
use std::time::Instant;

use tokio::sync::broadcast;

use crate::config::Config;
use crate::runtime::SessionRegistry;
use crate::store::Store;

/// 处理器共享的服务状态，克隆只增加引用计数
#[derive(Clone)]
pub struct AppState {
    store: Arc<Store>,
    registry: Arc<SessionRegistry>,
    config: Arc<Config>,
    shutdown_tx: broadcast::Sender<()>,
    started_at: Instant,
}

impl AppState {
    pub fn new(
        store: Arc<Store>,
        registry: Arc<SessionRegistry>,
        config: &Config,
        shutdown_tx: broadcast::Sender<()>,
    ) -> Self {
        Self {
            store,
            registry,
            config: Arc::new(config.clone()),
            shutdown_tx,
            started_at: Instant::now(),
        }
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn registry(&self) -> &SessionRegistry {
        &self.registry
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn shutdown_rx(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DetectionEnvConfig;

    #[tokio::test]
    async fn every_handler_sees_the_same_shutdown_signal() {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(Store::open(tmp.path().join("state.sled").to_str().unwrap()).unwrap());
        let registry = Arc::new(SessionRegistry::new(store.clone(), DetectionEnvConfig::default()));
        let (tx, _) = broadcast::channel(4);
        let state = AppState::new(store, registry, &Config::from_env(), tx.clone());

        let mut sse_rx = state.shutdown_rx();
        let mut other_rx = state.clone().shutdown_rx();
        tx.send(()).unwrap();
        sse_rx.recv().await.unwrap();
        other_rx.recv().await.unwrap();

        assert_eq!(state.registry().active_count().await, 0);
        assert!(state.uptime_secs() < 5);
    }
}
