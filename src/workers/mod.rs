//! 后台定时任务，只在 leader 实例上运行

pub mod detection_reaper;
pub mod session_cleanup;

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio_cron_scheduler::{Job, JobScheduler};

use crate::config::WorkerConfig;
use crate::runtime::SessionRegistry;
use crate::store::Store;

/// 单次任务执行上限
const WORKER_TIMEOUT: Duration = Duration::from_secs(300);
/// 关闭时等待进行中任务的上限
const DRAIN_TIMEOUT: Duration = Duration::from_secs(5);
const DRAIN_POLL: Duration = Duration::from_millis(50);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WorkerName {
    SessionCleanup,
    DetectionReaper,
}

impl WorkerName {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::SessionCleanup => "session_cleanup",
            Self::DetectionReaper => "detection_reaper",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobSpec {
    pub name: WorkerName,
    pub cron: &'static str,
    pub enabled: bool,
}

/// 任务运行期间占住防重入标记和在途计数，drop 时释放（包括 panic）
struct RunGuard {
    running: Arc<AtomicBool>,
    in_flight: Arc<AtomicUsize>,
}

impl RunGuard {
    fn acquire(running: &Arc<AtomicBool>, in_flight: &Arc<AtomicUsize>) -> Option<Self> {
        running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        in_flight.fetch_add(1, Ordering::AcqRel);
        Some(Self {
            running: running.clone(),
            in_flight: in_flight.clone(),
        })
    }
}

impl Drop for RunGuard {
    fn drop(&mut self) {
        self.in_flight.fetch_sub(1, Ordering::AcqRel);
        self.running.store(false, Ordering::Release);
    }
}

pub struct WorkerManager {
    store: Arc<Store>,
    registry: Arc<SessionRegistry>,
    shutdown_rx: broadcast::Receiver<()>,
    config: WorkerConfig,
    idle_timeout: Duration,
    in_flight: Arc<AtomicUsize>,
}

impl WorkerManager {
    pub fn new(
        store: Arc<Store>,
        registry: Arc<SessionRegistry>,
        shutdown_rx: broadcast::Receiver<()>,
        config: &WorkerConfig,
        idle_timeout: Duration,
    ) -> Self {
        Self {
            store,
            registry,
            shutdown_rx,
            config: config.clone(),
            idle_timeout,
            in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn planned_jobs(&self) -> Vec<JobSpec> {
        if !self.config.is_leader {
            return Vec::new();
        }
        vec![
            JobSpec {
                name: WorkerName::SessionCleanup,
                cron: "0 0 * * * *",
                enabled: true,
            },
            JobSpec {
                name: WorkerName::DetectionReaper,
                cron: "0 * * * * *",
                // 0 表示不回收空闲会话
                enabled: !self.idle_timeout.is_zero(),
            },
        ]
    }

    /// 启动调度器并阻塞到收到关闭信号
    pub async fn start(mut self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        if !self.config.is_leader {
            tracing::info!("Not the worker leader; background jobs disabled");
            return Ok(());
        }

        let mut scheduler = JobScheduler::new().await?;
        for spec in self.planned_jobs() {
            if spec.enabled {
                self.schedule(&scheduler, &spec).await;
            } else {
                tracing::info!(worker = spec.name.as_str(), "Worker disabled");
            }
        }
        scheduler.start().await?;
        tracing::info!("Worker manager started");

        let _ = self.shutdown_rx.recv().await;
        scheduler.shutdown().await?;
        self.drain().await;
        Ok(())
    }

    async fn schedule(&self, scheduler: &JobScheduler, spec: &JobSpec) {
        let result = match spec.name {
            WorkerName::SessionCleanup => {
                let store = self.store.clone();
                self.add_job(scheduler, spec, move || {
                    let store = store.clone();
                    async move { session_cleanup::run(&store).await }
                })
                .await
            }
            WorkerName::DetectionReaper => {
                let registry = self.registry.clone();
                let idle_timeout = self.idle_timeout;
                self.add_job(scheduler, spec, move || {
                    let registry = registry.clone();
                    async move {
                        detection_reaper::run(&registry, idle_timeout).await;
                    }
                })
                .await
            }
        };

        match result {
            Ok(()) => tracing::info!(worker = spec.name.as_str(), cron = spec.cron, "Worker scheduled"),
            Err(e) => tracing::error!(worker = spec.name.as_str(), cron = spec.cron, error = %e, "Failed to schedule worker"),
        }
    }

    /// 上一次还没跑完时跳过本次触发
    async fn add_job<F, Fut>(
        &self,
        scheduler: &JobScheduler,
        spec: &JobSpec,
        task: F,
    ) -> Result<(), tokio_cron_scheduler::JobSchedulerError>
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let name = spec.name.as_str();
        let running = Arc::new(AtomicBool::new(false));
        let in_flight = self.in_flight.clone();

        let job = Job::new_async(spec.cron, move |_id, _scheduler| {
            let Some(guard) = RunGuard::acquire(&running, &in_flight) else {
                tracing::warn!(worker = name, "Previous run still in progress, skipping");
                return Box::pin(async {});
            };
            let fut = task();
            Box::pin(async move {
                if tokio::time::timeout(WORKER_TIMEOUT, fut).await.is_err() {
                    tracing::error!(worker = name, timeout_secs = WORKER_TIMEOUT.as_secs(), "Worker timed out");
                }
                drop(guard);
            })
        })?;
        scheduler.add(job).await?;
        Ok(())
    }

    async fn drain(&self) {
        let deadline = tokio::time::Instant::now() + DRAIN_TIMEOUT;
        while self.in_flight.load(Ordering::Acquire) > 0 {
            if tokio::time::Instant::now() >= deadline {
                tracing::warn!(
                    in_flight = self.in_flight.load(Ordering::Acquire),
                    "Workers still running at shutdown"
                );
                return;
            }
            tokio::time::sleep(DRAIN_POLL).await;
        }
        tracing::info!("Worker manager stopped");
    }
}

#[cfg(test)]
mod tests {
    use crate::config::DetectionEnvConfig;

    use super::*;

    fn manager(is_leader: bool, idle_secs: u64) -> (tempfile::TempDir, WorkerManager) {
        let tmp = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(Store::open(tmp.path().join("workers.sled").to_str().unwrap()).unwrap());
        let registry = Arc::new(SessionRegistry::new(store.clone(), DetectionEnvConfig::default()));
        let (tx, _) = broadcast::channel(2);
        let manager = WorkerManager::new(
            store,
            registry,
            tx.subscribe(),
            &WorkerConfig { is_leader },
            Duration::from_secs(idle_secs),
        );
        (tmp, manager)
    }

    #[tokio::test]
    async fn follower_schedules_nothing() {
        let (_tmp, manager) = manager(false, 300);
        assert!(manager.planned_jobs().is_empty());
        manager.start().await.expect("follower start is a no-op");
    }

    #[tokio::test]
    async fn reaper_disabled_when_idle_timeout_is_zero() {
        let (_tmp, manager) = manager(true, 0);
        let jobs = manager.planned_jobs();
        let enabled = |name| jobs.iter().find(|j| j.name == name).map(|j| j.enabled);
        assert_eq!(enabled(WorkerName::DetectionReaper), Some(false));
        assert_eq!(enabled(WorkerName::SessionCleanup), Some(true));
    }

    #[test]
    fn run_guard_blocks_overlap_and_releases_on_drop() {
        let running = Arc::new(AtomicBool::new(false));
        let in_flight = Arc::new(AtomicUsize::new(0));

        let first = RunGuard::acquire(&running, &in_flight).expect("first run");
        assert!(RunGuard::acquire(&running, &in_flight).is_none());
        assert_eq!(in_flight.load(Ordering::Acquire), 1);

        drop(first);
        assert_eq!(in_flight.load(Ordering::Acquire), 0);
        assert!(RunGuard::acquire(&running, &in_flight).is_some());
    }

    #[tokio::test]
    async fn drain_returns_when_idle() {
        let (_tmp, manager) = manager(true, 300);
        tokio::time::timeout(Duration::from_secs(1), manager.drain())
            .await
            .expect("drain with nothing in flight is immediate");
    }
}
