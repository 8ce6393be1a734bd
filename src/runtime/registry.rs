use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use chrono::Utc;
use serde::Serialize;
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio::task::JoinHandle;
use tokio::time::Instant;

use crate::config::DetectionEnvConfig;
use crate::constants::SESSION_STOP_TIMEOUT_SECS;
use crate::detection::clock::{Clock, MonotonicClock};
use crate::detection::control::SessionControl;
use crate::detection::landmarks::{ContourFrame, ReportedLandmarks};
use crate::detection::pipeline::{
    FrameEnvelope, FrameOutcome, FramePipeline, LiveStatus, SessionEvent,
};
use crate::detection::{DetectionConfig, EyeHealthMonitor};
use crate::runtime::notifier::StoreNotifier;
use crate::runtime::RuntimeError;
use crate::store::operations::detection_sessions::{DetectionSessionRecord, DetectionStatus};
use crate::store::{Store, StoreError};

/// 一个活动会话在内存中的句柄
pub struct SessionHandle {
    pub session_id: String,
    pub user_id: String,
    frames: mpsc::Sender<FrameEnvelope<ContourFrame>>,
    control: SessionControl,
    events: broadcast::Sender<SessionEvent>,
    status: watch::Receiver<LiveStatus>,
    last_frame_at: Mutex<Instant>,
    task: Mutex<Option<JoinHandle<()>>>,
}

impl SessionHandle {
    fn touch(&self) {
        *self
            .last_frame_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Instant::now();
    }

    fn idle_for(&self) -> Duration {
        self.last_frame_at
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .elapsed()
    }

    pub fn live_status(&self) -> LiveStatus {
        *self.status.borrow()
    }
}

/// 查询接口返回：持久化记录，运行中的会话附带实时状态
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionView {
    #[serde(flatten)]
    pub record: DetectionSessionRecord,
    pub live: Option<LiveStatus>,
}

pub struct SessionRegistry {
    store: Arc<Store>,
    settings: DetectionEnvConfig,
    sessions: RwLock<HashMap<String, Arc<SessionHandle>>>,
}

impl SessionRegistry {
    pub fn new(store: Arc<Store>, settings: DetectionEnvConfig) -> Self {
        Self {
            store,
            settings,
            sessions: RwLock::new(HashMap::new()),
        }
    }

    pub fn defaults(&self) -> &DetectionConfig {
        &self.settings.defaults
    }

    pub async fn active_count(&self) -> usize {
        self.sessions.read().await.len()
    }

    /// 配置须已校验
    pub async fn start(
        &self,
        user_id: &str,
        config: DetectionConfig,
    ) -> Result<DetectionSessionRecord, RuntimeError> {
        let mut sessions = self.sessions.write().await;

        let limit = self.settings.max_active_sessions_per_user;
        let active = sessions.values().filter(|h| h.user_id == user_id).count();
        if active >= limit {
            return Err(RuntimeError::TooManySessions { limit });
        }

        let session_id = uuid::Uuid::new_v4().to_string();
        let record = DetectionSessionRecord::new(&session_id, user_id, config);
        self.store.create_detection_session(&record)?;

        let (frames_tx, frames_rx) = mpsc::channel(self.settings.frame_queue_capacity.max(1));
        let (events_tx, _) = broadcast::channel(self.settings.event_buffer.max(1));
        let (status_tx, status_rx) = watch::channel(LiveStatus::default());
        let control = SessionControl::new();

        let clock = MonotonicClock;
        let pipeline = FramePipeline::new(
            &session_id,
            EyeHealthMonitor::new(&config, clock.now()),
            ReportedLandmarks,
            clock,
            StoreNotifier::new(self.store.clone(), user_id),
            control.clone(),
            events_tx.clone(),
            status_tx,
        );

        let store = self.store.clone();
        let task_session_id = session_id.clone();
        let task = tokio::spawn(async move {
            let final_status = pipeline.run(frames_rx).await;
            if let Err(e) = finalize(&store, &task_session_id, &final_status) {
                tracing::warn!(session_id = %task_session_id, error = %e, "Failed to persist stopped session");
            }
        });

        sessions.insert(
            session_id.clone(),
            Arc::new(SessionHandle {
                session_id,
                user_id: user_id.to_string(),
                frames: frames_tx,
                control,
                events: events_tx,
                status: status_rx,
                last_frame_at: Mutex::new(Instant::now()),
                task: Mutex::new(Some(task)),
            }),
        );

        Ok(record)
    }

    /// 入队并等待该帧处理完成
    pub async fn submit_frame(
        &self,
        user_id: &str,
        session_id: &str,
        frame: ContourFrame,
    ) -> Result<FrameOutcome, RuntimeError> {
        let handle = self.lookup(user_id, session_id).await?;
        if !handle.control.is_running() {
            return Err(RuntimeError::Stopped(session_id.to_string()));
        }
        handle.touch();

        let (envelope, reply) = FrameEnvelope::with_reply(frame);
        handle.frames.try_send(envelope).map_err(|e| match e {
            TrySendError::Full(_) => RuntimeError::QueueFull(session_id.to_string()),
            TrySendError::Closed(_) => RuntimeError::Stopped(session_id.to_string()),
        })?;
        drop(handle);

        // 会话在排队期间被停止时 reply 会被丢弃
        reply
            .await
            .map_err(|_| RuntimeError::Stopped(session_id.to_string()))
    }

    pub async fn subscribe(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<(broadcast::Receiver<SessionEvent>, LiveStatus), RuntimeError> {
        let handle = self.lookup(user_id, session_id).await?;
        if !handle.control.is_running() {
            return Err(RuntimeError::Stopped(session_id.to_string()));
        }
        Ok((handle.events.subscribe(), handle.live_status()))
    }

    /// 停止并返回最终记录；已停止的会话直接返回记录
    pub async fn stop(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<DetectionSessionRecord, RuntimeError> {
        let handle = {
            let mut sessions = self.sessions.write().await;
            let owned = sessions
                .get(session_id)
                .is_some_and(|h| h.user_id == user_id);
            if owned {
                sessions.remove(session_id)
            } else {
                None
            }
        };
        if let Some(handle) = handle {
            self.shutdown_handle(handle).await;
        }
        self.owned_record(user_id, session_id)
    }

    pub async fn view(&self, user_id: &str, session_id: &str) -> Result<SessionView, RuntimeError> {
        let mut record = self.owned_record(user_id, session_id)?;
        let live = self
            .sessions
            .read()
            .await
            .get(session_id)
            .map(|h| h.live_status());
        if let Some(status) = live {
            apply_status(&mut record, &status);
        }
        Ok(SessionView { record, live })
    }

    /// 停止超过 `idle_timeout` 未收到帧的会话，返回被停止的 id
    pub async fn reap_idle(&self, idle_timeout: Duration) -> Vec<String> {
        let idle: Vec<Arc<SessionHandle>> = {
            let mut sessions = self.sessions.write().await;
            let ids: Vec<String> = sessions
                .values()
                .filter(|h| h.idle_for() >= idle_timeout)
                .map(|h| h.session_id.clone())
                .collect();
            ids.iter().filter_map(|id| sessions.remove(id)).collect()
        };

        let mut reaped = Vec::with_capacity(idle.len());
        for handle in idle {
            tracing::info!(session_id = %handle.session_id, "Reaping idle detection session");
            reaped.push(handle.session_id.clone());
            self.shutdown_handle(handle).await;
        }
        reaped
    }

    pub async fn shutdown_all(&self) {
        let handles: Vec<Arc<SessionHandle>> =
            self.sessions.write().await.drain().map(|(_, h)| h).collect();
        for handle in handles {
            self.shutdown_handle(handle).await;
        }
    }

    async fn lookup(&self, user_id: &str, session_id: &str) -> Result<Arc<SessionHandle>, RuntimeError> {
        if let Some(handle) = self.sessions.read().await.get(session_id) {
            if handle.user_id == user_id {
                return Ok(handle.clone());
            }
            return Err(RuntimeError::NotFound(session_id.to_string()));
        }
        // 不在内存中：属于该用户的记录说明会话已结束
        self.owned_record(user_id, session_id)?;
        Err(RuntimeError::Stopped(session_id.to_string()))
    }

    fn owned_record(
        &self,
        user_id: &str,
        session_id: &str,
    ) -> Result<DetectionSessionRecord, RuntimeError> {
        match self.store.get_detection_session(session_id) {
            Ok(Some(record)) if record.user_id == user_id => Ok(record),
            Ok(_) | Err(StoreError::Validation(_)) => {
                Err(RuntimeError::NotFound(session_id.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn shutdown_handle(&self, handle: Arc<SessionHandle>) {
        handle.control.stop();
        let last_status = handle.live_status();
        let session_id = handle.session_id.clone();
        let task = handle
            .task
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        // 释放发送端，队列为空时消费者随即退出
        drop(handle);

        let Some(mut task) = task else {
            return;
        };
        let timeout = Duration::from_secs(SESSION_STOP_TIMEOUT_SECS);
        match tokio::time::timeout(timeout, &mut task).await {
            Ok(Ok(())) => return,
            Ok(Err(e)) => {
                tracing::error!(session_id = %session_id, error = %e, "Detection task failed");
            }
            Err(_) => {
                tracing::warn!(session_id = %session_id, "Detection task did not stop in time, aborting");
                task.abort();
            }
        }
        if let Err(e) = finalize(&self.store, &session_id, &last_status) {
            tracing::warn!(session_id = %session_id, error = %e, "Failed to persist stopped session");
        }
    }
}

fn apply_status(record: &mut DetectionSessionRecord, status: &LiveStatus) {
    record.frames_processed = status.frames_processed;
    record.total_blinks = status.snapshot.total_blinks;
    record.verdict_count = u64::from(status.verdict_count);
    record.last_verdict = status.last_verdict;
}

fn finalize(store: &Store, session_id: &str, status: &LiveStatus) -> Result<(), StoreError> {
    let mut record = store
        .get_detection_session(session_id)?
        .ok_or_else(|| StoreError::NotFound {
            entity: "detection_session".to_string(),
            key: session_id.to_string(),
        })?;
    apply_status(&mut record, status);
    record.status = DetectionStatus::Stopped;
    record.stopped_at = Some(Utc::now());
    store.update_detection_session(&record)
}
