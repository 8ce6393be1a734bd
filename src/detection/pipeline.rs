//! 帧处理驱动
//!
//! 生产者（HTTP 路由）把帧放进有界 mpsc 队列，每个会话一个消费者任务按顺序
//! 处理：关键点 → 双眼 EAR → 眨眼状态机 → 窗口分类 → 通知。

use serde::Serialize;
use tokio::sync::{broadcast, mpsc, oneshot, watch};

use crate::detection::clock::Clock;
use crate::detection::control::SessionControl;
use crate::detection::landmarks::LandmarkProvider;
use crate::detection::monitor::{EyeHealthMonitor, FrameSample, MonitorSnapshot};
use crate::detection::notifier::{Notifier, VerdictNotice};
use crate::detection::types::Verdict;

/// 推送给订阅者的实时事件
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SessionEvent {
    #[serde(rename_all = "camelCase")]
    Blink { total_blinks: u64, window_blinks: u32 },
    Verdict(VerdictNotice),
    #[serde(rename_all = "camelCase")]
    Stopped { total_blinks: u64 },
}

impl SessionEvent {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Blink { .. } => "blink",
            Self::Verdict(_) => "verdict",
            Self::Stopped { .. } => "stopped",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameOutcome {
    #[serde(flatten)]
    pub sample: FrameSample,
    #[serde(flatten)]
    pub snapshot: MonitorSnapshot,
    pub verdict: Option<Verdict>,
}

/// 会话的实时状态，供查询接口读取
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LiveStatus {
    #[serde(flatten)]
    pub snapshot: MonitorSnapshot,
    pub frames_processed: u64,
    pub last_verdict: Option<Verdict>,
    pub verdict_count: u32,
}

pub struct FrameEnvelope<F> {
    pub frame: F,
    pub reply: Option<oneshot::Sender<FrameOutcome>>,
}

impl<F> FrameEnvelope<F> {
    pub fn with_reply(frame: F) -> (Self, oneshot::Receiver<FrameOutcome>) {
        let (tx, rx) = oneshot::channel();
        (
            Self {
                frame,
                reply: Some(tx),
            },
            rx,
        )
    }
}

pub struct FramePipeline<P, C, N> {
    session_id: String,
    monitor: EyeHealthMonitor,
    provider: P,
    clock: C,
    notifier: N,
    control: SessionControl,
    events: broadcast::Sender<SessionEvent>,
    status: watch::Sender<LiveStatus>,
}

impl<P, C, N> FramePipeline<P, C, N>
where
    P: LandmarkProvider,
    C: Clock,
    N: Notifier,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        session_id: &str,
        monitor: EyeHealthMonitor,
        provider: P,
        clock: C,
        notifier: N,
        control: SessionControl,
        events: broadcast::Sender<SessionEvent>,
        status: watch::Sender<LiveStatus>,
    ) -> Self {
        Self {
            session_id: session_id.to_string(),
            monitor,
            provider,
            clock,
            notifier,
            control,
            events,
            status,
        }
    }

    /// 消费队列直到会话被停止或队列关闭，返回最终计数
    pub async fn run(mut self, mut frames: mpsc::Receiver<FrameEnvelope<P::Frame>>) -> LiveStatus {
        tracing::info!(session_id = %self.session_id, "Detection session started");

        while let Some(envelope) = frames.recv().await {
            if !self.control.is_running() {
                tracing::debug!(session_id = %self.session_id, "Stop requested, dropping frame");
                break;
            }

            let outcome = self.process(&envelope.frame);
            if let Some(reply) = envelope.reply {
                // 请求方可能已断开
                let _ = reply.send(outcome);
            }
        }

        // 丢弃剩余帧，等待中的请求会收到关闭
        frames.close();

        let final_status = *self.status.borrow();
        let _ = self.events.send(SessionEvent::Stopped {
            total_blinks: final_status.snapshot.total_blinks,
        });
        tracing::info!(
            session_id = %self.session_id,
            total_blinks = final_status.snapshot.total_blinks,
            frames = final_status.frames_processed,
            "Detection session stopped"
        );
        final_status
    }

    fn process(&mut self, frame: &P::Frame) -> FrameOutcome {
        let faces = self.provider.detect_eye_contours(frame);
        let sample = self.monitor.process_faces(&faces);

        if sample.blink_registered {
            let snap = self.monitor.snapshot();
            tracing::debug!(
                session_id = %self.session_id,
                total_blinks = snap.total_blinks,
                "Blink registered"
            );
            let _ = self.events.send(SessionEvent::Blink {
                total_blinks: snap.total_blinks,
                window_blinks: snap.window_blinks,
            });
        }

        // 无脸的帧也要检查窗口，人离开镜头时窗口照常到期
        let verdict = self.monitor.maybe_classify(self.clock.now()).map(|window| {
            let notice = VerdictNotice::new(
                &self.session_id,
                window.verdict,
                window.window_blinks,
                self.monitor.snapshot().total_blinks,
            );
            tracing::info!(
                session_id = %self.session_id,
                verdict = window.verdict.as_str(),
                window_blinks = window.window_blinks,
                elapsed_ms = window.elapsed.as_millis() as u64,
                "Window classified"
            );
            self.notifier.notify(&notice);
            let _ = self.events.send(SessionEvent::Verdict(notice));
            window.verdict
        });

        let snapshot = self.monitor.snapshot();
        self.status.send_modify(|status| {
            status.snapshot = snapshot;
            status.frames_processed += 1;
            if let Some(v) = verdict {
                status.last_verdict = Some(v);
                status.verdict_count += 1;
            }
        });

        FrameOutcome {
            sample,
            snapshot,
            verdict,
        }
    }
}
