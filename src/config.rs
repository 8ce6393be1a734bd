use std::env;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr};
use std::str::FromStr;

use crate::detection::config::{
    DetectionConfig, DEFAULT_BLINK_HIGH_THRESHOLD, DEFAULT_EAR_THRESHOLD,
    DEFAULT_MIN_CONSECUTIVE_FRAMES, DEFAULT_WINDOW_DURATION_SECS,
};

const DEV_JWT_SECRET: &str = "change_me_to_random_64_chars_change_me_to_random_64_chars";

#[derive(Clone)]
pub struct Config {
    pub host: IpAddr,
    pub port: u16,
    pub log_level: String,
    pub enable_file_logs: bool,
    pub log_dir: String,
    pub sled_path: String,
    pub jwt_secret: String,
    pub jwt_expires_in_hours: u64,
    pub cors_origin: String,
    pub worker: WorkerConfig,
    pub detection: DetectionEnvConfig,
}

#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// 多实例部署时只有 leader 跑定时任务
    pub is_leader: bool,
}

impl WorkerConfig {
    pub fn from_env() -> Self {
        Self {
            is_leader: env_or_bool("WORKER_LEADER", true),
        }
    }
}

/// 检测运行时参数
#[derive(Debug, Clone)]
pub struct DetectionEnvConfig {
    /// 新会话的默认参数，客户端可逐项覆盖
    pub defaults: DetectionConfig,
    /// 每个会话的帧队列长度，满了返回 429
    pub frame_queue_capacity: usize,
    /// 超过这么久没有新帧的会话由 detection_reaper 停止，0 表示不回收
    pub idle_timeout_secs: u64,
    pub max_active_sessions_per_user: usize,
    pub event_buffer: usize,
}

impl Default for DetectionEnvConfig {
    fn default() -> Self {
        Self {
            defaults: DetectionConfig::default(),
            frame_queue_capacity: 64,
            idle_timeout_secs: 300,
            max_active_sessions_per_user: 2,
            event_buffer: 256,
        }
    }
}

impl DetectionEnvConfig {
    /// 默认参数只做解析，越界由启动流程调用 `validate` 拒绝
    pub fn from_env() -> Self {
        let fallback = Self::default();
        let defaults = DetectionConfig {
            ear_threshold: env_or_parse("EAR_THRESHOLD", DEFAULT_EAR_THRESHOLD),
            min_consecutive_frames: env_or_parse("EAR_CONSEC_FRAMES", DEFAULT_MIN_CONSECUTIVE_FRAMES),
            window_duration_seconds: env_or_parse("WINDOW_DURATION_SECS", DEFAULT_WINDOW_DURATION_SECS),
            blink_high_threshold: env_or_parse("BLINK_HIGH_THRESHOLD", DEFAULT_BLINK_HIGH_THRESHOLD),
        };

        Self {
            defaults,
            frame_queue_capacity: env_or_parse("FRAME_QUEUE_CAPACITY", fallback.frame_queue_capacity)
                .max(1),
            idle_timeout_secs: env_or_parse("DETECTION_IDLE_TIMEOUT_SECS", fallback.idle_timeout_secs),
            max_active_sessions_per_user: env_or_parse(
                "MAX_ACTIVE_SESSIONS_PER_USER",
                fallback.max_active_sessions_per_user,
            )
            .max(1),
            event_buffer: fallback.event_buffer,
        }
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("log_level", &self.log_level)
            .field("enable_file_logs", &self.enable_file_logs)
            .field("log_dir", &self.log_dir)
            .field("sled_path", &self.sled_path)
            .field("jwt_secret", &"***REDACTED***")
            .field("jwt_expires_in_hours", &self.jwt_expires_in_hours)
            .field("cors_origin", &self.cors_origin)
            .field("worker", &self.worker)
            .field("detection", &self.detection)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Self {
        let jwt_secret = env_or("JWT_SECRET", DEV_JWT_SECRET);
        if jwt_secret == DEV_JWT_SECRET {
            tracing::warn!("JWT_SECRET not set, using the development secret");
        }

        Self {
            host: env_or_parse("HOST", IpAddr::V4(Ipv4Addr::LOCALHOST)),
            port: env_or_parse("PORT", 3000_u16),
            log_level: env_or("RUST_LOG", "info"),
            enable_file_logs: env_or_bool("ENABLE_FILE_LOGS", false),
            log_dir: env_or("LOG_DIR", "./logs"),
            sled_path: env_or("SLED_PATH", "./data/blink-health.sled"),
            jwt_secret,
            jwt_expires_in_hours: env_or_parse("JWT_EXPIRES_IN_HOURS", 24_u64),
            cors_origin: env_or("CORS_ORIGIN", "http://localhost:5173"),
            worker: WorkerConfig::from_env(),
            detection: DetectionEnvConfig::from_env(),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

/// 解析失败时记 warn 并使用默认值
fn env_or_parse<T>(key: &str, default: T) -> T
where
    T: FromStr,
{
    let Ok(raw) = env::var(key) else {
        return default;
    };
    raw.trim().parse().unwrap_or_else(|_| {
        tracing::warn!(key, value = %raw, "Failed to parse env var, using default");
        default
    })
}

fn env_or_bool(key: &str, default: bool) -> bool {
    match env::var(key).map(|raw| raw.trim().to_ascii_lowercase()) {
        Ok(v) if matches!(v.as_str(), "1" | "true" | "yes" | "on") => true,
        Ok(v) if matches!(v.as_str(), "0" | "false" | "no" | "off") => false,
        _ => default,
    }
}
