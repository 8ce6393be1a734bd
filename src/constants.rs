/// 每用户最大并发登录会话数
pub const MAX_AUTH_SESSIONS_PER_USER: usize = 10;

/// 列表接口默认分页大小
pub const DEFAULT_PAGE_SIZE: u64 = 20;

/// 列表接口最大分页大小
pub const MAX_PAGE_SIZE: u64 = 100;

/// 停止会话时等待消费者任务退出的最长时间（秒）
pub const SESSION_STOP_TIMEOUT_SECS: u64 = 5;

/// 单帧最多接受的人脸数
pub const MAX_FACES_PER_FRAME: usize = 8;
