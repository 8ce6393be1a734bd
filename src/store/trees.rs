pub const USERS: &str = "users";
pub const SESSIONS: &str = "sessions";
pub const DETECTION_SESSIONS: &str = "detection_sessions";
pub const VERDICTS: &str = "verdicts";
pub const META: &str = "meta";
