pub mod detection_sessions;
pub mod sessions;
pub mod users;
pub mod verdicts;
