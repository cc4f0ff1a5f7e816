pub mod events_service;
pub mod help_q_service;
pub mod notification_service;
pub mod schedule_service;
pub mod sync_service;
pub mod user_service;
