pub mod feeds;
pub mod health;
pub mod helpq;
pub mod metrics;
pub mod notifications;
pub mod session;
pub mod swagger;
