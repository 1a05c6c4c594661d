pub mod activation_code;
pub mod device;
pub mod error;
pub mod health;
pub mod watch_event;
