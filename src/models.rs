pub mod activation_code;
pub mod device;
pub mod pagination;
pub mod user;
pub mod watch_event;
