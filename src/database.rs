pub mod activation_code;
pub mod device;
pub mod device_token;
pub mod postgres_repository;
pub mod watch_event;
