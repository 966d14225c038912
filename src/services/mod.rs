pub mod mail_service;
pub mod otp_registry;
pub mod session_store;
