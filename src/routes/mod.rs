pub mod auth;
pub mod notes;
pub mod password_reset;
