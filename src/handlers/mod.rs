pub(crate) mod auth;
pub(crate) mod notes;
pub(crate) mod password_reset;
