use std::sync::Arc;

use mongodb::Database;

use crate::services::mail_service::MailService;
use crate::services::otp_registry::{InMemoryOtpRegistry, OtpRegistry};
use crate::services::session_store::SessionStore;

#[derive(Debug, Clone)]
pub struct MailConfig {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
}

#[derive(Clone)]
pub struct AppState {
    pub db: Database,
    pub otp_registry: Arc<dyn OtpRegistry>,
    pub sessions: SessionStore,
    pub mail_service: MailService,
}

impl AppState {
    pub fn new(db: Database, mail_config: MailConfig) -> Self {
        AppState {
            db,
            otp_registry: Arc::new(InMemoryOtpRegistry::new()),
            sessions: SessionStore::new(),
            mail_service: MailService::new(
                mail_config.api_url,
                mail_config.api_key,
                mail_config.from,
            ),
        }
    }
}
