use reqwest::Client;
use serde_json::json;

use crate::errors::{AppError, Result};

/// Outbound transactional mail over the provider's HTTP API.
#[derive(Clone)]
pub struct MailService {
    api_url: String,
    api_key: String,
    from: String,
    client: Client,
}

impl MailService {
    pub fn new(api_url: String, api_key: String, from: String) -> Self {
        Self {
            api_url,
            api_key,
            from,
            client: Client::new(),
        }
    }

    pub async fn send(&self, subject: &str, body: &str, to: &[String]) -> Result<()> {
        let response = self.client
            .post(&self.api_url)
            .bearer_auth(&self.api_key)
            .json(&json!({
                "from": self.from,
                "to": to,
                "subject": subject,
                "text": body,
            }))
            .send()
            .await
            .map_err(|e| AppError::MailError(format!("Mail API error: {}", e)))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(AppError::MailError(format!(
                "Mail sending failed with status: {}",
                response.status()
            )))
        }
    }

    pub async fn send_otp(&self, email: &str, otp: &str) -> Result<()> {
        let body = format!("Your OTP is: {}", otp);
        self.send("Your OTP Code", &body, &[email.to_string()]).await
    }
}
