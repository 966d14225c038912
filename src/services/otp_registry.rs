use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use rand::Rng;

/// Storage abstraction for password-reset codes. The server wires in the
/// in-memory implementation; a deployment that needs durability or a
/// shared cache can provide its own backing without touching the
/// handlers.
#[async_trait]
pub trait OtpRegistry: Send + Sync {
    /// Generate a fresh 6-digit code for `email`, replacing any code
    /// already pending for it, and return the new code.
    async fn issue(&self, email: &str) -> String;

    /// Exact string comparison against the pending code. No entry means
    /// false, never an error.
    async fn verify(&self, email: &str, candidate: &str) -> bool;

    /// Drop the pending code for `email`. Idempotent.
    async fn consume(&self, email: &str);

    async fn has_pending(&self, email: &str) -> bool;

    /// Verify and consume in one step. The code is removed only on a
    /// match, so a wrong guess leaves it valid for another attempt and a
    /// correct guess can never be replayed.
    async fn redeem(&self, email: &str, candidate: &str) -> bool;
}

// Codes are in [100000, 999999] so the leading digit is never zero.
fn generate_code() -> String {
    let mut rng = rand::thread_rng();
    rng.gen_range(100_000..=999_999).to_string()
}

#[derive(Default)]
pub struct InMemoryOtpRegistry {
    codes: Mutex<HashMap<String, String>>,
}

impl InMemoryOtpRegistry {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OtpRegistry for InMemoryOtpRegistry {
    async fn issue(&self, email: &str) -> String {
        let code = generate_code();
        let mut codes = self.codes.lock().unwrap();
        codes.insert(email.to_string(), code.clone());
        code
    }

    async fn verify(&self, email: &str, candidate: &str) -> bool {
        let codes = self.codes.lock().unwrap();
        codes.get(email).map(|code| code == candidate).unwrap_or(false)
    }

    async fn consume(&self, email: &str) {
        let mut codes = self.codes.lock().unwrap();
        codes.remove(email);
    }

    async fn has_pending(&self, email: &str) -> bool {
        let codes = self.codes.lock().unwrap();
        codes.contains_key(email)
    }

    async fn redeem(&self, email: &str, candidate: &str) -> bool {
        let mut codes = self.codes.lock().unwrap();
        let matches = codes.get(email).map(|code| code == candidate).unwrap_or(false);
        if matches {
            codes.remove(email);
        }
        matches
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_six_digits_nonzero_leading() {
        for _ in 0..1000 {
            let code = generate_code();
            assert_eq!(code.len(), 6);
            assert!(code.chars().all(|c| c.is_ascii_digit()));
            assert_ne!(code.as_bytes()[0], b'0');
            let value: u32 = code.parse().unwrap();
            assert!((100_000..=999_999).contains(&value));
        }
    }

    #[tokio::test]
    async fn verify_without_issue_is_false() {
        let registry = InMemoryOtpRegistry::new();
        assert!(!registry.verify("nobody@example.com", "123456").await);
        assert!(!registry.has_pending("nobody@example.com").await);
    }

    #[tokio::test]
    async fn issue_then_verify_succeeds() {
        let registry = InMemoryOtpRegistry::new();
        let code = registry.issue("alice@example.com").await;
        assert!(registry.has_pending("alice@example.com").await);
        assert!(registry.verify("alice@example.com", &code).await);
        // verify alone does not consume
        assert!(registry.verify("alice@example.com", &code).await);
    }

    #[tokio::test]
    async fn verify_is_exact_string_equality() {
        let registry = InMemoryOtpRegistry::new();
        let code = registry.issue("alice@example.com").await;
        assert!(!registry.verify("alice@example.com", &format!(" {code}")).await);
        assert!(!registry.verify("alice@example.com", &format!("{code} ")).await);
        assert!(!registry.verify("alice@example.com", "").await);
    }

    #[tokio::test]
    async fn issue_overwrites_previous_code() {
        let registry = InMemoryOtpRegistry::new();
        let first = registry.issue("alice@example.com").await;
        let second = registry.issue("alice@example.com").await;
        if first != second {
            assert!(!registry.verify("alice@example.com", &first).await);
        }
        assert!(registry.verify("alice@example.com", &second).await);
    }

    #[tokio::test]
    async fn redeem_consumes_exactly_once() {
        let registry = InMemoryOtpRegistry::new();
        let code = registry.issue("alice@example.com").await;
        assert!(registry.redeem("alice@example.com", &code).await);
        // the code is gone after a successful redeem
        assert!(!registry.redeem("alice@example.com", &code).await);
        assert!(!registry.verify("alice@example.com", &code).await);
        assert!(!registry.has_pending("alice@example.com").await);
    }

    #[tokio::test]
    async fn failed_redeem_keeps_code_valid() {
        let registry = InMemoryOtpRegistry::new();
        let code = registry.issue("alice@example.com").await;
        assert!(!registry.redeem("alice@example.com", "000000").await);
        assert!(registry.redeem("alice@example.com", &code).await);
    }

    #[tokio::test]
    async fn consume_is_idempotent() {
        let registry = InMemoryOtpRegistry::new();
        registry.consume("nobody@example.com").await;
        let code = registry.issue("alice@example.com").await;
        registry.consume("alice@example.com").await;
        registry.consume("alice@example.com").await;
        assert!(!registry.verify("alice@example.com", &code).await);
    }

    #[tokio::test]
    async fn codes_are_scoped_per_email() {
        let registry = InMemoryOtpRegistry::new();
        let alice = registry.issue("alice@example.com").await;
        let bob = registry.issue("bob@example.com").await;
        assert!(!registry.verify("bob@example.com", &alice).await || alice == bob);
        assert!(registry.redeem("alice@example.com", &alice).await);
        // consuming alice's code leaves bob's intact
        assert!(registry.verify("bob@example.com", &bob).await);
    }
}
