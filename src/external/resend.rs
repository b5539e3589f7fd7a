use crate::config::EmailConfig;
use crate::error::{AppError, AppResult};
use crate::models::ReferralStatus;
use reqwest::Client;
use serde_json::json;
use std::time::Duration;

const RESEND_API_URL: &str = "https://api.resend.com/emails";

/// Outbound email via the Resend HTTP API. When no API key is configured
/// (local/dev environments) sends are skipped and logged instead of failing.
#[derive(Clone)]
pub struct EmailService {
    client: Client,
    config: EmailConfig,
}

impl EmailService {
    pub fn new(config: EmailConfig) -> Self {
        // A slow provider must not hold a request open indefinitely.
        let client = Client::builder()
            .timeout(Duration::from_secs(5))
            .build()
            .expect("Failed to build HTTP client");

        Self { client, config }
    }

    pub fn enabled(&self) -> bool {
        !self.config.api_key.is_empty()
    }

    async fn send(&self, to: &str, subject: &str, html: &str, text: &str) -> AppResult<()> {
        if !self.enabled() {
            log::warn!("Email delivery disabled (no API key); skipping send to {}", to);
            return Ok(());
        }

        let response = self
            .client
            .post(RESEND_API_URL)
            .bearer_auth(&self.config.api_key)
            .json(&json!({
                "from": self.config.from_email,
                "to": [to],
                "subject": subject,
                "html": html,
                "text": text,
            }))
            .send()
            .await?;

        if response.status().is_success() {
            log::info!("Email sent: {} -> {}", subject, to);
            Ok(())
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "Unknown error".to_string());
            log::error!("Email send failed for {}: {}", to, error_text);
            Err(AppError::ExternalApiError(format!(
                "Email sending failed: {}",
                error_text
            )))
        }
    }

    pub async fn send_otp_email(&self, to: &str, code: &str) -> AppResult<()> {
        let html = format!(
            "<html><body style=\"font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;\">\
             <h1>Dental Referral Program</h1>\
             <p>Your login verification code is:</p>\
             <p style=\"font-size: 36px; font-weight: bold; letter-spacing: 8px;\">{code}</p>\
             <p>This code will expire in <strong>10 minutes</strong>.<br>\
             If you didn't request this code, please ignore this email.</p>\
             </body></html>"
        );
        let text = format!(
            "Dental Referral Program\n\n\
             Your verification code is: {code}\n\n\
             This code will expire in 10 minutes.\n\
             If you didn't request this code, please ignore this email."
        );

        self.send(to, "Your Referral Program Login Code", &html, &text)
            .await
    }

    /// Status-change notification to the referrer. Deliberately contains no
    /// monetary amounts.
    pub async fn send_referral_notification(
        &self,
        to: &str,
        referral_info: &str,
        status: ReferralStatus,
    ) -> AppResult<()> {
        let (subject, body) = match status {
            ReferralStatus::SignedUp => (
                "Referral Update",
                "A referral associated with your link has signed up. \
                 We'll notify you after their first appointment.",
            ),
            ReferralStatus::Completed => (
                "Referral Completed",
                "A referral associated with your link has completed their \
                 first visit. Your dashboard has been updated.",
            ),
            ReferralStatus::Pending => ("Referral Update", "A referral status has changed."),
        };

        let html = format!(
            "<html><body style=\"font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;\">\
             <h1>Referral Update</h1>\
             <p>{body}</p>\
             </body></html>"
        );
        let text = format!("Referral Update\n\n{body}\nReferral: {referral_info}");

        self.send(to, subject, &html, &text).await
    }

    /// Magic-link email backing the in-office onboarding QR flow.
    pub async fn send_magic_link_email(&self, to: &str, landing_url: &str) -> AppResult<()> {
        let html = format!(
            "<html><body style=\"font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto; padding: 20px;\">\
             <h1>Welcome!</h1>\
             <p>Tap the link below to open your personal referral page:</p>\
             <p><a href=\"{landing_url}\">{landing_url}</a></p>\
             <p>This link is for you only.</p>\
             </body></html>"
        );
        let text = format!(
            "Welcome!\n\nOpen your personal referral page: {landing_url}\n\nThis link is for you only."
        );

        self.send(to, "Your Referral Program Welcome Link", &html, &text)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_disabled_service_skips_sends() {
        let service = EmailService::new(EmailConfig {
            api_key: String::new(),
            from_email: "noreply@example.com".to_string(),
        });

        assert!(!service.enabled());
        // No network involved when disabled.
        assert!(service.send_otp_email("a@b.com", "123456").await.is_ok());
        assert!(service
            .send_magic_link_email("a@b.com", "https://example.com/r/welcome?t=x")
            .await
            .is_ok());
    }
}
