use crate::models::StaffMember;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Short-lived token binding a user to a one-time onboarding URL. The jti is
/// opaque; the user mapping lives only in the database.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OnboardingToken {
    pub jti: String,
    pub user_id: i64,
    pub email_used: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub used_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl OnboardingToken {
    /// Valid for a first open. Once opened the token stays openable
    /// regardless of expiry (soft single-use).
    pub fn is_valid(&self) -> bool {
        self.used_at.is_none() && Utc::now() < self.expires_at
    }
}

/// Onboarding QR codes live for two minutes.
pub const ONBOARDING_TTL_SECONDS: i64 = 120;

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IssueQrRequest {
    pub user_id: Option<i64>,
    pub email: Option<String>,
    pub name: Option<String>,
    pub staff: Option<StaffMember>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct IssueQrResponse {
    /// Inline SVG of the QR code pointing at `landing_url`.
    pub qr_svg: String,
    pub expires_at: DateTime<Utc>,
    pub landing_url: String,
}

/// Data the welcome landing page renders after consuming a token.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct WelcomePayload {
    pub referral_code: String,
    pub referral_link: String,
    pub first_name: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(used: bool, expires_in: i64) -> OnboardingToken {
        OnboardingToken {
            jti: "abc123".to_string(),
            user_id: 1,
            email_used: None,
            expires_at: Utc::now() + Duration::seconds(expires_in),
            used_at: used.then(Utc::now),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_is_valid_gates_only_the_first_open() {
        assert!(token(false, 60).is_valid());
        assert!(!token(false, -1).is_valid());
        // Already-opened tokens are no longer "valid" for a first open but
        // stay openable through the consume path.
        assert!(!token(true, 60).is_valid());
    }
}
