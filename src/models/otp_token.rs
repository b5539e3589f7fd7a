use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Ephemeral one-time login credential, keyed by email because the user may
/// not exist yet at issuance time.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct OtpToken {
    pub id: i64,
    pub email: String,
    pub code: String,
    pub expires_at: DateTime<Utc>,
    pub used: bool,
    pub created_at: DateTime<Utc>,
}

impl OtpToken {
    pub fn is_valid(&self) -> bool {
        !self.used && Utc::now() < self.expires_at
    }
}

/// OTP codes live for 10 minutes.
pub const OTP_TTL_SECONDS: i64 = 600;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn token(used: bool, expires_in: i64) -> OtpToken {
        OtpToken {
            id: 1,
            email: "a@example.com".to_string(),
            code: "123456".to_string(),
            expires_at: Utc::now() + Duration::seconds(expires_in),
            used,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_is_valid() {
        assert!(token(false, 60).is_valid());
        assert!(!token(true, 60).is_valid());
        assert!(!token(false, -1).is_valid());
    }
}
