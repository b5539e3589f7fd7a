use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

/// Append-only analytics record of a referral-link visit.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize)]
pub struct ReferralClick {
    pub id: i64,
    pub referrer_id: i64,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub clicked_at: DateTime<Utc>,
}
