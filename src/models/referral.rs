use crate::models::{StaffMember, UserResponse};
use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

/// Fixed reward per completed referral.
pub const REWARD_PER_COMPLETION: f64 = 50.0;

/// Ceiling on reward earnings per user per calendar year.
pub const ANNUAL_EARNINGS_CAP: f64 = 500.0;

/// The current calendar-year window (Jan 1 inclusive to next Jan 1
/// exclusive, UTC) used for cap accounting on `completed_at`.
pub fn current_year_window() -> (DateTime<Utc>, DateTime<Utc>) {
    let year = Utc::now().year();
    let start = Utc.with_ymd_and_hms(year, 1, 1, 0, 0, 0).unwrap();
    let end = Utc.with_ymd_and_hms(year + 1, 1, 1, 0, 0, 0).unwrap();
    (start, end)
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReferralStatus {
    Pending,
    SignedUp,
    Completed,
}

impl std::fmt::Display for ReferralStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferralStatus::Pending => write!(f, "pending"),
            ReferralStatus::SignedUp => write!(f, "signed_up"),
            ReferralStatus::Completed => write!(f, "completed"),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, sqlx::Type, PartialEq, Eq, ToSchema)]
#[sqlx(rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ReferralOrigin {
    Link,
    Manual,
}

impl std::fmt::Display for ReferralOrigin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ReferralOrigin::Link => write!(f, "link"),
            ReferralOrigin::Manual => write!(f, "manual"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct Referral {
    pub id: i64,
    pub referrer_id: i64,
    pub referred_email: String,
    pub referred_name: Option<String>,
    pub referred_phone: Option<String>,
    pub signed_up_by_staff: Option<StaffMember>,
    pub origin: ReferralOrigin,
    pub status: ReferralStatus,
    pub earnings: f64,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub tracking_id: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReferralResponse {
    pub id: i64,
    pub referrer_id: i64,
    pub referred_email: String,
    pub referred_name: Option<String>,
    pub referred_phone: Option<String>,
    pub signed_up_by_staff: Option<StaffMember>,
    pub origin: ReferralOrigin,
    pub status: ReferralStatus,
    pub earnings: f64,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    pub tracking_id: String,
}

impl From<Referral> for ReferralResponse {
    fn from(r: Referral) -> Self {
        Self {
            id: r.id,
            referrer_id: r.referrer_id,
            referred_email: r.referred_email,
            referred_name: r.referred_name,
            referred_phone: r.referred_phone,
            signed_up_by_staff: r.signed_up_by_staff,
            origin: r.origin,
            status: r.status,
            earnings: r.earnings,
            created_at: r.created_at,
            completed_at: r.completed_at,
            tracking_id: r.tracking_id,
        }
    }
}

/// Admin listing row: referral plus its referrer's identity.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdminReferralResponse {
    pub referral: ReferralResponse,
    pub referrer: UserResponse,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SignupRequest {
    #[schema(example = "Jane Doe")]
    pub name: String,
    #[schema(example = "5551234567")]
    pub phone: String,
    #[schema(example = "jane@example.com")]
    pub email: String,
    pub staff: Option<StaffMember>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdjustReferralsRequest {
    pub user_id: i64,
    pub completed_count: Option<i64>,
    pub signed_up_count: Option<i64>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdjustReferralsResponse {
    pub completed: i64,
    pub signed_up: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReferralListQuery {
    pub page: Option<u32>,
    pub per_page: Option<u32>,
    pub status: Option<ReferralStatus>,
}

/// Result of a completion attempt. Already-completed and cap-reached are
/// ordinary outcomes, not errors.
#[derive(Debug)]
pub enum CompletionOutcome {
    Completed(Referral),
    AlreadyCompleted,
    CapReached,
}
