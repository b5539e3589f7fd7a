use crate::models::{ReferralResponse, StaffMember};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, FromRow, ToSchema)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub referral_code: String,
    pub total_earnings: f64,
    pub is_admin: bool,
    pub name: Option<String>,
    pub phone: Option<String>,
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,
    pub password_set_at: Option<DateTime<Utc>>,
    pub signed_up_by_staff: Option<StaffMember>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn has_password(&self) -> bool {
        self.password_hash.is_some()
    }

    /// First name for display greetings, derived from `name` when present.
    pub fn first_name(&self) -> Option<String> {
        self.name
            .as_deref()
            .and_then(|n| n.split_whitespace().next())
            .map(|s| s.to_string())
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UserResponse {
    pub id: i64,
    pub email: String,
    pub referral_code: String,
    pub total_earnings: f64,
    pub is_admin: bool,
    pub name: Option<String>,
    pub phone: Option<String>,
    pub signed_up_by_staff: Option<StaffMember>,
    pub has_password: bool,
    pub created_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            email: user.email,
            referral_code: user.referral_code,
            total_earnings: user.total_earnings,
            is_admin: user.is_admin,
            name: user.name,
            phone: user.phone,
            signed_up_by_staff: user.signed_up_by_staff,
            has_password: user.password_hash.is_some(),
            created_at: user.created_at,
        }
    }
}

/// Referral statistics for the dashboard and `/auth/me`.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ReferralStats {
    pub total_referrals: i64,
    pub completed_referrals: i64,
    pub pending_referrals: i64,
    pub signed_up_referrals: i64,
    pub annual_earnings: f64,
    pub remaining_earnings: f64,
    pub can_earn_more: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SendOtpRequest {
    #[schema(example = "patient@example.com")]
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SendOtpResponse {
    pub email: String,
    pub expires_in: i64,
    /// Whether this email already carries a staff attribution. UI hint only.
    pub staff_attributed: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct VerifyOtpRequest {
    #[schema(example = "patient@example.com")]
    pub email: String,
    #[schema(example = "123456")]
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LoginRequest {
    #[schema(example = "patient@example.com")]
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SetPasswordRequest {
    pub password: String,
    pub confirm_password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PasswordResetRequest {
    #[schema(example = "patient@example.com")]
    pub email: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct PasswordResetConfirmRequest {
    #[schema(example = "patient@example.com")]
    pub email: String,
    #[schema(example = "123456")]
    pub token: String,
    pub new_password: String,
    pub confirm_password: String,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub stats: ReferralStats,
    pub token: String,
    pub expires_in: i64,
    pub must_set_password: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct DashboardResponse {
    pub user: UserResponse,
    pub stats: ReferralStats,
    pub referral_link: String,
    pub recent_referrals: Vec<ReferralResponse>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadUserRow {
    pub email: String,
    pub name: Option<String>,
    pub staff: Option<StaffMember>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadUsersRequest {
    pub users: Vec<UploadUserRow>,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct UploadUsersResponse {
    pub created: i64,
    pub skipped: i64,
}

#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct AdminStats {
    pub total_users: i64,
    pub total_referrals: i64,
    pub completed_referrals: i64,
    pub pending_referrals: i64,
    pub signed_up_referrals: i64,
    pub total_earnings_paid: f64,
}
