use actix_web::web;
use utoipa::OpenApi;
use utoipa::{
    Modify,
    openapi::security::{Http, HttpAuthScheme, SecurityScheme},
};
use utoipa_swagger_ui::SwaggerUi;

use crate::handlers;
use crate::models::*;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.as_mut().unwrap();
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(Http::new(HttpAuthScheme::Bearer)),
        )
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::send_otp,
        handlers::auth::verify_otp,
        handlers::auth::login,
        handlers::auth::set_password,
        handlers::auth::password_reset_request,
        handlers::auth::password_reset_confirm,
        handlers::auth::logout,
        handlers::auth::me,
        handlers::user::dashboard,
        handlers::user::referrals,
        handlers::referral::track_click,
        handlers::referral::signup,
        handlers::onboarding::welcome,
        handlers::display::events,
        handlers::admin::list_referrals,
        handlers::admin::complete_referral,
        handlers::admin::delete_referral,
        handlers::admin::adjust_referrals,
        handlers::admin::list_users,
        handlers::admin::upload_users,
        handlers::admin::delete_user,
        handlers::admin::export_referrals,
        handlers::admin::stats,
        handlers::admin::generate_qr,
        handlers::admin::clear_qr,
    ),
    components(
        schemas(
            User,
            UserResponse,
            ReferralStats,
            SendOtpRequest,
            SendOtpResponse,
            VerifyOtpRequest,
            LoginRequest,
            SetPasswordRequest,
            PasswordResetRequest,
            PasswordResetConfirmRequest,
            AuthResponse,
            DashboardResponse,
            UploadUserRow,
            UploadUsersRequest,
            UploadUsersResponse,
            AdminStats,
            Referral,
            ReferralResponse,
            AdminReferralResponse,
            ReferralStatus,
            ReferralOrigin,
            StaffMember,
            SignupRequest,
            AdjustReferralsRequest,
            AdjustReferralsResponse,
            IssueQrRequest,
            IssueQrResponse,
            WelcomePayload,
            ApiError,
            PaginationParams,
            PaginationInfo,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "auth", description = "OTP and password authentication"),
        (name = "user", description = "Patient dashboard and referrals"),
        (name = "referral", description = "Public referral link flow"),
        (name = "onboarding", description = "QR onboarding landing"),
        (name = "display", description = "In-office display push channel"),
        (name = "admin", description = "Admin panel operations"),
    )
)]
pub struct ApiDoc;

pub fn swagger_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        SwaggerUi::new("/swagger-ui/{_:.*}").url("/api-docs/openapi.json", ApiDoc::openapi()),
    );
}
