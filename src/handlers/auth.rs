use crate::middlewares::AuthUser;
use crate::models::*;
use crate::services::AuthService;
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    post,
    path = "/auth/send-otp",
    tag = "auth",
    request_body = SendOtpRequest,
    responses(
        (status = 200, description = "OTP issued and emailed", body = SendOtpResponse),
        (status = 400, description = "Invalid email"),
        (status = 502, description = "Email delivery failed")
    )
)]
pub async fn send_otp(
    auth_service: web::Data<AuthService>,
    request: web::Json<SendOtpRequest>,
) -> Result<HttpResponse> {
    match auth_service.send_otp(&request.email).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response,
            "message": "OTP sent to your email"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/auth/verify-otp",
    tag = "auth",
    request_body = VerifyOtpRequest,
    responses(
        (status = 200, description = "Session started", body = AuthResponse),
        (status = 400, description = "Invalid or expired code, or password login required")
    )
)]
pub async fn verify_otp(
    auth_service: web::Data<AuthService>,
    request: web::Json<VerifyOtpRequest>,
) -> Result<HttpResponse> {
    match auth_service.verify_otp(&request.email, &request.token).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = AuthResponse),
        (status = 400, description = "No password set"),
        (status = 401, description = "Bad credentials")
    )
)]
pub async fn login(
    auth_service: web::Data<AuthService>,
    request: web::Json<LoginRequest>,
) -> Result<HttpResponse> {
    match auth_service.login(&request.email, &request.password).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/auth/set-password",
    tag = "auth",
    request_body = SetPasswordRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Password set, session upgraded", body = AuthResponse),
        (status = 400, description = "Mismatch or too short"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn set_password(
    auth_service: web::Data<AuthService>,
    user: AuthUser,
    request: web::Json<SetPasswordRequest>,
) -> Result<HttpResponse> {
    match auth_service.set_password(user.id, request.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/auth/password-reset/request",
    tag = "auth",
    request_body = PasswordResetRequest,
    responses(
        (status = 200, description = "Generic response regardless of account existence")
    )
)]
pub async fn password_reset_request(
    auth_service: web::Data<AuthService>,
    request: web::Json<PasswordResetRequest>,
) -> Result<HttpResponse> {
    match auth_service.request_password_reset(&request.email).await {
        // Identical response whether or not the account exists.
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "If that email belongs to an account, a reset code has been sent"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/auth/password-reset/confirm",
    tag = "auth",
    request_body = PasswordResetConfirmRequest,
    responses(
        (status = 200, description = "Password reset, session started", body = AuthResponse),
        (status = 400, description = "Invalid or expired code, mismatch, too short")
    )
)]
pub async fn password_reset_confirm(
    auth_service: web::Data<AuthService>,
    request: web::Json<PasswordResetConfirmRequest>,
) -> Result<HttpResponse> {
    match auth_service.confirm_password_reset(request.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/auth/logout",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Logged out"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn logout(_user: AuthUser) -> Result<HttpResponse> {
    // Sessions are stateless JWTs; the client drops the token.
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Logged out successfully"
    })))
}

#[utoipa::path(
    get,
    path = "/auth/me",
    tag = "auth",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Current user and referral stats"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn me(auth_service: web::Data<AuthService>, user: AuthUser) -> Result<HttpResponse> {
    match auth_service.me(user.id).await {
        Ok((user, stats)) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": {
                "user": user,
                "stats": stats,
                "must_set_password": !user.has_password
            }
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn auth_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/auth")
            .route("/send-otp", web::post().to(send_otp))
            .route("/verify-otp", web::post().to(verify_otp))
            .route("/login", web::post().to(login))
            .route("/set-password", web::post().to(set_password))
            .route("/password-reset/request", web::post().to(password_reset_request))
            .route("/password-reset/confirm", web::post().to(password_reset_confirm))
            .route("/logout", web::post().to(logout))
            .route("/me", web::get().to(me)),
    );
}
