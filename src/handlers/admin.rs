use crate::error::AppError;
use crate::middlewares::AdminUser;
use crate::models::*;
use crate::services::{OnboardingService, ReferralService, UserService};
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/admin/referrals",
    tag = "admin",
    params(
        ("page" = Option<u32>, Query, description = "Page number"),
        ("per_page" = Option<u32>, Query, description = "Items per page"),
        ("status" = Option<ReferralStatus>, Query, description = "Status filter")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Paginated referrals with referrer identity"),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Admin privileges required")
    )
)]
pub async fn list_referrals(
    referral_service: web::Data<ReferralService>,
    _admin: AdminUser,
    query: web::Query<ReferralListQuery>,
) -> Result<HttpResponse> {
    let query = query.into_inner();
    let params = PaginationParams::new(query.page, query.per_page);

    match referral_service.list_all(&params, query.status).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    put,
    path = "/admin/referral/{id}/complete",
    tag = "admin",
    params(("id" = i64, Path, description = "Referral id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Referral completed", body = ReferralResponse),
        (status = 404, description = "Unknown referral"),
        (status = 409, description = "Already completed or annual cap reached")
    )
)]
pub async fn complete_referral(
    referral_service: web::Data<ReferralService>,
    _admin: AdminUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match referral_service.complete(path.into_inner()).await {
        Ok(CompletionOutcome::Completed(referral)) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": ReferralResponse::from(referral),
            "message": "Referral marked as completed"
        }))),
        Ok(CompletionOutcome::AlreadyCompleted) => Ok(AppError::Conflict(
            "Referral is already completed".to_string(),
        )
        .error_response()),
        Ok(CompletionOutcome::CapReached) => Ok(AppError::Conflict(
            "Referrer has reached the annual earnings limit".to_string(),
        )
        .error_response()),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/admin/referral/{id}",
    tag = "admin",
    params(("id" = i64, Path, description = "Referral id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Referral deleted, earnings reversed"),
        (status = 404, description = "Unknown referral")
    )
)]
pub async fn delete_referral(
    referral_service: web::Data<ReferralService>,
    _admin: AdminUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match referral_service.delete(path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "Referral deleted"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/referrals/adjust",
    tag = "admin",
    request_body = AdjustReferralsRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Counts adjusted", body = AdjustReferralsResponse),
        (status = 404, description = "Unknown user")
    )
)]
pub async fn adjust_referrals(
    referral_service: web::Data<ReferralService>,
    _admin: AdminUser,
    request: web::Json<AdjustReferralsRequest>,
) -> Result<HttpResponse> {
    match referral_service.adjust(request.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/users",
    tag = "admin",
    params(
        ("page" = Option<u32>, Query, description = "Page number"),
        ("per_page" = Option<u32>, Query, description = "Items per page")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Paginated users"),
        (status = 403, description = "Admin privileges required")
    )
)]
pub async fn list_users(
    user_service: web::Data<UserService>,
    _admin: AdminUser,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse> {
    match user_service.list_users(&query.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/users/upload",
    tag = "admin",
    request_body = UploadUsersRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Bulk upload summary", body = UploadUsersResponse)
    )
)]
pub async fn upload_users(
    user_service: web::Data<UserService>,
    _admin: AdminUser,
    request: web::Json<UploadUsersRequest>,
) -> Result<HttpResponse> {
    match user_service.upload_users(request.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    delete,
    path = "/admin/user/{id}",
    tag = "admin",
    params(("id" = i64, Path, description = "User id")),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "User and owned records deleted"),
        (status = 404, description = "Unknown user")
    )
)]
pub async fn delete_user(
    user_service: web::Data<UserService>,
    _admin: AdminUser,
    path: web::Path<i64>,
) -> Result<HttpResponse> {
    match user_service.delete_user(path.into_inner()).await {
        Ok(()) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "message": "User deleted"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/export",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "CSV export of all referrals")
    )
)]
pub async fn export_referrals(
    referral_service: web::Data<ReferralService>,
    _admin: AdminUser,
) -> Result<HttpResponse> {
    match referral_service.export_csv().await {
        Ok(csv) => Ok(HttpResponse::Ok()
            .content_type("text/csv")
            .insert_header((
                "Content-Disposition",
                "attachment; filename=referrals_export.csv",
            ))
            .body(csv)),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/admin/stats",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Aggregate statistics", body = AdminStats)
    )
)]
pub async fn stats(
    referral_service: web::Data<ReferralService>,
    _admin: AdminUser,
) -> Result<HttpResponse> {
    match referral_service.admin_stats().await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/qr/generate",
    tag = "admin",
    request_body = IssueQrRequest,
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "QR issued and pushed to the display", body = IssueQrResponse),
        (status = 400, description = "No resolvable target user")
    )
)]
pub async fn generate_qr(
    onboarding_service: web::Data<OnboardingService>,
    _admin: AdminUser,
    request: web::Json<IssueQrRequest>,
) -> Result<HttpResponse> {
    match onboarding_service.issue(request.into_inner()).await {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/admin/qr/clear",
    tag = "admin",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Clear event broadcast to the display")
    )
)]
pub async fn clear_qr(
    onboarding_service: web::Data<OnboardingService>,
    _admin: AdminUser,
) -> Result<HttpResponse> {
    onboarding_service.revoke_display();
    Ok(HttpResponse::Ok().json(json!({
        "success": true,
        "message": "Display cleared"
    })))
}

pub fn admin_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/admin")
            .route("/referrals", web::get().to(list_referrals))
            .route("/referrals/adjust", web::post().to(adjust_referrals))
            .route("/referral/{id}/complete", web::put().to(complete_referral))
            .route("/referral/{id}", web::delete().to(delete_referral))
            .route("/users", web::get().to(list_users))
            .route("/users/upload", web::post().to(upload_users))
            .route("/user/{id}", web::delete().to(delete_user))
            .route("/export", web::get().to(export_referrals))
            .route("/stats", web::get().to(stats))
            .route("/qr/generate", web::post().to(generate_qr))
            .route("/qr/clear", web::post().to(clear_qr)),
    );
}
