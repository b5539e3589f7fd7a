use crate::middlewares::AuthUser;
use crate::models::*;
use crate::services::{ReferralService, UserService};
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde_json::json;

#[utoipa::path(
    get,
    path = "/api/user/dashboard",
    tag = "user",
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Dashboard data", body = DashboardResponse),
        (status = 401, description = "Not authenticated"),
        (status = 403, description = "Password setup required")
    )
)]
pub async fn dashboard(
    user_service: web::Data<UserService>,
    referral_service: web::Data<ReferralService>,
    auth: AuthUser,
) -> Result<HttpResponse> {
    let result: crate::error::AppResult<DashboardResponse> = async {
        let user = user_service.get_user_by_id(auth.id).await?;
        let stats = referral_service.stats_for(user.id).await?;
        let referral_link = referral_service.referral_link(&user.referral_code);
        let recent_referrals = referral_service.recent_referrals(user.id, 5).await?;

        Ok(DashboardResponse {
            user: UserResponse::from(user),
            stats,
            referral_link,
            recent_referrals,
        })
    }
    .await;

    match result {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    get,
    path = "/api/user/referrals",
    tag = "user",
    params(
        ("page" = Option<u32>, Query, description = "Page number"),
        ("per_page" = Option<u32>, Query, description = "Items per page")
    ),
    security(("bearer_auth" = [])),
    responses(
        (status = 200, description = "Paginated referral list"),
        (status = 401, description = "Not authenticated")
    )
)]
pub async fn referrals(
    referral_service: web::Data<ReferralService>,
    auth: AuthUser,
    query: web::Query<PaginationParams>,
) -> Result<HttpResponse> {
    match referral_service
        .list_user_referrals(auth.id, &query.into_inner())
        .await
    {
        Ok(response) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": response
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

pub fn user_config(cfg: &mut web::ServiceConfig) {
    cfg.service(
        web::scope("/user")
            .route("/dashboard", web::get().to(dashboard))
            .route("/referrals", web::get().to(referrals)),
    );
}
