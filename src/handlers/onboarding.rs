use crate::error::AppError;
use crate::models::WelcomePayload;
use crate::services::OnboardingService;
use actix_web::{HttpResponse, ResponseError, Result, web};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct WelcomeQuery {
    pub t: Option<String>,
}

#[utoipa::path(
    get,
    path = "/r/welcome",
    tag = "onboarding",
    params(("t" = String, Query, description = "Onboarding token id")),
    responses(
        (status = 200, description = "Personalized welcome page (HTML)"),
        (status = 400, description = "Missing or expired token"),
        (status = 404, description = "Unknown token")
    )
)]
pub async fn welcome(
    onboarding_service: web::Data<OnboardingService>,
    query: web::Query<WelcomeQuery>,
) -> Result<HttpResponse> {
    let Some(jti) = query.into_inner().t.filter(|t| !t.is_empty()) else {
        return Ok(
            AppError::ValidationError("Missing onboarding token".to_string()).error_response(),
        );
    };

    match onboarding_service.consume(&jti).await {
        Ok(payload) => Ok(HttpResponse::Ok()
            .content_type("text/html; charset=utf-8")
            .body(welcome_page(&payload))),
        Err(e) => Ok(e.error_response()),
    }
}

fn welcome_page(payload: &WelcomePayload) -> String {
    let greeting = match &payload.first_name {
        Some(name) => format!("Welcome, {}!", name),
        None => "Welcome!".to_string(),
    };

    format!(
        r#"<!DOCTYPE html>
<html>
<head>
    <title>Welcome</title>
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
</head>
<body style="font-family: sans-serif; max-width: 600px; margin: 40px auto; padding: 20px;">
    <h1>{greeting}</h1>
    <p>This is your personal referral link. Share it with friends and family:</p>
    <p><a href="{link}">{link}</a></p>
    <p>Your referral code: <strong>{code}</strong></p>
</body>
</html>
"#,
        greeting = greeting,
        link = payload.referral_link,
        code = payload.referral_code,
    )
}

pub fn onboarding_config(cfg: &mut web::ServiceConfig) {
    cfg.service(web::scope("/r").route("/welcome", web::get().to(welcome)));
}
