use crate::error::AppError;
use crate::models::*;
use crate::services::ReferralService;
use crate::utils::JwtService;
use actix_web::cookie::Cookie;
use actix_web::{HttpRequest, HttpResponse, ResponseError, Result, web};
use serde_json::json;

/// Cookie carrying the signed referrer context between the landing page and
/// the signup POST.
pub const REFERRAL_COOKIE: &str = "ref_token";

#[utoipa::path(
    get,
    path = "/ref/{code}",
    tag = "referral",
    params(("code" = String, Path, description = "Referral code")),
    responses(
        (status = 200, description = "Signup landing page (HTML)"),
        (status = 404, description = "Unknown referral code")
    )
)]
pub async fn track_click(
    referral_service: web::Data<ReferralService>,
    jwt_service: web::Data<JwtService>,
    req: HttpRequest,
    path: web::Path<String>,
) -> Result<HttpResponse> {
    let code = path.into_inner();
    let ip = req
        .connection_info()
        .realip_remote_addr()
        .map(str::to_owned);
    let user_agent = req
        .headers()
        .get("User-Agent")
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    match referral_service
        .record_click(&code, ip.as_deref(), user_agent.as_deref())
        .await
    {
        Ok(referrer) => {
            let token =
                match jwt_service.generate_referral_token(referrer.id, &referrer.referral_code) {
                    Ok(token) => token,
                    Err(e) => return Ok(e.error_response()),
                };
            let cookie = Cookie::build(REFERRAL_COOKIE, token)
                .path("/")
                .http_only(true)
                .finish();

            Ok(HttpResponse::Ok()
                .cookie(cookie)
                .content_type("text/html; charset=utf-8")
                .body(signup_landing_page()))
        }
        Err(e) => Ok(e.error_response()),
    }
}

#[utoipa::path(
    post,
    path = "/api/referral/signup",
    tag = "referral",
    request_body = SignupRequest,
    responses(
        (status = 200, description = "Referral recorded", body = ReferralResponse),
        (status = 400, description = "Missing referrer context or invalid input"),
        (status = 409, description = "Duplicate referral or existing patient")
    )
)]
pub async fn signup(
    referral_service: web::Data<ReferralService>,
    jwt_service: web::Data<JwtService>,
    req: HttpRequest,
    request: web::Json<SignupRequest>,
) -> Result<HttpResponse> {
    // The referrer context comes from the cookie set on the link click.
    let referrer_id = req
        .cookie(REFERRAL_COOKIE)
        .and_then(|cookie| jwt_service.verify_referral_token(cookie.value()).ok())
        .and_then(|claims| claims.sub.parse::<i64>().ok());

    let Some(referrer_id) = referrer_id else {
        return Ok(
            AppError::ValidationError("No referral information found".to_string())
                .error_response(),
        );
    };

    match referral_service
        .record_signup(referrer_id, request.into_inner())
        .await
    {
        Ok(referral) => Ok(HttpResponse::Ok().json(json!({
            "success": true,
            "data": ReferralResponse::from(referral),
            "message": "Referral recorded successfully"
        }))),
        Err(e) => Ok(e.error_response()),
    }
}

fn signup_landing_page() -> String {
    r#"<!DOCTYPE html>
<html>
<head>
    <title>Welcome!</title>
    <meta name="viewport" content="width=device-width, initial-scale=1.0">
</head>
<body style="font-family: sans-serif; max-width: 600px; margin: 40px auto; padding: 20px;">
    <h1>You've been referred by one of our patients!</h1>
    <p>Share your contact information and we'll prepare for your first visit.</p>
    <form onsubmit="submitSignup(event)">
        <p><label>Full Name<br><input type="text" id="name" required></label></p>
        <p><label>Phone Number<br><input type="tel" id="phone" required></label></p>
        <p><label>Email Address<br><input type="email" id="email" required></label></p>
        <button type="submit">Submit</button>
    </form>
    <script>
        async function submitSignup(event) {
            event.preventDefault();
            const response = await fetch('/api/referral/signup', {
                method: 'POST',
                headers: { 'Content-Type': 'application/json' },
                credentials: 'include',
                body: JSON.stringify({
                    name: document.getElementById('name').value,
                    phone: document.getElementById('phone').value,
                    email: document.getElementById('email').value
                })
            });
            const result = await response.json();
            if (response.ok) {
                document.body.innerHTML = '<h1>Thank you!</h1><p>Call us to schedule your first appointment.</p>';
            } else {
                alert((result.error && result.error.message) || 'Something went wrong. Please try again.');
            }
        }
    </script>
</body>
</html>
"#
    .to_string()
}

pub fn referral_config(cfg: &mut web::ServiceConfig) {
    cfg.route("/ref/{code}", web::get().to(track_click)).service(
        web::scope("/api/referral").route("/signup", web::post().to(signup)),
    );
}
