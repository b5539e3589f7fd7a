use crate::database::DbPool;
use crate::error::{AppError, AppResult};
use crate::external::EmailService;
use crate::models::*;
use crate::push::{DisplayBroker, DisplayEvent};
use crate::services::UserService;
use crate::utils::{normalize_email, render_qr_svg, validate_email};
use chrono::{Duration, Utc};
use uuid::Uuid;

#[derive(Clone)]
pub struct OnboardingService {
    pool: DbPool,
    email_service: EmailService,
    user_service: UserService,
    broker: DisplayBroker,
    public_base_url: String,
}

impl OnboardingService {
    pub fn new(
        pool: DbPool,
        email_service: EmailService,
        user_service: UserService,
        broker: DisplayBroker,
        public_base_url: String,
    ) -> Self {
        Self {
            pool,
            email_service,
            user_service,
            broker,
            public_base_url,
        }
    }

    fn landing_url(&self, jti: &str) -> String {
        format!(
            "{}/r/welcome?t={}",
            self.public_base_url.trim_end_matches('/'),
            jti
        )
    }

    fn referral_link(&self, referral_code: &str) -> String {
        format!(
            "{}/ref/{}",
            self.public_base_url.trim_end_matches('/'),
            referral_code
        )
    }

    /// Issues a short-lived onboarding token for a user (resolved by id or
    /// email, created when unseen), pushes the QR to the paired display and
    /// emails the magic link.
    pub async fn issue(&self, request: IssueQrRequest) -> AppResult<IssueQrResponse> {
        let user = match (request.user_id, request.email.as_deref()) {
            (Some(user_id), _) => self.user_service.get_user_by_id(user_id).await?,
            (None, Some(email)) if !email.trim().is_empty() => {
                let email = normalize_email(email);
                validate_email(&email)?;
                self.user_service.find_or_create_by_email(&email).await?
            }
            _ => {
                return Err(AppError::ValidationError(
                    "A user id or email is required".to_string(),
                ));
            }
        };

        self.user_service
            .set_profile_if_absent(user.id, request.name.as_deref(), request.staff)
            .await?;

        let jti = Uuid::new_v4().simple().to_string();
        let expires_at = Utc::now() + Duration::seconds(ONBOARDING_TTL_SECONDS);
        let email_used = request.email.as_deref().map(normalize_email);

        sqlx::query(
            "INSERT INTO onboarding_tokens (jti, user_id, email_used, expires_at, created_at)
             VALUES (?, ?, ?, ?, ?)",
        )
        .bind(&jti)
        .bind(user.id)
        .bind(email_used)
        .bind(expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let landing_url = self.landing_url(&jti);
        let qr_svg = render_qr_svg(&landing_url)?;

        // Re-read so a freshly attributed name makes it into the greeting.
        let user = self.user_service.get_user_by_id(user.id).await?;

        self.broker.publish(DisplayEvent::NewQr {
            qr_svg: qr_svg.clone(),
            expires_at,
            landing_url: landing_url.clone(),
            first_name: user.first_name(),
        });

        if let Err(e) = self
            .email_service
            .send_magic_link_email(&user.email, &landing_url)
            .await
        {
            log::warn!("Magic link email failed for {}: {}", user.email, e);
        }

        Ok(IssueQrResponse {
            qr_svg,
            expires_at,
            landing_url,
        })
    }

    /// Opens an onboarding token. First use is detected with an atomic
    /// conditional UPDATE; once opened the token stays openable regardless
    /// of expiry (soft single-use).
    pub async fn consume(&self, jti: &str) -> AppResult<WelcomePayload> {
        let token = sqlx::query_as::<_, OnboardingToken>(
            "SELECT * FROM onboarding_tokens WHERE jti = ?",
        )
        .bind(jti)
        .fetch_optional(&self.pool)
        .await?
        .ok_or_else(|| AppError::NotFound("Unknown onboarding link".to_string()))?;

        if token.used_at.is_none() {
            let updated = sqlx::query(
                "UPDATE onboarding_tokens SET used_at = ?
                 WHERE jti = ? AND used_at IS NULL AND expires_at > ?",
            )
            .bind(Utc::now())
            .bind(jti)
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

            if updated.rows_affected() == 0 {
                // Either it expired unopened, or a concurrent first open won
                // the race; only the former is an error.
                let current = sqlx::query_as::<_, OnboardingToken>(
                    "SELECT * FROM onboarding_tokens WHERE jti = ?",
                )
                .bind(jti)
                .fetch_one(&self.pool)
                .await?;

                if current.used_at.is_none() {
                    return Err(AppError::ValidationError(
                        "This onboarding link has expired".to_string(),
                    ));
                }
            }
        }

        let user = self.user_service.get_user_by_id(token.user_id).await?;

        self.broker.publish(DisplayEvent::QrClear {
            reason: "scanned".to_string(),
        });

        Ok(WelcomePayload {
            referral_link: self.referral_link(&user.referral_code),
            first_name: user.first_name(),
            referral_code: user.referral_code,
        })
    }

    /// Manually resets the paired display. No token state changes.
    pub fn revoke_display(&self) {
        self.broker.publish(DisplayEvent::QrClear {
            reason: "manual".to_string(),
        });
    }
}
