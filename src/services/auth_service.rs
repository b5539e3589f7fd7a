use crate::database::DbPool;
use crate::error::{AppError, AppResult};
use crate::external::EmailService;
use crate::models::*;
use crate::services::{ReferralService, UserService};
use crate::utils::*;
use chrono::{Duration, Utc};

/// Demo credentials accepted without a persisted token. Compiled in only
/// with the `demo-login` feature; production builds have no such path.
#[cfg(feature = "demo-login")]
fn is_demo_login(email: &str, code: &str) -> bool {
    const DEMO_CREDENTIALS: [(&str, &str); 2] = [
        ("demo@example.com", "123456"),
        ("staff@demo.example.com", "123456"),
    ];
    DEMO_CREDENTIALS
        .iter()
        .any(|(e, c)| *e == email && *c == code)
}

#[cfg(not(feature = "demo-login"))]
fn is_demo_login(_email: &str, _code: &str) -> bool {
    false
}

#[derive(Clone)]
pub struct AuthService {
    pool: DbPool,
    jwt_service: JwtService,
    email_service: EmailService,
    user_service: UserService,
    referral_service: ReferralService,
}

impl AuthService {
    pub fn new(
        pool: DbPool,
        jwt_service: JwtService,
        email_service: EmailService,
        user_service: UserService,
        referral_service: ReferralService,
    ) -> Self {
        Self {
            pool,
            jwt_service,
            email_service,
            user_service,
            referral_service,
        }
    }

    /// Issues a fresh OTP for the email and triggers delivery. Expired
    /// tokens are swept globally as a side effect.
    pub async fn send_otp(&self, email: &str) -> AppResult<SendOtpResponse> {
        let email = normalize_email(email);
        validate_email(&email)?;

        sqlx::query("DELETE FROM otp_tokens WHERE expires_at < ?")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        let code = generate_six_digit_code();
        let expires_at = Utc::now() + Duration::seconds(OTP_TTL_SECONDS);

        sqlx::query(
            "INSERT INTO otp_tokens (email, code, expires_at, used, created_at)
             VALUES (?, ?, ?, FALSE, ?)",
        )
        .bind(&email)
        .bind(&code)
        .bind(expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        let staff_attributed = self.user_service.staff_attributed(&email).await?;

        // The token is already persisted; a delivery failure surfaces but
        // does not roll it back.
        self.email_service.send_otp_email(&email, &code).await?;

        Ok(SendOtpResponse {
            email,
            expires_in: OTP_TTL_SECONDS,
            staff_attributed,
        })
    }

    /// Verifies an OTP, consuming it exactly once, and starts a session.
    /// Accounts that already set a password must use password login.
    pub async fn verify_otp(&self, email: &str, code: &str) -> AppResult<AuthResponse> {
        let email = normalize_email(email);
        let code = code.trim();

        if email.is_empty() || code.is_empty() {
            return Err(AppError::ValidationError(
                "Email and code are required".to_string(),
            ));
        }

        if !is_demo_login(&email, code) {
            self.consume_otp(&email, code).await?;
        }

        let user = match self.user_service.find_by_email(&email).await? {
            Some(user) => {
                if user.has_password() {
                    return Err(AppError::ValidationError(
                        "This account uses password login; sign in with your password instead"
                            .to_string(),
                    ));
                }
                user
            }
            // Auto-provision on first login.
            None => self.user_service.create_user(&email, false).await?,
        };

        let must_set_password = !user.has_password();
        self.build_auth_response(user, must_set_password).await
    }

    /// Password login, bypassing OTP once a password exists.
    pub async fn login(&self, email: &str, password: &str) -> AppResult<AuthResponse> {
        let email = normalize_email(email);
        if email.is_empty() || password.is_empty() {
            return Err(AppError::ValidationError(
                "Email and password are required".to_string(),
            ));
        }

        let user = self
            .user_service
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::AuthError("Invalid email or password".to_string()))?;

        let Some(hash) = user.password_hash.as_deref() else {
            return Err(AppError::ValidationError(
                "No password set for this account; log in with an email code".to_string(),
            ));
        };

        if !verify_password(password, hash)? {
            return Err(AppError::AuthError("Invalid email or password".to_string()));
        }

        self.build_auth_response(user, false).await
    }

    /// Completes onboarding for an OTP-verified session by setting the
    /// account password.
    pub async fn set_password(
        &self,
        user_id: i64,
        request: SetPasswordRequest,
    ) -> AppResult<AuthResponse> {
        if request.password != request.confirm_password {
            return Err(AppError::ValidationError(
                "Passwords do not match".to_string(),
            ));
        }
        validate_password(&request.password)?;

        let user = self.user_service.get_user_by_id(user_id).await?;
        let hash = hash_password(&request.password)?;
        self.user_service.set_password_hash(user.id, &hash).await?;

        let user = self.user_service.get_user_by_id(user.id).await?;
        self.build_auth_response(user, false).await
    }

    /// Issues a reset OTP when the account exists. The response is
    /// identical either way to prevent account enumeration, so delivery
    /// failures are swallowed here.
    pub async fn request_password_reset(&self, email: &str) -> AppResult<()> {
        let email = normalize_email(email);
        validate_email(&email)?;

        if self.user_service.find_by_email(&email).await?.is_none() {
            return Ok(());
        }

        sqlx::query("DELETE FROM otp_tokens WHERE expires_at < ?")
            .bind(Utc::now())
            .execute(&self.pool)
            .await?;

        let code = generate_six_digit_code();
        let expires_at = Utc::now() + Duration::seconds(OTP_TTL_SECONDS);

        sqlx::query(
            "INSERT INTO otp_tokens (email, code, expires_at, used, created_at)
             VALUES (?, ?, ?, FALSE, ?)",
        )
        .bind(&email)
        .bind(&code)
        .bind(expires_at)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if let Err(e) = self.email_service.send_otp_email(&email, &code).await {
            log::warn!("Password reset email failed for {}: {}", email, e);
        }

        Ok(())
    }

    /// Consumes a reset OTP and sets the new password, returning a fully
    /// authenticated session.
    pub async fn confirm_password_reset(
        &self,
        request: PasswordResetConfirmRequest,
    ) -> AppResult<AuthResponse> {
        let email = normalize_email(&request.email);
        let code = request.token.trim();

        if email.is_empty() || code.is_empty() {
            return Err(AppError::ValidationError(
                "Email and code are required".to_string(),
            ));
        }
        if request.new_password != request.confirm_password {
            return Err(AppError::ValidationError(
                "Passwords do not match".to_string(),
            ));
        }
        validate_password(&request.new_password)?;

        self.consume_otp(&email, code).await?;

        // Same error as a bad code when the account is missing, to avoid
        // confirming which emails exist.
        let user = self
            .user_service
            .find_by_email(&email)
            .await?
            .ok_or_else(|| AppError::ValidationError("Invalid or expired code".to_string()))?;

        let hash = hash_password(&request.new_password)?;
        self.user_service.set_password_hash(user.id, &hash).await?;

        let user = self.user_service.get_user_by_id(user.id).await?;
        self.build_auth_response(user, false).await
    }

    pub async fn me(&self, user_id: i64) -> AppResult<(UserResponse, ReferralStats)> {
        let user = self.user_service.get_user_by_id(user_id).await?;
        let stats = self.referral_service.stats_for(user.id).await?;
        Ok((UserResponse::from(user), stats))
    }

    /// Single conditional UPDATE: the token is consumed only when it is
    /// still unused and unexpired, so two concurrent attempts cannot both
    /// succeed.
    async fn consume_otp(&self, email: &str, code: &str) -> AppResult<()> {
        let result = sqlx::query(
            "UPDATE otp_tokens SET used = TRUE
             WHERE email = ? AND code = ? AND used = FALSE AND expires_at > ?",
        )
        .bind(email)
        .bind(code)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        if result.rows_affected() == 0 {
            return Err(AppError::ValidationError(
                "Invalid or expired code".to_string(),
            ));
        }

        Ok(())
    }

    async fn build_auth_response(
        &self,
        user: User,
        must_set_password: bool,
    ) -> AppResult<AuthResponse> {
        let token = self.jwt_service.generate_session_token(
            user.id,
            &user.email,
            user.is_admin,
            must_set_password,
        )?;
        let stats = self.referral_service.stats_for(user.id).await?;

        Ok(AuthResponse {
            user: UserResponse::from(user),
            stats,
            token,
            expires_in: self.jwt_service.get_session_expires_in(),
            must_set_password,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmailConfig;

    async fn setup() -> (AuthService, DbPool) {
        // A single connection keeps the in-memory database alive and shared.
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();

        let email_service = EmailService::new(EmailConfig {
            api_key: String::new(),
            from_email: "noreply@example.com".to_string(),
        });
        let jwt_service = JwtService::new("test-secret", 3600, 3600);
        let user_service = UserService::new(pool.clone());
        let referral_service = ReferralService::new(
            pool.clone(),
            email_service.clone(),
            "https://example-practice.com".to_string(),
        );
        let auth_service = AuthService::new(
            pool.clone(),
            jwt_service,
            email_service,
            user_service,
            referral_service,
        );
        (auth_service, pool)
    }

    async fn latest_code(pool: &DbPool, email: &str) -> String {
        sqlx::query_scalar("SELECT code FROM otp_tokens WHERE email = ? ORDER BY id DESC LIMIT 1")
            .bind(email)
            .fetch_one(pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_send_otp_persists_token_and_sweeps_expired() {
        let (service, pool) = setup().await;

        // A stale token for an unrelated email gets swept on issuance.
        sqlx::query(
            "INSERT INTO otp_tokens (email, code, expires_at, used, created_at)
             VALUES ('stale@example.com', '000000', ?, FALSE, ?)",
        )
        .bind(Utc::now() - Duration::minutes(30))
        .bind(Utc::now() - Duration::minutes(40))
        .execute(&pool)
        .await
        .unwrap();

        let response = service.send_otp("New@Example.com").await.unwrap();
        assert_eq!(response.email, "new@example.com");
        assert_eq!(response.expires_in, 600);
        assert!(!response.staff_attributed);

        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM otp_tokens")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(total, 1);

        assert!(matches!(
            service.send_otp("not-an-email").await.unwrap_err(),
            AppError::ValidationError(_)
        ));
    }

    #[tokio::test]
    async fn test_verify_otp_is_single_use() {
        let (service, pool) = setup().await;

        service.send_otp("new@example.com").await.unwrap();
        let code = latest_code(&pool, "new@example.com").await;

        let response = service.verify_otp("new@example.com", &code).await.unwrap();
        assert!(response.must_set_password);
        assert_eq!(response.user.email, "new@example.com");
        assert_eq!(response.user.referral_code.len(), 8);

        // The same code a second time must fail.
        assert!(matches!(
            service
                .verify_otp("new@example.com", &code)
                .await
                .unwrap_err(),
            AppError::ValidationError(_)
        ));
    }

    #[tokio::test]
    async fn test_expired_code_always_fails() {
        let (service, pool) = setup().await;

        sqlx::query(
            "INSERT INTO otp_tokens (email, code, expires_at, used, created_at)
             VALUES ('a@example.com', '111222', ?, FALSE, ?)",
        )
        .bind(Utc::now() - Duration::seconds(1))
        .bind(Utc::now() - Duration::minutes(11))
        .execute(&pool)
        .await
        .unwrap();

        assert!(matches!(
            service.verify_otp("a@example.com", "111222").await.unwrap_err(),
            AppError::ValidationError(_)
        ));
    }

    #[tokio::test]
    async fn test_empty_inputs_rejected() {
        let (service, _pool) = setup().await;

        assert!(matches!(
            service.verify_otp("", "123456").await.unwrap_err(),
            AppError::ValidationError(_)
        ));
        assert!(matches!(
            service.verify_otp("a@example.com", "  ").await.unwrap_err(),
            AppError::ValidationError(_)
        ));
    }

    #[tokio::test]
    async fn test_set_password_transitions_to_authenticated() {
        let (service, pool) = setup().await;

        service.send_otp("new@example.com").await.unwrap();
        let code = latest_code(&pool, "new@example.com").await;
        let pending = service.verify_otp("new@example.com", &code).await.unwrap();
        assert!(pending.must_set_password);

        // Mismatch and too-short are rejected before any mutation.
        assert!(matches!(
            service
                .set_password(
                    pending.user.id,
                    SetPasswordRequest {
                        password: "longenough".to_string(),
                        confirm_password: "different".to_string(),
                    }
                )
                .await
                .unwrap_err(),
            AppError::ValidationError(_)
        ));
        assert!(matches!(
            service
                .set_password(
                    pending.user.id,
                    SetPasswordRequest {
                        password: "short".to_string(),
                        confirm_password: "short".to_string(),
                    }
                )
                .await
                .unwrap_err(),
            AppError::ValidationError(_)
        ));

        let authed = service
            .set_password(
                pending.user.id,
                SetPasswordRequest {
                    password: "longenough".to_string(),
                    confirm_password: "longenough".to_string(),
                },
            )
            .await
            .unwrap();
        assert!(!authed.must_set_password);
        assert!(authed.user.has_password);

        // Password login now works; wrong password stays a 401-class error.
        let login = service.login("new@example.com", "longenough").await.unwrap();
        assert!(!login.must_set_password);
        assert!(matches!(
            service.login("new@example.com", "wrong-password").await.unwrap_err(),
            AppError::AuthError(_)
        ));

        // OTP login is now rejected for this account.
        service.send_otp("new@example.com").await.unwrap();
        let code = latest_code(&pool, "new@example.com").await;
        assert!(matches!(
            service.verify_otp("new@example.com", &code).await.unwrap_err(),
            AppError::ValidationError(_)
        ));
    }

    #[tokio::test]
    async fn test_login_without_password_is_rejected() {
        let (service, pool) = setup().await;

        service.send_otp("new@example.com").await.unwrap();
        let code = latest_code(&pool, "new@example.com").await;
        service.verify_otp("new@example.com", &code).await.unwrap();

        assert!(matches!(
            service.login("new@example.com", "whatever1").await.unwrap_err(),
            AppError::ValidationError(_)
        ));
        assert!(matches!(
            service.login("unknown@example.com", "whatever1").await.unwrap_err(),
            AppError::AuthError(_)
        ));
    }

    #[tokio::test]
    async fn test_password_reset_flow() {
        let (service, pool) = setup().await;

        // Establish an account with a password.
        service.send_otp("user@example.com").await.unwrap();
        let code = latest_code(&pool, "user@example.com").await;
        let pending = service.verify_otp("user@example.com", &code).await.unwrap();
        service
            .set_password(
                pending.user.id,
                SetPasswordRequest {
                    password: "original-pass".to_string(),
                    confirm_password: "original-pass".to_string(),
                },
            )
            .await
            .unwrap();

        // Unknown emails get the same silent success and no token.
        service
            .request_password_reset("unknown@example.com")
            .await
            .unwrap();
        let unknown_tokens: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM otp_tokens WHERE email = 'unknown@example.com'")
                .fetch_one(&pool)
                .await
                .unwrap();
        assert_eq!(unknown_tokens, 0);

        service.request_password_reset("user@example.com").await.unwrap();
        let code = latest_code(&pool, "user@example.com").await;

        let authed = service
            .confirm_password_reset(PasswordResetConfirmRequest {
                email: "user@example.com".to_string(),
                token: code,
                new_password: "brand-new-pass".to_string(),
                confirm_password: "brand-new-pass".to_string(),
            })
            .await
            .unwrap();
        assert!(!authed.must_set_password);

        assert!(service.login("user@example.com", "brand-new-pass").await.is_ok());
        assert!(service.login("user@example.com", "original-pass").await.is_err());
    }
}
