use crate::database::DbPool;
use crate::error::{AppError, AppResult};
use crate::models::*;
use crate::utils::{generate_unique_referral_code, normalize_email, validate_email};
use chrono::Utc;

#[derive(Clone)]
pub struct UserService {
    pool: DbPool,
}

impl UserService {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }

    pub async fn get_user_by_id(&self, user_id: i64) -> AppResult<User> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_optional(&self.pool)
            .await?;

        user.ok_or_else(|| AppError::NotFound("User not found".to_string()))
    }

    pub async fn find_by_email(&self, email: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    pub async fn find_by_referral_code(&self, code: &str) -> AppResult<Option<User>> {
        let user = sqlx::query_as::<_, User>("SELECT * FROM users WHERE referral_code = ?")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;

        Ok(user)
    }

    /// Creates a user with a freshly generated unique referral code. The
    /// code is immutable once assigned.
    pub async fn create_user(&self, email: &str, is_admin: bool) -> AppResult<User> {
        let referral_code = generate_unique_referral_code(&self.pool).await?;

        let result = sqlx::query(
            "INSERT INTO users (email, referral_code, is_admin, created_at) VALUES (?, ?, ?, ?)",
        )
        .bind(email)
        .bind(&referral_code)
        .bind(is_admin)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::conflict_on_unique(e, "A user with this email already exists"))?;

        self.get_user_by_id(result.last_insert_rowid()).await
    }

    pub async fn find_or_create_by_email(&self, email: &str) -> AppResult<User> {
        if let Some(user) = self.find_by_email(email).await? {
            return Ok(user);
        }
        self.create_user(email, false).await
    }

    /// First-write-wins profile attribution: name and staff tag are only
    /// persisted when currently unset, never overwritten silently.
    pub async fn set_profile_if_absent(
        &self,
        user_id: i64,
        name: Option<&str>,
        staff: Option<StaffMember>,
    ) -> AppResult<()> {
        if let Some(name) = name {
            sqlx::query("UPDATE users SET name = ? WHERE id = ? AND name IS NULL")
                .bind(name)
                .bind(user_id)
                .execute(&self.pool)
                .await?;
        }
        if let Some(staff) = staff {
            sqlx::query(
                "UPDATE users SET signed_up_by_staff = ? WHERE id = ? AND signed_up_by_staff IS NULL",
            )
            .bind(staff)
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        }

        Ok(())
    }

    pub async fn set_password_hash(&self, user_id: i64, password_hash: &str) -> AppResult<()> {
        sqlx::query("UPDATE users SET password_hash = ?, password_set_at = ? WHERE id = ?")
            .bind(password_hash)
            .bind(Utc::now())
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    /// UI hint for the OTP request flow: whether this email already carries
    /// a staff attribution.
    pub async fn staff_attributed(&self, email: &str) -> AppResult<bool> {
        let attributed: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE email = ? AND signed_up_by_staff IS NOT NULL",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await?;

        Ok(attributed > 0)
    }

    /// Bootstraps the configured admin account at startup.
    pub async fn ensure_admin(&self, email: &str) -> AppResult<()> {
        let email = normalize_email(email);
        if self.find_by_email(&email).await?.is_none() {
            self.create_user(&email, true).await?;
            log::info!("Created admin user: {}", email);
        }

        Ok(())
    }

    pub async fn list_users(
        &self,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResponse<UserResponse>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        let users = sqlx::query_as::<_, User>(
            "SELECT * FROM users ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(params.get_limit() as i64)
        .bind(params.get_offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let items: Vec<UserResponse> = users.into_iter().map(UserResponse::from).collect();

        Ok(PaginatedResponse::new(items, params, total))
    }

    /// Admin bulk upload: creates users for unseen emails, skips the rest.
    pub async fn upload_users(&self, request: UploadUsersRequest) -> AppResult<UploadUsersResponse> {
        let mut created = 0;
        let mut skipped = 0;

        for row in request.users {
            let email = normalize_email(&row.email);
            if validate_email(&email).is_err() {
                skipped += 1;
                continue;
            }
            if self.find_by_email(&email).await?.is_some() {
                skipped += 1;
                continue;
            }

            let user = self.create_user(&email, false).await?;
            self.set_profile_if_absent(user.id, row.name.as_deref(), row.staff)
                .await?;
            created += 1;
        }

        Ok(UploadUsersResponse { created, skipped })
    }

    /// Admin deletion. Cascades to everything the user owns: referrals,
    /// clicks, onboarding tokens.
    pub async fn delete_user(&self, user_id: i64) -> AppResult<()> {
        // Existence check first so a bad id is a 404, not a silent no-op.
        self.get_user_by_id(user_id).await?;

        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM referrals WHERE referrer_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM referral_clicks WHERE referrer_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM onboarding_tokens WHERE user_id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM users WHERE id = ?")
            .bind(user_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }
}
