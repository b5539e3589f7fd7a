use crate::database::DbPool;
use crate::error::{AppError, AppResult};
use crate::external::EmailService;
use crate::models::*;
use crate::utils::{normalize_email, validate_email};
use chrono::Utc;
use uuid::Uuid;

#[derive(Clone)]
pub struct ReferralService {
    pool: DbPool,
    email_service: EmailService,
    public_base_url: String,
}

impl ReferralService {
    pub fn new(pool: DbPool, email_service: EmailService, public_base_url: String) -> Self {
        Self {
            pool,
            email_service,
            public_base_url,
        }
    }

    pub fn referral_link(&self, referral_code: &str) -> String {
        format!(
            "{}/ref/{}",
            self.public_base_url.trim_end_matches('/'),
            referral_code
        )
    }

    /// Earnings from completed referrals inside the current calendar year.
    pub async fn annual_earnings(&self, user_id: i64) -> AppResult<f64> {
        let (start, end) = current_year_window();

        let earnings: f64 = sqlx::query_scalar(
            "SELECT COALESCE(SUM(earnings), 0.0) FROM referrals
             WHERE referrer_id = ? AND status = 'completed'
               AND completed_at >= ? AND completed_at < ?",
        )
        .bind(user_id)
        .bind(start)
        .bind(end)
        .fetch_one(&self.pool)
        .await?;

        Ok(earnings)
    }

    pub async fn stats_for(&self, user_id: i64) -> AppResult<ReferralStats> {
        #[derive(sqlx::FromRow)]
        struct StatusCounts {
            total: i64,
            completed: i64,
            pending: i64,
            signed_up: i64,
        }

        let counts: StatusCounts = sqlx::query_as(
            "SELECT COUNT(*) AS total,
                    COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0) AS completed,
                    COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0) AS pending,
                    COALESCE(SUM(CASE WHEN status = 'signed_up' THEN 1 ELSE 0 END), 0) AS signed_up
             FROM referrals WHERE referrer_id = ?",
        )
        .bind(user_id)
        .fetch_one(&self.pool)
        .await?;

        let annual_earnings = self.annual_earnings(user_id).await?;
        let remaining_earnings = (ANNUAL_EARNINGS_CAP - annual_earnings).max(0.0);

        Ok(ReferralStats {
            total_referrals: counts.total,
            completed_referrals: counts.completed,
            pending_referrals: counts.pending,
            signed_up_referrals: counts.signed_up,
            annual_earnings,
            remaining_earnings,
            can_earn_more: annual_earnings < ANNUAL_EARNINGS_CAP,
        })
    }

    /// Tracks a referral-link visit and returns the referrer for the
    /// landing page.
    pub async fn record_click(
        &self,
        referral_code: &str,
        ip_address: Option<&str>,
        user_agent: Option<&str>,
    ) -> AppResult<User> {
        let referrer = sqlx::query_as::<_, User>("SELECT * FROM users WHERE referral_code = ?")
            .bind(referral_code)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Unknown referral code".to_string()))?;

        sqlx::query(
            "INSERT INTO referral_clicks (referrer_id, ip_address, user_agent, clicked_at)
             VALUES (?, ?, ?, ?)",
        )
        .bind(referrer.id)
        .bind(ip_address)
        .bind(user_agent)
        .bind(Utc::now())
        .execute(&self.pool)
        .await?;

        Ok(referrer)
    }

    /// Records a prospect signup against a referrer. The (referrer, email)
    /// uniqueness lives on the table itself, so concurrent submissions
    /// cannot both land.
    pub async fn record_signup(
        &self,
        referrer_id: i64,
        request: SignupRequest,
    ) -> AppResult<Referral> {
        let name = request.name.trim().to_string();
        let phone = request.phone.trim().to_string();
        let email = normalize_email(&request.email);

        if name.is_empty() {
            return Err(AppError::ValidationError("Name is required".to_string()));
        }
        if phone.is_empty() {
            return Err(AppError::ValidationError(
                "Phone number is required".to_string(),
            ));
        }
        if email.is_empty() {
            return Err(AppError::ValidationError("Email is required".to_string()));
        }
        validate_email(&email)?;

        let referrer = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(referrer_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("Invalid referrer".to_string()))?;

        // A prospect who is already a patient cannot be referred.
        let existing_user: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE email = ?")
            .bind(&email)
            .fetch_one(&self.pool)
            .await?;
        if existing_user > 0 {
            return Err(AppError::Conflict(
                "This email already belongs to an existing patient".to_string(),
            ));
        }

        let result = sqlx::query(
            "INSERT INTO referrals
                 (referrer_id, referred_email, referred_name, referred_phone,
                  signed_up_by_staff, origin, status, created_at, tracking_id)
             VALUES (?, ?, ?, ?, ?, 'link', 'signed_up', ?, ?)",
        )
        .bind(referrer.id)
        .bind(&email)
        .bind(&name)
        .bind(&phone)
        .bind(request.staff)
        .bind(Utc::now())
        .bind(Uuid::new_v4().to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            AppError::conflict_on_unique(e, "This person has already been referred by this user")
        })?;

        let referral = self.get_referral_by_id(result.last_insert_rowid()).await?;

        let referral_info = format!("{} ({}) - Phone: {}", name, email, phone);
        if let Err(e) = self
            .email_service
            .send_referral_notification(&referrer.email, &referral_info, ReferralStatus::SignedUp)
            .await
        {
            log::warn!("Referral notification failed for {}: {}", referrer.email, e);
        }

        Ok(referral)
    }

    pub async fn get_referral_by_id(&self, referral_id: i64) -> AppResult<Referral> {
        let referral = sqlx::query_as::<_, Referral>("SELECT * FROM referrals WHERE id = ?")
            .bind(referral_id)
            .fetch_optional(&self.pool)
            .await?;

        referral.ok_or_else(|| AppError::NotFound("Referral not found".to_string()))
    }

    /// Marks a referral completed and awards the fixed reward, subject to
    /// the annual cap. Already-completed and capped referrals are ordinary
    /// outcomes.
    pub async fn complete(&self, referral_id: i64) -> AppResult<CompletionOutcome> {
        let referral = self.get_referral_by_id(referral_id).await?;

        if referral.status == ReferralStatus::Completed {
            return Ok(CompletionOutcome::AlreadyCompleted);
        }

        let annual = self.annual_earnings(referral.referrer_id).await?;
        if annual >= ANNUAL_EARNINGS_CAP {
            return Ok(CompletionOutcome::CapReached);
        }

        let mut tx = self.pool.begin().await?;

        // Conditional update closes the race between two concurrent
        // completion attempts.
        let updated = sqlx::query(
            "UPDATE referrals SET status = 'completed', earnings = ?, completed_at = ?
             WHERE id = ? AND status != 'completed'",
        )
        .bind(REWARD_PER_COMPLETION)
        .bind(Utc::now())
        .bind(referral_id)
        .execute(&mut *tx)
        .await?;

        if updated.rows_affected() == 0 {
            tx.rollback().await?;
            return Ok(CompletionOutcome::AlreadyCompleted);
        }

        sqlx::query("UPDATE users SET total_earnings = total_earnings + ? WHERE id = ?")
            .bind(REWARD_PER_COMPLETION)
            .bind(referral.referrer_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        let referrer = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(referral.referrer_id)
            .fetch_one(&self.pool)
            .await?;
        if let Err(e) = self
            .email_service
            .send_referral_notification(
                &referrer.email,
                &referral.referred_email,
                ReferralStatus::Completed,
            )
            .await
        {
            log::warn!("Completion notification failed for {}: {}", referrer.email, e);
        }

        let referral = self.get_referral_by_id(referral_id).await?;
        Ok(CompletionOutcome::Completed(referral))
    }

    /// Deletes a referral, reversing the referrer's earnings when it had
    /// been completed.
    pub async fn delete(&self, referral_id: i64) -> AppResult<()> {
        let referral = self.get_referral_by_id(referral_id).await?;

        let mut tx = self.pool.begin().await?;

        if referral.status == ReferralStatus::Completed && referral.earnings > 0.0 {
            sqlx::query("UPDATE users SET total_earnings = total_earnings - ? WHERE id = ?")
                .bind(referral.earnings)
                .bind(referral.referrer_id)
                .execute(&mut *tx)
                .await?;
        }

        sqlx::query("DELETE FROM referrals WHERE id = ?")
            .bind(referral_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;

        Ok(())
    }

    /// Admin bulk tool: synthesizes or removes rows until the per-status
    /// counts match the requested targets. Synthesized completions respect
    /// the annual cap; removed ones reverse their earnings.
    pub async fn adjust(
        &self,
        request: AdjustReferralsRequest,
    ) -> AppResult<AdjustReferralsResponse> {
        // 404 on unknown user before mutating anything.
        sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
            .bind(request.user_id)
            .fetch_optional(&self.pool)
            .await?
            .ok_or_else(|| AppError::NotFound("User not found".to_string()))?;

        if let Some(target) = request.completed_count {
            self.adjust_status_count(request.user_id, ReferralStatus::Completed, target.max(0))
                .await?;
        }
        if let Some(target) = request.signed_up_count {
            self.adjust_status_count(request.user_id, ReferralStatus::SignedUp, target.max(0))
                .await?;
        }

        let stats = self.stats_for(request.user_id).await?;
        Ok(AdjustReferralsResponse {
            completed: stats.completed_referrals,
            signed_up: stats.signed_up_referrals,
        })
    }

    async fn adjust_status_count(
        &self,
        user_id: i64,
        status: ReferralStatus,
        target: i64,
    ) -> AppResult<()> {
        let existing = sqlx::query_as::<_, Referral>(
            "SELECT * FROM referrals WHERE referrer_id = ? AND status = ? ORDER BY id DESC",
        )
        .bind(user_id)
        .bind(status)
        .fetch_all(&self.pool)
        .await?;

        let current = existing.len() as i64;

        if target < current {
            // Remove the newest rows first; deletion reverses earnings.
            for referral in existing.iter().take((current - target) as usize) {
                self.delete(referral.id).await?;
            }
        } else {
            for _ in current..target {
                self.synthesize_referral(user_id, status).await?;
            }
        }

        Ok(())
    }

    async fn synthesize_referral(&self, user_id: i64, status: ReferralStatus) -> AppResult<()> {
        let marker = Uuid::new_v4().simple().to_string();
        let referred_email = format!("manual-{}@referral.invalid", marker);

        let earnings = if status == ReferralStatus::Completed {
            let annual = self.annual_earnings(user_id).await?;
            if annual >= ANNUAL_EARNINGS_CAP {
                0.0
            } else {
                REWARD_PER_COMPLETION
            }
        } else {
            0.0
        };
        let completed_at = if status == ReferralStatus::Completed {
            Some(Utc::now())
        } else {
            None
        };

        let mut tx = self.pool.begin().await?;

        sqlx::query(
            "INSERT INTO referrals
                 (referrer_id, referred_email, origin, status, earnings, created_at,
                  completed_at, tracking_id)
             VALUES (?, ?, 'manual', ?, ?, ?, ?, ?)",
        )
        .bind(user_id)
        .bind(&referred_email)
        .bind(status)
        .bind(earnings)
        .bind(Utc::now())
        .bind(completed_at)
        .bind(Uuid::new_v4().to_string())
        .execute(&mut *tx)
        .await?;

        if earnings > 0.0 {
            sqlx::query("UPDATE users SET total_earnings = total_earnings + ? WHERE id = ?")
                .bind(earnings)
                .bind(user_id)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;

        Ok(())
    }

    pub async fn list_user_referrals(
        &self,
        user_id: i64,
        params: &PaginationParams,
    ) -> AppResult<PaginatedResponse<ReferralResponse>> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM referrals WHERE referrer_id = ?")
            .bind(user_id)
            .fetch_one(&self.pool)
            .await?;

        let referrals = sqlx::query_as::<_, Referral>(
            "SELECT * FROM referrals WHERE referrer_id = ?
             ORDER BY created_at DESC LIMIT ? OFFSET ?",
        )
        .bind(user_id)
        .bind(params.get_limit() as i64)
        .bind(params.get_offset() as i64)
        .fetch_all(&self.pool)
        .await?;

        let items: Vec<ReferralResponse> =
            referrals.into_iter().map(ReferralResponse::from).collect();

        Ok(PaginatedResponse::new(items, params, total))
    }

    pub async fn recent_referrals(&self, user_id: i64, limit: i64) -> AppResult<Vec<ReferralResponse>> {
        let referrals = sqlx::query_as::<_, Referral>(
            "SELECT * FROM referrals WHERE referrer_id = ? ORDER BY created_at DESC LIMIT ?",
        )
        .bind(user_id)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        Ok(referrals.into_iter().map(ReferralResponse::from).collect())
    }

    /// Admin listing with optional status filter; each row embeds the
    /// referrer's identity.
    pub async fn list_all(
        &self,
        params: &PaginationParams,
        status: Option<ReferralStatus>,
    ) -> AppResult<PaginatedResponse<AdminReferralResponse>> {
        let (total, referrals) = match status {
            Some(status) => {
                let total: i64 =
                    sqlx::query_scalar("SELECT COUNT(*) FROM referrals WHERE status = ?")
                        .bind(status)
                        .fetch_one(&self.pool)
                        .await?;
                let rows = sqlx::query_as::<_, Referral>(
                    "SELECT * FROM referrals WHERE status = ?
                     ORDER BY created_at DESC LIMIT ? OFFSET ?",
                )
                .bind(status)
                .bind(params.get_limit() as i64)
                .bind(params.get_offset() as i64)
                .fetch_all(&self.pool)
                .await?;
                (total, rows)
            }
            None => {
                let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM referrals")
                    .fetch_one(&self.pool)
                    .await?;
                let rows = sqlx::query_as::<_, Referral>(
                    "SELECT * FROM referrals ORDER BY created_at DESC LIMIT ? OFFSET ?",
                )
                .bind(params.get_limit() as i64)
                .bind(params.get_offset() as i64)
                .fetch_all(&self.pool)
                .await?;
                (total, rows)
            }
        };

        let mut items = Vec::with_capacity(referrals.len());
        for referral in referrals {
            let referrer = sqlx::query_as::<_, User>("SELECT * FROM users WHERE id = ?")
                .bind(referral.referrer_id)
                .fetch_one(&self.pool)
                .await?;
            items.push(AdminReferralResponse {
                referral: ReferralResponse::from(referral),
                referrer: UserResponse::from(referrer),
            });
        }

        Ok(PaginatedResponse::new(items, params, total))
    }

    /// Flat denormalized dump of all referrals joined with referrer
    /// identity, for the admin export.
    pub async fn export_csv(&self) -> AppResult<String> {
        #[derive(sqlx::FromRow)]
        struct ExportRow {
            id: i64,
            referrer_email: String,
            referrer_code: String,
            referred_email: String,
            status: ReferralStatus,
            earnings: f64,
            created_at: chrono::DateTime<Utc>,
            completed_at: Option<chrono::DateTime<Utc>>,
        }

        let rows: Vec<ExportRow> = sqlx::query_as(
            "SELECT r.id, u.email AS referrer_email, u.referral_code AS referrer_code,
                    r.referred_email, r.status, r.earnings, r.created_at, r.completed_at
             FROM referrals r JOIN users u ON u.id = r.referrer_id
             ORDER BY r.id",
        )
        .fetch_all(&self.pool)
        .await?;

        let mut output = String::from(
            "ID,Referrer Email,Referrer Code,Referred Email,Status,Earnings,Created At,Completed At\n",
        );
        for row in rows {
            output.push_str(&format!(
                "{},{},{},{},{},{},{},{}\n",
                row.id,
                row.referrer_email,
                row.referrer_code,
                row.referred_email,
                row.status,
                row.earnings,
                row.created_at.to_rfc3339(),
                row.completed_at.map(|t| t.to_rfc3339()).unwrap_or_default(),
            ));
        }

        Ok(output)
    }

    pub async fn admin_stats(&self) -> AppResult<AdminStats> {
        let total_users: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;

        #[derive(sqlx::FromRow)]
        struct ReferralTotals {
            total: i64,
            completed: i64,
            pending: i64,
            signed_up: i64,
            earnings_paid: f64,
        }

        let totals: ReferralTotals = sqlx::query_as(
            "SELECT COUNT(*) AS total,
                    COALESCE(SUM(CASE WHEN status = 'completed' THEN 1 ELSE 0 END), 0) AS completed,
                    COALESCE(SUM(CASE WHEN status = 'pending' THEN 1 ELSE 0 END), 0) AS pending,
                    COALESCE(SUM(CASE WHEN status = 'signed_up' THEN 1 ELSE 0 END), 0) AS signed_up,
                    COALESCE(SUM(CASE WHEN status = 'completed' THEN earnings ELSE 0 END), 0.0)
                        AS earnings_paid
             FROM referrals",
        )
        .fetch_one(&self.pool)
        .await?;

        Ok(AdminStats {
            total_users,
            total_referrals: totals.total,
            completed_referrals: totals.completed,
            pending_referrals: totals.pending,
            signed_up_referrals: totals.signed_up,
            total_earnings_paid: totals.earnings_paid,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EmailConfig;
    use crate::services::UserService;

    async fn setup() -> (ReferralService, UserService) {
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
        let referral_service = ReferralService::new(
            pool.clone(),
            email_service,
            "https://example-practice.com".to_string(),
        );
        (referral_service, UserService::new(pool))
    }

    fn signup(email: &str) -> SignupRequest {
        SignupRequest {
            name: "Jane Doe".to_string(),
            phone: "5551234567".to_string(),
            email: email.to_string(),
            staff: None,
        }
    }

    async fn total_earnings(service: &ReferralService, user_id: i64) -> f64 {
        sqlx::query_scalar("SELECT total_earnings FROM users WHERE id = ?")
            .bind(user_id)
            .fetch_one(&service.pool)
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_record_click_tracks_visit() {
        let (service, users) = setup().await;
        let user = users.create_user("referrer@example.com", false).await.unwrap();

        let referrer = service
            .record_click(&user.referral_code, Some("203.0.113.7"), Some("test-agent"))
            .await
            .unwrap();
        assert_eq!(referrer.id, user.id);

        let clicks = sqlx::query_as::<_, ReferralClick>("SELECT * FROM referral_clicks")
            .fetch_all(&service.pool)
            .await
            .unwrap();
        assert_eq!(clicks.len(), 1);
        assert_eq!(clicks[0].referrer_id, user.id);
        assert_eq!(clicks[0].ip_address.as_deref(), Some("203.0.113.7"));
        assert_eq!(clicks[0].user_agent.as_deref(), Some("test-agent"));

        assert!(matches!(
            service.record_click("NOPE1234", None, None).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_record_signup_validations() {
        let (service, users) = setup().await;
        let user = users.create_user("referrer@example.com", false).await.unwrap();

        let mut blank_name = signup("jane@example.com");
        blank_name.name = "  ".to_string();
        assert!(matches!(
            service.record_signup(user.id, blank_name).await.unwrap_err(),
            AppError::ValidationError(_)
        ));

        let bad_email = signup("not-an-email");
        assert!(matches!(
            service.record_signup(user.id, bad_email).await.unwrap_err(),
            AppError::ValidationError(_)
        ));
    }

    #[tokio::test]
    async fn test_record_signup_and_duplicate_conflict() {
        let (service, users) = setup().await;
        let user = users.create_user("referrer@example.com", false).await.unwrap();

        let referral = service
            .record_signup(user.id, signup("jane@example.com"))
            .await
            .unwrap();
        assert_eq!(referral.status, ReferralStatus::SignedUp);
        assert_eq!(referral.origin, ReferralOrigin::Link);
        assert_eq!(referral.referred_email, "jane@example.com");

        // Same (referrer, email) pair again conflicts.
        assert!(matches!(
            service
                .record_signup(user.id, signup("jane@example.com"))
                .await
                .unwrap_err(),
            AppError::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn test_cannot_refer_existing_patient() {
        let (service, users) = setup().await;
        let referrer = users.create_user("referrer@example.com", false).await.unwrap();
        users.create_user("patient@example.com", false).await.unwrap();

        assert!(matches!(
            service
                .record_signup(referrer.id, signup("patient@example.com"))
                .await
                .unwrap_err(),
            AppError::Conflict(_)
        ));
    }

    #[tokio::test]
    async fn test_complete_awards_reward_once() {
        let (service, users) = setup().await;
        let user = users.create_user("referrer@example.com", false).await.unwrap();
        let referral = service
            .record_signup(user.id, signup("jane@example.com"))
            .await
            .unwrap();

        let outcome = service.complete(referral.id).await.unwrap();
        match outcome {
            CompletionOutcome::Completed(r) => {
                assert_eq!(r.status, ReferralStatus::Completed);
                assert_eq!(r.earnings, REWARD_PER_COMPLETION);
                assert!(r.completed_at.is_some());
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        assert_eq!(total_earnings(&service, user.id).await, REWARD_PER_COMPLETION);

        // Re-completing is a no-op.
        assert!(matches!(
            service.complete(referral.id).await.unwrap(),
            CompletionOutcome::AlreadyCompleted
        ));
        assert_eq!(total_earnings(&service, user.id).await, REWARD_PER_COMPLETION);
    }

    #[tokio::test]
    async fn test_annual_cap_blocks_eleventh_completion() {
        let (service, users) = setup().await;
        let user = users.create_user("referrer@example.com", false).await.unwrap();

        for i in 0..10 {
            let referral = service
                .record_signup(user.id, signup(&format!("friend{}@example.com", i)))
                .await
                .unwrap();
            assert!(matches!(
                service.complete(referral.id).await.unwrap(),
                CompletionOutcome::Completed(_)
            ));
        }
        assert_eq!(total_earnings(&service, user.id).await, ANNUAL_EARNINGS_CAP);

        let eleventh = service
            .record_signup(user.id, signup("friend10@example.com"))
            .await
            .unwrap();
        assert!(matches!(
            service.complete(eleventh.id).await.unwrap(),
            CompletionOutcome::CapReached
        ));
        assert_eq!(total_earnings(&service, user.id).await, ANNUAL_EARNINGS_CAP);

        let stats = service.stats_for(user.id).await.unwrap();
        assert!(!stats.can_earn_more);
        assert_eq!(stats.remaining_earnings, 0.0);
    }

    #[tokio::test]
    async fn test_delete_reverses_earnings() {
        let (service, users) = setup().await;
        let user = users.create_user("referrer@example.com", false).await.unwrap();
        let referral = service
            .record_signup(user.id, signup("jane@example.com"))
            .await
            .unwrap();

        let before = total_earnings(&service, user.id).await;
        service.complete(referral.id).await.unwrap();
        service.delete(referral.id).await.unwrap();

        let after = total_earnings(&service, user.id).await;
        assert!((after - before).abs() < f64::EPSILON);
        assert!(matches!(
            service.get_referral_by_id(referral.id).await.unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_adjust_synthesizes_and_removes() {
        let (service, users) = setup().await;
        let user = users.create_user("referrer@example.com", false).await.unwrap();

        let response = service
            .adjust(AdjustReferralsRequest {
                user_id: user.id,
                completed_count: Some(2),
                signed_up_count: Some(3),
            })
            .await
            .unwrap();
        assert_eq!(response.completed, 2);
        assert_eq!(response.signed_up, 3);
        assert_eq!(
            total_earnings(&service, user.id).await,
            2.0 * REWARD_PER_COMPLETION
        );

        // Shrinking the completed count reverses earnings proportionally.
        let response = service
            .adjust(AdjustReferralsRequest {
                user_id: user.id,
                completed_count: Some(1),
                signed_up_count: None,
            })
            .await
            .unwrap();
        assert_eq!(response.completed, 1);
        assert_eq!(response.signed_up, 3);
        assert_eq!(total_earnings(&service, user.id).await, REWARD_PER_COMPLETION);

        assert!(matches!(
            service
                .adjust(AdjustReferralsRequest {
                    user_id: 9999,
                    completed_count: Some(1),
                    signed_up_count: None,
                })
                .await
                .unwrap_err(),
            AppError::NotFound(_)
        ));
    }

    #[tokio::test]
    async fn test_adjust_respects_annual_cap() {
        let (service, users) = setup().await;
        let user = users.create_user("referrer@example.com", false).await.unwrap();

        let response = service
            .adjust(AdjustReferralsRequest {
                user_id: user.id,
                completed_count: Some(12),
                signed_up_count: None,
            })
            .await
            .unwrap();

        // All twelve rows exist but only ten carry earnings.
        assert_eq!(response.completed, 12);
        assert_eq!(total_earnings(&service, user.id).await, ANNUAL_EARNINGS_CAP);
    }

    #[tokio::test]
    async fn test_export_and_admin_stats() {
        let (service, users) = setup().await;
        let user = users.create_user("referrer@example.com", false).await.unwrap();
        let referral = service
            .record_signup(user.id, signup("jane@example.com"))
            .await
            .unwrap();
        service.complete(referral.id).await.unwrap();

        let csv = service.export_csv().await.unwrap();
        let mut lines = csv.lines();
        assert_eq!(
            lines.next().unwrap(),
            "ID,Referrer Email,Referrer Code,Referred Email,Status,Earnings,Created At,Completed At"
        );
        let row = lines.next().unwrap();
        assert!(row.contains("referrer@example.com"));
        assert!(row.contains("jane@example.com"));
        assert!(row.contains("completed"));

        let stats = service.admin_stats().await.unwrap();
        assert_eq!(stats.total_users, 1);
        assert_eq!(stats.total_referrals, 1);
        assert_eq!(stats.completed_referrals, 1);
        assert_eq!(stats.total_earnings_paid, REWARD_PER_COMPLETION);
    }

    #[tokio::test]
    async fn test_list_all_with_status_filter() {
        let (service, users) = setup().await;
        let user = users.create_user("referrer@example.com", false).await.unwrap();
        let first = service
            .record_signup(user.id, signup("a@example.com"))
            .await
            .unwrap();
        service
            .record_signup(user.id, signup("b@example.com"))
            .await
            .unwrap();
        service.complete(first.id).await.unwrap();

        let params = PaginationParams::new(None, None);
        let all = service.list_all(&params, None).await.unwrap();
        assert_eq!(all.pagination.total, 2);
        assert_eq!(all.items[0].referrer.email, "referrer@example.com");

        let completed = service
            .list_all(&params, Some(ReferralStatus::Completed))
            .await
            .unwrap();
        assert_eq!(completed.pagination.total, 1);
        assert_eq!(
            completed.items[0].referral.status,
            ReferralStatus::Completed
        );
    }
}
