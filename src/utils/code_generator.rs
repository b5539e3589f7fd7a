use crate::database::DbPool;
use crate::error::AppResult;
use rand::Rng;

/// Generates a 6-digit numeric code for OTP delivery.
pub fn generate_six_digit_code() -> String {
    let mut rng = rand::thread_rng();
    format!("{:06}", rng.gen_range(100000..=999999))
}

/// Generates an 8-character uppercase alphanumeric referral code.
pub fn generate_referral_code() -> String {
    let mut rng = rand::thread_rng();
    (0..8)
        .map(|_| {
            let chars = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
            chars[rng.gen_range(0..chars.len())] as char
        })
        .collect()
}

/// Generates a referral code guaranteed unique among existing users,
/// retrying on collision.
pub async fn generate_unique_referral_code(pool: &DbPool) -> AppResult<String> {
    loop {
        let code = generate_referral_code();

        let exists: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM users WHERE referral_code = ?")
                .bind(&code)
                .fetch_one(pool)
                .await?;

        if exists == 0 {
            return Ok(code);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_six_digit_code() {
        let code = generate_six_digit_code();
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));

        let code_num: u32 = code.parse().unwrap();
        assert!((100000..=999999).contains(&code_num));
    }

    #[test]
    fn test_generate_referral_code_shape() {
        let code = generate_referral_code();
        assert_eq!(code.len(), 8);
        assert!(code
            .chars()
            .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
    }

    #[tokio::test]
    async fn test_unique_referral_code_avoids_collisions() {
        // A single connection keeps the in-memory database alive and shared.
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();
        sqlx::migrate!("./migrations").run(&pool).await.unwrap();

        let code = generate_unique_referral_code(&pool).await.unwrap();
        assert_eq!(code.len(), 8);

        // Seed a user with that exact code; the next call must return a
        // different one.
        sqlx::query(
            "INSERT INTO users (email, referral_code, created_at) VALUES (?, ?, ?)",
        )
        .bind("seed@example.com")
        .bind(&code)
        .bind(chrono::Utc::now())
        .execute(&pool)
        .await
        .unwrap();

        let next = generate_unique_referral_code(&pool).await.unwrap();
        assert_ne!(code, next);
    }
}
