use crate::error::{AppError, AppResult};
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

/// Session claims. `must_set_password` gates the restricted
/// OTP-verified-pending-password state without a database lookup.
#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    pub sub: String, // user_id
    pub email: String,
    pub is_admin: bool,
    pub must_set_password: bool,
    pub exp: i64,
    pub iat: i64,
    pub token_type: String, // "session" or "referral"
}

/// Claims carried by the referrer cookie set on a referral-link click.
#[derive(Debug, Serialize, Deserialize)]
pub struct ReferralClaims {
    pub sub: String, // referrer user_id
    pub referral_code: String,
    pub exp: i64,
    pub iat: i64,
    pub token_type: String,
}

#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    session_expires_in: i64,
    referral_expires_in: i64,
}

impl JwtService {
    pub fn new(secret: &str, session_expires_in: i64, referral_expires_in: i64) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            session_expires_in,
            referral_expires_in,
        }
    }

    pub fn generate_session_token(
        &self,
        user_id: i64,
        email: &str,
        is_admin: bool,
        must_set_password: bool,
    ) -> AppResult<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.session_expires_in);

        let claims = Claims {
            sub: user_id.to_string(),
            email: email.to_string(),
            is_admin,
            must_set_password,
            exp: exp.timestamp(),
            iat: now.timestamp(),
            token_type: "session".to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(AppError::JwtError)
    }

    pub fn verify_session_token(&self, token: &str) -> AppResult<Claims> {
        let validation = Validation::new(Algorithm::HS256);
        let claims = decode::<Claims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(AppError::JwtError)?;

        if claims.token_type != "session" {
            return Err(AppError::AuthError("Invalid session token type".to_string()));
        }

        Ok(claims)
    }

    pub fn generate_referral_token(&self, referrer_id: i64, referral_code: &str) -> AppResult<String> {
        let now = Utc::now();
        let exp = now + Duration::seconds(self.referral_expires_in);

        let claims = ReferralClaims {
            sub: referrer_id.to_string(),
            referral_code: referral_code.to_string(),
            exp: exp.timestamp(),
            iat: now.timestamp(),
            token_type: "referral".to_string(),
        };

        encode(&Header::default(), &claims, &self.encoding_key).map_err(AppError::JwtError)
    }

    pub fn verify_referral_token(&self, token: &str) -> AppResult<ReferralClaims> {
        let validation = Validation::new(Algorithm::HS256);
        let claims = decode::<ReferralClaims>(token, &self.decoding_key, &validation)
            .map(|data| data.claims)
            .map_err(AppError::JwtError)?;

        if claims.token_type != "referral" {
            return Err(AppError::AuthError("Invalid referral token type".to_string()));
        }

        Ok(claims)
    }

    pub fn get_session_expires_in(&self) -> i64 {
        self.session_expires_in
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service() -> JwtService {
        JwtService::new("test-secret", 3600, 3600)
    }

    #[test]
    fn test_session_token_round_trip() {
        let jwt = service();
        let token = jwt
            .generate_session_token(42, "a@b.com", false, true)
            .unwrap();
        let claims = jwt.verify_session_token(&token).unwrap();
        assert_eq!(claims.sub, "42");
        assert_eq!(claims.email, "a@b.com");
        assert!(claims.must_set_password);
        assert!(!claims.is_admin);
    }

    #[test]
    fn test_token_types_are_not_interchangeable() {
        let jwt = service();
        let referral = jwt.generate_referral_token(7, "ABCD1234").unwrap();
        assert!(jwt.verify_session_token(&referral).is_err());

        let session = jwt.generate_session_token(7, "a@b.com", false, false).unwrap();
        assert!(jwt.verify_referral_token(&session).is_err());
    }

    #[test]
    fn test_tampered_token_rejected() {
        let jwt = service();
        let other = JwtService::new("other-secret", 3600, 3600);
        let token = other
            .generate_session_token(1, "a@b.com", true, false)
            .unwrap();
        assert!(jwt.verify_session_token(&token).is_err());
    }
}
