pub mod auth_service;
pub mod onboarding_service;
pub mod referral_service;
pub mod user_service;

pub use auth_service::*;
pub use onboarding_service::*;
pub use referral_service::*;
pub use user_service::*;
