pub mod admin;
pub mod auth;
pub mod display;
pub mod onboarding;
pub mod referral;
pub mod user;

pub use admin::admin_config;
pub use auth::auth_config;
pub use display::display_config;
pub use onboarding::onboarding_config;
pub use referral::referral_config;
pub use user::user_config;
