pub mod common;
pub mod onboarding_token;
pub mod otp_token;
pub mod pagination;
pub mod referral;
pub mod referral_click;
pub mod staff;
pub mod user;

pub use common::*;
pub use onboarding_token::*;
pub use otp_token::*;
pub use pagination::*;
pub use referral::*;
pub use referral_click::*;
pub use staff::*;
pub use user::*;
