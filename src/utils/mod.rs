pub mod code_generator;
pub mod email;
pub mod jwt;
pub mod password;
pub mod qr;

pub use code_generator::*;
pub use email::*;
pub use jwt::*;
pub use password::*;
pub use qr::*;
