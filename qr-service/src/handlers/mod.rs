pub mod health;
pub mod qr_codes;

pub use health::{health_check, metrics, readiness_check};
pub use qr_codes::{generate_qr, get_qr, validate_qr};
