pub mod registration;

pub use registration::{QrCodeRecord, RegistrationPayload};
