pub mod qr_codes;

pub use qr_codes::{GenerateQrRequest, QrCodeResponse, ValidateQrRequest, ValidateQrResponse};
