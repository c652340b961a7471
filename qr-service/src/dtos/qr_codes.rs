use serde::{Deserialize, Serialize};

/// Body of `POST /api/generate/`. Missing fields are kept as `null`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateQrRequest {
    pub event_id: Option<String>,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QrCodeResponse {
    pub success: bool,
    pub qr_code_url: String,
}

impl QrCodeResponse {
    pub fn new(qr_code_url: String) -> Self {
        Self {
            success: true,
            qr_code_url,
        }
    }
}

/// A scanned ticket: the decoded QR payload.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateQrRequest {
    pub event_id: Option<String>,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub registration_id: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateQrResponse {
    pub success: bool,
    pub message: String,
    pub user_name: Option<String>,
}

impl ValidateQrResponse {
    pub fn registered(user_name: Option<String>) -> Self {
        Self {
            success: true,
            message: "Welcome!".to_string(),
            user_name,
        }
    }

    pub fn unregistered() -> Self {
        Self {
            success: false,
            message: "Not Registered".to_string(),
            user_name: None,
        }
    }
}
