use crate::services::storage::pair_key;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// The record encoded into a registration QR code.
///
/// Field order is part of the encoded form: scanners at the gate read
/// `eventId`, `userId`, `userName`, `registrationId`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationPayload {
    pub event_id: Option<String>,
    pub user_id: Option<String>,
    pub user_name: Option<String>,
    pub registration_id: String,
}

impl RegistrationPayload {
    pub fn new(
        event_id: Option<String>,
        user_id: Option<String>,
        user_name: Option<String>,
    ) -> Self {
        Self {
            event_id,
            user_id,
            user_name,
            registration_id: Uuid::new_v4().to_string(),
        }
    }

    /// Compact JSON form embedded in the QR image.
    pub fn encode(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// A stored QR image, as known to the registration index.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct QrCodeRecord {
    /// `<eventId>_<userId>` exactly as it appears in the file name.
    pub pair_key: String,
    /// Known for images generated by this process. A file name alone cannot
    /// say where the event id ends once either id contains `_`, so records
    /// recovered from disk leave both unset.
    pub event_id: Option<String>,
    pub user_id: Option<String>,
    pub registration_id: String,
    pub file_name: String,
    pub created_at: DateTime<Utc>,
}

impl QrCodeRecord {
    pub fn new(event_id: String, user_id: String, registration_id: String, file_name: String) -> Self {
        Self {
            pair_key: pair_key(&event_id, &user_id),
            event_id: Some(event_id),
            user_id: Some(user_id),
            registration_id,
            file_name,
            created_at: Utc::now(),
        }
    }

    /// Record for an image found on disk, keyed only by what the name proves.
    pub fn recovered(
        pair_key: String,
        registration_id: String,
        file_name: String,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            pair_key,
            event_id: None,
            user_id: None,
            registration_id,
            file_name,
            created_at,
        }
    }
}
