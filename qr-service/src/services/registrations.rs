use crate::models::{QrCodeRecord, RegistrationPayload};
use crate::services::index::RegistrationIndex;
use crate::services::metrics;
use crate::services::qr_generator::QrGenerator;
use crate::services::storage::{QrFileName, QrStore, MISSING_ID};
use service_core::error::AppError;
use std::sync::Arc;

/// Result of a successful generate call.
#[derive(Debug, Clone)]
pub struct GeneratedQr {
    pub payload: RegistrationPayload,
    pub record: QrCodeRecord,
    pub url: String,
}

#[derive(Clone)]
pub struct RegistrationService {
    generator: QrGenerator,
    store: Arc<dyn QrStore>,
    index: Arc<RegistrationIndex>,
}

impl RegistrationService {
    pub fn new(
        generator: QrGenerator,
        store: Arc<dyn QrStore>,
        index: Arc<RegistrationIndex>,
    ) -> Self {
        Self {
            generator,
            store,
            index,
        }
    }

    pub fn store(&self) -> &Arc<dyn QrStore> {
        &self.store
    }

    pub fn index(&self) -> &Arc<RegistrationIndex> {
        &self.index
    }

    /// Build a payload with a fresh registration id, render it and store the
    /// image as `<eventId>_<userId>_<registrationId>.png`.
    pub async fn generate(
        &self,
        event_id: Option<String>,
        user_id: Option<String>,
        user_name: Option<String>,
    ) -> Result<GeneratedQr, AppError> {
        let payload = RegistrationPayload::new(event_id, user_id, user_name);
        let event_key = payload.event_id.as_deref().unwrap_or(MISSING_ID);
        let user_key = payload.user_id.as_deref().unwrap_or(MISSING_ID);

        // Reject unusable identifiers before spending time on rendering.
        let file_name = QrFileName::new(event_key, user_key, &payload.registration_id)?;

        let data = payload
            .encode()
            .map_err(|e| AppError::InternalError(anyhow::Error::new(e)))?;

        let generator = self.generator.clone();
        let png = tokio::task::spawn_blocking(move || generator.render_png(&data))
            .await
            .map_err(|e| AppError::InternalError(anyhow::anyhow!("QR render task failed: {}", e)))??;

        self.store.save(&file_name, png).await.map_err(|e| {
            tracing::error!("Failed to store QR image {}: {}", file_name.as_str(), e);
            e
        })?;

        let record = QrCodeRecord::new(
            event_key.to_string(),
            user_key.to_string(),
            payload.registration_id.clone(),
            file_name.as_str().to_string(),
        );
        self.index.insert(record.clone());
        metrics::record_generated();

        tracing::info!(
            event_id = %event_key,
            user_id = %user_key,
            registration_id = %payload.registration_id,
            "QR code generated"
        );

        Ok(GeneratedQr {
            url: self.store.public_url(file_name.as_str()),
            payload,
            record,
        })
    }

    /// URL of a stored image for the pair, if any.
    ///
    /// The index answers with the newest registration it knows of. Files it
    /// does not know are found by a directory scan and then remembered.
    pub async fn lookup(&self, event_id: &str, user_id: &str) -> Result<Option<String>, AppError> {
        if let Some(record) = self.index.latest(event_id, user_id) {
            metrics::record_lookup("hit");
            return Ok(Some(self.store.public_url(&record.file_name)));
        }

        match self.store.find(event_id, user_id).await? {
            Some(stored) => {
                self.index.insert_stored(&stored);
                metrics::record_lookup("scan_hit");
                Ok(Some(self.store.public_url(stored.file_name.as_str())))
            }
            None => {
                metrics::record_lookup("miss");
                Ok(None)
            }
        }
    }

    /// Whether a scanned ticket belongs to a stored registration.
    ///
    /// With a registration id the exact image must exist; without one any
    /// image for the pair is enough. Issued registration ids never contain
    /// `_`, and one that does would name another pair's image.
    pub async fn validate(
        &self,
        event_id: &str,
        user_id: &str,
        registration_id: Option<&str>,
    ) -> Result<bool, AppError> {
        let registered = match registration_id {
            Some(registration_id) if registration_id.contains('_') => false,
            Some(registration_id) => {
                let file_name = QrFileName::new(event_id, user_id, registration_id)?;
                self.index.contains(&file_name) || self.store.exists(&file_name).await?
            }
            None => self.lookup(event_id, user_id).await?.is_some(),
        };

        metrics::record_validation(registered);
        Ok(registered)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::QrRenderConfig;
    use crate::services::storage::LocalQrStore;
    use std::path::PathBuf;
    use uuid::Uuid;

    async fn service() -> (RegistrationService, PathBuf) {
        let root = PathBuf::from(format!("target/test-registrations-{}", Uuid::new_v4()));
        let store = LocalQrStore::new(&root, "/media/").await.unwrap();
        let service = RegistrationService::new(
            QrGenerator::new(QrRenderConfig::default()),
            Arc::new(store),
            Arc::new(RegistrationIndex::new()),
        );
        (service, root)
    }

    #[tokio::test]
    async fn generate_stores_file_and_indexes_it() {
        let (service, root) = service().await;

        let generated = service
            .generate(Some("E1".into()), Some("U1".into()), Some("Alice".into()))
            .await
            .unwrap();

        let expected_name = format!("E1_U1_{}.png", generated.payload.registration_id);
        assert_eq!(generated.record.file_name, expected_name);
        assert_eq!(generated.url, format!("/media/qrcodes/{}", expected_name));
        assert!(root.join("qrcodes").join(&expected_name).exists());
        assert_eq!(service.index().len(), 1);

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn missing_ids_use_null_segment() {
        let (service, root) = service().await;

        let generated = service.generate(None, None, None).await.unwrap();

        assert!(generated.record.file_name.starts_with("null_null_"));
        assert_eq!(
            service.lookup("null", "null").await.unwrap(),
            Some(generated.url)
        );

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn unsafe_ids_write_nothing() {
        let (service, root) = service().await;

        let err = service
            .generate(Some("../../etc".into()), Some("U1".into()), None)
            .await
            .unwrap_err();

        assert!(matches!(err, AppError::BadRequest(_)));
        assert!(service.store().list().await.unwrap().is_empty());

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn lookup_falls_back_to_directory_scan() {
        let (service, root) = service().await;
        let name = format!("E9_U9_{}.png", Uuid::new_v4());
        tokio::fs::write(root.join("qrcodes").join(&name), b"png")
            .await
            .unwrap();

        let url = service.lookup("E9", "U9").await.unwrap();
        assert_eq!(url, Some(format!("/media/qrcodes/{}", name)));
        assert_eq!(service.index().len(), 1);

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn validate_checks_exact_registration() {
        let (service, root) = service().await;
        let generated = service
            .generate(Some("E1".into()), Some("U1".into()), None)
            .await
            .unwrap();
        let reg = generated.payload.registration_id.as_str();

        assert!(service.validate("E1", "U1", Some(reg)).await.unwrap());
        assert!(service.validate("E1", "U1", None).await.unwrap());
        assert!(!service
            .validate("E1", "U1", Some(&Uuid::new_v4().to_string()))
            .await
            .unwrap());
        assert!(!service.validate("E2", "U1", Some(reg)).await.unwrap());

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[tokio::test]
    async fn validate_keeps_underscored_pairs_apart() {
        let (service, root) = service().await;
        let generated = service
            .generate(Some("E1".into()), Some("U1_2".into()), None)
            .await
            .unwrap();
        let shifted = format!("2_{}", generated.payload.registration_id);

        assert!(!service.validate("E1", "U1", None).await.unwrap());
        assert!(!service.validate("E1", "U1", Some(&shifted)).await.unwrap());
        assert!(service.validate("E1", "U1_2", None).await.unwrap());

        // Same with a cold index, where only the directory can answer.
        let cold = RegistrationService::new(
            QrGenerator::new(QrRenderConfig::default()),
            service.store().clone(),
            Arc::new(RegistrationIndex::new()),
        );
        assert!(!cold.validate("E1", "U1", None).await.unwrap());
        assert!(!cold.validate("E1", "U1", Some(&shifted)).await.unwrap());
        assert!(cold.validate("E1", "U1_2", None).await.unwrap());

        let _ = tokio::fs::remove_dir_all(&root).await;
    }
}
