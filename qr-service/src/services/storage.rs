//! Filename-addressed QR image store.
//!
//! The file name is the only index of record:
//! `<eventId>_<userId>_<registrationId>.png` under `<media_root>/qrcodes`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use service_core::error::AppError;
use std::path::{Path, PathBuf};
use tokio::fs;
use tokio::io::AsyncWriteExt;

/// Directory under the media root holding the images.
pub const QR_DIR: &str = "qrcodes";
pub const QR_EXTENSION: &str = "png";

/// Segment written for an identifier the caller left out.
pub const MISSING_ID: &str = "null";

const MAX_FILE_NAME_LEN: usize = 255;

/// Suffix of an image still being written. Never matches `QrFileName::parse`.
const PARTIAL_SUFFIX: &str = ".part";

/// `<eventId>_<userId>`, the part of a file name shared by every image of a
/// registration pair.
pub fn pair_key(event_id: &str, user_id: &str) -> String {
    format!("{}_{}", event_id, user_id)
}

fn check_segment(segment: &str) -> Result<(), AppError> {
    if segment.contains(&['/', '\\', '\0'][..]) {
        return Err(AppError::BadRequest(anyhow::anyhow!(
            "Identifier contains a path separator: {:?}",
            segment
        )));
    }
    Ok(())
}

/// A validated `<eventId>_<userId>_<registrationId>.png` name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QrFileName {
    pair_key: String,
    registration_id: String,
    file_name: String,
}

impl QrFileName {
    pub fn new(event_id: &str, user_id: &str, registration_id: &str) -> Result<Self, AppError> {
        check_segment(event_id)?;
        check_segment(user_id)?;
        check_segment(registration_id)?;

        let pair_key = pair_key(event_id, user_id);
        let file_name = format!("{}_{}.{}", pair_key, registration_id, QR_EXTENSION);
        if file_name.len() > MAX_FILE_NAME_LEN {
            return Err(AppError::BadRequest(anyhow::anyhow!(
                "Identifiers too long for a QR file name"
            )));
        }

        Ok(Self {
            pair_key,
            registration_id: registration_id.to_string(),
            file_name,
        })
    }

    /// Split a stored file name back into pair key and registration id.
    ///
    /// Registration ids never contain `_`, so the last underscore is the
    /// separator. Event and user ids may, so the pair key stays joined.
    pub fn parse(file_name: &str) -> Option<Self> {
        let stem = file_name.strip_suffix(&format!(".{}", QR_EXTENSION))?;
        let (pair_key, registration_id) = stem.rsplit_once('_')?;
        if !pair_key.contains('_') || registration_id.is_empty() {
            return None;
        }

        Some(Self {
            pair_key: pair_key.to_string(),
            registration_id: registration_id.to_string(),
            file_name: file_name.to_string(),
        })
    }

    pub fn pair_key(&self) -> &str {
        &self.pair_key
    }

    pub fn registration_id(&self) -> &str {
        &self.registration_id
    }

    pub fn as_str(&self) -> &str {
        &self.file_name
    }
}

/// A stored image found on disk.
#[derive(Debug, Clone)]
pub struct StoredQr {
    pub file_name: QrFileName,
    pub modified: DateTime<Utc>,
}

#[async_trait]
pub trait QrStore: Send + Sync {
    async fn save(&self, file_name: &QrFileName, png: Vec<u8>) -> Result<(), AppError>;

    /// The newest stored image of exactly the pair `(eventId, userId)`.
    ///
    /// `E1_U1_2_<id>.png` starts with `E1_U1_` but belongs to `(E1, U1_2)`,
    /// so the parsed pair key must match, not just the prefix.
    async fn find(&self, event_id: &str, user_id: &str) -> Result<Option<StoredQr>, AppError>;

    async fn exists(&self, file_name: &QrFileName) -> Result<bool, AppError>;

    /// Every well-formed image in the store.
    async fn list(&self) -> Result<Vec<StoredQr>, AppError>;

    async fn is_ready(&self) -> bool;

    fn public_url(&self, file_name: &str) -> String;
}

pub struct LocalQrStore {
    dir: PathBuf,
    media_url: String,
}

impl LocalQrStore {
    pub async fn new(media_root: impl AsRef<Path>, media_url: &str) -> Result<Self, AppError> {
        let dir = media_root.as_ref().join(QR_DIR);
        fs::create_dir_all(&dir).await.map_err(|e| {
            AppError::ConfigError(anyhow::anyhow!(
                "Failed to create QR storage directory {}: {}",
                dir.display(),
                e
            ))
        })?;

        Ok(Self {
            dir,
            media_url: media_url.to_string(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    async fn scan<F>(&self, mut keep: F) -> Result<Vec<StoredQr>, AppError>
    where
        F: FnMut(&str) -> bool + Send,
    {
        let mut found = Vec::new();
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(found),
            Err(e) => return Err(e.into()),
        };

        while let Some(entry) = entries.next_entry().await? {
            let Some(name) = entry.file_name().to_str().map(str::to_string) else {
                continue;
            };
            if !keep(&name) {
                continue;
            }
            let Some(file_name) = QrFileName::parse(&name) else {
                continue;
            };
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let modified = metadata
                .modified()
                .map(DateTime::<Utc>::from)
                .unwrap_or_else(|_| Utc::now());
            found.push(StoredQr {
                file_name,
                modified,
            });
        }

        Ok(found)
    }
}

async fn write_file(path: &Path, bytes: &[u8]) -> Result<(), AppError> {
    let mut file = fs::File::create(path).await.map_err(|e| {
        AppError::InternalError(anyhow::anyhow!(
            "Failed to create file {}: {}",
            path.display(),
            e
        ))
    })?;
    file.write_all(bytes).await.map_err(|e| {
        AppError::InternalError(anyhow::anyhow!(
            "Failed to write file {}: {}",
            path.display(),
            e
        ))
    })?;
    file.sync_all().await?;
    Ok(())
}

#[async_trait]
impl QrStore for LocalQrStore {
    async fn save(&self, file_name: &QrFileName, png: Vec<u8>) -> Result<(), AppError> {
        let path = self.dir.join(file_name.as_str());
        let partial = self
            .dir
            .join(format!("{}{}", file_name.as_str(), PARTIAL_SUFFIX));
        let start = std::time::Instant::now();

        // The directory may have been removed since startup.
        fs::create_dir_all(&self.dir).await.map_err(|e| {
            AppError::InternalError(anyhow::anyhow!(
                "Failed to create directory {}: {}",
                self.dir.display(),
                e
            ))
        })?;

        if let Err(e) = write_file(&partial, &png).await {
            let _ = fs::remove_file(&partial).await;
            return Err(e);
        }

        // Only complete images ever carry the final name.
        if let Err(e) = fs::rename(&partial, &path).await {
            let _ = fs::remove_file(&partial).await;
            return Err(AppError::InternalError(anyhow::anyhow!(
                "Failed to move {} into place: {}",
                path.display(),
                e
            )));
        }

        tracing::debug!(
            path = %path.display(),
            size_bytes = png.len(),
            duration_ms = start.elapsed().as_secs_f64() * 1000.0,
            "QR image stored"
        );

        Ok(())
    }

    async fn find(&self, event_id: &str, user_id: &str) -> Result<Option<StoredQr>, AppError> {
        check_segment(event_id)?;
        check_segment(user_id)?;

        let key = pair_key(event_id, user_id);
        let prefix = format!("{}_", key);
        let matches = self.scan(|name| name.starts_with(&prefix)).await?;

        // Newest wins when a pair was registered more than once.
        Ok(matches
            .into_iter()
            .filter(|stored| stored.file_name.pair_key() == key)
            .max_by_key(|stored| stored.modified))
    }

    async fn exists(&self, file_name: &QrFileName) -> Result<bool, AppError> {
        Ok(fs::try_exists(self.dir.join(file_name.as_str())).await?)
    }

    async fn list(&self) -> Result<Vec<StoredQr>, AppError> {
        self.scan(|_| true).await
    }

    async fn is_ready(&self) -> bool {
        fs::metadata(&self.dir)
            .await
            .map(|m| m.is_dir())
            .unwrap_or(false)
    }

    fn public_url(&self, file_name: &str) -> String {
        format!("{}{}/{}", self.media_url, QR_DIR, file_name)
    }
}
