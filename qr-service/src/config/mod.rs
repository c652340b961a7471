use serde::Deserialize;
use service_core::config as core_config;
use service_core::error::AppError;
use std::env;

#[derive(Debug, Clone, Deserialize)]
pub struct QrServiceConfig {
    #[serde(flatten)]
    pub common: core_config::Config,
    pub storage: StorageConfig,
    pub qr: QrRenderConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    /// Root of the media tree; images land in `<media_root>/qrcodes`.
    pub media_root: String,
    /// URL prefix the media root is served under. Always ends with `/`.
    pub media_url: String,
    pub serve_media: bool,
}

/// Largest accepted `QR_BOX_SIZE`, in pixels.
pub const MAX_BOX_SIZE: u32 = 50;
/// Largest accepted `QR_BORDER`, in modules.
pub const MAX_BORDER: u32 = 20;

#[derive(Debug, Clone, Deserialize)]
pub struct QrRenderConfig {
    pub error_correction: ErrorCorrection,
    /// Pixels per QR module.
    pub box_size: u32,
    /// Quiet zone width, in modules.
    pub border: u32,
}

impl Default for QrRenderConfig {
    fn default() -> Self {
        Self {
            error_correction: ErrorCorrection::Low,
            box_size: 10,
            border: 4,
        }
    }
}

#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ErrorCorrection {
    Low,
    Medium,
    Quartile,
    High,
}

impl std::str::FromStr for ErrorCorrection {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "low" | "l" => Ok(ErrorCorrection::Low),
            "medium" | "m" => Ok(ErrorCorrection::Medium),
            "quartile" | "q" => Ok(ErrorCorrection::Quartile),
            "high" | "h" => Ok(ErrorCorrection::High),
            _ => Err(format!("Invalid error correction level: {}", s)),
        }
    }
}

impl QrServiceConfig {
    pub fn load() -> Result<Self, AppError> {
        // Load common config (handles .env and APP__ prefix)
        let common_config = core_config::Config::load()?;

        let is_prod = env::var("ENVIRONMENT").unwrap_or_else(|_| "dev".to_string()) == "prod";

        let box_size: u32 = parse_env("QR_BOX_SIZE", Some("10"), is_prod)?;
        if !(1..=MAX_BOX_SIZE).contains(&box_size) {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "QR_BOX_SIZE must be between 1 and {}, got {}",
                MAX_BOX_SIZE,
                box_size
            )));
        }
        let border: u32 = parse_env("QR_BORDER", Some("4"), false)?;
        if border > MAX_BORDER {
            return Err(AppError::ConfigError(anyhow::anyhow!(
                "QR_BORDER must be at most {}, got {}",
                MAX_BORDER,
                border
            )));
        }

        Ok(QrServiceConfig {
            common: common_config,
            storage: StorageConfig {
                media_root: get_env("QR_MEDIA_ROOT", Some("media"), is_prod)?,
                media_url: normalize_media_url(&get_env("QR_MEDIA_URL", Some("/media/"), is_prod)?),
                serve_media: parse_env("QR_SERVE_MEDIA", Some("true"), false)?,
            },
            qr: QrRenderConfig {
                error_correction: parse_env("QR_ERROR_CORRECTION", Some("low"), false)?,
                box_size,
                border,
            },
        })
    }
}

/// Media URLs are joined by plain concatenation, so the prefix must end in `/`.
pub fn normalize_media_url(raw: &str) -> String {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return "/".to_string();
    }
    if trimmed.ends_with('/') {
        trimmed.to_string()
    } else {
        format!("{}/", trimmed)
    }
}

fn parse_env<T>(key: &str, default: Option<&str>, is_prod: bool) -> Result<T, AppError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    let raw = get_env(key, default, is_prod)?;
    raw.trim().parse().map_err(|e: T::Err| {
        AppError::ConfigError(anyhow::anyhow!("Invalid value for {}: {}", key, e))
    })
}

fn get_env(key: &str, default: Option<&str>, is_prod: bool) -> Result<String, AppError> {
    match env::var(key) {
        Ok(val) => Ok(val),
        Err(_) => {
            if is_prod {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required in production but not set",
                    key
                ))))
            } else if let Some(def) = default {
                Ok(def.to_string())
            } else {
                Err(AppError::ConfigError(anyhow::anyhow!(format!(
                    "{} is required but not set",
                    key
                ))))
            }
        }
    }
}
