#![allow(dead_code)]

use qr_service::config::{QrRenderConfig, QrServiceConfig, StorageConfig};
use qr_service::startup::Application;
use qrcode::{Color, EcLevel, QrCode};
use service_core::config::Config as CoreConfig;
use std::path::PathBuf;
use uuid::Uuid;

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub media_root: PathBuf,
    pub client: reqwest::Client,
}

pub fn test_config(media_root: &PathBuf) -> QrServiceConfig {
    QrServiceConfig {
        common: CoreConfig {
            port: 0, // Random port for testing
            host: std::net::IpAddr::from([127, 0, 0, 1]),
            log_level: "info".to_string(),
            otlp_endpoint: None,
        },
        storage: StorageConfig {
            media_root: media_root.to_string_lossy().into_owned(),
            media_url: "/media/".to_string(),
            serve_media: true,
        },
        qr: QrRenderConfig::default(),
    }
}

pub fn new_media_root() -> PathBuf {
    PathBuf::from(format!("target/test-media-{}", Uuid::new_v4()))
}

impl TestApp {
    pub async fn spawn() -> Self {
        Self::spawn_with_root(new_media_root()).await
    }

    /// Start against an existing media root, e.g. one seeded with images.
    pub async fn spawn_with_root(media_root: PathBuf) -> Self {
        let config = test_config(&media_root);

        let app = Application::build(config)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        // Wait for HTTP server to be ready by polling health endpoint
        let client = reqwest::Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(50)).await;
        }

        TestApp {
            address,
            port,
            media_root,
            client,
        }
    }

    pub async fn generate(&self, body: serde_json::Value) -> reqwest::Response {
        self.client
            .post(format!("{}/api/generate/", self.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn retrieve(&self, event_id: &str, user_id: &str) -> reqwest::Response {
        self.client
            .get(format!("{}/api/qr/{}/{}/", self.address, event_id, user_id))
            .send()
            .await
            .expect("Failed to execute request")
    }

    pub async fn validate(&self, body: serde_json::Value) -> reqwest::Response {
        self.client
            .post(format!("{}/api/validate/", self.address))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Generate and return the `qrCodeUrl`.
    pub async fn generate_url(&self, event_id: &str, user_id: &str, user_name: &str) -> String {
        let response = self
            .generate(serde_json::json!({
                "eventId": event_id,
                "userId": user_id,
                "userName": user_name,
            }))
            .await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        let body: serde_json::Value = response.json().await.expect("Failed to parse JSON");
        body["qrCodeUrl"]
            .as_str()
            .expect("qrCodeUrl missing")
            .to_string()
    }

    /// Path on disk for a `/media/...` URL.
    pub fn path_for_url(&self, url: &str) -> PathBuf {
        let relative = url
            .strip_prefix("/media/")
            .expect("URL outside the media prefix");
        self.media_root.join(relative)
    }

    pub fn qr_dir(&self) -> PathBuf {
        self.media_root.join("qrcodes")
    }

    /// Cleanup test storage.
    pub async fn cleanup(&self) {
        let _ = tokio::fs::remove_dir_all(&self.media_root).await;
    }
}

/// Registration id embedded in a `.../<event>_<user>_<registrationId>.png` URL.
pub fn registration_id_from_url(url: &str) -> String {
    let file_name = url.rsplit('/').next().expect("empty URL");
    let stem = file_name.strip_suffix(".png").expect("not a PNG URL");
    stem.rsplit('_').next().expect("no registration id").to_string()
}

/// Read the module grid back out of a rendered image by sampling the centre
/// of every box.
pub fn sample_modules(png: &[u8], box_size: u32, border: u32) -> Vec<Color> {
    let img = image::load_from_memory(png)
        .expect("Stored file is not a readable image")
        .to_luma8();
    let modules = img.width() / box_size - 2 * border;

    let mut colors = Vec::with_capacity((modules * modules) as usize);
    for y in 0..modules {
        for x in 0..modules {
            let px = (x + border) * box_size + box_size / 2;
            let py = (y + border) * box_size + box_size / 2;
            let color = if img.get_pixel(px, py).0[0] < 128 {
                Color::Dark
            } else {
                Color::Light
            };
            colors.push(color);
        }
    }
    colors
}

/// The symbol a payload must render to at the default (low) error correction.
pub fn expected_modules(payload: &str) -> Vec<Color> {
    QrCode::with_error_correction_level(payload, EcLevel::L)
        .expect("payload fits in a QR code")
        .to_colors()
}
