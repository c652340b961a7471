//! QR image rendering.
//!
//! Paints the symbol by hand rather than through `qrcode`'s renderer so the
//! quiet zone width follows configuration instead of the fixed four modules.

use crate::config::{ErrorCorrection, QrRenderConfig};
use image::{DynamicImage, GrayImage, Luma};
use qrcode::{Color, EcLevel, QrCode};
use service_core::error::AppError;
use std::io::Cursor;

/// Upper bound on the image side, whatever the render settings.
pub const MAX_IMAGE_SIDE: u32 = 16_384;

const DARK: Luma<u8> = Luma([0]);
const LIGHT: Luma<u8> = Luma([255]);

impl From<ErrorCorrection> for EcLevel {
    fn from(level: ErrorCorrection) -> Self {
        match level {
            ErrorCorrection::Low => EcLevel::L,
            ErrorCorrection::Medium => EcLevel::M,
            ErrorCorrection::Quartile => EcLevel::Q,
            ErrorCorrection::High => EcLevel::H,
        }
    }
}

#[derive(Debug, Clone)]
pub struct QrGenerator {
    config: QrRenderConfig,
}

impl QrGenerator {
    pub fn new(config: QrRenderConfig) -> Self {
        Self { config }
    }

    /// Encode `data` at the configured error correction level, picking the
    /// smallest version that fits.
    pub fn encode(&self, data: &str) -> Result<QrCode, AppError> {
        QrCode::with_error_correction_level(data, self.config.error_correction.into()).map_err(
            |e| AppError::InternalError(anyhow::anyhow!("Failed to encode QR code: {}", e)),
        )
    }

    /// Render `data` as a black-on-white grayscale image.
    pub fn render(&self, data: &str) -> Result<GrayImage, AppError> {
        let code = self.encode(data)?;
        self.paint(&code)
    }

    /// Render `data` and encode the image as PNG.
    pub fn render_png(&self, data: &str) -> Result<Vec<u8>, AppError> {
        let image = self.render(data)?;

        let mut buffer = Cursor::new(Vec::new());
        DynamicImage::ImageLuma8(image)
            .write_to(&mut buffer, image::ImageOutputFormat::Png)
            .map_err(|e| {
                AppError::InternalError(anyhow::anyhow!("Failed to encode PNG: {}", e))
            })?;

        Ok(buffer.into_inner())
    }

    fn paint(&self, code: &QrCode) -> Result<GrayImage, AppError> {
        let modules = code.width() as u32;
        let box_size = self.config.box_size;
        let border = self.config.border;
        let side = border
            .checked_mul(2)
            .and_then(|quiet| quiet.checked_add(modules))
            .and_then(|cells| cells.checked_mul(box_size))
            .filter(|side| *side <= MAX_IMAGE_SIDE)
            .ok_or_else(|| {
                AppError::InternalError(anyhow::anyhow!(
                    "QR image too large: {} modules, border {}, box size {}",
                    modules,
                    border,
                    box_size
                ))
            })?;

        let mut img = GrayImage::from_pixel(side, side, LIGHT);

        for (i, color) in code.to_colors().iter().enumerate() {
            if *color != Color::Dark {
                continue;
            }
            let x = (i as u32 % modules + border) * box_size;
            let y = (i as u32 / modules + border) * box_size;
            for dy in 0..box_size {
                for dx in 0..box_size {
                    img.put_pixel(x + dx, y + dy, DARK);
                }
            }
        }

        Ok(img)
    }
}
