use std::io::Cursor;

use anyhow::{Context, Result};
use image::{GrayImage, Luma};
use qrcode::{Color, EcLevel, QrCode};
use uuid::Uuid;

// Module pixel scale and quiet-zone width of the generated PNG.
const SCALE: u32 = 10;
const BORDER: u32 = 4;

pub fn inspection_url(base_url: &str, inspection_id: Uuid) -> String {
    format!(
        "{}/inspection/view/{inspection_id}",
        base_url.trim_end_matches('/')
    )
}

pub fn machine_url(base_url: &str, machine_id: Uuid) -> String {
    format!(
        "{}/machine/info/{machine_id}",
        base_url.trim_end_matches('/')
    )
}

/// Renders the QR code for a public URL as PNG bytes. Derived on demand, not
/// persisted.
pub fn png(url: &str) -> Result<Vec<u8>> {
    let code = QrCode::with_error_correction_level(url.as_bytes(), EcLevel::L)
        .context("failed to build QR code")?;
    let modules = code.to_colors();
    let width = code.width();

    let dim = (width as u32 + 2 * BORDER) * SCALE;
    let img = GrayImage::from_fn(dim, dim, |x, y| {
        let mx = (x / SCALE) as i64 - BORDER as i64;
        let my = (y / SCALE) as i64 - BORDER as i64;
        let dark = mx >= 0
            && my >= 0
            && (mx as usize) < width
            && (my as usize) < width
            && modules[my as usize * width + mx as usize] == Color::Dark;
        if dark {
            Luma([0u8])
        } else {
            Luma([255u8])
        }
    });

    let mut out = Cursor::new(Vec::new());
    image::DynamicImage::ImageLuma8(img)
        .write_to(&mut out, image::ImageFormat::Png)
        .context("failed to encode QR PNG")?;
    Ok(out.into_inner())
}
