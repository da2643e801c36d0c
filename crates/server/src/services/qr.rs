use std::io::Cursor;

use image::{DynamicImage, ImageFormat, Luma};
use qrcode::{EcLevel, QrCode};

use crate::error::{AppError, Result};

use super::storage::StorageService;

/// Rendering knobs for issued QR codes.
#[derive(Clone, Copy)]
pub struct QrOptions {
    /// Pixels per QR module.
    pub module_size: u32,
    /// Render the 4-module quiet zone around the symbol.
    pub quiet_zone: bool,
    pub ec_level: EcLevel,
}

impl Default for QrOptions {
    fn default() -> Self {
        Self {
            module_size: 8,
            quiet_zone: true,
            ec_level: EcLevel::M,
        }
    }
}

/// The canonical profile URL encoded into an employee's badge. Depends only
/// on the employee id, never the name.
pub fn profile_url(origin: &str, employee_id: &str) -> String {
    format!("{}/qr-profile/{employee_id}", origin.trim_end_matches('/'))
}

/// Encode `data` as a QR symbol and render it to an in-memory PNG.
pub fn render_png(data: &str, opts: QrOptions) -> Result<Vec<u8>> {
    let code = QrCode::with_error_correction_level(data, opts.ec_level)
        .map_err(|e| AppError::Internal(format!("Failed to encode QR code: {e}")))?;

    let img = code
        .render::<Luma<u8>>()
        .module_dimensions(opts.module_size, opts.module_size)
        .quiet_zone(opts.quiet_zone)
        .build();

    let mut buf = Vec::new();
    DynamicImage::ImageLuma8(img)
        .write_to(&mut Cursor::new(&mut buf), ImageFormat::Png)
        .map_err(|e| AppError::Internal(format!("Failed to render QR PNG: {e}")))?;

    Ok(buf)
}

#[derive(Clone)]
pub struct QrService {
    storage: StorageService,
    public_origin: String,
    options: QrOptions,
}

impl QrService {
    pub fn new(storage: StorageService, public_origin: String) -> Self {
        Self {
            storage,
            public_origin,
            options: QrOptions::default(),
        }
    }

    /// Issue the badge PNG for an employee and return its public URL. Callers
    /// decide whether a failure is fatal; creating an employee tolerates it.
    pub async fn issue_for_employee(&self, employee_id: &str, employee_name: &str) -> Result<String> {
        let url = profile_url(&self.public_origin, employee_id);
        let png = render_png(&url, self.options)?;
        let object = StorageService::employee_qr_path(employee_id, employee_name);
        self.storage.write(&object, &png).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn profile_url_ignores_everything_but_the_id() {
        assert_eq!(
            profile_url("https://mesterbyg.dk", "abc-123"),
            "https://mesterbyg.dk/qr-profile/abc-123"
        );
        // Trailing slash on the origin must not double up
        assert_eq!(
            profile_url("https://mesterbyg.dk/", "abc-123"),
            "https://mesterbyg.dk/qr-profile/abc-123"
        );
    }

    #[test]
    fn render_png_produces_a_png() {
        let bytes = render_png("https://mesterbyg.dk/qr-profile/x", QrOptions::default()).unwrap();
        assert_eq!(&bytes[..8], b"\x89PNG\r\n\x1a\n");
    }

    #[tokio::test]
    async fn issue_writes_the_badge_into_employee_storage() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageService::new(dir.path());
        let qr = QrService::new(storage, "https://mesterbyg.dk".to_string());

        let url = qr.issue_for_employee("e1", "Jens Hansen").await.unwrap();
        assert_eq!(url, "/storage/employees/e1/Jens Hansen-QRCODE.png");
        assert!(dir.path().join("employees/e1/Jens Hansen-QRCODE.png").exists());
    }
}
