use std::path::PathBuf;

use tokio::fs;

use crate::error::{AppError, Result};

/// Filesystem-backed object storage. Objects live under `base_path` and are
/// served read-only at `/storage/{object_path}`.
#[derive(Clone)]
pub struct StorageService {
    base_path: PathBuf,
}

impl StorageService {
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    pub async fn init(&self) -> Result<()> {
        fs::create_dir_all(&self.base_path)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to create storage directory: {e}")))?;
        Ok(())
    }

    fn object_path(&self, object: &str) -> PathBuf {
        self.base_path.join(object)
    }

    pub fn public_url(object: &str) -> String {
        format!("/storage/{object}")
    }

    pub fn employee_image_path(employee_id: &str) -> String {
        format!("employees/{employee_id}/profile.jpg")
    }

    pub fn employee_document_path(employee_id: &str, file_name: &str) -> String {
        format!(
            "employees/{employee_id}/documents/{}",
            sanitize_file_name(file_name)
        )
    }

    pub fn employee_qr_path(employee_id: &str, employee_name: &str) -> String {
        format!(
            "employees/{employee_id}/{}-QRCODE.png",
            sanitize_file_name(employee_name)
        )
    }

    pub fn user_image_path(user_id: &str) -> String {
        format!("users/{user_id}/profile.jpg")
    }

    /// Write an object and return its public URL.
    pub async fn write(&self, object: &str, data: &[u8]) -> Result<String> {
        let path = self.object_path(object);

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to create directories: {e}")))?;
        }

        fs::write(&path, data)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to write object: {e}")))?;

        Ok(Self::public_url(object))
    }

    pub async fn delete(&self, object: &str) -> Result<()> {
        let path = self.object_path(object);

        if path.exists() {
            fs::remove_file(&path)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to delete object: {e}")))?;
        }

        Ok(())
    }

    /// Remove a whole object prefix (e.g. everything stored for one employee).
    pub async fn delete_prefix(&self, prefix: &str) -> Result<()> {
        let path = self.object_path(prefix);

        if path.exists() {
            fs::remove_dir_all(&path)
                .await
                .map_err(|e| AppError::Internal(format!("Failed to delete directory: {e}")))?;
        }

        Ok(())
    }
}

/// Flatten anything that could escape the object's directory. Multipart file
/// names come straight from the client.
fn sanitize_file_name(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| match c {
            '/' | '\\' | ':' => '_',
            c => c,
        })
        .collect();

    let cleaned = cleaned.replace("..", "_");
    if cleaned.is_empty() {
        "unnamed".to_string()
    } else {
        cleaned
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_paths_follow_the_storage_layout() {
        assert_eq!(
            StorageService::employee_image_path("abc"),
            "employees/abc/profile.jpg"
        );
        assert_eq!(
            StorageService::employee_document_path("abc", "contract.pdf"),
            "employees/abc/documents/contract.pdf"
        );
        assert_eq!(
            StorageService::employee_qr_path("abc", "Jens Hansen"),
            "employees/abc/Jens Hansen-QRCODE.png"
        );
        assert_eq!(StorageService::user_image_path("u1"), "users/u1/profile.jpg");
    }

    #[test]
    fn file_names_cannot_escape_their_directory() {
        assert_eq!(
            StorageService::employee_document_path("abc", "../../etc/passwd"),
            "employees/abc/documents/____etc_passwd"
        );
        assert_eq!(
            StorageService::employee_document_path("abc", ""),
            "employees/abc/documents/unnamed"
        );
    }

    #[tokio::test]
    async fn write_and_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let storage = StorageService::new(dir.path());

        let url = storage.write("employees/x/profile.jpg", b"jpeg").await.unwrap();
        assert_eq!(url, "/storage/employees/x/profile.jpg");
        assert!(dir.path().join("employees/x/profile.jpg").exists());

        storage.delete("employees/x/profile.jpg").await.unwrap();
        assert!(!dir.path().join("employees/x/profile.jpg").exists());

        storage.write("employees/x/a.txt", b"a").await.unwrap();
        storage.delete_prefix("employees/x").await.unwrap();
        assert!(!dir.path().join("employees/x").exists());
    }
}
