//! Runtime storage for post images.

use std::path::{Component, Path, PathBuf};

use bytes::Bytes;
use slug::slugify;
use thiserror::Error;
use tokio::fs;
use uuid::Uuid;

/// Errors that can occur while interacting with the upload storage backend.
#[derive(Debug, Error)]
pub enum UploadStorageError {
    #[error("invalid stored path")]
    InvalidPath,
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("uploaded file is empty")]
    EmptyPayload,
    #[error("uploaded file is not a recognised image")]
    NotAnImage,
}

/// Filesystem-backed image storage.
#[derive(Debug)]
pub struct UploadStorage {
    root: PathBuf,
}

impl UploadStorage {
    /// Initialise storage rooted at the provided directory, creating it if
    /// necessary.
    pub fn new(root: PathBuf) -> Result<Self, std::io::Error> {
        std::fs::create_dir_all(&root)?;
        Ok(Self { root })
    }

    /// Validate and store an uploaded post image, returning the stored
    /// path to persist on the post record. The payload must carry a
    /// recognisable image header.
    pub async fn store_image(
        &self,
        original_name: &str,
        data: Bytes,
    ) -> Result<String, UploadStorageError> {
        if data.is_empty() {
            return Err(UploadStorageError::EmptyPayload);
        }
        if imagesize::blob_size(&data).is_err() {
            return Err(UploadStorageError::NotAnImage);
        }

        let stored_path = self.build_stored_path(original_name);
        let absolute = self.resolve(&stored_path)?;

        if let Some(parent) = absolute.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&absolute, &data).await?;

        Ok(stored_path)
    }

    /// Attempt to read the stored payload into memory.
    pub async fn read(&self, stored_path: &str) -> Result<Bytes, UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        let data = fs::read(absolute).await?;
        Ok(Bytes::from(data))
    }

    /// Remove the stored payload. Missing files are treated as success.
    pub async fn delete(&self, stored_path: &str) -> Result<(), UploadStorageError> {
        let absolute = self.resolve(stored_path)?;
        match fs::remove_file(&absolute).await {
            Ok(_) => Ok(()),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(err) => Err(UploadStorageError::Io(err)),
        }
    }

    /// Resolve the absolute filesystem path for a stored upload.
    fn resolve(&self, stored_path: &str) -> Result<PathBuf, UploadStorageError> {
        let relative = Path::new(stored_path);
        if relative.is_absolute()
            || relative
                .components()
                .any(|component| matches!(component, Component::ParentDir | Component::Prefix(_)))
        {
            return Err(UploadStorageError::InvalidPath);
        }

        Ok(self.root.join(relative))
    }

    fn build_stored_path(&self, original_name: &str) -> String {
        let (year, month, day) = time::OffsetDateTime::now_utc().to_calendar_date();
        let directory = format!("{year}/{:02}/{:02}", month as u8, day);
        let identifier = Uuid::new_v4();
        let filename = sanitize_filename(original_name);
        format!("{directory}/{identifier}-{filename}")
    }
}

fn sanitize_filename(original: &str) -> String {
    let path = Path::new(original);
    let stem = path
        .file_stem()
        .and_then(|value| value.to_str())
        .unwrap_or("upload");
    let mut base = slugify(stem);
    if base.is_empty() {
        base = "upload".to_string();
    }

    let extension = path
        .extension()
        .and_then(|value| value.to_str())
        .map(|value| value.trim_matches('.').to_ascii_lowercase())
        .filter(|value| !value.is_empty());

    match extension {
        Some(ext) => format!("{base}.{ext}"),
        None => base,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // Smallest valid PNG header: signature plus a 1x1 IHDR chunk.
    const TINY_PNG: [u8; 33] = [
        0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 0x00, 0x00, 0x00, 0x0D, 0x49, 0x48,
        0x44, 0x52, 0x00, 0x00, 0x00, 0x01, 0x00, 0x00, 0x00, 0x01, 0x08, 0x06, 0x00, 0x00,
        0x00, 0x1F, 0x15, 0xC4, 0x89,
    ];

    fn storage() -> (tempfile::TempDir, UploadStorage) {
        let dir = tempfile::tempdir().expect("temp dir");
        let storage = UploadStorage::new(dir.path().to_path_buf()).expect("storage");
        (dir, storage)
    }

    #[tokio::test]
    async fn stores_and_reads_back_an_image() {
        let (_dir, storage) = storage();

        let stored_path = storage
            .store_image("My Photo.PNG", Bytes::from_static(&TINY_PNG))
            .await
            .expect("store image");

        assert!(stored_path.ends_with("-my-photo.png"), "{stored_path}");

        let read_back = storage.read(&stored_path).await.expect("read back");
        assert_eq!(read_back, Bytes::from_static(&TINY_PNG));
    }

    #[tokio::test]
    async fn rejects_payloads_without_an_image_header() {
        let (_dir, storage) = storage();

        let err = storage
            .store_image("note.txt", Bytes::from_static(b"not an image"))
            .await
            .expect_err("not an image");
        assert!(matches!(err, UploadStorageError::NotAnImage));
    }

    #[tokio::test]
    async fn rejects_empty_payloads() {
        let (_dir, storage) = storage();

        let err = storage
            .store_image("empty.png", Bytes::new())
            .await
            .expect_err("empty payload");
        assert!(matches!(err, UploadStorageError::EmptyPayload));
    }

    #[tokio::test]
    async fn refuses_path_traversal_on_read() {
        let (_dir, storage) = storage();

        let err = storage.read("../outside.png").await.expect_err("traversal");
        assert!(matches!(err, UploadStorageError::InvalidPath));

        let err = storage.read("/etc/passwd").await.expect_err("absolute");
        assert!(matches!(err, UploadStorageError::InvalidPath));
    }

    #[tokio::test]
    async fn delete_tolerates_missing_files() {
        let (_dir, storage) = storage();
        storage.delete("2024/01/01/gone.png").await.expect("delete");
    }

    #[test]
    fn sanitizes_awkward_filenames() {
        assert_eq!(sanitize_filename("Cat Pic.JPG"), "cat-pic.jpg");
        assert_eq!(sanitize_filename("..."), "upload");
        assert_eq!(sanitize_filename("noext"), "noext");
    }
}
