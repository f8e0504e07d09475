//! Image uploads stored on the local filesystem and served under `/uploads`.

use std::{
    collections::HashMap,
    path::{Component, Path, PathBuf},
};

use axum::extract::{Multipart, multipart::MultipartError};
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const PUBLIC_PREFIX: &str = "/uploads";

const ALLOWED_TYPES: [&str; 5] = ["jpeg", "jpg", "png", "gif", "webp"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaFolder {
    Collections,
    Products,
    Blogs,
}

impl MediaFolder {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaFolder::Collections => "collections",
            MediaFolder::Products => "products",
            MediaFolder::Blogs => "blogs",
        }
    }
}

/// A file written by [`MediaStore::save_image`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub path: PathBuf,
    /// Public URL persisted on the owning record.
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct MediaStore {
    root: PathBuf,
    max_bytes: usize,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>, max_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub async fn save_image(
        &self,
        folder: MediaFolder,
        field: &str,
        file_name: &str,
        content_type: Option<&str>,
        bytes: &[u8],
    ) -> AppResult<StoredFile> {
        let ext = validate_image(file_name, content_type)?;
        if bytes.is_empty() {
            return Err(AppError::BadRequest(format!("Uploaded file '{field}' is empty.")));
        }
        if bytes.len() > self.max_bytes {
            return Err(AppError::BadRequest(format!(
                "Uploaded file '{field}' exceeds the {} byte limit.",
                self.max_bytes
            )));
        }

        let dir = self.root.join(folder.as_str());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("create upload dir: {e}")))?;

        let stored_name = format!("{field}-{}.{ext}", Uuid::new_v4().simple());
        let path = dir.join(&stored_name);
        tokio::fs::write(&path, bytes)
            .await
            .map_err(|e| AppError::Internal(anyhow::anyhow!("write upload: {e}")))?;

        tracing::debug!(path = %path.display(), size = bytes.len(), "image stored");
        Ok(StoredFile {
            path,
            url: format!("{PUBLIC_PREFIX}/{}/{stored_name}", folder.as_str()),
        })
    }

    /// Maps a stored public URL back to a path under the root.
    ///
    /// Returns `None` for URLs outside `/uploads` or that try to leave the root.
    pub fn path_for_url(&self, url: &str) -> Option<PathBuf> {
        let relative = url.strip_prefix(PUBLIC_PREFIX)?.strip_prefix('/')?;
        let relative = Path::new(relative);
        if relative.as_os_str().is_empty()
            || !relative
                .components()
                .all(|c| matches!(c, Component::Normal(_)))
        {
            return None;
        }
        Some(self.root.join(relative))
    }

    /// Best-effort delete of the file behind a stored URL.
    pub async fn remove(&self, url: &str) {
        match self.path_for_url(url) {
            Some(path) => remove_path(&path).await,
            None => tracing::warn!(url, "refusing to remove file outside upload root"),
        }
    }

    /// Removes files written for a request that did not complete.
    pub async fn discard<'a>(&self, files: impl IntoIterator<Item = &'a StoredFile>) {
        for file in files {
            remove_path(&file.path).await;
        }
    }
}

async fn remove_path(path: &Path) {
    match tokio::fs::remove_file(path).await {
        Ok(()) => tracing::debug!(path = %path.display(), "image removed"),
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
        Err(err) => tracing::warn!(path = %path.display(), error = %err, "failed to remove image"),
    }
}

/// Checks extension and content type against the accepted image types and
/// returns the lowercased extension.
pub fn validate_image(file_name: &str, content_type: Option<&str>) -> AppResult<String> {
    let rejected = || {
        AppError::BadRequest(format!(
            "File upload only supports the following filetypes - {}",
            ALLOWED_TYPES.join("|")
        ))
    };

    let ext = Path::new(file_name)
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .filter(|e| ALLOWED_TYPES.contains(&e.as_str()))
        .ok_or_else(rejected)?;

    let mime = content_type.map(str::to_ascii_lowercase).unwrap_or_default();
    let subtype = mime.strip_prefix("image/").unwrap_or_default();
    if !ALLOWED_TYPES.contains(&subtype) {
        return Err(rejected());
    }

    Ok(ext)
}

/// Text fields and saved files from a multipart form.
#[derive(Debug, Default)]
pub struct UploadForm {
    fields: HashMap<String, String>,
    files: HashMap<String, StoredFile>,
}

impl UploadForm {
    /// Reads every part, saving those named in `file_fields` as images.
    ///
    /// Files already written are removed when a later part fails.
    pub async fn read(
        media: &MediaStore,
        folder: MediaFolder,
        mut multipart: Multipart,
        file_fields: &[&str],
    ) -> AppResult<Self> {
        let mut form = UploadForm::default();
        if let Err(err) = form.collect(media, folder, &mut multipart, file_fields).await {
            media.discard(form.files.values()).await;
            return Err(err);
        }
        Ok(form)
    }

    async fn collect(
        &mut self,
        media: &MediaStore,
        folder: MediaFolder,
        multipart: &mut Multipart,
        file_fields: &[&str],
    ) -> AppResult<()> {
        while let Some(field) = multipart.next_field().await.map_err(bad_multipart)? {
            let Some(name) = field.name().map(str::to_string) else {
                continue;
            };
            let file_name = field.file_name().map(str::to_string);
            let is_file_field = file_fields.contains(&name.as_str());

            if !is_file_field {
                if file_name.is_some() {
                    return Err(AppError::BadRequest(format!(
                        "Unexpected file field '{name}'."
                    )));
                }
                let value = field.text().await.map_err(bad_multipart)?;
                self.fields.insert(name, value);
                continue;
            }

            let content_type = field.content_type().map(str::to_string);
            let bytes = field.bytes().await.map_err(bad_multipart)?;
            // Browsers send an empty part when no file was picked.
            if bytes.is_empty() && file_name.as_deref().unwrap_or_default().is_empty() {
                continue;
            }
            if self.files.contains_key(&name) {
                return Err(AppError::BadRequest(format!(
                    "Only one '{name}' file is allowed."
                )));
            }
            let stored = media
                .save_image(
                    folder,
                    &name,
                    file_name.as_deref().unwrap_or_default(),
                    content_type.as_deref(),
                    &bytes,
                )
                .await?;
            self.files.insert(name, stored);
        }
        Ok(())
    }

    /// Trimmed, non-empty text value.
    pub fn text(&self, name: &str) -> Option<String> {
        self.fields
            .get(name)
            .map(|v| v.trim())
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    }

    pub fn take_file(&mut self, name: &str) -> Option<StoredFile> {
        self.files.remove(name)
    }
}

fn bad_multipart(err: MultipartError) -> AppError {
    AppError::BadRequest(err.body_text())
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        body::Body,
        extract::FromRequest,
        http::{Request, header},
    };

    fn temp_store() -> MediaStore {
        let root = std::env::temp_dir().join(format!("media-test-{}", Uuid::new_v4()));
        MediaStore::new(root, 1024)
    }

    #[test]
    fn accepts_known_image_types() {
        assert_eq!(
            validate_image("ring.JPG", Some("image/jpeg")).expect("valid"),
            "jpg"
        );
        assert_eq!(
            validate_image("band.webp", Some("image/webp")).expect("valid"),
            "webp"
        );
    }

    #[test]
    fn rejects_mismatched_or_unknown_types() {
        assert!(validate_image("notes.txt", Some("text/plain")).is_err());
        assert!(validate_image("ring.png", Some("application/pdf")).is_err());
        assert!(validate_image("ring.png", None).is_err());
        assert!(validate_image("ring", Some("image/png")).is_err());
    }

    #[test]
    fn url_mapping_stays_inside_root() {
        let store = MediaStore::new("/srv/uploads", 10);
        assert_eq!(
            store.path_for_url("/uploads/products/a.png"),
            Some(PathBuf::from("/srv/uploads/products/a.png"))
        );
        assert_eq!(store.path_for_url("/uploads/../etc/passwd"), None);
        assert_eq!(store.path_for_url("/uploads//etc/passwd"), None);
        assert_eq!(store.path_for_url("/static/a.png"), None);
        assert_eq!(store.path_for_url("/uploads/"), None);
    }

    #[tokio::test]
    async fn save_then_remove_round_trip() {
        let store = temp_store();
        let stored = store
            .save_image(
                MediaFolder::Collections,
                "collectionImage",
                "rings.png",
                Some("image/png"),
                b"\x89PNG fake",
            )
            .await
            .expect("stored");

        assert!(stored.url.starts_with("/uploads/collections/collectionImage-"));
        assert!(stored.url.ends_with(".png"));
        assert!(stored.path.exists());
        assert_eq!(store.path_for_url(&stored.url), Some(stored.path.clone()));

        store.remove(&stored.url).await;
        assert!(!stored.path.exists());
    }

    #[tokio::test]
    async fn oversized_upload_is_rejected() {
        let store = temp_store();
        let big = vec![0u8; 2048];
        let err = store
            .save_image(MediaFolder::Products, "productImage", "a.png", Some("image/png"), &big)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    async fn multipart(body: &str) -> Multipart {
        let request = Request::builder()
            .method("POST")
            .header(header::CONTENT_TYPE, "multipart/form-data; boundary=XBOUNDARY")
            .body(Body::from(body.replace('\n', "\r\n")))
            .expect("request");
        Multipart::from_request(request, &()).await.expect("multipart")
    }

    #[tokio::test]
    async fn form_collects_text_and_files() {
        let store = temp_store();
        let body = "--XBOUNDARY\n\
Content-Disposition: form-data; name=\"name\"\n\
\n\
 Rings \n\
--XBOUNDARY\n\
Content-Disposition: form-data; name=\"isTrending\"\n\
\n\
true\n\
--XBOUNDARY\n\
Content-Disposition: form-data; name=\"collectionImage\"; filename=\"rings.png\"\n\
Content-Type: image/png\n\
\n\
PNGDATA\n\
--XBOUNDARY--\n";

        let mut form = UploadForm::read(
            &store,
            MediaFolder::Collections,
            multipart(body).await,
            &["collectionImage"],
        )
        .await
        .expect("form");

        assert_eq!(form.text("name").as_deref(), Some("Rings"));
        assert_eq!(form.text("isTrending").as_deref(), Some("true"));
        let file = form.take_file("collectionImage").expect("file");
        assert!(file.path.exists());
        store.discard([&file]).await;
        assert!(!file.path.exists());
    }

    #[tokio::test]
    async fn bad_file_type_removes_earlier_uploads() {
        let store = temp_store();
        let body = "--XBOUNDARY\n\
Content-Disposition: form-data; name=\"blogImage\"; filename=\"post.png\"\n\
Content-Type: image/png\n\
\n\
PNGDATA\n\
--XBOUNDARY\n\
Content-Disposition: form-data; name=\"authorImage\"; filename=\"author.exe\"\n\
Content-Type: application/octet-stream\n\
\n\
MZ\n\
--XBOUNDARY--\n";

        let err = UploadForm::read(
            &store,
            MediaFolder::Blogs,
            multipart(body).await,
            &["blogImage", "authorImage"],
        )
        .await
        .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));

        let dir = store.root().join("blogs");
        let leftover = std::fs::read_dir(&dir)
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(leftover, 0);
    }
}
