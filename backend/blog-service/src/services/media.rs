/// Uploaded post images on local disk
///
/// Files live under `<MEDIA_ROOT>/posts/` and are referenced from posts by
/// their path relative to the media root (`posts/<file>`).
use crate::error::{AppError, Result};
use crate::forms::{FormErrors, FormResult};
use actix_multipart::form::tempfile::TempFile;
use mime::Mime;
use std::path::{Component, Path, PathBuf};
use tokio::fs::OpenOptions;
use tracing::info;

const UPLOAD_DIR: &str = "posts";
/// Longest stored file name, suffix included
const MAX_FILE_NAME_LEN: usize = 100;
const SUFFIX_LEN: usize = 7;
const NAME_ATTEMPTS: usize = 8;
const IMAGE_EXTENSIONS: &[&str] = &["gif", "png", "jpg", "jpeg", "webp", "bmp"];

#[derive(Clone, Debug)]
pub struct MediaStore {
    root: PathBuf,
    max_upload_bytes: usize,
}

impl MediaStore {
    pub fn new(root: impl Into<PathBuf>, max_upload_bytes: usize) -> Self {
        Self {
            root: root.into(),
            max_upload_bytes,
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Check an uploaded file before it is stored.
    ///
    /// Returns `Ok(None)` when no file was chosen.
    pub fn check_upload<'a>(&self, upload: Option<&'a TempFile>) -> FormResult<Option<&'a TempFile>> {
        let chosen = |f: &&TempFile| f.size > 0 || f.file_name.as_deref().is_some_and(|n| !n.is_empty());
        let Some(file) = upload.filter(chosen) else {
            return Ok(None);
        };

        let mut errors = FormErrors::new();
        if file.size == 0 {
            errors.add("image", "The submitted file is empty.");
        } else if file.size > self.max_upload_bytes {
            errors.add(
                "image",
                format!("Image is larger than {} bytes.", self.max_upload_bytes),
            );
        } else if !is_image(file.content_type.as_ref(), file.file_name.as_deref()) {
            errors.add(
                "image",
                "Upload a valid image. The file you uploaded was either not an image or a corrupted image.",
            );
        }

        if errors.is_empty() {
            Ok(Some(file))
        } else {
            Err(errors)
        }
    }

    /// Copy an upload into the media root, returning its stored path
    pub async fn save_post_image(&self, file: &TempFile) -> Result<String> {
        let stored = self
            .store_file(file.file.path(), file.file_name.as_deref().unwrap_or_default())
            .await?;
        info!(path = %stored, bytes = file.size, "image stored");
        Ok(stored)
    }

    /// Copy `source` under the upload dir without ever replacing a stored file.
    ///
    /// The original name is tried first; a taken name gets a random suffix.
    /// Names are claimed with `create_new`, so concurrent uploads cannot
    /// land on the same path.
    async fn store_file(&self, source: &Path, original_name: &str) -> Result<String> {
        let dir = self.root.join(UPLOAD_DIR);
        tokio::fs::create_dir_all(&dir).await?;

        let name = sanitize_file_name(original_name);
        for attempt in 0..NAME_ATTEMPTS {
            let candidate = if attempt == 0 {
                name.clone()
            } else {
                let suffix = uuid::Uuid::new_v4().simple().to_string();
                with_suffix(&name, &suffix[..SUFFIX_LEN])
            };

            let dest = dir.join(&candidate);
            let mut out = match OpenOptions::new().write(true).create_new(true).open(&dest).await {
                Ok(out) => out,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(e.into()),
            };

            let mut input = tokio::fs::File::open(source).await?;
            if let Err(e) = tokio::io::copy(&mut input, &mut out).await {
                drop(out);
                let _ = tokio::fs::remove_file(&dest).await;
                return Err(e.into());
            }
            return Ok(format!("{}/{}", UPLOAD_DIR, candidate));
        }

        Err(AppError::Internal(format!(
            "no free file name for upload {}",
            name
        )))
    }

    /// Read a stored file; `None` for unknown or escaping paths
    pub async fn open(&self, relative: &str) -> Result<Option<(Vec<u8>, Mime)>> {
        let relative = Path::new(relative);
        let safe = relative
            .components()
            .all(|c| matches!(c, Component::Normal(_)));
        if !safe || relative.as_os_str().is_empty() {
            return Ok(None);
        }

        let path = self.root.join(relative);
        match tokio::fs::metadata(&path).await {
            Ok(meta) if meta.is_file() => {}
            Ok(_) => return Ok(None),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        }

        let bytes = tokio::fs::read(&path).await?;
        Ok(Some((bytes, mime_for(relative))))
    }
}

fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn is_image(content_type: Option<&Mime>, file_name: Option<&str>) -> bool {
    let by_type = content_type.is_some_and(|m| m.type_() == mime::IMAGE);
    let by_ext = file_name
        .and_then(extension)
        .is_some_and(|e| IMAGE_EXTENSIONS.contains(&e.as_str()));
    match content_type {
        Some(m) if *m != mime::APPLICATION_OCTET_STREAM => by_type,
        _ => by_ext,
    }
}

fn mime_for(path: &Path) -> Mime {
    match path.to_str().and_then(extension).as_deref() {
        Some("gif") => mime::IMAGE_GIF,
        Some("png") => mime::IMAGE_PNG,
        Some("jpg") | Some("jpeg") => mime::IMAGE_JPEG,
        Some("bmp") => mime::IMAGE_BMP,
        Some("webp") => "image/webp".parse().unwrap_or(mime::APPLICATION_OCTET_STREAM),
        _ => mime::APPLICATION_OCTET_STREAM,
    }
}

/// Base name only, restricted to `[A-Za-z0-9._-]` and short enough to take
/// a suffix
fn sanitize_file_name(raw: &str) -> String {
    let base = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-') {
                c
            } else {
                '_'
            }
        })
        .collect();
    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        return "upload".to_string();
    }
    shorten(cleaned, MAX_FILE_NAME_LEN - SUFFIX_LEN - 1)
}

/// Trim the stem so the whole name fits in `max` bytes; ASCII input only
fn shorten(name: &str, max: usize) -> String {
    if name.len() <= max {
        return name.to_string();
    }
    match name.rsplit_once('.') {
        Some((stem, ext)) if !stem.is_empty() && ext.len() + 2 <= max => {
            format!("{}.{}", &stem[..max - ext.len() - 1], ext)
        }
        _ => name[..max].to_string(),
    }
}

fn with_suffix(name: &str, suffix: &str) -> String {
    match name.rsplit_once('.') {
        Some((stem, ext)) => format!("{}_{}.{}", stem, suffix, ext),
        None => format!("{}_{}", name, suffix),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("small.gif"), "small.gif");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\pics\\my cat.png"), "my_cat.png");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name(""), "upload");
    }

    #[test]
    fn test_long_names_are_shortened() {
        let long = format!("{}.gif", "a".repeat(300));
        let name = sanitize_file_name(&long);
        assert!(name.len() <= MAX_FILE_NAME_LEN - SUFFIX_LEN - 1);
        assert!(name.ends_with(".gif"));
        assert!(with_suffix(&name, "abc1234").len() <= MAX_FILE_NAME_LEN);

        let no_ext = sanitize_file_name(&"b".repeat(300));
        assert_eq!(no_ext.len(), MAX_FILE_NAME_LEN - SUFFIX_LEN - 1);
    }

    #[tokio::test]
    async fn test_same_name_uploads_never_overwrite() {
        let root = std::env::temp_dir().join(format!("blog-media-{}", uuid::Uuid::new_v4().simple()));
        let store = MediaStore::new(root.clone(), 1024);
        let first = root.join("first.src");
        let second = root.join("second.src");
        tokio::fs::create_dir_all(&root).await.unwrap();
        tokio::fs::write(&first, b"first").await.unwrap();
        tokio::fs::write(&second, b"second").await.unwrap();

        let (a, b) = tokio::join!(
            store.store_file(&first, "small.gif"),
            store.store_file(&second, "small.gif"),
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a, b);
        assert!(a == "posts/small.gif" || b == "posts/small.gif");

        let (a_bytes, _) = store.open(&a).await.unwrap().unwrap();
        let (b_bytes, _) = store.open(&b).await.unwrap().unwrap();
        assert_eq!(a_bytes, b"first");
        assert_eq!(b_bytes, b"second");

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[test]
    fn test_with_suffix() {
        assert_eq!(with_suffix("small.gif", "abc1234"), "small_abc1234.gif");
        assert_eq!(with_suffix("noext", "abc1234"), "noext_abc1234");
    }

    #[test]
    fn test_is_image() {
        assert!(is_image(Some(&mime::IMAGE_GIF), Some("small.gif")));
        assert!(!is_image(Some(&mime::TEXT_PLAIN), Some("small.gif")));
        assert!(is_image(None, Some("photo.JPG")));
        assert!(is_image(Some(&mime::APPLICATION_OCTET_STREAM), Some("a.png")));
        assert!(!is_image(None, Some("notes.txt")));
    }

    #[tokio::test]
    async fn test_open_rejects_escaping_paths() {
        let store = MediaStore::new(std::env::temp_dir(), 1024);
        assert!(store.open("../secret").await.unwrap().is_none());
        assert!(store.open("/etc/passwd").await.unwrap().is_none());
        assert!(store.open("").await.unwrap().is_none());
    }
}
