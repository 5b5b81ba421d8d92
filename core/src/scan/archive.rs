use camino::{Utf8Path as Path, Utf8PathBuf as PathBuf};
use chrono::{DateTime, Utc};
use eyre::{eyre, Context, Result};
use walkdir::WalkDir;

use crate::{
    catalog::{album_name, identity::PhotoFingerprint},
    processing::hash::hash_file,
};

use super::sidecar;

const MEDIA_EXTENSIONS: &[&str] = &[
    "jpg", "jpeg", "png", "gif", "webp", "bmp", "tif", "tiff", "heic", "heif", "dng", "nef",
    "cr2", "mp4", "m4v", "mov", "avi", "mkv", "3gp",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScannedPhoto {
    pub abs_path: PathBuf,
    /// relative to the archive root
    pub archive_path: PathBuf,
    pub file_name: String,
    pub taken_date: DateTime<Utc>,
    pub file_size: i64,
    /// md5 hex digest
    pub content_hash: String,
    /// Inferred from the first path segment under the archive root, None for
    /// files in auto-generated folders or at the root
    pub album_name: Option<String>,
}

impl ScannedPhoto {
    pub fn fingerprint(&self) -> PhotoFingerprint {
        PhotoFingerprint {
            content_hash: self.content_hash.clone(),
            file_name: self.file_name.clone(),
            taken_day: self.taken_date.date_naive(),
        }
    }
}

pub fn is_media_file(path: &Path) -> bool {
    path.extension()
        .map(|ext| MEDIA_EXTENSIONS.contains(&ext.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Media file paths under the archive root in a stable walk order
#[tracing::instrument]
pub fn collect_media_files(root: &Path) -> Result<Vec<PathBuf>> {
    let mut files: Vec<PathBuf> = Vec::default();
    for entry in WalkDir::new(root).sort_by_file_name() {
        let entry = entry.wrap_err("error walking archive directory")?;
        if !entry.file_type().is_file() {
            continue;
        }
        let path = Path::from_path(entry.path())
            .ok_or_else(|| eyre!("non unicode file path not supported: {:?}", entry.path()))?;
        if is_media_file(path) {
            files.push(path.to_owned());
        }
    }
    Ok(files)
}

/// Everything the importer needs to know about one media file: capture
/// timestamp (sidecar, falling back to filesystem times), size, content
/// digest and the album hint from the folder structure.
#[tracing::instrument(skip(root))]
pub async fn read_scanned_photo(root: &Path, abs_path: &Path) -> Result<ScannedPhoto> {
    let archive_path = abs_path
        .strip_prefix(root)
        .wrap_err("file to scan is not under the archive root")?
        .to_owned();
    let file_name = abs_path
        .file_name()
        .ok_or_else(|| eyre!("media file has no file name"))?
        .to_string();
    let metadata = tokio::fs::metadata(abs_path)
        .await
        .wrap_err("could not stat media file")?;
    let taken_date = match sidecar::read_sidecar_timestamp(abs_path).await {
        Some(ts) => ts,
        None => fs_fallback_timestamp(&metadata),
    };
    let file = tokio::fs::File::open(abs_path)
        .await
        .wrap_err("could not open media file")?
        .try_into_std()
        .unwrap();
    let content_hash = hash_file(file).await?;
    let album_name = {
        let mut components = archive_path.components();
        match (components.next(), components.next()) {
            (Some(first), Some(_)) => album_name::infer_album_name(first.as_str()),
            _ => None,
        }
    };
    Ok(ScannedPhoto {
        abs_path: abs_path.to_owned(),
        archive_path,
        file_name,
        taken_date,
        file_size: metadata.len() as i64,
        content_hash,
        album_name,
    })
}

fn fs_fallback_timestamp(metadata: &std::fs::Metadata) -> DateTime<Utc> {
    metadata
        .created()
        .or_else(|_| metadata.modified())
        .map(DateTime::<Utc>::from)
        .unwrap_or_else(|_| Utc::now())
}
