use camino::Utf8PathBuf as PathBuf;
use chrono::{DateTime, NaiveDate, Utc};
use eyre::{eyre, Result};

use super::PhotoId;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Photo {
    pub base: PhotoBase,
    pub spe: PhotoSpe,
}

/// Fields shared by both sources. Everything except `last_scanned_at` is
/// fixed at insert.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct PhotoBase {
    pub id: PhotoId,
    pub account_name: String,
    pub file_name: String,
    pub taken_date: DateTime<Utc>,
    pub file_size: i64,
    /// md5 hex digest. Always present for archive photos, present for remote
    /// photos when the service reports one.
    pub content_hash: Option<String>,
    pub added_at: DateTime<Utc>,
    pub last_scanned_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum PhotoSpe {
    Archive(ArchivePhoto),
    Remote(RemotePhoto),
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ArchivePhoto {
    /// Path relative to the account's archive root
    pub archive_path: PathBuf,
    /// Derived once at import from the archive folder structure, immutable
    pub album_name: Option<String>,
    /// Monotonic, false to true only
    pub is_backed_up: bool,
    pub can_be_removed: bool,
    /// Destination path in the remote store, set when uploaded
    pub remote_path: Option<String>,
    /// Assigned by the remote store, set only after a confirmed existence
    /// check. Never guessed, never cleared by a rescan.
    pub remote_photo_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemotePhoto {
    /// Folder path in the remote store
    pub remote_path: String,
    pub remote_photo_id: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PhotoSource {
    Archive,
    Remote,
}

impl Photo {
    pub fn source(&self) -> PhotoSource {
        match self.spe {
            PhotoSpe::Archive(_) => PhotoSource::Archive,
            PhotoSpe::Remote(_) => PhotoSource::Remote,
        }
    }

    /// Capture date at day granularity, for the fallback matching predicate
    pub fn taken_day(&self) -> NaiveDate {
        self.base.taken_date.date_naive()
    }

    pub fn as_archive(&self) -> Option<&ArchivePhoto> {
        match &self.spe {
            PhotoSpe::Archive(archive) => Some(archive),
            PhotoSpe::Remote(_) => None,
        }
    }
}

/// Insertable photo record, identity key not yet derived
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CreatePhoto {
    pub account_name: String,
    pub file_name: String,
    pub taken_date: DateTime<Utc>,
    pub file_size: i64,
    pub content_hash: Option<String>,
    pub spe: CreatePhotoSpe,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum CreatePhotoSpe {
    Archive {
        archive_path: PathBuf,
        album_name: Option<String>,
        is_backed_up: bool,
        can_be_removed: bool,
    },
    Remote {
        remote_path: String,
        remote_photo_id: String,
    },
}

impl CreatePhoto {
    pub fn id(&self) -> Result<PhotoId> {
        match &self.spe {
            CreatePhotoSpe::Archive { .. } => {
                let hash = self
                    .content_hash
                    .as_deref()
                    .ok_or_else(|| eyre!("archive photo must have a content hash"))?;
                Ok(PhotoId::for_archive(&self.account_name, hash))
            }
            CreatePhotoSpe::Remote {
                remote_photo_id, ..
            } => Ok(PhotoId::for_remote(&self.account_name, remote_photo_id)),
        }
    }
}
