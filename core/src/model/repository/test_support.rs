use chrono::{DateTime, TimeZone, Utc};

use crate::model::{CreatePhoto, CreatePhotoSpe, PhotoId};
use crate::processing::hash::hash_bytes;

use super::db::DbConn;
use super::photo;

/// Builder for archive photo rows in repository and job tests. The content
/// hash is derived from the archive path so every fixture gets a distinct
/// identity unless a test overrides it.
#[derive(Debug, Clone)]
pub struct ArchivePhotoFixture {
    pub account: String,
    pub file_name: String,
    pub archive_path: String,
    pub album: Option<String>,
    pub taken: DateTime<Utc>,
    pub content_hash: String,
    pub backed_up: bool,
    pub remote_photo_id: Option<String>,
}

impl ArchivePhotoFixture {
    pub fn new(account: &str, file_name: &str, archive_path: &str) -> ArchivePhotoFixture {
        ArchivePhotoFixture {
            account: account.to_string(),
            file_name: file_name.to_string(),
            archive_path: archive_path.to_string(),
            album: None,
            taken: Utc.with_ymd_and_hms(2019, 1, 1, 12, 0, 0).unwrap(),
            content_hash: hash_bytes(archive_path.as_bytes()),
            backed_up: false,
            remote_photo_id: None,
        }
    }

    pub fn album(mut self, name: &str) -> Self {
        self.album = Some(name.to_string());
        self
    }

    pub fn taken(mut self, year: i32, month: u32, day: u32) -> Self {
        self.taken = Utc.with_ymd_and_hms(year, month, day, 12, 0, 0).unwrap();
        self
    }

    pub fn hash(mut self, content_hash: &str) -> Self {
        self.content_hash = content_hash.to_string();
        self
    }

    pub fn backed_up(mut self) -> Self {
        self.backed_up = true;
        self
    }

    /// Implies backed up
    pub fn with_remote_id(mut self, remote_id: &str) -> Self {
        self.backed_up = true;
        self.remote_photo_id = Some(remote_id.to_string());
        self
    }
}

pub fn insert_archive_photo(conn: &mut DbConn, fixture: ArchivePhotoFixture) -> PhotoId {
    let create = CreatePhoto {
        account_name: fixture.account.clone(),
        file_name: fixture.file_name.clone(),
        taken_date: fixture.taken,
        file_size: 1024,
        content_hash: Some(fixture.content_hash.clone()),
        spe: CreatePhotoSpe::Archive {
            archive_path: fixture.archive_path.clone().into(),
            album_name: fixture.album.clone(),
            is_backed_up: fixture.backed_up,
            can_be_removed: fixture.backed_up,
        },
    };
    let id = photo::insert_or_refresh_photo(conn, &create).expect("fixture insert failed");
    if let Some(remote_id) = &fixture.remote_photo_id {
        photo::set_remote_photo_id(conn, &id, remote_id).expect("fixture remote id failed");
    }
    id
}

pub fn insert_remote_photo(
    conn: &mut DbConn,
    account: &str,
    file_name: &str,
    remote_photo_id: &str,
    content_hash: Option<&str>,
    taken: (i32, u32, u32),
) -> PhotoId {
    let create = CreatePhoto {
        account_name: account.to_string(),
        file_name: file_name.to_string(),
        taken_date: Utc
            .with_ymd_and_hms(taken.0, taken.1, taken.2, 8, 30, 0)
            .unwrap(),
        file_size: 2048,
        content_hash: content_hash.map(|h| h.to_string()),
        spe: CreatePhotoSpe::Remote {
            remote_path: "/Photos".to_string(),
            remote_photo_id: remote_photo_id.to_string(),
        },
    };
    photo::insert_or_refresh_photo(conn, &create).expect("fixture insert failed")
}
