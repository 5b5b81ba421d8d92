use std::borrow::Cow;

use diesel::{prelude::Insertable, Queryable, QueryableByName, Selectable};
use eyre::{eyre, Result};

use crate::model::{
    util::datetime_from_db_repr, ArchivePhoto, Photo, PhotoBase, PhotoId, PhotoSource, PhotoSpe,
    RemotePhoto,
};

pub fn to_db_source(source: PhotoSource) -> i32 {
    match source {
        PhotoSource::Archive => 0,
        PhotoSource::Remote => 1,
    }
}

pub fn from_db_source(i: i32) -> Result<PhotoSource> {
    match i {
        0 => Ok(PhotoSource::Archive),
        1 => Ok(PhotoSource::Remote),
        other => Err(eyre!("invalid db photo source {}", other)),
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, QueryableByName, Selectable)]
#[diesel(table_name = super::super::schema::Photo)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DbPhoto {
    pub photo_id: String,
    pub source: i32,
    pub account_name: String,
    pub file_name: String,
    pub taken_date: i64,
    pub file_size: i64,
    pub content_hash: Option<String>,
    pub added_at: i64,
    pub last_scanned_at: i64,
    pub archive_path: Option<String>,
    pub album_name: Option<String>,
    pub is_backed_up: Option<i32>,
    pub can_be_removed: Option<i32>,
    pub remote_path: Option<String>,
    pub remote_photo_id: Option<String>,
}

impl TryFrom<DbPhoto> for Photo {
    type Error = eyre::Report;

    fn try_from(value: DbPhoto) -> Result<Self, Self::Error> {
        let source = from_db_source(value.source)?;
        let spe = match source {
            PhotoSource::Archive => PhotoSpe::Archive(ArchivePhoto {
                archive_path: value
                    .archive_path
                    .ok_or(eyre!("archive DbPhoto must have archive_path set"))?
                    .into(),
                album_name: value.album_name,
                is_backed_up: value
                    .is_backed_up
                    .map(|i| i != 0)
                    .ok_or(eyre!("archive DbPhoto must have is_backed_up set"))?,
                can_be_removed: value
                    .can_be_removed
                    .map(|i| i != 0)
                    .ok_or(eyre!("archive DbPhoto must have can_be_removed set"))?,
                remote_path: value.remote_path,
                remote_photo_id: value.remote_photo_id,
            }),
            PhotoSource::Remote => PhotoSpe::Remote(RemotePhoto {
                remote_path: value
                    .remote_path
                    .ok_or(eyre!("remote DbPhoto must have remote_path set"))?,
                remote_photo_id: value
                    .remote_photo_id
                    .ok_or(eyre!("remote DbPhoto must have remote_photo_id set"))?,
            }),
        };
        let base = PhotoBase {
            id: PhotoId(value.photo_id),
            account_name: value.account_name,
            file_name: value.file_name,
            taken_date: datetime_from_db_repr(value.taken_date)?,
            file_size: value.file_size,
            content_hash: value.content_hash,
            added_at: datetime_from_db_repr(value.added_at)?,
            last_scanned_at: datetime_from_db_repr(value.last_scanned_at)?,
        };
        Ok(Photo { base, spe })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Insertable)]
#[diesel(table_name = super::super::schema::Photo)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DbInsertPhoto<'a> {
    pub photo_id: Cow<'a, str>,
    pub source: i32,
    pub account_name: Cow<'a, str>,
    pub file_name: Cow<'a, str>,
    pub taken_date: i64,
    pub file_size: i64,
    pub content_hash: Option<Cow<'a, str>>,
    pub added_at: i64,
    pub last_scanned_at: i64,
    pub archive_path: Option<Cow<'a, str>>,
    pub album_name: Option<Cow<'a, str>>,
    pub is_backed_up: Option<i32>,
    pub can_be_removed: Option<i32>,
    pub remote_path: Option<Cow<'a, str>>,
    pub remote_photo_id: Option<Cow<'a, str>>,
}
