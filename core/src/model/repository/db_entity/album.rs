use diesel::{Queryable, Selectable};
use eyre::Result;

use crate::model::{
    util::datetime_from_db_repr, Album, AlbumId, AlbumMembership, AlbumMembershipId, PhotoId,
};

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = super::super::schema::Album)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DbAlbum {
    pub album_id: i64,
    pub account_name: String,
    pub name: String,
    pub remote_album_id: Option<String>,
    pub created_at: i64,
    pub last_synced_at: Option<i64>,
}

impl TryFrom<DbAlbum> for Album {
    type Error = eyre::Report;

    fn try_from(value: DbAlbum) -> Result<Self, Self::Error> {
        Ok(Album {
            id: AlbumId(value.album_id),
            account_name: value.account_name,
            name: value.name,
            remote_album_id: value.remote_album_id,
            created_at: datetime_from_db_repr(value.created_at)?,
            last_synced_at: value
                .last_synced_at
                .map(datetime_from_db_repr)
                .transpose()?,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Queryable, Selectable)]
#[diesel(table_name = super::super::schema::AlbumMembership)]
#[diesel(check_for_backend(diesel::sqlite::Sqlite))]
pub struct DbAlbumMembership {
    pub membership_id: i64,
    pub album_id: i64,
    pub photo_id: String,
    pub added_at: i64,
}

impl TryFrom<DbAlbumMembership> for AlbumMembership {
    type Error = eyre::Report;

    fn try_from(value: DbAlbumMembership) -> Result<Self, Self::Error> {
        Ok(AlbumMembership {
            id: AlbumMembershipId(value.membership_id),
            album_id: AlbumId(value.album_id),
            photo_id: PhotoId(value.photo_id),
            added_at: datetime_from_db_repr(value.added_at)?,
        })
    }
}
