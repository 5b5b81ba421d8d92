use std::borrow::Cow;

use chrono::Utc;
use diesel::{insert_into, prelude::*};
use eyre::{bail, Context, Result};
use tracing::instrument;

use crate::model::{
    util::{bool_to_int, datetime_to_db_repr},
    CreatePhoto, CreatePhotoSpe, Photo, PhotoId, PhotoSource,
};

use super::db::DbConn;
use super::db_entity::{to_db_source, DbInsertPhoto, DbPhoto};
use super::schema;

#[instrument(skip(conn))]
pub fn get_photo(conn: &mut DbConn, id: &PhotoId) -> Result<Option<Photo>> {
    use schema::Photo::dsl::*;
    let db_photo: Option<DbPhoto> = Photo
        .find(id.0.as_str())
        .select(DbPhoto::as_select())
        .first(conn)
        .optional()
        .wrap_err("error querying single row from table Photo")?;
    db_photo.map(|p| p.try_into()).transpose()
}

/// Insert the record if its identity key is not yet in the catalog, otherwise
/// refresh only `last_scanned_at` and `file_size`. Status fields populated by
/// later phases (backed-up flag, remote photo id, membership rows) are never
/// touched here, so a rescan can not clobber them.
#[instrument(skip(conn, create))]
pub fn insert_or_refresh_photo(conn: &mut DbConn, create: &CreatePhoto) -> Result<PhotoId> {
    use schema::Photo;
    let id = create.id()?;
    let now = datetime_to_db_repr(&Utc::now());
    let source = match &create.spe {
        CreatePhotoSpe::Archive { .. } => PhotoSource::Archive,
        CreatePhotoSpe::Remote { .. } => PhotoSource::Remote,
    };
    let insertable = DbInsertPhoto {
        photo_id: Cow::Borrowed(id.0.as_str()),
        source: to_db_source(source),
        account_name: Cow::Borrowed(create.account_name.as_str()),
        file_name: Cow::Borrowed(create.file_name.as_str()),
        taken_date: datetime_to_db_repr(&create.taken_date),
        file_size: create.file_size,
        content_hash: create.content_hash.as_deref().map(Cow::Borrowed),
        added_at: now,
        last_scanned_at: now,
        archive_path: match &create.spe {
            CreatePhotoSpe::Archive { archive_path, .. } => {
                Some(Cow::Borrowed(archive_path.as_str()))
            }
            CreatePhotoSpe::Remote { .. } => None,
        },
        album_name: match &create.spe {
            CreatePhotoSpe::Archive { album_name, .. } => {
                album_name.as_deref().map(Cow::Borrowed)
            }
            CreatePhotoSpe::Remote { .. } => None,
        },
        is_backed_up: match &create.spe {
            CreatePhotoSpe::Archive { is_backed_up, .. } => Some(bool_to_int(*is_backed_up)),
            CreatePhotoSpe::Remote { .. } => None,
        },
        can_be_removed: match &create.spe {
            CreatePhotoSpe::Archive { can_be_removed, .. } => Some(bool_to_int(*can_be_removed)),
            CreatePhotoSpe::Remote { .. } => None,
        },
        remote_path: match &create.spe {
            CreatePhotoSpe::Archive { .. } => None,
            CreatePhotoSpe::Remote { remote_path, .. } => Some(Cow::Borrowed(remote_path.as_str())),
        },
        remote_photo_id: match &create.spe {
            CreatePhotoSpe::Archive { .. } => None,
            CreatePhotoSpe::Remote {
                remote_photo_id, ..
            } => Some(Cow::Borrowed(remote_photo_id.as_str())),
        },
    };
    insert_into(Photo::table)
        .values(&insertable)
        .on_conflict(Photo::photo_id)
        .do_update()
        .set((
            Photo::last_scanned_at.eq(now),
            Photo::file_size.eq(create.file_size),
        ))
        .execute(conn)
        .wrap_err("error upserting into table Photo")?;
    Ok(id)
}

#[instrument(skip(conn))]
pub fn get_remote_photos(conn: &mut DbConn, account: &str) -> Result<Vec<Photo>> {
    use schema::Photo::dsl::*;
    let db_photos: Vec<DbPhoto> = Photo
        .filter(account_name.eq(account))
        .filter(source.eq(to_db_source(PhotoSource::Remote)))
        .select(DbPhoto::as_select())
        .load(conn)
        .wrap_err("error querying table Photo")?;
    db_photos
        .into_iter()
        .map(|p| p.try_into())
        .collect::<Result<Vec<_>>>()
}

/// Archive photos not yet backed up, ordered by capture time (ties broken by
/// id) so repeated limited runs walk the backlog in a stable order.
#[instrument(skip(conn))]
pub fn get_photos_pending_transfer(
    conn: &mut DbConn,
    account: &str,
    limit: Option<i64>,
) -> Result<Vec<Photo>> {
    use schema::Photo::dsl::*;
    let mut query = Photo
        .filter(account_name.eq(account))
        .filter(source.eq(to_db_source(PhotoSource::Archive)))
        .filter(is_backed_up.eq(Some(bool_to_int(false))))
        .order((taken_date.asc(), photo_id.asc()))
        .select(DbPhoto::as_select())
        .into_boxed();
    if let Some(limit_to) = limit {
        query = query.limit(limit_to);
    }
    let db_photos: Vec<DbPhoto> = query.load(conn).wrap_err("error querying table Photo")?;
    db_photos
        .into_iter()
        .map(|p| p.try_into())
        .collect::<Result<Vec<_>>>()
}

/// Phase 1 backlog: backed up, has an album, remote photo id still unknown
#[instrument(skip(conn))]
pub fn get_photos_needing_remote_id(conn: &mut DbConn, account: &str) -> Result<Vec<Photo>> {
    use schema::Photo::dsl::*;
    let db_photos: Vec<DbPhoto> = Photo
        .filter(account_name.eq(account))
        .filter(source.eq(to_db_source(PhotoSource::Archive)))
        .filter(is_backed_up.eq(Some(bool_to_int(true))))
        .filter(album_name.is_not_null())
        .filter(remote_photo_id.is_null())
        .order((taken_date.asc(), photo_id.asc()))
        .select(DbPhoto::as_select())
        .load(conn)
        .wrap_err("error querying table Photo")?;
    db_photos
        .into_iter()
        .map(|p| p.try_into())
        .collect::<Result<Vec<_>>>()
}

/// Phase 2 backlog: has an album and a remote photo id but no recorded
/// membership row yet
#[instrument(skip(conn))]
pub fn get_photos_needing_album_sync(conn: &mut DbConn, account: &str) -> Result<Vec<Photo>> {
    use diesel::dsl::{exists, not};
    use schema::{AlbumMembership, Photo};
    let db_photos: Vec<DbPhoto> = Photo::table
        .filter(Photo::account_name.eq(account))
        .filter(Photo::source.eq(to_db_source(PhotoSource::Archive)))
        .filter(Photo::album_name.is_not_null())
        .filter(Photo::remote_photo_id.is_not_null())
        .filter(not(exists(
            AlbumMembership::table.filter(AlbumMembership::photo_id.eq(Photo::photo_id)),
        )))
        .order((Photo::taken_date.asc(), Photo::photo_id.asc()))
        .select(DbPhoto::as_select())
        .load(conn)
        .wrap_err("error querying tables Photo, AlbumMembership")?;
    db_photos
        .into_iter()
        .map(|p| p.try_into())
        .collect::<Result<Vec<_>>>()
}

#[instrument(skip(conn))]
pub fn get_removal_candidates(conn: &mut DbConn, account: &str) -> Result<Vec<Photo>> {
    use schema::Photo::dsl::*;
    let db_photos: Vec<DbPhoto> = Photo
        .filter(account_name.eq(account))
        .filter(source.eq(to_db_source(PhotoSource::Archive)))
        .filter(can_be_removed.eq(Some(bool_to_int(true))))
        .order((taken_date.asc(), photo_id.asc()))
        .select(DbPhoto::as_select())
        .load(conn)
        .wrap_err("error querying table Photo")?;
    db_photos
        .into_iter()
        .map(|p| p.try_into())
        .collect::<Result<Vec<_>>>()
}

/// Transition taken by the transfer orchestrator on confirmed upload success.
/// There is no inverse transition, the flag is monotonic.
#[instrument(skip(conn))]
pub fn mark_backed_up(conn: &mut DbConn, id: &PhotoId, uploaded_to: &str) -> Result<()> {
    use schema::Photo;
    let updated = diesel::update(Photo::table.find(id.0.as_str()))
        .set((
            Photo::is_backed_up.eq(Some(bool_to_int(true))),
            Photo::can_be_removed.eq(Some(bool_to_int(true))),
            Photo::remote_path.eq(Some(uploaded_to)),
        ))
        .execute(conn)
        .wrap_err("error updating columns Photo.is_backed_up, Photo.remote_path")?;
    if updated == 0 {
        bail!("no Photo row with id {}", id);
    }
    Ok(())
}

/// Transition taken by phase 1 of the album reconciler after a confirmed
/// unique search match
#[instrument(skip(conn))]
pub fn set_remote_photo_id(conn: &mut DbConn, id: &PhotoId, remote_id: &str) -> Result<()> {
    use schema::Photo;
    let updated = diesel::update(Photo::table.find(id.0.as_str()))
        .set(Photo::remote_photo_id.eq(Some(remote_id)))
        .execute(conn)
        .wrap_err("error updating column Photo.remote_photo_id")?;
    if updated == 0 {
        bail!("no Photo row with id {}", id);
    }
    Ok(())
}

/// Per-album-name rollup over archive photos, for the albums listing
#[derive(Debug, Clone, PartialEq, Eq, QueryableByName)]
pub struct AlbumNameStats {
    #[diesel(sql_type = diesel::sql_types::Text)]
    pub album_name: String,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub photos: i64,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub backed_up: i64,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub with_remote_id: i64,
    #[diesel(sql_type = diesel::sql_types::BigInt)]
    pub members: i64,
}

#[instrument(skip(conn))]
pub fn get_album_name_stats(conn: &mut DbConn, account: &str) -> Result<Vec<AlbumNameStats>> {
    let rows: Vec<AlbumNameStats> = diesel::sql_query(
        r#"
    SELECT p.album_name AS album_name,
           COUNT(*) AS photos,
           COALESCE(SUM(p.is_backed_up), 0) AS backed_up,
           SUM(CASE WHEN p.remote_photo_id IS NOT NULL THEN 1 ELSE 0 END) AS with_remote_id,
           SUM(CASE WHEN EXISTS (
               SELECT 1 FROM AlbumMembership m WHERE m.photo_id = p.photo_id
           ) THEN 1 ELSE 0 END) AS members
    FROM Photo p
    WHERE p.source = 0 AND p.account_name = ? AND p.album_name IS NOT NULL
    GROUP BY p.album_name
    ORDER BY p.album_name;
    "#,
    )
    .bind::<diesel::sql_types::Text, _>(account)
    .load(conn)
    .wrap_err("error querying album name rollup")?;
    Ok(rows)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CatalogCounts {
    pub archive_photos: i64,
    pub remote_photos: i64,
    pub backed_up: i64,
    pub pending_transfer: i64,
    pub needing_remote_id: i64,
    pub needing_album_sync: i64,
    pub removal_candidates: i64,
}

#[instrument(skip(conn))]
pub fn get_catalog_counts(conn: &mut DbConn, account: &str) -> Result<CatalogCounts> {
    use diesel::dsl::{exists, not};
    use schema::{AlbumMembership, Photo};
    let archive = Photo::table
        .filter(Photo::account_name.eq(account))
        .filter(Photo::source.eq(to_db_source(PhotoSource::Archive)));
    let archive_photos: i64 = archive.clone().count().get_result(conn)?;
    let remote_photos: i64 = Photo::table
        .filter(Photo::account_name.eq(account))
        .filter(Photo::source.eq(to_db_source(PhotoSource::Remote)))
        .count()
        .get_result(conn)?;
    let backed_up: i64 = archive
        .clone()
        .filter(Photo::is_backed_up.eq(Some(bool_to_int(true))))
        .count()
        .get_result(conn)?;
    let pending_transfer: i64 = archive
        .clone()
        .filter(Photo::is_backed_up.eq(Some(bool_to_int(false))))
        .count()
        .get_result(conn)?;
    let needing_remote_id: i64 = archive
        .clone()
        .filter(Photo::is_backed_up.eq(Some(bool_to_int(true))))
        .filter(Photo::album_name.is_not_null())
        .filter(Photo::remote_photo_id.is_null())
        .count()
        .get_result(conn)?;
    let needing_album_sync: i64 = archive
        .clone()
        .filter(Photo::album_name.is_not_null())
        .filter(Photo::remote_photo_id.is_not_null())
        .filter(not(exists(
            AlbumMembership::table.filter(AlbumMembership::photo_id.eq(Photo::photo_id)),
        )))
        .count()
        .get_result(conn)?;
    let removal_candidates: i64 = archive
        .filter(Photo::can_be_removed.eq(Some(bool_to_int(true))))
        .count()
        .get_result(conn)?;
    Ok(CatalogCounts {
        archive_photos,
        remote_photos,
        backed_up,
        pending_transfer,
        needing_remote_id,
        needing_album_sync,
        removal_candidates,
    })
}
