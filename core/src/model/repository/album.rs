use chrono::Utc;
use diesel::{insert_into, prelude::*};
use eyre::{bail, Context, Result};
use tracing::instrument;

use crate::model::{util::datetime_to_db_repr, Album, AlbumId, AlbumMembership, PhotoId};

use super::db::DbConn;
use super::db_entity::{DbAlbum, DbAlbumMembership};
use super::schema;

#[instrument(skip(conn))]
pub fn get_album(conn: &mut DbConn, id: AlbumId) -> Result<Album> {
    use schema::Album::dsl::*;
    let db_album: DbAlbum = Album
        .find(id.0)
        .select(DbAlbum::as_select())
        .first(conn)
        .wrap_err("error querying single row from table Album")?;
    db_album.try_into()
}

#[instrument(skip(conn))]
pub fn get_album_by_name(
    conn: &mut DbConn,
    account: &str,
    album_name: &str,
) -> Result<Option<Album>> {
    use schema::Album::dsl::*;
    let db_album: Option<DbAlbum> = Album
        .filter(account_name.eq(account))
        .filter(name.eq(album_name))
        .select(DbAlbum::as_select())
        .first(conn)
        .optional()
        .wrap_err("error querying table Album")?;
    db_album.map(|a| a.try_into()).transpose()
}

#[instrument(skip(conn))]
pub fn get_albums_for_account(conn: &mut DbConn, account: &str) -> Result<Vec<Album>> {
    use schema::Album::dsl::*;
    let db_albums: Vec<DbAlbum> = Album
        .filter(account_name.eq(account))
        .order(name.asc())
        .select(DbAlbum::as_select())
        .load(conn)
        .wrap_err("error querying table Album")?;
    db_albums
        .into_iter()
        .map(|a| a.try_into())
        .collect::<Result<Vec<_>>>()
}

/// Album names are unique per account, so this is idempotent
#[instrument(skip(conn))]
pub fn get_or_create_album(conn: &mut DbConn, account: &str, album_name: &str) -> Result<Album> {
    use schema::Album;
    if let Some(existing) = get_album_by_name(conn, account, album_name)? {
        return Ok(existing);
    }
    let now = datetime_to_db_repr(&Utc::now());
    let id: i64 = insert_into(Album::table)
        .values((
            Album::account_name.eq(account),
            Album::name.eq(album_name),
            Album::created_at.eq(now),
        ))
        .returning(Album::album_id)
        .get_result(conn)
        .wrap_err("error inserting into table Album")?;
    get_album(conn, AlbumId(id))
}

#[instrument(skip(conn))]
pub fn set_remote_album_id(conn: &mut DbConn, id: AlbumId, remote_id: &str) -> Result<()> {
    use schema::Album;
    let updated = diesel::update(Album::table.find(id.0))
        .set(Album::remote_album_id.eq(Some(remote_id)))
        .execute(conn)
        .wrap_err("error updating column Album.remote_album_id")?;
    if updated == 0 {
        bail!("no Album row with id {}", id);
    }
    Ok(())
}

#[instrument(skip(conn))]
pub fn mark_album_synced(conn: &mut DbConn, id: AlbumId) -> Result<()> {
    use schema::Album;
    let now = datetime_to_db_repr(&Utc::now());
    diesel::update(Album::table.find(id.0))
        .set(Album::last_synced_at.eq(Some(now)))
        .execute(conn)
        .wrap_err("error updating column Album.last_synced_at")?;
    Ok(())
}

/// Record confirmed memberships for one reconciled chunk. A single statement,
/// so a chunk is recorded all-or-nothing like the remote call it mirrors.
/// Re-recording an existing membership is a no-op.
#[instrument(skip(conn, photo_ids))]
pub fn add_memberships(conn: &mut DbConn, album: AlbumId, photo_ids: &[PhotoId]) -> Result<()> {
    use schema::AlbumMembership;
    if photo_ids.is_empty() {
        return Ok(());
    }
    let now = datetime_to_db_repr(&Utc::now());
    let rows: Vec<_> = photo_ids
        .iter()
        .map(|photo| {
            (
                AlbumMembership::album_id.eq(album.0),
                AlbumMembership::photo_id.eq(photo.0.as_str()),
                AlbumMembership::added_at.eq(now),
            )
        })
        .collect();
    diesel::insert_or_ignore_into(AlbumMembership::table)
        .values(&rows)
        .execute(conn)
        .wrap_err("error inserting into table AlbumMembership")?;
    Ok(())
}

#[instrument(skip(conn))]
pub fn get_memberships_for_album(conn: &mut DbConn, album: AlbumId) -> Result<Vec<AlbumMembership>> {
    use schema::AlbumMembership::dsl::*;
    let rows: Vec<DbAlbumMembership> = AlbumMembership
        .filter(album_id.eq(album.0))
        .order(membership_id.asc())
        .select(DbAlbumMembership::as_select())
        .load(conn)
        .wrap_err("error querying table AlbumMembership")?;
    rows.into_iter()
        .map(|r| r.try_into())
        .collect::<Result<Vec<_>>>()
}
