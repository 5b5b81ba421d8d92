use claims::{assert_none, assert_ok, assert_some};
use pretty_assertions::assert_eq;

use super::test_conn;
use crate::model::repository::{
    album,
    test_support::{insert_archive_photo, ArchivePhotoFixture},
};

#[test]
fn get_or_create_is_idempotent_per_account() {
    let mut conn = test_conn();
    let first = assert_ok!(album::get_or_create_album(&mut conn, "alice", "trip"));
    let second = assert_ok!(album::get_or_create_album(&mut conn, "alice", "trip"));
    assert_eq!(first.id, second.id);
    assert_eq!(second.name, "trip");
    assert_none!(second.remote_album_id.as_deref());

    // same name under another account is a different album
    let other = assert_ok!(album::get_or_create_album(&mut conn, "bob", "trip"));
    assert_ne!(other.id, first.id);

    let albums = assert_ok!(album::get_albums_for_account(&mut conn, "alice"));
    assert_eq!(albums.len(), 1);
}

#[test]
fn remote_album_id_and_sync_time_are_recorded() {
    let mut conn = test_conn();
    let album_row = assert_ok!(album::get_or_create_album(&mut conn, "alice", "trip"));
    assert_ok!(album::set_remote_album_id(&mut conn, album_row.id, "ralbum-1"));
    assert_ok!(album::mark_album_synced(&mut conn, album_row.id));

    let reloaded = assert_some!(assert_ok!(album::get_album_by_name(
        &mut conn, "alice", "trip"
    )));
    assert_eq!(reloaded.remote_album_id.as_deref(), Some("ralbum-1"));
    assert_some!(reloaded.last_synced_at);
}

#[test]
fn memberships_are_unique_per_album_and_photo() {
    let mut conn = test_conn();
    let photo_a = insert_archive_photo(
        &mut conn,
        ArchivePhotoFixture::new("alice", "a.jpg", "trip/a.jpg").album("trip"),
    );
    let photo_b = insert_archive_photo(
        &mut conn,
        ArchivePhotoFixture::new("alice", "b.jpg", "trip/b.jpg").album("trip"),
    );
    let album_row = assert_ok!(album::get_or_create_album(&mut conn, "alice", "trip"));

    assert_ok!(album::add_memberships(
        &mut conn,
        album_row.id,
        &[photo_a.clone(), photo_b.clone()]
    ));
    // recording the same chunk again is a no-op
    assert_ok!(album::add_memberships(
        &mut conn,
        album_row.id,
        &[photo_a.clone()]
    ));

    let memberships = assert_ok!(album::get_memberships_for_album(&mut conn, album_row.id));
    assert_eq!(memberships.len(), 2);
    assert_eq!(memberships[0].photo_id, photo_a);
    assert_eq!(memberships[1].photo_id, photo_b);
}

#[test]
fn empty_chunk_is_a_no_op() {
    let mut conn = test_conn();
    let album_row = assert_ok!(album::get_or_create_album(&mut conn, "alice", "trip"));
    assert_ok!(album::add_memberships(&mut conn, album_row.id, &[]));
    let memberships = assert_ok!(album::get_memberships_for_album(&mut conn, album_row.id));
    assert_eq!(memberships.len(), 0);
}
