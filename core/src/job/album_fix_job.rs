use std::collections::BTreeMap;

use eyre::Result;
use itertools::Itertools;
use tracing::instrument;

use crate::{
    interact,
    model::{
        repository::{self, db::DbPool},
        Photo, PhotoId,
    },
    remote::{RemoteError, RemoteStore},
};

use super::Pacing;

/// Identifier discovery fan-out never exceeds this, whatever the caller asks
/// for
pub const MAX_LOOKUP_CONCURRENCY: usize = 8;
/// Album adds are chunked to bound request size
pub const DEFAULT_MEMBERSHIP_CHUNK_SIZE: usize = 500;

/// Retroactively aligns remote album membership with the albums inferred at
/// import. Runs in two phases over backlogs re-derived from the catalog, so
/// an interrupted or failed run leaves nothing to clean up: the next
/// invocation picks up every unfinished item again.
///
/// Phase 1 discovers the remote store's identifier for backed-up photos via
/// file name search, which only works once the store has indexed the upload.
/// Phase 2 groups photos by album and adds their identifiers to the remote
/// album in bounded chunks.
pub struct AlbumFixJob<'a> {
    params: AlbumFixJobParams,
    pool: DbPool,
    store: &'a dyn RemoteStore,
    pacing: Pacing,
}

#[derive(Debug, Clone)]
pub struct AlbumFixJobParams {
    pub account_name: String,
    pub dry_run: bool,
    /// clamped to 1..=[`MAX_LOOKUP_CONCURRENCY`]
    pub lookup_concurrency: usize,
    pub membership_chunk_size: usize,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct AlbumFixJobReport {
    pub ids_found: usize,
    pub ids_skipped: usize,
    pub id_errors: usize,
    pub albums_created: usize,
    pub memberships_added: usize,
    pub membership_errors: usize,
}

enum LookupOutcome {
    Found(String),
    /// No confirmed unique match. Not an error: the item may have been
    /// deleted remotely, or the name is too common to disambiguate.
    Skipped,
    Failed(eyre::Report),
    /// Session died, abort the account
    Fatal(RemoteError),
}

impl<'a> AlbumFixJob<'a> {
    pub fn new(
        params: AlbumFixJobParams,
        pool: DbPool,
        store: &'a dyn RemoteStore,
        pacing: Pacing,
    ) -> AlbumFixJob<'a> {
        AlbumFixJob {
            params,
            pool,
            store,
            pacing,
        }
    }

    #[instrument(name = "AlbumFixJob", skip(self), fields(account = %self.params.account_name))]
    pub async fn run(self) -> Result<AlbumFixJobReport> {
        let mut report = AlbumFixJobReport::default();
        self.discover_remote_ids(&mut report).await?;
        self.reconcile_memberships(&mut report).await?;
        Ok(report)
    }

    /// Phase 1: find the remote identifier for every backed-up photo that has
    /// an album but no identifier yet. Lookups run in batches of the clamped
    /// concurrency factor, waiting for the whole batch before advancing.
    async fn discover_remote_ids(&self, report: &mut AlbumFixJobReport) -> Result<()> {
        let conn = self.pool.get().await?;
        let account = self.params.account_name.clone();
        let backlog = interact!(conn, move |conn| {
            repository::photo::get_photos_needing_remote_id(conn, &account)
        })
        .await??;
        if backlog.is_empty() {
            return Ok(());
        }
        let concurrency = self.params.lookup_concurrency.clamp(1, MAX_LOOKUP_CONCURRENCY);
        tracing::info!(
            backlog = backlog.len(),
            concurrency,
            "discovering remote photo ids"
        );
        let mut batches = backlog.chunks(concurrency).peekable();
        while let Some(batch) = batches.next() {
            let lookups = batch.iter().map(|photo| self.lookup_one(photo));
            let outcomes = futures::future::join_all(lookups).await;
            for (photo, outcome) in batch.iter().zip(outcomes) {
                match outcome {
                    LookupOutcome::Found(remote_id) => {
                        if !self.params.dry_run {
                            let id = photo.base.id.clone();
                            let remote_id = remote_id.clone();
                            let store_result = interact!(conn, move |conn| {
                                repository::photo::set_remote_photo_id(conn, &id, &remote_id)
                            })
                            .await?;
                            if let Err(err) = store_result {
                                tracing::error!(photo = %photo.base.id, %err, "error storing remote photo id");
                                report.id_errors += 1;
                                continue;
                            }
                        }
                        report.ids_found += 1;
                    }
                    LookupOutcome::Skipped => report.ids_skipped += 1,
                    LookupOutcome::Failed(err) => {
                        tracing::error!(photo = %photo.base.id, %err, "remote id lookup failed");
                        report.id_errors += 1;
                    }
                    LookupOutcome::Fatal(err) => return Err(err.into()),
                }
            }
            if batches.peek().is_some() {
                self.pacing.after_lookup_batch().await;
            }
        }
        Ok(())
    }

    async fn lookup_one(&self, photo: &Photo) -> LookupOutcome {
        let matches = match self.store.search_by_file_name(&photo.base.file_name).await {
            Ok(matches) => matches,
            Err(RemoteError::NotFound) => return LookupOutcome::Skipped,
            Err(err @ RemoteError::Auth(_)) => return LookupOutcome::Fatal(err),
            Err(err) => return LookupOutcome::Failed(err.into()),
        };
        let exact: Vec<_> = matches
            .iter()
            .filter(|m| m.file_name.eq_ignore_ascii_case(&photo.base.file_name))
            .collect();
        match exact.as_slice() {
            [] => {
                tracing::debug!(photo = %photo.base.id, "no remote match, possibly deleted remotely");
                LookupOutcome::Skipped
            }
            [only] => LookupOutcome::Found(only.remote_photo_id.clone()),
            _ => {
                tracing::debug!(
                    photo = %photo.base.id,
                    matches = exact.len(),
                    "ambiguous search result, can not confirm identifier"
                );
                LookupOutcome::Skipped
            }
        }
    }

    /// Phase 2: group photos that have an identifier and an album but no
    /// recorded membership, then reconcile album by album. A failed chunk
    /// takes the rest of its album with it (counted, not retried now), other
    /// albums still proceed.
    async fn reconcile_memberships(&self, report: &mut AlbumFixJobReport) -> Result<()> {
        let conn = self.pool.get().await?;
        let account = self.params.account_name.clone();
        let backlog = interact!(conn, move |conn| {
            repository::photo::get_photos_needing_album_sync(conn, &account)
        })
        .await??;
        if backlog.is_empty() {
            return Ok(());
        }
        let chunk_size = self.params.membership_chunk_size.max(1);
        // album name order makes repeated runs walk albums the same way
        let by_album: BTreeMap<String, Vec<Photo>> = backlog
            .into_iter()
            .filter_map(|photo| {
                photo
                    .as_archive()
                    .and_then(|archive| archive.album_name.clone())
                    .map(|album| (album, photo))
            })
            .into_group_map()
            .into_iter()
            .collect();
        tracing::info!(albums = by_album.len(), "reconciling album membership");
        // remote album listing, fetched at most once per run
        let mut listed_albums: Option<Vec<crate::remote::RemoteAlbum>> = None;

        for (album_name, photos) in by_album {
            if self.params.dry_run {
                for chunk in photos.chunks(chunk_size) {
                    report.memberships_added += chunk.len();
                }
                continue;
            }
            let (local_album_id, remote_album_id) = match self
                .resolve_remote_album(&conn, &album_name, &mut listed_albums, report)
                .await?
            {
                Some(ids) => ids,
                None => {
                    report.membership_errors += photos.len();
                    continue;
                }
            };

            let chunks: Vec<&[Photo]> = photos.chunks(chunk_size).collect();
            let mut chunks_done = 0usize;
            for (index, chunk) in chunks.iter().enumerate() {
                let ids: Vec<String> = chunk
                    .iter()
                    .filter_map(|p| p.as_archive().and_then(|a| a.remote_photo_id.clone()))
                    .collect();
                match self.store.add_photos_to_album(&remote_album_id, &ids).await {
                    Ok(()) => {
                        let photo_ids: Vec<PhotoId> =
                            chunk.iter().map(|p| p.base.id.clone()).collect();
                        let record_result = interact!(conn, move |conn| {
                            repository::album::add_memberships(conn, local_album_id, &photo_ids)
                        })
                        .await?;
                        match record_result {
                            Ok(()) => report.memberships_added += chunk.len(),
                            Err(err) => {
                                // added remotely but not recorded, the next
                                // run re-adds which the service tolerates
                                tracing::error!(%album_name, %err, "error recording memberships");
                                report.membership_errors += chunk.len();
                            }
                        }
                        chunks_done += 1;
                    }
                    Err(err @ RemoteError::Auth(_)) => return Err(err.into()),
                    Err(err) => {
                        // the remote call is all-or-nothing, so nothing from
                        // this chunk is recorded; the album's remaining
                        // chunks are abandoned for this run
                        let remaining: usize =
                            chunks[index..].iter().map(|c| c.len()).sum();
                        tracing::error!(%album_name, %err, remaining, "album chunk failed");
                        report.membership_errors += remaining;
                        break;
                    }
                }
                if index + 1 < chunks.len() {
                    self.pacing.after_album_chunk().await;
                }
            }
            if chunks_done == chunks.len() {
                let sync_result = interact!(conn, move |conn| {
                    repository::album::mark_album_synced(conn, local_album_id)
                })
                .await?;
                if let Err(err) = sync_result {
                    tracing::warn!(%album_name, %err, "error updating album sync time");
                }
            }
        }
        Ok(())
    }

    /// Get or create the remote album for `album_name`, caching nothing
    /// beyond the catalog row and the one remote listing. A create that loses
    /// against an album that already exists remotely is resolved by
    /// re-fetching the listing, not treated as a failure.
    async fn resolve_remote_album(
        &self,
        conn: &deadpool_diesel::sqlite::Object,
        album_name: &str,
        listed_albums: &mut Option<Vec<crate::remote::RemoteAlbum>>,
        report: &mut AlbumFixJobReport,
    ) -> Result<Option<(crate::model::AlbumId, String)>> {
        let account = self.params.account_name.clone();
        let name = album_name.to_string();
        let local_album = interact!(conn, move |conn| {
            repository::album::get_or_create_album(conn, &account, &name)
        })
        .await??;
        if let Some(remote_id) = &local_album.remote_album_id {
            return Ok(Some((local_album.id, remote_id.clone())));
        }
        let remote_id = match self.store.create_album(album_name).await {
            Ok(remote_album) => {
                report.albums_created += 1;
                remote_album.remote_album_id
            }
            Err(RemoteError::AlreadyExists) => {
                // concurrent or earlier creation, re-fetch by name
                if listed_albums.is_none() {
                    *listed_albums = Some(self.store.list_albums().await?);
                }
                let listing = listed_albums.as_ref().expect("just filled");
                match listing.iter().find(|a| a.name == album_name) {
                    Some(remote_album) => remote_album.remote_album_id.clone(),
                    None => {
                        tracing::error!(
                            %album_name,
                            "album reported as existing but not present in listing"
                        );
                        return Ok(None);
                    }
                }
            }
            Err(err @ RemoteError::Auth(_)) => return Err(err.into()),
            Err(err) => {
                tracing::error!(%album_name, %err, "error creating remote album");
                return Ok(None);
            }
        };
        let album_id = local_album.id;
        let remote_id_for_db = remote_id.clone();
        interact!(conn, move |conn| {
            repository::album::set_remote_album_id(conn, album_id, &remote_id_for_db)
        })
        .await??;
        Ok(Some((album_id, remote_id)))
    }
}

#[cfg(test)]
mod test {
    use claims::assert_ok;

    use super::*;
    use crate::job::testing::{test_pool, FakeRemoteStore};
    use crate::model::repository::test_support::{insert_archive_photo, ArchivePhotoFixture};
    use crate::remote::SearchMatch;

    fn params() -> AlbumFixJobParams {
        AlbumFixJobParams {
            account_name: "alice".to_string(),
            dry_run: false,
            lookup_concurrency: 4,
            membership_chunk_size: DEFAULT_MEMBERSHIP_CHUNK_SIZE,
        }
    }

    async fn insert_big_album(pool: &crate::model::repository::db::DbPool) {
        let conn = pool.get().await.unwrap();
        conn.interact(|conn| {
            for i in 0..1200 {
                insert_archive_photo(
                    conn,
                    ArchivePhotoFixture::new(
                        "alice",
                        &format!("IMG_{:04}.jpg", i),
                        &format!("big/IMG_{:04}.jpg", i),
                    )
                    .album("big")
                    .with_remote_id(&format!("rp-{}", i)),
                );
            }
        })
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn twelve_hundred_ids_chunk_into_three_calls() {
        let pool = test_pool().await;
        insert_big_album(&pool).await;

        let store = FakeRemoteStore::default();
        let job = AlbumFixJob::new(params(), pool.clone(), &store, Pacing::none());
        let report = assert_ok!(job.run().await);

        let state = store.state.lock().unwrap();
        assert_eq!(
            state.add_calls.iter().map(|(_, n)| *n).collect::<Vec<_>>(),
            vec![500, 500, 200]
        );
        assert_eq!(report.memberships_added, 1200);
        assert_eq!(report.membership_errors, 0);
    }

    #[tokio::test]
    async fn chunk_failure_records_only_the_chunks_before_it() {
        let pool = test_pool().await;
        insert_big_album(&pool).await;

        let store = FakeRemoteStore::default();
        // the second call fails, the album's third chunk is abandoned
        store.state.lock().unwrap().failing_add_calls.insert(1);

        let job = AlbumFixJob::new(params(), pool.clone(), &store, Pacing::none());
        let report = assert_ok!(job.run().await);

        let state = store.state.lock().unwrap();
        assert_eq!(
            state.add_calls.iter().map(|(_, n)| *n).collect::<Vec<_>>(),
            vec![500, 500]
        );
        assert_eq!(report.memberships_added, 500);
        assert_eq!(report.membership_errors, 700);
        drop(state);

        let conn = pool.get().await.unwrap();
        let recorded = conn
            .interact(|conn| {
                let album = repository::album::get_album_by_name(conn, "alice", "big")
                    .unwrap()
                    .unwrap();
                repository::album::get_memberships_for_album(conn, album.id).unwrap()
            })
            .await
            .unwrap();
        assert_eq!(recorded.len(), 500);
    }

    #[tokio::test]
    async fn second_run_with_unchanged_remote_state_adds_nothing() {
        let pool = test_pool().await;
        let conn = pool.get().await.unwrap();
        conn.interact(|conn| {
            // needs phase 2 only
            insert_archive_photo(
                conn,
                ArchivePhotoFixture::new("alice", "a.jpg", "trip/a.jpg")
                    .album("trip")
                    .with_remote_id("rp-a"),
            );
            // needs phase 1, then phase 2 in the same run
            insert_archive_photo(
                conn,
                ArchivePhotoFixture::new("alice", "b.jpg", "trip/b.jpg")
                    .album("trip")
                    .backed_up(),
            );
        })
        .await
        .unwrap();
        drop(conn);

        let store = FakeRemoteStore::default();
        store.state.lock().unwrap().search_results.insert(
            "b.jpg".to_string(),
            vec![SearchMatch {
                remote_photo_id: "rp-b".to_string(),
                file_name: "b.jpg".to_string(),
            }],
        );

        let first = assert_ok!(
            AlbumFixJob::new(params(), pool.clone(), &store, Pacing::none())
                .run()
                .await
        );
        assert_eq!(first.ids_found, 1);
        assert_eq!(first.memberships_added, 2);
        assert_eq!(first.albums_created, 1);
        let calls_after_first = store.state.lock().unwrap().add_calls.len();

        let second = assert_ok!(
            AlbumFixJob::new(params(), pool.clone(), &store, Pacing::none())
                .run()
                .await
        );
        assert_eq!(second.ids_found, 0);
        assert_eq!(second.memberships_added, 0);
        assert_eq!(second.membership_errors, 0);
        assert_eq!(store.state.lock().unwrap().add_calls.len(), calls_after_first);
    }

    #[tokio::test]
    async fn lookup_outcomes_are_classified() {
        let pool = test_pool().await;
        let conn = pool.get().await.unwrap();
        let found_id = conn
            .interact(|conn| {
                let found = insert_archive_photo(
                    conn,
                    ArchivePhotoFixture::new("alice", "found.jpg", "x/found.jpg")
                        .album("x")
                        .backed_up(),
                );
                insert_archive_photo(
                    conn,
                    ArchivePhotoFixture::new("alice", "missing.jpg", "x/missing.jpg")
                        .album("x")
                        .backed_up(),
                );
                insert_archive_photo(
                    conn,
                    ArchivePhotoFixture::new("alice", "ambig.jpg", "x/ambig.jpg")
                        .album("x")
                        .backed_up(),
                );
                insert_archive_photo(
                    conn,
                    ArchivePhotoFixture::new("alice", "err.jpg", "x/err.jpg")
                        .album("x")
                        .backed_up(),
                );
                found
            })
            .await
            .unwrap();
        drop(conn);

        let store = FakeRemoteStore::default();
        {
            let mut state = store.state.lock().unwrap();
            state.search_results.insert(
                "found.jpg".to_string(),
                vec![
                    SearchMatch {
                        remote_photo_id: "r-found".to_string(),
                        file_name: "FOUND.jpg".to_string(),
                    },
                    // near miss, filtered by the exact name check
                    SearchMatch {
                        remote_photo_id: "r-other".to_string(),
                        file_name: "found(1).jpg".to_string(),
                    },
                ],
            );
            state.search_results.insert(
                "ambig.jpg".to_string(),
                vec![
                    SearchMatch {
                        remote_photo_id: "r-1".to_string(),
                        file_name: "ambig.jpg".to_string(),
                    },
                    SearchMatch {
                        remote_photo_id: "r-2".to_string(),
                        file_name: "ambig.jpg".to_string(),
                    },
                ],
            );
            state.search_errors.insert("err.jpg".to_string());
        }

        let mut p = params();
        // silly values are clamped, not rejected
        p.lookup_concurrency = 100;
        let report = assert_ok!(
            AlbumFixJob::new(p, pool.clone(), &store, Pacing::none())
                .run()
                .await
        );
        assert_eq!(report.ids_found, 1);
        assert_eq!(report.ids_skipped, 2);
        assert_eq!(report.id_errors, 1);

        let conn = pool.get().await.unwrap();
        let stored = conn
            .interact(move |conn| repository::photo::get_photo(conn, &found_id).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            stored.as_archive().unwrap().remote_photo_id.as_deref(),
            Some("r-found")
        );
    }

    #[tokio::test]
    async fn existing_remote_album_is_refetched_not_failed() {
        let pool = test_pool().await;
        let conn = pool.get().await.unwrap();
        conn.interact(|conn| {
            insert_archive_photo(
                conn,
                ArchivePhotoFixture::new("alice", "a.jpg", "trip/a.jpg")
                    .album("trip")
                    .with_remote_id("rp-a"),
            );
        })
        .await
        .unwrap();
        drop(conn);

        let store = FakeRemoteStore::default();
        store.state.lock().unwrap().albums.push(crate::remote::RemoteAlbum {
            remote_album_id: "existing-7".to_string(),
            name: "trip".to_string(),
        });

        let report = assert_ok!(
            AlbumFixJob::new(params(), pool.clone(), &store, Pacing::none())
                .run()
                .await
        );
        assert_eq!(report.albums_created, 0);
        assert_eq!(report.memberships_added, 1);
        assert_eq!(report.membership_errors, 0);
        assert_eq!(
            store.state.lock().unwrap().album_members["existing-7"],
            vec!["rp-a".to_string()]
        );

        let conn = pool.get().await.unwrap();
        let local = conn
            .interact(|conn| {
                repository::album::get_album_by_name(conn, "alice", "trip")
                    .unwrap()
                    .unwrap()
            })
            .await
            .unwrap();
        assert_eq!(local.remote_album_id.as_deref(), Some("existing-7"));
    }

    #[tokio::test]
    async fn dry_run_counts_but_mutates_nothing() {
        let pool = test_pool().await;
        let conn = pool.get().await.unwrap();
        conn.interact(|conn| {
            insert_archive_photo(
                conn,
                ArchivePhotoFixture::new("alice", "a.jpg", "trip/a.jpg")
                    .album("trip")
                    .with_remote_id("rp-a"),
            );
            insert_archive_photo(
                conn,
                ArchivePhotoFixture::new("alice", "b.jpg", "trip/b.jpg")
                    .album("trip")
                    .backed_up(),
            );
        })
        .await
        .unwrap();
        drop(conn);

        let store = FakeRemoteStore::default();
        store.state.lock().unwrap().search_results.insert(
            "b.jpg".to_string(),
            vec![SearchMatch {
                remote_photo_id: "rp-b".to_string(),
                file_name: "b.jpg".to_string(),
            }],
        );

        let mut p = params();
        p.dry_run = true;
        let report = assert_ok!(
            AlbumFixJob::new(p, pool.clone(), &store, Pacing::none())
                .run()
                .await
        );
        assert_eq!(report.ids_found, 1);
        assert_eq!(report.memberships_added, 1);

        let state = store.state.lock().unwrap();
        assert!(state.add_calls.is_empty());
        assert!(state.albums.is_empty());
        drop(state);

        let conn = pool.get().await.unwrap();
        let album = conn
            .interact(|conn| repository::album::get_album_by_name(conn, "alice", "trip").unwrap())
            .await
            .unwrap();
        assert_eq!(album, None);
    }
}
