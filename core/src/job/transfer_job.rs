use std::collections::HashSet;

use camino::Utf8PathBuf as PathBuf;
use eyre::Result;
use tracing::instrument;

use crate::{
    catalog::album_name,
    interact,
    model::repository::{self, db::DbPool},
    processing::tagger::Tagger,
    remote::{RemoteError, RemoteStore},
};

use super::Pacing;

/// Uploads the account's not-yet-backed-up photos, oldest capture first.
/// A photo is marked backed up only after the upload call reported success,
/// never optimistically, so an interrupted run redoes at most the item it was
/// working on.
pub struct TransferJob<'a> {
    params: TransferJobParams,
    pool: DbPool,
    store: &'a dyn RemoteStore,
    tagger: Option<&'a dyn Tagger>,
    pacing: Pacing,
}

#[derive(Debug, Clone)]
pub struct TransferJobParams {
    pub account_name: String,
    pub archive_root: PathBuf,
    pub remote_base_folder: String,
    pub limit: Option<i64>,
    pub dry_run: bool,
    pub organize_by_album: bool,
    pub tag_with_album: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransferJobReport {
    pub synced: usize,
    pub failed: usize,
    pub skipped: usize,
    pub tagged: usize,
}

impl<'a> TransferJob<'a> {
    pub fn new(
        params: TransferJobParams,
        pool: DbPool,
        store: &'a dyn RemoteStore,
        tagger: Option<&'a dyn Tagger>,
        pacing: Pacing,
    ) -> TransferJob<'a> {
        TransferJob {
            params,
            pool,
            store,
            tagger,
            pacing,
        }
    }

    #[instrument(name = "TransferJob", skip(self), fields(account = %self.params.account_name))]
    pub async fn run(self) -> Result<TransferJobReport> {
        let conn = self.pool.get().await?;
        let account = self.params.account_name.clone();
        let limit = self.params.limit;
        let backlog = interact!(conn, move |conn| {
            repository::photo::get_photos_pending_transfer(conn, &account, limit)
        })
        .await??;
        tracing::info!(backlog = backlog.len(), "transferring pending photos");
        let mut report = TransferJobReport::default();
        let mut ensured_folders: HashSet<String> = HashSet::default();
        for photo in &backlog {
            let archive = match photo.as_archive() {
                Some(archive) => archive,
                None => continue,
            };
            let local_path = self.params.archive_root.join(&archive.archive_path);
            let dest_folder = self.destination_folder(archive.album_name.as_deref());

            if self.params.dry_run {
                match tokio::fs::metadata(&local_path).await {
                    Ok(_) => report.synced += 1,
                    Err(_) => {
                        tracing::warn!(%local_path, "local file missing, would skip");
                        report.skipped += 1;
                    }
                }
                continue;
            }

            let bytes = match tokio::fs::read(&local_path).await {
                Ok(bytes) => bytes,
                Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                    tracing::warn!(%local_path, "local file missing, skipping");
                    report.skipped += 1;
                    continue;
                }
                Err(err) => {
                    tracing::error!(%local_path, %err, "error reading local file");
                    report.failed += 1;
                    continue;
                }
            };

            if !ensured_folders.contains(&dest_folder) {
                match self.store.ensure_folder(&dest_folder).await {
                    Ok(()) => {
                        ensured_folders.insert(dest_folder.clone());
                    }
                    Err(err @ RemoteError::Auth(_)) => return Err(err.into()),
                    Err(err) => {
                        tracing::error!(%dest_folder, %err, "error creating destination folder");
                        report.failed += 1;
                        self.pacing.after_upload().await;
                        continue;
                    }
                }
            }

            match self
                .store
                .upload(&dest_folder, &photo.base.file_name, bytes)
                .await
            {
                Ok(()) => {
                    let remote_path = format!("{}/{}", dest_folder, photo.base.file_name);
                    let id = photo.base.id.clone();
                    let mark_result = interact!(conn, move |conn| {
                        repository::photo::mark_backed_up(conn, &id, &remote_path)
                    })
                    .await?;
                    match mark_result {
                        Ok(()) => report.synced += 1,
                        Err(err) => {
                            // uploaded but not recorded: the backlog query
                            // reconsiders the item next run
                            tracing::error!(photo = %photo.base.id, %err, "error marking photo backed up");
                            report.failed += 1;
                            self.pacing.after_upload().await;
                            continue;
                        }
                    }
                }
                Err(err @ RemoteError::Auth(_)) => return Err(err.into()),
                Err(err) => {
                    tracing::error!(photo = %photo.base.id, %err, "upload failed");
                    report.failed += 1;
                    self.pacing.after_upload().await;
                    continue;
                }
            }

            if self.params.tag_with_album {
                if let (Some(tagger), Some(album)) = (self.tagger, archive.album_name.as_deref())
                {
                    // best effort, a failure here never reverts the
                    // backed-up flag
                    match tagger.tag_album(&local_path, album).await {
                        Ok(()) => report.tagged += 1,
                        Err(err) => {
                            tracing::warn!(photo = %photo.base.id, %err, "could not tag file with album");
                        }
                    }
                }
            }
            self.pacing.after_upload().await;
        }
        Ok(report)
    }

    fn destination_folder(&self, album: Option<&str>) -> String {
        match album {
            Some(album) if self.params.organize_by_album => format!(
                "{}/{}",
                self.params.remote_base_folder,
                album_name::sanitize(album)
            ),
            _ => self.params.remote_base_folder.clone(),
        }
    }
}

#[cfg(test)]
mod test {
    use camino::Utf8Path as Path;
    use claims::assert_ok;

    use super::*;
    use crate::job::testing::{test_pool, FakeRemoteStore};
    use crate::model::repository::test_support::{insert_archive_photo, ArchivePhotoFixture};

    fn params(root: &Path) -> TransferJobParams {
        TransferJobParams {
            account_name: "alice".to_string(),
            archive_root: root.to_owned(),
            remote_base_folder: "Photos".to_string(),
            limit: None,
            dry_run: false,
            organize_by_album: true,
            tag_with_album: false,
        }
    }

    #[tokio::test]
    async fn uploads_and_marks_backed_up_only_on_success() {
        let dir = tempfile::tempdir().unwrap();
        let root = Path::from_path(dir.path()).unwrap();
        std::fs::create_dir_all(root.join("trip")).unwrap();
        std::fs::write(root.join("trip/ok.jpg"), b"ok bytes").unwrap();
        std::fs::write(root.join("trip/broken.jpg"), b"broken bytes").unwrap();

        let pool = test_pool().await;
        let conn = pool.get().await.unwrap();
        conn.interact(|conn| {
            insert_archive_photo(
                conn,
                ArchivePhotoFixture::new("alice", "ok.jpg", "trip/ok.jpg")
                    .album("trip")
                    .taken(2019, 6, 1),
            );
            insert_archive_photo(
                conn,
                ArchivePhotoFixture::new("alice", "broken.jpg", "trip/broken.jpg")
                    .album("trip")
                    .taken(2019, 6, 2),
            );
        })
        .await
        .unwrap();
        drop(conn);

        let store = FakeRemoteStore::default();
        store
            .state
            .lock()
            .unwrap()
            .upload_failures
            .insert("broken.jpg".to_string());

        let job = TransferJob::new(params(root), pool.clone(), &store, None, Pacing::none());
        let report = assert_ok!(job.run().await);
        assert_eq!(report.synced, 1);
        assert_eq!(report.failed, 1);
        assert_eq!(report.skipped, 0);

        let conn = pool.get().await.unwrap();
        let backlog = conn
            .interact(|conn| {
                repository::photo::get_photos_pending_transfer(conn, "alice", None).unwrap()
            })
            .await
            .unwrap();
        // the failed upload stays in the backlog for the next run
        assert_eq!(backlog.len(), 1);
        assert_eq!(backlog[0].base.file_name, "broken.jpg");

        let uploads = store.state.lock().unwrap().uploads.clone();
        assert_eq!(uploads.len(), 2);
        assert_eq!(uploads[0].0, "Photos/trip");
    }

    #[tokio::test]
    async fn missing_local_file_is_skipped_not_failed() {
        let dir = tempfile::tempdir().unwrap();
        let root = Path::from_path(dir.path()).unwrap();

        let pool = test_pool().await;
        let conn = pool.get().await.unwrap();
        conn.interact(|conn| {
            insert_archive_photo(
                conn,
                ArchivePhotoFixture::new("alice", "gone.jpg", "gone.jpg").taken(2019, 1, 1),
            );
        })
        .await
        .unwrap();
        drop(conn);

        let store = FakeRemoteStore::default();
        let job = TransferJob::new(params(root), pool, &store, None, Pacing::none());
        let report = assert_ok!(job.run().await);
        assert_eq!(report.skipped, 1);
        assert_eq!(report.synced, 0);
        assert_eq!(report.failed, 0);
        assert!(store.state.lock().unwrap().uploads.is_empty());
    }

    #[tokio::test]
    async fn dry_run_uploads_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let root = Path::from_path(dir.path()).unwrap();
        std::fs::write(root.join("a.jpg"), b"bytes").unwrap();

        let pool = test_pool().await;
        let conn = pool.get().await.unwrap();
        conn.interact(|conn| {
            insert_archive_photo(
                conn,
                ArchivePhotoFixture::new("alice", "a.jpg", "a.jpg").taken(2019, 1, 1),
            );
        })
        .await
        .unwrap();
        drop(conn);

        let store = FakeRemoteStore::default();
        let mut p = params(root);
        p.dry_run = true;
        let job = TransferJob::new(p, pool.clone(), &store, None, Pacing::none());
        let report = assert_ok!(job.run().await);
        assert_eq!(report.synced, 1);
        assert!(store.state.lock().unwrap().uploads.is_empty());

        let conn = pool.get().await.unwrap();
        let backlog = conn
            .interact(|conn| {
                repository::photo::get_photos_pending_transfer(conn, "alice", None).unwrap()
            })
            .await
            .unwrap();
        assert_eq!(backlog.len(), 1);
    }
}
