use camino::Utf8PathBuf as PathBuf;
use eyre::Result;
use tracing::instrument;

use crate::{
    catalog::identity::{self, BatchIndex, Classification, RemoteIndex},
    interact,
    model::{
        repository::{self, db::DbPool},
        CreatePhoto, CreatePhotoSpe,
    },
    scan::archive::{self, ScannedPhoto},
};

pub struct ImportJob {
    params: ImportJobParams,
    pool: DbPool,
}

#[derive(Debug, Clone)]
pub struct ImportJobParams {
    pub account_name: String,
    pub archive_root: PathBuf,
    /// Stop after this many newly imported photos
    pub limit: Option<usize>,
    pub dry_run: bool,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ImportJobReport {
    pub imported: usize,
    /// Already in the catalog from an earlier import, rescan timestamp
    /// refreshed
    pub refreshed: usize,
    pub duplicate_remote: usize,
    pub duplicate_batch: usize,
    pub skipped: usize,
}

impl ImportJob {
    pub fn new(params: ImportJobParams, pool: DbPool) -> ImportJob {
        ImportJob { params, pool }
    }

    #[instrument(name = "ImportJob", skip(self), fields(account = %self.params.account_name))]
    pub async fn run(self) -> Result<ImportJobReport> {
        let conn = self.pool.get().await?;
        let account = self.params.account_name.clone();
        let remote_photos = interact!(conn, move |conn| {
            repository::photo::get_remote_photos(conn, &account)
        })
        .await??;
        let remote_index = RemoteIndex::build(&remote_photos);
        let mut batch = BatchIndex::default();
        let mut report = ImportJobReport::default();

        let files = archive::collect_media_files(&self.params.archive_root)?;
        tracing::info!(files = files.len(), "scanning archive export");
        for path in &files {
            if let Some(limit) = self.params.limit {
                if report.imported >= limit {
                    break;
                }
            }
            let scanned = match archive::read_scanned_photo(&self.params.archive_root, path).await
            {
                Ok(scanned) => scanned,
                Err(err) => {
                    tracing::warn!(%path, %err, "skipping unreadable file");
                    report.skipped += 1;
                    continue;
                }
            };
            let fingerprint = scanned.fingerprint();
            match identity::classify(&remote_index, &batch, &fingerprint) {
                Classification::DuplicateInBatch => {
                    tracing::debug!(photo = %scanned.archive_path, "duplicate within this scan");
                    report.duplicate_batch += 1;
                }
                Classification::DuplicateInRemote { existing } => {
                    tracing::debug!(photo = %scanned.archive_path, %existing, "already in remote store");
                    // recorded as already satisfied so removal reporting works
                    // without ever transferring the file
                    if !self.params.dry_run {
                        let create = create_photo_record(&self.params.account_name, &scanned, true);
                        interact!(conn, move |conn| {
                            repository::photo::insert_or_refresh_photo(conn, &create)
                        })
                        .await??;
                    }
                    batch.accept(&fingerprint);
                    report.duplicate_remote += 1;
                }
                Classification::New => {
                    let create = create_photo_record(&self.params.account_name, &scanned, false);
                    let lookup_id = create.id()?;
                    let existing = interact!(conn, move |conn| {
                        repository::photo::get_photo(conn, &lookup_id)
                    })
                    .await??;
                    if !self.params.dry_run {
                        interact!(conn, move |conn| {
                            repository::photo::insert_or_refresh_photo(conn, &create)
                        })
                        .await??;
                    }
                    batch.accept(&fingerprint);
                    if existing.is_some() {
                        report.refreshed += 1;
                    } else {
                        report.imported += 1;
                    }
                }
            }
        }
        Ok(report)
    }
}

fn create_photo_record(
    account_name: &str,
    scanned: &ScannedPhoto,
    already_in_remote: bool,
) -> CreatePhoto {
    CreatePhoto {
        account_name: account_name.to_string(),
        file_name: scanned.file_name.clone(),
        taken_date: scanned.taken_date,
        file_size: scanned.file_size,
        content_hash: Some(scanned.content_hash.clone()),
        spe: CreatePhotoSpe::Archive {
            archive_path: scanned.archive_path.clone(),
            album_name: scanned.album_name.clone(),
            is_backed_up: already_in_remote,
            can_be_removed: already_in_remote,
        },
    }
}

#[cfg(test)]
mod test {
    use camino::Utf8Path as Path;
    use claims::assert_ok;

    use super::*;
    use crate::job::testing::test_pool;
    use crate::model::repository::test_support::insert_remote_photo;
    use crate::processing::hash::hash_bytes;

    fn params(root: &Path) -> ImportJobParams {
        ImportJobParams {
            account_name: "alice".to_string(),
            archive_root: root.to_owned(),
            limit: None,
            dry_run: false,
        }
    }

    #[tokio::test]
    async fn identical_copy_in_scan_is_one_new_one_batch_duplicate() {
        let dir = tempfile::tempdir().unwrap();
        let root = Path::from_path(dir.path()).unwrap();
        std::fs::create_dir_all(root.join("trip")).unwrap();
        std::fs::write(root.join("IMG1.jpg"), b"same bytes").unwrap();
        std::fs::write(root.join("trip/IMG1.jpg"), b"same bytes").unwrap();

        let pool = test_pool().await;
        let report = assert_ok!(ImportJob::new(params(root), pool.clone()).run().await);
        assert_eq!(report.imported, 1);
        assert_eq!(report.duplicate_batch, 1);
        assert_eq!(report.duplicate_remote, 0);

        let conn = pool.get().await.unwrap();
        let counts = conn
            .interact(|conn| repository::photo::get_catalog_counts(conn, "alice").unwrap())
            .await
            .unwrap();
        assert_eq!(counts.archive_photos, 1);
        assert_eq!(counts.pending_transfer, 1);
    }

    #[tokio::test]
    async fn importing_the_same_archive_twice_creates_no_duplicate_rows() {
        let dir = tempfile::tempdir().unwrap();
        let root = Path::from_path(dir.path()).unwrap();
        std::fs::create_dir_all(root.join("Sommer 2019")).unwrap();
        std::fs::write(root.join("Sommer 2019/a.jpg"), b"aaa").unwrap();
        std::fs::write(root.join("Sommer 2019/b.jpg"), b"bbb").unwrap();

        let pool = test_pool().await;
        let first = assert_ok!(ImportJob::new(params(root), pool.clone()).run().await);
        assert_eq!(first.imported, 2);

        let second = assert_ok!(ImportJob::new(params(root), pool.clone()).run().await);
        assert_eq!(second.imported, 0);
        assert_eq!(second.refreshed, 2);

        let conn = pool.get().await.unwrap();
        let counts = conn
            .interact(|conn| repository::photo::get_catalog_counts(conn, "alice").unwrap())
            .await
            .unwrap();
        assert_eq!(counts.archive_photos, 2);
    }

    #[tokio::test]
    async fn remote_duplicate_is_recorded_as_already_satisfied() {
        let dir = tempfile::tempdir().unwrap();
        let root = Path::from_path(dir.path()).unwrap();
        std::fs::write(root.join("IMG_7.jpg"), b"remote content").unwrap();

        let pool = test_pool().await;
        let conn = pool.get().await.unwrap();
        let hash = hash_bytes(b"remote content");
        conn.interact(move |conn| {
            insert_remote_photo(conn, "alice", "other_name.jpg", "r-7", Some(&hash), (2018, 5, 5));
        })
        .await
        .unwrap();
        drop(conn);

        let report = assert_ok!(ImportJob::new(params(root), pool.clone()).run().await);
        assert_eq!(report.imported, 0);
        assert_eq!(report.duplicate_remote, 1);

        let conn = pool.get().await.unwrap();
        let candidates = conn
            .interact(|conn| repository::photo::get_removal_candidates(conn, "alice").unwrap())
            .await
            .unwrap();
        // safe to delete from the source without ever transferring it
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].base.file_name, "IMG_7.jpg");
        let archive = candidates[0].as_archive().unwrap();
        assert!(archive.is_backed_up);
        assert!(archive.can_be_removed);
    }

    #[tokio::test]
    async fn dry_run_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let root = Path::from_path(dir.path()).unwrap();
        std::fs::write(root.join("a.jpg"), b"aaa").unwrap();

        let pool = test_pool().await;
        let mut p = params(root);
        p.dry_run = true;
        let report = assert_ok!(ImportJob::new(p, pool.clone()).run().await);
        assert_eq!(report.imported, 1);

        let conn = pool.get().await.unwrap();
        let counts = conn
            .interact(|conn| repository::photo::get_catalog_counts(conn, "alice").unwrap())
            .await
            .unwrap();
        assert_eq!(counts.archive_photos, 0);
    }
}
