use eyre::Result;
use tracing::instrument;

use crate::{
    interact,
    model::{
        repository::{self, db::DbPool},
        CreatePhoto, CreatePhotoSpe,
    },
    remote::{RemoteError, RemoteStore},
};

/// Walks the remote store's folder tree and records every photo it finds in
/// the catalog, so the identity resolver has a complete remote inventory to
/// match against.
pub struct RemoteScanJob<'a> {
    params: RemoteScanJobParams,
    pool: DbPool,
    store: &'a dyn RemoteStore,
}

#[derive(Debug, Clone)]
pub struct RemoteScanJobParams {
    pub account_name: String,
    pub base_folder: String,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RemoteScanJobReport {
    pub indexed: usize,
    pub folders: usize,
    pub errors: usize,
}

impl<'a> RemoteScanJob<'a> {
    pub fn new(
        params: RemoteScanJobParams,
        pool: DbPool,
        store: &'a dyn RemoteStore,
    ) -> RemoteScanJob<'a> {
        RemoteScanJob {
            params,
            pool,
            store,
        }
    }

    #[instrument(name = "RemoteScanJob", skip(self), fields(account = %self.params.account_name))]
    pub async fn run(self) -> Result<RemoteScanJobReport> {
        let mut report = RemoteScanJobReport::default();
        let conn = self.pool.get().await?;
        let mut pending: Vec<String> = vec![self.params.base_folder.clone()];
        while let Some(folder) = pending.pop() {
            report.folders += 1;
            match self.store.list_folders(&folder).await {
                Ok(subfolders) => pending.extend(subfolders),
                Err(RemoteError::NotFound) => {
                    tracing::debug!(%folder, "folder disappeared while scanning");
                    continue;
                }
                Err(err @ RemoteError::Auth(_)) => return Err(err.into()),
                Err(err) => {
                    tracing::error!(%folder, %err, "error listing subfolders");
                    report.errors += 1;
                }
            }
            let photos = match self.store.list_folder_photos(&folder).await {
                Ok(photos) => photos,
                Err(RemoteError::NotFound) => continue,
                Err(err @ RemoteError::Auth(_)) => return Err(err.into()),
                Err(err) => {
                    tracing::error!(%folder, %err, "error listing folder photos");
                    report.errors += 1;
                    continue;
                }
            };
            for remote_photo in photos {
                let create = CreatePhoto {
                    account_name: self.params.account_name.clone(),
                    file_name: remote_photo.file_name,
                    taken_date: remote_photo.taken_date,
                    file_size: remote_photo.file_size,
                    content_hash: remote_photo.content_hash,
                    spe: CreatePhotoSpe::Remote {
                        remote_path: remote_photo.folder_path,
                        remote_photo_id: remote_photo.remote_photo_id,
                    },
                };
                let insert_result = interact!(conn, move |conn| {
                    repository::photo::insert_or_refresh_photo(conn, &create)
                })
                .await?;
                match insert_result {
                    Ok(_) => report.indexed += 1,
                    Err(err) => {
                        tracing::error!(%err, "error recording remote photo");
                        report.errors += 1;
                    }
                }
            }
        }
        Ok(report)
    }
}
