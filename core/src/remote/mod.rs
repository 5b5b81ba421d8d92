pub mod client;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use client::{RemoteClient, RemoteSession};

/// One photo as listed by the remote store's folder listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFolderPhoto {
    pub remote_photo_id: String,
    pub file_name: String,
    pub file_size: i64,
    /// md5 hex digest as computed by the service, missing for some formats
    pub content_hash: Option<String>,
    pub taken_date: DateTime<Utc>,
    /// folder the photo lives in
    pub folder_path: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteAlbum {
    pub remote_album_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchMatch {
    pub remote_photo_id: String,
    pub file_name: String,
}

#[derive(Debug, thiserror::Error)]
pub enum RemoteError {
    /// Expected condition, callers skip and move on
    #[error("not found")]
    NotFound,
    /// Create raced with an existing name, callers re-fetch by name
    #[error("already exists")]
    AlreadyExists,
    /// Fatal for the account being processed
    #[error("authentication failed: {0}")]
    Auth(String),
    #[error("api error (status {status}): {message}")]
    Api { status: u16, message: String },
    #[error("transport error")]
    Transport(#[from] reqwest::Error),
}

/// Operations of the remote photo service. Implemented by an authenticated
/// [`RemoteSession`], and by scripted fakes in job tests. Obtaining an
/// implementation already proves a valid session, there is no unauthenticated
/// call to guard against.
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Direct subfolders of `path`
    async fn list_folders(&self, path: &str) -> Result<Vec<String>, RemoteError>;

    /// All photos in the folder at `path`, paging through the listing
    async fn list_folder_photos(&self, path: &str)
        -> Result<Vec<RemoteFolderPhoto>, RemoteError>;

    /// Create the folder at `path` if it does not exist yet
    async fn ensure_folder(&self, path: &str) -> Result<(), RemoteError>;

    async fn upload(
        &self,
        folder_path: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<(), RemoteError>;

    async fn list_albums(&self) -> Result<Vec<RemoteAlbum>, RemoteError>;

    /// Fails with [`RemoteError::AlreadyExists`] if an album of that name
    /// exists
    async fn create_album(&self, name: &str) -> Result<RemoteAlbum, RemoteError>;

    /// File name search over the whole store. The result window is bounded,
    /// common file names can yield more matches remotely than returned here.
    async fn search_by_file_name(&self, file_name: &str)
        -> Result<Vec<SearchMatch>, RemoteError>;

    /// Add photos to an album, one remote call per invocation. The call is
    /// atomic on the service side: either all ids are added or none.
    async fn add_photos_to_album(
        &self,
        remote_album_id: &str,
        remote_photo_ids: &[String],
    ) -> Result<(), RemoteError>;

    async fn logout(&self) -> Result<(), RemoteError>;
}
