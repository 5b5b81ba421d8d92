use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::model::repository::db::DbPool;
use crate::remote::{RemoteAlbum, RemoteError, RemoteFolderPhoto, RemoteStore, SearchMatch};

pub async fn test_pool() -> DbPool {
    crate::model::repository::db::open_in_memory_pool_and_migrate().await
}

/// Scripted in-memory remote store. Tests poke the state directly and read
/// back the recorded calls.
#[derive(Default)]
pub struct FakeRemoteStore {
    pub state: Mutex<FakeRemoteState>,
}

#[derive(Default)]
pub struct FakeRemoteState {
    pub subfolders: HashMap<String, Vec<String>>,
    pub folder_photos: HashMap<String, Vec<RemoteFolderPhoto>>,
    pub albums: Vec<RemoteAlbum>,
    pub album_members: HashMap<String, Vec<String>>,
    /// file name -> matches; absent means an empty result
    pub search_results: HashMap<String, Vec<SearchMatch>>,
    /// file names whose search fails with an api error
    pub search_errors: HashSet<String>,
    /// file names whose upload fails with an api error
    pub upload_failures: HashSet<String>,
    /// 0-based indices of add-to-album calls that fail
    pub failing_add_calls: HashSet<usize>,
    pub ensured_folders: Vec<String>,
    /// (folder, file name, byte count) per issued upload call
    pub uploads: Vec<(String, String, usize)>,
    /// (remote album id, chunk size) per issued add-to-album call
    pub add_calls: Vec<(String, usize)>,
    next_album_id: usize,
}

#[async_trait]
impl RemoteStore for FakeRemoteStore {
    async fn list_folders(&self, path: &str) -> Result<Vec<String>, RemoteError> {
        let state = self.state.lock().unwrap();
        Ok(state.subfolders.get(path).cloned().unwrap_or_default())
    }

    async fn list_folder_photos(
        &self,
        path: &str,
    ) -> Result<Vec<RemoteFolderPhoto>, RemoteError> {
        let state = self.state.lock().unwrap();
        Ok(state.folder_photos.get(path).cloned().unwrap_or_default())
    }

    async fn ensure_folder(&self, path: &str) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state.ensured_folders.push(path.to_string());
        Ok(())
    }

    async fn upload(
        &self,
        folder_path: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        state
            .uploads
            .push((folder_path.to_string(), file_name.to_string(), bytes.len()));
        if state.upload_failures.contains(file_name) {
            return Err(RemoteError::Api {
                status: 500,
                message: "upload failed".to_string(),
            });
        }
        Ok(())
    }

    async fn list_albums(&self) -> Result<Vec<RemoteAlbum>, RemoteError> {
        let state = self.state.lock().unwrap();
        Ok(state.albums.clone())
    }

    async fn create_album(&self, name: &str) -> Result<RemoteAlbum, RemoteError> {
        let mut state = self.state.lock().unwrap();
        if state.albums.iter().any(|a| a.name == name) {
            return Err(RemoteError::AlreadyExists);
        }
        state.next_album_id += 1;
        let album = RemoteAlbum {
            remote_album_id: format!("ralbum-{}", state.next_album_id),
            name: name.to_string(),
        };
        state.albums.push(album.clone());
        Ok(album)
    }

    async fn search_by_file_name(
        &self,
        file_name: &str,
    ) -> Result<Vec<SearchMatch>, RemoteError> {
        let state = self.state.lock().unwrap();
        if state.search_errors.contains(file_name) {
            return Err(RemoteError::Api {
                status: 503,
                message: "search unavailable".to_string(),
            });
        }
        Ok(state.search_results.get(file_name).cloned().unwrap_or_default())
    }

    async fn add_photos_to_album(
        &self,
        remote_album_id: &str,
        remote_photo_ids: &[String],
    ) -> Result<(), RemoteError> {
        let mut state = self.state.lock().unwrap();
        let call_index = state.add_calls.len();
        state
            .add_calls
            .push((remote_album_id.to_string(), remote_photo_ids.len()));
        if state.failing_add_calls.contains(&call_index) {
            return Err(RemoteError::Api {
                status: 500,
                message: "add to album failed".to_string(),
            });
        }
        state
            .album_members
            .entry(remote_album_id.to_string())
            .or_default()
            .extend(remote_photo_ids.iter().cloned());
        Ok(())
    }

    async fn logout(&self) -> Result<(), RemoteError> {
        Ok(())
    }
}
