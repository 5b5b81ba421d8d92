use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use super::{RemoteAlbum, RemoteError, RemoteFolderPhoto, RemoteStore, SearchMatch};

const PAGE_SIZE: u32 = 200;
/// Search never pages past this, common file names are cut off rather than
/// walked exhaustively
const MAX_SEARCH_PAGES: u32 = 5;

/// Unauthenticated handle to the remote photo service. Constructed once per
/// command invocation, [`RemoteClient::login`] turns it into a session
/// carrying the token.
pub struct RemoteClient {
    http: reqwest::Client,
    base_url: String,
}

impl RemoteClient {
    pub fn new(base_url: &str) -> Result<RemoteClient, RemoteError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("cumulus/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(RemoteClient {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Authenticate and obtain a session. All other operations live on the
    /// session, so there is no way to call them without a token.
    #[instrument(skip(self, password))]
    pub async fn login(
        &self,
        username: &str,
        password: &str,
    ) -> Result<RemoteSession, RemoteError> {
        #[derive(Serialize)]
        struct LoginRequest<'a> {
            username: &'a str,
            password: &'a str,
        }
        #[derive(Deserialize)]
        struct LoginResponse {
            token: String,
        }
        let response = self
            .http
            .post(format!("{}/api/auth/login", self.base_url))
            .json(&LoginRequest { username, password })
            .send()
            .await?;
        if matches!(
            response.status(),
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN
        ) {
            return Err(RemoteError::Auth(format!(
                "login rejected for user {}",
                username
            )));
        }
        let body: LoginResponse = error_for_status(response).await?.json().await?;
        Ok(RemoteSession {
            http: self.http.clone(),
            base_url: self.base_url.clone(),
            token: body.token,
        })
    }
}

/// An authenticated session with the remote store, valid until logout
pub struct RemoteSession {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl RemoteSession {
    fn get(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .get(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.http
            .post(format!("{}{}", self.base_url, path))
            .bearer_auth(&self.token)
    }
}

async fn error_for_status(response: reqwest::Response) -> Result<reqwest::Response, RemoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let message = response.text().await.unwrap_or_default();
    match status {
        StatusCode::NOT_FOUND => Err(RemoteError::NotFound),
        StatusCode::CONFLICT => Err(RemoteError::AlreadyExists),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(RemoteError::Auth(message)),
        _ => Err(RemoteError::Api {
            status: status.as_u16(),
            message,
        }),
    }
}

fn datetime_from_unix_seconds(seconds: i64) -> DateTime<Utc> {
    Utc.timestamp_opt(seconds, 0)
        .single()
        .unwrap_or(DateTime::UNIX_EPOCH)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct FolderListResponse {
    folders: Vec<FolderEntry>,
    next_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct FolderEntry {
    path: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PhotoListResponse {
    photos: Vec<PhotoEntry>,
    next_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PhotoEntry {
    id: String,
    file_name: String,
    file_size: i64,
    content_hash: Option<String>,
    /// unix seconds
    taken_at: i64,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AlbumListResponse {
    albums: Vec<AlbumEntry>,
    next_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
struct AlbumEntry {
    id: String,
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchResponse {
    matches: Vec<SearchEntry>,
    next_page: Option<u32>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SearchEntry {
    id: String,
    file_name: String,
}

#[async_trait]
impl RemoteStore for RemoteSession {
    #[instrument(skip(self))]
    async fn list_folders(&self, path: &str) -> Result<Vec<String>, RemoteError> {
        let mut folders: Vec<String> = Vec::default();
        let mut page = 0u32;
        loop {
            let response = self
                .get("/api/folders")
                .query(&[
                    ("path", path.to_string()),
                    ("page", page.to_string()),
                    ("pageSize", PAGE_SIZE.to_string()),
                ])
                .send()
                .await?;
            let body: FolderListResponse = error_for_status(response).await?.json().await?;
            folders.extend(body.folders.into_iter().map(|f| f.path));
            match body.next_page {
                Some(next) => page = next,
                None => break,
            }
        }
        Ok(folders)
    }

    #[instrument(skip(self))]
    async fn list_folder_photos(
        &self,
        path: &str,
    ) -> Result<Vec<RemoteFolderPhoto>, RemoteError> {
        let mut photos: Vec<RemoteFolderPhoto> = Vec::default();
        let mut page = 0u32;
        loop {
            let response = self
                .get("/api/folders/photos")
                .query(&[
                    ("path", path.to_string()),
                    ("page", page.to_string()),
                    ("pageSize", PAGE_SIZE.to_string()),
                ])
                .send()
                .await?;
            let body: PhotoListResponse = error_for_status(response).await?.json().await?;
            photos.extend(body.photos.into_iter().map(|p| RemoteFolderPhoto {
                remote_photo_id: p.id,
                file_name: p.file_name,
                file_size: p.file_size,
                content_hash: p.content_hash,
                taken_date: datetime_from_unix_seconds(p.taken_at),
                folder_path: path.to_string(),
            }));
            match body.next_page {
                Some(next) => page = next,
                None => break,
            }
        }
        Ok(photos)
    }

    #[instrument(skip(self))]
    async fn ensure_folder(&self, path: &str) -> Result<(), RemoteError> {
        #[derive(Serialize)]
        struct CreateFolderRequest<'a> {
            path: &'a str,
        }
        let response = self
            .post("/api/folders")
            .json(&CreateFolderRequest { path })
            .send()
            .await?;
        match error_for_status(response).await {
            Ok(_) | Err(RemoteError::AlreadyExists) => Ok(()),
            Err(err) => Err(err),
        }
    }

    #[instrument(skip(self, bytes), fields(num_bytes = bytes.len()))]
    async fn upload(
        &self,
        folder_path: &str,
        file_name: &str,
        bytes: Vec<u8>,
    ) -> Result<(), RemoteError> {
        let response = self
            .post("/api/upload")
            .query(&[("path", folder_path), ("fileName", file_name)])
            .body(bytes)
            .send()
            .await?;
        error_for_status(response).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn list_albums(&self) -> Result<Vec<RemoteAlbum>, RemoteError> {
        let mut albums: Vec<RemoteAlbum> = Vec::default();
        let mut page = 0u32;
        loop {
            let response = self
                .get("/api/albums")
                .query(&[
                    ("page", page.to_string()),
                    ("pageSize", PAGE_SIZE.to_string()),
                ])
                .send()
                .await?;
            let body: AlbumListResponse = error_for_status(response).await?.json().await?;
            albums.extend(body.albums.into_iter().map(|a| RemoteAlbum {
                remote_album_id: a.id,
                name: a.name,
            }));
            match body.next_page {
                Some(next) => page = next,
                None => break,
            }
        }
        Ok(albums)
    }

    #[instrument(skip(self))]
    async fn create_album(&self, name: &str) -> Result<RemoteAlbum, RemoteError> {
        #[derive(Serialize)]
        struct CreateAlbumRequest<'a> {
            name: &'a str,
        }
        let response = self
            .post("/api/albums")
            .json(&CreateAlbumRequest { name })
            .send()
            .await?;
        let body: AlbumEntry = error_for_status(response).await?.json().await?;
        Ok(RemoteAlbum {
            remote_album_id: body.id,
            name: body.name,
        })
    }

    #[instrument(skip(self))]
    async fn search_by_file_name(
        &self,
        file_name: &str,
    ) -> Result<Vec<SearchMatch>, RemoteError> {
        let mut matches: Vec<SearchMatch> = Vec::default();
        let mut page = 0u32;
        let mut pages_seen = 0u32;
        loop {
            let response = self
                .get("/api/photos/search")
                .query(&[
                    ("fileName", file_name.to_string()),
                    ("page", page.to_string()),
                    ("pageSize", PAGE_SIZE.to_string()),
                ])
                .send()
                .await?;
            let body: SearchResponse = error_for_status(response).await?.json().await?;
            matches.extend(body.matches.into_iter().map(|m| SearchMatch {
                remote_photo_id: m.id,
                file_name: m.file_name,
            }));
            pages_seen += 1;
            match body.next_page {
                Some(next) if pages_seen < MAX_SEARCH_PAGES => page = next,
                _ => break,
            }
        }
        Ok(matches)
    }

    #[instrument(skip(self, remote_photo_ids), fields(num_photos = remote_photo_ids.len()))]
    async fn add_photos_to_album(
        &self,
        remote_album_id: &str,
        remote_photo_ids: &[String],
    ) -> Result<(), RemoteError> {
        #[derive(Serialize)]
        #[serde(rename_all = "camelCase")]
        struct AddPhotosRequest<'a> {
            photo_ids: &'a [String],
        }
        let response = self
            .post(&format!("/api/albums/{}/photos", remote_album_id))
            .json(&AddPhotosRequest {
                photo_ids: remote_photo_ids,
            })
            .send()
            .await?;
        error_for_status(response).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn logout(&self) -> Result<(), RemoteError> {
        let response = self.post("/api/auth/logout").send().await?;
        error_for_status(response).await?;
        Ok(())
    }
}
