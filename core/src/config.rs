use std::time::Duration;

use camino::{Utf8Path as Path, Utf8PathBuf as PathBuf};
use color_eyre::eyre::{bail, Context, Result};
use serde::Deserialize;

use crate::job::Pacing;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct TomlAccount {
    name: String,
    archive_dir: String,
    remote_username: Option<String>,
    remote_password: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct TomlRemote {
    base_url: String,
    base_folder: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct TomlPacing {
    upload_delay_ms: Option<u64>,
    lookup_batch_delay_ms: Option<u64>,
    album_chunk_delay_ms: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct TomlBinPaths {
    exiftool: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
struct TomlConfig {
    catalog_db: Option<String>,
    #[serde(rename = "Remote")]
    remote: TomlRemote,
    #[serde(rename = "Accounts")]
    accounts: Vec<TomlAccount>,
    #[serde(rename = "Pacing")]
    pacing: Option<TomlPacing>,
    #[serde(rename = "BinPaths")]
    bin_paths: Option<TomlBinPaths>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Credentials {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountConfig {
    pub name: String,
    pub archive_dir: PathBuf,
    pub credentials: Option<Credentials>,
}

impl AccountConfig {
    /// A source account without paired remote credentials is a configuration
    /// error, raised before any work begins.
    pub fn credentials(&self) -> Result<&Credentials> {
        match &self.credentials {
            Some(credentials) => Ok(credentials),
            None => bail!(
                "no remote account paired with source account {}",
                self.name
            ),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteConfig {
    pub base_url: String,
    /// Folder everything is uploaded under
    pub base_folder: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinPaths {
    pub exiftool: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    pub catalog_db: PathBuf,
    pub remote: RemoteConfig,
    pub accounts: Vec<AccountConfig>,
    pub pacing: Pacing,
    pub bin_paths: Option<BinPaths>,
}

impl Config {
    pub fn account(&self, name: &str) -> Result<&AccountConfig> {
        match self.accounts.iter().find(|a| a.name == name) {
            Some(account) => Ok(account),
            None => bail!("no account named {} in config", name),
        }
    }
}

pub async fn read_config(path: &Path) -> Result<Config> {
    let toml_str = tokio::fs::read_to_string(path)
        .await
        .context(format!("Error reading config file {}", path))?;
    let toml_config: TomlConfig = toml::from_str(&toml_str).context("Error parsing config file")?;
    let accounts: Vec<AccountConfig> = toml_config
        .accounts
        .into_iter()
        .map(|toml_account| {
            let credentials = match (toml_account.remote_username, toml_account.remote_password) {
                (Some(username), Some(password)) => Some(Credentials { username, password }),
                (None, None) => None,
                _ => bail!(
                    "account {} must set both remote_username and remote_password or neither",
                    toml_account.name
                ),
            };
            Ok(AccountConfig {
                name: toml_account.name,
                archive_dir: toml_account.archive_dir.into(),
                credentials,
            })
        })
        .collect::<Result<_>>()?;
    let defaults = Pacing::default();
    let pacing = match toml_config.pacing {
        Some(toml_pacing) => Pacing {
            between_uploads: toml_pacing
                .upload_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.between_uploads),
            between_lookup_batches: toml_pacing
                .lookup_batch_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.between_lookup_batches),
            between_album_chunks: toml_pacing
                .album_chunk_delay_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.between_album_chunks),
        },
        None => defaults,
    };
    let bin_paths = toml_config.bin_paths.map(|bin_paths| BinPaths {
        exiftool: bin_paths.exiftool.map(PathBuf::from),
    });
    Ok(Config {
        catalog_db: toml_config
            .catalog_db
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("cumulus.db")),
        remote: RemoteConfig {
            base_url: toml_config.remote.base_url,
            base_folder: toml_config
                .remote
                .base_folder
                .unwrap_or_else(|| "Photos".to_string()),
        },
        accounts,
        pacing,
        bin_paths,
    })
}
