use async_trait::async_trait;
use camino::{Utf8Path as Path, Utf8PathBuf as PathBuf};
use eyre::{bail, Context, Result};
use tokio::process::Command;

/// Writes the album label into a file's embedded keyword tags. Best-effort
/// secondary path, failures never influence transfer state.
#[async_trait]
pub trait Tagger: Send + Sync {
    async fn tag_album(&self, file: &Path, album_label: &str) -> Result<()>;
}

pub struct ExiftoolTagger {
    exiftool: PathBuf,
}

impl ExiftoolTagger {
    pub fn new(exiftool_path: Option<&Path>) -> ExiftoolTagger {
        ExiftoolTagger {
            exiftool: exiftool_path
                .map(|p| p.to_owned())
                .unwrap_or_else(|| PathBuf::from("exiftool")),
        }
    }
}

#[async_trait]
impl Tagger for ExiftoolTagger {
    #[tracing::instrument(skip(self))]
    async fn tag_album(&self, file: &Path, album_label: &str) -> Result<()> {
        let output = Command::new(self.exiftool.as_str())
            .arg("-overwrite_original")
            .arg(format!("-Keywords+={}", album_label))
            .arg(file.as_str())
            .output()
            .await
            .wrap_err("error running exiftool")?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("exiftool exited with {}: {}", output.status, stderr.trim());
        }
        Ok(())
    }
}
