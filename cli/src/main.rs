use camino::{Utf8Path as Path, Utf8PathBuf as PathBuf};
use clap::{Parser, Subcommand};
use eyre::{bail, Context, Result};
use tracing_error::ErrorLayer;
use tracing_subscriber::{prelude::*, EnvFilter};

use corelib::{
    config::{self, AccountConfig, Config},
    deadpool_diesel, interact,
    job::{
        album_fix_job::{AlbumFixJob, AlbumFixJobParams, DEFAULT_MEMBERSHIP_CHUNK_SIZE},
        import_job::{ImportJob, ImportJobParams},
        remote_scan_job::{RemoteScanJob, RemoteScanJobParams},
        transfer_job::{TransferJob, TransferJobParams},
    },
    model::repository::{
        self,
        db::{self, DbPool},
    },
    processing::tagger::ExiftoolTagger,
    remote::{RemoteClient, RemoteSession, RemoteStore},
};

#[derive(Parser)]
#[command(name = "cumulus", version, about = "Moves a photo archive export into a remote photo store and keeps albums in sync", long_about = None)]
struct Cli {
    #[arg(short, long)]
    config: String,
    /// Operate on a single configured account instead of all of them
    #[arg(long)]
    account: Option<String>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Index the remote store's folder tree into the catalog
    ScanRemote,
    /// Import an archive export into the catalog
    Import {
        /// Stop after this many newly imported photos
        #[arg(long)]
        limit: Option<usize>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Upload photos that are not backed up yet
    Transfer {
        #[arg(long)]
        limit: Option<i64>,
        #[arg(long)]
        dry_run: bool,
        /// Upload everything into the base folder, no per-album subfolders
        #[arg(long)]
        flat: bool,
        /// Skip writing album keywords into the local files after upload
        #[arg(long)]
        no_tag: bool,
    },
    /// Work off the album backlog: discover remote ids, then reconcile
    /// membership
    FixAlbums {
        #[arg(long)]
        dry_run: bool,
        /// Photos per add-to-album request
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Parallel id lookups, clamped to a safe maximum
        #[arg(long)]
        concurrency: Option<usize>,
    },
    /// List albums detected in the archive with their sync state
    Albums,
    /// Print photos that are safe to delete from the source, as csv
    Report,
    /// Catalog contents overview
    Inspect,
}

async fn db_setup(db_path: &Path) -> Result<DbPool> {
    let pool = db::open_db_pool(db_path.as_str())?;
    let conn = pool.get().await?;
    interact!(conn, db::migrate).await??;
    Ok(pool)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Cli::parse();

    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "1")
    }
    if std::env::var("RUST_SPANTRACE").is_err() {
        std::env::set_var("RUST_SPANTRACE", "1");
    }
    color_eyre::install()?;
    if std::env::var("CUMULUS_LOG").is_err() {
        std::env::set_var("CUMULUS_LOG", "info")
    }
    tracing_subscriber::registry()
        .with(EnvFilter::from_env("CUMULUS_LOG"))
        .with(ErrorLayer::default())
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config_path = PathBuf::from(args.config);
    let config = config::read_config(&config_path).await?;
    // all relative paths in the config are relative to this
    let config_dir = config_path
        .parent()
        .expect("has read config file, so parent must be a directory");

    let db_path = if config.catalog_db.is_absolute() {
        config.catalog_db.clone()
    } else {
        config_dir.join(&config.catalog_db)
    };
    let pool = db_setup(&db_path).await?;

    let accounts: Vec<&AccountConfig> = match &args.account {
        Some(name) => vec![config.account(name)?],
        None => config.accounts.iter().collect(),
    };
    let mut failed_accounts = 0usize;
    for account in accounts {
        if let Err(err) = run_command(&args.command, account, &config, config_dir, &pool).await {
            // one account failing never stops the others
            tracing::error!(account = %account.name, "account failed: {:#}", err);
            failed_accounts += 1;
        }
    }
    if failed_accounts > 0 {
        bail!("{} account(s) failed", failed_accounts);
    }
    Ok(())
}

fn archive_root(account: &AccountConfig, config_dir: &Path) -> PathBuf {
    if account.archive_dir.is_absolute() {
        account.archive_dir.clone()
    } else {
        config_dir.join(&account.archive_dir)
    }
}

async fn login(account: &AccountConfig, config: &Config) -> Result<RemoteSession> {
    let credentials = account.credentials()?;
    let client = RemoteClient::new(&config.remote.base_url)?;
    let session = client
        .login(&credentials.username, &credentials.password)
        .await
        .wrap_err_with(|| format!("could not authenticate account {}", account.name))?;
    Ok(session)
}

async fn logout(session: &RemoteSession) {
    if let Err(err) = session.logout().await {
        tracing::warn!(%err, "logout failed");
    }
}

async fn run_command(
    command: &Command,
    account: &AccountConfig,
    config: &Config,
    config_dir: &Path,
    pool: &DbPool,
) -> Result<()> {
    match command {
        Command::ScanRemote => {
            let session = login(account, config).await?;
            let params = RemoteScanJobParams {
                account_name: account.name.clone(),
                base_folder: config.remote.base_folder.clone(),
            };
            let report = RemoteScanJob::new(params, pool.clone(), &session).run().await;
            logout(&session).await;
            let report = report?;
            println!(
                "{}: indexed {} photos in {} folders, {} errors",
                account.name, report.indexed, report.folders, report.errors
            );
        }
        Command::Import { limit, dry_run } => {
            let params = ImportJobParams {
                account_name: account.name.clone(),
                archive_root: archive_root(account, config_dir),
                limit: *limit,
                dry_run: *dry_run,
            };
            let report = ImportJob::new(params, pool.clone()).run().await?;
            println!(
                "{}: {} imported, {} refreshed, {} already in remote, {} duplicates in batch, {} skipped",
                account.name,
                report.imported,
                report.refreshed,
                report.duplicate_remote,
                report.duplicate_batch,
                report.skipped
            );
        }
        Command::Transfer {
            limit,
            dry_run,
            flat,
            no_tag,
        } => {
            let session = login(account, config).await?;
            let exiftool = config
                .bin_paths
                .as_ref()
                .and_then(|bin_paths| bin_paths.exiftool.as_deref());
            let tagger = ExiftoolTagger::new(exiftool);
            let params = TransferJobParams {
                account_name: account.name.clone(),
                archive_root: archive_root(account, config_dir),
                remote_base_folder: config.remote.base_folder.clone(),
                limit: *limit,
                dry_run: *dry_run,
                organize_by_album: !*flat,
                tag_with_album: !*no_tag,
            };
            let report = TransferJob::new(params, pool.clone(), &session, Some(&tagger), config.pacing)
                .run()
                .await;
            logout(&session).await;
            let report = report?;
            println!(
                "{}: {} synced, {} failed, {} skipped, {} tagged",
                account.name, report.synced, report.failed, report.skipped, report.tagged
            );
        }
        Command::FixAlbums {
            dry_run,
            chunk_size,
            concurrency,
        } => {
            let session = login(account, config).await?;
            let params = AlbumFixJobParams {
                account_name: account.name.clone(),
                dry_run: *dry_run,
                lookup_concurrency: concurrency.unwrap_or(2),
                membership_chunk_size: chunk_size.unwrap_or(DEFAULT_MEMBERSHIP_CHUNK_SIZE),
            };
            let report = AlbumFixJob::new(params, pool.clone(), &session, config.pacing)
                .run()
                .await;
            logout(&session).await;
            let report = report?;
            println!(
                "{}: ids {} found / {} skipped / {} errors, albums {} created, memberships {} added / {} errors",
                account.name,
                report.ids_found,
                report.ids_skipped,
                report.id_errors,
                report.albums_created,
                report.memberships_added,
                report.membership_errors
            );
        }
        Command::Albums => {
            let conn = pool.get().await?;
            let account_name = account.name.clone();
            let stats = interact!(conn, move |conn| {
                repository::photo::get_album_name_stats(conn, &account_name)
            })
            .await??;
            println!("{}: {} albums detected", account.name, stats.len());
            for album in stats {
                println!(
                    "  {:<40} {:>6} photos {:>6} backed up {:>6} with id {:>6} in album",
                    album.album_name,
                    album.photos,
                    album.backed_up,
                    album.with_remote_id,
                    album.members
                );
            }
        }
        Command::Report => {
            let conn = pool.get().await?;
            let account_name = account.name.clone();
            let candidates = interact!(conn, move |conn| {
                repository::photo::get_removal_candidates(conn, &account_name)
            })
            .await??;
            println!("account,archive_path,file_name,file_size,taken_date");
            for photo in candidates {
                let archive_path = photo
                    .as_archive()
                    .map(|archive| archive.archive_path.to_string())
                    .unwrap_or_default();
                println!(
                    "{},{},{},{},{}",
                    photo.base.account_name,
                    archive_path,
                    photo.base.file_name,
                    photo.base.file_size,
                    photo.base.taken_date.to_rfc3339()
                );
            }
        }
        Command::Inspect => {
            let conn = pool.get().await?;
            let account_name = account.name.clone();
            let counts = interact!(conn, move |conn| {
                repository::photo::get_catalog_counts(conn, &account_name)
            })
            .await??;
            println!("{}:", account.name);
            println!("  archive photos     {:>8}", counts.archive_photos);
            println!("  remote photos      {:>8}", counts.remote_photos);
            println!("  backed up          {:>8}", counts.backed_up);
            println!("  pending transfer   {:>8}", counts.pending_transfer);
            println!("  needing remote id  {:>8}", counts.needing_remote_id);
            println!("  needing album sync {:>8}", counts.needing_album_sync);
            println!("  removal candidates {:>8}", counts.removal_candidates);
        }
    }
    Ok(())
}
