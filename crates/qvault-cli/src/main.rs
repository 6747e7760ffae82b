//! qvault: encrypted file vault CLI
//!
//! Commands:
//!   upload <paths..>          - encrypt and upload files, or one folder as a ZIP
//!   list                      - list your uploaded files, newest first
//!   download <record> [--out] - download, decrypt, and save a file
//!   gate create|unlock        - manage the vault passphrase gate
//!   status                    - show storage, session, and vault status
//!   config show               - display current configuration

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use secrecy::SecretString;
use std::path::{Path, PathBuf};
use std::time::Duration;

use qvault_core::config::{QvaultConfig, StorageBackend};
use qvault_core::types::now_millis;
use qvault_core::{RecordKind, Session, TransportSecurity};
use qvault_storage::{S3Credentials, Stores};
use qvault_transfer::archive::extract_archive;
use qvault_transfer::collect::{selection_from_paths, CollectConfig};
use qvault_transfer::{BatchOptions, BatchStatus, ProgressFn, VaultStatus};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "qvault",
    version,
    about = "Client-side encrypted file vault",
    long_about = "qvault: upload files encrypted on this machine, list them, and download them back"
)]
struct Cli {
    /// Path to config.toml
    #[arg(long, short = 'c', env = "QVAULT_CONFIG", default_value = "~/.config/qvault/config.toml")]
    config: PathBuf,

    /// User id to act as (overrides session.user_id)
    #[arg(long, short = 'u', env = "QVAULT_USER")]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Show storage, session, and vault status
    Status,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },

    /// Encrypt and upload files, or a single folder as one archive
    ///
    /// S3 credentials are read from AWS_ACCESS_KEY_ID and
    /// AWS_SECRET_ACCESS_KEY.
    Upload {
        /// Files, or exactly one directory
        #[arg(required = true)]
        paths: Vec<PathBuf>,
        /// Items uploaded concurrently (overrides transfer.workers)
        #[arg(long, short = 'w')]
        workers: Option<usize>,
        /// Seal the batch key with the vault passphrase
        #[arg(long)]
        seal: bool,
    },

    /// List your uploaded files, newest first
    List,

    /// Download and decrypt a file by record id
    Download {
        /// Record id (see `qvault list`)
        record: String,
        /// Destination directory
        #[arg(long, short = 'o', default_value = ".")]
        out: PathBuf,
        /// Unpack folder archives instead of saving the .zip
        #[arg(long)]
        extract: bool,
    },

    /// Vault passphrase gate
    Gate {
        #[command(subcommand)]
        action: GateAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

#[derive(Subcommand, Debug)]
enum GateAction {
    /// Set the vault passphrase
    Create,
    /// Check the vault passphrase
    Unlock,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = expand_tilde(&cli.config);
    let config = QvaultConfig::load(&config_path)
        .with_context(|| format!("loading config: {}", config_path.display()))?;
    init_logging(&config.log.level, &config.log.format);

    if let Commands::Config { action: ConfigAction::Show } = cli.command {
        return cmd_config_show(&config, &config_path);
    }

    let mut app = App::open(config, cli.user.as_deref())?;
    match cli.command {
        Commands::Status => cmd_status(&app).await,
        Commands::Config { .. } => Ok(()),
        Commands::Upload { paths, workers, seal } => cmd_upload(&mut app, &paths, workers, seal).await,
        Commands::List => cmd_list(&app).await,
        Commands::Download { record, out, extract } => {
            cmd_download(&app, &record, &out, extract).await
        }
        Commands::Gate { action: GateAction::Create } => cmd_gate_create(&app).await,
        Commands::Gate { action: GateAction::Unlock } => cmd_gate_unlock(&app).await,
    }
}

/// `QVAULT_LOG` takes precedence over the configured level.
fn init_logging(level: &str, format: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_env("QVAULT_LOG").unwrap_or_else(|_| EnvFilter::new(level));

    match format {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }
}

// ── Session setup ─────────────────────────────────────────────────────────────

struct App {
    config: QvaultConfig,
    op: opendal::Operator,
    stores: Stores,
    session: Session,
}

impl App {
    fn open(mut config: QvaultConfig, user_override: Option<&str>) -> Result<Self> {
        let user = user_override
            .map(str::to_string)
            .or_else(|| config.session.user_id.clone())
            .context(
                "no user configured\n\
                 Pass --user, set QVAULT_USER, or set session.user_id in the config file.",
            )?;

        config.storage.root = expand_tilde(&config.storage.root);
        let creds = credentials_from_env();
        let op = qvault_storage::build_operator(&config.storage, creds.as_ref())
            .context("building storage operator")?;
        let stores = Stores::from_operator(op.clone(), &config.storage.prefix);

        let mut session = Session::new(user, TransportSecurity::classify(&config.storage));
        if let Some(name) = &config.session.display_name {
            session = session.with_display_name(name.clone());
        }

        Ok(Self {
            config,
            op,
            stores,
            session,
        })
    }
}

/// S3 credentials from the standard AWS environment variables.
fn credentials_from_env() -> Option<S3Credentials> {
    let access_key_id = std::env::var("AWS_ACCESS_KEY_ID").ok()?;
    let secret_access_key = std::env::var("AWS_SECRET_ACCESS_KEY").ok()?;
    Some(S3Credentials {
        access_key_id,
        secret_access_key,
    })
}

/// Expand `~` in path to the user's home directory
fn expand_tilde(path: &Path) -> PathBuf {
    let s = path.to_string_lossy();
    match s.strip_prefix("~/") {
        Some(rest) => {
            let home = std::env::var("HOME").unwrap_or_default();
            PathBuf::from(home).join(rest)
        }
        None => path.to_path_buf(),
    }
}

/// Passphrase from `QVAULT_PASSPHRASE`, else an interactive prompt.
fn read_passphrase(prompt: &str) -> Result<String> {
    if let Ok(pass) = std::env::var("QVAULT_PASSPHRASE") {
        return Ok(pass);
    }
    rpassword::prompt_password(prompt).context("reading passphrase")
}

/// Pass the vault gate if one exists; returns the accepted passphrase.
async fn unlock_vault(app: &App) -> Result<Option<SecretString>> {
    match qvault_transfer::open_vault(&app.session, &app.stores).await? {
        VaultStatus::NeedsCreate => {
            tracing::warn!("no vault gate set; run `qvault gate create` to add one");
            Ok(None)
        }
        VaultStatus::NeedsUnlock => {
            let mut entry = read_passphrase("Vault passphrase: ")?;
            if !qvault_transfer::unlock(&app.session, &app.stores, &mut entry).await? {
                anyhow::bail!("incorrect vault passphrase");
            }
            Ok(Some(SecretString::from(entry)))
        }
    }
}

// ── Progress bar helpers ──────────────────────────────────────────────────────

fn make_progress_bar(total: u64, prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new(total);
    let style = ProgressStyle::with_template("{prefix:.bold} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
        .map(|s| s.progress_chars("=>-"))
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    pb.set_style(style);
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

// ── `qvault upload` ───────────────────────────────────────────────────────────

async fn cmd_upload(
    app: &mut App,
    paths: &[PathBuf],
    workers: Option<usize>,
    seal: bool,
) -> Result<()> {
    let passphrase = unlock_vault(app).await?;

    let collect = CollectConfig::from(&app.config.transfer);
    let selection = selection_from_paths(paths, &collect).context("reading selection")?;
    let items = selection.len() as u64;
    app.session.select(selection);

    let mut options = BatchOptions::from_config(&app.config.transfer);
    if let Some(w) = workers {
        options.workers = w.max(1);
    }
    if seal || app.config.crypto.wrap_with_passphrase {
        let passphrase = match passphrase {
            Some(p) => p,
            None => SecretString::from(read_passphrase("Passphrase to seal keys with: ")?),
        };
        options = options.with_seal(passphrase, &app.config.crypto);
    }

    println!(
        "Uploading {} item(s) as {} (backend: {:?})",
        items,
        app.session.display_name(),
        app.config.storage.backend,
    );

    let pb = make_progress_bar(items, "upload");
    let pb_clone = pb.clone();
    let progress: ProgressFn = Box::new(move |done, total, msg| {
        pb_clone.set_length(total);
        pb_clone.set_position(done);
        pb_clone.set_message(msg.to_string());
    });

    let report = qvault_transfer::upload_batch(&mut app.session, &app.stores, &options, Some(&progress))
        .await
        .context("upload failed")?;
    pb.finish_with_message("done".to_string());

    println!();
    for record in &report.records {
        println!(
            "  {}  {}  {}",
            record.record_id,
            fmt_bytes(record.size.unwrap_or_default()),
            record.file_name
        );
    }
    for failure in &report.failures {
        println!("  FAILED  {}: {}", failure.name, failure.reason);
    }
    println!(
        "Upload {}: {} stored, {} failed",
        match report.status {
            BatchStatus::Completed => "complete",
            BatchStatus::PartiallyFailed => "partially failed",
            BatchStatus::Failed => "failed",
        },
        report.succeeded,
        report.failed
    );

    if report.status == BatchStatus::Failed {
        anyhow::bail!("no files were uploaded");
    }
    Ok(())
}

// ── `qvault list` ─────────────────────────────────────────────────────────────

async fn cmd_list(app: &App) -> Result<()> {
    unlock_vault(app).await?;
    let records = qvault_transfer::list_files(&app.session, &app.stores).await?;

    if records.is_empty() {
        println!("No files uploaded yet.");
        return Ok(());
    }

    let now = now_millis();
    println!("{:<36}  {:>9}  {:>10}  NAME", "RECORD", "SIZE", "UPLOADED");
    for record in &records {
        let name = match record.kind {
            RecordKind::FolderArchive => format!("{} (folder)", record.file_name),
            RecordKind::File => record.file_name.clone(),
        };
        println!(
            "{:<36}  {:>9}  {:>10}  {}",
            record.record_id,
            record.size.map(fmt_bytes).unwrap_or_else(|| "-".into()),
            fmt_age(now.saturating_sub(record.uploaded_at)),
            name
        );
    }
    Ok(())
}

// ── `qvault download` ─────────────────────────────────────────────────────────

async fn cmd_download(app: &App, record_id: &str, out: &Path, extract: bool) -> Result<()> {
    let mut passphrase = unlock_vault(app).await?;

    let sealed = app
        .stores
        .records
        .get_record(record_id)
        .await?
        .is_some_and(|r| qvault_crypto::is_sealed(&r.encryption_key));
    if sealed && passphrase.is_none() {
        passphrase = Some(SecretString::from(read_passphrase("Passphrase the key was sealed with: ")?));
    }

    let file = qvault_transfer::download_record(&app.session, &app.stores, record_id, passphrase.as_ref())
        .await
        .with_context(|| format!("downloading record {record_id}"))?;

    if extract && file.kind == RecordKind::FolderArchive {
        let written = extract_archive(&file.bytes, out)
            .with_context(|| format!("extracting {} into {}", file.file_name, out.display()))?;
        println!("Extracted {} file(s) from {} into {}", written.len(), file.file_name, out.display());
    } else {
        let path = qvault_transfer::save_reconstructed(out, &file)
            .await
            .with_context(|| format!("saving into {}", out.display()))?;
        println!(
            "Saved {} ({}, {})",
            path.display(),
            file.content_type,
            fmt_bytes(file.bytes.len() as u64)
        );
    }
    Ok(())
}

// ── `qvault gate` ─────────────────────────────────────────────────────────────

async fn cmd_gate_create(app: &App) -> Result<()> {
    if qvault_transfer::open_vault(&app.session, &app.stores).await? == VaultStatus::NeedsUnlock {
        anyhow::bail!("a vault gate already exists for {}", app.session.user_id());
    }

    let first = SecretString::from(read_passphrase("New vault passphrase: ")?);
    if std::env::var("QVAULT_PASSPHRASE").is_err() {
        let confirm = read_passphrase("Repeat passphrase: ")?;
        if secrecy::ExposeSecret::expose_secret(&first) != confirm.as_str() {
            anyhow::bail!("passphrases do not match");
        }
    }

    let params = qvault_transfer::kdf_params(&app.config.crypto);
    qvault_transfer::create_gate(&app.session, &app.stores, &first, &params).await?;
    println!("Vault gate created for {}", app.session.user_id());
    Ok(())
}

async fn cmd_gate_unlock(app: &App) -> Result<()> {
    match unlock_vault(app).await? {
        Some(_) => println!("Vault unlocked"),
        None => println!("No vault gate set for {}", app.session.user_id()),
    }
    Ok(())
}

// ── `qvault status` ───────────────────────────────────────────────────────────

async fn cmd_status(app: &App) -> Result<()> {
    let storage = &app.config.storage;
    println!("qvault v{}", env!("CARGO_PKG_VERSION"));
    println!("  user:       {}", app.session.display_name());
    match storage.backend {
        StorageBackend::S3 => println!("  storage:    s3 {}/{}", storage.endpoint, storage.bucket),
        StorageBackend::Fs => println!("  storage:    fs {}", storage.root.display()),
        StorageBackend::Memory => println!("  storage:    memory"),
    }
    println!(
        "  transport:  {:?}{}",
        app.session.transport(),
        if app.session.transport().is_secure() { "" } else { " (uploads refused)" }
    );

    match qvault_storage::check_health(&app.op).await {
        Ok(()) => println!("  health:     ok"),
        Err(e) => println!("  health:     unreachable ({e})"),
    }

    let gate = match qvault_transfer::open_vault(&app.session, &app.stores).await {
        Ok(VaultStatus::NeedsCreate) => "not set".to_string(),
        Ok(VaultStatus::NeedsUnlock) => "set".to_string(),
        Err(e) => format!("unknown ({e})"),
    };
    println!("  vault gate: {gate}");
    Ok(())
}

// ── `qvault config show` ──────────────────────────────────────────────────────

fn cmd_config_show(config: &QvaultConfig, config_path: &Path) -> Result<()> {
    if config_path.exists() {
        println!("# Configuration from: {}", config_path.display());
    } else {
        println!("# Configuration: defaults (no file at {})", config_path.display());
    }
    println!();
    let rendered = toml::to_string_pretty(config).context("serializing config to TOML")?;
    print!("{rendered}");
    Ok(())
}

// ── Formatting ────────────────────────────────────────────────────────────────

fn fmt_bytes(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;
    if bytes >= GB {
        format!("{:.1} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}

fn fmt_age(millis: u64) -> String {
    let secs = millis / 1000;
    match secs {
        0..=59 => format!("{secs}s ago"),
        60..=3599 => format!("{}m ago", secs / 60),
        3600..=86_399 => format!("{}h ago", secs / 3600),
        _ => format!("{}d ago", secs / 86_400),
    }
}
