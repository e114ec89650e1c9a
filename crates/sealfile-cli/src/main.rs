//! sealfile: encrypted, signed file backups
//!
//! Commands:
//!   keygen                 - generate the RSA signing key pair
//!   backup <file>          - encrypt, sign, and store a file; print/write the receipt
//!   restore <id> | --receipt <path>
//!                          - fetch, decrypt, and hash-check a backup
//!   verify <json>          - check a metadata record or receipt offline (public key only)
//!   decrypt <ciphertext>   - decrypt a local ciphertext file without the store
//!   status                 - show daemon status (connects via gRPC Unix socket)
//!   config show            - display current configuration
//!
//! backup/restore talk to the configured store directly. S3 credentials are
//! read from AWS_ACCESS_KEY_ID / AWS_SECRET_ACCESS_KEY.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tonic::transport::{Channel, Endpoint, Uri};
use tower::service_fn;

use sealfile_backup::{decrypt_verified, BackupService, MetadataVerifier};
use sealfile_core::config::{SealConfig, StorageBackend};
use sealfile_core::proto::{sealfile_daemon_client::SealfileDaemonClient, StatusRequest};
use sealfile_core::{BackupMetadata, BackupReceipt};
use sealfile_crypto::{CryptoEngine, FileHash, Iv, KeyPair, PublicKey, SymmetricKey};
use sealfile_storage::{OpendalStore, S3Credentials};

// ── CLI structure ──────────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(
    name = "sealfile",
    version,
    about = "Encrypted, signed file backups",
    long_about = "sealfile: back up files as AES-256 ciphertext in a content-addressed store, \
                  with an RSA-signed metadata record that carries the key"
)]
struct Cli {
    /// Path to config.toml
    #[arg(
        long,
        short = 'c',
        env = "SEALFILE_CONFIG",
        default_value = "/etc/sealfile/config.toml"
    )]
    config: PathBuf,

    /// Log level for diagnostics on stderr
    #[arg(long, env = "SEALFILE_LOG", default_value = "warn")]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate an RSA signing key pair (PKCS#8 private, SPKI public, PEM)
    Keygen {
        /// Directory to write private.pem and public.pem into
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        /// RSA modulus size
        #[arg(long, default_value_t = sealfile_crypto::DEFAULT_RSA_BITS)]
        bits: usize,
        /// Overwrite existing key files
        #[arg(long)]
        force: bool,
    },

    /// Encrypt, sign, and store a file
    Backup {
        /// File to back up
        file: PathBuf,
        /// Name recorded in the metadata (default: the file's name)
        #[arg(long)]
        name: Option<String>,
        /// Write the receipt (content id + signed metadata) to this path.
        /// The receipt holds the decryption key: keep it private.
        #[arg(long)]
        receipt: Option<PathBuf>,
    },

    /// Fetch a backup from the store, decrypt it, and check its hash
    Restore {
        /// Content id (blake3:...); not needed with --receipt
        #[arg(required_unless_present = "receipt")]
        content_id: Option<String>,
        /// Symmetric key (hex)
        #[arg(long, required_unless_present = "receipt")]
        key: Option<String>,
        /// IV (hex)
        #[arg(long, required_unless_present = "receipt")]
        iv: Option<String>,
        /// Expected SHA-256 of the plaintext (hex)
        #[arg(long, required_unless_present = "receipt")]
        hash: Option<String>,
        /// Restore from a receipt; its signature is checked first
        #[arg(long, conflicts_with_all = ["content_id", "key", "iv", "hash"])]
        receipt: Option<PathBuf>,
        /// Output path (default: restored_<unix millis>)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Verify a metadata record or receipt against the public key
    Verify {
        /// JSON file holding a metadata record or a full receipt
        metadata: PathBuf,
        /// Public key PEM (default: crypto.public_key from config)
        #[arg(long)]
        public_key: Option<PathBuf>,
    },

    /// Decrypt a local ciphertext file without touching the store
    Decrypt {
        /// Ciphertext file
        ciphertext: PathBuf,
        /// Symmetric key (hex)
        #[arg(long)]
        key: String,
        /// IV (hex)
        #[arg(long)]
        iv: String,
        /// Expected SHA-256 of the plaintext (hex); without it the output is unverified
        #[arg(long)]
        hash: Option<String>,
        /// Output path (default: decrypted_<unix millis>)
        #[arg(long, short = 'o')]
        output: Option<PathBuf>,
    },

    /// Show daemon and storage status
    Status,

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigAction {
    /// Print the active configuration (merged defaults + config file)
    Show,
}

// ── Entry point ───────────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log);
    let config = SealConfig::load(&cli.config)
        .with_context(|| format!("loading config: {}", cli.config.display()))?;

    match cli.command {
        Commands::Keygen {
            out_dir,
            bits,
            force,
        } => cmd_keygen(&out_dir, bits, force),
        Commands::Backup {
            file,
            name,
            receipt,
        } => cmd_backup(&config, &file, name.as_deref(), receipt.as_deref()).await,
        Commands::Restore {
            content_id,
            key,
            iv,
            hash,
            receipt,
            output,
        } => {
            let source = match receipt {
                Some(path) => RestoreSource::Receipt(path),
                None => RestoreSource::Explicit {
                    content_id: content_id.unwrap_or_default(),
                    key: key.unwrap_or_default(),
                    iv: iv.unwrap_or_default(),
                    hash: hash.unwrap_or_default(),
                },
            };
            cmd_restore(&config, source, output).await
        }
        Commands::Verify {
            metadata,
            public_key,
        } => cmd_verify(&config, &metadata, public_key.as_deref()),
        Commands::Decrypt {
            ciphertext,
            key,
            iv,
            hash,
            output,
        } => cmd_decrypt(
            &load_engine(&config)?,
            &ciphertext,
            &key,
            &iv,
            hash.as_deref(),
            output,
        ),
        Commands::Status => cmd_status(&config).await,
        Commands::Config {
            action: ConfigAction::Show,
        } => cmd_config_show(&config, &cli.config),
    }
}

fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .init();
}

// ── Helpers ───────────────────────────────────────────────────────────────────

fn build_store(config: &SealConfig) -> Result<OpendalStore> {
    let creds = match config.storage.backend {
        StorageBackend::S3 => Some(S3Credentials::from_env()?),
        StorageBackend::Fs | StorageBackend::Memory => None,
    };
    if config.storage.backend == StorageBackend::Memory {
        eprintln!("warning: storage.backend = \"memory\" keeps nothing after this command exits");
    }
    let op = sealfile_storage::build_from_core_config(&config.storage, creds.as_ref())
        .context("building storage operator")?;
    Ok(OpendalStore::new(op, config.storage.prefix.clone()))
}

fn load_engine(config: &SealConfig) -> Result<CryptoEngine> {
    let public = config
        .crypto
        .public_key
        .exists()
        .then_some(config.crypto.public_key.as_path());
    CryptoEngine::load(&config.crypto.private_key, public).with_context(|| {
        format!(
            "loading signing key {} (generate one with `sealfile keygen`)",
            config.crypto.private_key.display()
        )
    })
}

fn build_service(config: &SealConfig) -> Result<BackupService<OpendalStore>> {
    Ok(BackupService::new(
        Arc::new(load_engine(config)?),
        build_store(config)?,
    ))
}

fn make_spinner(prefix: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{prefix:.bold} {spinner} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_prefix(prefix.to_string());
    pb.enable_steady_tick(Duration::from_millis(80));
    pb
}

/// `<stem>_<unix millis>` in the current directory
fn default_output_name(stem: &str) -> PathBuf {
    PathBuf::from(format!("{stem}_{}", chrono::Utc::now().timestamp_millis()))
}

/// Accept either a full receipt or a bare metadata record.
fn parse_metadata_document(text: &str) -> Result<BackupMetadata> {
    if let Ok(receipt) = BackupReceipt::from_json(text) {
        return Ok(receipt.metadata);
    }
    BackupMetadata::from_json(text).context("not a metadata record or receipt")
}

fn write_output(path: &Path, bytes: &[u8]) -> Result<()> {
    std::fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))
}

#[cfg(unix)]
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    use std::io::Write;
    use std::os::unix::fs::{OpenOptionsExt, PermissionsExt};

    let mut f = std::fs::OpenOptions::new()
        .write(true)
        .create(true)
        .truncate(true)
        .mode(0o600)
        .open(path)
        .with_context(|| format!("creating {}", path.display()))?;
    // mode() only applies on create; tighten a pre-existing file too
    f.set_permissions(std::fs::Permissions::from_mode(0o600))
        .with_context(|| format!("setting permissions on {}", path.display()))?;
    f.write_all(contents)
        .with_context(|| format!("writing {}", path.display()))
}

#[cfg(not(unix))]
fn write_private(path: &Path, contents: &[u8]) -> Result<()> {
    write_output(path, contents)
}

// ── Commands ──────────────────────────────────────────────────────────────────

fn cmd_keygen(out_dir: &Path, bits: usize, force: bool) -> Result<()> {
    let private_path = out_dir.join("private.pem");
    let public_path = out_dir.join("public.pem");

    if !force {
        for p in [&private_path, &public_path] {
            if p.exists() {
                anyhow::bail!("{} already exists (use --force to overwrite)", p.display());
            }
        }
    }
    std::fs::create_dir_all(out_dir)
        .with_context(|| format!("creating {}", out_dir.display()))?;

    let pb = make_spinner("keygen");
    pb.set_message(format!("generating {bits}-bit RSA key pair..."));
    let pair = KeyPair::generate(bits).context("generating key pair")?;
    pb.finish_and_clear();

    write_keypair(&pair, &private_path, &public_path)?;

    println!("Key pair written:");
    println!("  private:     {}", private_path.display());
    println!("  public:      {}", public_path.display());
    println!(
        "  fingerprint: {}",
        pair.public_key().fingerprint().unwrap_or_default()
    );
    Ok(())
}

fn write_keypair(pair: &KeyPair, private_path: &Path, public_path: &Path) -> Result<()> {
    let private_pem = pair.private_key_pem().context("encoding private key")?;
    let public_pem = pair.public_key().to_pem().context("encoding public key")?;
    write_private(private_path, private_pem.as_bytes())?;
    write_output(public_path, public_pem.as_bytes())
}

async fn cmd_backup(
    config: &SealConfig,
    file: &Path,
    name: Option<&str>,
    receipt_path: Option<&Path>,
) -> Result<()> {
    let service = build_service(config)?;
    let data = tokio::fs::read(file)
        .await
        .with_context(|| format!("reading {}", file.display()))?;
    let filename = name.map(str::to_string).unwrap_or_else(|| {
        file.file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "file".to_string())
    });

    let pb = make_spinner("backup");
    pb.set_message(format!("{} ({})", filename, fmt_bytes(data.len() as u64)));
    let receipt = service
        .backup(&data, &filename)
        .await
        .with_context(|| format!("backing up {}", file.display()))?;
    pb.finish_with_message("done".to_string());

    let json = receipt.to_json_pretty()?;
    match receipt_path {
        Some(path) => {
            write_private(path, json.as_bytes())?;
            println!("  content id: {}", receipt.content_id);
            println!("  file hash:  {}", receipt.metadata.file_hash);
            println!("  bytes:      {}", fmt_bytes(data.len() as u64));
            println!("  receipt:    {} (contains the decryption key)", path.display());
        }
        None => println!("{json}"),
    }
    Ok(())
}

enum RestoreSource {
    Receipt(PathBuf),
    Explicit {
        content_id: String,
        key: String,
        iv: String,
        hash: String,
    },
}

async fn cmd_restore(
    config: &SealConfig,
    source: RestoreSource,
    output: Option<PathBuf>,
) -> Result<()> {
    let service = build_service(config)?;
    let pb = make_spinner("restore");

    let plaintext = match source {
        RestoreSource::Receipt(path) => {
            let text = std::fs::read_to_string(&path)
                .with_context(|| format!("reading {}", path.display()))?;
            let receipt = BackupReceipt::from_json(&text)?;
            pb.set_message(receipt.content_id.to_string());
            service.restore_receipt(&receipt).await
        }
        RestoreSource::Explicit {
            content_id,
            key,
            iv,
            hash,
        } => {
            pb.set_message(content_id.clone());
            service.restore(&content_id, &key, &iv, &hash).await
        }
    };
    let plaintext = match plaintext {
        Ok(p) => p,
        Err(e) => {
            pb.abandon_with_message("failed".to_string());
            return Err(anyhow::Error::new(e).context("restore failed"));
        }
    };
    pb.finish_with_message("verified".to_string());

    let output = output.unwrap_or_else(|| default_output_name("restored"));
    write_output(&output, &plaintext)?;
    println!("  written: {} ({})", output.display(), fmt_bytes(plaintext.len() as u64));
    Ok(())
}

fn cmd_verify(config: &SealConfig, metadata: &Path, public_key: Option<&Path>) -> Result<()> {
    let key_path = public_key.unwrap_or(config.crypto.public_key.as_path());
    let key = PublicKey::load(key_path)
        .with_context(|| format!("loading public key {}", key_path.display()))?;
    let text = std::fs::read_to_string(metadata)
        .with_context(|| format!("reading {}", metadata.display()))?;
    let record = parse_metadata_document(&text)?;

    let valid = MetadataVerifier::new(key).verify(&record)?;
    println!("  filename:  {}", record.filename);
    println!("  timestamp: {}", record.timestamp);
    println!("  signature: {}", if valid { "VALID" } else { "INVALID" });
    if !valid {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_decrypt(
    engine: &CryptoEngine,
    ciphertext: &Path,
    key_hex: &str,
    iv_hex: &str,
    hash_hex: Option<&str>,
    output: Option<PathBuf>,
) -> Result<()> {
    let key = SymmetricKey::from_hex(key_hex).context("parsing --key")?;
    let iv = Iv::from_hex(iv_hex).context("parsing --iv")?;
    let expected = hash_hex
        .map(FileHash::from_hex)
        .transpose()
        .context("parsing --hash")?;
    let data = std::fs::read(ciphertext)
        .with_context(|| format!("reading {}", ciphertext.display()))?;

    let plaintext =
        decrypt_verified(engine, &data, &key, &iv, expected.as_ref()).context("decrypt failed")?;

    let output = output.unwrap_or_else(|| default_output_name("decrypted"));
    write_output(&output, &plaintext)?;
    println!("  written: {} ({})", output.display(), fmt_bytes(plaintext.len() as u64));
    if expected.is_none() {
        println!("  note: no --hash given, output is unverified");
    }
    Ok(())
}

async fn cmd_status(config: &SealConfig) -> Result<()> {
    let socket = &config.daemon.socket;

    if !socket.exists() {
        eprintln!("sealfiled: socket not found at {}", socket.display());
        eprintln!("           Is sealfiled running?  Try: sealfiled --config /etc/sealfile/config.toml");
        std::process::exit(1);
    }

    let mut client = connect_daemon(socket).await?;
    let status = client
        .status(tonic::Request::new(StatusRequest {}))
        .await
        .context("status RPC failed")?
        .into_inner();

    println!("sealfiled v{}", status.version);
    println!("  uptime:      {}", format_uptime(status.uptime_secs));
    println!("  socket:      {}", socket.display());
    println!(
        "  storage:     {} [{}]",
        status.storage_backend,
        if status.storage_ok { "ok" } else { "UNREACHABLE" }
    );
    println!("  signing key: {}", status.public_key_fingerprint);
    Ok(())
}

async fn connect_daemon(socket_path: &Path) -> Result<SealfileDaemonClient<Channel>> {
    let path = socket_path.to_path_buf();

    // tonic over Unix domain socket: use a tower service_fn connector
    let channel = Endpoint::from_static("http://[::]:0")
        .connect_with_connector(service_fn(move |_: Uri| {
            let path = path.clone();
            async move {
                let stream = tokio::net::UnixStream::connect(&path).await?;
                Ok::<_, std::io::Error>(hyper_util::rt::TokioIo::new(stream))
            }
        }))
        .await
        .with_context(|| format!("connecting to sealfiled at {}", socket_path.display()))?;

    Ok(SealfileDaemonClient::new(channel))
}

fn cmd_config_show(config: &SealConfig, config_path: &Path) -> Result<()> {
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

fn format_uptime(secs: i64) -> String {
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

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
