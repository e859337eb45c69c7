use clap::{Parser, Subcommand};
use facility_core::{StorageConfig, StorageService, UploadCategory, UploadRequest};
use facility_files::extension_of;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "facility")]
#[command(about = "Facility cleaning record storage CLI")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Store a local file as a photo or receipt
    Store {
        /// File to upload
        file: PathBuf,
        /// Upload category (photo or receipt)
        #[arg(long)]
        category: UploadCategory,
        /// Facility identifier
        #[arg(long)]
        facility: String,
        /// Visit date (YYYY-MM-DD) for photos, month (YYYY-MM) for receipts
        #[arg(long)]
        period: String,
        /// Declared MIME type (guessed from the extension if omitted)
        #[arg(long)]
        mime: Option<String>,
    },
    /// Run one retention sweep over the photos tree
    Sweep {
        /// Override RETENTION_DAYS for this run
        #[arg(long)]
        retention_days: Option<u32>,
    },
    /// Print the public URL of a stored file
    Url {
        /// Path of a file under the storage root
        path: PathBuf,
    },
    /// Print the resolved configuration
    Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("facility_files=info".parse()?)
                .add_directive("facility_core=info".parse()?),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let config = StorageConfig::from_env()?;

    match cli.command {
        Some(Commands::Store {
            file,
            category,
            facility,
            period,
            mime,
        }) => {
            let service = StorageService::new(config);
            let original_name = file
                .file_name()
                .and_then(|n| n.to_str())
                .unwrap_or_default()
                .to_string();
            let mime_type = mime.unwrap_or_else(|| guess_mime(&original_name).to_string());

            let size = std::fs::metadata(&file)?.len();
            if let Err(e) = service.check_upload_size(size) {
                eprintln!("Error storing file: {}", e.user_message());
                return Err(e.into());
            }
            let bytes = std::fs::read(&file)?;

            match service.store_upload(&UploadRequest {
                bytes: &bytes,
                original_name: &original_name,
                mime_type: &mime_type,
                category,
                facility_id: &facility,
                period: &period,
            }) {
                Ok(stored) => println!("{}", serde_json::to_string_pretty(&stored)?),
                Err(e) => {
                    eprintln!("Error storing file: {}", e.user_message());
                    return Err(e.into());
                }
            }
        }
        Some(Commands::Sweep { retention_days }) => {
            let config = match retention_days {
                Some(days) => StorageConfig::new(
                    config.storage_root().to_path_buf(),
                    days,
                    config.public_base_url().map(str::to_owned),
                    config.max_file_mb(),
                    config.sweep_interval(),
                )?,
                None => config,
            };
            let report = StorageService::new(config).sweep_now();
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Some(Commands::Url { path }) => {
            let service = StorageService::new(config);
            println!("{}", service.public_url(&path)?);
        }
        Some(Commands::Config) => {
            println!("STORAGE_ROOT={}", config.storage_root().display());
            println!("RETENTION_DAYS={}", config.retention_days());
            println!(
                "PUBLIC_BASE_URL={}",
                config.public_base_url().unwrap_or("(unset, URLs are root-relative)")
            );
            println!("MAX_FILE_MB={}", config.max_file_mb());
            println!("SWEEP_INTERVAL_SECS={}", config.sweep_interval().as_secs());
        }
        None => {
            println!("Use 'facility --help' for commands");
        }
    }

    Ok(())
}

/// Best-effort MIME type from a filename's extension.
fn guess_mime(filename: &str) -> &'static str {
    match extension_of(filename).as_deref() {
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("pdf") => "application/pdf",
        _ => "application/octet-stream",
    }
}
