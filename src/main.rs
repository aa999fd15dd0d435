use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use photo_remix::imaging::{self, payload};
use photo_remix::{HistoryStore, PhotoRecord, SqliteStorage, Studio, StudioConfig};

/// Capture, edit and keep a short history of photos
#[derive(Parser)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file (defaults to the user config directory)
    #[arg(short, long, env = "PHOTO_REMIX_CONFIG")]
    config: Option<PathBuf>,

    /// Storage database (defaults to the user data directory)
    #[arg(long, env = "PHOTO_REMIX_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect or manage the history gallery
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
    /// Downscale and re-encode an image file as JPEG
    Compress {
        input: PathBuf,
        output: PathBuf,
        /// Longest edge in pixels (defaults to the configured value)
        #[arg(long)]
        max_dimension: Option<u32>,
        /// JPEG quality in (0, 1] (defaults to the configured value)
        #[arg(long)]
        quality: Option<f32>,
    },
    /// Add a photo (and optionally its edited version) to history
    Record {
        original: PathBuf,
        /// Edited version of the photo
        #[arg(long)]
        edited: Option<PathBuf>,
        /// Description of the edit
        #[arg(short, long, default_value = "")]
        prompt: String,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List saved photos, newest first
    List,
    /// Show one saved photo
    Show { id: String },
    /// Delete one saved photo
    Remove { id: String },
    /// Delete every saved photo
    Clear,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "photo_remix=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();
    let config = StudioConfig::load(cli.config.as_deref())?;

    match cli.command {
        Commands::Compress {
            input,
            output,
            max_dimension,
            quality,
        } => {
            let max_dimension = max_dimension.unwrap_or(config.compression.max_dimension);
            let quality = quality.unwrap_or(config.compression.quality);
            compress_file(&input, &output, max_dimension, quality).await
        }
        Commands::History { action } => {
            let mut studio = open_studio(&config, cli.db.as_deref())?;
            run_history(&mut studio, action)
        }
        Commands::Record {
            original,
            edited,
            prompt,
        } => {
            let mut studio = open_studio(&config, cli.db.as_deref())?;
            let original = read_payload(&original).await?;
            let edited = match edited {
                Some(path) => Some(read_payload(&path).await?),
                None => None,
            };

            match studio.record(original, edited, &prompt).await {
                Ok(record) => {
                    let count = studio.history().len();
                    println!("✅ Saved {} ({} in history)", record.id, count);
                }
                Err(e) if e.is_quota_exceeded() => {
                    println!("⚠️  Storage is full, photo was not saved to history");
                }
                Err(e) => println!("⚠️  Photo could not be saved to history: {}", e),
            }
            Ok(())
        }
    }
}

fn open_studio(config: &StudioConfig, db: Option<&Path>) -> Result<Studio<SqliteStorage>> {
    let path = match db {
        Some(path) => path.to_path_buf(),
        None => SqliteStorage::default_db_path()
            .context("could not determine user data directory")?,
    };
    let storage = SqliteStorage::open(&path, config.storage_quota_bytes)
        .with_context(|| format!("failed to open storage at {}", path.display()))?;

    let history = HistoryStore::new(storage, config.history());
    Ok(Studio::new(history, config.compression))
}

fn run_history(studio: &mut Studio<SqliteStorage>, action: HistoryAction) -> Result<()> {
    match action {
        HistoryAction::List => {
            let records = studio.history();
            if records.is_empty() {
                println!("History is empty.");
            }
            for record in &records {
                println!("{}", summary_line(record));
            }
        }
        HistoryAction::Show { id } => {
            let Some(record) = studio.history_store().get(&id) else {
                bail!("no history record with id {}", id);
            };
            println!("id:        {}", record.id);
            println!("timestamp: {}", record.timestamp);
            println!("prompt:    {}", record.prompt);
            println!("original:  {}", describe_payload(&record.original_image));
            match &record.edited_image {
                Some(edited) => println!("edited:    {}", describe_payload(edited)),
                None => println!("edited:    (none)"),
            }
        }
        HistoryAction::Remove { id } => {
            let remaining = studio.delete_record(&id);
            println!("🗑️  {} photos left in history", remaining.len());
        }
        HistoryAction::Clear => {
            studio.clear_history()?;
            println!("History cleared.");
        }
    }
    Ok(())
}

fn summary_line(record: &PhotoRecord) -> String {
    let state = if record.is_edited() { "edited" } else { "original" };
    format!("{}  {}  [{}]  {}", record.id, record.timestamp, state, record.prompt)
}

/// Human-readable description of a stored image
fn describe_payload(image: &str) -> String {
    match (payload::parse_data_uri(image), imaging::compress::dimensions(image)) {
        (Ok(uri), Ok((width, height))) => {
            let kb = uri.bytes.len() as f64 / 1024.0;
            format!("{} {}x{} ({:.1} KB)", uri.mime_type, width, height, kb)
        }
        (Ok(uri), Err(_)) => format!("{} ({} bytes, undecodable)", uri.mime_type, uri.bytes.len()),
        (Err(_), _) => image.to_string(),
    }
}

/// Read an image file as a data URI
async fn read_payload(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("failed to read {}", path.display()))?;
    let format = image::guess_format(&bytes)
        .with_context(|| format!("{} is not a supported image", path.display()))?;
    Ok(payload::to_data_uri(format.to_mime_type(), &bytes))
}

async fn compress_file(
    input: &Path,
    output: &Path,
    max_dimension: u32,
    quality: f32,
) -> Result<()> {
    let source = read_payload(input).await?;
    let compressed = imaging::compress(source.clone(), max_dimension, quality).await?;

    let uri = payload::parse_data_uri(&compressed)?;
    tokio::fs::write(output, &uri.bytes)
        .await
        .with_context(|| format!("failed to write {}", output.display()))?;

    let before = payload::payload_size(&source).unwrap_or_default();
    let (width, height) = imaging::compress::dimensions(&compressed)?;
    println!(
        "📸 {} → {} ({}x{}, {:.1} KB → {:.1} KB)",
        input.display(),
        output.display(),
        width,
        height,
        before as f64 / 1024.0,
        uri.bytes.len() as f64 / 1024.0
    );
    Ok(())
}
