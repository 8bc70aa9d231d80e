use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use serde::Serialize;
use serde_json::Value;
use smartpdf_core::SessionContext;
use smartpdf_model::{DocumentId, DocumentRef, OcrResult, PickedFile};
use smartpdf_storage::{Clock, StorageConfig, SystemClock};
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Debug, Parser)]
#[command(name = "smartpdf-cli")]
#[command(about = "Inspect and edit the SmartPDF local caches")]
pub struct Cli {
    /// Directory holding the cache files (overrides SMARTPDF_DATA_DIR).
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Recently opened documents.
    Recent {
        #[command(subcommand)]
        action: RecentCommand,
    },
    /// Cached OCR results.
    Ocr {
        #[command(subcommand)]
        action: OcrCommand,
    },
    /// App settings.
    Settings {
        #[command(subcommand)]
        action: SettingsCommand,
    },
    /// Print CLI version.
    Version,
}

#[derive(Debug, Subcommand)]
enum RecentCommand {
    /// Print the recent files, most recent first.
    List,
    /// Record a file as just opened.
    Add {
        #[arg(value_name = "FILE")]
        file: PathBuf,
        #[arg(long, default_value = "application/pdf")]
        mime_type: String,
    },
    /// Forget one document.
    Remove {
        #[arg(value_name = "ID")]
        id: String,
    },
    /// Forget every document.
    Clear,
}

#[derive(Debug, Subcommand)]
enum OcrCommand {
    /// Print every cached page of a document.
    Show {
        #[arg(value_name = "DOC")]
        document: String,
    },
    /// Print one cached page, or null on a miss.
    Get {
        #[arg(value_name = "DOC")]
        document: String,
        #[arg(value_name = "PAGE")]
        page: u32,
    },
    /// Cache text for one page.
    Set {
        #[arg(value_name = "DOC")]
        document: String,
        #[arg(value_name = "PAGE")]
        page: u32,
        #[arg(value_name = "TEXT")]
        text: String,
        #[arg(long, default_value_t = 1.0)]
        confidence: f32,
    },
    /// Remove cached OCR results, for one document or all of them.
    Clear {
        #[arg(long, value_name = "DOC")]
        document: Option<String>,
    },
}

#[derive(Debug, Subcommand)]
enum SettingsCommand {
    /// Print all settings, defaults included.
    Show,
    /// Set one key. VALUE is parsed as JSON, falling back to a plain string.
    Set {
        #[arg(value_name = "KEY")]
        key: String,
        #[arg(value_name = "VALUE")]
        value: String,
    },
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PageOutput {
    document_id: String,
    page_number: u32,
    text: String,
    confidence: Option<f32>,
    source: &'static str,
}

/// Logs go to stderr so stdout stays valid JSON.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).with_writer(std::io::stderr).try_init();
}

pub fn run<I, T>(args: I) -> Result<()>
where
    I: IntoIterator<Item = T>,
    T: Into<OsString> + Clone,
{
    let cli = Cli::parse_from(args);

    if let Commands::Version = cli.command {
        println!("{}", env!("CARGO_PKG_VERSION"));
        return Ok(());
    }

    let mut config = StorageConfig::from_env().context("invalid storage configuration")?;
    if let Some(dir) = cli.data_dir {
        config = config.with_data_dir(dir);
    }
    tracing::debug!(data_dir = %config.data_dir.display(), "using data directory");

    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("failed to start async runtime")?;

    runtime.block_on(async {
        let session = SessionContext::from_config(&config);
        match cli.command {
            Commands::Recent { action } => run_recent(&session, action).await,
            Commands::Ocr { action } => run_ocr(&session, action).await,
            Commands::Settings { action } => run_settings(&session, action).await,
            Commands::Version => Ok(()),
        }
    })
}

async fn run_recent(session: &SessionContext, action: RecentCommand) -> Result<()> {
    match action {
        RecentCommand::List => print_json(&session.refresh_recent_files().await),
        RecentCommand::Add { file, mime_type } => {
            let picked = picked_file(&file, mime_type)?;
            let doc = DocumentRef::from_picked(picked, SystemClock.now_millis());
            let id = doc.id.clone();

            if !session.add_recent_file(doc).await {
                anyhow::bail!("could not record {} as a recent file", file.display());
            }
            let stored = session
                .recent_files()
                .await
                .into_iter()
                .find(|doc| doc.id == id)
                .context("recorded file fell outside the recent-files capacity")?;
            print_json(&stored)
        }
        RecentCommand::Remove { id } => {
            if !session.remove_recent_file(&DocumentId::new(id.as_str())).await {
                anyhow::bail!("could not remove recent file {id}");
            }
            print_json(&session.recent_files().await)
        }
        RecentCommand::Clear => {
            if !session.clear_recent_files().await {
                anyhow::bail!("could not clear recent files");
            }
            print_json(&session.recent_files().await)
        }
    }
}

async fn run_ocr(session: &SessionContext, action: OcrCommand) -> Result<()> {
    let cache = session.ocr_cache();

    match action {
        OcrCommand::Show { document } => {
            let results = cache.get_all(&DocumentId::new(document)).await.unwrap_or_default();
            print_json(&results)
        }
        OcrCommand::Get { document, page } => {
            if page == 0 {
                anyhow::bail!("PAGE is 1-based and must be >= 1");
            }
            let id = DocumentId::new(document.as_str());

            let output = match cache.get_result(&id, page).await {
                Some(result) => Some(PageOutput {
                    document_id: document,
                    page_number: page,
                    text: result.text,
                    confidence: Some(result.confidence),
                    source: "cache",
                }),
                None => cache.get_page(&id, page).await.map(|text| PageOutput {
                    document_id: document,
                    page_number: page,
                    text,
                    confidence: None,
                    source: "legacy",
                }),
            };
            print_json(&output)
        }
        OcrCommand::Set { document, page, text, confidence } => {
            if page == 0 {
                anyhow::bail!("PAGE is 1-based and must be >= 1");
            }
            let id = DocumentId::new(document);
            let result = OcrResult::new(page, text, confidence);

            if !cache.merge_result(&id, result.clone()).await {
                anyhow::bail!("could not cache OCR text for {id} page {page}");
            }
            print_json(&result)
        }
        OcrCommand::Clear { document } => {
            let cleared = match &document {
                Some(document) => session.clear_ocr_cache(&DocumentId::new(document.as_str())).await,
                None => cache.clear_cache().await,
            };
            if !cleared {
                anyhow::bail!("could not fully clear the OCR cache");
            }
            print_json(&serde_json::json!({ "cleared": document.unwrap_or_else(|| "*".to_owned()) }))
        }
    }
}

async fn run_settings(session: &SessionContext, action: SettingsCommand) -> Result<()> {
    match action {
        SettingsCommand::Show => print_json(&session.settings().await),
        SettingsCommand::Set { key, value } => {
            if !session.update_setting(&key, parse_setting_value(&value)).await {
                anyhow::bail!("could not save setting {key}");
            }
            print_json(&session.settings().await)
        }
    }
}

fn parse_setting_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_owned()))
}

fn picked_file(path: &Path, mime_type: String) -> Result<PickedFile> {
    if !path.exists() {
        anyhow::bail!("file does not exist: {}", path.display());
    }

    if !path.is_file() {
        anyhow::bail!("path is not a file: {}", path.display());
    }

    let absolute = path
        .canonicalize()
        .with_context(|| format!("failed to resolve {}", path.display()))?;
    let size = std::fs::metadata(&absolute)
        .with_context(|| format!("failed to read metadata of {}", path.display()))?
        .len();
    let name = absolute
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| absolute.display().to_string());

    Ok(PickedFile { name, uri: format!("file://{}", absolute.display()), size, mime_type })
}

fn print_json(value: &impl Serialize) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    println!("{json}");
    Ok(())
}
