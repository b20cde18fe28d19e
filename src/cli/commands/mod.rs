//! CLI commands implementation.
//!
//! This module contains the CLI parser and dispatches to command-specific modules.

mod documents;
mod download;
mod init;
mod tender;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Settings;

#[derive(Parser)]
#[command(name = "tender")]
#[command(about = "Procurement tender document acquisition")]
#[command(version)]
pub struct Cli {
    /// Config file path (defaults to ./tenderacquire.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Check if verbose mode is enabled (for early logging setup).
pub fn is_verbose() -> bool {
    std::env::args().any(|arg| arg == "-v" || arg == "--verbose")
}

#[derive(Subcommand)]
enum Commands {
    /// Create the storage directory and database
    Init,

    /// Register a tender and its category links
    AddTender {
        /// Tender ID
        id: i64,
        /// Category links as a JSON object, e.g. '{"tech_spec": "https://..."}'
        #[arg(long)]
        links: String,
        /// Tender title
        #[arg(long)]
        title: Option<String>,
    },

    /// Acquire every document of a tender
    Process {
        /// Tender ID
        tender_id: i64,
        /// Skip the headless browser; goods lists use static HTML only
        #[arg(long)]
        no_browser: bool,
        /// Print a readable summary instead of the JSON result
        #[arg(long)]
        summary: bool,
    },

    /// Download a single URL into a tender category
    Download {
        /// Tender ID
        tender_id: i64,
        /// Category code (e.g. tech_spec)
        category: String,
        /// URL to download
        url: String,
        /// Display name for the stored document
        #[arg(long)]
        name: Option<String>,
        /// Extension used when the file type cannot be detected
        #[arg(long)]
        ext: Option<String>,
    },

    /// List attachment links found on a content page
    Resolve {
        /// Content page URL
        url: String,
    },

    /// List stored documents of a tender
    Documents {
        /// Tender ID
        tender_id: i64,
    },

    /// Queue documents for analysis (archives are never queued)
    Queue {
        /// Document IDs
        #[arg(required = true)]
        ids: Vec<i64>,
        /// Queue all IDs at once, silently leaving archives out
        #[arg(long)]
        batch: bool,
    },

    /// Print a time-limited URL for a stored document
    SignedUrl {
        /// Document ID
        doc_id: i64,
        /// Lifetime in seconds
        #[arg(long, default_value = "3600")]
        expires: u64,
    },
}

pub async fn run() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load(cli.config.as_deref())
        .await
        .map_err(anyhow::Error::msg)?;

    match cli.command {
        Commands::Init => init::cmd_init(&settings).await,
        Commands::AddTender { id, links, title } => {
            tender::cmd_add_tender(&settings, id, &links, title).await
        }
        Commands::Process {
            tender_id,
            no_browser,
            summary,
        } => tender::cmd_process(&settings, tender_id, !no_browser, summary).await,
        Commands::Download {
            tender_id,
            category,
            url,
            name,
            ext,
        } => {
            download::cmd_download(
                &settings,
                tender_id,
                &category,
                &url,
                name.as_deref(),
                ext.as_deref(),
            )
            .await
        }
        Commands::Resolve { url } => download::cmd_resolve(&settings, &url).await,
        Commands::Documents { tender_id } => {
            documents::cmd_documents(&settings, tender_id).await
        }
        Commands::Queue { ids, batch } => documents::cmd_queue(&settings, &ids, batch).await,
        Commands::SignedUrl { doc_id, expires } => {
            documents::cmd_signed_url(&settings, doc_id, expires).await
        }
    }
}
