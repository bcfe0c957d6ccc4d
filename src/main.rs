//! Pelagius - load order master lists for modding communities.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pelagius::{
    api::{self, ApiState},
    files::{ReasonsMap, SkipSet},
    store::validate_member,
    FileArchiver, StoreConfig, TenantId, TenantStore,
};

/// Load order master list service.
#[derive(Parser)]
#[command(name = "pelagius", about = "Load order master lists and reconciliation")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the REST API daemon.
    Daemon {
        /// Address to bind the API server.
        #[arg(long, default_value = "0.0.0.0:7878", env = "PELAGIUS_BIND")]
        bind: String,

        /// Root directory holding one directory per tenant.
        #[arg(long, env = "PELAGIUS_DATA_DIR")]
        data_dir: Option<PathBuf>,

        /// Validate updates before they replace the canonical file.
        #[arg(long, env = "PELAGIUS_STAGED_UPDATES")]
        staged_updates: bool,
    },

    /// Compare a load order against a master list offline.
    Compare {
        /// Master load order file.
        #[arg(long)]
        master: PathBuf,

        /// Submitted load order file.
        #[arg(long)]
        submitted: PathBuf,

        /// Skip list file, one entry per line.
        #[arg(long)]
        skips: Option<PathBuf>,

        /// Reasons file, a JSON object of entry to reason.
        #[arg(long)]
        reasons: Option<PathBuf>,
    },

    /// Archive a tenant's canonical file.
    Archive {
        /// Root directory holding one directory per tenant.
        #[arg(long, env = "PELAGIUS_DATA_DIR")]
        data_dir: Option<PathBuf>,

        /// Tenant ID.
        #[arg(long)]
        tenant: String,

        /// File type to archive.
        #[arg(long)]
        file_type: String,

        /// Tenant owner. Loading restores it to staff if missing, so it
        /// must be the real owner.
        #[arg(long)]
        owner: String,
    },

    /// Show daemon status.
    Status {
        /// Pelagius API URL.
        #[arg(long, env = "PELAGIUS_API_URL", default_value = "http://localhost:7878")]
        api_url: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "pelagius=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Daemon {
            bind,
            data_dir,
            staged_updates,
        } => {
            run_daemon(&bind, data_dir, staged_updates).await?;
        }

        Commands::Compare {
            master,
            submitted,
            skips,
            reasons,
        } => {
            run_compare(&master, &submitted, skips.as_deref(), reasons.as_deref()).await?;
        }

        Commands::Archive {
            data_dir,
            tenant,
            file_type,
            owner,
        } => {
            run_archive(data_dir, tenant, &file_type, &owner).await?;
        }

        Commands::Status { api_url } => {
            show_status(&api_url).await?;
        }
    }

    Ok(())
}

fn store_config(data_dir: Option<PathBuf>) -> StoreConfig {
    match data_dir {
        Some(dir) => StoreConfig::new(dir),
        None => StoreConfig::default(),
    }
}

/// Run the API daemon.
async fn run_daemon(bind: &str, data_dir: Option<PathBuf>, staged_updates: bool) -> Result<()> {
    let config = store_config(data_dir).with_staged_updates(staged_updates);

    tracing::info!(
        data_dir = %config.data_dir.display(),
        staged_updates,
        "Starting pelagius daemon..."
    );

    tokio::fs::create_dir_all(&config.data_dir)
        .await
        .with_context(|| format!("creating {}", config.data_dir.display()))?;

    let state = Arc::new(ApiState::new(TenantStore::new(config)));
    api::serve(state, bind).await?;

    Ok(())
}

/// Compare local files and print the report.
async fn run_compare(
    master: &Path,
    submitted: &Path,
    skips: Option<&Path>,
    reasons: Option<&Path>,
) -> Result<()> {
    let master = read_text(master).await?;
    let submitted = read_text(submitted).await?;

    let skips = match skips {
        Some(path) => SkipSet::parse(&read_text(path).await?),
        None => SkipSet::default(),
    };
    let reasons = match reasons {
        Some(path) => ReasonsMap::parse(&read_text(path).await?)
            .with_context(|| format!("parsing {}", path.display()))?,
        None => ReasonsMap::default(),
    };

    let report = pelagius::compare(&master, &submitted, &skips, &reasons);
    if report.is_empty() {
        println!("Load order matches.");
    } else {
        print!("{}", report);
    }

    Ok(())
}

/// Read a local file as text, replacing invalid UTF-8.
async fn read_text(path: &Path) -> Result<String> {
    let bytes = tokio::fs::read(path)
        .await
        .with_context(|| format!("reading {}", path.display()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Archive one canonical file of a tenant.
async fn run_archive(
    data_dir: Option<PathBuf>,
    tenant: String,
    file_type: &str,
    owner: &str,
) -> Result<()> {
    let tenant = TenantId::new(tenant)?;
    validate_member(owner)?;
    let store = Arc::new(TenantStore::new(store_config(data_dir)));
    store.load(&tenant, owner).await;

    let archiver = FileArchiver::new(store);
    match archiver.archive_if_present(&tenant, file_type).await? {
        Some(path) => println!("Archived to {}", path.display()),
        None => println!("No {} file to archive.", file_type),
    }

    Ok(())
}

/// Show daemon status via API.
async fn show_status(api_url: &str) -> Result<()> {
    let client = reqwest::Client::new();
    let url = format!("{}/api/v1/status", api_url);

    let response = client.get(&url).send().await?;

    if !response.status().is_success() {
        anyhow::bail!("Failed to get status: {}", response.status());
    }

    let status: serde_json::Value = response.json().await?;

    println!("Pelagius Status");
    println!("===============");
    println!("Status:         {}", status["status"]);
    println!("Tenants loaded: {}", status["tenants"]);
    println!("Data dir:       {}", status["data_dir"]);
    println!("Staged updates: {}", status["staged_updates"]);

    Ok(())
}
