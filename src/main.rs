use anyhow::{Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use newsflow::config::Config;
use newsflow::feed::{build_client, HttpFeedSource};
use newsflow::pipeline::Pipeline;
use newsflow::query::{list_articles, ListArticlesParams};
use newsflow::storage::{Database, StorageError};

/// Exit status for failures a later run may not hit (EX_TEMPFAIL)
const EXIT_TRANSIENT: i32 = 75;
const EXIT_INTERRUPTED: i32 = 130;

/// Get the config directory path (~/.config/newsflow/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("newsflow"))
}

/// Create the config directory with user-only permissions if it is missing
fn ensure_config_dir(config_dir: &Path) -> Result<()> {
    if config_dir.exists() {
        return Ok(());
    }
    std::fs::create_dir_all(config_dir).context("Failed to create config directory")?;
    tracing::info!(path = %config_dir.display(), "Created config directory");

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o700);
        if let Err(e) = std::fs::set_permissions(config_dir, perms) {
            tracing::warn!(
                path = %config_dir.display(),
                error = %e,
                "Failed to set config directory permissions to 0700"
            );
        }
    }
    Ok(())
}

#[derive(Parser, Debug)]
#[command(
    name = "newsflow",
    version,
    about = "Ingest news articles into SQLite and query them"
)]
struct Args {
    /// Config file (default: ~/.config/newsflow/config.toml)
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    /// SQLite database file (overrides config and NEWSFLOW_DATABASE)
    #[arg(long, value_name = "FILE", global = true)]
    database: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch the feed once and upsert its articles
    Ingest,
    /// Print one page of articles as JSON
    List(ListArgs),
    /// Print a single article as JSON
    Show {
        /// Article id
        id: i64,
    },
    /// Print the number of stored articles
    Stats,
}

#[derive(clap::Args, Debug)]
struct ListArgs {
    #[arg(long, allow_negative_numbers = true)]
    skip: Option<i64>,

    /// Page size, 1 to 100
    #[arg(long, allow_negative_numbers = true)]
    limit: Option<i64>,

    /// date, title or category
    #[arg(long)]
    sort_by: Option<String>,

    /// asc or desc
    #[arg(long)]
    sort_order: Option<String>,

    #[arg(long)]
    category: Option<String>,

    #[arg(long)]
    language: Option<String>,

    /// Exact publication date, YYYY-MM-DD
    #[arg(long, value_name = "DATE")]
    published_at: Option<NaiveDate>,

    /// Case-insensitive substring of title or description
    #[arg(long)]
    search: Option<String>,
}

impl From<ListArgs> for ListArticlesParams {
    fn from(args: ListArgs) -> Self {
        Self {
            skip: args.skip,
            limit: args.limit,
            sort_by: args.sort_by,
            sort_order: args.sort_order,
            category: args.category,
            language: args.language,
            published_at: args.published_at,
            search: args.search,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so JSON on stdout stays machine-readable
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?
        .apply_env(|name| std::env::var(name).ok());
    tracing::debug!(config = ?config, "Effective configuration");

    let db_path = match args.database.clone().or_else(|| config.database_path.clone()) {
        Some(path) => path,
        None => {
            ensure_config_dir(&config_dir)?;
            config_dir.join("news.db")
        }
    };
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;

    let db = match Database::open_with_timeout(db_path_str, config.storage_timeout()).await {
        Ok(db) => db,
        Err(StorageError::Busy) => {
            eprintln!("Error: The database is locked by another process. Try again shortly.");
            std::process::exit(EXIT_TRANSIENT);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open database: {}", e)),
    };

    match args.command {
        Command::Ingest => run_ingest(db, &config).await,
        Command::List(list_args) => {
            db.ensure_schema().await.context("Failed to prepare database")?;
            let page = list_articles(&db, list_args.into())
                .await
                .context("Failed to query articles")?;
            println!("{}", serde_json::to_string_pretty(&page)?);
            Ok(())
        }
        Command::Show { id } => {
            db.ensure_schema().await.context("Failed to prepare database")?;
            match db.get_article(id).await.context("Failed to load article")? {
                Some(article) => {
                    println!("{}", serde_json::to_string_pretty(&article)?);
                    Ok(())
                }
                None => {
                    eprintln!("Error: No article with id {id}");
                    std::process::exit(1);
                }
            }
        }
        Command::Stats => {
            db.ensure_schema().await.context("Failed to prepare database")?;
            let total = db.count_articles().await.context("Failed to count articles")?;
            println!("{total} articles in {}", db_path.display());
            Ok(())
        }
    }
}

async fn run_ingest(db: Database, config: &Config) -> Result<()> {
    if config.access_key.is_none() {
        tracing::warn!("No access key configured (set NEWS_API_KEY or access_key)");
    }

    let client = build_client().context("Failed to build HTTP client")?;
    let source =
        HttpFeedSource::from_config(client, config).context("Invalid feed configuration")?;
    let pipeline = Pipeline::new(source, db);

    let outcome = tokio::select! {
        result = pipeline.run() => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    };

    match outcome {
        Some(Ok(report)) => {
            println!(
                "Fetched {}, loaded {} ({} new, {} updated), {} duplicate, {} without URL, {} bad dates",
                report.fetched,
                report.loaded,
                report.inserted,
                report.updated,
                report.duplicates_in_batch,
                report.without_url,
                report.date_warnings,
            );
            Ok(())
        }
        Some(Err(e)) => {
            tracing::error!(
                step = e.step(),
                transient = e.is_transient(),
                error = %e,
                "Ingestion failed"
            );
            eprintln!("Error: {e}");
            std::process::exit(if e.is_transient() { EXIT_TRANSIENT } else { 1 });
        }
        None => {
            // The run future is dropped by now, so its transaction rolled back
            tracing::warn!("Interrupted, nothing from this run was stored");
            std::process::exit(EXIT_INTERRUPTED);
        }
    }
}
