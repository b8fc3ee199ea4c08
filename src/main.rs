use clap::{Parser, Subcommand};
use patient_loader::config::{Config, InvalidRowPolicy};
use patient_loader::db::MongoStore;
use patient_loader::logging;
use patient_loader::pipeline::{Pipeline, RunSummary};
use patient_loader::storage::{DocumentStore, InMemoryStore};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{error, info};

#[derive(Parser)]
#[command(name = "patient_loader")]
#[command(about = "Load patient CSV exports into MongoDB")]
#[command(version)]
struct Cli {
    /// Config file (defaults to ./loader.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// MongoDB connection string
    #[arg(long, global = true)]
    uri: Option<String>,

    /// Target database
    #[arg(long, global = true)]
    database: Option<String>,

    /// Target collection
    #[arg(long, global = true)]
    collection: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Clear the collection, then load every CSV file of the input directory
    Run {
        /// Directory holding the CSV files
        #[arg(long)]
        input_dir: Option<PathBuf>,
        /// Read and normalize the files without connecting to the database
        #[arg(long)]
        dry_run: bool,
        /// Load into a throwaway in-memory store instead of MongoDB
        #[arg(long, conflicts_with = "dry_run")]
        in_memory: bool,
        /// Log and skip rows that fail normalization instead of failing the file
        #[arg(long)]
        skip_invalid_rows: bool,
        /// Print the run summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Delete every document in the collection
    Clear {
        /// Do not ask for confirmation
        #[arg(long)]
        yes: bool,
    },
}

fn build_config(cli: &Cli) -> anyhow::Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    config.apply_env(|key| std::env::var(key).ok());

    if let Some(uri) = &cli.uri {
        config.store.uri = uri.clone();
    }
    if let Some(database) = &cli.database {
        config.store.database = database.clone();
    }
    if let Some(collection) = &cli.collection {
        config.store.collection = collection.clone();
    }
    if let Commands::Run {
        input_dir,
        skip_invalid_rows,
        ..
    } = &cli.command
    {
        if let Some(dir) = input_dir {
            config.input.dir = dir.clone();
        }
        if *skip_invalid_rows {
            config.input.on_invalid_row = InvalidRowPolicy::Skip;
        }
    }

    config.validate()?;
    Ok(config)
}

fn print_summary(summary: &RunSummary, json: bool) -> anyhow::Result<()> {
    if json {
        println!("{}", summary.to_json()?);
        return Ok(());
    }

    println!("\n📊 Run {}:", summary.run_id);
    for file in &summary.files {
        println!(
            "   {}: {} rows loaded, {} skipped, {} inserted",
            file.path.display(),
            file.rows_loaded,
            file.rows_skipped,
            file.inserted
        );
    }
    if !summary.dry_run {
        println!("   Deleted before load: {}", summary.deleted);
    }
    println!("   Total rows loaded: {}", summary.rows_loaded());
    println!("   Total inserted: {}", summary.inserted());
    println!("   Duration: {}ms", summary.duration().num_milliseconds());
    Ok(())
}

async fn execute(cli: Cli, config: Config) -> anyhow::Result<()> {
    match cli.command {
        Commands::Run {
            dry_run,
            in_memory,
            json,
            ..
        } => {
            let summary = if dry_run {
                Pipeline::dry_run(&config)?
            } else {
                let store: Arc<dyn DocumentStore> = if in_memory {
                    Arc::new(InMemoryStore::new())
                } else {
                    Arc::new(MongoStore::connect(&config.store).await?)
                };
                Pipeline::run(store, &config).await?
            };
            print_summary(&summary, json)?;
        }
        Commands::Clear { yes } => {
            if !yes {
                println!(
                    "⚠️  WARNING: This will delete ALL documents from '{}.{}'!",
                    config.store.database, config.store.collection
                );
                println!("Press Enter to continue or Ctrl+C to cancel...");
                let mut input = String::new();
                std::io::stdin().read_line(&mut input)?;
            }

            let store = MongoStore::connect(&config.store).await?;
            let deleted = store.clear(&config.store.collection).await?;
            info!("Deleted {} documents from {}", deleted, config.store.collection);
            println!("✅ Deleted {} documents", deleted);
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenv::dotenv().ok();

    let cli = Cli::parse();
    let config = build_config(&cli)?;

    // Keep the guard alive until the run ends so the log file is flushed
    let _log_guard = logging::init_logging(&config.logging)?;
    info!(
        "Starting patient_loader (database={}, collection={})",
        config.store.database, config.store.collection
    );

    let result = execute(cli, config).await;
    if let Err(e) = &result {
        error!("❌ Run aborted: {:#}", e);
    }
    result
}
