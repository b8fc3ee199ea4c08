use crate::config::Config;
use crate::error::Result;
use crate::loader::{load_file, LoadOptions};
use crate::storage::DocumentStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, info_span, instrument, Instrument};
use uuid::Uuid;

/// Outcome of loading one file
#[derive(Debug, Clone, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    pub rows_loaded: usize,
    pub rows_skipped: usize,
    pub inserted: u64,
}

/// Result of a complete run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_id: Uuid,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub dry_run: bool,
    pub collection: Option<String>,
    pub deleted: u64,
    pub files: Vec<FileReport>,
}

impl RunSummary {
    pub fn duration(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }

    pub fn rows_loaded(&self) -> usize {
        self.files.iter().map(|f| f.rows_loaded).sum()
    }

    pub fn rows_skipped(&self) -> usize {
        self.files.iter().map(|f| f.rows_skipped).sum()
    }

    pub fn inserted(&self) -> u64 {
        self.files.iter().map(|f| f.inserted).sum()
    }

    /// Pretty-printed JSON, as written by `run --json`
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Run state before the collection has been cleared
pub struct Connected;

/// Run state after the one clear of this run
pub struct Cleared {
    deleted: u64,
}

/// One load run against a store. Files can only be loaded once the run has
/// moved to [`Cleared`], and the move happens exactly once.
pub struct LoadRun<'a, S> {
    store: &'a dyn DocumentStore,
    collection: &'a str,
    options: LoadOptions,
    files: Vec<FileReport>,
    state: S,
}

impl<'a> LoadRun<'a, Connected> {
    pub fn new(store: &'a dyn DocumentStore, collection: &'a str, options: LoadOptions) -> Self {
        Self {
            store,
            collection,
            options,
            files: Vec::new(),
            state: Connected,
        }
    }

    pub async fn clear(self) -> Result<LoadRun<'a, Cleared>> {
        info!("🗑️ Deleting all documents from collection: {}", self.collection);
        let deleted = self.store.clear(self.collection).await?;
        info!("Deleted {} documents.", deleted);

        Ok(LoadRun {
            store: self.store,
            collection: self.collection,
            options: self.options,
            files: self.files,
            state: Cleared { deleted },
        })
    }
}

impl<'a> LoadRun<'a, Cleared> {
    /// Read, normalize and insert one file. Nothing is inserted unless the
    /// whole file loads.
    pub async fn load_file(&mut self, path: &Path) -> Result<FileReport> {
        info!("Processing {}", path.display());
        let loaded = load_file(path, &self.options)?;

        let inserted = self.store.insert_batch(self.collection, &loaded.records).await?;
        info!("💾 Inserted {} documents from {}", inserted, path.display());

        let report = FileReport {
            path: path.to_path_buf(),
            rows_loaded: loaded.records.len(),
            rows_skipped: loaded.skipped_rows,
            inserted,
        };
        self.files.push(report.clone());
        Ok(report)
    }

    pub fn deleted(&self) -> u64 {
        self.state.deleted
    }

    pub fn finish(self) -> (u64, Vec<FileReport>) {
        (self.state.deleted, self.files)
    }
}

/// Regular files directly under `dir` whose name ends in `.csv`, any case,
/// sorted by file name.
pub fn discover_csv_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let with_dir = |e: io::Error| io::Error::new(e.kind(), format!("{}: {}", dir.display(), e));

    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(with_dir)? {
        let path = entry.map_err(with_dir)?.path();
        let is_csv = path
            .file_name()
            .map(|name| name.to_string_lossy().to_lowercase().ends_with(".csv"))
            .unwrap_or(false);
        if is_csv && path.is_file() {
            files.push(path);
        }
    }
    files.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    Ok(files)
}

pub struct Pipeline;

impl Pipeline {
    /// Clear the configured collection once, then load every CSV file of the
    /// input directory into it, one file at a time.
    pub async fn run(store: Arc<dyn DocumentStore>, config: &Config) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        let span = info_span!("load_run", %run_id);
        Self::run_inner(run_id, store, config).instrument(span).await
    }

    async fn run_inner(
        run_id: Uuid,
        store: Arc<dyn DocumentStore>,
        config: &Config,
    ) -> Result<RunSummary> {
        let started_at = Utc::now();
        info!("🚀 ETL run started at {}", started_at);

        let options = LoadOptions::from_input(&config.input)?;
        let files = discover_csv_files(&config.input.dir)?;
        info!("Found {} CSV files in {}", files.len(), config.input.dir.display());

        let collection = config.store.collection.as_str();
        let mut run = LoadRun::new(&*store, collection, options).clear().await?;
        for file in &files {
            run.load_file(file).await?;
        }
        let (deleted, reports) = run.finish();

        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            dry_run: false,
            collection: Some(collection.to_string()),
            deleted,
            files: reports,
        };
        info!(
            "🏁 ETL completed at {}, duration: {}ms, {} documents inserted",
            summary.finished_at,
            summary.duration().num_milliseconds(),
            summary.inserted()
        );
        Ok(summary)
    }

    /// Discover and normalize every file without touching a store
    #[instrument(skip(config), fields(run_id = tracing::field::Empty))]
    pub fn dry_run(config: &Config) -> Result<RunSummary> {
        let run_id = Uuid::new_v4();
        tracing::Span::current().record("run_id", tracing::field::display(run_id));
        let started_at = Utc::now();
        info!("🔍 Dry run started at {}", started_at);

        let options = LoadOptions::from_input(&config.input)?;
        let files = discover_csv_files(&config.input.dir)?;
        info!("Found {} CSV files in {}", files.len(), config.input.dir.display());

        let mut reports = Vec::with_capacity(files.len());
        for file in &files {
            let loaded = load_file(file, &options)?;
            reports.push(FileReport {
                path: file.clone(),
                rows_loaded: loaded.records.len(),
                rows_skipped: loaded.skipped_rows,
                inserted: 0,
            });
        }

        let summary = RunSummary {
            run_id,
            started_at,
            finished_at: Utc::now(),
            dry_run: true,
            collection: None,
            deleted: 0,
            files: reports,
        };
        info!(
            "🏁 Dry run completed, {} rows would be inserted",
            summary.rows_loaded()
        );
        Ok(summary)
    }
}
