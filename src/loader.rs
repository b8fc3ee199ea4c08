use crate::config::{InputConfig, InvalidRowPolicy};
use crate::error::{LoaderError, Result};
use crate::transform::transform_row;
use crate::types::{NormalizedRecord, RawRow};
use std::path::Path;
use tracing::{info, instrument, warn};

/// How a file is read and what happens to rows that fail normalization
#[derive(Debug, Clone, Copy)]
pub struct LoadOptions {
    pub delimiter: u8,
    pub on_invalid_row: InvalidRowPolicy,
}

impl Default for LoadOptions {
    fn default() -> Self {
        Self {
            delimiter: b';',
            on_invalid_row: InvalidRowPolicy::Abort,
        }
    }
}

impl LoadOptions {
    pub fn from_input(input: &InputConfig) -> Result<Self> {
        Ok(Self {
            delimiter: input.delimiter_byte()?,
            on_invalid_row: input.on_invalid_row,
        })
    }
}

/// Normalized records of one file, in row order
#[derive(Debug, Clone, Default)]
pub struct LoadedFile {
    pub records: Vec<NormalizedRecord>,
    pub skipped_rows: usize,
}

/// Read one delimited file and normalize every row.
///
/// The whole file is read before anything is returned; under
/// [`InvalidRowPolicy::Abort`] one bad row fails the file.
#[instrument(skip_all, fields(file = %path.display()))]
pub fn load_file(path: &Path, options: &LoadOptions) -> Result<LoadedFile> {
    info!("📖 Reading {}", path.display());

    let file_read = |message: String| LoaderError::FileRead {
        path: path.to_path_buf(),
        message,
    };

    let mut reader = csv::ReaderBuilder::new()
        .delimiter(options.delimiter)
        .has_headers(true)
        .from_path(path)
        .map_err(|e| file_read(e.to_string()))?;

    let headers = reader
        .headers()
        .map_err(|e| file_read(e.to_string()))?
        .clone();
    if headers.is_empty() {
        return Err(file_read("missing header row".to_string()));
    }

    let mut loaded = LoadedFile::default();
    for (index, result) in reader.records().enumerate() {
        let row_number = index + 1;
        let record = result.map_err(|e| file_read(e.to_string()))?;
        let raw = RawRow::from_record(&headers, &record);

        match transform_row(&raw) {
            Ok(normalized) => loaded.records.push(normalized),
            Err(e) => match options.on_invalid_row {
                InvalidRowPolicy::Abort => {
                    return Err(LoaderError::Transform {
                        path: path.to_path_buf(),
                        row: row_number,
                        source: e,
                    });
                }
                InvalidRowPolicy::Skip => {
                    warn!("Skipping row {} of {}: {}", row_number, path.display(), e);
                    loaded.skipped_rows += 1;
                }
            },
        }
    }

    if loaded.skipped_rows > 0 {
        info!(
            "✅ {} rows loaded from {} ({} skipped)",
            loaded.records.len(),
            path.display(),
            loaded.skipped_rows
        );
    } else {
        info!("✅ {} rows loaded from {}", loaded.records.len(), path.display());
    }
    Ok(loaded)
}
