use crate::dataset::{Dataset, Value};
use crate::error::DataLoadError;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Instant, SystemTime};

/// Load a dataset from a CSV file
///
/// The first line is the header row. Fields may be quoted; a doubled quote
/// inside a quoted field stands for one literal quote.
///
/// # Arguments
/// * `filepath` - Path to the CSV file to load
///
/// # Returns
/// * `Result<Dataset, DataLoadError>` - The loaded dataset or an error
///
/// # Examples
/// ```no_run
/// use dashboard::loader::from_csv;
///
/// match from_csv("data.csv") {
///     Ok(ds) => println!("Loaded {} rows", ds.row_count()),
///     Err(e) => eprintln!("Error loading CSV: {}", e),
/// }
/// ```
pub fn from_csv(filepath: impl AsRef<Path>) -> Result<Dataset, DataLoadError> {
    let path = filepath.as_ref();
    let content = fs::read_to_string(path).map_err(|e| DataLoadError::from_io(path, e))?;

    let mut lines = content.lines().filter(|l| !l.trim().is_empty());
    let header = match lines.next() {
        Some(line) => parse_csv_row(line),
        None => {
            return Err(DataLoadError::Empty {
                path: path.to_path_buf(),
            });
        }
    };

    let rows = lines
        .map(|line| {
            parse_csv_row(line)
                .into_iter()
                .map(|field| csv_value(&field))
                .collect()
        })
        .collect();

    Ok(Dataset::new(header, rows))
}

/// Load a dataset from the first worksheet of an Excel or OpenDocument file
///
/// The first sheet row is the header row. Integers and floats become numbers,
/// blanks and error cells become missing values, anything else is kept as text.
///
/// # Examples
/// ```no_run
/// use dashboard::loader::from_excel;
///
/// match from_excel("data.xlsx") {
///     Ok(ds) => println!("Loaded {} columns", ds.column_count()),
///     Err(e) => eprintln!("Error loading Excel: {}", e),
/// }
/// ```
pub fn from_excel(filepath: impl AsRef<Path>) -> Result<Dataset, DataLoadError> {
    use calamine::{Data, Reader, open_workbook_auto};

    let path = filepath.as_ref();
    if !path.exists() {
        return Err(DataLoadError::NotFound {
            path: path.to_path_buf(),
        });
    }

    let parse_error = |reason: String| DataLoadError::Parse {
        path: path.to_path_buf(),
        reason,
    };

    let mut workbook = open_workbook_auto(path).map_err(|e| parse_error(e.to_string()))?;

    // Get the first worksheet
    let sheet_name = workbook
        .sheet_names()
        .first()
        .cloned()
        .ok_or_else(|| parse_error("no sheets found in workbook".to_string()))?;

    let range = workbook
        .worksheet_range(&sheet_name)
        .map_err(|e| parse_error(e.to_string()))?;

    let mut rows = range.rows();
    let header: Vec<String> = match rows.next() {
        Some(cells) => cells
            .iter()
            .map(|cell| match cell {
                Data::Empty => String::new(),
                other => other.to_string(),
            })
            .collect(),
        None => {
            return Err(DataLoadError::Empty {
                path: path.to_path_buf(),
            });
        }
    };

    let data = rows
        .map(|cells| {
            cells
                .iter()
                .map(|cell| match cell {
                    Data::Int(i) => Value::Number(*i as f64),
                    Data::Float(f) => Value::Number(*f),
                    Data::String(s) if s.trim().is_empty() => Value::Missing,
                    Data::String(s) => Value::Text(s.clone()),
                    Data::Empty | Data::Error(_) => Value::Missing,
                    other => Value::Text(other.to_string()),
                })
                .collect()
        })
        .collect();

    Ok(Dataset::new(header, data))
}

// Classify one CSV field: blank, number, or text
fn csv_value(field: &str) -> Value {
    let trimmed = field.trim();
    if trimmed.is_empty() {
        Value::Missing
    } else if let Ok(n) = trimmed.parse::<f64>() {
        Value::Number(n)
    } else {
        Value::Text(field.to_string())
    }
}

// Parse a CSV row into a vector of strings
fn parse_csv_row(line: &str) -> Vec<String> {
    let mut result = Vec::new();
    let mut current_field = String::new();
    let mut in_quotes = false;
    let mut chars = line.chars().peekable();

    while let Some(c) = chars.next() {
        match c {
            '"' => {
                if in_quotes && chars.peek() == Some(&'"') {
                    // Doubled quote inside a quoted field
                    current_field.push('"');
                    chars.next();
                } else {
                    in_quotes = !in_quotes;
                }
            }
            ',' if !in_quotes => {
                result.push(std::mem::take(&mut current_field));
            }
            _ => current_field.push(c),
        }
    }

    // Add the last field
    result.push(current_field);
    result
}

/// Detect file type and load the appropriate format
///
/// # Arguments
/// * `filepath` - Path to the file to load
///
/// # Returns
/// * `Result<Dataset, DataLoadError>` - The loaded dataset or an error
pub fn read_dataset(filepath: impl AsRef<Path>) -> Result<Dataset, DataLoadError> {
    let path = filepath.as_ref();
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_lowercase());

    match extension.as_deref() {
        Some("csv") => from_csv(path),
        Some("xlsx") | Some("xlsm") | Some("xls") | Some("xlsb") | Some("ods") => from_excel(path),
        Some(ext) => Err(DataLoadError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: ext.to_string(),
        }),
        None => Err(DataLoadError::UnsupportedFormat {
            path: path.to_path_buf(),
            extension: String::new(),
        }),
    }
}

/// What identifies a cache epoch of the loaded dataset
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InvalidationPolicy {
    /// Load once per process; only `invalidate()` forces a re-read
    Never,

    /// Re-read when the file's modification time changes
    #[default]
    ModifiedTime,

    /// Re-read when the SHA-256 of the file contents changes
    ContentHash,
}

#[derive(Clone, Debug, PartialEq, Eq)]
enum EpochKey {
    Constant,
    Modified(SystemTime),
    Digest(String),
}

struct CachedDataset {
    key: EpochKey,
    dataset: Arc<Dataset>,
}

/// Memoizing loader for the dashboard's single dataset
///
/// `load` parses the source at most once per epoch and hands out the same
/// `Arc` until the epoch key changes or `invalidate` is called.
pub struct DatasetLoader {
    path: PathBuf,
    policy: InvalidationPolicy,
    cached: RwLock<Option<CachedDataset>>,
    loads: AtomicUsize,
}

impl DatasetLoader {
    pub fn new(path: impl Into<PathBuf>, policy: InvalidationPolicy) -> Self {
        DatasetLoader {
            path: path.into(),
            policy,
            cached: RwLock::new(None),
            loads: AtomicUsize::new(0),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn policy(&self) -> InvalidationPolicy {
        self.policy
    }

    /// Number of times the source file has actually been parsed
    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    /// Returns the dataset for the current epoch, parsing the file on a miss.
    pub fn load(&self) -> Result<Arc<Dataset>, DataLoadError> {
        let key = self.epoch_key()?;

        {
            let cached = self.cached.read().unwrap_or_else(|p| p.into_inner());
            if let Some(entry) = cached.as_ref() {
                if entry.key == key {
                    debug!("dataset memo hit for {}", self.path.display());
                    return Ok(Arc::clone(&entry.dataset));
                }
            }
        }

        let mut cached = self.cached.write().unwrap_or_else(|p| p.into_inner());
        // Another caller may have filled the memo while we waited for the lock
        if let Some(entry) = cached.as_ref() {
            if entry.key == key {
                return Ok(Arc::clone(&entry.dataset));
            }
        }

        let started = Instant::now();
        let dataset = Arc::new(read_dataset(&self.path)?);
        self.loads.fetch_add(1, Ordering::SeqCst);
        info!(
            "loaded dataset {} ({} rows, {} columns) in {:?}",
            self.path.display(),
            dataset.row_count(),
            dataset.column_count(),
            started.elapsed()
        );

        *cached = Some(CachedDataset {
            key,
            dataset: Arc::clone(&dataset),
        });
        Ok(dataset)
    }

    /// Drops the memoized dataset so the next `load` re-reads the file.
    pub fn invalidate(&self) {
        let mut cached = self.cached.write().unwrap_or_else(|p| p.into_inner());
        if cached.take().is_some() {
            info!("dataset memo for {} invalidated", self.path.display());
        }
    }

    fn epoch_key(&self) -> Result<EpochKey, DataLoadError> {
        match self.policy {
            InvalidationPolicy::Never => Ok(EpochKey::Constant),
            InvalidationPolicy::ModifiedTime => {
                let modified = fs::metadata(&self.path)
                    .and_then(|m| m.modified())
                    .map_err(|e| DataLoadError::from_io(&self.path, e))?;
                Ok(EpochKey::Modified(modified))
            }
            InvalidationPolicy::ContentHash => {
                let bytes =
                    fs::read(&self.path).map_err(|e| DataLoadError::from_io(&self.path, e))?;
                Ok(EpochKey::Digest(hex::encode(Sha256::digest(&bytes))))
            }
        }
    }
}
