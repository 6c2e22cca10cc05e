//! Reads scenario records from disk. A path is either a file or a directory walked recursively for
//! `.json` and `.jsonl` files. A `.json` file holds one record or an array of records, a `.jsonl`
//! file one record per line; blank lines are ignored. Symbolic links are followed. Files and
//! directories that cannot be read or parsed are reported and skipped.
use crate::schema::ScenarioRecord;
use serde::Deserialize;
use std::fs::read_to_string;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("{0} does not exist")]
    NotFound(PathBuf),
    #[error("could not read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("could not parse {path}: {reason}")]
    Parse { path: PathBuf, reason: String },
}

/// Records read from a set of paths, and the files that could not be read.
#[derive(Debug, Default)]
pub struct Corpus {
    /// Each record with the file it came from, in path order and then file order.
    pub records: Vec<(PathBuf, ScenarioRecord)>,
    pub failures: Vec<LoadError>,
}

impl Corpus {
    pub fn len(&self) -> usize {
        self.records.len()
    }
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
    /// Drops the file names.
    pub fn into_records(self) -> Vec<ScenarioRecord> {
        self.records.into_iter().map(|(_, r)| r).collect()
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum OneOrMany {
    One(Box<ScenarioRecord>),
    Many(Vec<ScenarioRecord>),
}

fn is_annotation_file(path: &Path) -> bool {
    matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("json") | Some("jsonl")
    )
}

/// Reads every record found under `paths`. Directories are walked in file name order, so the
/// records come out in the same order on every run.
pub fn load_paths<P: AsRef<Path>>(paths: &[P]) -> Corpus {
    let mut corpus = Corpus::default();
    for path in paths.iter().map(AsRef::as_ref) {
        if !path.exists() {
            log::warn!("{} does not exist, skipping it", path.display());
            corpus.failures.push(LoadError::NotFound(path.to_path_buf()));
            continue;
        }
        let mut walk_failures = Vec::new();
        let files = WalkDir::new(path)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|entry| match entry {
                Ok(entry) => Some(entry),
                Err(err) => {
                    let failed = err
                        .path()
                        .map(Path::to_path_buf)
                        .unwrap_or_else(|| path.to_path_buf());
                    log::warn!("Could not walk {}: {}", failed.display(), err);
                    walk_failures.push(LoadError::Io {
                        path: failed,
                        source: io::Error::from(err),
                    });
                    None
                }
            })
            .filter(|entry| entry.file_type().is_file() && is_annotation_file(entry.path()))
            .collect::<Vec<_>>();
        corpus.failures.append(&mut walk_failures);
        for file in files {
            match load_file(file.path()) {
                Ok(records) => {
                    log::debug!("Read {} records from {}", records.len(), file.path().display());
                    corpus
                        .records
                        .extend(records.into_iter().map(|r| (file.path().to_path_buf(), r)));
                }
                Err(err) => {
                    log::warn!("{}", err);
                    corpus.failures.push(err);
                }
            }
        }
    }
    log::info!(
        "Loaded {} records, {} files failed",
        corpus.len(),
        corpus.failures.len()
    );
    corpus
}

/// Reads the records of a single file. The format is picked from the extension: `.jsonl` is read
/// line by line, skipping blank lines, anything else as a JSON document.
pub fn load_file<P: AsRef<Path>>(path: P) -> Result<Vec<ScenarioRecord>, LoadError> {
    let path = path.as_ref();
    if !path.exists() {
        return Err(LoadError::NotFound(path.to_path_buf()));
    }
    let io_error = |source: io::Error| LoadError::Io {
        path: path.to_path_buf(),
        source,
    };
    let content = read_to_string(path).map_err(io_error)?;
    if path.extension().and_then(|e| e.to_str()) == Some("jsonl") {
        content
            .lines()
            .enumerate()
            .filter(|(_, line)| !line.trim().is_empty())
            .map(|(index, line)| {
                serde_json::from_str::<ScenarioRecord>(line).map_err(|err| LoadError::Parse {
                    path: path.to_path_buf(),
                    reason: format!("line {}: {}", index + 1, err),
                })
            })
            .collect()
    } else {
        match serde_json::from_str::<OneOrMany>(&content) {
            Ok(OneOrMany::One(record)) => Ok(vec![*record]),
            Ok(OneOrMany::Many(records)) => Ok(records),
            Err(err) => Err(LoadError::Parse {
                path: path.to_path_buf(),
                reason: err.to_string(),
            }),
        }
    }
}
