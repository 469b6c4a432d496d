//! Product catalog records and loading them from JSON / JSON Lines files.
//!
//! Loading is best effort: a record that cannot be read is reported in
//! [`LoadedCatalog::skipped`] and the rest of the catalog still loads.

use anyhow::{bail, Context};
use serde::{de, Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Documents keyed by caller identifier. Iteration order is the key order.
pub type Corpus<Id> = BTreeMap<Id, Document>;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub brand: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub actual_price: Option<f64>,
    #[serde(default, deserialize_with = "lenient_number")]
    pub selling_price: Option<f64>,
    /// 0-5 scale.
    #[serde(default, deserialize_with = "lenient_number")]
    pub average_rating: Option<f64>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub images: Vec<String>,
}

impl Document {
    pub fn titled(title: impl Into<String>) -> Self {
        Self { title: Some(title.into()), ..Self::default() }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.average_rating = Some(rating);
        self
    }

    /// Title and description joined by a single space; missing fields are empty.
    pub fn searchable_text(&self) -> String {
        format!("{} {}", self.title.as_deref().unwrap_or(""), self.description.as_deref().unwrap_or(""))
    }
}

fn lenient_number<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    match Option::<Value>::deserialize(deserializer)? {
        None | Some(Value::Null) => Ok(None),
        Some(Value::Number(n)) => Ok(n.as_f64()),
        Some(Value::String(s)) => parse_amount(&s).map_err(de::Error::custom),
        Some(other) => Err(de::Error::custom(format!("expected a number, got {other}"))),
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<String>, D::Error> {
    Ok(Option::<Vec<String>>::deserialize(deserializer)?.unwrap_or_default())
}

/// Accepts catalog amounts such as `"2,999"`, `"₹ 499"` or `""` (absent).
fn parse_amount(raw: &str) -> Result<Option<f64>, String> {
    let cleaned: String = raw.chars().filter(|c| !matches!(c, ',' | '₹' | '$') && !c.is_whitespace()).collect();
    if cleaned.is_empty() {
        return Ok(None);
    }
    cleaned.parse::<f64>().map(Some).map_err(|_| format!("`{raw}` is not a number"))
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SkippedRecord {
    pub source: PathBuf,
    /// Array index, JSON Lines line number (1-based), or map entry index; 0 when a whole file was skipped.
    pub position: usize,
    pub pid: Option<String>,
    pub reason: String,
}

#[derive(Debug, Default)]
pub struct LoadedCatalog {
    pub corpus: Corpus<String>,
    pub skipped: Vec<SkippedRecord>,
}

impl LoadedCatalog {
    fn skip(&mut self, source: &Path, position: usize, pid: Option<String>, reason: String) {
        tracing::warn!(source = %source.display(), position, pid = ?pid, %reason, "skipping catalog record");
        self.skipped.push(SkippedRecord { source: source.to_path_buf(), position, pid, reason });
    }

    fn ingest(&mut self, source: &Path, position: usize, key: Option<&str>, record: Value) {
        let pid = match record.get("pid") {
            Some(Value::String(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Value::Number(n)) => Some(n.to_string()),
            _ => key.map(str::to_string),
        };
        let Some(pid) = pid else {
            self.skip(source, position, None, "record has no pid".into());
            return;
        };
        if self.corpus.contains_key(&pid) {
            self.skip(source, position, Some(pid), "duplicate pid".into());
            return;
        }
        match serde_json::from_value::<Document>(record) {
            Ok(doc) => {
                self.corpus.insert(pid, doc);
            }
            Err(e) => self.skip(source, position, Some(pid), e.to_string()),
        }
    }
}

/// Load a catalog from a `.json` / `.jsonl` file or a directory of them.
pub fn load_catalog<P: AsRef<Path>>(path: P) -> anyhow::Result<LoadedCatalog> {
    let path = path.as_ref();
    let mut files: Vec<PathBuf> = Vec::new();
    let walking = path.is_dir();
    if walking {
        for entry in WalkDir::new(path).sort_by_file_name().into_iter().filter_map(|e| e.ok()) {
            let p = entry.path();
            if p.is_file() && matches!(extension(p), Some("json" | "jsonl")) {
                files.push(p.to_path_buf());
            }
        }
    } else if path.is_file() {
        files.push(path.to_path_buf());
    } else {
        bail!("catalog path {} does not exist", path.display());
    }

    let mut catalog = LoadedCatalog::default();
    for file in files {
        let loaded = if extension(&file) == Some("jsonl") {
            load_jsonl(&file, &mut catalog)
        } else {
            load_json(&file, &mut catalog)
        };
        // One unreadable file in a directory does not sink the rest.
        match loaded {
            Err(e) if walking => catalog.skip(&file, 0, None, format!("{e:#}")),
            other => other?,
        }
    }
    tracing::info!(documents = catalog.corpus.len(), skipped = catalog.skipped.len(), "catalog loaded");
    Ok(catalog)
}

fn extension(path: &Path) -> Option<&str> { path.extension().and_then(|s| s.to_str()) }

fn load_jsonl(file: &Path, catalog: &mut LoadedCatalog) -> anyhow::Result<()> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    for (i, line) in BufReader::new(f).split(b'\n').enumerate() {
        let mut bytes = line.with_context(|| format!("reading {}", file.display()))?;
        if bytes.last() == Some(&b'\r') {
            bytes.pop();
        }
        let line = match std::str::from_utf8(&bytes) {
            Ok(line) => line,
            Err(e) => {
                catalog.skip(file, i + 1, None, format!("invalid UTF-8: {e}"));
                continue;
            }
        };
        if line.trim().is_empty() { continue; }
        match serde_json::from_str::<Value>(line) {
            Ok(record) => catalog.ingest(file, i + 1, None, record),
            Err(e) => catalog.skip(file, i + 1, None, format!("invalid JSON: {e}")),
        }
    }
    Ok(())
}

fn load_json(file: &Path, catalog: &mut LoadedCatalog) -> anyhow::Result<()> {
    let f = File::open(file).with_context(|| format!("opening {}", file.display()))?;
    let json: Value = serde_json::from_reader(BufReader::new(f)).with_context(|| format!("parsing {}", file.display()))?;
    match json {
        Value::Array(arr) => {
            for (i, record) in arr.into_iter().enumerate() {
                catalog.ingest(file, i, None, record);
            }
        }
        Value::Object(map) if map.contains_key("pid") => catalog.ingest(file, 0, None, Value::Object(map)),
        Value::Object(map) => {
            for (i, (key, record)) in map.into_iter().enumerate() {
                catalog.ingest(file, i, Some(&key), record);
            }
        }
        _ => bail!("{} holds neither a record nor a list of records", file.display()),
    }
    Ok(())
}
