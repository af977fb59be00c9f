use std::path::PathBuf;

use anyhow::Context as _;
use async_trait::async_trait;

/// Raw cell grid of one sheet, row-major.
pub type Grid = Vec<Vec<String>>;

/// Read-only tabular source with one sheet per series.
#[async_trait]
pub trait TabularSource: Send + Sync {
    /// Series sheet names in a stable order.
    async fn list_series(&self) -> anyhow::Result<Vec<String>>;

    /// `Ok(None)` when the named sheet does not exist.
    async fn read_series(&self, name: &str) -> anyhow::Result<Option<Grid>>;
}

/// Directory holding one `<series>.csv` export per sheet.
#[derive(Debug, Clone)]
pub struct CsvDirSource {
    dir: PathBuf,
    ignored: Vec<String>,
}

impl CsvDirSource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            ignored: Vec::new(),
        }
    }

    /// Sheets that exist in the workbook but are not series (folder or index tabs).
    pub fn with_ignored(mut self, ignored: impl IntoIterator<Item = String>) -> Self {
        self.ignored = ignored.into_iter().collect();
        self
    }

    fn sheet_path(&self, name: &str) -> PathBuf {
        self.dir.join(format!("{name}.csv"))
    }

    fn is_ignored(&self, name: &str) -> bool {
        self.ignored.iter().any(|i| i.eq_ignore_ascii_case(name))
    }
}

#[async_trait]
impl TabularSource for CsvDirSource {
    async fn list_series(&self) -> anyhow::Result<Vec<String>> {
        let mut entries = tokio::fs::read_dir(&self.dir)
            .await
            .with_context(|| format!("read sheets dir: {}", self.dir.display()))?;

        let mut names = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("csv") {
                continue;
            }
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            if self.is_ignored(stem) {
                continue;
            }
            names.push(stem.to_owned());
        }
        names.sort();
        Ok(names)
    }

    async fn read_series(&self, name: &str) -> anyhow::Result<Option<Grid>> {
        if self.is_ignored(name) {
            return Ok(None);
        }
        let path = self.sheet_path(name);
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(err) => {
                return Err(err).with_context(|| format!("read sheet: {}", path.display()));
            }
        };
        let grid =
            parse_csv(&bytes).with_context(|| format!("parse sheet: {}", path.display()))?;
        Ok(Some(grid))
    }
}

/// Parses a headerless CSV export, allowing rows of different lengths.
pub fn parse_csv(bytes: &[u8]) -> anyhow::Result<Grid> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .from_reader(bytes);

    let mut grid = Vec::new();
    for record in reader.records() {
        let record = record.context("read csv record")?;
        grid.push(record.iter().map(str::to_owned).collect());
    }
    Ok(grid)
}
