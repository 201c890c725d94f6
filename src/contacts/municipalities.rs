use anyhow::{Context, Result};
use std::collections::HashMap;
use std::io::Read;
use std::path::Path;

pub const DEFAULT_MUNICIPALITIES: &str = "municipios.csv";

/// Municipality names keyed by registry code, read from a `code;name` table.
#[derive(Debug, Default, Clone)]
pub struct Municipalities {
    names: HashMap<String, String>,
}

impl Municipalities {
    pub fn load(path: &Path) -> Result<Self> {
        let file = std::fs::File::open(path)
            .with_context(|| format!("Config: Failed to open municipality table {:?}", path))?;
        Self::from_reader(file)
            .with_context(|| format!("Config: Failed to read municipality table {:?}", path))
    }

    /// Load the table, or warn and fall back to an empty lookup.
    pub fn load_or_empty(path: &Path) -> Self {
        match Self::load(path) {
            Ok(table) => {
                tracing::info!("Municipalities: {} entries from {:?}", table.len(), path);
                table
            }
            Err(e) => {
                tracing::warn!("Could not load municipality codes: {:#}", e);
                Self::default()
            }
        }
    }

    pub fn from_reader<R: Read>(inner: R) -> Result<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(b';')
            .has_headers(false)
            .flexible(true)
            .from_reader(inner);

        let mut names = HashMap::new();
        for record in reader.records() {
            let record = record?;
            if let (Some(code), Some(name)) = (record.get(0), record.get(1)) {
                names.insert(code.trim().to_string(), name.trim().to_string());
            }
        }
        Ok(Self { names })
    }

    pub fn name_for(&self, code: &str) -> Option<&str> {
        self.names.get(code).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
