//! A file-backed artifact catalog.
//!
//! The catalog file is a JSON array:
//!
//! ```json
//! [
//!   { "name": "Gold Scalper Pro", "version": "2.1.0", "price": "49.99", "currency": "USD", "file": "gold-scalper.ex5" }
//! ]
//! ```
use std::{
    path::Path,
    sync::{Arc, RwLock},
};

use eas_common::Money;
use log::*;
use serde::Deserialize;
use thiserror::Error;

use crate::traits::{Artifact, ArtifactCatalog};

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Could not read the catalog file: {0}")]
    Io(#[from] std::io::Error),
    #[error("The catalog file is not valid: {0}")]
    Invalid(String),
}

#[derive(Debug, Deserialize)]
struct CatalogEntry {
    name: String,
    version: String,
    price: String,
    currency: String,
    file: String,
}

/// The artifacts for sale. Clones share the same list, so a [`StaticCatalog::reload_from_file`] on any clone is seen
/// by all of them.
#[derive(Debug, Clone, Default)]
pub struct StaticCatalog {
    artifacts: Arc<RwLock<Vec<Artifact>>>,
}

impl StaticCatalog {
    pub fn new(artifacts: Vec<Artifact>) -> Self {
        Self { artifacts: Arc::new(RwLock::new(artifacts)) }
    }

    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        parse_catalog(json).map(Self::new)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, CatalogError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let catalog = Self::from_json(&json)?;
        info!("📚️ Loaded {} artifacts from {}", catalog.len(), path.as_ref().display());
        Ok(catalog)
    }

    /// Re-reads the catalog file and swaps the new list in. If the file cannot be read or parsed, the current list
    /// stays in place. Returns the number of artifacts now in the catalog.
    pub fn reload_from_file<P: AsRef<Path>>(&self, path: P) -> Result<usize, CatalogError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let artifacts = parse_catalog(&json)?;
        let count = artifacts.len();
        self.replace(artifacts);
        info!("📚️ Reloaded the catalog from {}. {count} artifacts for sale.", path.as_ref().display());
        Ok(count)
    }

    pub fn replace(&self, artifacts: Vec<Artifact>) {
        match self.artifacts.write() {
            Ok(mut guard) => *guard = artifacts,
            Err(poisoned) => *poisoned.into_inner() = artifacts,
        }
    }

    pub fn len(&self) -> usize {
        self.artifacts.read().map(|a| a.len()).unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

fn parse_catalog(json: &str) -> Result<Vec<Artifact>, CatalogError> {
    let entries: Vec<CatalogEntry> = serde_json::from_str(json).map_err(|e| CatalogError::Invalid(e.to_string()))?;
    entries
        .into_iter()
        .map(|e| {
            let price = e
                .price
                .parse::<Money>()
                .map_err(|err| CatalogError::Invalid(format!("Price for '{}': {err}", e.name)))?;
            Ok(Artifact { name: e.name, version: e.version, price, currency: e.currency, file: e.file })
        })
        .collect()
}

impl ArtifactCatalog for StaticCatalog {
    fn find_by_name(&self, name: &str) -> Option<Artifact> {
        self.artifacts.read().ok()?.iter().find(|a| a.name == name).cloned()
    }

    fn artifacts(&self) -> Vec<Artifact> {
        self.artifacts.read().map(|a| a.clone()).unwrap_or_default()
    }
}
