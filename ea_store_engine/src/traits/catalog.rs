use eas_common::Money;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    pub version: String,
    pub price: Money,
    pub currency: String,
    pub file: String,
}

/// Resolves artifacts by their display name. Lookups are exact-match.
pub trait ArtifactCatalog {
    fn find_by_name(&self, name: &str) -> Option<Artifact>;

    fn artifacts(&self) -> Vec<Artifact>;
}
