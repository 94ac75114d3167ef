//! TOML item-bank loading, validation, and the in-memory bank.
//!
//! Banks are authored as TOML files (one `[bank]` header plus `[[items]]`
//! entries) and loaded read-mostly; the only mutable state is the shared
//! exposure counter store.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use async_trait::async_trait;
use serde::Deserialize;

use crate::model::{Item, Skill};
use crate::selector::ExposureStore;
use crate::traits::ItemBank;

/// Intermediate TOML structure for bank files.
#[derive(Debug, Deserialize)]
struct TomlBankFile {
    bank: TomlBankHeader,
    #[serde(default)]
    items: Vec<Item>,
}

#[derive(Debug, Deserialize)]
struct TomlBankHeader {
    id: String,
    name: String,
    #[serde(default)]
    description: String,
}

/// A non-fatal problem found while validating a bank.
#[derive(Debug, Clone)]
pub struct ValidationWarning {
    /// The offending item, if the warning is item-specific.
    pub item_id: Option<String>,
    pub message: String,
}

/// An in-memory, read-mostly item bank with shared exposure counters.
pub struct InMemoryBank {
    pub id: String,
    pub name: String,
    pub description: String,
    items: Vec<Item>,
    exposure: Arc<ExposureStore>,
}

impl InMemoryBank {
    pub fn new(id: &str, name: &str, items: Vec<Item>) -> Self {
        let exposure = Arc::new(ExposureStore::new(items.iter().map(|i| i.id.as_str())));
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            items,
            exposure,
        }
    }

    /// The shared exposure counter store, injected into the selector.
    pub fn exposure(&self) -> Arc<ExposureStore> {
        Arc::clone(&self.exposure)
    }

    pub fn items(&self) -> &[Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}

#[async_trait]
impl ItemBank for InMemoryBank {
    async fn items_for_skill(&self, skill: Skill) -> Result<Vec<Item>> {
        Ok(self
            .items
            .iter()
            .filter(|i| i.skill == skill)
            .cloned()
            .collect())
    }

    async fn get_item(&self, id: &str) -> Result<Option<Item>> {
        Ok(self.items.iter().find(|i| i.id == id).cloned())
    }
}

/// Parse a single bank TOML file.
pub fn parse_bank(path: &Path) -> Result<InMemoryBank> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read item bank: {}", path.display()))?;
    let file: TomlBankFile = toml::from_str(&content)
        .with_context(|| format!("failed to parse item bank: {}", path.display()))?;

    let mut bank = InMemoryBank::new(&file.bank.id, &file.bank.name, file.items);
    bank.description = file.bank.description;
    Ok(bank)
}

/// Load every `.toml` bank in a directory.
pub fn load_bank_directory(dir: &Path) -> Result<Vec<InMemoryBank>> {
    let mut banks = Vec::new();
    for entry in std::fs::read_dir(dir)
        .with_context(|| format!("failed to read bank directory: {}", dir.display()))?
    {
        let path = entry?.path();
        if path.extension().is_some_and(|e| e == "toml") {
            banks.push(parse_bank(&path)?);
        }
    }
    banks.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(banks)
}

/// Validate bank contents; problems are warnings, not load failures.
pub fn validate_bank(bank: &InMemoryBank) -> Vec<ValidationWarning> {
    let mut warnings = Vec::new();
    let mut seen = HashSet::new();

    if bank.items.is_empty() {
        warnings.push(ValidationWarning {
            item_id: None,
            message: "bank contains no items".into(),
        });
    }

    for item in &bank.items {
        if !seen.insert(item.id.as_str()) {
            warnings.push(ValidationWarning {
                item_id: Some(item.id.clone()),
                message: "duplicate item id".into(),
            });
        }
        if item.discrimination <= 0.0 {
            warnings.push(ValidationWarning {
                item_id: Some(item.id.clone()),
                message: format!("discrimination must be positive, got {}", item.discrimination),
            });
        }
        if !(0.0..1.0).contains(&item.guessing) {
            warnings.push(ValidationWarning {
                item_id: Some(item.id.clone()),
                message: format!("guessing must be in [0, 1), got {}", item.guessing),
            });
        }
        if !(-4.0..=4.0).contains(&item.difficulty) {
            warnings.push(ValidationWarning {
                item_id: Some(item.id.clone()),
                message: format!("difficulty {} outside the nominal [-4, 4] range", item.difficulty),
            });
        }
        if item.skill.is_productive() {
            warnings.push(ValidationWarning {
                item_id: Some(item.id.clone()),
                message: format!("{} items are graded externally, not IRT-calibrated", item.skill),
            });
        }
    }

    warnings
}
