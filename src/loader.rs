// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Reading exported inventories from disk.
//!
//! Each file holds one list of entries, either bare or wrapped the way the
//! management API returns it: `{"result": {"entry": [...]}}`.

use std::path::Path;

use anyhow::{bail, Context, Result};
use serde::de::DeserializeOwned;
use serde::Deserialize;

use crate::model::{AddressGroup, AddressObject, SecurityRule};
use crate::scenario::Inventory;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    #[cfg(feature = "yaml")]
    Yaml,
}

impl Format {
    pub fn from_path(path: &Path) -> Result<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Ok(Format::Json),
            #[cfg(feature = "yaml")]
            Some("yaml") | Some("yml") => Ok(Format::Yaml),
            Some(ext) => bail!("unsupported file extension `{}` for {}", ext, path.display()),
            None => bail!("cannot tell the format of {}", path.display()),
        }
    }
}

#[derive(Deserialize)]
struct EntryList<T> {
    #[serde(default = "Vec::new")]
    entry: Vec<T>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Entries<T> {
    Envelope { result: EntryList<T> },
    List(Vec<T>),
}

impl<T> From<Entries<T>> for Vec<T> {
    fn from(entries: Entries<T>) -> Self {
        match entries {
            Entries::Envelope { result } => result.entry,
            Entries::List(list) => list,
        }
    }
}

/// Parse a list of entries in the given format.
pub fn parse_entries<T: DeserializeOwned>(contents: &str, format: Format) -> Result<Vec<T>> {
    let entries: Entries<T> = match format {
        Format::Json => serde_json::from_str(contents)?,
        #[cfg(feature = "yaml")]
        Format::Yaml => serde_yaml::from_str(contents)?,
    };
    Ok(entries.into())
}

fn load_entries<T: DeserializeOwned>(path: &Path, what: &str) -> Result<Vec<T>> {
    let format = Format::from_path(path)?;
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {} from {}", what, path.display()))?;
    parse_entries(&contents, format)
        .with_context(|| format!("failed to parse {} from {}", what, path.display()))
}

pub fn load_rules<P: AsRef<Path>>(path: P) -> Result<Vec<SecurityRule>> {
    load_entries(path.as_ref(), "security rules")
}

pub fn load_address_objects<P: AsRef<Path>>(path: P) -> Result<Vec<AddressObject>> {
    load_entries(path.as_ref(), "address objects")
}

pub fn load_address_groups<P: AsRef<Path>>(path: P) -> Result<Vec<AddressGroup>> {
    load_entries(path.as_ref(), "address groups")
}

/// Load a rule-base and, when given, its address inventories.
pub fn load_inventory<P: AsRef<Path>>(
    rules: P,
    address_objects: Option<P>,
    address_groups: Option<P>,
) -> Result<Inventory> {
    let mut inventory = Inventory::new(load_rules(rules)?);
    if let Some(path) = address_objects {
        inventory = inventory.with_address_objects(load_address_objects(path)?);
    }
    if let Some(path) = address_groups {
        inventory = inventory.with_address_groups(load_address_groups(path)?);
    }
    Ok(inventory)
}
