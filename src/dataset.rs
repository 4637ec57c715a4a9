//! Dataset I/O: JSON arrays of loosely-typed items.
//!
//! Items flow through the stages as open JSON objects so each stage can add
//! its own fields without a schema migration. Only the fields a stage reads
//! are required to exist.

use std::path::Path;

use log::info;
use serde_json::Value;

use crate::error::ForgeError;
use crate::Result;

/// One dataset record.
pub type Item = serde_json::Map<String, Value>;

/// Load a dataset file; must be a JSON array of objects.
pub fn load_items(path: &Path) -> Result<Vec<Item>> {
    let content = std::fs::read_to_string(path)?;
    let value: Value = serde_json::from_str(&content)?;
    let Value::Array(entries) = value else {
        return Err(ForgeError::Config(format!(
            "{} is not a JSON array",
            path.display()
        )));
    };
    entries
        .into_iter()
        .map(|entry| match entry {
            Value::Object(item) => Ok(item),
            other => Err(ForgeError::Config(format!(
                "{} contains a non-object entry: {other}",
                path.display()
            ))),
        })
        .collect()
}

/// Write a dataset file, pretty-printed. An empty batch still writes `[]` so
/// downstream stages always find their input.
pub fn save_items(path: &Path, items: &[Item]) -> Result<()> {
    let rendered = serde_json::to_string_pretty(items)?;
    std::fs::write(path, rendered)?;
    info!("wrote {} item(s) to {}", items.len(), path.display());
    Ok(())
}

/// Fetch a mandatory string field from an item.
pub fn require_str<'a>(item: &'a Item, field: &str) -> Result<&'a str> {
    item.get(field)
        .and_then(Value::as_str)
        .ok_or_else(|| ForgeError::MissingField(field.to_string()))
}
