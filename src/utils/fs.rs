use serde::de::DeserializeOwned;
use serde::Serialize;
use std::path::Path;
use tokio::fs;

/// Read and parse a JSON file. Returns `None` when the file does not exist.
pub async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>, std::io::Error> {
    if !path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(path).await?;
    let value = serde_json::from_str(&content)?;
    Ok(Some(value))
}

/// Write a value as pretty JSON using temp file + rename
pub async fn write_json_atomic<T: Serialize>(path: &Path, value: &T) -> Result<(), std::io::Error> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).await?;
    }

    let temp_path = path.with_extension("json.tmp");
    let content = serde_json::to_string_pretty(value)?;
    fs::write(&temp_path, &content).await?;
    fs::rename(&temp_path, path).await?;

    Ok(())
}
