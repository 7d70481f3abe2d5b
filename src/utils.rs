use crate::output::{emit_error, is_json_mode};
use crate::storage_clients::{StorageConfig, parse_storage_config};
use console::style;
use dirs::home_dir;
use indicatif::ProgressBar;
use regex::Regex;
use std::path::PathBuf;
use std::sync::LazyLock;

pub fn handle_error(message: String, pb: Option<&ProgressBar>) -> ! {
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    if is_json_mode() {
        emit_error(&message, "error");
    }

    eprintln!("{}", style(message).red());
    std::process::exit(1);
}

pub fn storages_dir() -> Result<PathBuf, String> {
    let home_dir = home_dir().ok_or_else(|| "Could not determine your home directory".to_string())?;

    Ok(home_dir.join(".blobtour").join("storages"))
}

pub fn storage_file(name: &str) -> Result<PathBuf, String> {
    Ok(storages_dir()?.join(format!("{}.msgpack", name)))
}

pub fn get_storage(name: &str) -> Result<StorageConfig, String> {
    let storage_path = storage_file(name)?;
    let contents = std::fs::read(&storage_path)
        .map_err(|e| format!("Failed to read storage '{}': {}", name, e))?;

    parse_storage_config(&contents)
}

/// Names of all saved storages, sorted. Empty when none were added yet.
pub fn storage_names() -> Result<Vec<String>, String> {
    let storage_path = storages_dir()?;

    if !storage_path.exists() {
        return Ok(Vec::new());
    }

    let files = std::fs::read_dir(&storage_path)
        .map_err(|e| format!("Failed to read storages directory: {}", e))?;

    let mut names = Vec::new();
    for file in files {
        let file = file.map_err(|e| format!("Failed to read storages directory: {}", e))?;
        let path = file.path();
        if path.extension().and_then(|ext| ext.to_str()) != Some("msgpack") {
            continue;
        }
        if let Some(stem) = path.file_stem() {
            names.push(stem.to_string_lossy().to_string());
        }
    }

    names.sort();
    Ok(names)
}

static STORAGE_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9_-]+$").expect("storage name pattern is valid"));

pub fn is_valid_storage_name(name: &str) -> bool {
    STORAGE_NAME.is_match(name)
}
