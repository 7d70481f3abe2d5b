use rand_core::{OsRng, TryRngCore};
use std::path::{Path, PathBuf};

pub const DEFAULT_NAME_HINT: &str = "blobtour";

// Bucket name limit on S3.
const MAX_CONTAINER_NAME_LEN: usize = 63;
const SUFFIX_LEN: usize = 32;

const DOWNLOADED_MARKER: &str = "DOWNLOADED";

/// 128 random bits as lowercase hex.
pub fn unique_suffix() -> Result<String, String> {
    let mut bytes = [0u8; SUFFIX_LEN / 2];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| format!("Failed to generate a unique name: {}", e))?;

    Ok(bytes.iter().map(|byte| format!("{:02x}", byte)).collect())
}

fn sanitize_hint(hint: &str) -> String {
    let mut collapsed = String::with_capacity(hint.len());
    for c in hint.chars().map(|c| c.to_ascii_lowercase()) {
        if c.is_ascii_lowercase() || c.is_ascii_digit() {
            collapsed.push(c);
        } else if !collapsed.ends_with('-') {
            collapsed.push('-');
        }
    }

    let max_hint_len = MAX_CONTAINER_NAME_LEN - SUFFIX_LEN - 1;
    let truncated: String = collapsed.trim_matches('-').chars().take(max_hint_len).collect();
    let hint = truncated.trim_end_matches('-');

    if hint.is_empty() {
        DEFAULT_NAME_HINT.to_string()
    } else {
        hint.to_string()
    }
}

/// `<hint>-<random hex>`, restricted to characters every backend accepts.
pub fn container_name(hint: &str) -> Result<String, String> {
    Ok(format!("{}-{}", sanitize_hint(hint), unique_suffix()?))
}

pub fn blob_file_name() -> Result<String, String> {
    Ok(format!("wtfile{}.txt", unique_suffix()?))
}

/// Same directory, `DOWNLOADED` spliced in before the `.txt` extension.
pub fn downloaded_path(source: &Path) -> Result<PathBuf, String> {
    let file_name = source
        .file_name()
        .map(|name| name.to_string_lossy().to_string())
        .ok_or_else(|| format!("'{}' has no file name", source.display()))?;

    let downloaded_name = match file_name.strip_suffix(".txt") {
        Some(stem) => format!("{}{}.txt", stem, DOWNLOADED_MARKER),
        None => format!("{}{}", file_name, DOWNLOADED_MARKER),
    };

    let destination = source.with_file_name(downloaded_name);
    if destination == source {
        return Err(format!(
            "Download destination '{}' would overwrite the source file",
            destination.display()
        ));
    }

    Ok(destination)
}
