use crate::errors::{ErrorInfo, TrackError};

/// Normalises a store-relative artifact path.
///
/// Backslashes become `/`, a single leading `./` is dropped and trailing
/// slashes are trimmed. Absolute paths, `..`, `.` and empty segments are
/// rejected so every artifact stays under its run.
pub fn normalize_artifact_path(raw: &str) -> Result<String, TrackError> {
    let reject = |reason: &str| {
        TrackError::Store(
            ErrorInfo::new("store.artifact_path", reason.to_string()).with_context("path", raw),
        )
    };
    let unified = raw.replace('\\', "/");
    if unified.starts_with('/') || unified.get(1..2) == Some(":") {
        return Err(reject("artifact path must be relative"));
    }
    let trimmed = unified.strip_prefix("./").unwrap_or(&unified);
    let trimmed = trimmed.trim_end_matches('/');
    if trimmed.is_empty() {
        return Err(reject("artifact path is empty"));
    }
    for segment in trimmed.split('/') {
        match segment {
            "" => return Err(reject("artifact path contains an empty segment")),
            "." | ".." => return Err(reject("artifact path may not contain `.` or `..`")),
            _ => {}
        }
    }
    Ok(trimmed.to_string())
}

/// Joins an optional artifact directory with a file name.
pub fn join_artifact_path(dir: Option<&str>, file_name: &str) -> Result<String, TrackError> {
    let joined = match dir {
        Some(dir) if !dir.trim().is_empty() => format!("{}/{}", dir.trim_end_matches('/'), file_name),
        _ => file_name.to_string(),
    };
    normalize_artifact_path(&joined)
}
