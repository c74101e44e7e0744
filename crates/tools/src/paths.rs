//! Path validation — filesystem scoping for the file tools.
//!
//! Ensures file tools can only access paths within allowed roots and
//! blocks access to forbidden paths (e.g., ~/.ssh, /etc).

use std::path::{Path, PathBuf};

/// Error returned when path validation fails.
#[derive(Debug, thiserror::Error)]
pub enum PathValidationError {
    #[error("Path '{path}' is outside allowed roots")]
    OutsideAllowedRoots { path: String },

    #[error("Path '{path}' matches forbidden pattern '{pattern}'")]
    ForbiddenPath { path: String, pattern: String },

    #[error("Path traversal detected in '{path}'")]
    PathTraversal { path: String },

    #[error("Failed to canonicalize path '{path}': {reason}")]
    CanonicalizeFailed { path: String, reason: String },
}

/// Validate that a path is safe to access.
///
/// Checks:
/// 1. No path traversal attacks (`..` sequences)
/// 2. Path is canonicalized to resolve symlinks and relative components
/// 3. Path is within allowed roots (if specified)
/// 4. Path is not in forbidden paths list
///
/// Returns the canonicalized (resolved) path on success.
pub fn validate_path(
    path: &str,
    allowed_roots: &[String],
    forbidden_paths: &[String],
) -> Result<PathBuf, PathValidationError> {
    let input_path = Path::new(path);

    // Check for obvious path traversal attempts in the raw string
    let path_str = path.replace('\\', "/");
    if path_str.contains("../") || path_str.contains("/..") || path_str == ".." {
        return Err(PathValidationError::PathTraversal { path: path.into() });
    }

    // Attempt to canonicalize the path to resolve symlinks, `.`, `..`, etc.
    // If the file doesn't exist yet (e.g., for writes), canonicalize the parent.
    let canonical = if input_path.exists() {
        input_path
            .canonicalize()
            .map_err(|e| PathValidationError::CanonicalizeFailed {
                path: path.into(),
                reason: e.to_string(),
            })?
    } else {
        match input_path.parent() {
            Some(parent) if parent.exists() => {
                let canonical_parent = parent.canonicalize().map_err(|e| {
                    PathValidationError::CanonicalizeFailed {
                        path: path.into(),
                        reason: format!("Parent dir: {e}"),
                    }
                })?;
                canonical_parent.join(input_path.file_name().unwrap_or_default())
            }
            // Can't canonicalize — fall back to the raw path
            _ => input_path.to_path_buf(),
        }
    };

    let canonical_str = canonical
        .to_string_lossy()
        .replace('\\', "/")
        .to_lowercase();

    // Check against forbidden paths (using canonical path)
    for forbidden in forbidden_paths {
        let expanded = expand_tilde(forbidden);
        let forbidden_normalized = expanded.replace('\\', "/").to_lowercase();

        if canonical_str.starts_with(&forbidden_normalized) {
            return Err(PathValidationError::ForbiddenPath {
                path: path.into(),
                pattern: forbidden.clone(),
            });
        }
    }

    // Check allowed roots (if any are configured) using canonical path
    if !allowed_roots.is_empty() {
        let is_allowed = allowed_roots.iter().any(|root| {
            let expanded = expand_tilde(root);
            let root_normalized = expanded.replace('\\', "/").to_lowercase();
            canonical_str.starts_with(&root_normalized)
        });

        if !is_allowed {
            return Err(PathValidationError::OutsideAllowedRoots { path: path.into() });
        }
    }

    Ok(canonical)
}

/// Expand ~ to the user's home directory.
fn expand_tilde(path: &str) -> String {
    if path.starts_with("~/") || path == "~" {
        if let Ok(home) = std::env::var("HOME") {
            return path.replacen('~', &home, 1);
        }
    }
    path.to_string()
}
