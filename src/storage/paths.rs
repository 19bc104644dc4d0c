use chrono::Utc;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use crate::core::{PipelineError, PipelineResult};
use crate::models::{CompressionProfile, SkipReason};

/// Infix separating an original's stem from the compression suffix.
pub const COMPRESSED_MARKER: &str = "__compressed_";

/// Turns stored paths into filesystem paths. Relative paths are joined onto
/// the configured base directory instead of the process working directory.
#[derive(Debug, Clone)]
pub struct PathResolver {
    base_dir: PathBuf,
}

impl PathResolver {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        PathResolver {
            base_dir: base_dir.into(),
        }
    }

    pub fn resolve(&self, stored: &str) -> PathBuf {
        let path = Path::new(stored.trim());
        if path.is_absolute() {
            path.to_path_buf()
        } else {
            self.base_dir.join(path)
        }
    }

    /// Resolves `stored` and checks that it names a regular file.
    pub fn locate(&self, stored: &str) -> Result<PathBuf, SkipReason> {
        if stored.trim().is_empty() {
            return Err(SkipReason::NoUsablePath);
        }
        let path = self.resolve(stored);
        if path.is_file() {
            Ok(path)
        } else {
            Err(SkipReason::MissingFile(path.display().to_string()))
        }
    }
}

/// `<stem>_<timestamp>_<random>.pdf` inside `dir`. Unique across concurrent
/// requests for the same logical entity.
pub fn timestamped_path(dir: &Path, stem: &str) -> PathBuf {
    dir.join(format!("{}_{}.pdf", sanitize_stem(stem), unique_suffix()))
}

/// Rejects a caller-chosen destination that already exists or names one of
/// the documents it is built from. Outputs never overwrite inputs.
pub fn ensure_fresh_output<'a>(
    output: &Path,
    sources: impl IntoIterator<Item = &'a Path>,
) -> PipelineResult<()> {
    if output.exists() {
        return Err(PipelineError::InvalidRequest(format!(
            "output path {} already exists",
            output.display()
        )));
    }
    let target = comparable(output);
    if sources.into_iter().any(|source| comparable(source) == target) {
        return Err(PipelineError::InvalidRequest(format!(
            "output path {} names one of its own sources",
            output.display()
        )));
    }
    Ok(())
}

/// Canonical form when the path exists; otherwise the canonical parent joined
/// with the file name, so `dir/../dir/a.pdf` and `dir/a.pdf` compare equal.
fn comparable(path: &Path) -> PathBuf {
    if let Ok(canonical) = path.canonicalize() {
        return canonical;
    }
    match (path.parent().and_then(|p| p.canonicalize().ok()), path.file_name()) {
        (Some(parent), Some(name)) => parent.join(name),
        _ => path.to_path_buf(),
    }
}

/// Sibling of `original` holding its compressed copy for `profile`.
pub fn compressed_path_for(original: &Path, profile: CompressionProfile) -> PathBuf {
    let stem = original
        .file_stem()
        .map(|s| s.to_string_lossy().to_string())
        .unwrap_or_else(|| "document".to_string());
    let dir = original.parent().unwrap_or_else(|| Path::new("."));
    dir.join(format!(
        "{}{}{}_{}.pdf",
        stem,
        COMPRESSED_MARKER,
        profile.as_str(),
        unique_suffix()
    ))
}

/// For a compressed artifact, the path of the original it was produced from.
/// `None` when `path` is not a compressed artifact.
pub fn original_of(path: &Path) -> Option<PathBuf> {
    let stem = path.file_stem()?.to_string_lossy().to_string();
    let (original_stem, _) = stem.split_once(COMPRESSED_MARKER)?;
    let extension = path
        .extension()
        .map(|e| e.to_string_lossy().to_string())
        .unwrap_or_else(|| "pdf".to_string());
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    Some(dir.join(format!("{}.{}", original_stem, extension)))
}

fn unique_suffix() -> String {
    let random = Uuid::new_v4().simple().to_string();
    format!("{}_{}", Utc::now().format("%Y%m%d_%H%M%S_%3f"), &random[..8])
}

fn sanitize_stem(stem: &str) -> String {
    let cleaned: String = stem
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "document".to_string()
    } else {
        cleaned
    }
}
