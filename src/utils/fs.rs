use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tokio::fs;
use crate::utils::{OptimizerError, OptimizerResult};

/// Create `dir` (and parents) if it does not exist yet
pub async fn ensure_dir(dir: impl AsRef<Path>) -> OptimizerResult<()> {
    fs::create_dir_all(dir.as_ref())
        .await
        .map_err(|e| OptimizerError::io(format!(
            "Cannot create output directory {}: {}", dir.as_ref().display(), e
        )))
}

/// Returns `name`, or `stem (n).ext` for the first `n` not yet in `taken`.
///
/// The chosen name is inserted into `taken`.
pub fn unique_name(name: &str, taken: &mut HashSet<String>) -> String {
    if taken.insert(name.to_string()) {
        return name.to_string();
    }

    let path = Path::new(name);
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or(name);
    let ext = path.extension().and_then(|e| e.to_str());

    let mut n = 1;
    loop {
        let candidate = match ext {
            Some(ext) => format!("{stem} ({n}).{ext}"),
            None => format!("{stem} ({n})"),
        };
        if taken.insert(candidate.clone()) {
            return candidate;
        }
        n += 1;
    }
}

/// First path in `dir` named after `name` that does not exist yet
pub fn available_path(dir: &Path, name: &str) -> PathBuf {
    let mut taken = HashSet::new();
    loop {
        let candidate = unique_name(name, &mut taken);
        let path = dir.join(&candidate);
        if !path.exists() {
            return path;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn duplicate_names_get_numbered() {
        let mut taken = HashSet::new();
        assert_eq!(unique_name("a.jpg", &mut taken), "a.jpg");
        assert_eq!(unique_name("a.jpg", &mut taken), "a (1).jpg");
        assert_eq!(unique_name("a.jpg", &mut taken), "a (2).jpg");
        assert_eq!(unique_name("b", &mut taken), "b");
        assert_eq!(unique_name("b", &mut taken), "b (1)");
    }

    #[test]
    fn available_path_skips_existing_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("out.png"), b"x").unwrap();

        let path = available_path(dir.path(), "out.png");
        assert_eq!(path, dir.path().join("out (1).png"));
    }
}
