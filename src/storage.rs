// ABOUTME: Output-tree layout with atomic writes
// ABOUTME: Handles paths, temp files, and frontmatter parsing

use crate::{Error, Frontmatter, Result};
use std::fs;
use std::path::{Path, PathBuf};

pub const STATE_DIR_NAME: &str = ".notion-sync";
pub const INDEX_FILE_NAME: &str = "README.md";
pub const PAGE_FILE_NAME: &str = "README.md";
pub const IMAGES_DIR_NAME: &str = "images";
pub const PENDING_FILE_NAME: &str = "pending-commit.json";

/// Run-local files under the state directory that never belong in a commit.
const IGNORED: &[&str] = &["tmp/", PENDING_FILE_NAME];

pub struct Paths {
    pub root: PathBuf,
    pub state_dir: PathBuf,
    pub state_file: PathBuf,
    pub tmp_dir: PathBuf,
    pub index_file: PathBuf,
}

impl Paths {
    pub fn new(root: PathBuf) -> Self {
        let state_dir = root.join(STATE_DIR_NAME);
        Paths {
            state_file: state_dir.join("state.json"),
            tmp_dir: state_dir.join("tmp"),
            index_file: root.join(INDEX_FILE_NAME),
            state_dir,
            root,
        }
    }

    pub fn ensure_dirs(&self) -> Result<()> {
        fs::create_dir_all(&self.tmp_dir)?;
        let ignore = self.state_dir.join(".gitignore");
        let mut content = match fs::read_to_string(&ignore) {
            Ok(existing) => existing,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        };
        let before = content.len();
        for entry in IGNORED {
            if !content.lines().any(|line| line.trim() == *entry) {
                if !content.is_empty() && !content.ends_with('\n') {
                    content.push('\n');
                }
                content.push_str(entry);
                content.push('\n');
            }
        }
        if content.len() != before {
            fs::write(&ignore, content)?;
        }
        Ok(())
    }

    pub fn page_dir(&self, output_dir: &str) -> PathBuf {
        self.root.join(output_dir)
    }

    pub fn page_file(&self, output_dir: &str) -> PathBuf {
        self.page_dir(output_dir).join(PAGE_FILE_NAME)
    }

    pub fn images_dir(&self, output_dir: &str) -> PathBuf {
        self.page_dir(output_dir).join(IMAGES_DIR_NAME)
    }
}

/// Write via a temp file in `tmp_dir` and rename into place, so readers never
/// see a half-written file. `tmp_dir` must be on the same filesystem.
pub fn write_atomic(path: &Path, content: &[u8], tmp_dir: &Path) -> Result<()> {
    use rand::Rng;

    let random: u32 = rand::thread_rng().gen();
    let tmp_path = tmp_dir.join(format!("{:x}.part", random));

    fs::write(&tmp_path, content)?;

    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }

    Ok(())
}

pub fn remove_dir_if_exists(path: &Path) -> Result<bool> {
    if path.is_dir() {
        fs::remove_dir_all(path)?;
        Ok(true)
    } else {
        Ok(false)
    }
}

pub fn read_frontmatter(md_path: &Path) -> Result<Option<Frontmatter>> {
    if !md_path.exists() {
        return Ok(None);
    }

    let content = fs::read_to_string(md_path)?;

    // Look for YAML frontmatter (--- ... ---)
    let Some(rest) = content.strip_prefix("---\n") else {
        return Ok(None);
    };
    if let Some(end_pos) = rest.find("\n---\n") {
        let yaml = &rest[..end_pos];
        let fm: Frontmatter = serde_yaml::from_str(yaml).map_err(|e| {
            Error::Filesystem(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("Failed to parse frontmatter: {}", e),
            ))
        })?;
        Ok(Some(fm))
    } else {
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths_layout() {
        let temp = TempDir::new().unwrap();
        let paths = Paths::new(temp.path().to_path_buf());
        assert_eq!(paths.state_file, temp.path().join(".notion-sync/state.json"));
        assert_eq!(paths.index_file, temp.path().join("README.md"));
        assert_eq!(
            paths.images_dir("roadmap"),
            temp.path().join("roadmap/images")
        );
    }

    #[test]
    fn test_ensure_dirs_creates_structure() {
        let temp = TempDir::new().unwrap();
        let paths = Paths::new(temp.path().to_path_buf());
        paths.ensure_dirs().unwrap();

        assert!(paths.tmp_dir.exists());
        assert_eq!(
            fs::read_to_string(paths.state_dir.join(".gitignore")).unwrap(),
            "tmp/\npending-commit.json\n"
        );
    }

    #[test]
    fn test_ensure_dirs_extends_existing_ignore_file() {
        let temp = TempDir::new().unwrap();
        let paths = Paths::new(temp.path().to_path_buf());
        fs::create_dir_all(&paths.state_dir).unwrap();
        fs::write(paths.state_dir.join(".gitignore"), "tmp/").unwrap();

        paths.ensure_dirs().unwrap();
        paths.ensure_dirs().unwrap();
        assert_eq!(
            fs::read_to_string(paths.state_dir.join(".gitignore")).unwrap(),
            "tmp/\npending-commit.json\n"
        );
    }
}

#[cfg(test)]
mod write_tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_write_atomic_creates_file_and_parents() {
        let temp = TempDir::new().unwrap();
        let paths = Paths::new(temp.path().to_path_buf());
        paths.ensure_dirs().unwrap();

        let target = temp.path().join("page/README.md");
        write_atomic(&target, b"hello", &paths.tmp_dir).unwrap();

        assert_eq!(fs::read_to_string(&target).unwrap(), "hello");
        assert!(fs::read_dir(&paths.tmp_dir).unwrap().next().is_none());
    }

    #[test]
    fn test_write_atomic_replaces_existing() {
        let temp = TempDir::new().unwrap();
        let paths = Paths::new(temp.path().to_path_buf());
        paths.ensure_dirs().unwrap();

        let target = temp.path().join("a.md");
        write_atomic(&target, b"old", &paths.tmp_dir).unwrap();
        write_atomic(&target, b"new", &paths.tmp_dir).unwrap();
        assert_eq!(fs::read_to_string(&target).unwrap(), "new");
    }

    #[test]
    fn test_remove_dir_if_exists() {
        let temp = TempDir::new().unwrap();
        let dir = temp.path().join("gone");
        fs::create_dir_all(dir.join("images")).unwrap();
        assert!(remove_dir_if_exists(&dir).unwrap());
        assert!(!remove_dir_if_exists(&dir).unwrap());
    }
}
