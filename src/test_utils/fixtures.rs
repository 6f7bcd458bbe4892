use std::path::PathBuf;

use tempfile::TempDir;

/// Test fixture providing an isolated application root.
pub struct RootFixture {
    pub temp_dir: TempDir,
    pub root: PathBuf,
}

impl Default for RootFixture {
    fn default() -> Self {
        Self::new()
    }
}

impl RootFixture {
    #[must_use]
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().to_path_buf();
        Self { temp_dir, root }
    }

    /// Create a file under the root with content.
    pub fn create_file(&self, relative_path: &str, content: &str) -> PathBuf {
        let full_path = self.root.join(relative_path);
        if let Some(parent) = full_path.parent() {
            std::fs::create_dir_all(parent).expect("Failed to create parent dirs");
        }
        std::fs::write(&full_path, content).expect("Failed to write file");
        full_path
    }

    /// Write `config.toml` at the root.
    pub fn write_config(&self, content: &str) -> PathBuf {
        self.create_file("config.toml", content)
    }

    #[must_use]
    pub fn path(&self, relative_path: &str) -> PathBuf {
        self.root.join(relative_path)
    }
}
