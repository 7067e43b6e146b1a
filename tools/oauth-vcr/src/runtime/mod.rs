use crate::errors::VcrError;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Locks `mutex`, recovering the data if a previous holder panicked.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

pub trait FileSystem: Send + Sync {
    fn read_to_string(&self, path: &Path) -> Result<String, VcrError>;
    fn write_string(&self, path: &Path, contents: &str) -> Result<(), VcrError>;
    fn create_dir_all(&self, path: &Path) -> Result<(), VcrError>;
}

pub trait Terminal: Send + Sync {
    fn write_line(&self, line: &str) -> Result<(), VcrError>;
}

pub struct ProductionFileSystem;

impl FileSystem for ProductionFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, VcrError> {
        std::fs::read_to_string(path)
            .map_err(|e| VcrError::Io(format!("read {}: {e}", path.display())))
    }

    fn write_string(&self, path: &Path, contents: &str) -> Result<(), VcrError> {
        std::fs::write(path, contents)
            .map_err(|e| VcrError::Io(format!("write {}: {e}", path.display())))
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), VcrError> {
        std::fs::create_dir_all(path).map_err(|e| VcrError::Io(e.to_string()))
    }
}

pub struct ProductionTerminal;

impl Terminal for ProductionTerminal {
    fn write_line(&self, line: &str) -> Result<(), VcrError> {
        use std::io::Write;
        let mut out = std::io::stdout();
        writeln!(out, "{line}").map_err(|e| VcrError::Io(e.to_string()))
    }
}

pub struct ProductionRuntime {
    pub file_system: Arc<dyn FileSystem>,
    pub terminal: Arc<dyn Terminal>,
}

impl ProductionRuntime {
    pub fn new() -> Self {
        Self {
            file_system: Arc::new(ProductionFileSystem),
            terminal: Arc::new(ProductionTerminal),
        }
    }
}

impl Default for ProductionRuntime {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Default, Clone)]
pub struct FakeFileSystem {
    files: Arc<Mutex<HashMap<PathBuf, String>>>,
    dirs: Arc<Mutex<Vec<PathBuf>>>,
    fail_next_write: Arc<Mutex<Option<VcrError>>>,
}

impl FakeFileSystem {
    pub fn with_file(path: impl Into<PathBuf>, contents: impl Into<String>) -> Self {
        let fs = Self::default();
        lock(&fs.files).insert(path.into(), contents.into());
        fs
    }

    /// Makes the next `write_string` or `create_dir_all` fail with `error`.
    pub fn fail_next_write(&self, error: VcrError) {
        *lock(&self.fail_next_write) = Some(error);
    }

    pub fn file(&self, path: impl AsRef<Path>) -> Option<String> {
        lock(&self.files).get(path.as_ref()).cloned()
    }

    pub fn created_dirs(&self) -> Vec<PathBuf> {
        lock(&self.dirs).clone()
    }

    fn maybe_fail_write(&self) -> Result<(), VcrError> {
        match lock(&self.fail_next_write).take() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

impl FileSystem for FakeFileSystem {
    fn read_to_string(&self, path: &Path) -> Result<String, VcrError> {
        self.file(path)
            .ok_or_else(|| VcrError::Io(format!("missing file {}", path.display())))
    }

    fn write_string(&self, path: &Path, contents: &str) -> Result<(), VcrError> {
        self.maybe_fail_write()?;
        lock(&self.files).insert(path.to_path_buf(), contents.to_string());
        Ok(())
    }

    fn create_dir_all(&self, path: &Path) -> Result<(), VcrError> {
        self.maybe_fail_write()?;
        lock(&self.dirs).push(path.to_path_buf());
        Ok(())
    }
}

#[derive(Default, Clone)]
pub struct FakeTerminal {
    writes: Arc<Mutex<Vec<String>>>,
}

impl FakeTerminal {
    pub fn written_lines(&self) -> Vec<String> {
        lock(&self.writes).clone()
    }
}

impl Terminal for FakeTerminal {
    fn write_line(&self, line: &str) -> Result<(), VcrError> {
        lock(&self.writes).push(line.to_string());
        Ok(())
    }
}
