//! Source loading seam. Loaded source text is passed through every registered
//! [`CodeTransform`] once interception is switched on.

use crate::errors::VcrError;
use crate::logging::append_run_log;
use crate::runtime::{lock, FileSystem};
use serde_json::json;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub trait CodeTransform: Send + Sync {
    /// Registration key; a loader holds at most one transformer per name.
    fn name(&self) -> &str;
    fn transform(&self, code: &str) -> String;
}

pub trait SourceLoader: Send + Sync {
    fn register_transformer(&self, transformer: Arc<dyn CodeTransform>);
    /// Routes subsequently loaded source through the registered transformers.
    fn intercept(&self);
    fn is_intercepting(&self) -> bool;
    fn transformer_names(&self) -> Vec<String>;
}

pub struct TransformingLoader {
    file_system: Arc<dyn FileSystem>,
    transformers: Mutex<Vec<Arc<dyn CodeTransform>>>,
    intercepting: AtomicBool,
}

impl TransformingLoader {
    pub fn new(file_system: Arc<dyn FileSystem>) -> Self {
        Self {
            file_system,
            transformers: Mutex::new(Vec::new()),
            intercepting: AtomicBool::new(false),
        }
    }

    /// Reads `path` and returns its (possibly rewritten) source.
    pub fn load(&self, path: &Path) -> Result<String, VcrError> {
        let source = self.file_system.read_to_string(path)?;
        Ok(self.transform_source(&source))
    }

    pub fn transform_source(&self, source: &str) -> String {
        if !self.is_intercepting() {
            return source.to_string();
        }
        let transformers = lock(&self.transformers).clone();
        transformers
            .iter()
            .fold(source.to_string(), |code, transformer| transformer.transform(&code))
    }
}

impl SourceLoader for TransformingLoader {
    fn register_transformer(&self, transformer: Arc<dyn CodeTransform>) {
        let mut transformers = lock(&self.transformers);
        if transformers.iter().any(|t| t.name() == transformer.name()) {
            return;
        }
        append_run_log(
            "debug",
            "loader.transformer.registered",
            json!({ "name": transformer.name(), "position": transformers.len() }),
        );
        transformers.push(transformer);
    }

    fn intercept(&self) {
        self.intercepting.store(true, Ordering::SeqCst);
    }

    fn is_intercepting(&self) -> bool {
        self.intercepting.load(Ordering::SeqCst)
    }

    fn transformer_names(&self) -> Vec<String> {
        lock(&self.transformers)
            .iter()
            .map(|t| t.name().to_string())
            .collect()
    }
}
