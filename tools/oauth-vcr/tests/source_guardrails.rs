use std::fs;
use std::path::{Path, PathBuf};

/// Modules whose decisions must show up in the run log.
const INSTRUMENTED_FILES: &[&str] = &["hook.rs", "proxy.rs", "loader.rs", "lib.rs"];
const PANIC_MARKERS: &[&str] = &[".unwrap()", ".expect(", "panic!(", "unreachable!("];

fn src_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("src")
}

fn rust_files(dir: &Path, out: &mut Vec<PathBuf>) {
    let entries = fs::read_dir(dir).unwrap_or_else(|e| panic!("read_dir {}: {e}", dir.display()));
    for entry in entries {
        let path = entry.expect("dir entry").path();
        if path.is_dir() {
            rust_files(&path, out);
        } else if path.extension().is_some_and(|ext| ext == "rs") {
            out.push(path);
        }
    }
}

/// Source up to the first `#[cfg(test)]` module.
fn production_source(path: &Path) -> String {
    let text = fs::read_to_string(path).unwrap_or_else(|e| panic!("read {}: {e}", path.display()));
    match text.find("#[cfg(test)]") {
        Some(index) => text[..index].to_string(),
        None => text,
    }
}

#[test]
fn production_code_does_not_panic_on_errors() {
    let mut files = Vec::new();
    rust_files(&src_dir(), &mut files);
    assert!(!files.is_empty());

    let mut violations = Vec::new();
    for path in &files {
        let source = production_source(path);
        for (number, line) in source.lines().enumerate() {
            let code = line.split("//").next().unwrap_or_default();
            if PANIC_MARKERS.iter().any(|marker| code.contains(marker)) {
                violations.push(format!("{}:{}: {}", path.display(), number + 1, line.trim()));
            }
        }
    }
    assert!(violations.is_empty(), "panicking calls:\n{}", violations.join("\n"));
}

#[test]
fn decision_points_are_instrumented() {
    for file in INSTRUMENTED_FILES {
        let source = production_source(&src_dir().join(file));
        assert!(
            source.contains("append_run_log("),
            "{file} has no run log instrumentation"
        );
    }
}
