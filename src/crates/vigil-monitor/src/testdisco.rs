//! Test-case discovery for test-framework mode.
//!
//! Walks the configured test directory and collects the names of test
//! functions, so test runs can be reconciled against the statuses the
//! instrumentation reports.

use crate::error::Result;
use std::path::Path;

/// Collect `def test...` function names from `test_*` source files under
/// `test_dir` (recursively). Instrumented copies (`.inst` suffix) count.
pub fn discover_test_cases(test_dir: impl AsRef<Path>) -> Result<Vec<String>> {
    let mut cases = Vec::new();
    walk(test_dir.as_ref(), &mut cases)?;
    Ok(cases)
}

fn walk(dir: &Path, cases: &mut Vec<String>) -> Result<()> {
    if !dir.is_dir() {
        return Ok(());
    }
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.is_dir() {
            walk(&path, cases)?;
            continue;
        }
        let name = match path.file_name().and_then(|n| n.to_str()) {
            Some(name) => name,
            None => continue,
        };
        if name.starts_with("test_") && (name.ends_with(".py") || name.ends_with(".py.inst")) {
            let content = std::fs::read_to_string(&path)?;
            for line in content.lines() {
                if let Some(rest) = line.trim_start().strip_prefix("def test") {
                    if let Some(paren) = rest.find('(') {
                        cases.push(format!("test{}", &rest[..paren]));
                    }
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_discovers_functions_in_test_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(
            dir.path().join("test_routes.py"),
            "def test_get(client):\n    pass\n\ndef helper():\n    pass\n\ndef test_post():\n    pass\n",
        )
        .unwrap();
        fs::write(dir.path().join("conftest.py"), "def test_ignored(): pass\n").unwrap();

        let mut cases = discover_test_cases(dir.path()).unwrap();
        cases.sort();
        assert_eq!(cases, vec!["test_get", "test_post"]);
    }

    #[test]
    fn test_missing_directory_is_empty() {
        let cases = discover_test_cases("does/not/exist").unwrap();
        assert!(cases.is_empty());
    }
}
