//! Rule files — one JSON document per rule in the rules directory.

use std::path::{Path, PathBuf};

use ruleflow_domain::error::RuleflowError;
use ruleflow_domain::rule::Rule;

/// Failure to read or accept one rule file.
#[derive(Debug, thiserror::Error)]
pub enum RuleLoadError {
    #[error("failed to read {}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("rule in {} is invalid", path.display())]
    Invalid {
        path: PathBuf,
        #[source]
        source: RuleflowError,
    },
}

/// Outcome of scanning a rules directory.
#[derive(Debug, Default)]
pub struct RuleSet {
    pub rules: Vec<Rule>,
    pub rejected: Vec<RuleLoadError>,
}

/// Read and validate a single rule file.
///
/// # Errors
///
/// Returns [`RuleLoadError`] if the file cannot be read, is not a rule
/// document, or holds an invalid rule.
pub fn read_rule(path: &Path) -> Result<Rule, RuleLoadError> {
    let content = std::fs::read_to_string(path).map_err(|source| RuleLoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let rule: Rule = serde_json::from_str(&content).map_err(|source| RuleLoadError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    rule.validate().map_err(|source| RuleLoadError::Invalid {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(rule)
}

/// Read every `*.json` file of `dir`, in file name order.
///
/// A missing directory yields an empty set. Files that fail to load are
/// collected in [`RuleSet::rejected`] instead of aborting the scan.
///
/// # Errors
///
/// Returns [`RuleLoadError::Io`] if `dir` exists but cannot be listed.
pub fn read_dir(dir: &Path) -> Result<RuleSet, RuleLoadError> {
    let io_error = |source| RuleLoadError::Io {
        path: dir.to_path_buf(),
        source,
    };
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::warn!(dir = %dir.display(), "rules directory not found");
            return Ok(RuleSet::default());
        }
        Err(err) => return Err(io_error(err)),
    };

    let mut paths = Vec::new();
    for entry in entries {
        let path = entry.map_err(io_error)?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
            paths.push(path);
        }
    }
    paths.sort();

    let mut set = RuleSet::default();
    for path in paths {
        match read_rule(&path) {
            Ok(rule) => set.rules.push(rule),
            Err(err) => set.rejected.push(err),
        }
    }
    Ok(set)
}

#[cfg(test)]
mod tests {
    use super::*;

    const VALID: &str = r#"{
        "name": "Cool down",
        "graph": {
            "nodes": [
                {"id": "t", "type": "trigger", "data": {"variable": "temp", "comparator": ">=", "value": 30}},
                {"id": "a", "type": "action", "data": {"actuatorId": "fan", "mode": "on"}}
            ],
            "edges": [{"id": "e1", "source": "t", "target": "a"}]
        }
    }"#;

    struct ScratchDir(PathBuf);

    impl ScratchDir {
        fn new(name: &str) -> Self {
            let path = std::env::temp_dir().join(format!(
                "ruleflowd-rules-{}-{name}",
                std::process::id()
            ));
            let _ = std::fs::remove_dir_all(&path);
            std::fs::create_dir_all(&path).unwrap();
            Self(path)
        }

        fn write(&self, file: &str, content: &str) -> PathBuf {
            let path = self.0.join(file);
            std::fs::write(&path, content).unwrap();
            path
        }
    }

    impl Drop for ScratchDir {
        fn drop(&mut self) {
            let _ = std::fs::remove_dir_all(&self.0);
        }
    }

    #[test]
    fn should_read_valid_rule_file() {
        let dir = ScratchDir::new("valid");
        let path = dir.write("cool.json", VALID);

        let rule = read_rule(&path).unwrap();

        assert_eq!(rule.name, "Cool down");
        assert!(rule.enabled);
        assert_eq!(rule.graph.node_count(), 2);
    }

    #[test]
    fn should_report_parse_error_for_malformed_json() {
        let dir = ScratchDir::new("malformed");
        let path = dir.write("broken.json", "{ not json");

        assert!(matches!(read_rule(&path), Err(RuleLoadError::Parse { .. })));
    }

    #[test]
    fn should_report_invalid_rule_with_empty_name() {
        let dir = ScratchDir::new("unnamed");
        let path = dir.write("unnamed.json", &VALID.replace("Cool down", " "));

        assert!(matches!(read_rule(&path), Err(RuleLoadError::Invalid { .. })));
    }

    #[test]
    fn should_skip_bad_files_and_ignore_other_extensions() {
        let dir = ScratchDir::new("mixed");
        dir.write("a.json", VALID);
        dir.write("b.json", "[]");
        dir.write("notes.txt", "not a rule");

        let set = read_dir(&dir.0).unwrap();

        assert_eq!(set.rules.len(), 1);
        assert_eq!(set.rejected.len(), 1);
        assert!(matches!(set.rejected[0], RuleLoadError::Parse { .. }));
    }

    #[test]
    fn should_return_empty_set_for_missing_directory() {
        let set = read_dir(Path::new("definitely/not/here")).unwrap();
        assert!(set.rules.is_empty());
        assert!(set.rejected.is_empty());
    }
}
