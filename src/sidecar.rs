//! Sidecar metadata for model files: trigger words stored next to a LoRA.
//!
//! Sidecars sit next to the model on disk (`foo.json`, `foo.civitai.info`).
//! Several tools write them with different keys; [`normalize_metadata`] folds
//! every known variant into one [`ModelMetadata`] right after parsing.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Sidecar suffixes probed in order; the first one that exists wins.
pub const METADATA_SUFFIXES: &[&str] = &[".json", ".civitai.info"];

const ACTIVATION_TEXT_KEY: &str = "activation text";
const TRAINED_WORDS_KEY: &str = "trainedWords";
const LEGACY_TRIGGER_KEYS: &[&str] = &["trigger", "trigger_words"];

/// Canonical trigger-word metadata for one model.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelMetadata {
    pub triggers: Vec<String>,
}

#[derive(Debug, Error)]
pub enum SidecarError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid JSON in {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("{path} does not contain a JSON object")]
    NotAnObject { path: String },
}

/// Appends `suffix` to the full base path (`dir/foo` + `.json` -> `dir/foo.json`).
pub fn with_suffix(base: &Path, suffix: &str) -> PathBuf {
    let mut raw: OsString = base.as_os_str().to_owned();
    raw.push(suffix);
    PathBuf::from(raw)
}

/// Locates and parses the metadata sidecar for a model whose path without
/// extension is `base`.
///
/// Returns `None` when no sidecar exists.
pub fn read_model_metadata(base: &Path) -> Option<Result<ModelMetadata, SidecarError>> {
    METADATA_SUFFIXES
        .iter()
        .map(|suffix| with_suffix(base, suffix))
        .find(|candidate| candidate.is_file())
        .map(|path| read_metadata_file(&path))
}

fn read_metadata_file(path: &Path) -> Result<ModelMetadata, SidecarError> {
    let content = std::fs::read_to_string(path).map_err(|source| SidecarError::Read {
        path: path.display().to_string(),
        source,
    })?;
    let value: Value = serde_json::from_str(&content).map_err(|source| SidecarError::Parse {
        path: path.display().to_string(),
        source,
    })?;
    if !value.is_object() {
        return Err(SidecarError::NotAnObject {
            path: path.display().to_string(),
        });
    }
    Ok(normalize_metadata(&value))
}

/// Maps any recognized sidecar schema onto [`ModelMetadata`].
///
/// Priority: a non-empty `activation text`, then each `trainedWords` entry,
/// then the legacy `trigger` / `trigger_words` fields. Later sources only add
/// words not already present.
pub fn normalize_metadata(value: &Value) -> ModelMetadata {
    let mut triggers: Vec<String> = Vec::new();

    if let Some(text) = value.get(ACTIVATION_TEXT_KEY).and_then(Value::as_str) {
        push_unique(&mut triggers, text);
    }

    if let Some(words) = value.get(TRAINED_WORDS_KEY) {
        for word in string_values(words) {
            push_unique(&mut triggers, word);
        }
    }

    for key in LEGACY_TRIGGER_KEYS {
        if let Some(words) = value.get(*key) {
            for word in string_values(words) {
                push_unique(&mut triggers, word);
            }
        }
    }

    ModelMetadata { triggers }
}

/// Accepts either a single string or an array of strings.
fn string_values(value: &Value) -> Vec<&str> {
    match value {
        Value::String(text) => vec![text.as_str()],
        Value::Array(items) => items.iter().filter_map(Value::as_str).collect(),
        _ => Vec::new(),
    }
}

fn push_unique(triggers: &mut Vec<String>, word: &str) {
    let trimmed = word.trim();
    if trimmed.is_empty() || triggers.iter().any(|existing| existing == trimmed) {
        return;
    }
    triggers.push(trimmed.to_string());
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::fs;

    #[test]
    fn test_activation_text_comes_first() {
        let metadata = normalize_metadata(&json!({
            "activation text": "trigger1",
            "trainedWords": ["trigger2", "trigger1"]
        }));
        assert_eq!(metadata.triggers, vec!["trigger1", "trigger2"]);
    }

    #[test]
    fn test_blank_activation_text_is_ignored() {
        let metadata = normalize_metadata(&json!({
            "activation text": "   ",
            "trainedWords": ["word"]
        }));
        assert_eq!(metadata.triggers, vec!["word"]);
    }

    #[test]
    fn test_legacy_trigger_fields_are_accepted() {
        let metadata = normalize_metadata(&json!({
            "trigger": "old_style",
            "trigger_words": ["a", "old_style", "b"]
        }));
        assert_eq!(metadata.triggers, vec!["old_style", "a", "b"]);
    }

    #[test]
    fn test_unrelated_fields_yield_no_triggers() {
        let metadata = normalize_metadata(&json!({"description": "nothing here"}));
        assert!(metadata.triggers.is_empty());
    }

    #[test]
    fn test_json_sidecar_wins_over_civitai_info() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("foo");
        fs::write(with_suffix(&base, ".json"), r#"{"activation text":"from json"}"#).unwrap();
        fs::write(
            with_suffix(&base, ".civitai.info"),
            r#"{"trainedWords":["from civitai"]}"#,
        )
        .unwrap();

        let metadata = read_model_metadata(&base).unwrap().unwrap();
        assert_eq!(metadata.triggers, vec!["from json"]);
    }

    #[test]
    fn test_civitai_info_fallback() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("bar");
        fs::write(
            with_suffix(&base, ".civitai.info"),
            r#"{"trainedWords":["civ1","civ2"]}"#,
        )
        .unwrap();

        let metadata = read_model_metadata(&base).unwrap().unwrap();
        assert_eq!(metadata.triggers, vec!["civ1", "civ2"]);
    }

    #[test]
    fn test_missing_sidecar_returns_none() {
        let dir = tempfile::tempdir().unwrap();
        assert!(read_model_metadata(&dir.path().join("none")).is_none());
    }

    #[test]
    fn test_malformed_sidecar_is_a_typed_error() {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("broken");
        fs::write(with_suffix(&base, ".json"), "{ nope").unwrap();
        let result = read_model_metadata(&base).unwrap();
        assert!(matches!(result, Err(SidecarError::Parse { .. })));

        fs::write(with_suffix(&base, ".json"), "[1, 2]").unwrap();
        let result = read_model_metadata(&base).unwrap();
        assert!(matches!(result, Err(SidecarError::NotAnObject { .. })));
    }

    #[test]
    fn test_with_suffix_keeps_dots_in_stem() {
        let base = Path::new("/models/style.v2");
        assert_eq!(
            with_suffix(base, ".preview.png"),
            PathBuf::from("/models/style.v2.preview.png")
        );
    }
}
