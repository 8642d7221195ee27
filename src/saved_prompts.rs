//! Named prompts persisted as one flat JSON object (`{name: prompt}`).
//!
//! The file is read in full and rewritten in full on every save. There is no
//! locking: two processes saving at once resolve as last-writer-wins.

use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SavedPromptError {
    #[error("Name is empty")]
    EmptyName,
    #[error("Prompt is empty")]
    EmptyPrompt,
    #[error("failed to serialize saved prompts: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("failed to write {path}: {source}")]
    Write {
        path: String,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Clone)]
pub struct SavedPromptStore {
    path: PathBuf,
}

impl SavedPromptStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Stores `prompt` under `name` exactly as given, replacing any earlier
    /// entry, and returns every saved name in file order.
    ///
    /// A blank name or an empty prompt is rejected before the file is read.
    pub fn save(&self, name: &str, prompt: &str) -> Result<Vec<String>, SavedPromptError> {
        if name.trim().is_empty() {
            return Err(SavedPromptError::EmptyName);
        }
        if prompt.is_empty() {
            return Err(SavedPromptError::EmptyPrompt);
        }

        let mut entries = self.read_entries();
        entries.insert(name.to_string(), Value::String(prompt.to_string()));
        self.write_entries(&entries)?;

        log::info!("Saved prompt '{}' to {}", name, self.path.display());
        Ok(entries.keys().cloned().collect())
    }

    /// Returns the prompt stored under `name`, or an empty string.
    pub fn load(&self, name: &str) -> String {
        self.read_entries()
            .get(name)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    pub fn names(&self) -> Vec<String> {
        self.read_entries().keys().cloned().collect()
    }

    /// Missing and unreadable files both read as an empty store.
    fn read_entries(&self) -> Map<String, Value> {
        let content = match std::fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(_) => return Map::new(),
        };

        match serde_json::from_str::<Value>(&content) {
            Ok(Value::Object(entries)) => entries,
            Ok(_) => {
                log::warn!(
                    "Saved prompt file {} is not a JSON object; treating as empty",
                    self.path.display()
                );
                Map::new()
            }
            Err(error) => {
                log::warn!(
                    "Failed to parse saved prompts {}: {}; treating as empty",
                    self.path.display(),
                    error
                );
                Map::new()
            }
        }
    }

    fn write_entries(&self, entries: &Map<String, Value>) -> Result<(), SavedPromptError> {
        let payload = serde_json::to_string_pretty(entries)?;
        let write_error = |source: std::io::Error| SavedPromptError::Write {
            path: self.path.display().to_string(),
            source,
        };

        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(write_error)?;
        }

        let staging = self.path.with_extension("json.tmp");
        std::fs::write(&staging, payload).map_err(write_error)?;
        std::fs::rename(&staging, &self.path).map_err(write_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn temp_store() -> (tempfile::TempDir, SavedPromptStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = SavedPromptStore::new(dir.path().join("saved_prompts.json"));
        (dir, store)
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let (_dir, store) = temp_store();
        let names = store.save("Test", "1girl, solo").unwrap();
        assert_eq!(names, vec!["Test"]);
        assert_eq!(store.load("Test"), "1girl, solo");
    }

    #[test]
    fn test_load_missing_name_is_empty() {
        let (_dir, store) = temp_store();
        assert_eq!(store.load("nothing"), "");
    }

    #[test]
    fn test_empty_name_never_touches_file() {
        let (_dir, store) = temp_store();
        store.save("keep", "a, b").unwrap();
        let before = fs::read(store.path()).unwrap();

        assert!(matches!(
            store.save("", "1girl"),
            Err(SavedPromptError::EmptyName)
        ));
        assert!(matches!(
            store.save("   ", "1girl"),
            Err(SavedPromptError::EmptyName)
        ));

        assert_eq!(fs::read(store.path()).unwrap(), before);
    }

    #[test]
    fn test_padded_name_is_stored_verbatim() {
        let (_dir, store) = temp_store();
        let names = store.save(" Test ", "1girl, solo").unwrap();
        assert_eq!(names, vec![" Test "]);
        assert_eq!(store.load(" Test "), "1girl, solo");
        assert_eq!(store.load("Test"), "");
    }

    #[test]
    fn test_only_empty_prompt_is_rejected() {
        let (_dir, store) = temp_store();
        assert!(matches!(
            store.save("blank", ""),
            Err(SavedPromptError::EmptyPrompt)
        ));
        assert!(!store.path().exists());

        store.save("spaces", "  ").unwrap();
        assert_eq!(store.load("spaces"), "  ");
    }

    #[test]
    fn test_empty_name_does_not_create_file() {
        let (_dir, store) = temp_store();
        assert!(store.save("", "1girl").is_err());
        assert!(!store.path().exists());
    }

    #[test]
    fn test_save_is_idempotent() {
        let (_dir, store) = temp_store();
        store.save("a", "x").unwrap();
        store.save("b", "y").unwrap();
        let first = fs::read(store.path()).unwrap();
        store.save("b", "y").unwrap();
        assert_eq!(fs::read(store.path()).unwrap(), first);
    }

    #[test]
    fn test_overwrite_keeps_insertion_order() {
        let (_dir, store) = temp_store();
        store.save("first", "1").unwrap();
        store.save("second", "2").unwrap();
        let names = store.save("first", "updated").unwrap();
        assert_eq!(names, vec!["first", "second"]);
        assert_eq!(store.load("first"), "updated");
    }

    #[test]
    fn test_corrupt_file_is_treated_as_empty() {
        let (_dir, store) = temp_store();
        fs::write(store.path(), "not json at all").unwrap();
        assert!(store.names().is_empty());
        let names = store.save("fresh", "prompt").unwrap();
        assert_eq!(names, vec!["fresh"]);
    }

    #[test]
    fn test_file_format_is_indented_and_keeps_unicode() {
        let (_dir, store) = temp_store();
        store.save("猫", "猫耳, smile").unwrap();
        let content = fs::read_to_string(store.path()).unwrap();
        assert_eq!(content, "{\n  \"猫\": \"猫耳, smile\"\n}");
    }
}
