//! Handlers the host UI glue (or the CLI) calls, one per user action.
//!
//! Each takes primitive arguments plus [`AppState`] and returns plain values;
//! failures come back as inline status text rather than errors.

use crate::{
    composer::{self, ComposeOptions, TagAnalysis},
    saved_prompts::SavedPromptStore,
    scanner::{ModelEntry, ScanOutcome},
    tags::TagStore,
    AppState,
};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Shown in place of the gallery when the LoRA directory is missing.
pub const LIBRARY_NOT_FOUND_MESSAGE: &str = "LoRA directory not found";

/// Refreshed dropdown choices plus a status line after a save attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SaveResult {
    pub ok: bool,
    pub names: Vec<String>,
    pub status: String,
}

// ────────────────────────── Generation ──────────────────────────

pub fn generate_prompt(options: ComposeOptions, state: &AppState) -> String {
    composer::generate_prompt(&state.settings.tags_path, &options)
}

/// Prefixes the Tag Store's quality tags; an unreadable store contributes nothing.
pub fn add_quality_tags(current: &str, state: &AppState) -> String {
    let quality = match TagStore::load(&state.settings.tags_path) {
        Ok(store) => store.quality_tags.unwrap_or_default(),
        Err(error) => {
            log::warn!("Quality tags unavailable: {}", error);
            String::new()
        }
    };
    if quality.is_empty() {
        return current.to_string();
    }
    composer::add_quality_tags(&quality, current)
}

pub fn analyze_tags(text: &str) -> TagAnalysis {
    composer::analyze_tags(text)
}

// ────────────────────────── Saved prompts ──────────────────────────

fn saved_store(state: &AppState) -> SavedPromptStore {
    SavedPromptStore::new(&state.settings.saved_prompts_path)
}

pub fn save_prompt(name: &str, prompt: &str, state: &AppState) -> SaveResult {
    let store = saved_store(state);
    match store.save(name, prompt) {
        Ok(names) => SaveResult {
            ok: true,
            names,
            status: format!("Saved: {}", name),
        },
        Err(error) => {
            log::warn!("Save rejected: {}", error);
            SaveResult {
                ok: false,
                names: store.names(),
                status: format!("Error: {}", error),
            }
        }
    }
}

pub fn load_prompt(name: &str, state: &AppState) -> String {
    saved_store(state).load(name)
}

pub fn list_saved_prompts(state: &AppState) -> Vec<String> {
    saved_store(state).names()
}

// ────────────────────────── LoRA library ──────────────────────────

/// Returns the library, reusing the cached scan while it is younger than the
/// configured max age unless `force_refresh` is set.
pub fn scan_lora_library(force_refresh: bool, state: &AppState) -> Result<ScanOutcome, String> {
    let mut library = state
        .library
        .write()
        .map_err(|_| "Failed to lock LoRA library".to_string())?;

    let outcome = if force_refresh {
        library.refresh()
    } else {
        library.snapshot_within(Duration::from_secs(state.settings.cache_max_age_secs))
    };
    Ok(outcome.clone())
}

/// Looks a model up by name in the current library.
pub fn find_lora(name: &str, state: &AppState) -> Result<ModelEntry, String> {
    match scan_lora_library(false, state)? {
        ScanOutcome::NotFound { .. } => Err(LIBRARY_NOT_FOUND_MESSAGE.to_string()),
        ScanOutcome::Library(snapshot) => snapshot
            .find(name)
            .cloned()
            .ok_or_else(|| format!("LoRA not found: {}", name)),
    }
}

/// Appends a model's trigger words to the prompt field (unchanged if it has none).
pub fn insert_triggers(field: &str, entry: &ModelEntry) -> String {
    composer::append_to_prompt(field, &entry.trigger_text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::settings::Settings;
    use std::fs;

    const TAGS: &str = r#"{
        "appearance": {"hair": ["long hair"], "clothes_sets": {"sfw": ["dress"]}},
        "situations": [{"tags": "park", "poses": ["walking"]}],
        "random_poses": ["jumping"],
        "quality_tags": "masterpiece"
    }"#;

    fn state_in(dir: &std::path::Path) -> AppState {
        fs::create_dir_all(dir.join("data")).unwrap();
        fs::create_dir_all(dir.join("loras")).unwrap();
        fs::write(dir.join("data/tags.json"), TAGS).unwrap();
        let settings = Settings {
            tags_path: dir.join("data/tags.json"),
            saved_prompts_path: dir.join("data/saved_prompts.json"),
            lora_dir: dir.join("loras"),
            ..Settings::default()
        };
        AppState::new(settings)
    }

    #[test]
    fn test_generate_prompt_uses_configured_tags() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        let prompt = generate_prompt(ComposeOptions::default(), &state);
        assert_eq!(prompt, "masterpiece, long hair, dress, park, walking");
    }

    #[test]
    fn test_add_quality_tags_reads_store() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        assert_eq!(add_quality_tags("1girl", &state), "masterpiece, 1girl");
    }

    #[test]
    fn test_save_and_load_through_state() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());

        let rejected = save_prompt("", "1girl", &state);
        assert!(!rejected.ok);
        assert!(rejected.status.starts_with("Error:"));
        assert!(!state.settings.saved_prompts_path.exists());

        let saved = save_prompt("Test", "1girl, solo", &state);
        assert!(saved.ok);
        assert_eq!(saved.names, vec!["Test"]);
        assert_eq!(saved.status, "Saved: Test");
        assert_eq!(load_prompt("Test", &state), "1girl, solo");
        assert_eq!(list_saved_prompts(&state), vec!["Test"]);

        let padded = save_prompt(" Spaced ", "smile", &state);
        assert_eq!(padded.status, "Saved:  Spaced ");
        assert_eq!(load_prompt(" Spaced ", &state), "smile");
    }

    #[test]
    fn test_scan_and_insert_triggers() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        let loras = dir.path().join("loras");
        fs::write(loras.join("foo.safetensors"), b"w").unwrap();
        fs::write(
            loras.join("foo.json"),
            r#"{"activation text":"foo_style","trainedWords":["bar"]}"#,
        )
        .unwrap();

        let entry = find_lora("foo", &state).unwrap();
        assert_eq!(entry.trigger_text, "foo_style, bar");
        assert_eq!(insert_triggers("1girl", &entry), "1girl, foo_style, bar");
        assert_eq!(insert_triggers("", &entry), "foo_style, bar");
        assert!(find_lora("missing", &state).is_err());
    }

    #[test]
    fn test_cached_scan_until_forced() {
        let dir = tempfile::tempdir().unwrap();
        let state = state_in(dir.path());
        let loras = dir.path().join("loras");

        let first = scan_lora_library(false, &state).unwrap();
        assert!(matches!(first, ScanOutcome::Library(ref s) if s.is_empty()));

        fs::write(loras.join("late.safetensors"), b"w").unwrap();
        let cached = scan_lora_library(false, &state).unwrap();
        assert!(matches!(cached, ScanOutcome::Library(ref s) if s.is_empty()));

        let forced = scan_lora_library(true, &state).unwrap();
        assert!(matches!(forced, ScanOutcome::Library(ref s) if s.total_models == 1));
    }

    #[test]
    fn test_missing_lora_dir_reports_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let mut settings = state_in(dir.path()).settings;
        settings.lora_dir = dir.path().join("nope");
        let state = AppState::new(settings);
        assert!(matches!(
            scan_lora_library(true, &state).unwrap(),
            ScanOutcome::NotFound { .. }
        ));
        assert_eq!(
            find_lora("x", &state).unwrap_err(),
            LIBRARY_NOT_FOUND_MESSAGE
        );
    }
}
