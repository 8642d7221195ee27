use crate::scanner::{ScanOptions, DEFAULT_MODEL_EXTENSIONS};
use serde::{Deserialize, Serialize};
use std::ffi::OsString;
use std::path::{Path, PathBuf};

pub const SETTINGS_FILE: &str = "settings.json";
pub const BASE_DIR_ENV: &str = "RANDOM_GEN_BASE_DIR";
pub const LORA_DIR_ENV: &str = "RANDOM_GEN_LORA_DIR";

const DEFAULT_TAGS_PATH: &str = "data/tags.json";
const DEFAULT_SAVED_PROMPTS_PATH: &str = "data/saved_prompts.json";
const DEFAULT_LORA_DIR: &str = "models/Lora";
const DEFAULT_CACHE_MAX_AGE_SECS: u64 = 300;

/// User-tunable paths and scan behavior.
///
/// Relative paths are resolved against the base directory passed to
/// [`Settings::load`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct Settings {
    pub tags_path: PathBuf,
    pub saved_prompts_path: PathBuf,
    pub lora_dir: PathBuf,
    pub model_extensions: Vec<String>,
    pub preview_url_prefix: Option<String>,
    pub cache_max_age_secs: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            tags_path: PathBuf::from(DEFAULT_TAGS_PATH),
            saved_prompts_path: PathBuf::from(DEFAULT_SAVED_PROMPTS_PATH),
            lora_dir: PathBuf::from(DEFAULT_LORA_DIR),
            model_extensions: DEFAULT_MODEL_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            preview_url_prefix: None,
            cache_max_age_secs: DEFAULT_CACHE_MAX_AGE_SECS,
        }
    }
}

impl Settings {
    /// Reads `settings.json` from `base_dir`, falling back to defaults when the
    /// file is missing or malformed, then applies environment overrides and
    /// resolves relative paths.
    pub fn load(base_dir: &Path) -> Self {
        let path = base_dir.join(SETTINGS_FILE);
        let mut settings = match std::fs::read_to_string(&path) {
            Ok(content) => serde_json::from_str::<Settings>(&content).unwrap_or_else(|error| {
                log::warn!(
                    "Ignoring malformed settings file {}: {}",
                    path.display(),
                    error
                );
                Settings::default()
            }),
            Err(_) => Settings::default(),
        };

        settings.apply_lora_dir_override(std::env::var_os(LORA_DIR_ENV));
        settings.resolve_against(base_dir);
        settings
    }

    /// `RANDOM_GEN_LORA_DIR` wins over the file; an empty value is ignored.
    fn apply_lora_dir_override(&mut self, raw: Option<OsString>) {
        if let Some(lora_dir) = raw.filter(|value| !value.is_empty()) {
            log::debug!("LoRA directory overridden by {}", LORA_DIR_ENV);
            self.lora_dir = PathBuf::from(lora_dir);
        }
    }

    fn resolve_against(&mut self, base_dir: &Path) {
        for path in [
            &mut self.tags_path,
            &mut self.saved_prompts_path,
            &mut self.lora_dir,
        ] {
            if path.is_relative() {
                *path = base_dir.join(&*path);
            }
        }
    }

    pub fn scan_options(&self) -> ScanOptions {
        ScanOptions {
            extensions: self.model_extensions.clone(),
            preview_url_prefix: self.preview_url_prefix.clone(),
        }
    }
}

/// Base directory: `RANDOM_GEN_BASE_DIR` when set, else the working directory.
pub fn default_base_dir() -> PathBuf {
    if let Some(dir) = std::env::var_os(BASE_DIR_ENV) {
        return PathBuf::from(dir);
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
