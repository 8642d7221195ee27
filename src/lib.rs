pub mod commands;
pub mod composer;
pub mod library;
pub mod saved_prompts;
pub mod scanner;
pub mod settings;
pub mod sidecar;
pub mod tags;

use library::LoraLibrary;
use settings::Settings;
use std::sync::RwLock;

/// Shared state handed to every command handler.
pub struct AppState {
    pub settings: Settings,
    pub library: RwLock<LoraLibrary>,
}

impl AppState {
    pub fn new(settings: Settings) -> Self {
        let library = LoraLibrary::new(settings.lora_dir.clone(), settings.scan_options());
        Self {
            settings,
            library: RwLock::new(library),
        }
    }
}

/// Sets up `env_logger` with an `info` default; safe to call more than once.
pub fn init_logging(verbose: bool) {
    let default_filter = if verbose { "debug" } else { "info" };
    let env = env_logger::Env::default().default_filter_or(default_filter);
    let _ = env_logger::Builder::from_env(env).try_init();
}
