use crate::sidecar::{self, SidecarError};
use chrono::{DateTime, Local};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

/// Label of the group holding models that sit directly in the scan root.
pub const ROOT_LABEL: &str = "Root";
/// Preview image suffixes probed in order; the first one that exists wins.
pub const PREVIEW_SUFFIXES: &[&str] = &[".preview.png", ".png", ".jpg", ".jpeg", ".webp"];
pub const DEFAULT_MODEL_EXTENSIONS: &[&str] = &["safetensors"];

const MAX_SCAN_THREADS: usize = 8;

/// One model card in the gallery.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelEntry {
    /// Filename without extension.
    pub name: String,
    pub path: String,
    /// Display label of the group this entry belongs to.
    pub folder: String,
    /// Folder relative to the scan root; `None` for models at the top level.
    pub subfolder: Option<String>,
    pub image: Option<String>,
    pub triggers: Vec<String>,
    /// `triggers` joined with `", "`, ready to append to a prompt.
    pub trigger_text: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ModelFolder {
    pub label: String,
    /// Grouping key; `None` is the top level, so a real `Root/` folder stays separate.
    pub subfolder: Option<String>,
    pub entries: Vec<ModelEntry>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SidecarIssueKind {
    Unreadable,
    InvalidJson,
    NotAnObject,
}

/// A sidecar that was skipped during the scan.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SidecarIssue {
    pub model: String,
    pub kind: SidecarIssueKind,
    pub message: String,
}

impl SidecarIssue {
    fn new(model: &Path, error: &SidecarError) -> Self {
        let kind = match error {
            SidecarError::Read { .. } => SidecarIssueKind::Unreadable,
            SidecarError::Parse { .. } => SidecarIssueKind::InvalidJson,
            SidecarError::NotAnObject { .. } => SidecarIssueKind::NotAnObject,
        };
        Self {
            model: model.to_string_lossy().to_string(),
            kind,
            message: error.to_string(),
        }
    }
}

/// Everything one full scan found.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LibrarySnapshot {
    pub root: String,
    /// Root group first, subfolders alphabetically after it.
    pub folders: Vec<ModelFolder>,
    pub issues: Vec<SidecarIssue>,
    pub total_models: usize,
    pub scanned_at: DateTime<Local>,
}

impl LibrarySnapshot {
    pub fn is_empty(&self) -> bool {
        self.total_models == 0
    }

    pub fn find(&self, name: &str) -> Option<&ModelEntry> {
        self.folders
            .iter()
            .flat_map(|folder| folder.entries.iter())
            .find(|entry| entry.name == name)
    }
}

/// Result of scanning a model directory. A missing root is reported as
/// `NotFound`, never as an empty library.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ScanOutcome {
    NotFound { root: String },
    Library(LibrarySnapshot),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScanOptions {
    /// Model file extensions without the dot, matched case-insensitively.
    pub extensions: Vec<String>,
    /// Prepended to preview paths, e.g. `/file=` for the web UI's file route.
    pub preview_url_prefix: Option<String>,
}

impl Default for ScanOptions {
    fn default() -> Self {
        Self {
            extensions: DEFAULT_MODEL_EXTENSIONS
                .iter()
                .map(|ext| ext.to_string())
                .collect(),
            preview_url_prefix: None,
        }
    }
}

pub const SCAN_THREADS_ENV: &str = "RANDOM_GEN_SCAN_THREADS";

fn scan_threads() -> usize {
    let cpu_count = std::thread::available_parallelism()
        .map(|count| count.get())
        .unwrap_or(4);
    threads_from(std::env::var(SCAN_THREADS_ENV).ok().as_deref(), cpu_count)
}

/// Explicit override clamped to `1..=32`; otherwise the CPU count capped at
/// `MAX_SCAN_THREADS`.
fn threads_from(raw: Option<&str>, cpu_count: usize) -> usize {
    if let Some(parsed) = raw.and_then(|raw| raw.trim().parse::<usize>().ok()) {
        return parsed.clamp(1, 32);
    }
    cpu_count.clamp(1, MAX_SCAN_THREADS)
}

fn scan_pool() -> Option<&'static rayon::ThreadPool> {
    static POOL: OnceLock<Option<rayon::ThreadPool>> = OnceLock::new();

    POOL.get_or_init(|| {
        let threads = scan_threads();
        match rayon::ThreadPoolBuilder::new()
            .num_threads(threads)
            .thread_name(|idx| format!("lora-scan-{}", idx))
            .build()
        {
            Ok(pool) => Some(pool),
            Err(error) => {
                log::warn!("Falling back to the global rayon pool: {}", error);
                None
            }
        }
    })
    .as_ref()
}

/// Recursively lists model files under `root` matching `extensions`.
pub fn discover_model_files(root: &Path, extensions: &[String]) -> Vec<PathBuf> {
    let mut paths = Vec::new();
    for entry in walkdir::WalkDir::new(root)
        .follow_links(false)
        .max_open(32)
        .into_iter()
        .filter_map(Result::ok)
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        let Some(ext) = path.extension() else {
            continue;
        };
        let ext = ext.to_string_lossy();
        if extensions
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&ext))
        {
            paths.push(path.to_path_buf());
        }
    }
    paths
}

/// Finds the preview image for a model whose path without extension is `base`.
pub fn find_preview(base: &Path) -> Option<PathBuf> {
    PREVIEW_SUFFIXES
        .iter()
        .map(|suffix| sidecar::with_suffix(base, suffix))
        .find(|candidate| candidate.is_file())
}

/// Folder of a model relative to `root` with `/` separators, or `None` when
/// the model sits directly in `root`.
fn relative_folder(root: &Path, model_path: &Path) -> Option<String> {
    let relative = model_path
        .parent()
        .and_then(|parent| parent.strip_prefix(root).ok())
        .map(|relative| {
            relative
                .components()
                .map(|component| component.as_os_str().to_string_lossy().to_string())
                .collect::<Vec<_>>()
                .join("/")
        })
        .unwrap_or_default();

    if relative.is_empty() {
        None
    } else {
        Some(relative)
    }
}

fn folder_label(subfolder: Option<&str>) -> String {
    subfolder.unwrap_or(ROOT_LABEL).to_string()
}

/// Top level first, then subfolders case-insensitively.
fn compare_subfolders(a: Option<&str>, b: Option<&str>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(a), Some(b)) => compare_case_insensitive(a, b),
    }
}

fn build_entry(
    root: &Path,
    model_path: &Path,
    options: &ScanOptions,
) -> (ModelEntry, Option<SidecarIssue>) {
    let base = model_path.with_extension("");
    let name = model_path
        .file_stem()
        .unwrap_or_default()
        .to_string_lossy()
        .to_string();

    let image = find_preview(&base).map(|preview| match &options.preview_url_prefix {
        Some(prefix) => format!("{}{}", prefix, preview.display()),
        None => preview.display().to_string(),
    });

    let (triggers, issue) = match sidecar::read_model_metadata(&base) {
        Some(Ok(metadata)) => (metadata.triggers, None),
        Some(Err(error)) => {
            log::warn!("Skipping sidecar for {}: {}", model_path.display(), error);
            (Vec::new(), Some(SidecarIssue::new(model_path, &error)))
        }
        None => (Vec::new(), None),
    };

    let subfolder = relative_folder(root, model_path);
    let entry = ModelEntry {
        trigger_text: triggers.join(", "),
        name,
        path: model_path.to_string_lossy().to_string(),
        folder: folder_label(subfolder.as_deref()),
        subfolder,
        image,
        triggers,
    };
    (entry, issue)
}

fn compare_case_insensitive(a: &str, b: &str) -> Ordering {
    a.to_lowercase()
        .cmp(&b.to_lowercase())
        .then_with(|| a.cmp(b))
}

/// Full scan of `root`. Sidecar problems are collected per file, never fatal.
pub fn scan_library(root: &Path, options: &ScanOptions) -> ScanOutcome {
    if !root.is_dir() {
        log::info!("LoRA directory not found: {}", root.display());
        return ScanOutcome::NotFound {
            root: root.display().to_string(),
        };
    }

    let timer = std::time::Instant::now();
    let model_files = discover_model_files(root, &options.extensions);
    let total_models = model_files.len();

    let build = || -> Vec<(ModelEntry, Option<SidecarIssue>)> {
        model_files
            .par_iter()
            .map(|path| build_entry(root, path, options))
            .collect()
    };
    let built = match scan_pool() {
        Some(pool) => pool.install(build),
        None => build(),
    };

    let mut grouped: HashMap<Option<String>, Vec<ModelEntry>> = HashMap::new();
    let mut issues = Vec::new();
    for (entry, issue) in built {
        if let Some(issue) = issue {
            issues.push(issue);
        }
        grouped
            .entry(entry.subfolder.clone())
            .or_default()
            .push(entry);
    }

    let mut folders: Vec<ModelFolder> = grouped
        .into_iter()
        .map(|(subfolder, mut entries)| {
            entries.sort_by(|a, b| compare_case_insensitive(&a.name, &b.name));
            ModelFolder {
                label: folder_label(subfolder.as_deref()),
                subfolder,
                entries,
            }
        })
        .collect();
    folders.sort_by(|a, b| compare_subfolders(a.subfolder.as_deref(), b.subfolder.as_deref()));
    issues.sort_by(|a, b| a.model.cmp(&b.model));

    log::info!(
        "LoRA scan of {}: {} models in {} folders, {} sidecar issues ({:.1} ms)",
        root.display(),
        total_models,
        folders.len(),
        issues.len(),
        timer.elapsed().as_secs_f64() * 1000.0
    );

    ScanOutcome::Library(LibrarySnapshot {
        root: root.display().to_string(),
        folders,
        issues,
        total_models,
        scanned_at: Local::now(),
    })
}
