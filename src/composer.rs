use crate::tags::{AllowedTiers, Situation, TagPool, TagStore};
use rand::seq::IndexedRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use thiserror::Error;

/// Separator used both inside generated prompts and when inserting into a host field.
pub const PROMPT_SEPARATOR: &str = ", ";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum PoseMode {
    /// Pose drawn from the chosen situation's own pose list.
    #[default]
    ContextAware,
    /// Pose drawn from the global `random_poses` list.
    Chaos,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClothingMode {
    #[default]
    FullSet,
    MixMatch,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct ComposeOptions {
    pub pose_mode: PoseMode,
    pub clothing_mode: ClothingMode,
    pub allow_nsfw: bool,
    pub allow_extreme: bool,
    pub prepend_quality: bool,
}

impl Default for ComposeOptions {
    fn default() -> Self {
        Self {
            pose_mode: PoseMode::ContextAware,
            clothing_mode: ClothingMode::FullSet,
            allow_nsfw: false,
            allow_extreme: false,
            prepend_quality: true,
        }
    }
}

impl ComposeOptions {
    pub fn allowed_tiers(&self) -> AllowedTiers {
        AllowedTiers::new(self.allow_nsfw, self.allow_extreme)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ComposeError {
    #[error("required key '{0}' is missing from the tag file")]
    MissingKey(&'static str),
    #[error("no eligible tags for '{0}' with the selected tiers")]
    EmptyPool(&'static str),
}

/// Result of splitting a prompt back into its comma-separated tags.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagAnalysis {
    pub count: usize,
    pub tags: Vec<String>,
}

/// Loads the Tag Store from `tags_path` and composes one prompt.
///
/// Never fails: load, parse and schema problems come back as an `Error: ...`
/// string the UI can show in place of a prompt.
pub fn generate_prompt(tags_path: &Path, options: &ComposeOptions) -> String {
    let store = match TagStore::load(tags_path) {
        Ok(store) => store,
        Err(error) => {
            log::error!("Failed to load tag store: {}", error);
            return format!("Error: Could not load tags ({})", error);
        }
    };

    match compose(&store, options, &mut rand::rng()) {
        Ok(prompt) => prompt,
        Err(error) => {
            log::error!("Prompt generation failed: {}", error);
            format!("Error: {}", error)
        }
    }
}

/// Samples one value per category and joins the deduplicated result.
pub fn compose<R: Rng + ?Sized>(
    store: &TagStore,
    options: &ComposeOptions,
    rng: &mut R,
) -> Result<String, ComposeError> {
    let allowed = options.allowed_tiers();
    let mut parts: Vec<String> = Vec::new();

    if let Some(appearance) = &store.appearance {
        for pool in [
            &appearance.hair_texture,
            &appearance.hair,
            &appearance.eyes,
            &appearance.body,
            &appearance.expressions,
        ]
        .into_iter()
        .flatten()
        {
            push_optional(&mut parts, pool, allowed, rng);
        }

        match options.clothing_mode {
            ClothingMode::FullSet => {
                let sets = appearance
                    .clothes_sets
                    .as_ref()
                    .ok_or(ComposeError::MissingKey("clothes_sets"))?;
                parts.push(pick_required(sets, allowed, "clothes_sets", rng)?);
            }
            ClothingMode::MixMatch => {
                let separates = appearance
                    .separates
                    .as_ref()
                    .ok_or(ComposeError::MissingKey("separates"))?;
                parts.push(pick_required(&separates.tops, allowed, "tops", rng)?);
                parts.push(pick_required(&separates.bottoms, allowed, "bottoms", rng)?);
                parts.push(pick_required(&separates.underwear, allowed, "underwear", rng)?);
            }
        }

        if let Some(accessories) = &appearance.accessories {
            push_optional(&mut parts, accessories, allowed, rng);
        }
    }

    let situations = store
        .situations
        .as_ref()
        .ok_or(ComposeError::MissingKey("situations"))?;
    let eligible: Vec<&Situation> = situations
        .iter()
        .filter(|situation| allowed.contains(situation.nsfw_level))
        .collect();
    let fallback = Situation::fallback();
    let situation = eligible.choose(rng).copied().unwrap_or(&fallback);

    if !situation.tags.trim().is_empty() {
        parts.push(situation.tags.clone());
    }

    let pose = match options.pose_mode {
        PoseMode::ContextAware => situation.poses.choose(rng),
        PoseMode::Chaos => store
            .random_poses
            .as_ref()
            .ok_or(ComposeError::MissingKey("random_poses"))?
            .choose(rng),
    };
    if let Some(pose) = pose {
        parts.push(pose.clone());
    }

    let joined = dedup_preserving_order(parts).join(PROMPT_SEPARATOR);

    if options.prepend_quality {
        let quality = store
            .quality_tags
            .as_deref()
            .ok_or(ComposeError::MissingKey("quality_tags"))?;
        return Ok(format!("{}{}{}", quality, PROMPT_SEPARATOR, joined));
    }

    Ok(joined)
}

fn push_optional<R: Rng + ?Sized>(
    parts: &mut Vec<String>,
    pool: &TagPool,
    allowed: AllowedTiers,
    rng: &mut R,
) {
    if let Some(value) = pool.eligible(allowed).choose(rng) {
        parts.push((*value).to_string());
    }
}

fn pick_required<R: Rng + ?Sized>(
    pool: &TagPool,
    allowed: AllowedTiers,
    label: &'static str,
    rng: &mut R,
) -> Result<String, ComposeError> {
    pool.eligible(allowed)
        .choose(rng)
        .map(|value| (*value).to_string())
        .ok_or(ComposeError::EmptyPool(label))
}

/// Drops exact repeats, keeping the first occurrence of each value in place.
pub fn dedup_preserving_order<I>(values: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut seen = HashSet::new();
    values
        .into_iter()
        .filter(|value| seen.insert(value.clone()))
        .collect()
}

/// Prefixes `quality` onto whatever is currently in the prompt box.
pub fn add_quality_tags(quality: &str, current: &str) -> String {
    if current.trim().is_empty() {
        return quality.to_string();
    }
    format!("{}{}{}", quality, PROMPT_SEPARATOR, current)
}

pub fn analyze_tags(text: &str) -> TagAnalysis {
    let tags: Vec<String> = text.split(',').map(|tag| tag.trim().to_string()).collect();
    TagAnalysis {
        count: tags.len(),
        tags,
    }
}

/// Appends `addition` to a host prompt field, separating with `", "` only
/// when the field already holds text.
pub fn append_to_prompt(field: &str, addition: &str) -> String {
    let addition = addition.trim();
    if addition.is_empty() {
        return field.to_string();
    }
    let existing = field.trim_end();
    if existing.is_empty() {
        return addition.to_string();
    }
    let existing = existing.strip_suffix(',').unwrap_or(existing).trim_end();
    format!("{}{}{}", existing, PROMPT_SEPARATOR, addition)
}
