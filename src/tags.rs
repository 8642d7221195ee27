//! Tag Store: the hand-authored JSON taxonomy the composer samples from.
//!
//! Every category is either a flat list (treated as all-`sfw`) or a tiered
//! `{sfw, nsfw, extreme}` object. Only `sfw` is mandatory in the tiered form.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use thiserror::Error;

/// Content-rating bucket gating which values are eligible for sampling.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Default)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    #[default]
    Sfw,
    Nsfw,
    Extreme,
    /// Any level this build does not recognize; never eligible.
    #[serde(other)]
    Unknown,
}

/// Set of tiers a generation run may draw from. `sfw` is always allowed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AllowedTiers {
    pub nsfw: bool,
    pub extreme: bool,
}

impl AllowedTiers {
    pub fn new(allow_nsfw: bool, allow_extreme: bool) -> Self {
        Self {
            nsfw: allow_nsfw,
            extreme: allow_extreme,
        }
    }

    pub fn contains(&self, tier: Tier) -> bool {
        match tier {
            Tier::Sfw => true,
            Tier::Nsfw => self.nsfw,
            Tier::Extreme => self.extreme,
            Tier::Unknown => false,
        }
    }
}

/// Per-tier lists. `nsfw` and `extreme` are additive and may be omitted.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TieredTags {
    pub sfw: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub nsfw: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extreme: Vec<String>,
}

/// A sampling pool: either a flat list or a tier-partitioned one.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(untagged)]
pub enum TagPool {
    Flat(Vec<String>),
    Tiered(TieredTags),
}

impl TagPool {
    /// Concatenates every list whose tier is allowed, in `sfw, nsfw, extreme` order.
    pub fn eligible(&self, allowed: AllowedTiers) -> Vec<&str> {
        match self {
            TagPool::Flat(values) => values.iter().map(String::as_str).collect(),
            TagPool::Tiered(tiers) => {
                let mut pool: Vec<&str> = tiers.sfw.iter().map(String::as_str).collect();
                if allowed.contains(Tier::Nsfw) {
                    pool.extend(tiers.nsfw.iter().map(String::as_str));
                }
                if allowed.contains(Tier::Extreme) {
                    pool.extend(tiers.extreme.iter().map(String::as_str));
                }
                pool
            }
        }
    }
}

/// Garment slots sampled independently in mix-and-match mode.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Separates {
    pub tops: TagPool,
    pub bottoms: TagPool,
    pub underwear: TagPool,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Appearance {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hair_texture: Option<TagPool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hair: Option<TagPool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub eyes: Option<TagPool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<TagPool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expressions: Option<TagPool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub clothes_sets: Option<TagPool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub separates: Option<Separates>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub accessories: Option<TagPool>,
    /// Categories this build does not sample from are kept so the file
    /// round-trips untouched.
    #[serde(flatten)]
    pub extra: HashMap<String, serde_json::Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Situation {
    pub tags: String,
    #[serde(default)]
    pub poses: Vec<String>,
    #[serde(default)]
    pub nsfw_level: Tier,
}

impl Situation {
    /// Used when no situation survives tier filtering.
    pub fn fallback() -> Self {
        Self {
            tags: "simple background".to_string(),
            poses: vec!["standing".to_string()],
            nsfw_level: Tier::Sfw,
        }
    }
}

/// Whole Tag Store document.
///
/// Keys the composer only needs in some modes (`situations`, `random_poses`,
/// `quality_tags`) are optional here and checked at generation time.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct TagStore {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub appearance: Option<Appearance>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub situations: Option<Vec<Situation>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub random_poses: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quality_tags: Option<String>,
}

#[derive(Debug, Error)]
pub enum TagStoreError {
    #[error("tag file not found at {0}")]
    NotFound(String),
    #[error("failed to read tag file {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to parse tag file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_json::Error,
    },
}

impl TagStore {
    /// Reads and parses the Tag Store. Called on every operation so edits to
    /// the file take effect without a restart.
    pub fn load(path: &Path) -> Result<Self, TagStoreError> {
        if !path.exists() {
            return Err(TagStoreError::NotFound(path.display().to_string()));
        }
        let content = std::fs::read_to_string(path).map_err(|source| TagStoreError::Io {
            path: path.display().to_string(),
            source,
        })?;
        Self::from_json(&content).map_err(|source| TagStoreError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn from_json(content: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(content)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_pool_ignores_tiers() {
        let pool: TagPool = serde_json::from_str(r#"["a", "b"]"#).unwrap();
        assert_eq!(pool.eligible(AllowedTiers::new(false, false)), vec!["a", "b"]);
    }

    #[test]
    fn test_tiered_pool_respects_allowed_tiers() {
        let pool: TagPool =
            serde_json::from_str(r#"{"sfw":["s"],"nsfw":["n"],"extreme":["x"]}"#).unwrap();
        assert_eq!(pool.eligible(AllowedTiers::new(false, false)), vec!["s"]);
        assert_eq!(pool.eligible(AllowedTiers::new(true, false)), vec!["s", "n"]);
        assert_eq!(pool.eligible(AllowedTiers::new(false, true)), vec!["s", "x"]);
        assert_eq!(
            pool.eligible(AllowedTiers::new(true, true)),
            vec!["s", "n", "x"]
        );
    }

    #[test]
    fn test_tiered_pool_optional_tiers_default_empty() {
        let pool: TagPool = serde_json::from_str(r#"{"sfw":["s"]}"#).unwrap();
        assert_eq!(pool.eligible(AllowedTiers::new(true, true)), vec!["s"]);
    }

    #[test]
    fn test_tiered_pool_without_sfw_is_rejected() {
        let result = serde_json::from_str::<TagPool>(r#"{"nsfw":["n"]}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_situation_level_defaults_to_sfw() {
        let situation: Situation =
            serde_json::from_str(r#"{"tags":"classroom","poses":["sitting"]}"#).unwrap();
        assert_eq!(situation.nsfw_level, Tier::Sfw);
    }

    #[test]
    fn test_unrecognized_level_parses_as_unknown() {
        let store = TagStore::from_json(
            r#"{"situations": [
                {"tags": "park", "poses": ["walking"]},
                {"tags": "club", "poses": ["dancing"], "nsfw_level": "r18"},
                {"tags": "bath", "poses": ["sitting"], "nsfw_level": "NSFW"}
            ]}"#,
        )
        .unwrap();
        let levels: Vec<Tier> = store
            .situations
            .unwrap()
            .iter()
            .map(|situation| situation.nsfw_level)
            .collect();
        assert_eq!(levels, vec![Tier::Sfw, Tier::Unknown, Tier::Unknown]);
        assert!(!AllowedTiers::new(true, true).contains(Tier::Unknown));
    }

    #[test]
    fn test_load_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = TagStore::load(&dir.path().join("tags.json")).unwrap_err();
        assert!(matches!(err, TagStoreError::NotFound(_)));
    }

    #[test]
    fn test_load_reports_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tags.json");
        std::fs::write(&path, "{ not json").unwrap();
        let err = TagStore::load(&path).unwrap_err();
        assert!(matches!(err, TagStoreError::Parse { .. }));
    }
}
