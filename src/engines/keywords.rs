//! Name-based heuristics shared by the classifier and the matrix builder.
//!
//! Mod names are the only metadata available for pairs nobody has tested
//! yet, so categories, complexity and conflict potential are all read off
//! keywords in the name. Keywords of three characters or fewer (`hd`, `4k`,
//! `ui`) must match a whole word; longer ones match anywhere.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::sync::OnceLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModCategory {
    Texture,
    Utility,
    Gameplay,
    Environment,
    Audio,
    Other,
}

impl ModCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModCategory::Texture => "texture",
            ModCategory::Utility => "utility",
            ModCategory::Gameplay => "gameplay",
            ModCategory::Environment => "environment",
            ModCategory::Audio => "audio",
            ModCategory::Other => "other",
        }
    }
}

impl fmt::Display for ModCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// First match wins
const CATEGORY_KEYWORDS: &[(ModCategory, &[&str])] = &[
    (
        ModCategory::Texture,
        &["texture", "visual", "graphics", "hd", "2k", "4k"],
    ),
    (
        ModCategory::Utility,
        &["utility", "script", "skse", "bugfix", "patch", "compatibility"],
    ),
    (
        ModCategory::Gameplay,
        &["gameplay", "quest", "story", "npc", "combat", "magic", "perk"],
    ),
    (
        ModCategory::Environment,
        &["weather", "lighting", "environment", "landscape", "world", "nature", "plants"],
    ),
    (
        ModCategory::Audio,
        &["sound", "music", "voice", "audio", "sfx"],
    ),
];

const COMPLEXITY_KEYWORDS: &[&str] = &[
    "total",
    "complete",
    "overhaul",
    "redux",
    "remaster",
    "enhanced",
    "ultimate",
    "professional",
    "deluxe",
    "premium",
];

const SCRIPT_KEYWORDS: &[&str] = &["script", "skse", "papyrus", "quest", "dialogue", "magic"];

const ASSET_KEYWORDS: &[&str] = &["texture", "mesh", "model", "visual", "hd", "2k", "4k"];

static WORD_SPLIT: OnceLock<Regex> = OnceLock::new();

fn word_split() -> &'static Regex {
    WORD_SPLIT.get_or_init(|| Regex::new(r"\W+").expect("Invalid word split regex"))
}

/// Lower-cased words of a mod name, split on any non-word character
pub fn words(name: &str) -> Vec<String> {
    word_split()
        .split(&name.to_lowercase())
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

/// True if `name` carries `keyword` under the short-keyword rule
pub fn has_keyword(name: &str, keyword: &str) -> bool {
    let lower = name.to_lowercase();
    if keyword.len() <= 3 {
        words(&lower).iter().any(|word| word == keyword)
    } else {
        lower.contains(keyword)
    }
}

/// True if `name` carries any of `keywords`
pub fn has_any(name: &str, keywords: &[&str]) -> bool {
    keywords.iter().any(|keyword| has_keyword(name, keyword))
}

pub fn categorize(name: &str) -> ModCategory {
    CATEGORY_KEYWORDS
        .iter()
        .find(|(_, keywords)| has_any(name, keywords))
        .map(|(category, _)| *category)
        .unwrap_or(ModCategory::Other)
}

/// Both mods fall in the same known category
pub fn same_category(a: &str, b: &str) -> bool {
    let category = categorize(a);
    category != ModCategory::Other && category == categorize(b)
}

fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f64 / union as f64
}

/// Jaccard similarity over lower-cased, whitespace-separated tokens
pub fn name_similarity(a: &str, b: &str) -> f64 {
    let tokens = |name: &str| -> HashSet<String> {
        name.to_lowercase()
            .split_whitespace()
            .map(str::to_string)
            .collect()
    };
    jaccard(&tokens(a), &tokens(b))
}

/// Jaccard similarity over words split on punctuation as well as whitespace
pub fn word_similarity(a: &str, b: &str) -> f64 {
    let a: HashSet<String> = words(a).into_iter().collect();
    let b: HashSet<String> = words(b).into_iter().collect();
    jaccard(&a, &b)
}

/// Longest common contiguous substring, relative to the longer name
pub fn name_overlap(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.to_lowercase().chars().collect();
    let b: Vec<char> = b.to_lowercase().chars().collect();
    let longest_name = a.len().max(b.len());
    if longest_name == 0 {
        return 0.0;
    }

    // Rolling row of the classic DP table
    let mut previous = vec![0usize; b.len() + 1];
    let mut longest = 0;
    for &ca in &a {
        let mut current = vec![0usize; b.len() + 1];
        for (j, &cb) in b.iter().enumerate() {
            if ca == cb {
                current[j + 1] = previous[j] + 1;
                longest = longest.max(current[j + 1]);
            }
        }
        previous = current;
    }

    longest as f64 / longest_name as f64
}

/// 0.2 per complexity keyword, capped at 1
pub fn complexity(name: &str) -> f64 {
    let matches = COMPLEXITY_KEYWORDS
        .iter()
        .filter(|keyword| has_keyword(name, keyword))
        .count();
    (matches as f64 * 0.2).min(1.0)
}

pub fn has_scripts(name: &str) -> bool {
    has_any(name, SCRIPT_KEYWORDS)
}

pub fn has_assets(name: &str) -> bool {
    has_any(name, ASSET_KEYWORDS)
}

/// Likelihood that two mods fight over the same scripts
pub fn script_conflict_potential(a: &str, b: &str) -> f64 {
    match (has_scripts(a), has_scripts(b)) {
        (true, true) => 0.8,
        (true, false) | (false, true) => 0.4,
        (false, false) => 0.1,
    }
}

/// Likelihood that two mods overwrite the same meshes or textures
pub fn asset_conflict_potential(a: &str, b: &str) -> f64 {
    match (has_assets(a), has_assets(b)) {
        (true, true) => 0.7,
        (true, false) | (false, true) => 0.3,
        (false, false) => 0.05,
    }
}

pub fn is_enb(name: &str) -> bool {
    has_keyword(name, "enb")
}

pub fn is_skse(name: &str) -> bool {
    has_keyword(name, "skse")
}
