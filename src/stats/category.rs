use std::fmt;
use strum_macros::EnumIter;

/// Storage category for a stat name.
///
/// Every stat lives in exactly one category partition. The category decides
/// which table/map the record is stored in and which bootstrap policy applies
/// on first sight; it has no effect on delta computation.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize, EnumIter,
)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    General,
    Bedwars,
    Skywars,
    Duels,
}

impl Category {
    /// Fixed table name for this partition. Storage identifiers are bound
    /// here, at the type level, never assembled from incoming stat names.
    pub fn table(&self) -> &'static str {
        match self {
            Category::General => "general_stats",
            Category::Bedwars => "bedwars_stats",
            Category::Skywars => "skywars_stats",
            Category::Duels => "duels_stats",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            match self {
                Category::General => "general",
                Category::Bedwars => "bedwars",
                Category::Skywars => "skywars",
                Category::Duels => "duels",
            }
        )
    }
}

/// Account-wide stats that are not tied to any one game mode.
const GENERAL_STATS: &[&str] = &[
    "network_exp",
    "karma",
    "achievement_points",
    "quests_completed",
    "first_login",
    "last_login",
];

/// Well-known Bedwars stats. Bedwars names carry no shared prefix upstream,
/// so the set is enumerated explicitly.
const BEDWARS_STATS: &[&str] = &[
    "wins",
    "losses",
    "kills",
    "deaths",
    "final_kills",
    "final_deaths",
    "beds_broken",
    "beds_lost",
    "games_played",
    "winstreak",
    "resources_collected",
];

/// Reserved mode prefix for Skywars stats.
const SKYWARS_PREFIX: &str = "sw_";

/// Legacy Skywars names that predate the prefix convention.
const SKYWARS_STATS: &[&str] = &["souls", "heads", "souls_gathered"];

/// Reserved mode prefix for Duels stats.
const DUELS_PREFIX: &str = "du_";

/// Legacy Duels names that predate the prefix convention.
const DUELS_STATS: &[&str] = &["melee_swings", "bow_shots", "bow_hits", "blocks_placed"];

/// Maps a stat name to its category. Pure and total: unrecognized names fall
/// through to the primary game rather than failing, so new upstream counters
/// route somewhere without a schema change.
///
/// Resolution order: exact general match, exact Bedwars match, per-mode
/// prefix or explicit match, then the Bedwars fallback.
pub fn classify(stat_name: &str) -> Category {
    if GENERAL_STATS.contains(&stat_name) {
        return Category::General;
    }

    if BEDWARS_STATS.contains(&stat_name) {
        return Category::Bedwars;
    }

    if stat_name.starts_with(SKYWARS_PREFIX) || SKYWARS_STATS.contains(&stat_name) {
        return Category::Skywars;
    }

    if stat_name.starts_with(DUELS_PREFIX) || DUELS_STATS.contains(&stat_name) {
        return Category::Duels;
    }

    Category::Bedwars
}
