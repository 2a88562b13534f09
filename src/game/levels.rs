use serde::{Deserialize, Serialize};

#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default,
)]
#[serde(rename_all = "lowercase")]
pub enum Level {
    #[default]
    Novice,
    Explorer,
    Pioneer,
    Commander,
}

pub const LEVELS: [Level; 4] = [Level::Novice, Level::Explorer, Level::Pioneer, Level::Commander];

impl Level {
    pub fn xp_required(self) -> u32 {
        match self {
            Level::Novice => 0,
            Level::Explorer => 500,
            Level::Pioneer => 1000,
            Level::Commander => 2000,
        }
    }

    pub fn title(self) -> &'static str {
        match self {
            Level::Novice => "Space Cadet",
            Level::Explorer => "Space Explorer",
            Level::Pioneer => "Space Pioneer",
            Level::Commander => "Space Commander",
        }
    }

    /// Features introduced at this level (not cumulative).
    pub fn features(self) -> &'static [&'static str] {
        match self {
            Level::Novice => &["basic-profile", "space-setup"],
            Level::Explorer => &["network-setup", "theme-customization"],
            Level::Pioneer => &["advanced-networking", "space-analytics"],
            Level::Commander => &["custom-domain", "api-access"],
        }
    }

    pub fn next(self) -> Option<Level> {
        match self {
            Level::Novice => Some(Level::Explorer),
            Level::Explorer => Some(Level::Pioneer),
            Level::Pioneer => Some(Level::Commander),
            Level::Commander => None,
        }
    }
}

pub fn calculate_level(xp: u32) -> Level {
    LEVELS
        .iter()
        .rev()
        .copied()
        .find(|l| xp >= l.xp_required())
        .unwrap_or(Level::Novice)
}

/// Percentage of the way from the current level to the next, floored.
pub fn calculate_progress(xp: u32) -> u32 {
    let current = calculate_level(xp);
    let Some(next) = current.next() else {
        return 100;
    };
    let into = xp - current.xp_required();
    let span = next.xp_required() - current.xp_required();
    (into * 100 / span).min(100)
}

pub fn next_level(xp: u32) -> Option<Level> {
    calculate_level(xp).next()
}

pub fn check_feature_unlock(feature: &str, xp: u32) -> bool {
    unlocked_features(calculate_level(xp)).contains(&feature)
}

/// Every feature unlocked up to and including `level`.
pub fn unlocked_features(level: Level) -> Vec<&'static str> {
    LEVELS
        .iter()
        .filter(|l| **l <= level)
        .flat_map(|l| l.features().iter().copied())
        .collect()
}
