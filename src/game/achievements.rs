use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AchievementCategory {
    Identity,
    Space,
    Network,
}

#[derive(Debug, Clone, Serialize)]
pub struct Achievement {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub xp: u32,
    pub category: AchievementCategory,
}

/// An achievement a user has earned, as persisted on the user record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct EarnedAchievement {
    pub id: String,
    #[serde(with = "time::serde::rfc3339")]
    pub earned_at: OffsetDateTime,
}

pub const CATALOG: &[Achievement] = &[
    Achievement {
        id: "first-login",
        name: "First Steps",
        description: "Begin your journey in the Cosmical Space",
        xp: 50,
        category: AchievementCategory::Identity,
    },
    Achievement {
        id: "customize-profile",
        name: "Personal Touch",
        description: "Customize your profile to make it uniquely yours",
        xp: 200,
        category: AchievementCategory::Identity,
    },
    Achievement {
        id: "space-architect",
        name: "Space Architect",
        description: "Configure your first space environment",
        xp: 300,
        category: AchievementCategory::Space,
    },
    Achievement {
        id: "theme-master",
        name: "Theme Master",
        description: "Personalize your space with a custom theme",
        xp: 150,
        category: AchievementCategory::Space,
    },
    Achievement {
        id: "network-pioneer",
        name: "Network Pioneer",
        description: "Set up your network preferences",
        xp: 250,
        category: AchievementCategory::Network,
    },
    Achievement {
        id: "network-ambassador",
        name: "Network Ambassador",
        description: "Make your space publicly accessible",
        xp: 200,
        category: AchievementCategory::Network,
    },
    Achievement {
        id: "space-explorer",
        name: "Space Explorer",
        description: "Enable space discovery to connect with others",
        xp: 150,
        category: AchievementCategory::Network,
    },
];

pub fn find(id: &str) -> Option<&'static Achievement> {
    CATALOG.iter().find(|a| a.id == id)
}

/// Sum of catalog XP over the earned entries. Unknown ids contribute nothing.
pub fn total_xp(earned: &[EarnedAchievement]) -> u32 {
    earned
        .iter()
        .filter_map(|e| find(&e.id))
        .map(|a| a.xp)
        .sum()
}

/// Catalog entries not yet earned, in catalog order.
pub fn available<'a>(
    earned: &'a [EarnedAchievement],
) -> impl Iterator<Item = &'static Achievement> + 'a {
    CATALOG
        .iter()
        .filter(move |a| !earned.iter().any(|e| e.id == a.id))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn earned(id: &str) -> EarnedAchievement {
        EarnedAchievement {
            id: id.into(),
            earned_at: OffsetDateTime::UNIX_EPOCH,
        }
    }

    #[test]
    fn total_xp_sums_catalog_values() {
        let list = vec![earned("first-login"), earned("space-architect")];
        assert_eq!(total_xp(&list), 350);
    }

    #[test]
    fn total_xp_ignores_unknown_ids() {
        let list = vec![earned("first-login"), earned("made-up")];
        assert_eq!(total_xp(&list), 50);
        assert_eq!(total_xp(&[]), 0);
    }

    #[test]
    fn available_excludes_earned() {
        let list = vec![earned("theme-master")];
        let ids: Vec<_> = available(&list).map(|a| a.id).collect();
        assert_eq!(ids.len(), CATALOG.len() - 1);
        assert!(!ids.contains(&"theme-master"));
    }
}
