// Draft data model: leaders, players, picks and offerings.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Row id of a leader in the catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LeaderId(pub i64);

/// Row id of a player in the roster.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub i64);

impl fmt::Display for LeaderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A playable leader. Immutable for the duration of a draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Leader {
    pub id: LeaderId,
    /// Civilization the leader belongs to (e.g. "Rome").
    pub civilization: String,
    /// Display name of the leader (e.g. "Trajan").
    pub name: String,
    /// Aggregated strength ranking. Lower is stronger.
    pub tier: f64,
    /// Banned leaders are never offered.
    #[serde(default)]
    pub banned: bool,
}

impl Leader {
    /// Whether this leader is at least as strong as `threshold`.
    pub fn within_tier(&self, threshold: f64) -> bool {
        self.tier <= threshold
    }

    /// Sort key used when an offering is presented without randomization.
    pub fn cmp_presentation(&self, other: &Leader) -> std::cmp::Ordering {
        self.tier
            .total_cmp(&other.tier)
            .then_with(|| self.civilization.cmp(&other.civilization))
            .then_with(|| self.name.cmp(&other.name))
    }
}

impl fmt::Display for Leader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}, tier {})", self.name, self.civilization, self.tier)
    }
}

/// A registered player.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    pub name: String,
    /// Only active players take part in a draft.
    #[serde(default = "default_active")]
    pub active: bool,
}

fn default_active() -> bool {
    true
}

/// One leader chosen by a player out of an offering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pick {
    pub player: PlayerId,
    pub leader: LeaderId,
    pub draft_id: String,
}

/// The leaders presented to one player for one draft.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Offering {
    pub player: PlayerId,
    pub leaders: Vec<Leader>,
    pub draft_id: String,
}

impl Offering {
    pub fn leader_ids(&self) -> Vec<LeaderId> {
        self.leaders.iter().map(|l| l.id).collect()
    }

    pub fn contains(&self, leader: LeaderId) -> bool {
        self.leaders.iter().any(|l| l.id == leader)
    }
}

impl fmt::Display for Offering {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player {}:", self.player)?;
        for (i, leader) in self.leaders.iter().enumerate() {
            let sep = if i == 0 { " " } else { ", " };
            write!(f, "{sep}{leader}")?;
        }
        Ok(())
    }
}

/// Leaders that may be offered at all: the catalog minus banned entries,
/// in catalog order.
pub fn unbanned(catalog: &[Leader]) -> Vec<Leader> {
    catalog.iter().filter(|l| !l.banned).cloned().collect()
}

#[cfg(test)]
pub(crate) mod fixtures {
    use super::*;

    pub fn leader(id: i64, tier: f64) -> Leader {
        Leader {
            id: LeaderId(id),
            civilization: format!("Civ {id}"),
            name: format!("Leader {id}"),
            tier,
            banned: false,
        }
    }

    pub fn banned(id: i64, tier: f64) -> Leader {
        Leader {
            banned: true,
            ..leader(id, tier)
        }
    }

    pub fn players(n: i64) -> Vec<PlayerId> {
        (1..=n).map(PlayerId).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;
    use super::*;

    #[test]
    fn unbanned_keeps_catalog_order() {
        let catalog = vec![leader(1, 1.0), banned(2, 1.0), leader(3, 2.0)];
        let ids: Vec<_> = unbanned(&catalog).iter().map(|l| l.id).collect();
        assert_eq!(ids, vec![LeaderId(1), LeaderId(3)]);
    }

    #[test]
    fn within_tier_is_inclusive() {
        assert!(leader(1, 3.0).within_tier(3.0));
        assert!(leader(1, 2.5).within_tier(3.0));
        assert!(!leader(1, 3.5).within_tier(3.0));
    }

    #[test]
    fn offering_contains_and_ids() {
        let offering = Offering {
            player: PlayerId(7),
            leaders: vec![leader(1, 1.0), leader(4, 2.0)],
            draft_id: "d".into(),
        };
        assert!(offering.contains(LeaderId(4)));
        assert!(!offering.contains(LeaderId(2)));
        assert_eq!(offering.leader_ids(), vec![LeaderId(1), LeaderId(4)]);
    }

    #[test]
    fn offering_display_lists_leaders() {
        let offering = Offering {
            player: PlayerId(1),
            leaders: vec![leader(1, 1.0), leader(2, 3.0)],
            draft_id: "d".into(),
        };
        assert_eq!(
            offering.to_string(),
            "player 1: Leader 1 (Civ 1, tier 1), Leader 2 (Civ 2, tier 3)"
        );
    }

    #[test]
    fn player_defaults_to_active() {
        let player: Player = serde_json::from_str(r#"{"id": 3, "name": "Ana"}"#).unwrap();
        assert!(player.active);
        assert_eq!(player.id, PlayerId(3));
    }
}
