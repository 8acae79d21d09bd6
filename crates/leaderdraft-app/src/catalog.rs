// Leader catalog import from CSV.
//
// Expected columns: civilization, name, tier and an optional banned flag.
// Unknown columns are ignored; malformed rows are skipped with a warning.

use std::io::Read;
use std::path::Path;

use leaderdraft_core::{Leader, LeaderId};
use serde::Deserialize;
use tracing::warn;

/// A leader that has not been stored yet (no id).
#[derive(Debug, Clone, PartialEq)]
pub struct NewLeader {
    pub civilization: String,
    pub name: String,
    pub tier: f64,
    pub banned: bool,
}

impl NewLeader {
    pub fn new(civilization: impl Into<String>, name: impl Into<String>, tier: f64) -> Self {
        Self {
            civilization: civilization.into(),
            name: name.into(),
            tier,
            banned: false,
        }
    }

    pub fn into_leader(self, id: LeaderId) -> Leader {
        Leader {
            id,
            civilization: self.civilization,
            name: self.name,
            tier: self.tier,
            banned: self.banned,
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    #[error("failed to read file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("CSV error in {path}: {source}")]
    Csv { path: String, source: csv::Error },
}

#[derive(Debug, Deserialize)]
struct RawLeaderRow {
    civilization: String,
    #[serde(alias = "leader")]
    name: String,
    tier: f64,
    #[serde(default)]
    banned: Option<String>,
}

fn parse_banned(raw: Option<&str>) -> Option<bool> {
    match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
        None | Some("") | Some("false") | Some("no") | Some("0") => Some(false),
        Some("true") | Some("yes") | Some("1") => Some(true),
        Some(_) => None,
    }
}

/// Parse leaders from any CSV reader.
pub fn load_leaders_from_reader<R: Read>(rdr: R) -> Result<Vec<NewLeader>, csv::Error> {
    let mut reader = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(rdr);
    let mut leaders = Vec::new();
    for result in reader.deserialize::<RawLeaderRow>() {
        let raw = match result {
            Ok(raw) => raw,
            Err(e) => {
                warn!("skipping malformed leader row: {}", e);
                continue;
            }
        };
        if raw.name.is_empty() || raw.civilization.is_empty() {
            warn!("skipping leader row with empty name or civilization");
            continue;
        }
        if !raw.tier.is_finite() {
            warn!("skipping leader '{}': non-finite tier", raw.name);
            continue;
        }
        let Some(banned) = parse_banned(raw.banned.as_deref()) else {
            warn!(
                "skipping leader '{}': unrecognised banned value {:?}",
                raw.name, raw.banned
            );
            continue;
        };
        leaders.push(NewLeader {
            civilization: raw.civilization,
            name: raw.name,
            tier: raw.tier,
            banned,
        });
    }
    Ok(leaders)
}

/// Load leaders from a CSV file.
pub fn load_leaders(path: &Path) -> Result<Vec<NewLeader>, CatalogError> {
    let file = std::fs::File::open(path).map_err(|e| CatalogError::Io {
        path: path.display().to_string(),
        source: e,
    })?;
    load_leaders_from_reader(file).map_err(|e| CatalogError::Csv {
        path: path.display().to_string(),
        source: e,
    })
}
