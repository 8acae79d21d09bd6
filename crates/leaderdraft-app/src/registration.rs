// Concurrent player registration.

use std::fmt;
use std::sync::Arc;

use leaderdraft_core::Player;
use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{info, warn};

use crate::repo::PlayerRoster;

/// One player that could not be registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationFailure {
    pub player: String,
    pub reason: String,
}

impl fmt::Display for RegistrationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.player, self.reason)
    }
}

#[derive(Debug, Error)]
#[error("failed to register {} player(s): {}", .failures.len(), join_failures(.failures))]
pub struct RegistrationError {
    pub failures: Vec<RegistrationFailure>,
    /// Players that did register, in input order.
    pub registered: Vec<Player>,
}

fn join_failures(failures: &[RegistrationFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// Register every name concurrently, one task per player.
///
/// All tasks run to completion; the call fails only after every one has
/// finished, reporting each failure. Results keep the order of `names`.
pub async fn register_players(
    roster: Arc<dyn PlayerRoster>,
    names: Vec<String>,
) -> Result<Vec<Player>, RegistrationError> {
    let mut tasks = JoinSet::new();
    for (index, name) in names.iter().cloned().enumerate() {
        let roster = Arc::clone(&roster);
        tasks.spawn(async move {
            let result = roster.upsert_player(&name).await;
            (index, result)
        });
    }

    let mut slots: Vec<Option<Player>> = vec![None; names.len()];
    let mut failures: Vec<(usize, RegistrationFailure)> = Vec::new();
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((index, Ok(player))) => slots[index] = Some(player),
            Ok((index, Err(e))) => {
                warn!("failed to register player {}: {}", names[index], e);
                failures.push((
                    index,
                    RegistrationFailure {
                        player: names[index].clone(),
                        reason: e.to_string(),
                    },
                ));
            }
            Err(e) => {
                // A panicked task loses its index; it sorts last.
                warn!("player registration task failed: {}", e);
                failures.push((
                    usize::MAX,
                    RegistrationFailure {
                        player: "<unknown>".into(),
                        reason: e.to_string(),
                    },
                ));
            }
        }
    }
    failures.sort_by_key(|(index, _)| *index);
    let ordered: Vec<RegistrationFailure> = failures.into_iter().map(|(_, f)| f).collect();

    let registered: Vec<Player> = slots.into_iter().flatten().collect();
    if ordered.is_empty() {
        info!("Registered {} players", registered.len());
        Ok(registered)
    } else {
        Err(RegistrationError {
            failures: ordered,
            registered,
        })
    }
}
