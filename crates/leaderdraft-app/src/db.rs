// SQLite persistence for leaders, players, strategies and picks.

use std::sync::{Mutex, MutexGuard};

use anyhow::{Context, Result};
use async_trait::async_trait;
use leaderdraft_core::{DraftStrategy, Leader, LeaderId, Pick, Player, PlayerId};
use rusqlite::{params, Connection, OptionalExtension};

use crate::catalog::NewLeader;
use crate::repo::{LeaderCatalog, PickHistory, PlayerRoster, RepositoryError, StrategyStore};

/// SQLite-backed implementation of every collaborator trait.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open (or create) a SQLite database at `path` and ensure all tables
    /// exist. Pass `":memory:"` for an ephemeral database.
    pub fn open(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .with_context(|| format!("failed to open database at {path}"))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA foreign_keys = ON;",
        )
        .context("failed to set database pragmas")?;

        conn.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS leaders (
                id           INTEGER PRIMARY KEY AUTOINCREMENT,
                civilization TEXT NOT NULL,
                name         TEXT NOT NULL,
                tier         REAL NOT NULL,
                banned       INTEGER NOT NULL DEFAULT 0,
                UNIQUE(civilization, name)
            );

            CREATE TABLE IF NOT EXISTS players (
                id     INTEGER PRIMARY KEY AUTOINCREMENT,
                name   TEXT NOT NULL UNIQUE,
                active INTEGER NOT NULL DEFAULT 1
            );

            CREATE TABLE IF NOT EXISTS strategies (
                name      TEXT PRIMARY KEY,
                pool_size INTEGER NOT NULL,
                randomize INTEGER NOT NULL,
                rules     TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS picks (
                id        INTEGER PRIMARY KEY AUTOINCREMENT,
                player_id INTEGER NOT NULL REFERENCES players(id),
                leader_id INTEGER NOT NULL REFERENCES leaders(id),
                draft_id  TEXT NOT NULL,
                timestamp TEXT NOT NULL DEFAULT (strftime('%Y-%m-%dT%H:%M:%fZ', 'now')),
                UNIQUE(player_id, draft_id, leader_id)
            );

            CREATE INDEX IF NOT EXISTS idx_picks_player_id ON picks(player_id);
            ",
        )
        .context("failed to create database schema")?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Panics if the mutex is poisoned.
    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().expect("database mutex poisoned")
    }

    // ------------------------------------------------------------------
    // Leaders
    // ------------------------------------------------------------------

    /// Insert or update leaders keyed by `(civilization, name)` in a single
    /// transaction. Returns the number of rows written.
    pub fn import_leaders(&self, leaders: &[NewLeader]) -> Result<usize> {
        let mut conn = self.conn();
        let tx = conn.transaction().context("failed to begin import transaction")?;
        for leader in leaders {
            tx.execute(
                "INSERT INTO leaders (civilization, name, tier, banned)
                 VALUES (?1, ?2, ?3, ?4)
                 ON CONFLICT(civilization, name) DO UPDATE SET
                    tier   = excluded.tier,
                    banned = excluded.banned",
                params![leader.civilization, leader.name, leader.tier, leader.banned],
            )
            .with_context(|| format!("failed to import leader {}", leader.name))?;
        }
        tx.commit().context("failed to commit leader import")?;
        Ok(leaders.len())
    }

    /// Every leader ordered by id, banned ones included.
    pub fn load_leaders(&self) -> Result<Vec<Leader>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT id, civilization, name, tier, banned FROM leaders ORDER BY id")
            .context("failed to prepare load_leaders query")?;
        let leaders = stmt
            .query_map([], |row| {
                Ok(Leader {
                    id: LeaderId(row.get(0)?),
                    civilization: row.get(1)?,
                    name: row.get(2)?,
                    tier: row.get(3)?,
                    banned: row.get(4)?,
                })
            })
            .context("failed to query leaders")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map leader rows")?;
        Ok(leaders)
    }

    pub fn set_leader_banned(&self, id: LeaderId, banned: bool) -> Result<()> {
        self.conn()
            .execute(
                "UPDATE leaders SET banned = ?2 WHERE id = ?1",
                params![id.0, banned],
            )
            .context("failed to update leader ban")?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Players
    // ------------------------------------------------------------------

    /// Insert a player, or return the existing row with that name.
    pub fn upsert_player(&self, name: &str) -> Result<Player> {
        let conn = self.conn();
        // The no-op update makes RETURNING yield the existing row on conflict.
        let player = conn
            .query_row(
                "INSERT INTO players (name) VALUES (?1)
                 ON CONFLICT(name) DO UPDATE SET name = excluded.name
                 RETURNING id, name, active",
                params![name],
                |row| {
                    Ok(Player {
                        id: PlayerId(row.get(0)?),
                        name: row.get(1)?,
                        active: row.get(2)?,
                    })
                },
            )
            .with_context(|| format!("failed to upsert player {name}"))?;
        Ok(player)
    }

    pub fn set_player_active(&self, id: PlayerId, active: bool) -> Result<()> {
        self.conn()
            .execute(
                "UPDATE players SET active = ?2 WHERE id = ?1",
                params![id.0, active],
            )
            .context("failed to update player")?;
        Ok(())
    }

    /// Active players in registration order.
    pub fn load_active_players(&self) -> Result<Vec<Player>> {
        let conn = self.conn();
        let mut stmt = conn
            .prepare("SELECT id, name, active FROM players WHERE active = 1 ORDER BY id")
            .context("failed to prepare load_active_players query")?;
        let players = stmt
            .query_map([], |row| {
                Ok(Player {
                    id: PlayerId(row.get(0)?),
                    name: row.get(1)?,
                    active: row.get(2)?,
                })
            })
            .context("failed to query players")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map player rows")?;
        Ok(players)
    }

    // ------------------------------------------------------------------
    // Strategies
    // ------------------------------------------------------------------

    /// Insert or replace a strategy. The rule bag is stored as JSON text.
    pub fn save_strategy(&self, strategy: &DraftStrategy) -> Result<()> {
        let rules =
            serde_json::to_string(&strategy.rules).context("failed to serialize rule bag")?;
        self.conn()
            .execute(
                "INSERT OR REPLACE INTO strategies (name, pool_size, randomize, rules)
                 VALUES (?1, ?2, ?3, ?4)",
                params![strategy.name, strategy.pool_size as i64, strategy.randomize, rules],
            )
            .with_context(|| format!("failed to save strategy {}", strategy.name))?;
        Ok(())
    }

    pub fn load_strategy(&self, name: &str) -> Result<Option<DraftStrategy>> {
        let conn = self.conn();
        let row = conn
            .query_row(
                "SELECT name, pool_size, randomize, rules FROM strategies WHERE name = ?1",
                params![name],
                |row| {
                    let pool_size: i64 = row.get(1)?;
                    Ok((
                        row.get::<_, String>(0)?,
                        pool_size,
                        row.get::<_, bool>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .optional()
            .context("failed to query strategy")?;

        let Some((name, pool_size, randomize, rules)) = row else {
            return Ok(None);
        };
        let rules = serde_json::from_str(&rules)
            .with_context(|| format!("failed to parse rule bag of strategy {name}"))?;
        let pool_size = usize::try_from(pool_size)
            .with_context(|| format!("strategy {name} has negative pool_size {pool_size}"))?;
        Ok(Some(DraftStrategy {
            name,
            pool_size,
            randomize,
            rules,
        }))
    }

    // ------------------------------------------------------------------
    // Picks
    // ------------------------------------------------------------------

    /// Record a pick. Re-recording the same pick is a no-op.
    pub fn record_pick(&self, pick: &Pick) -> Result<()> {
        self.conn()
            .execute(
                "INSERT OR IGNORE INTO picks (player_id, leader_id, draft_id)
                 VALUES (?1, ?2, ?3)",
                params![pick.player.0, pick.leader.0, pick.draft_id],
            )
            .context("failed to record pick")?;
        Ok(())
    }

    /// The player's picks from their `games` most recent drafts, most recent
    /// first. A draft's recency is that of its last recorded pick.
    pub fn recent_picks(&self, player: PlayerId, games: usize) -> Result<Vec<Pick>> {
        if games == 0 {
            return Ok(Vec::new());
        }
        let conn = self.conn();
        let mut stmt = conn
            .prepare(
                "WITH recent AS (
                    SELECT draft_id, MAX(id) AS last_id
                    FROM picks WHERE player_id = ?1
                    GROUP BY draft_id
                    ORDER BY last_id DESC
                    LIMIT ?2
                 )
                 SELECT p.player_id, p.leader_id, p.draft_id
                 FROM picks p JOIN recent r ON p.draft_id = r.draft_id
                 WHERE p.player_id = ?1
                 ORDER BY r.last_id DESC, p.id DESC",
            )
            .context("failed to prepare recent_picks query")?;
        let limit = i64::try_from(games).unwrap_or(i64::MAX);
        let picks = stmt
            .query_map(params![player.0, limit], |row| {
                Ok(Pick {
                    player: PlayerId(row.get(0)?),
                    leader: LeaderId(row.get(1)?),
                    draft_id: row.get(2)?,
                })
            })
            .context("failed to query recent picks")?
            .collect::<std::result::Result<Vec<_>, _>>()
            .context("failed to map pick rows")?;
        Ok(picks)
    }
}

/// Generate a new draft id based on the current UTC time.
///
/// Format: `draft_YYYYMMDD_HHMMSS_SSS`.
pub fn generate_draft_id() -> String {
    chrono::Utc::now()
        .format("draft_%Y%m%d_%H%M%S_%3f")
        .to_string()
}

// ---------------------------------------------------------------------------
// Collaborator trait impls
// ---------------------------------------------------------------------------

#[async_trait]
impl LeaderCatalog for Database {
    async fn leader_catalog(&self) -> Result<Vec<Leader>, RepositoryError> {
        self.load_leaders()
            .map_err(|e| RepositoryError::backend("leader_catalog", e))
    }
}

#[async_trait]
impl PlayerRoster for Database {
    async fn active_players(&self) -> Result<Vec<Player>, RepositoryError> {
        self.load_active_players()
            .map_err(|e| RepositoryError::backend("active_players", e))
    }

    async fn upsert_player(&self, name: &str) -> Result<Player, RepositoryError> {
        Database::upsert_player(self, name)
            .map_err(|e| RepositoryError::backend("upsert_player", e))
    }
}

#[async_trait]
impl PickHistory for Database {
    async fn recent_picks(
        &self,
        player: PlayerId,
        games: usize,
    ) -> Result<Vec<Pick>, RepositoryError> {
        Database::recent_picks(self, player, games)
            .map_err(|e| RepositoryError::backend("recent_picks", e))
    }

    async fn record_pick(&self, pick: &Pick) -> Result<(), RepositoryError> {
        Database::record_pick(self, pick).map_err(|e| RepositoryError::backend("record_pick", e))
    }
}

#[async_trait]
impl StrategyStore for Database {
    async fn strategy(&self, name: &str) -> Result<DraftStrategy, RepositoryError> {
        self.load_strategy(name)
            .map_err(|e| RepositoryError::backend("strategy", e))?
            .ok_or_else(|| RepositoryError::NotFound {
                what: format!("strategy `{name}`"),
            })
    }
}
