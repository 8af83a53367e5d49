// crates/speedfog-core/src/store_sqlite.rs
// ============================================================================
// Module: SpeedFog SQLite Store
// Description: `RaceStore`/`SeedStore` backed by a single SQLite connection
// (spec.md section 4.1, C1).
// Purpose: Durable persistence with WAL journaling and optimistic
// concurrency enforced in SQL (I6), not in application code.
// Dependencies: rusqlite (bundled), time
// ============================================================================

//! ## Overview
//! One `Mutex<rusqlite::Connection>` per store, one SQLite transaction per
//! call. SpeedFog's write volume is one mutation per inbound WebSocket
//! message from a handful of participants per race — nowhere near what
//! would justify a dedicated writer thread and batching queue. A
//! transaction-per-call design keeps this store readable at the cost of
//! some throughput headroom we don't need.
//!
//! `transition_race`'s optimistic check is a single
//! `UPDATE ... WHERE status IN (...) AND version = ?` statement: zero rows
//! affected means the caller lost the race (I6), and is reported as
//! `TransitionOutcome::Conflict` rather than an error.

use std::path::Path;
use std::sync::Mutex;

use rusqlite::params;
use rusqlite::Connection;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;

use crate::entities::Participant;
use crate::entities::ParticipantStatus;
use crate::entities::Race;
use crate::entities::RaceStatus;
use crate::entities::Seed;
use crate::entities::SeedStatus;
use crate::entities::ZoneHistoryEntry;
use crate::error::StoreError;
use crate::identifiers::ModToken;
use crate::identifiers::ParticipantId;
use crate::identifiers::RaceId;
use crate::identifiers::SeedId;
use crate::identifiers::UserId;
use crate::store::NewRace;
use crate::store::RaceStore;
use crate::store::RaceTransition;
use crate::store::SeedStore;
use crate::store::TransitionOutcome;

/// SQLite journal mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JournalMode {
    /// Write-ahead logging; the default, recommended for concurrent readers.
    Wal,
    /// Classic rollback journal.
    Delete,
}

impl JournalMode {
    const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "WAL",
            Self::Delete => "DELETE",
        }
    }
}

/// Configuration for opening a [`SqliteStore`].
#[derive(Debug, Clone)]
pub struct SqliteStoreConfig {
    /// Path to the database file.
    pub path: std::path::PathBuf,
    /// Journal mode to set on open.
    pub journal_mode: JournalMode,
    /// `busy_timeout` in milliseconds, applied on open.
    pub busy_timeout_ms: u64,
}

impl SqliteStoreConfig {
    /// Config pointing at `path` with WAL journaling and a 5s busy timeout.
    #[must_use]
    pub fn new(path: impl Into<std::path::PathBuf>) -> Self {
        Self { path: path.into(), journal_mode: JournalMode::Wal, busy_timeout_ms: 5_000 }
    }
}

/// SQLite-backed store for races, participants, and seeds.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (creating if absent) a SQLite database at `config.path`,
    /// applies pragmas, and runs schema migration.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Io`] if the file cannot be opened, or
    /// [`StoreError::Backend`] if pragma/schema statements fail.
    pub fn open(config: &SqliteStoreConfig) -> Result<Self, StoreError> {
        let conn = Connection::open(&config.path).map_err(|err| StoreError::Io(err.to_string()))?;
        conn.pragma_update(None, "journal_mode", config.journal_mode.pragma_value())
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        conn.busy_timeout(std::time::Duration::from_millis(config.busy_timeout_ms))
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        conn.execute_batch(SCHEMA).map_err(|err| StoreError::Backend(err.to_string()))?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    /// Opens an in-memory database, for tests only.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Backend`] if schema migration fails.
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory().map_err(|err| StoreError::Io(err.to_string()))?;
        conn.execute_batch(SCHEMA).map_err(|err| StoreError::Backend(err.to_string()))?;
        Ok(Self { conn: Mutex::new(conn) })
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
        self.conn.lock().map_err(|_| StoreError::Backend("store mutex poisoned".to_string()))
    }
}

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS races (
    id TEXT PRIMARY KEY,
    name TEXT NOT NULL,
    organizer_user_id TEXT NOT NULL,
    seed_id TEXT NOT NULL,
    status TEXT NOT NULL,
    version INTEGER NOT NULL,
    started_at TEXT,
    seeds_released_at TEXT,
    is_public INTEGER NOT NULL,
    scheduled_at TEXT,
    config TEXT NOT NULL,
    next_arrival_order INTEGER NOT NULL
);
CREATE TABLE IF NOT EXISTS participants (
    id TEXT PRIMARY KEY,
    race_id TEXT NOT NULL,
    user_id TEXT NOT NULL,
    mod_token TEXT NOT NULL,
    status TEXT NOT NULL,
    current_zone TEXT,
    current_layer INTEGER NOT NULL,
    zone_history TEXT NOT NULL,
    igt_ms INTEGER NOT NULL,
    death_count INTEGER NOT NULL,
    finished_at TEXT,
    last_igt_change_at TEXT,
    color_index INTEGER NOT NULL,
    arrival_order INTEGER NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_participants_race ON participants(race_id);
CREATE INDEX IF NOT EXISTS idx_participants_token ON participants(race_id, mod_token);
CREATE TABLE IF NOT EXISTS seeds (
    id TEXT PRIMARY KEY,
    pool TEXT NOT NULL,
    numeric_id INTEGER NOT NULL,
    graph TEXT NOT NULL,
    status TEXT NOT NULL,
    file_path TEXT NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_seeds_pool_status ON seeds(pool, status);
";

// ============================================================================
// SECTION: Scalar (de)serialization helpers
// ============================================================================

fn dt_to_sql(dt: Option<OffsetDateTime>) -> Result<Option<String>, StoreError> {
    dt.map(|value| value.format(&Rfc3339).map_err(|err| StoreError::Serialization(err.to_string())))
        .transpose()
}

fn dt_from_sql(raw: Option<String>) -> Result<Option<OffsetDateTime>, StoreError> {
    raw.map(|value| {
        OffsetDateTime::parse(&value, &Rfc3339).map_err(|err| StoreError::Serialization(err.to_string()))
    })
    .transpose()
}

fn race_status_to_str(status: RaceStatus) -> &'static str {
    match status {
        RaceStatus::Setup => "setup",
        RaceStatus::Running => "running",
        RaceStatus::Finished => "finished",
    }
}

fn race_status_from_str(raw: &str) -> Result<RaceStatus, StoreError> {
    match raw {
        "setup" => Ok(RaceStatus::Setup),
        "running" => Ok(RaceStatus::Running),
        "finished" => Ok(RaceStatus::Finished),
        other => Err(StoreError::Serialization(format!("unknown race status: {other}"))),
    }
}

fn participant_status_to_str(status: ParticipantStatus) -> &'static str {
    match status {
        ParticipantStatus::Registered => "registered",
        ParticipantStatus::Ready => "ready",
        ParticipantStatus::Playing => "playing",
        ParticipantStatus::Finished => "finished",
        ParticipantStatus::Abandoned => "abandoned",
    }
}

fn participant_status_from_str(raw: &str) -> Result<ParticipantStatus, StoreError> {
    match raw {
        "registered" => Ok(ParticipantStatus::Registered),
        "ready" => Ok(ParticipantStatus::Ready),
        "playing" => Ok(ParticipantStatus::Playing),
        "finished" => Ok(ParticipantStatus::Finished),
        "abandoned" => Ok(ParticipantStatus::Abandoned),
        other => Err(StoreError::Serialization(format!("unknown participant status: {other}"))),
    }
}

fn seed_status_to_str(status: SeedStatus) -> &'static str {
    match status {
        SeedStatus::Available => "available",
        SeedStatus::Consumed => "consumed",
        SeedStatus::Discarded => "discarded",
    }
}

fn seed_status_from_str(raw: &str) -> Result<SeedStatus, StoreError> {
    match raw {
        "available" => Ok(SeedStatus::Available),
        "consumed" => Ok(SeedStatus::Consumed),
        "discarded" => Ok(SeedStatus::Discarded),
        other => Err(StoreError::Serialization(format!("unknown seed status: {other}"))),
    }
}

fn row_to_race(row: &Row<'_>) -> rusqlite::Result<Race> {
    let status_raw: String = row.get("status")?;
    let started_at_raw: Option<String> = row.get("started_at")?;
    let released_at_raw: Option<String> = row.get("seeds_released_at")?;
    let scheduled_at_raw: Option<String> = row.get("scheduled_at")?;
    let config_raw: String = row.get("config")?;
    let is_public: i64 = row.get("is_public")?;
    Ok(Race {
        id: RaceId::from_raw(row.get::<_, String>("id")?),
        name: row.get("name")?,
        organizer_user_id: UserId::from_raw(row.get::<_, String>("organizer_user_id")?),
        seed_id: SeedId::from_raw(row.get::<_, String>("seed_id")?),
        status: race_status_from_str(&status_raw).unwrap_or(RaceStatus::Setup),
        version: u64::try_from(row.get::<_, i64>("version")?).unwrap_or(0),
        started_at: dt_from_sql(started_at_raw).unwrap_or(None),
        seeds_released_at: dt_from_sql(released_at_raw).unwrap_or(None),
        is_public: is_public != 0,
        scheduled_at: dt_from_sql(scheduled_at_raw).unwrap_or(None),
        config: serde_json::from_str(&config_raw).unwrap_or(serde_json::Value::Null),
        next_arrival_order: u64::try_from(row.get::<_, i64>("next_arrival_order")?).unwrap_or(0),
    })
}

fn row_to_participant(row: &Row<'_>) -> rusqlite::Result<Participant> {
    let status_raw: String = row.get("status")?;
    let current_zone_raw: Option<String> = row.get("current_zone")?;
    let zone_history_raw: String = row.get("zone_history")?;
    let finished_at_raw: Option<String> = row.get("finished_at")?;
    let last_igt_raw: Option<String> = row.get("last_igt_change_at")?;
    let zone_history: Vec<ZoneHistoryEntry> = serde_json::from_str(&zone_history_raw).unwrap_or_default();
    Ok(Participant {
        id: ParticipantId::from_raw(row.get::<_, String>("id")?),
        race_id: RaceId::from_raw(row.get::<_, String>("race_id")?),
        user_id: UserId::from_raw(row.get::<_, String>("user_id")?),
        mod_token: ModToken::from_raw(row.get::<_, String>("mod_token")?),
        status: participant_status_from_str(&status_raw).unwrap_or(ParticipantStatus::Registered),
        current_zone: current_zone_raw.map(crate::identifiers::NodeId::from_raw),
        current_layer: u32::try_from(row.get::<_, i64>("current_layer")?).unwrap_or(0),
        zone_history,
        igt_ms: u64::try_from(row.get::<_, i64>("igt_ms")?).unwrap_or(0),
        death_count: u32::try_from(row.get::<_, i64>("death_count")?).unwrap_or(0),
        finished_at: dt_from_sql(finished_at_raw).unwrap_or(None),
        last_igt_change_at: dt_from_sql(last_igt_raw).unwrap_or(None),
        color_index: u32::try_from(row.get::<_, i64>("color_index")?).unwrap_or(0),
        arrival_order: u64::try_from(row.get::<_, i64>("arrival_order")?).unwrap_or(0),
    })
}

fn row_to_seed(row: &Row<'_>) -> rusqlite::Result<Seed> {
    let status_raw: String = row.get("status")?;
    let graph_raw: String = row.get("graph")?;
    Ok(Seed {
        id: SeedId::from_raw(row.get::<_, String>("id")?),
        pool: row.get("pool")?,
        numeric_id: u64::try_from(row.get::<_, i64>("numeric_id")?).unwrap_or(0),
        graph: serde_json::from_str(&graph_raw).unwrap_or_else(|_| crate::graph::SeedGraph {
            start_node: crate::identifiers::NodeId::from_raw(""),
            nodes: std::collections::BTreeMap::new(),
            event_map: std::collections::BTreeMap::new(),
            finish_event: crate::identifiers::FlagId::new(0),
            total_layers: 0,
            total_nodes: 0,
            total_paths: 0,
        }),
        status: seed_status_from_str(&status_raw).unwrap_or(SeedStatus::Discarded),
        file_path: row.get("file_path")?,
    })
}

// ============================================================================
// SECTION: RaceStore
// ============================================================================

impl RaceStore for SqliteStore {
    fn create_race(&self, new: NewRace) -> Result<Race, StoreError> {
        let race = Race {
            id: RaceId::new(),
            name: new.name,
            organizer_user_id: new.organizer_user_id,
            seed_id: new.seed_id,
            status: RaceStatus::Setup,
            version: 0,
            started_at: None,
            seeds_released_at: None,
            is_public: new.is_public,
            scheduled_at: new.scheduled_at,
            config: new.config,
            next_arrival_order: 0,
        };
        let conn = self.lock()?;
        let config_json =
            serde_json::to_string(&race.config).map_err(|err| StoreError::Serialization(err.to_string()))?;
        conn.execute(
            "INSERT INTO races (id, name, organizer_user_id, seed_id, status, version, started_at,
                seeds_released_at, is_public, scheduled_at, config, next_arrival_order)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)",
            params![
                race.id.as_str(),
                race.name,
                race.organizer_user_id.as_str(),
                race.seed_id.as_str(),
                race_status_to_str(race.status),
                race.version as i64,
                dt_to_sql(race.started_at)?,
                dt_to_sql(race.seeds_released_at)?,
                i64::from(race.is_public),
                dt_to_sql(race.scheduled_at)?,
                config_json,
                race.next_arrival_order as i64,
            ],
        )
        .map_err(|err| StoreError::Backend(err.to_string()))?;
        Ok(race)
    }

    fn load_race(&self, id: &RaceId) -> Result<Option<Race>, StoreError> {
        let conn = self.lock()?;
        conn.query_row("SELECT * FROM races WHERE id = ?1", params![id.as_str()], row_to_race)
            .optional()
            .map_err(|err| StoreError::Backend(err.to_string()))
    }

    fn list_races_by_status(&self, status: RaceStatus) -> Result<Vec<Race>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT * FROM races WHERE status = ?1")
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        let rows = stmt
            .query_map(params![race_status_to_str(status)], row_to_race)
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|err| StoreError::Backend(err.to_string()))
    }

    fn transition_race(
        &self,
        id: &RaceId,
        expected_version: u64,
        transition: RaceTransition,
    ) -> Result<TransitionOutcome<Race>, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(|err| StoreError::Backend(err.to_string()))?;

        let from_list = transition.allowed_from();
        let placeholders: Vec<String> = (0..from_list.len()).map(|i| format!("?{}", i + 3)).collect();
        let version_pos = from_list.len() + 3;
        let started_at_pos = from_list.len() + 4;
        let extra = match transition {
            RaceTransition::Start { .. } => format!(", started_at = ?{started_at_pos}"),
            RaceTransition::Finish => String::new(),
            RaceTransition::Reset => ", started_at = NULL".to_string(),
        };
        let sql = format!(
            "UPDATE races SET status = ?1, version = version + 1{extra}
             WHERE id = ?2 AND version = ?{version_pos} AND status IN ({placeholders})",
            placeholders = placeholders.join(", "),
        );

        let mut bound: Vec<Box<dyn rusqlite::ToSql>> =
            vec![Box::new(race_status_to_str(transition.target())), Box::new(id.as_str().to_string())];
        for status in from_list {
            bound.push(Box::new(race_status_to_str(*status)));
        }
        #[allow(clippy::cast_possible_wrap, reason = "version fits comfortably in i64 for any real race")]
        bound.push(Box::new(expected_version as i64));
        if let RaceTransition::Start { started_at } = transition {
            bound.push(Box::new(dt_to_sql(Some(started_at))?));
        }

        let params_refs: Vec<&dyn rusqlite::ToSql> = bound.iter().map(std::convert::AsRef::as_ref).collect();
        let affected =
            tx.execute(&sql, params_refs.as_slice()).map_err(|err| StoreError::Backend(err.to_string()))?;

        if affected == 0 {
            tx.rollback().map_err(|err| StoreError::Backend(err.to_string()))?;
            return Ok(TransitionOutcome::Conflict);
        }

        if matches!(transition, RaceTransition::Reset) {
            tx.execute(
                "UPDATE participants SET status = 'registered', current_zone = NULL, current_layer = 0,
                    zone_history = '[]', igt_ms = 0, death_count = 0, finished_at = NULL,
                    last_igt_change_at = NULL
                 WHERE race_id = ?1",
                params![id.as_str()],
            )
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        }

        let race = tx
            .query_row("SELECT * FROM races WHERE id = ?1", params![id.as_str()], row_to_race)
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        tx.commit().map_err(|err| StoreError::Backend(err.to_string()))?;
        Ok(TransitionOutcome::Applied(race))
    }

    fn release_seed(&self, id: &RaceId, at: OffsetDateTime) -> Result<Race, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE races SET seeds_released_at = ?2 WHERE id = ?1 AND seeds_released_at IS NULL",
            params![id.as_str(), dt_to_sql(Some(at))?],
        )
        .map_err(|err| StoreError::Backend(err.to_string()))?;
        conn.query_row("SELECT * FROM races WHERE id = ?1", params![id.as_str()], row_to_race)
            .map_err(|err| StoreError::Backend(err.to_string()))
    }

    fn set_race_seed(&self, id: &RaceId, seed_id: &SeedId) -> Result<Race, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE races SET seed_id = ?2 WHERE id = ?1",
            params![id.as_str(), seed_id.as_str()],
        )
        .map_err(|err| StoreError::Backend(err.to_string()))?;
        conn.query_row("SELECT * FROM races WHERE id = ?1", params![id.as_str()], row_to_race)
            .map_err(|err| StoreError::Backend(err.to_string()))
    }

    fn register_participant(
        &self,
        race_id: &RaceId,
        user_id: &UserId,
    ) -> Result<Participant, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(|err| StoreError::Backend(err.to_string()))?;

        let arrival_order: i64 = tx
            .query_row("SELECT next_arrival_order FROM races WHERE id = ?1", params![race_id.as_str()], |row| {
                row.get(0)
            })
            .map_err(|_| StoreError::NotFound(format!("race {race_id}")))?;
        tx.execute(
            "UPDATE races SET next_arrival_order = next_arrival_order + 1 WHERE id = ?1",
            params![race_id.as_str()],
        )
        .map_err(|err| StoreError::Backend(err.to_string()))?;

        let color_index: i64 = tx
            .query_row(
                "SELECT COUNT(*) FROM participants WHERE race_id = ?1",
                params![race_id.as_str()],
                |row| row.get(0),
            )
            .map_err(|err| StoreError::Backend(err.to_string()))?;

        let participant = Participant {
            id: ParticipantId::new(),
            race_id: race_id.clone(),
            user_id: user_id.clone(),
            mod_token: ModToken::new(),
            status: ParticipantStatus::Registered,
            current_zone: None,
            current_layer: 0,
            zone_history: Vec::new(),
            igt_ms: 0,
            death_count: 0,
            finished_at: None,
            last_igt_change_at: None,
            color_index: u32::try_from(color_index).unwrap_or(0),
            arrival_order: u64::try_from(arrival_order).unwrap_or(0),
        };

        tx.execute(
            "INSERT INTO participants (id, race_id, user_id, mod_token, status, current_zone,
                current_layer, zone_history, igt_ms, death_count, finished_at, last_igt_change_at,
                color_index, arrival_order)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
            params![
                participant.id.as_str(),
                participant.race_id.as_str(),
                participant.user_id.as_str(),
                participant.mod_token.as_str(),
                participant_status_to_str(participant.status),
                Option::<String>::None,
                i64::from(participant.current_layer),
                "[]",
                participant.igt_ms as i64,
                i64::from(participant.death_count),
                Option::<String>::None,
                Option::<String>::None,
                i64::from(participant.color_index),
                participant.arrival_order as i64,
            ],
        )
        .map_err(|err| StoreError::Backend(err.to_string()))?;

        tx.commit().map_err(|err| StoreError::Backend(err.to_string()))?;
        Ok(participant)
    }

    fn load_participant(&self, id: &ParticipantId) -> Result<Option<Participant>, StoreError> {
        let conn = self.lock()?;
        conn.query_row("SELECT * FROM participants WHERE id = ?1", params![id.as_str()], row_to_participant)
            .optional()
            .map_err(|err| StoreError::Backend(err.to_string()))
    }

    fn load_participant_by_token(
        &self,
        race_id: &RaceId,
        token: &ModToken,
    ) -> Result<Option<Participant>, StoreError> {
        let conn = self.lock()?;
        conn.query_row(
            "SELECT * FROM participants WHERE race_id = ?1 AND mod_token = ?2",
            params![race_id.as_str(), token.as_str()],
            row_to_participant,
        )
        .optional()
        .map_err(|err| StoreError::Backend(err.to_string()))
    }

    fn list_participants(&self, race_id: &RaceId) -> Result<Vec<Participant>, StoreError> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare("SELECT * FROM participants WHERE race_id = ?1")
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        let rows = stmt
            .query_map(params![race_id.as_str()], row_to_participant)
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        rows.collect::<Result<Vec<_>, _>>().map_err(|err| StoreError::Backend(err.to_string()))
    }

    fn save_participant(&self, participant: Participant) -> Result<Participant, StoreError> {
        let mut conn = self.lock()?;
        let tx = conn.transaction().map_err(|err| StoreError::Backend(err.to_string()))?;

        let existing = tx
            .query_row(
                "SELECT * FROM participants WHERE id = ?1",
                params![participant.id.as_str()],
                row_to_participant,
            )
            .optional()
            .map_err(|err| StoreError::Backend(err.to_string()))?;

        let Some(existing) = existing else {
            drop_insert_participant(&tx, &participant)?;
            tx.commit().map_err(|err| StoreError::Backend(err.to_string()))?;
            return Ok(participant);
        };

        if existing.status.is_terminal() {
            tx.commit().map_err(|err| StoreError::Backend(err.to_string()))?;
            return Ok(existing);
        }

        let mut next = participant;
        next.current_layer = next.current_layer.max(existing.current_layer);
        let zone_history_json = serde_json::to_string(&next.zone_history)
            .map_err(|err| StoreError::Serialization(err.to_string()))?;
        tx.execute(
            "UPDATE participants SET status = ?2, current_zone = ?3, current_layer = ?4,
                zone_history = ?5, igt_ms = ?6, death_count = ?7, finished_at = ?8,
                last_igt_change_at = ?9
             WHERE id = ?1",
            params![
                next.id.as_str(),
                participant_status_to_str(next.status),
                next.current_zone.as_ref().map(crate::identifiers::NodeId::as_str),
                i64::from(next.current_layer),
                zone_history_json,
                next.igt_ms as i64,
                i64::from(next.death_count),
                dt_to_sql(next.finished_at)?,
                dt_to_sql(next.last_igt_change_at)?,
            ],
        )
        .map_err(|err| StoreError::Backend(err.to_string()))?;
        tx.commit().map_err(|err| StoreError::Backend(err.to_string()))?;
        Ok(next)
    }

    fn reset_participants(&self, race_id: &RaceId) -> Result<(), StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE participants SET status = 'registered', current_zone = NULL, current_layer = 0,
                zone_history = '[]', igt_ms = 0, death_count = 0, finished_at = NULL,
                last_igt_change_at = NULL
             WHERE race_id = ?1",
            params![race_id.as_str()],
        )
        .map_err(|err| StoreError::Backend(err.to_string()))?;
        Ok(())
    }
}

fn drop_insert_participant(tx: &rusqlite::Transaction<'_>, participant: &Participant) -> Result<(), StoreError> {
    let zone_history_json = serde_json::to_string(&participant.zone_history)
        .map_err(|err| StoreError::Serialization(err.to_string()))?;
    tx.execute(
        "INSERT INTO participants (id, race_id, user_id, mod_token, status, current_zone,
            current_layer, zone_history, igt_ms, death_count, finished_at, last_igt_change_at,
            color_index, arrival_order)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)",
        params![
            participant.id.as_str(),
            participant.race_id.as_str(),
            participant.user_id.as_str(),
            participant.mod_token.as_str(),
            participant_status_to_str(participant.status),
            participant.current_zone.as_ref().map(crate::identifiers::NodeId::as_str),
            i64::from(participant.current_layer),
            zone_history_json,
            participant.igt_ms as i64,
            i64::from(participant.death_count),
            None::<String>,
            None::<String>,
            i64::from(participant.color_index),
            participant.arrival_order as i64,
        ],
    )
    .map_err(|err| StoreError::Backend(err.to_string()))?;
    Ok(())
}

// ============================================================================
// SECTION: SeedStore
// ============================================================================

impl SeedStore for SqliteStore {
    fn put_seed(&self, seed: Seed) -> Result<Seed, StoreError> {
        let conn = self.lock()?;
        let graph_json =
            serde_json::to_string(&seed.graph).map_err(|err| StoreError::Serialization(err.to_string()))?;
        conn.execute(
            "INSERT INTO seeds (id, pool, numeric_id, graph, status, file_path)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                seed.id.as_str(),
                seed.pool,
                seed.numeric_id as i64,
                graph_json,
                seed_status_to_str(seed.status),
                seed.file_path,
            ],
        )
        .map_err(|err| StoreError::Backend(err.to_string()))?;
        Ok(seed)
    }

    fn load_seed(&self, id: &SeedId) -> Result<Option<Seed>, StoreError> {
        let conn = self.lock()?;
        conn.query_row("SELECT * FROM seeds WHERE id = ?1", params![id.as_str()], row_to_seed)
            .optional()
            .map_err(|err| StoreError::Backend(err.to_string()))
    }

    fn pick_available(&self, pool: &str, exclude: &[SeedId]) -> Result<Option<Seed>, StoreError> {
        let conn = self.lock()?;
        let placeholders: Vec<String> = (0..exclude.len()).map(|i| format!("?{}", i + 3)).collect();
        let exclude_clause = if exclude.is_empty() {
            String::new()
        } else {
            format!(" AND id NOT IN ({})", placeholders.join(", "))
        };
        let sql = format!(
            "SELECT * FROM seeds WHERE pool = ?1 AND status = ?2{exclude_clause}
             ORDER BY RANDOM() LIMIT 1"
        );
        let mut bound: Vec<Box<dyn rusqlite::ToSql>> =
            vec![Box::new(pool.to_string()), Box::new(seed_status_to_str(SeedStatus::Available))];
        for id in exclude {
            bound.push(Box::new(id.as_str().to_string()));
        }
        let params_refs: Vec<&dyn rusqlite::ToSql> = bound.iter().map(std::convert::AsRef::as_ref).collect();
        conn.query_row(&sql, params_refs.as_slice(), row_to_seed)
            .optional()
            .map_err(|err| StoreError::Backend(err.to_string()))
    }

    fn set_seed_status(&self, id: &SeedId, status: SeedStatus) -> Result<Seed, StoreError> {
        let conn = self.lock()?;
        conn.execute(
            "UPDATE seeds SET status = ?2 WHERE id = ?1",
            params![id.as_str(), seed_status_to_str(status)],
        )
        .map_err(|err| StoreError::Backend(err.to_string()))?;
        conn.query_row("SELECT * FROM seeds WHERE id = ?1", params![id.as_str()], row_to_seed)
            .map_err(|err| StoreError::Backend(err.to_string()))
    }

    fn discard_pool(&self, pool: &str) -> Result<u64, StoreError> {
        let conn = self.lock()?;
        let affected = conn
            .execute(
                "UPDATE seeds SET status = 'discarded' WHERE pool = ?1 AND status IN ('available', 'consumed')",
                params![pool],
            )
            .map_err(|err| StoreError::Backend(err.to_string()))?;
        Ok(affected as u64)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, reason = "test-only assertions")]
mod tests {
    use super::*;
    use crate::graph::SeedGraph;
    use crate::identifiers::FlagId;
    use crate::identifiers::NodeId;

    fn store() -> SqliteStore {
        SqliteStore::open_in_memory().unwrap()
    }

    fn sample_seed(pool: &str) -> Seed {
        Seed {
            id: SeedId::new(),
            pool: pool.to_string(),
            numeric_id: 1,
            graph: SeedGraph {
                start_node: NodeId::from_raw("n_s"),
                nodes: std::collections::BTreeMap::new(),
                event_map: std::collections::BTreeMap::new(),
                finish_event: FlagId::new(9999),
                total_layers: 1,
                total_nodes: 1,
                total_paths: 1,
            },
            status: SeedStatus::Available,
            file_path: "seeds/s1.zip".to_string(),
        }
    }

    #[test]
    fn create_and_load_race_round_trips() {
        let store = store();
        let race = store
            .create_race(NewRace {
                name: "SpeedFog Saturday".to_string(),
                organizer_user_id: UserId::new(),
                seed_id: SeedId::new(),
                is_public: true,
                scheduled_at: None,
                config: serde_json::json!({"grace_lookup": true}),
            })
            .unwrap();
        let loaded = store.load_race(&race.id).unwrap().unwrap();
        assert_eq!(loaded, race);
        assert_eq!(loaded.status, RaceStatus::Setup);
        assert_eq!(loaded.version, 0);
    }

    #[test]
    fn transition_race_optimistic_conflict_on_stale_version() {
        let store = store();
        let race = store
            .create_race(NewRace {
                name: "race".to_string(),
                organizer_user_id: UserId::new(),
                seed_id: SeedId::new(),
                is_public: true,
                scheduled_at: None,
                config: serde_json::json!({}),
            })
            .unwrap();
        let outcome = store
            .transition_race(&race.id, 7, RaceTransition::Start { started_at: OffsetDateTime::now_utc() })
            .unwrap();
        assert!(outcome.is_conflict());
        let reloaded = store.load_race(&race.id).unwrap().unwrap();
        assert_eq!(reloaded.status, RaceStatus::Setup);
        assert_eq!(reloaded.version, 0);
    }

    #[test]
    fn transition_race_start_then_finish_increments_version() {
        let store = store();
        let race = store
            .create_race(NewRace {
                name: "race".to_string(),
                organizer_user_id: UserId::new(),
                seed_id: SeedId::new(),
                is_public: true,
                scheduled_at: None,
                config: serde_json::json!({}),
            })
            .unwrap();
        let started = store
            .transition_race(&race.id, 0, RaceTransition::Start { started_at: OffsetDateTime::now_utc() })
            .unwrap()
            .applied()
            .unwrap();
        assert_eq!(started.status, RaceStatus::Running);
        assert_eq!(started.version, 1);
        assert!(started.started_at.is_some());

        let finished = store
            .transition_race(&race.id, 1, RaceTransition::Finish)
            .unwrap()
            .applied()
            .unwrap();
        assert_eq!(finished.status, RaceStatus::Finished);
        assert_eq!(finished.version, 2);
    }

    #[test]
    fn reset_resets_participants_in_same_transaction() {
        let store = store();
        let race = store
            .create_race(NewRace {
                name: "race".to_string(),
                organizer_user_id: UserId::new(),
                seed_id: SeedId::new(),
                is_public: true,
                scheduled_at: None,
                config: serde_json::json!({}),
            })
            .unwrap();
        let participant = store.register_participant(&race.id, &UserId::new()).unwrap();
        let mut playing = participant.clone();
        playing.status = ParticipantStatus::Playing;
        playing.current_layer = 3;
        playing.igt_ms = 12_345;
        store.save_participant(playing).unwrap();

        let started = store
            .transition_race(&race.id, 0, RaceTransition::Start { started_at: OffsetDateTime::now_utc() })
            .unwrap()
            .applied()
            .unwrap();
        store.transition_race(&race.id, started.version, RaceTransition::Reset).unwrap();

        let after = store.load_participant(&participant.id).unwrap().unwrap();
        assert_eq!(after.status, ParticipantStatus::Registered);
        assert_eq!(after.current_layer, 0);
        assert_eq!(after.igt_ms, 0);
        assert_eq!(after.id, participant.id);
    }

    #[test]
    fn save_participant_rejects_terminal_mutation_and_clamps_layer() {
        let store = store();
        let race = store
            .create_race(NewRace {
                name: "race".to_string(),
                organizer_user_id: UserId::new(),
                seed_id: SeedId::new(),
                is_public: true,
                scheduled_at: None,
                config: serde_json::json!({}),
            })
            .unwrap();
        let participant = store.register_participant(&race.id, &UserId::new()).unwrap();

        let mut at_layer_three = participant.clone();
        at_layer_three.current_layer = 3;
        store.save_participant(at_layer_three).unwrap();

        let mut regress = participant.clone();
        regress.current_layer = 1;
        let clamped = store.save_participant(regress).unwrap();
        assert_eq!(clamped.current_layer, 3);

        let mut finished = participant.clone();
        finished.status = ParticipantStatus::Finished;
        finished.current_layer = 3;
        store.save_participant(finished).unwrap();

        let mut sneaky = participant;
        sneaky.status = ParticipantStatus::Playing;
        sneaky.igt_ms = 999_999;
        let after = store.save_participant(sneaky).unwrap();
        assert_eq!(after.status, ParticipantStatus::Finished);
        assert_eq!(after.igt_ms, 0);
    }

    #[test]
    fn load_participant_by_token_finds_owner() {
        let store = store();
        let race = store
            .create_race(NewRace {
                name: "race".to_string(),
                organizer_user_id: UserId::new(),
                seed_id: SeedId::new(),
                is_public: true,
                scheduled_at: None,
                config: serde_json::json!({}),
            })
            .unwrap();
        let participant = store.register_participant(&race.id, &UserId::new()).unwrap();
        let found = store.load_participant_by_token(&race.id, &participant.mod_token).unwrap().unwrap();
        assert_eq!(found.id, participant.id);
    }

    #[test]
    fn discard_pool_is_terminal_and_excludes_from_pick_available() {
        let store = store();
        let seed = store.put_seed(sample_seed("weekly")).unwrap();
        let affected = store.discard_pool("weekly").unwrap();
        assert_eq!(affected, 1);
        let reloaded = store.load_seed(&seed.id).unwrap().unwrap();
        assert_eq!(reloaded.status, SeedStatus::Discarded);
        assert!(store.pick_available("weekly", &[]).unwrap().is_none());
    }

    #[test]
    fn pick_available_excludes_ids_in_exclude_list() {
        let store = store();
        let first = store.put_seed(sample_seed("weekly")).unwrap();
        let second = store.put_seed(sample_seed("weekly")).unwrap();
        let picked = store.pick_available("weekly", std::slice::from_ref(&first.id)).unwrap().unwrap();
        assert_eq!(picked.id, second.id);
    }
}
