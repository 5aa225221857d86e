use super::{
    db_structs::{best_record_from_row, player_rating_from_row, recent_slot_from_row},
    store::{Store, StoreTransaction}
};
use crate::{
    error::StoreError,
    model::structures::{
        best_record::BestRecord,
        chart::ChartKey,
        play_log::{PlayLogEntry, RatingSnapshot},
        player_rating::PlayerRatingState,
        recent_slot::RecentSlot
    }
};
use postgres_types::ToSql;
use std::sync::Arc;
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error, info};

const SCHEMA: &str = include_str!("schema.sql");

/// PostgreSQL-backed [`Store`].
///
/// Holds a fixed set of connections. A player always maps to the same
/// connection, and every transaction takes `pg_advisory_xact_lock(player_id)`
/// first so that other processes writing the same player wait as well.
#[derive(Clone)]
pub struct DbClient {
    shards: Arc<Vec<Arc<Mutex<Client>>>>
}

impl DbClient {
    // Connect to the database and return a DbClient instance
    pub async fn connect(connection_str: &str) -> Result<Self, StoreError> {
        DbClient::connect_sharded(connection_str, 1).await
    }

    pub async fn connect_sharded(connection_str: &str, connections: usize) -> Result<Self, StoreError> {
        let mut shards = Vec::with_capacity(connections.max(1));

        for _ in 0..connections.max(1) {
            let (client, connection) = tokio_postgres::connect(connection_str, NoTls).await?;

            // Spawn the connection object to run in the background
            tokio::spawn(async move {
                if let Err(e) = connection.await {
                    error!("connection error: {}", e);
                }
            });

            shards.push(Arc::new(Mutex::new(client)));
        }

        info!("Connected to database with {} connection(s)", shards.len());

        Ok(DbClient {
            shards: Arc::new(shards)
        })
    }

    /// Creates any missing tables and indexes.
    pub async fn migrate(&self) -> Result<(), StoreError> {
        let client = self.shard(0).lock_owned().await;
        client.batch_execute(SCHEMA).await?;

        info!("Schema is up to date");
        Ok(())
    }

    fn shard(&self, player_id: i32) -> Arc<Mutex<Client>> {
        let index = player_id.rem_euclid(self.shards.len() as i32) as usize;
        Arc::clone(&self.shards[index])
    }
}

impl Store for DbClient {
    type Transaction = DbTransaction;

    async fn begin(&self, player_id: i32) -> Result<DbTransaction, StoreError> {
        let client = self.shard(player_id).lock_owned().await;
        client.batch_execute("BEGIN ISOLATION LEVEL READ COMMITTED").await?;

        let tx = DbTransaction {
            client: Some(client),
            player_id
        };

        // Dropping `tx` on failure rolls back
        tx.client()?
            .execute("SELECT pg_advisory_xact_lock($1)", &[&(player_id as i64)])
            .await?;

        Ok(tx)
    }

    async fn append_play_log(&self, entry: &PlayLogEntry) -> Result<(), StoreError> {
        let query = "INSERT INTO play_log (id, player_id, song_id, difficulty, score, shiny_perfect_count, \
            perfect_count, near_count, miss_count, health, modifier, clear_type, rating, played_at) \
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14) ON CONFLICT (id) DO NOTHING";
        let values: &[&(dyn ToSql + Sync)] = &[
            &entry.id,
            &entry.player_id,
            &entry.chart.song_id,
            &(entry.chart.difficulty as i32),
            &entry.score,
            &entry.shiny_perfect_count,
            &entry.perfect_count,
            &entry.near_count,
            &entry.miss_count,
            &entry.health,
            &entry.modifier,
            &(entry.clear_type as i32),
            &entry.rating,
            &entry.played_at
        ];

        let client = self.shard(entry.player_id).lock_owned().await;
        client.execute(query, values).await?;
        Ok(())
    }

    async fn upsert_rating_snapshot(&self, snapshot: &RatingSnapshot) -> Result<(), StoreError> {
        let query = "INSERT INTO rating_snapshots (player_id, day, potential) VALUES ($1, $2, $3) \
            ON CONFLICT (player_id, day) DO UPDATE SET potential = EXCLUDED.potential";

        let client = self.shard(snapshot.player_id).lock_owned().await;
        client
            .execute(query, &[&snapshot.player_id, &snapshot.day, &snapshot.potential])
            .await?;
        Ok(())
    }

    async fn player_ids(&self) -> Result<Vec<i32>, StoreError> {
        let client = self.shard(0).lock_owned().await;
        let rows = client
            .query("SELECT DISTINCT player_id FROM best_scores ORDER BY player_id", &[])
            .await?;

        rows.iter()
            .map(|row| row.try_get::<_, i32>("player_id").map_err(StoreError::from))
            .collect()
    }

    async fn player_rating(&self, player_id: i32) -> Result<Option<PlayerRatingState>, StoreError> {
        let client = self.shard(player_id).lock_owned().await;
        let row = client
            .query_opt(
                "SELECT player_id, potential, updated_at, revision FROM player_ratings WHERE player_id = $1",
                &[&player_id]
            )
            .await?;

        row.as_ref().map(player_rating_from_row).transpose()
    }
}

/// A transaction pinned to one pooled connection. The connection stays locked
/// until commit, rollback or drop.
pub struct DbTransaction {
    client: Option<OwnedMutexGuard<Client>>,
    player_id: i32
}

impl DbTransaction {
    fn client(&self) -> Result<&Client, StoreError> {
        self.client
            .as_deref()
            .ok_or_else(|| StoreError::Unavailable("transaction already finished".to_string()))
    }

    async fn finish(mut self, statement: &str) -> Result<(), StoreError> {
        let client = self
            .client
            .take()
            .ok_or_else(|| StoreError::Unavailable("transaction already finished".to_string()))?;

        client.batch_execute(statement).await?;
        Ok(())
    }
}

impl StoreTransaction for DbTransaction {
    fn player_id(&self) -> i32 {
        self.player_id
    }

    async fn best_record(&mut self, chart: &ChartKey) -> Result<Option<BestRecord>, StoreError> {
        let row = self
            .client()?
            .query_opt(
                "SELECT * FROM best_scores WHERE player_id = $1 AND song_id = $2 AND difficulty = $3",
                &[&self.player_id, &chart.song_id, &(chart.difficulty as i32)]
            )
            .await?;

        row.as_ref().map(best_record_from_row).transpose()
    }

    async fn save_best_record(&mut self, record: &BestRecord) -> Result<(), StoreError> {
        let query = "INSERT INTO best_scores (player_id, song_id, difficulty, score, shiny_perfect_count, \
            perfect_count, near_count, miss_count, health, modifier, time_played, clear_type, best_clear_type, \
            rating, score_v2) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15) \
            ON CONFLICT (player_id, song_id, difficulty) DO UPDATE SET score = EXCLUDED.score, \
            shiny_perfect_count = EXCLUDED.shiny_perfect_count, perfect_count = EXCLUDED.perfect_count, \
            near_count = EXCLUDED.near_count, miss_count = EXCLUDED.miss_count, health = EXCLUDED.health, \
            modifier = EXCLUDED.modifier, time_played = EXCLUDED.time_played, clear_type = EXCLUDED.clear_type, \
            best_clear_type = EXCLUDED.best_clear_type, rating = EXCLUDED.rating, score_v2 = EXCLUDED.score_v2";
        let values: &[&(dyn ToSql + Sync)] = &[
            &record.player_id,
            &record.chart.song_id,
            &(record.chart.difficulty as i32),
            &record.score,
            &record.shiny_perfect_count,
            &record.perfect_count,
            &record.near_count,
            &record.miss_count,
            &record.health,
            &record.modifier,
            &record.time_played,
            &(record.clear_type as i32),
            &(record.best_clear_type as i32),
            &record.rating,
            &record.score_v2
        ];

        self.client()?.execute(query, values).await?;
        Ok(())
    }

    async fn top_best_ratings(&mut self, limit: usize) -> Result<Vec<f64>, StoreError> {
        let rows = self
            .client()?
            .query(
                "SELECT rating FROM best_scores WHERE player_id = $1 ORDER BY rating DESC LIMIT $2",
                &[&self.player_id, &(limit as i64)]
            )
            .await?;

        rows.iter()
            .map(|row| row.try_get::<_, f64>("rating").map_err(StoreError::from))
            .collect()
    }

    async fn recent_slots(&mut self) -> Result<Vec<RecentSlot>, StoreError> {
        let rows = self
            .client()?
            .query(
                "SELECT * FROM recent_slots WHERE player_id = $1 ORDER BY played_at DESC, slot_id",
                &[&self.player_id]
            )
            .await?;

        rows.iter().map(recent_slot_from_row).collect()
    }

    async fn save_recent_slot(&mut self, slot: &RecentSlot) -> Result<(), StoreError> {
        let query = "INSERT INTO recent_slots (player_id, slot_id, song_id, difficulty, rating, score, clear_type, \
            played_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8) ON CONFLICT (player_id, slot_id) DO UPDATE SET \
            song_id = EXCLUDED.song_id, difficulty = EXCLUDED.difficulty, rating = EXCLUDED.rating, \
            score = EXCLUDED.score, clear_type = EXCLUDED.clear_type, played_at = EXCLUDED.played_at";
        let values: &[&(dyn ToSql + Sync)] = &[
            &self.player_id,
            &(slot.slot_id as i32),
            &slot.chart.song_id,
            &(slot.chart.difficulty as i32),
            &slot.rating,
            &slot.score,
            &(slot.clear_type as i32),
            &slot.played_at
        ];

        self.client()?.execute(query, values).await?;
        Ok(())
    }

    async fn delete_recent_slot(&mut self, slot_id: u8) -> Result<(), StoreError> {
        self.client()?
            .execute(
                "DELETE FROM recent_slots WHERE player_id = $1 AND slot_id = $2",
                &[&self.player_id, &(slot_id as i32)]
            )
            .await?;
        Ok(())
    }

    async fn player_rating(&mut self) -> Result<Option<PlayerRatingState>, StoreError> {
        let row = self
            .client()?
            .query_opt(
                "SELECT player_id, potential, updated_at, revision FROM player_ratings WHERE player_id = $1",
                &[&self.player_id]
            )
            .await?;

        row.as_ref().map(player_rating_from_row).transpose()
    }

    async fn save_player_rating(&mut self, state: &PlayerRatingState) -> Result<(), StoreError> {
        self.client()?
            .execute(
                "INSERT INTO player_ratings (player_id, potential, updated_at, revision) VALUES ($1, $2, $3, $4) \
                ON CONFLICT (player_id) DO UPDATE SET potential = EXCLUDED.potential, \
                updated_at = EXCLUDED.updated_at, revision = EXCLUDED.revision",
                &[&state.player_id, &state.potential, &state.updated_at, &state.revision]
            )
            .await?;
        Ok(())
    }

    async fn commit(self) -> Result<(), StoreError> {
        self.finish("COMMIT").await
    }

    async fn rollback(self) -> Result<(), StoreError> {
        self.finish("ROLLBACK").await
    }
}

impl Drop for DbTransaction {
    fn drop(&mut self) {
        let Some(client) = self.client.take() else {
            return;
        };

        debug!("Rolling back unfinished transaction for player {}", self.player_id);

        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = client.batch_execute("ROLLBACK").await {
                        error!("Failed to roll back dropped transaction: {}", e);
                    }
                });
            }
            Err(_) => error!("Dropped transaction outside of a runtime, connection left mid-transaction")
        }
    }
}
