//! PostgreSQL Storage - team rosters, battle results and reward grants
//!
//! ## Tables
//! - characters, battle_teams, battle_team_members, battle_results
//! - battle_rewards, items, inventory, keywords

use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::FromRow;
use tracing::{debug, info};

use super::migrations::{self, PERMIT_ITEM_TYPE};

/// Longest reason string the results table accepts
const REASON_MAX_CHARS: usize = 255;

/// PostgreSQL connection pool wrapper
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

/// Error type for PostgreSQL operations
#[derive(Debug, thiserror::Error)]
pub enum PostgresError {
    #[error("Database error: {0}")]
    Sqlx(#[from] sqlx::Error),
    #[error("Migration error: {0}")]
    Migration(String),
    #[error("Not found: {0}")]
    NotFound(String),
}

impl PostgresStore {
    /// Connect to PostgreSQL and run migrations
    pub async fn new(database_url: &str, max_connections: u32) -> Result<Self, PostgresError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        info!("PostgreSQL connected (max_connections={})", max_connections);

        let store = Self { pool };
        store.run_migrations().await?;

        Ok(store)
    }

    /// Connect with an existing pool
    pub fn from_pool(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Run all pending migrations
    pub async fn run_migrations(&self) -> Result<(), PostgresError> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS _migrations (
                name VARCHAR(100) PRIMARY KEY,
                applied_at TIMESTAMP WITH TIME ZONE DEFAULT NOW()
            )",
        )
        .execute(&self.pool)
        .await?;

        for (name, sql) in migrations::get_migrations() {
            let applied: bool =
                sqlx::query_scalar("SELECT EXISTS(SELECT 1 FROM _migrations WHERE name = $1)")
                    .bind(name)
                    .fetch_one(&self.pool)
                    .await?;

            if !applied {
                info!("Running migration: {}", name);
                sqlx::raw_sql(sql)
                    .execute(&self.pool)
                    .await
                    .map_err(|e| PostgresError::Migration(format!("{}: {}", name, e)))?;

                sqlx::query("INSERT INTO _migrations (name) VALUES ($1)")
                    .bind(name)
                    .execute(&self.pool)
                    .await?;

                info!("Migration applied: {}", name);
            } else {
                debug!("Migration already applied: {}", name);
            }
        }

        Ok(())
    }

    // ========================================================================
    // Team Operations
    // ========================================================================

    pub async fn get_team(&self, team_id: i64) -> Result<Option<BattleTeamRow>, PostgresError> {
        let row = sqlx::query_as::<_, BattleTeamRow>(
            "SELECT id, dungeon_id, name, status FROM battle_teams WHERE id = $1",
        )
        .bind(team_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Characters on a team, in join order
    pub async fn get_team_members(&self, team_id: i64) -> Result<Vec<CharacterSqlRow>, PostgresError> {
        let rows = sqlx::query_as::<_, CharacterSqlRow>(
            "SELECT c.ch_id, c.ch_name, c.hp, c.atk, c.def,
                    c.skill_1, c.skill_2, c.skill_3, c.skill_4, c.skill_5
             FROM battle_team_members m
             JOIN characters c ON c.ch_id = m.ch_id
             WHERE m.team_id = $1
             ORDER BY m.joined_at, c.ch_id",
        )
        .bind(team_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn insert_result(&self, team_id: i64, result: &str, reason: &str) -> Result<(), PostgresError> {
        let reason: String = reason.chars().take(REASON_MAX_CHARS).collect();
        sqlx::query("INSERT INTO battle_results (team_id, result, reason) VALUES ($1, $2, $3)")
            .bind(team_id)
            .bind(result)
            .bind(reason)
            .execute(&self.pool)
            .await?;
        debug!("Recorded battle result: team={} result={}", team_id, result);
        Ok(())
    }

    pub async fn set_team_status(&self, team_id: i64, status: &str) -> Result<(), PostgresError> {
        let affected = sqlx::query("UPDATE battle_teams SET status = $1 WHERE id = $2")
            .bind(status)
            .bind(team_id)
            .execute(&self.pool)
            .await?
            .rows_affected();
        if affected == 0 {
            return Err(PostgresError::NotFound(format!("team {}", team_id)));
        }
        Ok(())
    }

    // ========================================================================
    // Reward Operations
    // ========================================================================

    pub async fn get_reward_table(&self, dungeon_id: &str) -> Result<Vec<RewardSqlRow>, PostgresError> {
        let rows = sqlx::query_as::<_, RewardSqlRow>(
            "SELECT dungeon_id, type, reward_id, count, chance
             FROM battle_rewards WHERE dungeon_id = $1 ORDER BY id",
        )
        .bind(dungeon_id)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    pub async fn find_permit_slot(&self, ch_id: i64) -> Result<Option<(i64, i32)>, PostgresError> {
        let row: Option<(i64, i32)> = sqlx::query_as(
            "SELECT inv.id, inv.stack
             FROM inventory inv
             JOIN items it ON it.it_id = inv.it_id
             WHERE inv.ch_id = $1 AND it.it_type = $2 AND inv.stack >= 1
             ORDER BY inv.id
             LIMIT 1",
        )
        .bind(ch_id)
        .bind(PERMIT_ITEM_TYPE)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    pub async fn get_item(&self, it_id: &str) -> Result<Option<ItemSqlRow>, PostgresError> {
        let row = sqlx::query_as::<_, ItemSqlRow>(
            "SELECT it_id, it_name, it_img FROM items WHERE it_id = $1",
        )
        .bind(it_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    /// Add to an existing stack, or open a new inventory row
    pub async fn add_item_stack(
        &self,
        ch_id: i64,
        ch_name: &str,
        it_id: &str,
        it_name: &str,
        count: i32,
    ) -> Result<(), PostgresError> {
        let mut tx = self.pool.begin().await?;

        let existing: Option<i64> = sqlx::query_scalar(
            "SELECT id FROM inventory WHERE ch_id = $1 AND it_id = $2 ORDER BY id LIMIT 1 FOR UPDATE",
        )
        .bind(ch_id)
        .bind(it_id)
        .fetch_optional(&mut *tx)
        .await?;

        match existing {
            Some(id) => {
                sqlx::query("UPDATE inventory SET stack = stack + $1 WHERE id = $2")
                    .bind(count)
                    .bind(id)
                    .execute(&mut *tx)
                    .await?;
            }
            None => {
                sqlx::query(
                    "INSERT INTO inventory (ch_id, ch_name, it_id, it_name, stack)
                     VALUES ($1, $2, $3, $4, $5)",
                )
                .bind(ch_id)
                .bind(ch_name)
                .bind(it_id)
                .bind(it_name)
                .bind(count)
                .execute(&mut *tx)
                .await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    pub async fn add_keyword(&self, ch_id: i64, keyword: &str) -> Result<(), PostgresError> {
        sqlx::query(
            "INSERT INTO keywords (ch_id, keyword) VALUES ($1, $2)
             ON CONFLICT (ch_id, keyword) DO NOTHING",
        )
        .bind(ch_id)
        .bind(keyword)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Take one permit: decrement the stack, or delete the row at 1
    pub async fn use_permit(&self, slot_id: i64, stack: i32) -> Result<(), PostgresError> {
        if stack > 1 {
            sqlx::query("UPDATE inventory SET stack = stack - 1 WHERE id = $1")
                .bind(slot_id)
                .execute(&self.pool)
                .await?;
        } else {
            sqlx::query("DELETE FROM inventory WHERE id = $1")
                .bind(slot_id)
                .execute(&self.pool)
                .await?;
        }
        Ok(())
    }
}

// ============================================================================
// Row Types
// ============================================================================

#[derive(Debug, Clone, FromRow)]
pub struct BattleTeamRow {
    pub id: i64,
    pub dungeon_id: Option<String>,
    pub name: String,
    pub status: String,
}

#[derive(Debug, Clone, FromRow)]
pub struct CharacterSqlRow {
    pub ch_id: i64,
    pub ch_name: String,
    pub hp: i32,
    pub atk: i32,
    pub def: i32,
    pub skill_1: Option<String>,
    pub skill_2: Option<String>,
    pub skill_3: Option<String>,
    pub skill_4: Option<String>,
    pub skill_5: Option<String>,
}

impl CharacterSqlRow {
    /// Equipped skill ids, empty slots skipped
    pub fn skill_ids(&self) -> Vec<String> {
        [&self.skill_1, &self.skill_2, &self.skill_3, &self.skill_4, &self.skill_5]
            .into_iter()
            .flatten()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }
}

#[derive(Debug, Clone, FromRow)]
pub struct RewardSqlRow {
    pub dungeon_id: String,
    #[sqlx(rename = "type")]
    pub kind: String,
    pub reward_id: String,
    pub count: i32,
    pub chance: f64,
}

#[derive(Debug, Clone, FromRow)]
pub struct ItemSqlRow {
    pub it_id: String,
    pub it_name: String,
    pub it_img: Option<String>,
}
