//! Database Migrations - PostgreSQL schema for raid bookkeeping
//!
//! Teams and characters are owned by the game database; the raid server
//! reads them, records results and grants rewards.

/// SQL migration for the tables the raid server touches
pub const MIGRATION_V1: &str = r#"
-- ============================================================================
-- Raid Server Schema v1
-- ============================================================================

-- ============================================================================
-- 1. Characters
-- ============================================================================

CREATE TABLE IF NOT EXISTS characters (
    ch_id           BIGSERIAL PRIMARY KEY,
    ch_name         VARCHAR(64) NOT NULL,
    hp              INTEGER NOT NULL DEFAULT 100,
    atk             INTEGER NOT NULL DEFAULT 1,
    def             INTEGER NOT NULL DEFAULT 0,
    skill_1         VARCHAR(64),
    skill_2         VARCHAR(64),
    skill_3         VARCHAR(64),
    skill_4         VARCHAR(64),
    skill_5         VARCHAR(64)
);

-- ============================================================================
-- 2. Battle Teams
-- ============================================================================

CREATE TABLE IF NOT EXISTS battle_teams (
    id              BIGSERIAL PRIMARY KEY,
    dungeon_id      VARCHAR(64),
    name            VARCHAR(64) NOT NULL DEFAULT '',
    status          VARCHAR(16) NOT NULL DEFAULT 'READY',
    created_at      TIMESTAMP WITH TIME ZONE DEFAULT NOW()
);

CREATE TABLE IF NOT EXISTS battle_team_members (
    team_id         BIGINT NOT NULL REFERENCES battle_teams(id) ON DELETE CASCADE,
    ch_id           BIGINT NOT NULL REFERENCES characters(ch_id) ON DELETE CASCADE,
    joined_at       TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
    PRIMARY KEY (team_id, ch_id)
);

CREATE TABLE IF NOT EXISTS battle_results (
    id              BIGSERIAL PRIMARY KEY,
    team_id         BIGINT NOT NULL,
    result          VARCHAR(16) NOT NULL,
    reason          VARCHAR(255),
    created_at      TIMESTAMP WITH TIME ZONE DEFAULT NOW()
);

CREATE INDEX IF NOT EXISTS idx_battle_results_team ON battle_results(team_id);

-- ============================================================================
-- 3. Rewards
-- ============================================================================

CREATE TABLE IF NOT EXISTS battle_rewards (
    id              BIGSERIAL PRIMARY KEY,
    dungeon_id      VARCHAR(64) NOT NULL,
    type            VARCHAR(16) NOT NULL,
    reward_id       VARCHAR(64) NOT NULL,
    count           INTEGER NOT NULL DEFAULT 1,
    chance          DOUBLE PRECISION NOT NULL DEFAULT 100
);

CREATE INDEX IF NOT EXISTS idx_battle_rewards_dungeon ON battle_rewards(dungeon_id);

CREATE TABLE IF NOT EXISTS items (
    it_id           VARCHAR(64) PRIMARY KEY,
    it_name         VARCHAR(128) NOT NULL,
    it_type         VARCHAR(64) NOT NULL DEFAULT '',
    it_img          VARCHAR(255)
);

CREATE TABLE IF NOT EXISTS inventory (
    id              BIGSERIAL PRIMARY KEY,
    ch_id           BIGINT NOT NULL REFERENCES characters(ch_id) ON DELETE CASCADE,
    ch_name         VARCHAR(64) NOT NULL,
    it_id           VARCHAR(64) NOT NULL REFERENCES items(it_id),
    it_name         VARCHAR(128) NOT NULL,
    stack           INTEGER NOT NULL DEFAULT 1 CHECK (stack >= 0)
);

CREATE INDEX IF NOT EXISTS idx_inventory_owner ON inventory(ch_id, it_id);

CREATE TABLE IF NOT EXISTS keywords (
    ch_id           BIGINT NOT NULL REFERENCES characters(ch_id) ON DELETE CASCADE,
    keyword         VARCHAR(128) NOT NULL,
    acquired_at     TIMESTAMP WITH TIME ZONE DEFAULT NOW(),
    PRIMARY KEY (ch_id, keyword)
);
"#;

/// Item type of the raid permit consumed on a rewarded victory
pub const PERMIT_ITEM_TYPE: &str = "raid_permit";

/// Get all migrations in order
pub fn get_migrations() -> Vec<(&'static str, &'static str)> {
    vec![("v1_raid_schema", MIGRATION_V1)]
}
